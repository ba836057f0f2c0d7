use {
    crate::{
        AppState,
        adapters::{
            domains::{
                add_domain_handler, list_domains_handler, remove_domain_handler,
                sync_domains_handler, sync_preflight_handler,
            },
            stripe::stripe_webhook_handler,
        },
    },
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::time::Duration,
    tower_http::{
        cors::{Any, CorsLayer},
        timeout::TimeoutLayer,
        trace::TraceLayer,
    },
};

/// Stripe events are typically under 20 KB.
pub const BODY_LIMIT: usize = 64 * 1024;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let domains = Router::new()
        .route(
            "/domains/sync",
            post(sync_domains_handler).options(sync_preflight_handler),
        )
        .route("/domains", get(list_domains_handler))
        .route(
            "/domains/add",
            post(add_domain_handler).options(sync_preflight_handler),
        )
        .route(
            "/domains/remove",
            post(remove_domain_handler).options(sync_preflight_handler),
        )
        .layer(cors);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(REQUEST_TIMEOUT);

    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/webhook", post(stripe_webhook_handler))
        .merge(domains)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .with_state(state)
}
