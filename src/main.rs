use {
    backlink_sync::{
        AppState,
        adapters::{
            netlify_client::NetlifyProvider, stripe::signature::WebhookVerifier,
            stripe_client::StripeProvider,
        },
        app,
        config::Config,
        domain::{
            provider::{DomainProvider, SubscriptionProvider},
            repository::{BillingStore, DomainStore, EventLog},
        },
        infra::postgres::PgStore,
        services::{payment_pipeline::PaymentPipeline, reconciler::Reconciler, worker},
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let store = Arc::new(PgStore::new(pool));

    let subscriptions: Option<Arc<dyn SubscriptionProvider>> =
        config.stripe_secret_key.as_deref().map(|key| {
            Arc::new(StripeProvider::new(key, config.http_timeout)) as Arc<dyn SubscriptionProvider>
        });
    if subscriptions.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, invoice events will fail until it is configured");
    }

    let domains: Option<Arc<dyn DomainProvider>> = match config.netlify_access_token.as_deref() {
        Some(token) => Some(Arc::new(
            NetlifyProvider::new(token, config.http_timeout).expect("failed to build Netlify client"),
        )),
        None => None,
    };

    let verifier = WebhookVerifier::new(config.stripe_webhook_secret.as_deref());
    if verifier.is_unsigned() {
        tracing::warn!(
            "STRIPE_WEBHOOK_SECRET not set: webhook signatures are NOT verified (development mode)"
        );
    }

    let pipeline = Arc::new(PaymentPipeline::new(
        store.clone() as Arc<dyn EventLog>,
        store.clone() as Arc<dyn BillingStore>,
        subscriptions,
    ));
    let reconciler = Arc::new(Reconciler::new(
        store.clone() as Arc<dyn DomainStore>,
        domains,
        config.netlify_site_id.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let repair_handle = tokio::spawn(worker::run_repair(
        pipeline.clone(),
        config.repair_interval,
        config.event_retention,
        shutdown_rx.clone(),
    ));

    let reconcile_handle = config.reconcile_interval.map(|interval| {
        tokio::spawn(worker::run_scheduled_reconcile(
            reconciler.clone(),
            interval,
            shutdown_rx.clone(),
        ))
    });

    let state = AppState {
        pipeline,
        reconciler,
        verifier,
        expose_error_details: !config.is_production(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = repair_handle.await;
    if let Some(handle) = reconcile_handle {
        let _ = handle.await;
    }
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
