use {
    super::signature::{SIGNATURE_HEADER, SignatureError},
    crate::{
        AppState,
        adapters::api_errors::WebhookError,
        domain::event::PaymentEvent,
        services::payment_pipeline::ProcessResult,
    },
    axum::{Json, body::Bytes, extract::State, http::HeaderMap},
    serde_json::{Value, json},
};

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let sig = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    if state.verifier.is_unsigned() {
        tracing::warn!("accepting webhook without signature verification (no STRIPE_WEBHOOK_SECRET)");
    }

    state.verifier.verify(sig, &body).map_err(|e| {
        tracing::warn!(error = %e, "webhook signature rejected");
        match e {
            SignatureError::Missing => WebhookError::missing_signature(),
            _ => WebhookError::invalid_signature(),
        }
    })?;

    let event = PaymentEvent::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "verified webhook body is not an event");
        WebhookError::invalid_payload()
    })?;

    tracing::Span::current()
        .record("event_id", tracing::field::display(&event.id))
        .record("event_type", tracing::field::display(&event.event_type));

    let result = state
        .pipeline
        .process(&event)
        .await
        .map_err(|e| WebhookError::processing(&e, state.expose_error_details))?;

    match &result {
        ProcessResult::Ignored => tracing::debug!("unhandled event type"),
        ProcessResult::Acknowledged(reason) => tracing::info!(reason = *reason, "event acknowledged"),
        ProcessResult::InvalidData(msg) => tracing::warn!(reason = %msg, "event acknowledged with invalid data"),
        other => tracing::info!(result = other.label(), "event processed"),
    }

    Ok(Json(json!({ "received": true })))
}
