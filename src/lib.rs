pub mod adapters;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    adapters::stripe::signature::WebhookVerifier,
    services::{payment_pipeline::PaymentPipeline, reconciler::Reconciler},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PaymentPipeline>,
    pub reconciler: Arc<Reconciler>,
    pub verifier: WebhookVerifier,
    /// Include error details in 500 responses (off in production).
    pub expose_error_details: bool,
}
