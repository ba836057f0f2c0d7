use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("provider unavailable: {0}")]
    Provider(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store: {0}")]
    Store(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("reconciliation already running for {0}")]
    ReconcileInFlight(String),
}
