use {
    crate::domain::error::PipelineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
};

/// Rejection returned by the webhook endpoint: `{"error": ..}` plus optional `details`.
#[derive(Debug)]
pub struct WebhookError {
    status: StatusCode,
    message: &'static str,
    details: Option<String>,
}

impl WebhookError {
    pub fn missing_signature() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "No signature provided",
            details: None,
        }
    }

    pub fn invalid_signature() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid signature",
            details: None,
        }
    }

    pub fn invalid_payload() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid payload",
            details: None,
        }
    }

    /// Processing failed after verification. The provider will redeliver.
    pub fn processing(err: &PipelineError, expose_details: bool) -> Self {
        tracing::error!(error = %err, "webhook processing failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Webhook processing failed",
            details: expose_details.then(|| err.to_string()),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Error body of the domain endpoints: `{"success": false, "error": .., "details": ..}`.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self.0 {
            PipelineError::MissingConfig(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Netlify configuration missing",
                msg.clone(),
            ),
            PipelineError::Validation(msg) => (StatusCode::BAD_REQUEST, "Invalid request", msg.clone()),
            PipelineError::ReconcileInFlight(owner) => (
                StatusCode::CONFLICT,
                "Sync already in progress",
                format!("a sync for {owner} is still running"),
            ),
            PipelineError::Provider(msg) => (
                StatusCode::BAD_GATEWAY,
                "Failed to fetch Netlify site",
                msg.clone(),
            ),
            PipelineError::Timeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Netlify request timed out",
                msg.clone(),
            ),
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Domain sync failed",
                    "internal error".to_string(),
                )
            }
            other => {
                tracing::error!("domain sync error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Domain sync failed",
                    other.to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": error,
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}
