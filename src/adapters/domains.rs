use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::PipelineError,
            reconcile::{ReconciliationOutcome, SyncMode, SyncReport, SyncSummary},
            site_domain::SiteInfo,
        },
    },
    axum::{Json, body::Bytes, extract::State, http::StatusCode},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

/// Body of `POST /domains/sync`. Absent or empty body means `{}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sync_mode: Option<String>,
}

impl SyncRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, PipelineError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| PipelineError::Validation(format!("invalid JSON body: {e}")))
    }

    pub fn owner(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct SkippedDomain {
    pub domain: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct FailedDomain {
    pub domain: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub sync_mode: &'static str,
    pub domains_added: Vec<String>,
    pub domains_updated: Vec<String>,
    pub domains_skipped: Vec<SkippedDomain>,
    pub errors: Vec<FailedDomain>,
    pub summary: SyncSummary,
    pub netlify_domains: Vec<String>,
    pub netlify_count: usize,
    pub supabase_count: usize,
    pub site_info: SiteInfo,
}

impl From<SyncReport> for SyncResult {
    fn from(report: SyncReport) -> Self {
        let mut result = Self {
            sync_mode: report.mode,
            domains_added: Vec::new(),
            domains_updated: Vec::new(),
            domains_skipped: Vec::new(),
            errors: Vec::new(),
            summary: report.summary,
            netlify_count: report.remote_domains.len(),
            netlify_domains: report.remote_domains,
            supabase_count: report.local_count,
            site_info: report.site,
        };

        for decision in report.decisions {
            let domain = decision.domain;
            match decision.outcome {
                ReconciliationOutcome::Added => result.domains_added.push(domain),
                ReconciliationOutcome::Updated => result.domains_updated.push(domain),
                ReconciliationOutcome::Skipped { reason } => {
                    result.domains_skipped.push(SkippedDomain { domain, reason })
                }
                ReconciliationOutcome::Errored { reason } => {
                    result.errors.push(FailedDomain { domain, error: reason })
                }
            }
        }

        result
    }
}

#[tracing::instrument(name = "domain_sync", skip_all)]
pub async fn sync_domains_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let missing = state.reconciler.missing_config();
    if !missing.is_empty() {
        return Err(PipelineError::MissingConfig(format!("{} not configured", missing.join(", "))).into());
    }

    let request = SyncRequest::from_body(&body)?;
    let mode = SyncMode::parse(request.sync_mode.as_deref())?;

    let report = state.reconciler.reconcile(request.owner(), mode).await?;
    let result = SyncResult::from(report);

    let message = format!(
        "Sync finished: {} added, {} updated, {} skipped, {} errors",
        result.summary.added, result.summary.updated, result.summary.skipped, result.summary.errors
    );

    Ok(Json(json!({
        "success": true,
        "message": message,
        "syncResult": result,
    })))
}

/// Body of `POST /domains/add` and `POST /domains/remove`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntryRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
}

impl DomainEntryRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(body)
            .map_err(|e| PipelineError::Validation(format!("invalid JSON body: {e}")))
    }

    pub fn domain(&self) -> Result<&str, PipelineError> {
        self.domain
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| PipelineError::Validation("domain is required".into()))
    }

    pub fn owner(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[tracing::instrument(name = "domain_add", skip_all)]
pub async fn add_domain_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = DomainEntryRequest::from_body(&body)?;
    let entry = state
        .reconciler
        .add_domain(request.owner(), request.domain()?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Domain {} added", entry.domain),
        "result": entry,
    })))
}

#[tracing::instrument(name = "domain_remove", skip_all)]
pub async fn remove_domain_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = DomainEntryRequest::from_body(&body)?;
    let entry = state
        .reconciler
        .remove_domain(request.owner(), request.domain()?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Domain {} removed", entry.domain),
        "result": entry,
    })))
}

/// Read-only listing of the provider's domains for the configured site.
pub async fn list_domains_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let inventory = state.reconciler.remote_inventory().await?;
    let domains = inventory.names();

    Ok(Json(json!({
        "success": true,
        "siteInfo": inventory.site,
        "count": domains.len(),
        "domains": domains,
    })))
}

/// CORS preflight without the `Origin` handshake still gets an empty 200.
pub async fn sync_preflight_handler() -> StatusCode {
    StatusCode::OK
}
