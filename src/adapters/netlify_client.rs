use {
    crate::domain::{
        error::PipelineError,
        provider::{DomainProvider, ProviderFuture},
        site_domain::{RemoteSite, SitePatch},
    },
    reqwest::Client,
    std::time::Duration,
};

pub const NETLIFY_API_BASE: &str = "https://api.netlify.com/api/v1";

/// Netlify site API client: reads the site descriptor and patches its domains.
#[derive(Clone)]
pub struct NetlifyProvider {
    http: Client,
    base_url: String,
    token: String,
}

impl NetlifyProvider {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, PipelineError> {
        Self::with_base_url(NETLIFY_API_BASE, token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Provider(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn fetch_site_inner(&self, site_id: &str) -> Result<RemoteSite, PipelineError> {
        let url = format!("{}/sites/{site_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| map_transport_error(site_id, e))?;

        read_site(site_id, response).await
    }

    async fn update_site_inner(&self, site_id: &str, patch: &SitePatch) -> Result<RemoteSite, PipelineError> {
        let url = format!("{}/sites/{site_id}", self.base_url);
        tracing::debug!(site_id, ?patch, "patching Netlify site");
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await
            .map_err(|e| map_transport_error(site_id, e))?;

        read_site(site_id, response).await
    }
}

async fn read_site(site_id: &str, response: reqwest::Response) -> Result<RemoteSite, PipelineError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if body.to_lowercase().contains("owned by another account") {
            return Err(PipelineError::Validation(
                "domain is owned by another Netlify account".into(),
            ));
        }
        return Err(PipelineError::Provider(format!(
            "Netlify API {status} for site {site_id}: {body}"
        )));
    }

    response
        .json::<RemoteSite>()
        .await
        .map_err(|e| map_transport_error(site_id, e))
}

fn map_transport_error(site_id: &str, err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::Timeout(format!("Netlify site {site_id}"))
    } else {
        PipelineError::Provider(format!("Netlify site {site_id}: {err}"))
    }
}

impl DomainProvider for NetlifyProvider {
    fn fetch_site<'a>(&'a self, site_id: &'a str) -> ProviderFuture<'a, RemoteSite> {
        Box::pin(self.fetch_site_inner(site_id))
    }

    fn update_site<'a>(&'a self, site_id: &'a str, patch: &'a SitePatch) -> ProviderFuture<'a, RemoteSite> {
        Box::pin(self.update_site_inner(site_id, patch))
    }
}
