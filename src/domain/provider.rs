use {
    super::error::PipelineError,
    super::id::SubscriptionId,
    super::site_domain::{RemoteSite, SitePatch},
    super::subscription::FetchedSubscription,
    std::{future::Future, pin::Pin},
};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

/// Payment provider: full subscription object by id.
pub trait SubscriptionProvider: Send + Sync {
    fn fetch_subscription<'a>(
        &'a self,
        id: &'a SubscriptionId,
    ) -> ProviderFuture<'a, FetchedSubscription>;
}

/// Domain host: the site descriptor with its primary domain and aliases.
pub trait DomainProvider: Send + Sync {
    fn fetch_site<'a>(&'a self, site_id: &'a str) -> ProviderFuture<'a, RemoteSite>;

    /// Applies `patch` and returns the site as it stands afterwards.
    fn update_site<'a>(&'a self, site_id: &'a str, patch: &'a SitePatch) -> ProviderFuture<'a, RemoteSite>;
}
