use crate::domain::{
    error::PipelineError,
    provider::DomainProvider,
    repository::DomainStore,
    site_domain::{DomainRecord, RemoteInventory},
};

/// Domains the provider currently serves for `site_id`, deduplicated and sorted.
pub async fn fetch_remote_inventory(
    provider: &dyn DomainProvider,
    site_id: &str,
) -> Result<RemoteInventory, PipelineError> {
    let site = provider.fetch_site(site_id).await?;
    let inventory = RemoteInventory::from_site(site);
    tracing::debug!(
        site_id = %inventory.site.id,
        count = inventory.domains.len(),
        "fetched remote inventory"
    );
    Ok(inventory)
}

/// Local mirror rows, optionally limited to one owner.
pub async fn fetch_local_inventory(
    store: &dyn DomainStore,
    owner: Option<&str>,
) -> Result<Vec<DomainRecord>, PipelineError> {
    store.list_domains(owner).await
}
