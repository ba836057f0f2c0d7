use {
    super::inventory::{fetch_local_inventory, fetch_remote_inventory},
    crate::domain::{
        error::PipelineError,
        provider::DomainProvider,
        reconcile::{Decision, ReconciliationOutcome, SyncMode, SyncReport, classify},
        repository::DomainStore,
        site_domain::{
            DomainChange, DomainEntry, DomainRecord, NewDomainRecord, RemoteInventory, RemoteSite,
            SyncUpdate, normalize_domain, plan_addition, plan_removal,
        },
    },
    std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex, PoisonError},
    },
    uuid::Uuid,
};

const ALL_OWNERS: &str = "*";

/// Diffs the provider's domain list against the local mirror and applies the
/// corrective writes. Additive only: local rows missing remotely are left alone.
/// Rows are deleted only through an explicit [`Reconciler::remove_domain`].
pub struct Reconciler {
    store: Arc<dyn DomainStore>,
    provider: Option<Arc<dyn DomainProvider>>,
    site_id: Option<String>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks one owner's pass as running until dropped.
struct PassGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DomainStore>,
        provider: Option<Arc<dyn DomainProvider>>,
        site_id: Option<String>,
    ) -> Self {
        Self {
            store,
            provider,
            site_id,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Configuration keys that must be set before a pass can run.
    pub fn missing_config(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.site_id.as_deref().is_none_or(str::is_empty) {
            missing.push("NETLIFY_SITE_ID");
        }
        if self.provider.is_none() {
            missing.push("NETLIFY_ACCESS_TOKEN");
        }
        missing
    }

    fn require(&self) -> Result<(&dyn DomainProvider, &str), PipelineError> {
        match (self.provider.as_deref(), self.site_id.as_deref()) {
            (Some(provider), Some(site_id)) if !site_id.is_empty() => Ok((provider, site_id)),
            _ => Err(PipelineError::MissingConfig(format!(
                "{} not configured",
                self.missing_config().join(", ")
            ))),
        }
    }

    fn enter(&self, key: &str) -> Result<PassGuard<'_>, PipelineError> {
        let mut running = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(key.to_string()) {
            return Err(PipelineError::ReconcileInFlight(key.to_string()));
        }
        Ok(PassGuard {
            running: &self.in_flight,
            key: key.to_string(),
        })
    }

    pub async fn remote_inventory(&self) -> Result<RemoteInventory, PipelineError> {
        let (provider, site_id) = self.require()?;
        fetch_remote_inventory(provider, site_id).await
    }

    #[tracing::instrument(name = "reconcile", skip(self, owner), fields(owner = owner.unwrap_or(ALL_OWNERS)))]
    pub async fn reconcile(
        &self,
        owner: Option<&str>,
        mode: SyncMode,
    ) -> Result<SyncReport, PipelineError> {
        let (provider, site_id) = self.require()?;
        let _pass = self.enter(owner.unwrap_or(ALL_OWNERS))?;

        let remote = fetch_remote_inventory(provider, site_id).await?;
        let local = fetch_local_inventory(self.store.as_ref(), owner).await?;

        // Stored names may carry the decorations users typed; match on the canonical form.
        let by_name: HashMap<String, &DomainRecord> = local
            .iter()
            .filter_map(|row| normalize_domain(&row.name).map(|name| (name, row)))
            .collect();

        let mut report = SyncReport::new(mode, remote.site.clone(), remote.names(), local.len());

        for domain in &remote.domains {
            let local_row = by_name.get(&domain.name).copied();
            let outcome = match classify(domain, local_row, owner) {
                Decision::Skip(reason) => ReconciliationOutcome::Skipped {
                    reason: reason.to_string(),
                },
                Decision::Update(_) if mode == SyncMode::DryRun => ReconciliationOutcome::Updated,
                Decision::Insert(_) if mode == SyncMode::DryRun => ReconciliationOutcome::Added,
                Decision::Update(update) => match self.store.mark_synced(&update).await {
                    Ok(()) => ReconciliationOutcome::Updated,
                    Err(e) => {
                        tracing::warn!(domain = %domain.name, error = %e, "domain update failed");
                        ReconciliationOutcome::Errored {
                            reason: e.to_string(),
                        }
                    }
                },
                Decision::Insert(record) => match self.store.insert_domain(&record).await {
                    Ok(()) => ReconciliationOutcome::Added,
                    Err(e) => {
                        tracing::warn!(domain = %domain.name, error = %e, "domain insert failed");
                        ReconciliationOutcome::Errored {
                            reason: e.to_string(),
                        }
                    }
                },
            };
            report.record(domain.name.clone(), outcome);
        }

        let s = report.summary;
        tracing::info!(
            mode = report.mode,
            total = s.total,
            added = s.added,
            updated = s.updated,
            skipped = s.skipped,
            errors = s.errors,
            "reconciliation finished"
        );

        Ok(report)
    }

    /// Puts `raw` on the site (primary for a bare apex when none is set, alias
    /// otherwise) and upserts the owner's local row as synced.
    #[tracing::instrument(name = "domain_add", skip(self, owner), fields(owner = owner.unwrap_or(ALL_OWNERS)))]
    pub async fn add_domain(&self, owner: Option<&str>, raw: &str) -> Result<DomainEntry, PipelineError> {
        let name = parse_name(raw)?;
        let (provider, site_id) = self.require()?;
        let _pass = self.enter(owner.unwrap_or(ALL_OWNERS))?;

        let site = provider.fetch_site(site_id).await?;
        let (change, patch) = plan_addition(&site, &name);
        let site = match patch {
            Some(patch) => provider.update_site(site_id, &patch).await?,
            None => site,
        };
        tracing::info!(domain = %name, ?change, "site domains updated");

        let is_custom_domain = site.is_primary(&name);
        let local = self.store.list_domains(owner).await?;
        let existing = local
            .iter()
            .find(|row| row.owner_id.as_deref() == owner && is_named(row, &name));

        let written = match existing {
            Some(row) if row.is_synced() && row.is_custom_domain == is_custom_domain => 0,
            Some(row) => {
                self.store
                    .mark_synced(&SyncUpdate {
                        id: row.id,
                        name: row.name.clone(),
                        site_id: site_id.to_string(),
                        is_custom_domain,
                    })
                    .await?;
                1
            }
            None => {
                self.store
                    .insert_domain(&NewDomainRecord {
                        id: Uuid::now_v7(),
                        name: name.clone(),
                        owner_id: owner.map(str::to_string),
                        site_id: site_id.to_string(),
                        is_custom_domain,
                    })
                    .await?;
                1
            }
        };

        Ok(entry(name, change, site, written))
    }

    /// Drops `raw` from the site's aliases and deletes the matching local rows,
    /// every owner's when `owner` is `None`. Rows are deleted even when the
    /// site no longer lists the domain.
    #[tracing::instrument(name = "domain_remove", skip(self, owner), fields(owner = owner.unwrap_or(ALL_OWNERS)))]
    pub async fn remove_domain(&self, owner: Option<&str>, raw: &str) -> Result<DomainEntry, PipelineError> {
        let name = parse_name(raw)?;
        let (provider, site_id) = self.require()?;
        let _pass = self.enter(owner.unwrap_or(ALL_OWNERS))?;

        let site = provider.fetch_site(site_id).await?;
        let (change, patch) = plan_removal(&site, &name)?;
        let site = match patch {
            Some(patch) => provider.update_site(site_id, &patch).await?,
            None => site,
        };

        let local = self.store.list_domains(owner).await?;
        let mut deleted = 0;
        for row in local.iter().filter(|row| is_named(row, &name)) {
            if self.store.delete_domain(row.id).await? {
                deleted += 1;
            }
        }
        tracing::info!(domain = %name, ?change, deleted, "domain removed");

        Ok(entry(name, change, site, deleted))
    }
}

fn parse_name(raw: &str) -> Result<String, PipelineError> {
    normalize_domain(raw)
        .filter(|name| name.contains('.') && !name.contains(|c: char| c.is_whitespace() || c == '/'))
        .ok_or_else(|| PipelineError::Validation(format!("invalid domain {raw:?}")))
}

fn is_named(row: &DomainRecord, name: &str) -> bool {
    normalize_domain(&row.name).as_deref() == Some(name)
}

fn entry(domain: String, change: DomainChange, site: RemoteSite, local_rows: usize) -> DomainEntry {
    DomainEntry {
        domain,
        change,
        custom_domain: site.custom_domain,
        aliases: site.domain_aliases.unwrap_or_default(),
        local_rows,
    }
}
