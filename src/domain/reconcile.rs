use {
    super::error::PipelineError,
    super::site_domain::{
        DomainRecord, NewDomainRecord, RemoteDomain, SiteInfo, SyncUpdate,
    },
    serde::Serialize,
    uuid::Uuid,
};

pub const ALREADY_SYNCED: &str = "already_synced";

/// Write required to bring one local row in line with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip(&'static str),
    Update(SyncUpdate),
    Insert(NewDomainRecord),
}

/// Classify one remote domain against its local row, if any.
pub fn classify(
    remote: &RemoteDomain,
    local: Option<&DomainRecord>,
    owner: Option<&str>,
) -> Decision {
    match local {
        Some(row) if row.is_synced() => Decision::Skip(ALREADY_SYNCED),
        Some(row) => Decision::Update(SyncUpdate {
            id: row.id,
            name: row.name.clone(),
            site_id: remote.site_id.clone(),
            is_custom_domain: remote.is_custom_domain,
        }),
        None => Decision::Insert(NewDomainRecord {
            id: Uuid::now_v7(),
            name: remote.name.clone(),
            owner_id: owner.map(str::to_string),
            site_id: remote.site_id.clone(),
            is_custom_domain: remote.is_custom_domain,
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    Added,
    Updated,
    Skipped { reason: String },
    Errored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainDecision {
    pub domain: String,
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Full,
    /// Classify only; nothing is written.
    DryRun,
}

impl SyncMode {
    pub fn parse(raw: Option<&str>) -> Result<Self, PipelineError> {
        match raw.map(str::trim) {
            None | Some("") | Some("full") => Ok(Self::Full),
            Some("dry_run") | Some("dry-run") => Ok(Self::DryRun),
            Some(other) => Err(PipelineError::Validation(format!(
                "unknown syncMode: {other}"
            ))),
        }
    }
}

/// Result of one reconciliation pass. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: &'static str,
    pub decisions: Vec<DomainDecision>,
    pub summary: SyncSummary,
    pub remote_domains: Vec<String>,
    pub local_count: usize,
    pub site: SiteInfo,
}

impl SyncReport {
    pub fn new(mode: SyncMode, site: SiteInfo, remote_domains: Vec<String>, local_count: usize) -> Self {
        Self {
            mode: match mode {
                SyncMode::Full => "full",
                SyncMode::DryRun => "dry_run",
            },
            decisions: Vec::new(),
            summary: SyncSummary::default(),
            remote_domains,
            local_count,
            site,
        }
    }

    pub fn record(&mut self, domain: impl Into<String>, outcome: ReconciliationOutcome) {
        self.summary.total += 1;
        match &outcome {
            ReconciliationOutcome::Added => self.summary.added += 1,
            ReconciliationOutcome::Updated => self.summary.updated += 1,
            ReconciliationOutcome::Skipped { .. } => self.summary.skipped += 1,
            ReconciliationOutcome::Errored { .. } => self.summary.errors += 1,
        }
        self.decisions.push(DomainDecision {
            domain: domain.into(),
            outcome,
        });
    }

    pub fn domains_with(&self, pred: impl Fn(&ReconciliationOutcome) -> bool) -> Vec<&DomainDecision> {
        self.decisions.iter().filter(|d| pred(&d.outcome)).collect()
    }
}
