use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeSet, fmt},
    uuid::Uuid,
};

/// Canonical form of a domain name: trimmed, lowercased, without scheme,
/// leading `www.` or trailing slash. Returns `None` when nothing is left.
/// Stacked decorations (`https://www.https://x/`) are stripped until none remain.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let mut name = lower.as_str();
    loop {
        let before = name.len();
        name = name.trim();
        for prefix in ["https://", "http://", "www."] {
            name = name.strip_prefix(prefix).unwrap_or(name);
        }
        name = name.trim_end_matches('/');
        if name.len() == before {
            break;
        }
    }
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Pending,
    Verified,
    Error,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Error => "error",
        }
    }

    /// Lenient read of stored values; rows written by older tooling use other words.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "verified" | "active" => Self::Verified,
            "error" | "failed" | "expired" => Self::Error,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local mirror row for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRecord {
    pub id: Uuid,
    pub name: String,
    pub status: DomainStatus,
    pub remote_verified: bool,
    pub remote_site_id: Option<String>,
    pub owner_id: Option<String>,
    pub dns_verified: bool,
    pub ssl_enabled: bool,
    pub is_custom_domain: bool,
}

impl DomainRecord {
    /// Local row already reflects that the provider serves this domain.
    pub fn is_synced(&self) -> bool {
        self.remote_verified
            && self.status == DomainStatus::Verified
            && self.remote_site_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Raw site descriptor as the domain provider returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSite {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ssl_url: Option<String>,
    #[serde(default)]
    pub custom_domain: Option<String>,
    #[serde(default)]
    pub domain_aliases: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub id: String,
    pub url: Option<String>,
    pub custom_domain: Option<String>,
}

/// The provider's view of one domain; lives only for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDomain {
    pub name: String,
    pub site_id: String,
    pub is_custom_domain: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteInventory {
    pub site: SiteInfo,
    pub domains: Vec<RemoteDomain>,
}

impl RemoteInventory {
    /// Primary domain plus aliases, normalized, deduplicated and sorted.
    pub fn from_site(site: RemoteSite) -> Self {
        let custom = site.custom_domain.as_deref().and_then(normalize_domain);
        let names: BTreeSet<String> = custom
            .iter()
            .cloned()
            .chain(
                site.domain_aliases
                    .iter()
                    .flatten()
                    .filter_map(|a| normalize_domain(a)),
            )
            .collect();

        let domains = names
            .into_iter()
            .map(|name| RemoteDomain {
                is_custom_domain: custom.as_deref() == Some(name.as_str()),
                site_id: site.id.clone(),
                name,
            })
            .collect();

        Self {
            site: SiteInfo {
                id: site.id,
                url: site.ssl_url.or(site.url),
                custom_domain: custom,
            },
            domains,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDomainRecord {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Option<String>,
    pub site_id: String,
    pub is_custom_domain: bool,
}

/// Corrective write for a stale local row: verified, remote-verified, site id set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUpdate {
    pub id: Uuid,
    pub name: String,
    pub site_id: String,
    pub is_custom_domain: bool,
}

/// Site fields to change; unset fields are left as the provider has them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SitePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_aliases: Option<Vec<String>>,
}

/// What a manual add or remove did to the provider's site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainChange {
    SetPrimary,
    AddedAlias,
    AlreadyPresent,
    RemovedAlias,
    NotOnSite,
}

/// Registrable apex such as `example.com`, as opposed to a subdomain.
pub fn is_apex(name: &str) -> bool {
    name.split('.').count() == 2
}

impl RemoteSite {
    fn primary(&self) -> Option<String> {
        self.custom_domain.as_deref().and_then(normalize_domain)
    }

    fn has_alias(&self, name: &str) -> bool {
        self.domain_aliases
            .iter()
            .flatten()
            .any(|a| normalize_domain(a).as_deref() == Some(name))
    }

    pub fn serves(&self, name: &str) -> bool {
        self.primary().as_deref() == Some(name) || self.has_alias(name)
    }

    pub fn is_primary(&self, name: &str) -> bool {
        self.primary().as_deref() == Some(name)
    }
}

/// Site update that makes `name` (already normalized) one of the site's domains.
/// An apex becomes the primary domain when the site has none; anything else is
/// appended to the aliases.
pub fn plan_addition(site: &RemoteSite, name: &str) -> (DomainChange, Option<SitePatch>) {
    if site.serves(name) {
        return (DomainChange::AlreadyPresent, None);
    }
    if is_apex(name) && site.primary().is_none() {
        let patch = SitePatch {
            custom_domain: Some(name.to_string()),
            ..SitePatch::default()
        };
        return (DomainChange::SetPrimary, Some(patch));
    }
    let mut aliases = site.domain_aliases.clone().unwrap_or_default();
    aliases.push(name.to_string());
    let patch = SitePatch {
        domain_aliases: Some(aliases),
        ..SitePatch::default()
    };
    (DomainChange::AddedAlias, Some(patch))
}

/// Site update that drops `name` from the aliases. The primary domain is
/// changed through the provider's own dashboard, never from here.
pub fn plan_removal(site: &RemoteSite, name: &str) -> Result<(DomainChange, Option<SitePatch>), PipelineError> {
    if site.is_primary(name) {
        return Err(PipelineError::Validation(format!(
            "{name} is the site's primary domain"
        )));
    }
    if !site.has_alias(name) {
        return Ok((DomainChange::NotOnSite, None));
    }
    let aliases = site
        .domain_aliases
        .iter()
        .flatten()
        .filter(|a| normalize_domain(a).as_deref() != Some(name))
        .cloned()
        .collect();
    let patch = SitePatch {
        domain_aliases: Some(aliases),
        ..SitePatch::default()
    };
    Ok((DomainChange::RemovedAlias, Some(patch)))
}

/// Result of a manual add or remove: the provider-side change, the site's
/// domains afterwards and how many local rows were written or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntry {
    pub domain: String,
    pub change: DomainChange,
    pub custom_domain: Option<String>,
    pub aliases: Vec<String>,
    pub local_rows: usize,
}
