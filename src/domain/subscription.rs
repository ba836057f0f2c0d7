use {
    super::error::PipelineError,
    super::id::{AccountId, Email, SubscriptionId},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::Canceled => "canceled",
        }
    }

    /// Whether an account holding a subscription in this state gets premium access.
    pub fn grants_premium(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SubscriptionStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "unpaid" => Ok(Self::Unpaid),
            "incomplete" => Ok(Self::Incomplete),
            "canceled" => Ok(Self::Canceled),
            other => Err(PipelineError::Validation(format!(
                "unknown subscription status: {other}"
            ))),
        }
    }
}

pub const DEFAULT_TIER: &str = "premium";

/// Subscription as reported by the provider API.
#[derive(Debug, Clone)]
pub struct FetchedSubscription {
    pub id: SubscriptionId,
    pub customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub tier: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub guest: bool,
}

/// Subscriber row write, keyed by e-mail (conflict → merge).
#[derive(Debug, Clone)]
pub struct SubscriberUpsert {
    pub email: Email,
    pub account: Option<AccountId>,
    pub customer_id: Option<String>,
    pub subscription_id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub tier: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub guest: bool,
}

/// Profile-level role and tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountTier {
    Premium {
        tier: String,
        status: SubscriptionStatus,
    },
    Default,
}

impl AccountTier {
    pub fn role(&self) -> &'static str {
        match self {
            Self::Premium { .. } => "premium",
            Self::Default => "user",
        }
    }

    pub fn tier(&self) -> Option<&str> {
        match self {
            Self::Premium { tier, .. } => Some(tier),
            Self::Default => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Premium { status, .. } => status.as_str(),
            Self::Default => SubscriptionStatus::Canceled.as_str(),
        }
    }
}

/// Premium flag kept next to the profile.
#[derive(Debug, Clone)]
pub struct PremiumFlag {
    pub account: AccountId,
    pub active: bool,
    pub plan: String,
    pub subscription_id: Option<SubscriptionId>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}
