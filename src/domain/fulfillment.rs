use {
    super::error::PipelineError,
    super::id::EventId,
    serde::Serialize,
    std::fmt,
};

/// A named, individually idempotent write performed while fulfilling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStep {
    RecordOrder,
    GrantCredits,
    UpsertSubscriber,
    PromoteAccount,
    SetPremiumFlag,
    CancelSubscription,
    ClearPremiumFlag,
    DowngradeAccount,
}

impl FulfillmentStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordOrder => "record_order",
            Self::GrantCredits => "grant_credits",
            Self::UpsertSubscriber => "upsert_subscriber",
            Self::PromoteAccount => "promote_account",
            Self::SetPremiumFlag => "set_premium_flag",
            Self::CancelSubscription => "cancel_subscription",
            Self::ClearPremiumFlag => "clear_premium_flag",
            Self::DowngradeAccount => "downgrade_account",
        }
    }
}

impl fmt::Display for FulfillmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for FulfillmentStep {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "record_order" => Ok(Self::RecordOrder),
            "grant_credits" => Ok(Self::GrantCredits),
            "upsert_subscriber" => Ok(Self::UpsertSubscriber),
            "promote_account" => Ok(Self::PromoteAccount),
            "set_premium_flag" => Ok(Self::SetPremiumFlag),
            "cancel_subscription" => Ok(Self::CancelSubscription),
            "clear_premium_flag" => Ok(Self::ClearPremiumFlag),
            "downgrade_account" => Ok(Self::DowngradeAccount),
            other => Err(PipelineError::Validation(format!(
                "unknown fulfillment step: {other}"
            ))),
        }
    }
}

/// Lifecycle of a row in the dedup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Processing,
    Completed,
    /// Some steps failed; eligible for repair.
    Partial,
    /// Failed before any step ran; the provider's retry re-claims it.
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for EventStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Validation(format!(
                "unknown event status: {other}"
            ))),
        }
    }
}

/// Attempts after which a still-partial event is parked as `failed` and left
/// to provider redelivery instead of the repair loop.
pub const MAX_ATTEMPTS: u32 = 8;

/// Delay before an event claimed `attempts` times is eligible for repair again: 2^attempts seconds.
pub fn retry_delay(attempts: u32) -> chrono::Duration {
    chrono::Duration::seconds(1 << attempts.min(16))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClaim {
    /// Caller owns the event; steps listed here already ran in an earlier attempt.
    /// `attempt` counts this claim, starting at 1.
    Claimed {
        completed_steps: Vec<FulfillmentStep>,
        attempt: u32,
    },
    AlreadyCompleted,
    /// Another delivery of the same event holds a live lease.
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    /// Completed in an earlier attempt, or the store reported it as already applied.
    AlreadyDone,
    NotApplicable(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: FulfillmentStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Per-step result of one fulfillment attempt. A mix of applied and failed
/// steps is a normal result, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentReport {
    pub event_id: EventId,
    pub steps: Vec<StepReport>,
}

impl FulfillmentReport {
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: FulfillmentStep, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn is_partial(&self) -> bool {
        self.failed_steps().next().is_some()
    }

    pub fn outcome_of(&self, step: FulfillmentStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| &s.outcome)
    }

    pub fn final_status(&self) -> EventStatus {
        if self.is_partial() {
            EventStatus::Partial
        } else {
            EventStatus::Completed
        }
    }
}
