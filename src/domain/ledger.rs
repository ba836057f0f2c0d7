use {
    super::error::PipelineError,
    super::id::{AccountId, EventId},
};

/// One increment of an account's credit balance.
///
/// `source_event` is the idempotency key: a store applies a given grant at
/// most once, no matter how often the event is redelivered.
#[derive(Debug, Clone)]
pub struct CreditGrant {
    account: AccountId,
    delta: i64,
    source_event: EventId,
    order_ref: Option<String>,
    description: String,
}

impl CreditGrant {
    pub fn new(
        account: AccountId,
        delta: i64,
        source_event: EventId,
        order_ref: Option<String>,
        description: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        if delta <= 0 {
            return Err(PipelineError::Validation(format!(
                "credit grant must be positive, got: {delta}"
            )));
        }
        Ok(Self {
            account,
            delta,
            source_event,
            order_ref,
            description: description.into(),
        })
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    pub fn source_event(&self) -> &EventId {
        &self.source_event
    }

    pub fn order_ref(&self) -> Option<&str> {
        self.order_ref.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Balance incremented; carries the new total.
    Applied { balance: i64 },
    /// This source event was already credited.
    AlreadyApplied,
}
