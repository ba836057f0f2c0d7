use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PipelineError;

/// Stripe event identifier (`evt_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(PipelineError::Validation(format!(
                "EventId must start with evt_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checkout session identifier (`cs_xxx`). Unique per order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !id.starts_with("cs_") {
            return Err(PipelineError::Validation(format!(
                "SessionId must start with cs_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Subscription identifier (`sub_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !id.starts_with("sub_") {
            return Err(PipelineError::Validation(format!(
                "SubscriptionId must start with sub_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Local account (profile) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

/// Lowercased, trimmed e-mail used as the lookup key for accounts and subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(raw: &str) -> Result<Self, PipelineError> {
        let email = raw.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, host)) if !local.is_empty() && !host.is_empty() => Ok(Self(email)),
            _ => Err(PipelineError::Validation(format!("invalid email: {raw}"))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
