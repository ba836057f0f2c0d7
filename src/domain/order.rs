use {
    super::error::PipelineError,
    super::id::{AccountId, Email, SessionId},
    super::money::Money,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Map the checkout `payment_status`. Only a paid session completes an order.
    pub fn from_payment_status(payment_status: Option<&str>) -> Self {
        match payment_status {
            Some("paid") => Self::Completed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Append-only purchase record, one per checkout session.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub session_id: SessionId,
    pub email: Email,
    pub account: Option<AccountId>,
    pub money: Money,
    pub status: OrderStatus,
    pub credits: i64,
    pub guest: bool,
    pub product_name: String,
}
