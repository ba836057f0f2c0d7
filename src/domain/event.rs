use {
    super::error::PipelineError,
    super::id::EventId,
    chrono::{DateTime, Utc},
    derive_more::Display,
    serde::{Deserialize, de::DeserializeOwned},
    std::collections::HashMap,
};

/// Event types this service reacts to. Everything else is acknowledged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EventKind {
    #[display("checkout-completed")]
    CheckoutCompleted,
    #[display("invoice-paid")]
    InvoicePaid,
    #[display("subscription-canceled")]
    SubscriptionCanceled,
    #[display("unknown")]
    Unknown,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "invoice.paid" | "invoice.payment_succeeded" => Self::InvoicePaid,
            "customer.subscription.deleted" => Self::SubscriptionCanceled,
            _ => Self::Unknown,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// An immutable, verified notification from the payment provider.
/// The same `id` may arrive more than once.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub id: EventId,
    pub event_type: String,
    pub kind: EventKind,
    pub created: i64,
    pub livemode: bool,
    pub object: serde_json::Value,
    /// Whole event as delivered, kept for repair runs.
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, PipelineError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| PipelineError::Validation(format!("malformed event body: {e}")))?;
        Self::from_payload(payload)
    }

    pub fn from_payload(payload: serde_json::Value) -> Result<Self, PipelineError> {
        let raw: RawEvent = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::Validation(format!("malformed event: {e}")))?;

        Ok(Self {
            id: EventId::new(raw.id)?,
            kind: EventKind::from_type(&raw.event_type),
            event_type: raw.event_type,
            created: raw.created,
            livemode: raw.livemode,
            object: raw.data.object,
            payload,
            received_at: Utc::now(),
        })
    }

    /// Decode `data.object` into one of the provider object projections.
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_json::from_value(self.object.clone()).map_err(|e| {
            PipelineError::Validation(format!("unexpected {} object: {e}", self.event_type))
        })
    }
}

/// Either a bare id or an expanded object carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpandableId {
    Id(String),
    Object { id: String },
}

impl ExpandableId {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

pub type Metadata = HashMap<String, String>;

pub fn metadata_flag(metadata: &Metadata, keys: &[&str]) -> bool {
    keys.iter().any(|k| {
        metadata
            .get(*k)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    })
}

pub fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl CheckoutSession {
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone().unwrap_or_default()
    }

    /// Buyer e-mail, preferring what the provider collected at checkout.
    pub fn buyer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| metadata_str(m, "email"))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSubscriptionDetails {
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
    #[serde(default)]
    pub parent: Option<InvoiceParent>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
}

impl Invoice {
    /// Subscription reference, from the legacy top-level field or the newer `parent` block.
    pub fn subscription_ref(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|p| p.subscription_details.as_ref())
                    .and_then(|d| d.subscription.as_ref())
            })
            .map(ExpandableId::id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}
