use {
    crate::domain::{
        error::PipelineError,
        id::SubscriptionId,
        provider::{ProviderFuture, SubscriptionProvider},
        subscription::{DEFAULT_TIER, FetchedSubscription, SubscriptionStatus},
    },
    chrono::DateTime,
    serde_json::Value,
    std::time::Duration,
};

pub struct StripeProvider {
    client: stripe::Client,
    timeout: Duration,
}

impl StripeProvider {
    pub fn new(secret_key: &str, timeout: Duration) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
            timeout,
        }
    }
}

impl SubscriptionProvider for StripeProvider {
    fn fetch_subscription<'a>(
        &'a self,
        id: &'a SubscriptionId,
    ) -> ProviderFuture<'a, FetchedSubscription> {
        Box::pin(async move { self.fetch_subscription_inner(id).await })
    }
}

impl StripeProvider {
    async fn fetch_subscription_inner(
        &self,
        id: &SubscriptionId,
    ) -> Result<FetchedSubscription, PipelineError> {
        let sub_id = id
            .as_str()
            .parse::<stripe::SubscriptionId>()
            .map_err(|e| PipelineError::Provider(format!("invalid Subscription id: {e}")))?;

        let sub = tokio::time::timeout(
            self.timeout,
            stripe::Subscription::retrieve(&self.client, &sub_id, &["customer"]),
        )
        .await
        .map_err(|_| PipelineError::Timeout(format!("Stripe subscription {id}")))?
        .map_err(|e| PipelineError::Provider(format!("Stripe API: {e}")))?;

        let metadata = serde_json::to_value(&sub.metadata)?;
        let meta = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let (customer_id, customer_email) = match &sub.customer {
            stripe::Expandable::Id(id) => (id.to_string(), None),
            stripe::Expandable::Object(customer) => {
                (customer.id.to_string(), customer.email.clone())
            }
        };

        Ok(FetchedSubscription {
            id: id.clone(),
            customer_id: Some(customer_id),
            status: convert_subscription_status(sub.status),
            tier: meta("tier").unwrap_or(DEFAULT_TIER).to_string(),
            period_start: DateTime::from_timestamp(sub.current_period_start, 0),
            period_end: DateTime::from_timestamp(sub.current_period_end, 0),
            email: customer_email.or_else(|| meta("email").map(str::to_string)),
            guest: meta("isGuest").is_some_and(|v| v.eq_ignore_ascii_case("true"))
                || meta("guest_checkout").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        })
    }
}

pub fn convert_subscription_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    #[allow(unreachable_patterns)]
    match status {
        stripe::SubscriptionStatus::Active => SubscriptionStatus::Active,
        stripe::SubscriptionStatus::Trialing => SubscriptionStatus::Trialing,
        stripe::SubscriptionStatus::PastDue => SubscriptionStatus::PastDue,
        stripe::SubscriptionStatus::Unpaid | stripe::SubscriptionStatus::Paused => {
            SubscriptionStatus::Unpaid
        }
        stripe::SubscriptionStatus::Incomplete => SubscriptionStatus::Incomplete,
        stripe::SubscriptionStatus::Canceled | stripe::SubscriptionStatus::IncompleteExpired => {
            SubscriptionStatus::Canceled
        }
        other => {
            tracing::warn!("unknown SubscriptionStatus: {other:?}, defaulting to Incomplete");
            SubscriptionStatus::Incomplete
        }
    }
}
