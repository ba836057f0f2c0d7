//! Persistence seams. The Postgres implementations live in `infra::postgres`;
//! every method is a single store round-trip (or one transaction) so the
//! services above can treat each call as one independently failing write.

use {
    super::error::PipelineError,
    super::event::PaymentEvent,
    super::fulfillment::{EventClaim, EventStatus, FulfillmentStep},
    super::id::{AccountId, Email, EventId, SubscriptionId},
    super::ledger::{CreditGrant, GrantOutcome},
    super::order::NewOrder,
    super::site_domain::{DomainRecord, NewDomainRecord, SyncUpdate},
    super::subscription::{AccountTier, PremiumFlag, SubscriberUpsert},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

/// Dedup table for provider events plus per-step completion tracking.
pub trait EventLog: Send + Sync {
    fn claim<'a>(&'a self, event: &'a PaymentEvent) -> StoreFuture<'a, EventClaim>;

    fn complete_step<'a>(
        &'a self,
        event_id: &'a EventId,
        step: FulfillmentStep,
    ) -> StoreFuture<'a, ()>;

    fn record_step_failure<'a>(
        &'a self,
        event_id: &'a EventId,
        step: FulfillmentStep,
        error: &'a str,
    ) -> StoreFuture<'a, ()>;

    fn finish<'a>(&'a self, event_id: &'a EventId, status: EventStatus) -> StoreFuture<'a, ()>;

    /// Events left `partial` whose retry delay (see `retry_delay`) has elapsed,
    /// or stuck `processing` past their lease, oldest first.
    fn repairable<'a>(&'a self, limit: i64) -> StoreFuture<'a, Vec<PaymentEvent>>;

    /// Drop `completed` rows older than the cutoff. Returns rows removed.
    fn purge_completed<'a>(&'a self, older_than: DateTime<Utc>) -> StoreFuture<'a, u64>;
}

/// Orders, credit ledger, subscribers and profile tier.
pub trait BillingStore: Send + Sync {
    /// Insert once per checkout session. `false` if the session was already recorded.
    fn insert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, bool>;

    fn find_account_by_email<'a>(&'a self, email: &'a Email) -> StoreFuture<'a, Option<AccountId>>;

    /// Atomic increment, applied at most once per source event.
    fn add_credits<'a>(&'a self, grant: &'a CreditGrant) -> StoreFuture<'a, GrantOutcome>;

    fn credit_balance<'a>(&'a self, account: AccountId) -> StoreFuture<'a, i64>;

    fn upsert_subscriber<'a>(&'a self, subscriber: &'a SubscriberUpsert) -> StoreFuture<'a, ()>;

    fn subscriber_email<'a>(
        &'a self,
        subscription_id: &'a SubscriptionId,
    ) -> StoreFuture<'a, Option<Email>>;

    /// Flip the subscriber row to canceled in place. `false` if no row matched.
    fn cancel_subscription<'a>(
        &'a self,
        subscription_id: &'a SubscriptionId,
    ) -> StoreFuture<'a, bool>;

    fn set_account_tier<'a>(
        &'a self,
        account: AccountId,
        tier: &'a AccountTier,
    ) -> StoreFuture<'a, ()>;

    fn set_premium_flag<'a>(&'a self, flag: &'a PremiumFlag) -> StoreFuture<'a, ()>;
}

/// Local mirror of the provider's domains.
pub trait DomainStore: Send + Sync {
    fn list_domains<'a>(&'a self, owner: Option<&'a str>) -> StoreFuture<'a, Vec<DomainRecord>>;

    fn insert_domain<'a>(&'a self, record: &'a NewDomainRecord) -> StoreFuture<'a, ()>;

    fn mark_synced<'a>(&'a self, update: &'a SyncUpdate) -> StoreFuture<'a, ()>;

    /// Removes one row. `false` when it was already gone.
    fn delete_domain<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool>;
}
