use {
    super::{
        dispatcher::{self, Route, SubscriptionActivation, SubscriptionCancellation},
        fulfillment::{self, PlannedStep},
    },
    crate::domain::{
        error::PipelineError,
        event::PaymentEvent,
        fulfillment::{EventClaim, EventStatus, FulfillmentReport, MAX_ATTEMPTS},
        id::{EventId, Email},
        provider::SubscriptionProvider,
        repository::{BillingStore, EventLog},
    },
    chrono::{Duration, Utc},
    std::sync::Arc,
};

#[derive(Debug)]
pub enum ProcessResult {
    /// Event type this service does not handle. Nothing recorded.
    Ignored,
    /// Handled type that needed no work (e.g. subscription checkout).
    Acknowledged(&'static str),
    /// Payload could not be turned into work; acknowledged so the provider stops retrying.
    InvalidData(String),
    /// Event already fully processed.
    Duplicate,
    /// Another delivery of this event is being processed right now.
    InFlight,
    Fulfilled(FulfillmentReport),
}

impl ProcessResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Acknowledged(_) => "acknowledged",
            Self::InvalidData(_) => "ignored_invalid_data",
            Self::Duplicate => "duplicate",
            Self::InFlight => "in_flight",
            Self::Fulfilled(r) if r.is_partial() => "partial",
            Self::Fulfilled(_) => "fulfilled",
        }
    }
}

/// Verified event → route → claim → plan → execute.
pub struct PaymentPipeline {
    events: Arc<dyn EventLog>,
    billing: Arc<dyn BillingStore>,
    subscriptions: Option<Arc<dyn SubscriptionProvider>>,
}

impl PaymentPipeline {
    pub fn new(
        events: Arc<dyn EventLog>,
        billing: Arc<dyn BillingStore>,
        subscriptions: Option<Arc<dyn SubscriptionProvider>>,
    ) -> Self {
        Self {
            events,
            billing,
            subscriptions,
        }
    }

    pub async fn process(&self, event: &PaymentEvent) -> Result<ProcessResult, PipelineError> {
        let route = match dispatcher::route(event) {
            Ok(route) => route,
            Err(PipelineError::Validation(msg)) => {
                tracing::warn!(event_id = %event.id, "skipping invalid event data: {msg}");
                return Ok(ProcessResult::InvalidData(msg));
            }
            Err(e) => return Err(e),
        };

        match route {
            Route::Ignore => return Ok(ProcessResult::Ignored),
            Route::Acknowledge(reason) => return Ok(ProcessResult::Acknowledged(reason)),
            _ => {}
        }

        let (completed, attempt) = match self.events.claim(event).await? {
            EventClaim::AlreadyCompleted => return Ok(ProcessResult::Duplicate),
            EventClaim::InFlight => return Ok(ProcessResult::InFlight),
            EventClaim::Claimed {
                completed_steps,
                attempt,
            } => (completed_steps, attempt),
        };
        tracing::debug!(
            event_id = %event.id,
            kind = %event.kind,
            livemode = event.livemode,
            created = event.created,
            attempt,
            resumed_steps = completed.len(),
            "event claimed"
        );

        // Nothing is written until the plan exists; a failure here releases the claim.
        let plan = match self.plan(&event.id, route).await {
            Ok(plan) => plan,
            Err(PipelineError::Validation(msg)) => {
                tracing::warn!(event_id = %event.id, "cannot plan fulfillment: {msg}");
                self.release(&event.id, EventStatus::Completed).await;
                return Ok(ProcessResult::InvalidData(msg));
            }
            Err(e) => {
                self.release(&event.id, EventStatus::Failed).await;
                return Err(e);
            }
        };

        let report = fulfillment::execute(
            self.events.as_ref(),
            self.billing.as_ref(),
            &event.id,
            plan,
            &completed,
        )
        .await;

        let mut status = report.final_status();
        if report.is_partial() {
            let failed: Vec<_> = report.failed_steps().map(|s| s.step.as_str()).collect();
            if attempt >= MAX_ATTEMPTS {
                tracing::error!(
                    event_id = %event.id,
                    attempt,
                    ?failed,
                    "event still partial after max attempts, parking as failed"
                );
                status = EventStatus::Failed;
            } else {
                tracing::warn!(event_id = %event.id, attempt, ?failed, "event partially fulfilled, queued for repair");
            }
        }

        if let Err(e) = self.events.finish(&event.id, status).await {
            tracing::error!(event_id = %event.id, error = %e, "failed to record event status");
        }

        Ok(ProcessResult::Fulfilled(report))
    }

    async fn release(&self, event_id: &EventId, status: EventStatus) {
        if let Err(e) = self.events.finish(event_id, status).await {
            tracing::error!(%event_id, error = %e, "failed to release event claim");
        }
    }

    async fn plan(&self, event_id: &EventId, route: Route) -> Result<Vec<PlannedStep>, PipelineError> {
        match route {
            Route::Purchase(purchase) => {
                let account = if purchase.guest {
                    None
                } else {
                    self.billing.find_account_by_email(&purchase.email).await?
                };
                fulfillment::plan_purchase(event_id, &purchase, account)
            }
            Route::Activate(activation) => self.plan_activation(activation).await,
            Route::Cancel(cancellation) => self.plan_cancellation(cancellation).await,
            Route::Ignore | Route::Acknowledge(_) => Ok(Vec::new()),
        }
    }

    async fn plan_activation(
        &self,
        activation: SubscriptionActivation,
    ) -> Result<Vec<PlannedStep>, PipelineError> {
        let provider = self.subscriptions.as_ref().ok_or_else(|| {
            PipelineError::MissingConfig("STRIPE_SECRET_KEY is not set".into())
        })?;
        let subscription = provider.fetch_subscription(&activation.subscription_id).await?;

        let email = activation
            .invoice_email
            .as_deref()
            .or(subscription.email.as_deref())
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "no email for subscription {}",
                    subscription.id
                ))
            })
            .and_then(Email::new)?;

        let account = if subscription.guest {
            None
        } else {
            self.billing.find_account_by_email(&email).await?
        };

        Ok(fulfillment::plan_activation(&subscription, &email, account))
    }

    async fn plan_cancellation(
        &self,
        cancellation: SubscriptionCancellation,
    ) -> Result<Vec<PlannedStep>, PipelineError> {
        let account = match self
            .billing
            .subscriber_email(&cancellation.subscription_id)
            .await?
        {
            Some(email) => self.billing.find_account_by_email(&email).await?,
            None => None,
        };
        Ok(fulfillment::plan_cancellation(
            &cancellation.subscription_id,
            account,
        ))
    }

    /// Re-run events left partial by an earlier attempt. Returns how many were retried.
    pub async fn repair_once(&self, limit: i64) -> Result<usize, PipelineError> {
        let events = self.events.repairable(limit).await?;
        let count = events.len();

        for event in events {
            match self.process(&event).await {
                Ok(result) => {
                    tracing::info!(event_id = %event.id, result = result.label(), "repair pass")
                }
                Err(e) => tracing::error!(event_id = %event.id, error = %e, "repair pass failed"),
            }
        }

        Ok(count)
    }

    /// Expire completed dedup rows older than `retention`.
    pub async fn purge_completed(&self, retention: Duration) -> Result<u64, PipelineError> {
        self.events.purge_completed(Utc::now() - retention).await
    }
}
