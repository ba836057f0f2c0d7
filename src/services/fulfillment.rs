//! Fulfillment plans: each handled event becomes an ordered list of named
//! steps. Steps are executed independently; a failing step is logged and
//! recorded, and the remaining steps still run.

use {
    super::dispatcher::CheckoutPurchase,
    crate::domain::{
        error::PipelineError,
        fulfillment::{FulfillmentReport, FulfillmentStep, StepOutcome},
        id::{AccountId, Email, EventId, SubscriptionId},
        ledger::{CreditGrant, GrantOutcome},
        order::{NewOrder, OrderStatus},
        repository::{BillingStore, EventLog},
        subscription::{AccountTier, FetchedSubscription, PremiumFlag, SubscriberUpsert},
    },
    uuid::Uuid,
};

#[derive(Debug, Clone)]
pub enum Action {
    RecordOrder(NewOrder),
    GrantCredits(CreditGrant),
    UpsertSubscriber(SubscriberUpsert),
    SetTier(AccountId, AccountTier),
    SetPremiumFlag(PremiumFlag),
    CancelSubscription(SubscriptionId),
    NotApplicable(String),
}

#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub step: FulfillmentStep,
    pub action: Action,
}

impl PlannedStep {
    fn new(step: FulfillmentStep, action: Action) -> Self {
        Self { step, action }
    }

    fn skip(step: FulfillmentStep, reason: impl Into<String>) -> Self {
        Self::new(step, Action::NotApplicable(reason.into()))
    }
}

/// Order row plus, for identified buyers with a paid session, a credit grant.
pub fn plan_purchase(
    event_id: &EventId,
    purchase: &CheckoutPurchase,
    account: Option<AccountId>,
) -> Result<Vec<PlannedStep>, PipelineError> {
    let account = account.filter(|_| !purchase.guest);
    let order = NewOrder {
        id: Uuid::now_v7(),
        session_id: purchase.session_id.clone(),
        email: purchase.email.clone(),
        account,
        money: purchase.money.clone(),
        status: purchase.status,
        credits: purchase.credits.quantity,
        guest: purchase.guest,
        product_name: purchase.product_name.clone(),
    };

    let grant = if purchase.guest {
        PlannedStep::skip(FulfillmentStep::GrantCredits, "guest checkout")
    } else if purchase.status != OrderStatus::Completed {
        PlannedStep::skip(FulfillmentStep::GrantCredits, "payment not completed")
    } else if purchase.credits.quantity <= 0 {
        PlannedStep::skip(FulfillmentStep::GrantCredits, "no credit quantity")
    } else {
        match account {
            Some(account) => PlannedStep::new(
                FulfillmentStep::GrantCredits,
                Action::GrantCredits(CreditGrant::new(
                    account,
                    purchase.credits.quantity,
                    event_id.clone(),
                    Some(purchase.session_id.to_string()),
                    format!("Purchase: {}", purchase.product_name),
                )?),
            ),
            None => PlannedStep::skip(FulfillmentStep::GrantCredits, "no account for buyer email"),
        }
    };

    Ok(vec![
        PlannedStep::new(FulfillmentStep::RecordOrder, Action::RecordOrder(order)),
        grant,
    ])
}

/// Subscriber upsert, then premium promotion for identified accounts.
pub fn plan_activation(
    subscription: &FetchedSubscription,
    email: &Email,
    account: Option<AccountId>,
) -> Vec<PlannedStep> {
    let mut plan = vec![PlannedStep::new(
        FulfillmentStep::UpsertSubscriber,
        Action::UpsertSubscriber(SubscriberUpsert {
            email: email.clone(),
            account: account.filter(|_| !subscription.guest),
            customer_id: subscription.customer_id.clone(),
            subscription_id: subscription.id.clone(),
            status: subscription.status,
            tier: subscription.tier.clone(),
            period_start: subscription.period_start,
            period_end: subscription.period_end,
            guest: subscription.guest,
        }),
    )];

    let blocker = if subscription.guest {
        Some("guest subscription".to_string())
    } else if !subscription.status.grants_premium() {
        Some(format!("status {} grants no premium", subscription.status))
    } else if account.is_none() {
        Some("no account for subscriber email".to_string())
    } else {
        None
    };

    match (blocker, account) {
        (None, Some(account)) => {
            plan.push(PlannedStep::new(
                FulfillmentStep::PromoteAccount,
                Action::SetTier(
                    account,
                    AccountTier::Premium {
                        tier: subscription.tier.clone(),
                        status: subscription.status,
                    },
                ),
            ));
            plan.push(PlannedStep::new(
                FulfillmentStep::SetPremiumFlag,
                Action::SetPremiumFlag(PremiumFlag {
                    account,
                    active: true,
                    plan: subscription.tier.clone(),
                    subscription_id: Some(subscription.id.clone()),
                    period_start: subscription.period_start,
                    period_end: subscription.period_end,
                }),
            ));
        }
        (reason, _) => {
            let reason = reason.unwrap_or_default();
            plan.push(PlannedStep::skip(FulfillmentStep::PromoteAccount, reason.clone()));
            plan.push(PlannedStep::skip(FulfillmentStep::SetPremiumFlag, reason));
        }
    }

    plan
}

/// Cancel in place, then clear premium and downgrade the owning account.
pub fn plan_cancellation(
    subscription_id: &SubscriptionId,
    account: Option<AccountId>,
) -> Vec<PlannedStep> {
    let mut plan = vec![PlannedStep::new(
        FulfillmentStep::CancelSubscription,
        Action::CancelSubscription(subscription_id.clone()),
    )];

    match account {
        Some(account) => {
            plan.push(PlannedStep::new(
                FulfillmentStep::ClearPremiumFlag,
                Action::SetPremiumFlag(PremiumFlag {
                    account,
                    active: false,
                    plan: crate::domain::subscription::DEFAULT_TIER.to_string(),
                    subscription_id: Some(subscription_id.clone()),
                    period_start: None,
                    period_end: None,
                }),
            ));
            plan.push(PlannedStep::new(
                FulfillmentStep::DowngradeAccount,
                Action::SetTier(account, AccountTier::Default),
            ));
        }
        None => {
            plan.push(PlannedStep::skip(FulfillmentStep::ClearPremiumFlag, "no linked account"));
            plan.push(PlannedStep::skip(FulfillmentStep::DowngradeAccount, "no linked account"));
        }
    }

    plan
}

async fn apply(billing: &dyn BillingStore, action: &Action) -> Result<StepOutcome, PipelineError> {
    match action {
        Action::RecordOrder(order) => Ok(if billing.insert_order(order).await? {
            StepOutcome::Applied
        } else {
            StepOutcome::AlreadyDone
        }),
        Action::GrantCredits(grant) => match billing.add_credits(grant).await? {
            GrantOutcome::Applied { balance } => {
                tracing::info!(
                    account_id = %grant.account(),
                    delta = grant.delta(),
                    balance,
                    "credits granted"
                );
                Ok(StepOutcome::Applied)
            }
            GrantOutcome::AlreadyApplied => Ok(StepOutcome::AlreadyDone),
        },
        Action::UpsertSubscriber(subscriber) => {
            billing.upsert_subscriber(subscriber).await?;
            Ok(StepOutcome::Applied)
        }
        Action::SetTier(account, tier) => {
            billing.set_account_tier(*account, tier).await?;
            Ok(StepOutcome::Applied)
        }
        Action::SetPremiumFlag(flag) => {
            billing.set_premium_flag(flag).await?;
            Ok(StepOutcome::Applied)
        }
        Action::CancelSubscription(id) => Ok(if billing.cancel_subscription(id).await? {
            StepOutcome::Applied
        } else {
            StepOutcome::NotApplicable("no subscriber row for subscription".into())
        }),
        Action::NotApplicable(reason) => Ok(StepOutcome::NotApplicable(reason.clone())),
    }
}

/// Run a plan, skipping steps completed by an earlier attempt.
/// Only applied (or already applied) steps are recorded as completed.
pub async fn execute(
    events: &dyn EventLog,
    billing: &dyn BillingStore,
    event_id: &EventId,
    plan: Vec<PlannedStep>,
    completed: &[FulfillmentStep],
) -> FulfillmentReport {
    let mut report = FulfillmentReport::new(event_id.clone());

    for PlannedStep { step, action } in plan {
        if completed.contains(&step) {
            report.push(step, StepOutcome::AlreadyDone);
            continue;
        }

        match apply(billing, &action).await {
            Ok(outcome) => {
                // Not-applicable steps stay unrecorded; the next attempt re-plans them.
                if let StepOutcome::NotApplicable(reason) = &outcome {
                    tracing::info!(%event_id, %step, reason = %reason, "step not applicable");
                } else if let Err(e) = events.complete_step(event_id, step).await {
                    tracing::warn!(%event_id, %step, error = %e, "failed to record step completion");
                }
                report.push(step, outcome);
            }
            Err(e) => {
                tracing::error!(%event_id, %step, error = %e, "fulfillment step failed, continuing");
                let message = e.to_string();
                if let Err(e) = events.record_step_failure(event_id, step, &message).await {
                    tracing::warn!(%event_id, %step, error = %e, "failed to record step failure");
                }
                report.push(step, StepOutcome::Failed(message));
            }
        }
    }

    report
}
