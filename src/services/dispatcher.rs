use crate::domain::{
    credits::{CreditResolution, resolve_credits},
    error::PipelineError,
    event::{
        CheckoutSession, EventKind, Invoice, PaymentEvent, SubscriptionObject, metadata_flag,
        metadata_str,
    },
    id::{Email, SessionId, SubscriptionId},
    money::{Currency, Money, MoneyAmount},
    order::OrderStatus,
};

const DEFAULT_CURRENCY: &str = "usd";

/// One-time credit purchase extracted from a completed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutPurchase {
    pub session_id: SessionId,
    pub email: Email,
    pub money: Money,
    pub status: OrderStatus,
    pub credits: CreditResolution,
    pub guest: bool,
    pub product_name: String,
}

#[derive(Debug, Clone)]
pub struct SubscriptionActivation {
    pub subscription_id: SubscriptionId,
    pub invoice_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionCancellation {
    pub subscription_id: SubscriptionId,
}

/// Where a verified event goes. Routing performs no I/O.
#[derive(Debug, Clone)]
pub enum Route {
    /// Type this service does not handle.
    Ignore,
    /// Handled type that needs no work in this delivery.
    Acknowledge(&'static str),
    Purchase(CheckoutPurchase),
    Activate(SubscriptionActivation),
    Cancel(SubscriptionCancellation),
}

pub fn route(event: &PaymentEvent) -> Result<Route, PipelineError> {
    match event.kind {
        EventKind::Unknown => Ok(Route::Ignore),
        EventKind::CheckoutCompleted => {
            let session: CheckoutSession = event.object()?;
            match session.mode.as_deref() {
                Some("subscription") => Ok(Route::Acknowledge(
                    "subscription checkout, activation waits for the first invoice",
                )),
                Some("setup") => Ok(Route::Acknowledge("setup checkout")),
                _ => purchase_from_session(&session).map(Route::Purchase),
            }
        }
        EventKind::InvoicePaid => {
            let invoice: Invoice = event.object()?;
            match invoice.subscription_ref() {
                Some(sub) => Ok(Route::Activate(SubscriptionActivation {
                    subscription_id: SubscriptionId::new(sub)?,
                    invoice_email: invoice.customer_email.clone(),
                })),
                None => Ok(Route::Acknowledge("invoice without subscription")),
            }
        }
        EventKind::SubscriptionCanceled => {
            let subscription: SubscriptionObject = event.object()?;
            Ok(Route::Cancel(SubscriptionCancellation {
                subscription_id: SubscriptionId::new(subscription.id)?,
            }))
        }
    }
}

fn purchase_from_session(session: &CheckoutSession) -> Result<CheckoutPurchase, PipelineError> {
    let metadata = session.metadata();
    let email = session
        .buyer_email()
        .ok_or_else(|| PipelineError::Validation(format!("checkout {} has no email", session.id)))
        .and_then(Email::new)?;

    let credits = resolve_credits(&metadata, session.client_reference_id.as_deref());
    if let Some((from_metadata, from_reference)) = credits.conflict {
        tracing::warn!(
            session_id = %session.id,
            from_metadata,
            from_reference,
            "credit quantity disagrees between metadata and reference code, using metadata"
        );
    }

    let currency = Currency::try_from(session.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?;
    let amount = MoneyAmount::new(session.amount_total.unwrap_or(0))?;
    let product_name = metadata_str(&metadata, "productName")
        .or_else(|| metadata_str(&metadata, "product_name"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} Credits", credits.quantity));

    Ok(CheckoutPurchase {
        session_id: SessionId::new(session.id.clone())?,
        email,
        money: Money::new(amount, currency),
        status: OrderStatus::from_payment_status(session.payment_status.as_deref()),
        credits,
        guest: metadata_flag(&metadata, &["isGuest", "guest_checkout"]),
        product_name,
    })
}
