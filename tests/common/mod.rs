#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use backlink_sync::{
    AppState,
    adapters::stripe::signature::WebhookVerifier,
    app,
    domain::{
        error::PipelineError,
        event::PaymentEvent,
        fulfillment::{EventClaim, EventStatus, FulfillmentStep, retry_delay},
        id::{AccountId, Email, EventId, SubscriptionId},
        ledger::{CreditGrant, GrantOutcome},
        order::NewOrder,
        provider::{DomainProvider, ProviderFuture, SubscriptionProvider},
        repository::{BillingStore, DomainStore, EventLog, StoreFuture},
        site_domain::{DomainRecord, DomainStatus, NewDomainRecord, RemoteSite, SitePatch, SyncUpdate},
        subscription::{
            AccountTier, FetchedSubscription, PremiumFlag, SubscriberUpsert, SubscriptionStatus,
        },
    },
    services::{payment_pipeline::PaymentPipeline, reconciler::Reconciler},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "whsec_test_secret";
pub const SITE_ID: &str = "site-123";

// ── In-memory store ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EventRow {
    pub event_type: String,
    pub payload: Value,
    pub status: EventStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub email: String,
    pub role: String,
    pub tier: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubscriberRow {
    pub account: Option<AccountId>,
    pub subscription_id: String,
    pub status: String,
    pub subscribed: bool,
    pub tier: String,
    pub guest: bool,
}

#[derive(Default)]
pub struct MemoryState {
    pub events: HashMap<String, EventRow>,
    pub completed_steps: HashMap<String, HashSet<FulfillmentStep>>,
    pub profiles: HashMap<Uuid, Profile>,
    pub balances: HashMap<Uuid, i64>,
    /// source event id → (account, delta)
    pub ledger: HashMap<String, (Uuid, i64)>,
    pub orders: HashMap<String, NewOrder>,
    pub subscribers: HashMap<String, SubscriberRow>,
    pub premium: HashMap<Uuid, PremiumFlag>,
    pub domains: Vec<DomainRecord>,
    /// Billing operations that fail until healed, by method name.
    pub failing_ops: HashSet<&'static str>,
    /// Domain names whose writes fail.
    pub failing_domains: HashSet<String>,
    /// `insert_domain` and `mark_synced` calls, failed ones included.
    pub domain_writes: usize,
}

/// Implements every store seam over one mutex-guarded state.
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_profile(&self, email: &str) -> AccountId {
        let id = Uuid::now_v7();
        self.with(|s| {
            s.profiles.insert(
                id,
                Profile {
                    email: email.to_string(),
                    role: "user".into(),
                    tier: None,
                    status: None,
                },
            )
        });
        AccountId::new(id)
    }

    pub fn balance(&self, account: AccountId) -> i64 {
        self.with(|s| s.balances.get(&account.as_uuid()).copied().unwrap_or(0))
    }

    pub fn profile(&self, account: AccountId) -> Profile {
        self.with(|s| s.profiles[&account.as_uuid()].clone())
    }

    pub fn event(&self, event_id: &str) -> Option<EventRow> {
        self.with(|s| s.events.get(event_id).cloned())
    }

    pub fn fail(&self, op: &'static str) {
        self.with(|s| s.failing_ops.insert(op));
    }

    pub fn heal(&self, op: &'static str) {
        self.with(|s| s.failing_ops.remove(op));
    }

    pub fn fail_domain(&self, name: &str) {
        self.with(|s| s.failing_domains.insert(name.to_string()));
    }

    /// Backdate every event so processing leases count as expired.
    pub fn expire_leases(&self) {
        self.with(|s| {
            for row in s.events.values_mut() {
                row.updated_at -= chrono::Duration::minutes(10);
            }
        });
    }

    pub fn add_domain(&self, record: DomainRecord) {
        self.with(|s| s.domains.push(record));
    }

    pub fn domain(&self, name: &str) -> Option<DomainRecord> {
        self.with(|s| s.domains.iter().find(|d| d.name == name).cloned())
    }

    pub fn domain_count(&self) -> usize {
        self.with(|s| s.domains.len())
    }

    pub fn domain_writes(&self) -> usize {
        self.with(|s| s.domain_writes)
    }

    fn check(&self, op: &'static str) -> Result<(), PipelineError> {
        if self.with(|s| s.failing_ops.contains(op)) {
            return Err(PipelineError::Store(format!("{op} unavailable")));
        }
        Ok(())
    }

    fn check_domain(&self, name: &str) -> Result<(), PipelineError> {
        if self.with(|s| s.failing_domains.contains(name)) {
            return Err(PipelineError::Store(format!("write rejected for {name}")));
        }
        Ok(())
    }
}

fn ready<'a, T: Send + 'a>(value: Result<T, PipelineError>) -> StoreFuture<'a, T> {
    Box::pin(async move { value })
}

impl EventLog for MemoryStore {
    fn claim<'a>(&'a self, event: &'a PaymentEvent) -> StoreFuture<'a, EventClaim> {
        let result = self.with(|s| {
            let now = Utc::now();
            let lease_expired = |row: &EventRow| now - row.updated_at > chrono::Duration::minutes(2);
            match s.events.get_mut(event.id.as_str()) {
                None => {
                    s.events.insert(
                        event.id.to_string(),
                        EventRow {
                            event_type: event.event_type.clone(),
                            payload: event.payload.clone(),
                            status: EventStatus::Processing,
                            attempts: 1,
                            last_error: None,
                            updated_at: now,
                        },
                    );
                    EventClaim::Claimed {
                        completed_steps: Vec::new(),
                        attempt: 1,
                    }
                }
                Some(row) if row.status == EventStatus::Completed => EventClaim::AlreadyCompleted,
                Some(row) if row.status == EventStatus::Processing && !lease_expired(row) => {
                    EventClaim::InFlight
                }
                Some(row) => {
                    row.status = EventStatus::Processing;
                    row.attempts += 1;
                    row.updated_at = now;
                    let completed_steps = s
                        .completed_steps
                        .get(event.id.as_str())
                        .map(|set| set.iter().copied().collect())
                        .unwrap_or_default();
                    EventClaim::Claimed {
                        completed_steps,
                        attempt: row.attempts,
                    }
                }
            }
        });
        ready(Ok(result))
    }

    fn complete_step<'a>(&'a self, event_id: &'a EventId, step: FulfillmentStep) -> StoreFuture<'a, ()> {
        self.with(|s| {
            s.completed_steps
                .entry(event_id.to_string())
                .or_default()
                .insert(step)
        });
        ready(Ok(()))
    }

    fn record_step_failure<'a>(
        &'a self,
        event_id: &'a EventId,
        step: FulfillmentStep,
        error: &'a str,
    ) -> StoreFuture<'a, ()> {
        self.with(|s| {
            if let Some(row) = s.events.get_mut(event_id.as_str()) {
                row.last_error = Some(format!("{step}: {error}"));
            }
        });
        ready(Ok(()))
    }

    fn finish<'a>(&'a self, event_id: &'a EventId, status: EventStatus) -> StoreFuture<'a, ()> {
        self.with(|s| {
            if let Some(row) = s.events.get_mut(event_id.as_str()) {
                row.status = status;
                row.updated_at = Utc::now();
            }
        });
        ready(Ok(()))
    }

    fn repairable<'a>(&'a self, limit: i64) -> StoreFuture<'a, Vec<PaymentEvent>> {
        let events = self.with(|s| {
            let now = Utc::now();
            let mut rows: Vec<_> = s
                .events
                .values()
                .filter(|row| {
                    (row.status == EventStatus::Partial
                        && now - row.updated_at > retry_delay(row.attempts))
                        || (row.status == EventStatus::Processing
                            && now - row.updated_at > chrono::Duration::minutes(2))
                })
                .cloned()
                .collect();
            rows.sort_by_key(|row| row.updated_at);
            rows.into_iter()
                .take(limit as usize)
                .filter_map(|row| PaymentEvent::from_payload(row.payload).ok())
                .collect()
        });
        ready(Ok(events))
    }

    fn purge_completed<'a>(&'a self, older_than: DateTime<Utc>) -> StoreFuture<'a, u64> {
        let removed = self.with(|s| {
            let before = s.events.len();
            s.events
                .retain(|_, row| !(row.status == EventStatus::Completed && row.updated_at < older_than));
            (before - s.events.len()) as u64
        });
        ready(Ok(removed))
    }
}

impl BillingStore for MemoryStore {
    fn insert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, bool> {
        let result = self.check("insert_order").map(|()| {
            self.with(|s| {
                if s.orders.contains_key(order.session_id.as_str()) {
                    false
                } else {
                    s.orders.insert(order.session_id.to_string(), order.clone());
                    true
                }
            })
        });
        ready(result)
    }

    fn find_account_by_email<'a>(&'a self, email: &'a Email) -> StoreFuture<'a, Option<AccountId>> {
        let found = self.with(|s| {
            s.profiles
                .iter()
                .find(|(_, p)| p.email.eq_ignore_ascii_case(email.as_str()))
                .map(|(id, _)| AccountId::new(*id))
        });
        ready(Ok(found))
    }

    fn add_credits<'a>(&'a self, grant: &'a CreditGrant) -> StoreFuture<'a, GrantOutcome> {
        let result = self.check("add_credits").map(|()| {
            self.with(|s| {
                let key = grant.source_event().to_string();
                if s.ledger.contains_key(&key) {
                    return GrantOutcome::AlreadyApplied;
                }
                let account = grant.account().as_uuid();
                s.ledger.insert(key, (account, grant.delta()));
                let balance = s.balances.entry(account).or_insert(0);
                *balance += grant.delta();
                GrantOutcome::Applied { balance: *balance }
            })
        });
        ready(result)
    }

    fn credit_balance<'a>(&'a self, account: AccountId) -> StoreFuture<'a, i64> {
        ready(Ok(self.balance(account)))
    }

    fn upsert_subscriber<'a>(&'a self, sub: &'a SubscriberUpsert) -> StoreFuture<'a, ()> {
        let result = self.check("upsert_subscriber").map(|()| {
            self.with(|s| {
                let previous_account = s.subscribers.get(sub.email.as_str()).and_then(|r| r.account);
                s.subscribers.insert(
                    sub.email.to_string(),
                    SubscriberRow {
                        account: sub.account.or(previous_account),
                        subscription_id: sub.subscription_id.to_string(),
                        status: sub.status.as_str().to_string(),
                        subscribed: sub.status.grants_premium(),
                        tier: sub.tier.clone(),
                        guest: sub.guest,
                    },
                );
            })
        });
        ready(result)
    }

    fn subscriber_email<'a>(&'a self, id: &'a SubscriptionId) -> StoreFuture<'a, Option<Email>> {
        let email = self.with(|s| {
            s.subscribers
                .iter()
                .find(|(_, row)| row.subscription_id == id.as_str())
                .map(|(email, _)| email.clone())
        });
        ready(email.as_deref().map(Email::new).transpose())
    }

    fn cancel_subscription<'a>(&'a self, id: &'a SubscriptionId) -> StoreFuture<'a, bool> {
        let result = self.check("cancel_subscription").map(|()| {
            self.with(|s| {
                let mut matched = false;
                for row in s.subscribers.values_mut() {
                    if row.subscription_id == id.as_str() {
                        row.status = SubscriptionStatus::Canceled.as_str().to_string();
                        row.subscribed = false;
                        matched = true;
                    }
                }
                matched
            })
        });
        ready(result)
    }

    fn set_account_tier<'a>(&'a self, account: AccountId, tier: &'a AccountTier) -> StoreFuture<'a, ()> {
        let result = self.check("set_account_tier").and_then(|()| {
            self.with(|s| match s.profiles.get_mut(&account.as_uuid()) {
                Some(profile) => {
                    profile.role = tier.role().to_string();
                    profile.tier = tier.tier().map(str::to_string);
                    profile.status = Some(tier.status().to_string());
                    Ok(())
                }
                None => Err(PipelineError::Store(format!("no profile for account {account}"))),
            })
        });
        ready(result)
    }

    fn set_premium_flag<'a>(&'a self, flag: &'a PremiumFlag) -> StoreFuture<'a, ()> {
        let result = self.check("set_premium_flag").map(|()| {
            self.with(|s| {
                s.premium.insert(flag.account.as_uuid(), flag.clone());
            })
        });
        ready(result)
    }
}

impl DomainStore for MemoryStore {
    fn list_domains<'a>(&'a self, owner: Option<&'a str>) -> StoreFuture<'a, Vec<DomainRecord>> {
        let rows = self.with(|s| {
            s.domains
                .iter()
                .filter(|d| owner.is_none_or(|o| d.owner_id.as_deref() == Some(o)))
                .cloned()
                .collect()
        });
        ready(Ok(rows))
    }

    fn insert_domain<'a>(&'a self, record: &'a NewDomainRecord) -> StoreFuture<'a, ()> {
        self.with(|s| s.domain_writes += 1);
        let result = self.check_domain(&record.name).and_then(|()| {
            self.with(|s| {
                if s
                    .domains
                    .iter()
                    .any(|d| d.name == record.name && d.owner_id == record.owner_id)
                {
                    return Err(PipelineError::Store(format!("duplicate domain {}", record.name)));
                }
                s.domains.push(DomainRecord {
                    id: record.id,
                    name: record.name.clone(),
                    status: DomainStatus::Verified,
                    remote_verified: true,
                    remote_site_id: Some(record.site_id.clone()),
                    owner_id: record.owner_id.clone(),
                    dns_verified: true,
                    ssl_enabled: true,
                    is_custom_domain: record.is_custom_domain,
                });
                Ok(())
            })
        });
        ready(result)
    }

    fn mark_synced<'a>(&'a self, update: &'a SyncUpdate) -> StoreFuture<'a, ()> {
        self.with(|s| s.domain_writes += 1);
        let result = self.check_domain(&update.name).and_then(|()| {
            self.with(|s| match s.domains.iter_mut().find(|d| d.id == update.id) {
                Some(row) => {
                    row.status = DomainStatus::Verified;
                    row.remote_verified = true;
                    row.remote_site_id = Some(update.site_id.clone());
                    row.is_custom_domain = update.is_custom_domain;
                    Ok(())
                }
                None => Err(PipelineError::Store(format!("domain row {} vanished", update.name))),
            })
        });
        ready(result)
    }

    fn delete_domain<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool> {
        let removed = self.with(|s| {
            let before = s.domains.len();
            s.domains.retain(|d| d.id != id);
            s.domains.len() < before
        });
        ready(Ok(removed))
    }
}

pub fn domain_row(name: &str, owner: Option<&str>) -> DomainRecord {
    DomainRecord {
        id: Uuid::now_v7(),
        name: name.to_string(),
        status: DomainStatus::Pending,
        remote_verified: false,
        remote_site_id: None,
        owner_id: owner.map(str::to_string),
        dns_verified: false,
        ssl_enabled: false,
        is_custom_domain: false,
    }
}

pub fn synced_row(name: &str, owner: Option<&str>) -> DomainRecord {
    DomainRecord {
        status: DomainStatus::Verified,
        remote_verified: true,
        remote_site_id: Some(SITE_ID.to_string()),
        ..domain_row(name, owner)
    }
}

// ── Fake providers ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeSubscriptions {
    pub subscriptions: Mutex<HashMap<String, FetchedSubscription>>,
    pub unavailable: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl FakeSubscriptions {
    pub fn insert(&self, id: &str, email: Option<&str>, status: SubscriptionStatus, guest: bool) {
        self.subscriptions.lock().unwrap().insert(
            id.to_string(),
            FetchedSubscription {
                id: SubscriptionId::new(id).unwrap(),
                customer_id: Some("cus_test".into()),
                status,
                tier: "premium".into(),
                period_start: Some(Utc::now()),
                period_end: Some(Utc::now() + chrono::Duration::days(30)),
                email: email.map(str::to_string),
                guest,
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

impl SubscriptionProvider for FakeSubscriptions {
    fn fetch_subscription<'a>(&'a self, id: &'a SubscriptionId) -> ProviderFuture<'a, FetchedSubscription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if *self.unavailable.lock().unwrap() {
            Err(PipelineError::Provider("Stripe API: connection reset".into()))
        } else {
            self.subscriptions
                .lock()
                .unwrap()
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| PipelineError::Provider(format!("no such subscription: {id}")))
        };
        Box::pin(async move { result })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SiteFailure {
    Timeout,
    Unavailable,
}

pub struct FakeSites {
    pub site: Mutex<RemoteSite>,
    pub failure: Mutex<Option<SiteFailure>>,
    /// When set, `fetch_site` signals `entered` and waits for this.
    pub gate: Mutex<Option<Arc<Notify>>>,
    pub entered: Notify,
    pub calls: AtomicUsize,
    /// Every `update_site` body, in order.
    pub patches: Mutex<Vec<SitePatch>>,
}

impl FakeSites {
    pub fn new(custom_domain: Option<&str>, aliases: &[&str]) -> Self {
        Self {
            site: Mutex::new(RemoteSite {
                id: SITE_ID.to_string(),
                url: Some("http://backlink.netlify.app".into()),
                ssl_url: Some("https://backlink.netlify.app".into()),
                custom_domain: custom_domain.map(str::to_string),
                domain_aliases: Some(aliases.iter().map(|a| a.to_string()).collect()),
            }),
            failure: Mutex::new(None),
            gate: Mutex::new(None),
            entered: Notify::new(),
            calls: AtomicUsize::new(0),
            patches: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, failure: SiteFailure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    pub fn patches(&self) -> Vec<SitePatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.site.lock().unwrap().domain_aliases.clone().unwrap_or_default()
    }

    pub fn custom_domain(&self) -> Option<String> {
        self.site.lock().unwrap().custom_domain.clone()
    }

    fn failure(&self, site_id: &str) -> Result<(), PipelineError> {
        match *self.failure.lock().unwrap() {
            Some(SiteFailure::Timeout) => Err(PipelineError::Timeout(format!("Netlify site {site_id}"))),
            Some(SiteFailure::Unavailable) => {
                Err(PipelineError::Provider(format!("Netlify API 503 for site {site_id}")))
            }
            None => Ok(()),
        }
    }
}

impl DomainProvider for FakeSites {
    fn fetch_site<'a>(&'a self, site_id: &'a str) -> ProviderFuture<'a, RemoteSite> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                self.entered.notify_one();
                gate.notified().await;
            }
            self.failure(site_id)?;
            Ok(self.site.lock().unwrap().clone())
        })
    }

    fn update_site<'a>(&'a self, site_id: &'a str, patch: &'a SitePatch) -> ProviderFuture<'a, RemoteSite> {
        Box::pin(async move {
            self.failure(site_id)?;
            self.patches.lock().unwrap().push(patch.clone());
            let mut site = self.site.lock().unwrap();
            if let Some(custom) = &patch.custom_domain {
                site.custom_domain = Some(custom.clone());
            }
            if let Some(aliases) = &patch.domain_aliases {
                site.domain_aliases = Some(aliases.clone());
            }
            Ok(site.clone())
        })
    }
}

// ── Application harness ────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub subscriptions: Arc<FakeSubscriptions>,
    pub sites: Arc<FakeSites>,
    pub pipeline: Arc<PaymentPipeline>,
    pub reconciler: Arc<Reconciler>,
    pub state: AppState,
}

pub struct HarnessOptions {
    pub secret: Option<&'static str>,
    pub with_stripe: bool,
    pub with_netlify: bool,
    pub site_id: Option<&'static str>,
    pub production: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            secret: Some(SECRET),
            with_stripe: true,
            with_netlify: true,
            site_id: Some(SITE_ID),
            production: false,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(opts: HarnessOptions) -> Self {
        let store = MemoryStore::new();
        let subscriptions = Arc::new(FakeSubscriptions::default());
        let sites = Arc::new(FakeSites::new(Some("example.com"), &["www.blog.example.com"]));

        let pipeline = Arc::new(PaymentPipeline::new(
            store.clone() as Arc<dyn EventLog>,
            store.clone() as Arc<dyn BillingStore>,
            opts.with_stripe
                .then(|| subscriptions.clone() as Arc<dyn SubscriptionProvider>),
        ));
        let reconciler = Arc::new(Reconciler::new(
            store.clone() as Arc<dyn DomainStore>,
            opts.with_netlify.then(|| sites.clone() as Arc<dyn DomainProvider>),
            opts.site_id.map(str::to_string),
        ));

        let state = AppState {
            pipeline: pipeline.clone(),
            reconciler: reconciler.clone(),
            verifier: WebhookVerifier::new(opts.secret),
            expose_error_details: !opts.production,
        };

        Self {
            store,
            subscriptions,
            sites,
            pipeline,
            reconciler,
            state,
        }
    }

    pub fn router(&self) -> Router {
        app::router(self.state.clone())
    }

    pub async fn deliver(&self, event: &Value) -> (StatusCode, Value) {
        send(self.router(), signed_webhook(event)).await
    }
}

// ── Request helpers ────────────────────────────────────────────────────────

/// `Stripe-Signature` header value for `body`, signed now.
pub fn sign(secret: &str, body: &[u8]) -> String {
    sign_at(secret, body, Utc::now().timestamp())
}

pub fn sign_at(secret: &str, body: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

pub fn signed_webhook(event: &Value) -> Request<Body> {
    let body = serde_json::to_vec(event).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("Stripe-Signature", sign(SECRET, &body))
        .body(Body::from(body))
        .unwrap()
}

pub fn sync_request(body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri("/domains/sync")
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Drive one request through the router. Empty bodies come back as `Value::Null`,
/// non-JSON bodies as a JSON string.
pub async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

// ── Event fixtures ─────────────────────────────────────────────────────────

pub fn checkout_event(event_id: &str, session_id: &str, email: &str, metadata: Value) -> Value {
    json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "livemode": false,
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "mode": "payment",
                "payment_status": "paid",
                "customer_details": { "email": email },
                "amount_total": 1900,
                "currency": "usd",
                "metadata": metadata,
            }
        }
    })
}

pub fn invoice_event(event_id: &str, subscription_id: &str, email: Option<&str>) -> Value {
    json!({
        "id": event_id,
        "object": "event",
        "type": "invoice.paid",
        "created": 1_700_000_000,
        "livemode": false,
        "data": {
            "object": {
                "id": "in_test_1",
                "object": "invoice",
                "subscription": subscription_id,
                "customer": "cus_test",
                "customer_email": email,
            }
        }
    })
}

pub fn subscription_deleted_event(event_id: &str, subscription_id: &str) -> Value {
    json!({
        "id": event_id,
        "object": "event",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_000,
        "livemode": false,
        "data": {
            "object": {
                "id": subscription_id,
                "object": "subscription",
                "customer": "cus_test",
                "status": "canceled",
            }
        }
    })
}

pub fn parse_event(event: &Value) -> PaymentEvent {
    PaymentEvent::from_payload(event.clone()).unwrap()
}
