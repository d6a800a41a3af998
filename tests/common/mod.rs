#![allow(dead_code)]

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    chrono::{Duration, Utc},
    cinepay::domain::{
        error::EngineError,
        id::CorrelationId,
        metadata::Metadata,
        money::{Currency, Money, MoneyAmount},
        payment::{NewPayment, PaymentRecord, PaymentStatus, Provider},
        provider::ProviderClient,
        purchase::{NewPurchase, Purchase, PurchaseStatus},
        store::{
            BoxFuture, DeliveryGateway, FailureSink, PurchaseStore, TransitionOutcome,
            TransitionRequest,
        },
    },
    cinepay::services::reconcile::ReconcileEngine,
    hmac::{Hmac, Mac},
    sha2::Sha256,
    std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
    },
    uuid::Uuid,
};

type HmacSha256 = Hmac<Sha256>;

// ── In-memory store ────────────────────────────────────────────────────────
// Mirrors the Postgres adapter's conditional-update semantics under a single
// lock, so the reconcile suite runs without a database.

#[derive(Default)]
struct Inner {
    payments: HashMap<Uuid, PaymentRecord>,
    purchases: HashMap<Uuid, Purchase>,
    content: HashMap<Uuid, Money>,
    counters: HashMap<Uuid, i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_content(&self, content_id: Uuid, price_cents: i64) {
        let money = Money::new(MoneyAmount::new(price_cents).unwrap(), Currency::Brl);
        self.inner.lock().unwrap().content.insert(content_id, money);
    }

    pub fn payment(&self, payment_id: Uuid) -> PaymentRecord {
        self.inner.lock().unwrap().payments[&payment_id].clone()
    }

    pub fn purchase(&self, purchase_id: Uuid) -> Purchase {
        self.inner.lock().unwrap().purchases[&purchase_id].clone()
    }

    pub fn counter(&self, content_id: Uuid) -> i64 {
        *self
            .inner
            .lock()
            .unwrap()
            .counters
            .get(&content_id)
            .unwrap_or(&0)
    }

    pub fn completed_payments(&self, purchase_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .payments
            .values()
            .filter(|p| p.purchase_id == purchase_id && p.status == PaymentStatus::Completed)
            .count()
    }
}

impl PurchaseStore for MemoryStore {
    fn find_payment_by_correlation(
        &self,
        provider: Provider,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<Option<PaymentRecord>, EngineError>> {
        let found = self
            .inner
            .lock()
            .unwrap()
            .payments
            .values()
            .find(|p| p.provider == provider && p.correlation_id == *correlation_id)
            .cloned();
        Box::pin(async move { Ok(found) })
    }

    fn find_purchase(
        &self,
        purchase_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Purchase>, EngineError>> {
        let found = self.inner.lock().unwrap().purchases.get(&purchase_id).cloned();
        Box::pin(async move { Ok(found) })
    }

    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, EngineError>> {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();

            let payment_matches = inner
                .payments
                .get(&request.payment_id)
                .is_some_and(|p| p.status == request.expected_payment);
            if !payment_matches {
                return Box::pin(async { Ok(TransitionOutcome::PaymentConflict) });
            }

            let purchase_matches = inner
                .purchases
                .get(&request.purchase_id)
                .is_some_and(|p| p.status == request.expected_purchase);
            if !purchase_matches {
                return Box::pin(async { Ok(TransitionOutcome::PurchaseConflict) });
            }

            let now = Utc::now();
            let payment = inner.payments.get_mut(&request.payment_id).unwrap();
            payment.status = request.new_payment;
            payment.native_status = request.native_status.clone();
            if request.failure_reason.is_some() {
                payment.failure_reason = request.failure_reason.clone();
            }
            if request.refund.is_some() {
                payment.refund = request.refund.clone();
            }
            match request.new_payment {
                PaymentStatus::Completed => payment.processed_at = Some(now),
                PaymentStatus::Refunded => payment.refunded_at = Some(now),
                _ => {}
            }

            let purchase = inner.purchases.get_mut(&request.purchase_id).unwrap();
            purchase.status = request.new_purchase;
            purchase.updated_at = now;
            if request.new_purchase == PurchaseStatus::Paid {
                purchase.access_expires_at = Some(now + Duration::hours(24));
            }

            TransitionOutcome::Applied
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn record_native_status(
        &self,
        payment_id: Uuid,
        native_status: &str,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(payment) = inner.payments.get_mut(&payment_id) {
            if payment.status == PaymentStatus::Pending {
                payment.native_status = native_status.to_string();
            }
        }
        Box::pin(async { Ok(()) })
    }

    fn increment_sales_counters(&self, content_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        *self
            .inner
            .lock()
            .unwrap()
            .counters
            .entry(content_id)
            .or_insert(0) += 1;
        Box::pin(async { Ok(()) })
    }

    fn revoke_access(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(purchase) = inner.purchases.get_mut(&purchase_id) {
            purchase.access_expires_at = Some(Utc::now());
        }
        Box::pin(async { Ok(()) })
    }

    fn stale_pending_payments(
        &self,
        older_than_minutes: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<PaymentRecord>, EngineError>> {
        let cutoff = Utc::now() - Duration::minutes(older_than_minutes);
        let mut stale: Vec<PaymentRecord> = self
            .inner
            .lock()
            .unwrap()
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.created_at);
        stale.truncate(limit as usize);
        Box::pin(async move { Ok(stale) })
    }

    fn content_price(&self, content_id: Uuid) -> BoxFuture<'_, Result<Option<Money>, EngineError>> {
        let price = self.inner.lock().unwrap().content.get(&content_id).copied();
        Box::pin(async move { Ok(price) })
    }

    fn create_purchase(&self, purchase: NewPurchase) -> BoxFuture<'_, Result<(), EngineError>> {
        let now = Utc::now();
        self.inner.lock().unwrap().purchases.insert(
            purchase.id,
            Purchase {
                id: purchase.id,
                content_id: purchase.content_id,
                buyer_id: purchase.buyer_id,
                money: purchase.money,
                status: PurchaseStatus::Pending,
                correlation_id: None,
                metadata: purchase.metadata,
                access_expires_at: None,
                created_at: now,
                updated_at: now,
            },
        );
        Box::pin(async { Ok(()) })
    }

    fn create_payment(&self, payment: NewPayment) -> BoxFuture<'_, Result<(), EngineError>> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner
            .payments
            .values()
            .any(|p| p.provider == payment.provider && p.correlation_id == payment.correlation_id);
        if duplicate {
            return Box::pin(async {
                Err(EngineError::Validation(
                    "duplicate (provider, correlation_id)".into(),
                ))
            });
        }
        inner.payments.insert(
            payment.id,
            PaymentRecord {
                id: payment.id,
                purchase_id: payment.purchase_id,
                provider: payment.provider,
                correlation_id: payment.correlation_id,
                status: PaymentStatus::Pending,
                native_status: String::new(),
                money: payment.money,
                failure_reason: None,
                refund: None,
                metadata: payment.metadata,
                created_at: Utc::now(),
                processed_at: None,
                refunded_at: None,
            },
        );
        Box::pin(async { Ok(()) })
    }
}

// ── Collaborator doubles ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDelivery {
    pub calls: Mutex<Vec<Uuid>>,
    pub fail: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DeliveryGateway for RecordingDelivery {
    fn deliver(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        if self.fail.load(Ordering::SeqCst) {
            return Box::pin(async { Err(EngineError::Delivery("bot unreachable".into())) });
        }
        self.calls.lock().unwrap().push(purchase_id);
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
pub struct RecordingFailureSink {
    pub entries: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl RecordingFailureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl FailureSink for RecordingFailureSink {
    fn log_failure(
        &self,
        kind: &str,
        message: &str,
        meta: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        self.entries
            .lock()
            .unwrap()
            .push((kind.to_string(), message.to_string(), meta));
        Box::pin(async { Ok(()) })
    }
}

/// Provider API double returning a fixed native status.
pub struct StaticClient {
    status: String,
}

impl StaticClient {
    pub fn new(status: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            status: status.into(),
        })
    }
}

impl ProviderClient for StaticClient {
    fn fetch_status(&self, _: &CorrelationId) -> BoxFuture<'_, Result<String, EngineError>> {
        let status = self.status.clone();
        Box::pin(async move { Ok(status) })
    }
}

// ── Builders ───────────────────────────────────────────────────────────────

pub fn engine(store: &Arc<MemoryStore>) -> ReconcileEngine {
    ReconcileEngine::new(store.clone() as Arc<dyn PurchaseStore>)
}

pub struct Seeded {
    pub content_id: Uuid,
    pub purchase_id: Uuid,
    pub payment_id: Uuid,
    pub correlation_id: CorrelationId,
}

/// Content + pending purchase + pending payment, ready for a webhook.
pub async fn seed_pending(store: &Arc<MemoryStore>, provider: Provider, correlation: &str) -> Seeded {
    let content_id = Uuid::now_v7();
    store.insert_content(content_id, 1999);

    let money = Money::new(MoneyAmount::new(1999).unwrap(), Currency::Brl);
    let purchase = NewPurchase::new(content_id, Some("buyer-1".into()), money, Metadata::new());
    let purchase_id = purchase.id;
    store.create_purchase(purchase).await.unwrap();

    let correlation_id = CorrelationId::new(correlation).unwrap();
    let payment = NewPayment::new(
        purchase_id,
        provider,
        correlation_id.clone(),
        money,
        Metadata::new(),
    );
    let payment_id = payment.id;
    store.create_payment(payment).await.unwrap();

    Seeded {
        content_id,
        purchase_id,
        payment_id,
        correlation_id,
    }
}

// ── Woovi webhook builders (the inline-status channel) ─────────────────────

pub const WOOVI_SECRET: &str = "test-webhook-secret";

pub fn woovi_sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

pub fn woovi_body(event: &str, correlation: &str, status: &str) -> Vec<u8> {
    serde_json::json!({
        "event": event,
        "charge": {
            "status": status,
            "correlationID": correlation,
            "value": 1999
        }
    })
    .to_string()
    .into_bytes()
}

pub fn woovi_paid_body(correlation: &str) -> Vec<u8> {
    woovi_body("OPENPIX:CHARGE_COMPLETED", correlation, "COMPLETED")
}

pub fn signed_headers(secret: &str, body: &[u8]) -> HashMap<String, String> {
    HashMap::from([(
        "x-webhook-signature".to_string(),
        woovi_sign(secret, body),
    )])
}
