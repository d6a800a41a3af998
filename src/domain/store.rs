use {
    super::error::EngineError,
    super::id::CorrelationId,
    super::money::Money,
    super::payment::{NewPayment, PaymentRecord, PaymentStatus, Provider, RefundInfo},
    super::purchase::{NewPurchase, Purchase, PurchaseStatus},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The two-record update applied when a verified notification advances a
/// payment. Expressed as conditional expectations so two concurrent webhooks
/// for the same payment cannot both win.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub payment_id: Uuid,
    pub purchase_id: Uuid,
    pub expected_payment: PaymentStatus,
    pub new_payment: PaymentStatus,
    pub expected_purchase: PurchaseStatus,
    pub new_purchase: PurchaseStatus,
    /// Provider's native word, mirrored for operator visibility.
    pub native_status: String,
    pub failure_reason: Option<String>,
    pub refund: Option<RefundInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Both conditional updates matched; payment and purchase advanced.
    Applied,
    /// The payment row no longer held the expected status — a concurrent
    /// notification won the transition.
    PaymentConflict,
    /// The purchase was already moved past the expected status, typically
    /// paid through a different payment. The payment row is left untouched
    /// so at most one payment per purchase ever completes.
    PurchaseConflict,
}

/// Read/write access to purchase and payment records. The only shared
/// mutable resource in the engine; every mutation is a conditional,
/// single-row update keyed by primary/unique key.
pub trait PurchaseStore: Send + Sync {
    fn find_payment_by_correlation(
        &self,
        provider: Provider,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<Option<PaymentRecord>, EngineError>>;

    fn find_purchase(
        &self,
        purchase_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Purchase>, EngineError>>;

    /// Apply both updates atomically: either payment and purchase advance
    /// together or neither is visibly changed.
    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, EngineError>>;

    /// Cosmetic mirror of the provider's native status while a payment is
    /// still pending. Never changes canonical status.
    fn record_native_status(
        &self,
        payment_id: Uuid,
        native_status: &str,
    ) -> BoxFuture<'_, Result<(), EngineError>>;

    fn increment_sales_counters(&self, content_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>>;

    /// Set access expiry to now. Idempotent — re-setting an already-past
    /// expiry is harmless.
    fn revoke_access(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>>;

    /// Payments still pending after `older_than_minutes` — the polling
    /// fallback's work list.
    fn stale_pending_payments(
        &self,
        older_than_minutes: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<PaymentRecord>, EngineError>>;

    fn content_price(&self, content_id: Uuid) -> BoxFuture<'_, Result<Option<Money>, EngineError>>;

    fn create_purchase(&self, purchase: NewPurchase) -> BoxFuture<'_, Result<(), EngineError>>;

    fn create_payment(&self, payment: NewPayment) -> BoxFuture<'_, Result<(), EngineError>>;
}

/// External collaborator that hands the buyer their access artifact.
/// Fire-and-forget from the engine's perspective: errors are logged to the
/// failure sink, never retried here.
pub trait DeliveryGateway: Send + Sync {
    fn deliver(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>>;
}

/// Operational log store for failures an operator must see and resolve by
/// hand (e.g. content paid for but not delivered).
pub trait FailureSink: Send + Sync {
    fn log_failure(
        &self,
        kind: &str,
        message: &str,
        meta: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), EngineError>>;
}
