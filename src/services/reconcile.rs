use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        payment::{PaymentRecord, PaymentStatus, Provider, RefundInfo},
        provider::{Notification, ProviderChannel, ProviderClient},
        purchase::PurchaseStatus,
        status::{CanonicalStatus, normalize},
        store::{PurchaseStore, TransitionOutcome, TransitionRequest},
    },
    crate::services::dispatch::SideEffect,
    std::{collections::HashMap, sync::Arc, time::Duration},
    uuid::Uuid,
};

/// Providers call back almost immediately after charge creation, sometimes
/// before the local write is visible. Retry the lookup a few times before
/// declaring a miss.
pub const LOOKUP_ATTEMPTS: u32 = 3;
pub const LOOKUP_DELAY: Duration = Duration::from_millis(500);

/// Provider status lookups must not eat the webhook handler's own timeout
/// budget. A timed-out fetch is "not found yet", never an error.
pub const STATUS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Transition applied; payment and purchase advanced together.
    Applied,
    /// Already reflected in current state — the idempotency gate. No side
    /// effects fire again.
    Duplicate,
    /// Out-of-order echo (e.g. "processing" after completion). No change.
    Stale,
    /// Conditional update lost to a concurrent transition, or the purchase
    /// was already settled through a different payment. No change.
    Conflict,
    /// Event type irrelevant to payment state.
    Ignored,
    /// No local payment matched the correlation id after bounded retry, or
    /// the provider status lookup failed/timed out.
    NotFound,
    /// Signature verification failed. Nothing touched.
    Rejected,
    /// Payload did not parse. Nothing touched.
    Malformed,
}

#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub provider: Provider,
    pub correlation_id: CorrelationId,
    pub refund_id: String,
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct ReconcileResult {
    pub outcome: ReconcileOutcome,
    pub purchase_id: Option<Uuid>,
    pub new_status: Option<PurchaseStatus>,
    pub side_effects: Vec<SideEffect>,
}

impl ReconcileResult {
    fn bare(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            purchase_id: None,
            new_status: None,
            side_effects: Vec::new(),
        }
    }

    /// Whether the notification was matched against local state. Business
    /// rejections still get a 200 acknowledgement at the HTTP boundary —
    /// this flag only feeds the response body and the logs.
    pub fn accepted(&self) -> bool {
        !matches!(
            self.outcome,
            ReconcileOutcome::Rejected | ReconcileOutcome::Malformed | ReconcileOutcome::NotFound
        )
    }
}

/// The state machine shared by every provider webhook and the polling
/// fallback. One entry point, three thin per-provider strategies.
pub struct ReconcileEngine {
    store: Arc<dyn PurchaseStore>,
}

impl ReconcileEngine {
    pub fn new(store: Arc<dyn PurchaseStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PurchaseStore> {
        &self.store
    }

    /// Full webhook path: authenticate, peel the envelope, resolve the
    /// payment, apply the status. Nothing here ever becomes a 5xx — every
    /// rejection is an outcome, not an error.
    pub async fn reconcile(
        &self,
        channel: &dyn ProviderChannel,
        client: &dyn ProviderClient,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<ReconcileResult, EngineError> {
        let provider = channel.provider();

        if !channel.verify(raw_body, headers) {
            tracing::warn!(%provider, "webhook signature rejected");
            return Ok(ReconcileResult::bare(ReconcileOutcome::Rejected));
        }

        let notification = match channel.parse(raw_body) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%provider, error = %e, "malformed webhook payload");
                return Ok(ReconcileResult::bare(ReconcileOutcome::Malformed));
            }
        };

        let (correlation_id, inline_status) = match notification {
            Notification::Ignored { event } => {
                tracing::info!(%provider, event, "event acknowledged, no payment state change");
                return Ok(ReconcileResult::bare(ReconcileOutcome::Ignored));
            }
            Notification::Status {
                correlation_id,
                native_status,
            } => (correlation_id, Some(native_status)),
            Notification::StatusByLookup { correlation_id } => (correlation_id, None),
        };

        let Some(payment) = self.resolve_payment(provider, &correlation_id).await? else {
            tracing::warn!(
                %provider,
                correlation_id = %correlation_id,
                "no payment matched correlation id after {LOOKUP_ATTEMPTS} lookups"
            );
            return Ok(ReconcileResult::bare(ReconcileOutcome::NotFound));
        };

        let native_status = match inline_status {
            Some(native) => native,
            None => match fetch_native_status(client, &correlation_id).await {
                Some(native) => native,
                None => return Ok(ReconcileResult::bare(ReconcileOutcome::NotFound)),
            },
        };

        self.apply_status(&payment, &native_status).await
    }

    /// Resolve the local payment by `(provider, correlation_id)` with
    /// bounded retry for the write-visibility race.
    async fn resolve_payment(
        &self,
        provider: Provider,
        correlation_id: &CorrelationId,
    ) -> Result<Option<PaymentRecord>, EngineError> {
        for attempt in 1..=LOOKUP_ATTEMPTS {
            if let Some(payment) = self
                .store
                .find_payment_by_correlation(provider, correlation_id)
                .await?
            {
                return Ok(Some(payment));
            }
            if attempt < LOOKUP_ATTEMPTS {
                tracing::info!(
                    %provider,
                    correlation_id = %correlation_id,
                    attempt,
                    "payment not visible yet, retrying lookup"
                );
                tokio::time::sleep(LOOKUP_DELAY).await;
            }
        }
        Ok(None)
    }

    /// Apply a provider-native status to a resolved payment. Also the
    /// polling fallback's entry point, so lost webhooks and live webhooks
    /// walk the same transitions.
    pub async fn apply_status(
        &self,
        payment: &PaymentRecord,
        native_status: &str,
    ) -> Result<ReconcileResult, EngineError> {
        let canonical = normalize(payment.provider, native_status);
        let target = canonical.payment_status();

        // Idempotency gate: this notification is already reflected. The
        // single most important check — side effects fire exactly once no
        // matter how often a notification is delivered.
        if payment.status == target {
            if payment.status == PaymentStatus::Pending && payment.native_status != native_status {
                self.store
                    .record_native_status(payment.id, native_status)
                    .await?;
            }
            return Ok(ReconcileResult {
                outcome: ReconcileOutcome::Duplicate,
                purchase_id: Some(payment.purchase_id),
                new_status: None,
                side_effects: Vec::new(),
            });
        }

        match canonical {
            // A pending echo after the payment moved on. Arrival order is
            // not guaranteed; a regression would be a bug, not the echo.
            CanonicalStatus::Pending => {
                tracing::info!(
                    payment_id = %payment.id,
                    current = %payment.status,
                    native_status,
                    "stale pending notification, no change"
                );
                Ok(ReconcileResult {
                    outcome: ReconcileOutcome::Stale,
                    purchase_id: Some(payment.purchase_id),
                    new_status: None,
                    side_effects: Vec::new(),
                })
            }
            CanonicalStatus::Paid => {
                self.transition(
                    payment,
                    native_status,
                    PaymentStatus::Completed,
                    PurchaseStatus::Paid,
                    None,
                    None,
                )
                .await
            }
            CanonicalStatus::Failed => {
                self.transition(
                    payment,
                    native_status,
                    PaymentStatus::Failed,
                    PurchaseStatus::Failed,
                    Some(native_status.to_string()),
                    None,
                )
                .await
            }
            CanonicalStatus::Expired => {
                self.transition(
                    payment,
                    native_status,
                    PaymentStatus::Expired,
                    PurchaseStatus::Expired,
                    None,
                    None,
                )
                .await
            }
            CanonicalStatus::Refunded => {
                self.transition(
                    payment,
                    native_status,
                    PaymentStatus::Refunded,
                    PurchaseStatus::Refunded,
                    None,
                    None,
                )
                .await
            }
        }
    }

    async fn transition(
        &self,
        payment: &PaymentRecord,
        native_status: &str,
        new_payment: PaymentStatus,
        new_purchase: PurchaseStatus,
        failure_reason: Option<String>,
        refund: Option<RefundInfo>,
    ) -> Result<ReconcileResult, EngineError> {
        // The expected predecessors are fixed by the state machines:
        // completed/failed/expired grow out of pending, refunded out of
        // completed/paid.
        let (expected_payment, expected_purchase) = match new_payment {
            PaymentStatus::Refunded => (PaymentStatus::Completed, PurchaseStatus::Paid),
            _ => (PaymentStatus::Pending, PurchaseStatus::Pending),
        };

        let request = TransitionRequest {
            payment_id: payment.id,
            purchase_id: payment.purchase_id,
            expected_payment,
            new_payment,
            expected_purchase,
            new_purchase,
            native_status: native_status.to_string(),
            failure_reason,
            refund,
        };

        match self.store.conditional_transition(request).await? {
            TransitionOutcome::Applied => {
                tracing::info!(
                    payment_id = %payment.id,
                    purchase_id = %payment.purchase_id,
                    from = %payment.status,
                    to = %new_payment,
                    "payment transition applied"
                );
                let side_effects = self.effects_for(payment, new_purchase).await?;
                Ok(ReconcileResult {
                    outcome: ReconcileOutcome::Applied,
                    purchase_id: Some(payment.purchase_id),
                    new_status: Some(new_purchase),
                    side_effects,
                })
            }
            TransitionOutcome::PaymentConflict => {
                tracing::warn!(
                    payment_id = %payment.id,
                    expected = %expected_payment,
                    to = %new_payment,
                    "payment transition rejected, concurrent update won"
                );
                Ok(ReconcileResult {
                    outcome: ReconcileOutcome::Conflict,
                    purchase_id: Some(payment.purchase_id),
                    new_status: None,
                    side_effects: Vec::new(),
                })
            }
            TransitionOutcome::PurchaseConflict => {
                tracing::warn!(
                    payment_id = %payment.id,
                    purchase_id = %payment.purchase_id,
                    "purchase already settled through another payment, no-op"
                );
                Ok(ReconcileResult {
                    outcome: ReconcileOutcome::Conflict,
                    purchase_id: Some(payment.purchase_id),
                    new_status: None,
                    side_effects: Vec::new(),
                })
            }
        }
    }

    /// Admin-initiated refund: the provider refund call already happened
    /// outside this engine; here the payment/purchase pair walks the same
    /// conditional transition a refund notification would, with the
    /// bookkeeping fields recorded.
    pub async fn apply_refund(
        &self,
        command: RefundCommand,
    ) -> Result<ReconcileResult, EngineError> {
        let Some(payment) = self
            .store
            .find_payment_by_correlation(command.provider, &command.correlation_id)
            .await?
        else {
            tracing::warn!(
                provider = %command.provider,
                correlation_id = %command.correlation_id,
                "refund requested for unknown payment"
            );
            return Ok(ReconcileResult::bare(ReconcileOutcome::NotFound));
        };

        if payment.status == PaymentStatus::Refunded {
            return Ok(ReconcileResult {
                outcome: ReconcileOutcome::Duplicate,
                purchase_id: Some(payment.purchase_id),
                new_status: None,
                side_effects: Vec::new(),
            });
        }
        if payment.status != PaymentStatus::Completed {
            return Err(EngineError::Validation(format!(
                "only completed payments can be refunded, payment is {}",
                payment.status
            )));
        }

        let amount = command
            .amount_cents
            .unwrap_or_else(|| payment.money.amount().cents());
        self.transition(
            &payment,
            "refunded",
            PaymentStatus::Refunded,
            PurchaseStatus::Refunded,
            None,
            Some(RefundInfo {
                refund_id: command.refund_id,
                amount,
                reason: command.reason,
            }),
        )
        .await
    }

    async fn effects_for(
        &self,
        payment: &PaymentRecord,
        new_purchase: PurchaseStatus,
    ) -> Result<Vec<SideEffect>, EngineError> {
        match new_purchase {
            PurchaseStatus::Paid => {
                let mut effects = Vec::with_capacity(2);
                match self.store.find_purchase(payment.purchase_id).await? {
                    Some(purchase) => effects.push(SideEffect::IncrementSalesCounters {
                        content_id: purchase.content_id,
                    }),
                    None => tracing::error!(
                        purchase_id = %payment.purchase_id,
                        "paid purchase vanished before counter increment"
                    ),
                }
                effects.push(SideEffect::DeliverContent {
                    purchase_id: payment.purchase_id,
                    payment_id: payment.id,
                });
                Ok(effects)
            }
            PurchaseStatus::Refunded => Ok(vec![SideEffect::RevokeAccess {
                purchase_id: payment.purchase_id,
            }]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Status lookup with the engine's fetch timeout. `None` collapses both
/// provider errors and timeouts into the "not found yet" path.
pub async fn fetch_native_status(
    client: &dyn ProviderClient,
    correlation_id: &CorrelationId,
) -> Option<String> {
    match tokio::time::timeout(STATUS_FETCH_TIMEOUT, client.fetch_status(correlation_id)).await {
        Ok(Ok(native)) => Some(native),
        Ok(Err(e)) => {
            tracing::warn!(correlation_id = %correlation_id, error = %e, "status lookup failed");
            None
        }
        Err(_) => {
            tracing::warn!(correlation_id = %correlation_id, "status lookup timed out");
            None
        }
    }
}
