use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        metadata::Metadata,
        money::{Currency, Money, MoneyAmount},
        payment::{NewPayment, PaymentRecord, PaymentStatus, Provider, RefundInfo},
        purchase::{NewPurchase, Purchase, PurchaseStatus},
        store::{BoxFuture, PurchaseStore, TransitionOutcome, TransitionRequest},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

/// Hours of access granted when a purchase is paid.
const ACCESS_WINDOW_HOURS: i32 = 24;

pub struct PgPurchaseStore {
    pool: PgPool,
}

impl PgPurchaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    purchase_id: Uuid,
    provider: String,
    correlation_id: String,
    status: String,
    native_status: String,
    amount: i64,
    currency: String,
    failure_reason: Option<String>,
    refund_id: Option<String>,
    refund_amount: Option<i64>,
    refund_reason: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
}

impl PaymentRow {
    fn into_domain(self) -> Result<PaymentRecord, EngineError> {
        let refund = self.refund_id.map(|refund_id| RefundInfo {
            refund_id,
            amount: self.refund_amount.unwrap_or(0),
            reason: self.refund_reason,
        });
        Ok(PaymentRecord {
            id: self.id,
            purchase_id: self.purchase_id,
            provider: Provider::try_from(self.provider.as_str())?,
            correlation_id: CorrelationId::new(self.correlation_id)?,
            status: PaymentStatus::try_from(self.status.as_str())?,
            native_status: self.native_status,
            money: Money::new(
                MoneyAmount::new(self.amount)?,
                Currency::try_from(self.currency.as_str())?,
            ),
            failure_reason: self.failure_reason,
            refund,
            metadata: Metadata::from_value(self.metadata),
            created_at: self.created_at,
            processed_at: self.processed_at,
            refunded_at: self.refunded_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, purchase_id, provider, correlation_id, status, native_status, \
     amount, currency, failure_reason, refund_id, refund_amount, refund_reason, \
     metadata, created_at, processed_at, refunded_at";

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    content_id: Uuid,
    buyer_id: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    correlation_id: Option<String>,
    metadata: serde_json::Value,
    access_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_domain(self) -> Result<Purchase, EngineError> {
        Ok(Purchase {
            id: self.id,
            content_id: self.content_id,
            buyer_id: self.buyer_id,
            money: Money::new(
                MoneyAmount::new(self.amount)?,
                Currency::try_from(self.currency.as_str())?,
            ),
            status: PurchaseStatus::try_from(self.status.as_str())?,
            correlation_id: self.correlation_id,
            metadata: Metadata::from_value(self.metadata),
            access_expires_at: self.access_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PurchaseStore for PgPurchaseStore {
    fn find_payment_by_correlation(
        &self,
        provider: Provider,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<Option<PaymentRecord>, EngineError>> {
        let correlation_id = correlation_id.as_str().to_string();
        Box::pin(async move {
            let row: Option<PaymentRow> = sqlx::query_as(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider = $1 AND correlation_id = $2"
            ))
            .bind(provider.as_str())
            .bind(&correlation_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(PaymentRow::into_domain).transpose()
        })
    }

    fn find_purchase(
        &self,
        purchase_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Purchase>, EngineError>> {
        Box::pin(async move {
            let row: Option<PurchaseRow> = sqlx::query_as(
                "SELECT id, content_id, buyer_id, amount, currency, status, correlation_id, \
                 metadata, access_expires_at, created_at, updated_at \
                 FROM purchases WHERE id = $1",
            )
            .bind(purchase_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(PurchaseRow::into_domain).transpose()
        })
    }

    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, EngineError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            // "Set status = X where status = expected" — two concurrent
            // notifications cannot both match, so side effects fire once.
            let (refund_id, refund_amount, refund_reason) = match &request.refund {
                Some(r) => (
                    Some(r.refund_id.clone()),
                    Some(r.amount),
                    r.reason.clone(),
                ),
                None => (None, None, None),
            };

            let payment = sqlx::query(
                "UPDATE payments SET \
                     status = $1, \
                     native_status = $2, \
                     failure_reason = COALESCE($3, failure_reason), \
                     refund_id = COALESCE($4, refund_id), \
                     refund_amount = COALESCE($5, refund_amount), \
                     refund_reason = COALESCE($6, refund_reason), \
                     processed_at = CASE WHEN $1 = 'completed' THEN now() ELSE processed_at END, \
                     refunded_at = CASE WHEN $1 = 'refunded' THEN now() ELSE refunded_at END, \
                     updated_at = now() \
                 WHERE id = $7 AND status = $8",
            )
            .bind(request.new_payment.as_str())
            .bind(&request.native_status)
            .bind(&request.failure_reason)
            .bind(&refund_id)
            .bind(&refund_amount)
            .bind(&refund_reason)
            .bind(request.payment_id)
            .bind(request.expected_payment.as_str())
            .execute(&mut *tx)
            .await?;

            if payment.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(TransitionOutcome::PaymentConflict);
            }

            let purchase = sqlx::query(
                "UPDATE purchases SET \
                     status = $1, \
                     access_expires_at = CASE WHEN $1 = 'paid' \
                         THEN now() + make_interval(hours => $2) \
                         ELSE access_expires_at END, \
                     updated_at = now() \
                 WHERE id = $3 AND status = $4",
            )
            .bind(request.new_purchase.as_str())
            .bind(ACCESS_WINDOW_HOURS)
            .bind(request.purchase_id)
            .bind(request.expected_purchase.as_str())
            .execute(&mut *tx)
            .await?;

            // Both updates or neither: a purchase already settled through
            // another payment rolls this payment's update back too, so at
            // most one payment per purchase ever completes.
            if purchase.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(TransitionOutcome::PurchaseConflict);
            }

            tx.commit().await?;
            Ok(TransitionOutcome::Applied)
        })
    }

    fn record_native_status(
        &self,
        payment_id: Uuid,
        native_status: &str,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        let native_status = native_status.to_string();
        Box::pin(async move {
            sqlx::query(
                "UPDATE payments SET native_status = $1, updated_at = now() \
                 WHERE id = $2 AND status = 'pending'",
            )
            .bind(&native_status)
            .bind(payment_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn increment_sales_counters(&self, content_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                "UPDATE content SET \
                     weekly_sales = weekly_sales + 1, \
                     total_sales = total_sales + 1, \
                     purchases_count = purchases_count + 1 \
                 WHERE id = $1",
            )
            .bind(content_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn revoke_access(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                "UPDATE purchases SET access_expires_at = now(), updated_at = now() WHERE id = $1",
            )
            .bind(purchase_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn stale_pending_payments(
        &self,
        older_than_minutes: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<PaymentRecord>, EngineError>> {
        Box::pin(async move {
            let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments \
                 WHERE status = 'pending' AND created_at < now() - make_interval(mins => $1) \
                 ORDER BY created_at \
                 LIMIT $2"
            ))
            .bind(i32::try_from(older_than_minutes).unwrap_or(i32::MAX))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(PaymentRow::into_domain).collect()
        })
    }

    fn content_price(&self, content_id: Uuid) -> BoxFuture<'_, Result<Option<Money>, EngineError>> {
        Box::pin(async move {
            let row: Option<(i64, String)> =
                sqlx::query_as("SELECT price, currency FROM content WHERE id = $1")
                    .bind(content_id)
                    .fetch_optional(&self.pool)
                    .await?;
            row.map(|(price, currency)| {
                Ok(Money::new(
                    MoneyAmount::new(price)?,
                    Currency::try_from(currency.as_str())?,
                ))
            })
            .transpose()
        })
    }

    fn create_purchase(&self, purchase: NewPurchase) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO purchases (id, content_id, buyer_id, amount, currency, status, metadata) \
                 VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
            )
            .bind(purchase.id)
            .bind(purchase.content_id)
            .bind(&purchase.buyer_id)
            .bind(purchase.money.amount().cents())
            .bind(purchase.money.currency().as_str())
            .bind(purchase.metadata.as_value())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn create_payment(&self, payment: NewPayment) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO payments (id, purchase_id, provider, correlation_id, status, amount, currency, metadata) \
                 VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7)",
            )
            .bind(payment.id)
            .bind(payment.purchase_id)
            .bind(payment.provider.as_str())
            .bind(payment.correlation_id.as_str())
            .bind(payment.money.amount().cents())
            .bind(payment.money.currency().as_str())
            .bind(payment.metadata.as_value())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}
