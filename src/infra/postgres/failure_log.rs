use {
    crate::domain::{
        error::EngineError,
        store::{BoxFuture, FailureSink},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

/// Failure ledger backing manual operator recovery. A row here means "money
/// was taken, something downstream did not happen".
pub struct PgFailureSink {
    pool: PgPool,
}

impl PgFailureSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl FailureSink for PgFailureSink {
    fn log_failure(
        &self,
        kind: &str,
        message: &str,
        meta: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        let kind = kind.to_string();
        let message = message.to_string();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO system_logs (id, kind, level, message, metadata) \
                 VALUES ($1, $2, 'error', $3, $4)",
            )
            .bind(Uuid::now_v7())
            .bind(&kind)
            .bind(&message)
            .bind(&meta)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}
