use {
    crate::domain::{
        error::EngineError,
        store::{DeliveryGateway, FailureSink, PurchaseStore},
    },
    std::sync::Arc,
    tokio::sync::{mpsc, watch},
    uuid::Uuid,
};

/// Non-transactional actions triggered by, but not part of, a state
/// transition. Executed at most once per transition because the transition
/// itself is conditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    IncrementSalesCounters {
        content_id: Uuid,
    },
    DeliverContent {
        purchase_id: Uuid,
        payment_id: Uuid,
    },
    RevokeAccess {
        purchase_id: Uuid,
    },
}

/// Executes side effects, catching every failure locally. The webhook
/// response never waits on this and never sees its errors.
pub struct Dispatcher {
    store: Arc<dyn PurchaseStore>,
    delivery: Arc<dyn DeliveryGateway>,
    failures: Arc<dyn FailureSink>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn PurchaseStore>,
        delivery: Arc<dyn DeliveryGateway>,
        failures: Arc<dyn FailureSink>,
    ) -> Self {
        Self {
            store,
            delivery,
            failures,
        }
    }

    /// Run every effect; collect failures purely for logging, never for
    /// control flow.
    pub async fn dispatch(&self, effects: Vec<SideEffect>) -> Vec<EngineError> {
        let mut errors = Vec::new();
        for effect in effects {
            if let Err(e) = self.execute(&effect).await {
                tracing::error!(error = %e, ?effect, "side effect failed");
                errors.push(e);
            }
        }
        errors
    }

    async fn execute(&self, effect: &SideEffect) -> Result<(), EngineError> {
        match effect {
            SideEffect::IncrementSalesCounters { content_id } => {
                self.store.increment_sales_counters(*content_id).await
            }
            SideEffect::DeliverContent {
                purchase_id,
                payment_id,
            } => self.deliver(*purchase_id, *payment_id).await,
            SideEffect::RevokeAccess { purchase_id } => {
                self.store.revoke_access(*purchase_id).await
            }
        }
    }

    /// Money was captured, so a failed delivery is an operator problem, not
    /// a rollback: write it to the failure ledger and move on. Recovery is a
    /// manual admin retry.
    async fn deliver(&self, purchase_id: Uuid, payment_id: Uuid) -> Result<(), EngineError> {
        let Err(e) = self.delivery.deliver(purchase_id).await else {
            tracing::info!(%purchase_id, "content delivered");
            return Ok(());
        };

        let meta = serde_json::json!({
            "purchase_id": purchase_id,
            "payment_id": payment_id,
            "error": e.to_string(),
        });
        if let Err(sink_err) = self
            .failures
            .log_failure(
                "delivery_failed",
                &format!("failed to deliver content for purchase {purchase_id}: {e}"),
                meta,
            )
            .await
        {
            tracing::error!(%purchase_id, error = %sink_err, "failure ledger write failed");
        }
        Err(e)
    }
}

/// Background worker draining the side-effect queue. The HTTP boundary
/// enqueues after acknowledging the provider; a bounded channel gives the
/// producers backpressure if delivery backs up.
pub async fn run_dispatcher(
    dispatcher: Arc<Dispatcher>,
    mut effects: mpsc::Receiver<SideEffect>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("side-effect dispatcher started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Drain what's already queued so an orderly shutdown doesn't
                // drop deliveries that were accepted.
                effects.close();
                while let Some(effect) = effects.recv().await {
                    let _ = dispatcher.dispatch(vec![effect]).await;
                }
                tracing::info!("side-effect dispatcher shutting down");
                return;
            }
            effect = effects.recv() => match effect {
                Some(effect) => {
                    let _ = dispatcher.dispatch(vec![effect]).await;
                }
                None => {
                    tracing::info!("side-effect queue closed");
                    return;
                }
            }
        }
    }
}
