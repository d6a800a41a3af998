use {
    crate::domain::{error::EngineError, payment::Provider, provider::ProviderClient},
    crate::services::dispatch::SideEffect,
    crate::services::reconcile::{ReconcileEngine, fetch_native_status},
    std::{collections::HashMap, sync::Arc, time::Duration},
    tokio::sync::{mpsc, watch},
};

const POLL_INTERVAL: Duration = Duration::from_secs(60);
const STALE_AFTER_MINUTES: i64 = 5;
const BATCH_SIZE: i64 = 50;

/// Recovery path for notifications that never arrive: actively query the
/// provider for payments still pending after a few minutes and push the
/// fetched status through the same reconcile transitions a webhook takes.
pub async fn run_poller(
    engine: Arc<ReconcileEngine>,
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    effects: mpsc::Sender<SideEffect>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("pending-payment poller started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("pending-payment poller shutting down");
                return;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        if let Err(e) = poll_once(&engine, &clients, &effects).await {
            tracing::error!(error = %e, "poller pass failed");
        }
    }
}

async fn poll_once(
    engine: &ReconcileEngine,
    clients: &HashMap<Provider, Arc<dyn ProviderClient>>,
    effects: &mpsc::Sender<SideEffect>,
) -> Result<(), EngineError> {
    let stale = engine
        .store()
        .stale_pending_payments(STALE_AFTER_MINUTES, BATCH_SIZE)
        .await?;

    if stale.is_empty() {
        return Ok(());
    }
    tracing::info!(count = stale.len(), "polling providers for stale pending payments");

    for payment in stale {
        let Some(client) = clients.get(&payment.provider) else {
            tracing::warn!(provider = %payment.provider, "no status client configured");
            continue;
        };

        let Some(native) = fetch_native_status(client.as_ref(), &payment.correlation_id).await
        else {
            continue;
        };

        let result = engine.apply_status(&payment, &native).await?;
        tracing::info!(
            payment_id = %payment.id,
            provider = %payment.provider,
            outcome = ?result.outcome,
            "polled payment reconciled"
        );

        for effect in result.side_effects {
            if effects.send(effect).await.is_err() {
                tracing::warn!("side-effect queue closed, stopping poll pass");
                return Ok(());
            }
        }
    }

    Ok(())
}
