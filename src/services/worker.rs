use {
    crate::domain::reconcile::SyncMode,
    crate::services::{payment_pipeline::PaymentPipeline, reconciler::Reconciler},
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

const REPAIR_BATCH: i64 = 10;

/// Re-run partially fulfilled events and expire old dedup rows.
pub async fn run_repair(
    pipeline: Arc<PaymentPipeline>,
    interval: Duration,
    retention: chrono::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("repair worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("repair worker shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match pipeline.repair_once(REPAIR_BATCH).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "repaired partial events"),
            Err(e) => tracing::error!(error = %e, "repair poll error"),
        }

        match pipeline.purge_completed(retention).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "purged expired event ids"),
            Err(e) => tracing::error!(error = %e, "purge error"),
        }
    }
}

/// Periodic full reconciliation of the domain mirror.
pub async fn run_scheduled_reconcile(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "scheduled reconciliation started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("scheduled reconciliation shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if let Err(e) = reconciler.reconcile(None, SyncMode::Full).await {
            tracing::error!(error = %e, "scheduled reconciliation failed");
        }
    }
}
