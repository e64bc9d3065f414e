use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use tokri_order::manager::OrderManager;

/// Background reconciliation sweep. The cadence and batch bound come
/// from configuration; the hosting runtime decides when this future
/// actually runs.
pub async fn run_reconciliation_worker(orders: Arc<OrderManager>, interval_secs: u64, batch: u32) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    info!(
        "Reconciliation worker started (every {}s, batch {})",
        interval_secs, batch
    );

    loop {
        ticker.tick().await;
        match orders.sweep(batch).await {
            Ok(report) => {
                if report.scanned > 0 {
                    info!(
                        "Reconciliation sweep: {} scanned, {} synced, {} failed",
                        report.scanned, report.synced, report.failed
                    );
                }
            }
            Err(e) => error!("Reconciliation sweep could not run: {}", e),
        }
    }
}
