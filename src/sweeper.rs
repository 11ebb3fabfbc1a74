//! Expiry sweeper: the liveness half of the entitlement invariants.
//!
//! Webhook delivery keeps order state correct when the gateway talks to us;
//! the sweeper keeps time-based state correct when nothing does. It runs on
//! its own timer, touches only expiry-driven transitions, and needs no other
//! component to be reachable.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{queries, DbPool};
use crate::error::Result;

/// Pending orders older than this are locally expired even if the gateway's
/// own expire notification never arrived (24h payment window).
const PENDING_ORDER_TTL_SECS: i64 = 24 * 3600;

/// What one sweep pass changed.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct SweepReport {
    pub expired_subscriptions: usize,
    pub expired_orders: usize,
}

/// Run a single sweep pass. Re-entrant: a second pass in the same window
/// matches zero rows.
pub fn run_sweep(conn: &rusqlite::Connection) -> Result<SweepReport> {
    let expired_subscriptions = queries::sweep_expired_subscriptions(conn)?;
    let expired_orders = queries::sweep_overdue_pending_orders(conn, PENDING_ORDER_TTL_SECS)?;
    Ok(SweepReport {
        expired_subscriptions,
        expired_orders,
    })
}

/// Periodic sweeper with an explicit start/stop lifecycle, independent of
/// the HTTP server.
pub struct Sweeper {
    db: DbPool,
    interval: Duration,
}

/// Handle to a running sweeper; dropping it does not stop the task,
/// `shutdown` does.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(db: DbPool, interval: Duration) -> Self {
        Self { db, interval }
    }

    pub fn start(self) -> SweeperHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = stopped.changed() => {
                        tracing::info!("Expiry sweeper stopping");
                        return;
                    }
                }

                match self.db.get() {
                    Ok(conn) => match run_sweep(&conn) {
                        Ok(report) => {
                            if report.expired_subscriptions > 0 || report.expired_orders > 0 {
                                tracing::info!(
                                    expired_subscriptions = report.expired_subscriptions,
                                    expired_orders = report.expired_orders,
                                    "Expiry sweep"
                                );
                            }
                        }
                        Err(e) => tracing::warn!("Expiry sweep failed: {}", e),
                    },
                    Err(e) => tracing::warn!("Failed to get db connection for sweep: {}", e),
                }
            }
        });

        tracing::info!("Expiry sweeper started");
        SweeperHandle { stop, task }
    }
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
