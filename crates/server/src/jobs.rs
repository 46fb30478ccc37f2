//! Background loops: the SLA monitor poll and the stagnation sweep interval.
//!
//! Both are stopped through a shared shutdown watch channel so the server can
//! release its timers cleanly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use funil_core::monitor::{classify, SlaSnapshot};
use funil_core::store::DealStore;
use funil_core::sweep::StagnationSweeper;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Re-evaluates every active deal on each tick and publishes the resulting
/// snapshot. Pull-based: consumers read the latest value from the receiver;
/// no history is kept across polls.
pub fn spawn_sla_monitor(
    deals: Arc<dyn DealStore>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (watch::Receiver<SlaSnapshot>, JoinHandle<()>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(SlaSnapshot::empty(Utc::now()));

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match deals.list_active(None).await {
                        Ok(active) => {
                            let snapshot = classify(&active, Utc::now());
                            if !snapshot.violations.is_empty() {
                                warn!(
                                    event_name = "sla.monitor.violations",
                                    violations = snapshot.violations.len(),
                                    warnings = snapshot.warnings.len(),
                                    "deals over their response budget"
                                );
                            }
                            let _ = snapshot_tx.send(snapshot);
                        }
                        Err(error) => {
                            warn!(
                                event_name = "sla.monitor.poll_failed",
                                error = %error,
                                "sla monitor poll failed"
                            );
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!(event_name = "sla.monitor.stopped", "sla monitor stopped");
    });

    (snapshot_rx, handle)
}

/// Runs the stagnation sweep once per interval. The interval is the external
/// "may I run" gate the sweeper itself deliberately does not implement; the
/// first run happens one full period after startup.
pub fn spawn_sweep_job(
    sweeper: Arc<StagnationSweeper>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = sweeper.run(Utc::now()).await {
                        warn!(
                            event_name = "sweep.run_failed",
                            error = %error,
                            "scheduled stagnation sweep failed"
                        );
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!(event_name = "sweep.job.stopped", "sweep job stopped");
    })
}
