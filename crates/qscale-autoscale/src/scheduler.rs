//! Scheduler — one independently timed loop per scaling target.
//!
//! Each loop ticks at its target's interval, starting immediately, and awaits
//! the running cycle before polling its timer again, so a target never
//! overlaps with itself. When a cycle overruns the interval the missed tick
//! fires as soon as the cycle ends and the cadence restarts from there
//! (`MissedTickBehavior::Delay`); missed ticks are never replayed in a burst.
//!
//! Every cycle runs in its own task. A panic inside a cycle is logged and the
//! target's loop carries on; other targets never notice.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use qscale_core::ScalingTarget;

use crate::evaluator::TargetEvaluator;

/// A running target loop.
struct TargetSlot {
    label: String,
    handle: JoinHandle<()>,
}

/// Owns the loops of every configured target.
///
/// The target set is fixed at start. Dropping the scheduler without calling
/// [`Scheduler::shutdown`] also stops the loops once their running cycle
/// ends, but nothing waits for them.
pub struct Scheduler {
    slots: Vec<TargetSlot>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Spawn one loop per target on the current tokio runtime.
    pub fn start(evaluator: TargetEvaluator, targets: Vec<ScalingTarget>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        let slots: Vec<TargetSlot> = targets
            .into_iter()
            .map(|target| {
                let label = target.label().to_string();
                let evaluator = evaluator.clone();
                let shutdown_rx = shutdown_tx.subscribe();
                let handle = tokio::spawn(async move {
                    run_target_loop(evaluator, Arc::new(target), shutdown_rx).await;
                });
                TargetSlot { label, handle }
            })
            .collect();

        info!(targets = slots.len(), "scheduler started");

        Self { slots, shutdown_tx }
    }

    /// Labels of the scheduled targets, in start order.
    pub fn targets(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stop every loop and wait for them to exit.
    ///
    /// A cycle that is already running is allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for slot in self.slots {
            if let Err(e) = slot.handle.await {
                error!(label = %slot.label, error = %e, "target loop ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

/// The scheduling loop for a single target.
async fn run_target_loop(
    evaluator: TargetEvaluator,
    target: Arc<ScalingTarget>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(target.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        label = %target.label(),
        interval_secs = target.interval().as_secs(),
        "target loop starting"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&evaluator, &target).await;
            }
            _ = shutdown.changed() => {
                debug!(label = %target.label(), "target loop shutting down");
                break;
            }
        }
    }
}

/// Run one cycle in its own task so a panic stays contained.
async fn run_cycle(evaluator: &TargetEvaluator, target: &Arc<ScalingTarget>) {
    let evaluator = evaluator.clone();
    let cycle_target = Arc::clone(target);
    let cycle = tokio::spawn(async move { evaluator.evaluate(&cycle_target).await });

    if let Err(e) = cycle.await {
        error!(label = %target.label(), error = %e, "scaling cycle panicked");
    }
}
