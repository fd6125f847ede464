//! Target evaluator — one scaling cycle for one target.
//!
//! ```text
//! current = orchestrator.replica_count(ns, deployment)
//! for each binding:
//!     depth     = broker.queue_depth(vhost, queue)
//!     candidate = ruleset.compute_candidate(depth, current)
//! winner = max(candidates)            // first maximum wins
//! if winner != current:
//!     orchestrator.set_replica_count(ns, deployment, winner)
//! ```
//!
//! Max-aggregation lets any queue under pressure force a scale-up; the count
//! only drops when every binding proposes a lower one.

use std::sync::Arc;

use tracing::{error, info, trace};

use qscale_core::{QueueId, ScalingTarget};

use crate::client::{BrokerClient, OrchestrationClient};
use crate::error::{EvaluateError, EvaluateResult};

/// A ruleset's proposal for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedCandidate {
    pub count: u32,
    pub queue: QueueId,
    pub depth: u64,
}

/// What a cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// The replica count was changed.
    Scaled {
        from: u32,
        to: u32,
        trigger: ComputedCandidate,
    },
    /// Every candidate agreed with the current count; nothing was written.
    Unchanged { count: u32 },
    /// A collaborator call failed; nothing was written.
    Failed,
}

/// Runs scaling cycles. Holds no per-target state, so one evaluator is
/// shared by every target loop.
#[derive(Clone)]
pub struct TargetEvaluator {
    orchestrator: Arc<dyn OrchestrationClient>,
    broker: Arc<dyn BrokerClient>,
}

impl TargetEvaluator {
    pub fn new(orchestrator: Arc<dyn OrchestrationClient>, broker: Arc<dyn BrokerClient>) -> Self {
        Self {
            orchestrator,
            broker,
        }
    }

    /// Run one cycle, logging and swallowing any collaborator error.
    pub async fn evaluate(&self, target: &ScalingTarget) -> ScaleOutcome {
        match self.try_evaluate(target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(label = %target.label(), error = %e, "scaling cycle failed");
                ScaleOutcome::Failed
            }
        }
    }

    /// Run one cycle, returning the first collaborator error.
    ///
    /// The count is read before any depth, and written at most once after
    /// every candidate has been computed.
    pub async fn try_evaluate(&self, target: &ScalingTarget) -> EvaluateResult<ScaleOutcome> {
        let namespace = target.namespace();
        let deployment = target.deployment();

        let current = self
            .orchestrator
            .replica_count(namespace, deployment)
            .await
            .map_err(|source| EvaluateError::ReadCount {
                namespace: namespace.to_string(),
                deployment: deployment.to_string(),
                source,
            })?;

        trace!(label = %target.label(), current, "updating replica count");

        let mut winner: Option<ComputedCandidate> = None;
        for binding in target.queues() {
            let queue = &binding.queue;
            let depth = self
                .broker
                .queue_depth(&queue.virtual_host, &queue.name)
                .await
                .map_err(|source| EvaluateError::ReadDepth {
                    queue: queue.clone(),
                    source,
                })?;

            let count = binding.ruleset.compute_candidate(depth, current);
            trace!(
                label = %target.label(),
                %queue,
                depth,
                candidate = count,
                ruleset = %binding.ruleset,
                "computed candidate"
            );

            if winner.as_ref().is_none_or(|w| count > w.count) {
                winner = Some(ComputedCandidate {
                    count,
                    queue: queue.clone(),
                    depth,
                });
            }
        }

        let winner = match winner {
            Some(w) if w.count != current => w,
            _ => {
                trace!(label = %target.label(), current, "replica count unchanged");
                return Ok(ScaleOutcome::Unchanged { count: current });
            }
        };

        self.orchestrator
            .set_replica_count(namespace, deployment, winner.count)
            .await
            .map_err(|source| EvaluateError::WriteCount {
                namespace: namespace.to_string(),
                deployment: deployment.to_string(),
                count: winner.count,
                source,
            })?;

        info!(
            label = %target.label(),
            from = current,
            to = winner.count,
            queue = %winner.queue,
            depth = winner.depth,
            "scaled"
        );

        Ok(ScaleOutcome::Scaled {
            from: current,
            to: winner.count,
            trigger: winner,
        })
    }
}
