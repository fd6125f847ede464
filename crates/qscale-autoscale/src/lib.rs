//! qscale-autoscale — queue-depth driven replica scaling.
//!
//! Runs one scaling cycle per target per interval. Each cycle reads the
//! deployment's replica count, asks every bound queue's ruleset for a
//! candidate, and writes the largest candidate back when it differs.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── Per-target background task (interval, no self-overlap)
//!   │   └── TargetEvaluator::evaluate()
//!   │       ├── OrchestrationClient::replica_count()
//!   │       ├── BrokerClient::queue_depth()   (per binding, in order)
//!   │       ├── Ruleset::compute_candidate()
//!   │       └── OrchestrationClient::set_replica_count()  (only on change)
//!   └── watch channel for shutdown
//! ```
//!
//! Collaborator failures end the cycle without a write; the next tick tries
//! again.

pub mod client;
pub mod error;
pub mod evaluator;
pub mod scheduler;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use client::{BrokerClient, OrchestrationClient};
pub use error::{ClientError, EvaluateError, EvaluateResult};
pub use evaluator::{ComputedCandidate, ScaleOutcome, TargetEvaluator};
pub use scheduler::Scheduler;
