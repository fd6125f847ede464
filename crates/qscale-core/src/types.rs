//! Scaling targets and their queue bindings.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::error::TargetError;
use crate::ruleset::Ruleset;

/// Label used for targets that do not name themselves.
pub const DEFAULT_LABEL: &str = "_unnamed_";
/// Virtual host used for queues that do not name one.
pub const DEFAULT_VIRTUAL_HOST: &str = "/";

/// Identity of a queue on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueId {
    pub virtual_host: String,
    pub name: String,
}

impl QueueId {
    pub fn new(virtual_host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            virtual_host: virtual_host.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.virtual_host, self.name)
    }
}

/// A queue paired with the ruleset that turns its depth into a replica count.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueBinding {
    pub queue: QueueId,
    pub ruleset: Ruleset,
}

impl QueueBinding {
    pub fn new(queue: QueueId, ruleset: impl Into<Ruleset>) -> Self {
        Self {
            queue,
            ruleset: ruleset.into(),
        }
    }
}

/// One workload to scale, evaluated on its own interval.
///
/// Built once at startup and never mutated afterwards. Bindings keep the
/// order they were declared in, which decides the reported trigger when
/// several queues propose the same count.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingTarget {
    label: String,
    namespace: String,
    deployment: String,
    interval: Duration,
    queues: Vec<QueueBinding>,
}

impl ScalingTarget {
    /// Assemble a target.
    ///
    /// Requires at least one binding, no queue bound twice, and an interval
    /// of at least one second.
    pub fn new(
        label: impl Into<String>,
        namespace: impl Into<String>,
        deployment: impl Into<String>,
        interval: Duration,
        queues: Vec<QueueBinding>,
    ) -> Result<Self, TargetError> {
        if queues.is_empty() {
            return Err(TargetError::NoQueues);
        }
        if interval < Duration::from_secs(1) {
            return Err(TargetError::IntervalTooShort);
        }

        let mut seen = HashSet::new();
        for binding in &queues {
            if !seen.insert(&binding.queue) {
                return Err(TargetError::DuplicateQueue(binding.queue.clone()));
            }
        }

        Ok(Self {
            label: label.into(),
            namespace: namespace.into(),
            deployment: deployment.into(),
            interval,
            queues,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn queues(&self) -> &[QueueBinding] {
        &self.queues
    }
}

impl fmt::Display for ScalingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}/{} every {}s (",
            self.label,
            self.namespace,
            self.deployment,
            self.interval.as_secs()
        )?;
        for (i, binding) in self.queues.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", binding.queue, binding.ruleset)?;
        }
        write!(f, ")")
    }
}
