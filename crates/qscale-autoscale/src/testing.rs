//! In-memory collaborators for tests.
//!
//! [`FakeBackend`] implements both [`OrchestrationClient`] and
//! [`BrokerClient`] and journals every call, so tests can assert on the
//! order of reads and writes inside a cycle.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use qscale_core::QueueId;

use crate::client::{BrokerClient, OrchestrationClient};
use crate::error::ClientError;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadCount { namespace: String, deployment: String },
    ReadDepth { queue: QueueId },
    WriteCount { namespace: String, deployment: String, count: u32 },
}

#[derive(Default)]
struct State {
    counts: HashMap<(String, String), u32>,
    depths: HashMap<QueueId, u64>,
    failing_queues: HashSet<QueueId>,
    panicking_queues: HashSet<QueueId>,
    delays: HashMap<QueueId, Duration>,
    fail_writes: bool,
    calls: Vec<Call>,
    in_flight: HashMap<QueueId, usize>,
    max_in_flight: HashMap<QueueId, usize>,
}

/// Fake cluster plus broker.
///
/// Writes update the stored count, so a second cycle observes the result of
/// the first.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(self, namespace: &str, deployment: &str, count: u32) -> Self {
        self.set_count(namespace, deployment, count);
        self
    }

    pub fn with_depth(self, virtual_host: &str, queue: &str, depth: u64) -> Self {
        self.set_depth(virtual_host, queue, depth);
        self
    }

    pub fn set_count(&self, namespace: &str, deployment: &str, count: u32) {
        self.state
            .lock()
            .counts
            .insert((namespace.to_string(), deployment.to_string()), count);
    }

    pub fn set_depth(&self, virtual_host: &str, queue: &str, depth: u64) {
        self.state
            .lock()
            .depths
            .insert(QueueId::new(virtual_host, queue), depth);
    }

    /// Make depth reads of a queue fail with a transport error.
    pub fn fail_queue(&self, virtual_host: &str, queue: &str) {
        self.state
            .lock()
            .failing_queues
            .insert(QueueId::new(virtual_host, queue));
    }

    /// Make depth reads of a queue panic.
    pub fn panic_on_queue(&self, virtual_host: &str, queue: &str) {
        self.state
            .lock()
            .panicking_queues
            .insert(QueueId::new(virtual_host, queue));
    }

    /// Delay depth reads of a queue.
    pub fn delay_queue(&self, virtual_host: &str, queue: &str, delay: Duration) {
        self.state
            .lock()
            .delays
            .insert(QueueId::new(virtual_host, queue), delay);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn count(&self, namespace: &str, deployment: &str) -> Option<u32> {
        self.state
            .lock()
            .counts
            .get(&(namespace.to_string(), deployment.to_string()))
            .copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::WriteCount { .. }))
            .collect()
    }

    /// Number of replica-count reads for a deployment, i.e. started cycles.
    pub fn count_reads(&self, deployment: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::ReadCount { deployment: d, .. } if d == deployment))
            .count()
    }

    /// Highest number of concurrent depth reads seen for a queue.
    pub fn max_in_flight(&self, virtual_host: &str, queue: &str) -> usize {
        self.state
            .lock()
            .max_in_flight
            .get(&QueueId::new(virtual_host, queue))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl OrchestrationClient for FakeBackend {
    async fn replica_count(&self, namespace: &str, workload: &str) -> Result<u32, ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ReadCount {
            namespace: namespace.to_string(),
            deployment: workload.to_string(),
        });
        state
            .counts
            .get(&(namespace.to_string(), workload.to_string()))
            .copied()
            .ok_or_else(|| ClientError::NotFound(format!("deployment {namespace}/{workload}")))
    }

    async fn set_replica_count(
        &self,
        namespace: &str,
        workload: &str,
        count: u32,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        state.calls.push(Call::WriteCount {
            namespace: namespace.to_string(),
            deployment: workload.to_string(),
            count,
        });
        state
            .counts
            .insert((namespace.to_string(), workload.to_string()), count);
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for FakeBackend {
    async fn queue_depth(&self, virtual_host: &str, queue: &str) -> Result<u64, ClientError> {
        let id = QueueId::new(virtual_host, queue);

        let delay = {
            let mut state = self.state.lock();
            state.calls.push(Call::ReadDepth { queue: id.clone() });
            if state.panicking_queues.contains(&id) {
                drop(state);
                panic!("depth read of {id} panicked");
            }
            let in_flight = state.in_flight.entry(id.clone()).or_default();
            *in_flight += 1;
            let current = *in_flight;
            let max = state.max_in_flight.entry(id.clone()).or_default();
            *max = (*max).max(current);
            state.delays.get(&id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(in_flight) = state.in_flight.get_mut(&id) {
            *in_flight -= 1;
        }
        if state.failing_queues.contains(&id) {
            return Err(ClientError::Transport(format!("broker unreachable for {id}")));
        }
        state
            .depths
            .get(&id)
            .copied()
            .ok_or_else(|| ClientError::NotFound(format!("queue {id}")))
    }
}
