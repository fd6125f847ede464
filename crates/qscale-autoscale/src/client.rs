//! Collaborator interfaces the autoscaler drives.
//!
//! Implementations must be safe to share across every target's loop; the
//! scheduler holds them behind `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::ClientError;

/// Reads and writes the replica count of a workload.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    async fn replica_count(&self, namespace: &str, workload: &str) -> Result<u32, ClientError>;

    async fn set_replica_count(
        &self,
        namespace: &str,
        workload: &str,
        count: u32,
    ) -> Result<(), ClientError>;
}

/// Reads the number of pending messages in a queue.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn queue_depth(&self, virtual_host: &str, queue: &str) -> Result<u64, ClientError>;
}
