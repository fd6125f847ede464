//! Autoscaler error types.

use qscale_core::QueueId;
use thiserror::Error;

/// Errors reported by the orchestration and broker clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors that abort a single evaluation cycle.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("failed to read replica count of {namespace}/{deployment}: {source}")]
    ReadCount {
        namespace: String,
        deployment: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to read depth of queue {queue}: {source}")]
    ReadDepth {
        queue: QueueId,
        #[source]
        source: ClientError,
    },

    #[error("failed to scale {namespace}/{deployment} to {count}: {source}")]
    WriteCount {
        namespace: String,
        deployment: String,
        count: u32,
        #[source]
        source: ClientError,
    },
}

pub type EvaluateResult<T> = Result<T, EvaluateError>;
