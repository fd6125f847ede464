//! Error types for configuration loading and ruleset construction.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::QueueId;

/// Errors raised while building a ruleset from its parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesetError {
    #[error("ruleset must contain at least one rule")]
    NoRules,

    #[error("duplicate threshold: {0} messages")]
    DuplicateThreshold(u64),

    #[error("replica count decreases from {from} to {to} at threshold {threshold}")]
    DecreasingCount { threshold: u64, from: u32, to: u32 },

    #[error("{field} must be {requirement}, got {value}")]
    InvalidParameter {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },

    #[error("min_count ({min}) must not exceed max_count ({max})")]
    InvertedBounds { min: u32, max: u32 },
}

/// Errors raised while assembling a scaling target.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TargetError {
    #[error("target must bind at least one queue")]
    NoQueues,

    #[error("queue {0} is bound more than once")]
    DuplicateQueue(QueueId),

    #[error("interval must be at least 1 second")]
    IntervalTooShort,
}

/// Errors raised while parsing a value with a unit suffix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("value must not be empty")]
    Empty,

    #[error("value is not a valid number: {0}")]
    InvalidNumber(String),

    #[error("invalid unit: {0}")]
    InvalidUnit(char),
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{path}: missing namespace and no default is present")]
    MissingNamespace { path: String },

    #[error("{path}: invalid {what} '{value}': {source}")]
    InvalidValue {
        path: String,
        what: &'static str,
        value: String,
        #[source]
        source: UnitError,
    },

    #[error("{path}: {source}")]
    Ruleset {
        path: String,
        #[source]
        source: RulesetError,
    },

    #[error("{path}: {source}")]
    Target {
        path: String,
        #[source]
        source: TargetError,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
