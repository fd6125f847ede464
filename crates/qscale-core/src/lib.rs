//! qscale-core — scaling targets, rulesets and configuration.
//!
//! Everything here is pure: no I/O besides reading the config file. The
//! autoscaler crate consumes the immutable [`ScalingTarget`]s produced by
//! [`config::load_targets`].
//!
//! # Rulesets
//!
//! ```text
//! limit        largest threshold <= depth  -> its count
//! linearScale  round(depth * factor)       -> clamp -> hysteresis
//! logScale     round(log_b(depth) + off)   -> clamp -> hysteresis
//! ```

pub mod config;
pub mod error;
pub mod ruleset;
pub mod types;
pub mod units;

pub use config::{QscaleConfig, load_targets};
pub use error::{ConfigError, ConfigResult, RulesetError, TargetError, UnitError};
pub use ruleset::{LinearScale, LogScale, Ruleset, StepLimit, StepRule};
pub use types::*;
