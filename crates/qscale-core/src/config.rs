//! qscale.toml configuration parser.
//!
//! The file is deserialized into raw `*Config` structs that mirror the TOML
//! layout, then resolved against `[defaults]` into validated
//! [`ScalingTarget`]s. Resolution stops at the first violation.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::ruleset::{LinearScale, LogScale, Ruleset, StepLimit, StepRule};
use crate::types::{DEFAULT_LABEL, DEFAULT_VIRTUAL_HOST, QueueBinding, QueueId, ScalingTarget};
use crate::units::{parse_count, parse_interval};

pub const DEFAULT_STEP_THRESHOLD: u32 = 1;
pub const DEFAULT_MIN_COUNT: u32 = 1;
pub const DEFAULT_MAX_COUNT: u32 = 10;
pub const DEFAULT_LOG_OFFSET: i32 = 0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QscaleConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    pub namespace: Option<String>,
    pub virtual_host: Option<String>,
    pub min_count: Option<u32>,
    pub max_count: Option<u32>,
    pub step_threshold: Option<u32>,
    pub log_offset: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub label: Option<String>,
    pub namespace: Option<String>,
    pub deployment: String,
    pub interval: IntervalValue,
    #[serde(default, rename = "queue")]
    pub queues: Vec<QueueConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    pub virtual_host: Option<String>,
    pub name: String,
    pub ruleset: RulesetConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum RulesetConfig {
    #[serde(rename = "limit")]
    Limit { rules: Vec<LimitRuleConfig> },
    #[serde(rename = "linearScale")]
    LinearScale {
        factor: f64,
        step_threshold: Option<u32>,
        min_count: Option<u32>,
        max_count: Option<u32>,
    },
    #[serde(rename = "logScale")]
    LogScale {
        base: f64,
        step_threshold: Option<u32>,
        min_count: Option<u32>,
        max_count: Option<u32>,
        offset: Option<i32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitRuleConfig {
    pub min_messages: CountValue,
    pub count: u32,
}

/// A message count: a plain integer or a string with a `k`/`m` suffix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    Number(u64),
    Text(String),
}

/// An interval: plain seconds or a string with an `s`/`m`/`h`/`d` suffix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IntervalValue {
    Seconds(u64),
    Text(String),
}

impl FromStr for QscaleConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl QscaleConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Resolve every target against the defaults.
    ///
    /// `fallback_namespace` is used when neither the target nor `[defaults]`
    /// names a namespace.
    pub fn resolve(&self, fallback_namespace: Option<&str>) -> ConfigResult<Vec<ScalingTarget>> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, target)| self.resolve_target(i, target, fallback_namespace))
            .collect()
    }

    fn resolve_target(
        &self,
        index: usize,
        target: &TargetConfig,
        fallback_namespace: Option<&str>,
    ) -> ConfigResult<ScalingTarget> {
        let label = target.label.as_deref().unwrap_or(DEFAULT_LABEL);
        let path = format!("target[{index}] ({label})");

        let namespace = target
            .namespace
            .as_deref()
            .or(self.defaults.namespace.as_deref())
            .or(fallback_namespace)
            .ok_or_else(|| ConfigError::MissingNamespace { path: path.clone() })?;

        let interval = match &target.interval {
            IntervalValue::Seconds(secs) => std::time::Duration::from_secs(*secs),
            IntervalValue::Text(text) => {
                parse_interval(text).map_err(|source| ConfigError::InvalidValue {
                    path: path.clone(),
                    what: "interval",
                    value: text.clone(),
                    source,
                })?
            }
        };

        let queues = target
            .queues
            .iter()
            .enumerate()
            .map(|(qi, queue)| self.resolve_queue(&path, qi, queue))
            .collect::<ConfigResult<Vec<_>>>()?;

        ScalingTarget::new(label, namespace, &target.deployment, interval, queues)
            .map_err(|source| ConfigError::Target { path, source })
    }

    fn resolve_queue(
        &self,
        target_path: &str,
        index: usize,
        queue: &QueueConfig,
    ) -> ConfigResult<QueueBinding> {
        let virtual_host = queue
            .virtual_host
            .as_deref()
            .or(self.defaults.virtual_host.as_deref())
            .unwrap_or(DEFAULT_VIRTUAL_HOST);
        let id = QueueId::new(virtual_host, &queue.name);
        let path = format!("{target_path}.queue[{index}] ({id})");

        let ruleset = self.resolve_ruleset(&path, &queue.ruleset)?;
        Ok(QueueBinding::new(id, ruleset))
    }

    fn resolve_ruleset(&self, path: &str, config: &RulesetConfig) -> ConfigResult<Ruleset> {
        let d = &self.defaults;
        let step_default = d.step_threshold.unwrap_or(DEFAULT_STEP_THRESHOLD);
        let min_default = d.min_count.unwrap_or(DEFAULT_MIN_COUNT);
        let max_default = d.max_count.unwrap_or(DEFAULT_MAX_COUNT);

        let ruleset = match config {
            RulesetConfig::Limit { rules } => {
                let rules = rules
                    .iter()
                    .map(|rule| -> ConfigResult<StepRule> {
                        let min_depth = match &rule.min_messages {
                            CountValue::Number(n) => *n,
                            CountValue::Text(text) => {
                                parse_count(text).map_err(|source| ConfigError::InvalidValue {
                                    path: path.to_string(),
                                    what: "min_messages",
                                    value: text.clone(),
                                    source,
                                })?
                            }
                        };
                        Ok(StepRule::new(min_depth, rule.count))
                    })
                    .collect::<ConfigResult<Vec<_>>>()?;
                StepLimit::new(rules).map(Ruleset::from)
            }
            RulesetConfig::LinearScale {
                factor,
                step_threshold,
                min_count,
                max_count,
            } => LinearScale::new(
                *factor,
                step_threshold.unwrap_or(step_default),
                min_count.unwrap_or(min_default),
                max_count.unwrap_or(max_default),
            )
            .map(Ruleset::from),
            RulesetConfig::LogScale {
                base,
                step_threshold,
                min_count,
                max_count,
                offset,
            } => LogScale::new(
                *base,
                step_threshold.unwrap_or(step_default),
                min_count.unwrap_or(min_default),
                max_count.unwrap_or(max_default),
                offset.or(d.log_offset).unwrap_or(DEFAULT_LOG_OFFSET),
            )
            .map(Ruleset::from),
        };

        ruleset.map_err(|source| ConfigError::Ruleset {
            path: path.to_string(),
            source,
        })
    }
}

/// Read, parse and resolve a config file in one step.
pub fn load_targets(path: &Path, fallback_namespace: Option<&str>) -> ConfigResult<Vec<ScalingTarget>> {
    QscaleConfig::from_file(path)?.resolve(fallback_namespace)
}
