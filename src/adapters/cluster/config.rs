use std::time::Duration;

use super::Schedule;
use crate::{Error, Result};

/// Per-backend configuration consumed by a backend constructor.
///
/// The cluster only needs access to the timeout so it can hand down its
/// cluster-wide default; everything else is opaque to it.
pub trait BackendConfig {
    /// The timeout this backend was configured with, if any.
    fn timeout(&self) -> Option<Duration>;

    /// Set the backend timeout.
    fn set_timeout(&mut self, timeout: Duration);
}

/// Configuration for a [`ClusterStorage`](super::ClusterStorage).
///
/// ```
/// # use std::time::Duration;
/// # use stowage_cluster::{ClusterConfig, MemoryConfig, Schedule};
/// let config = ClusterConfig::new(vec![MemoryConfig::new("a"), MemoryConfig::new("b")])
///     .with_schedule(Schedule::MasterSlave)
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(config.backends.len(), 2);
/// ```
///
/// With the `serde` feature it can be loaded from JSON. `backends` may also
/// be spelled `cluster`, and `timeout` takes milliseconds or a string such as
/// `"60s"`:
///
/// ```
/// # #[cfg(feature = "serde")]
/// # fn example() -> stowage_cluster::Result<()> {
/// # use stowage_cluster::{ClusterConfig, MemoryConfig, Schedule};
/// let config: ClusterConfig<MemoryConfig> = ClusterConfig::from_json_str(
///     r#"{ "cluster": [{ "bucket": "a" }, { "bucket": "b" }],
///          "schedule": "masterSlave", "timeout": "60s" }"#,
/// )?;
/// assert_eq!(config.schedule, Schedule::MasterSlave);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct ClusterConfig<C> {
    /// Ordered backend configurations. Must not be empty.
    #[cfg_attr(feature = "serde", serde(alias = "cluster"))]
    pub backends: Vec<C>,

    /// Default: [`Schedule::RoundRobin`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub schedule: Schedule,

    /// Applied to every backend configuration that has no timeout of its own.
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "deserialize_duration")
    )]
    pub timeout: Option<Duration>,
}

impl<C> ClusterConfig<C> {
    pub fn new(backends: Vec<C>) -> Self {
        Self {
            backends,
            schedule: Schedule::default(),
            timeout: None,
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject configurations the cluster cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::Config(
                "cluster requires at least one backend".to_string(),
            ));
        }
        Ok(())
    }
}

impl<C: BackendConfig> ClusterConfig<C> {
    /// Validate and return the backend configurations with the cluster
    /// timeout filled in where a backend has none.
    pub fn into_backend_configs(self) -> Result<(Schedule, Vec<C>)> {
        self.validate()?;
        let timeout = self.timeout;
        let backends = self
            .backends
            .into_iter()
            .map(|mut backend| {
                if let (None, Some(timeout)) = (backend.timeout(), timeout) {
                    backend.set_timeout(timeout);
                }
                backend
            })
            .collect();
        Ok((self.schedule, backends))
    }
}

#[cfg(feature = "serde")]
impl<C: serde::de::DeserializeOwned> ClusterConfig<C> {
    /// Parse and validate a JSON cluster configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => return Err(Error::Config(e.to_string())),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse a duration such as `"500ms"`, `"60s"`, `"5m"`, `"1h"`.
/// A bare number is taken as milliseconds.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (value, unit) = text.split_at(split);

    let value: u64 = value
        .parse()
        .map_err(|_| Error::Config(format!("invalid duration: {text:?}")))?;

    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(Error::Config(format!(
            "unknown duration unit {other:?} in {text:?}"
        ))),
    }
}

/// serde helper accepting `null`, integer milliseconds or a [`parse_duration`] string.
#[cfg(feature = "serde")]
pub(crate) fn deserialize_duration<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
        Some(Raw::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(|e| D::Error::custom(e.to_string())),
    }
}
