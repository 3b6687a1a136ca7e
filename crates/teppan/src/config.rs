//! Configuration for the dispatch layer.

use std::time::Duration;
use serde::Deserialize;
use crate::error::ConfigError;

/// Largest burst accepted by default; bounds response size, not a systems limit.
pub const DEFAULT_MAX_BURST: usize = 2000;

/// Default admission capacity.
pub const DEFAULT_MAX_INFLIGHT: usize = 4;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Admission gate capacity: how many requests may hold a permit at once,
    /// whether waiting for the resource or computing on it.
    pub max_inflight: usize,

    /// Upper bound on `n` for a single burst
    pub max_burst: usize,

    /// Cap on simultaneously spawned burst tasks. `None` spawns all `n` at once
    /// and lets the admission gate do the throttling.
    pub launch_cap: Option<usize>,

    /// Give up waiting for an admission permit after this long.
    /// `None` waits indefinitely.
    #[serde(with = "optional_millis")]
    pub admission_timeout: Option<Duration>,

    /// Run one inference on an all-zero tensor while mounting
    pub warmup: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_inflight: DEFAULT_MAX_INFLIGHT,
            max_burst: DEFAULT_MAX_BURST,
            launch_cap: None,
            admission_timeout: None,
            warmup: true,
        }
    }
}

impl DispatchConfig {
    /// Builder-style override of the admission capacity.
    pub fn with_max_inflight(mut self, max_inflight: usize) -> Self {
        self.max_inflight = max_inflight;
        self
    }

    pub fn with_max_burst(mut self, max_burst: usize) -> Self {
        self.max_burst = max_burst;
        self
    }

    pub fn with_launch_cap(mut self, launch_cap: usize) -> Self {
        self.launch_cap = Some(launch_cap);
        self
    }

    pub fn with_admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = Some(timeout);
        self
    }

    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Reject configurations the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 {
            return Err(ConfigError::Zero { field: "max_inflight" });
        }
        if self.max_burst == 0 {
            return Err(ConfigError::Zero { field: "max_burst" });
        }
        if self.launch_cap == Some(0) {
            return Err(ConfigError::Zero { field: "launch_cap" });
        }
        Ok(())
    }

    /// Create config from environment variables, falling back to defaults
    /// for anything unset.
    ///
    /// * `TEPPAN_MAX_INFLIGHT`
    /// * `TEPPAN_MAX_BURST`
    /// * `TEPPAN_LAUNCH_CAP`
    /// * `TEPPAN_ADMISSION_TIMEOUT_MS`
    /// * `TEPPAN_WARMUP` (`1`/`true`/`0`/`false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();

        if let Some(n) = parse_var(&lookup, "TEPPAN_MAX_INFLIGHT")? {
            config.max_inflight = n;
        }
        if let Some(n) = parse_var(&lookup, "TEPPAN_MAX_BURST")? {
            config.max_burst = n;
        }
        if let Some(n) = parse_var(&lookup, "TEPPAN_LAUNCH_CAP")? {
            config.launch_cap = Some(n);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "TEPPAN_ADMISSION_TIMEOUT_MS")? {
            config.admission_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(raw) = lookup("TEPPAN_WARMUP") {
            config.warmup = match raw.trim().to_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return Err(ConfigError::InvalidEnv { var: "TEPPAN_WARMUP", value: raw }),
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where T: std::str::FromStr, F: Fn(&str) -> Option<String>
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}

mod optional_millis {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where D: Deserializer<'de>
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
