use std::str::FromStr;
use std::time::Duration;

use reina_worker::WorkerSettings;

/// Upper bound accepted for `CACHE_TTL_SECS`.
const MAX_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Startup configuration could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8123`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining live workers at shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Housekeeping period in seconds (default: `10`).
    pub sweep_interval_secs: u64,
    /// Sessions unseen for this long are dropped (default: `3600`).
    pub session_idle_secs: u64,
    /// Artificial per-day cost of the built-in model (default: `20`).
    pub simulation_pace_ms: u64,
    /// Run lifecycle settings.
    pub jobs: JobConfig,
}

/// Settings of the launch, publish and poll protocol.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Lifetime of every cache entry a run writes.
    pub cache_ttl: Duration,
    /// Minimum spacing of non-forced snapshot writes.
    pub publish_interval: Duration,
    /// Advised delay between two polls.
    pub poll_interval_ms: u64,
    /// Advised number of polls before a client gives up.
    pub max_polls: u32,
    /// Serve cached results only; never start new computations.
    pub restrict_to_preset_scenarios: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            publish_interval: Duration::from_millis(500),
            poll_interval_ms: 500,
            max_polls: 60,
            restrict_to_preset_scenarios: false,
        }
    }
}

impl JobConfig {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            result_ttl: self.cache_ttl,
            publish_interval: self.publish_interval,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `HOST`                         | `0.0.0.0`               |
    /// | `PORT`                         | `8123`                  |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `10`                    |
    /// | `CACHE_TTL_SECS`               | `30`                    |
    /// | `PUBLISH_INTERVAL_MS`          | `500`                   |
    /// | `POLL_INTERVAL_MS`             | `500`                   |
    /// | `MAX_POLLS`                    | `60`                    |
    /// | `RESTRICT_TO_PRESET_SCENARIOS` | `false`                 |
    /// | `SWEEP_INTERVAL_SECS`          | `10`                    |
    /// | `SESSION_IDLE_SECS`            | `3600`                  |
    /// | `SIMULATION_PACE_MS`           | `20`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jobs = JobConfig {
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 30)?),
            publish_interval: Duration::from_millis(parse_or(
                &lookup,
                "PUBLISH_INTERVAL_MS",
                500,
            )?),
            poll_interval_ms: parse_or(&lookup, "POLL_INTERVAL_MS", 500)?,
            max_polls: parse_or(&lookup, "MAX_POLLS", 60)?,
            restrict_to_preset_scenarios: parse_or(
                &lookup,
                "RESTRICT_TO_PRESET_SCENARIOS",
                false,
            )?,
        };
        let ttl_secs = jobs.cache_ttl.as_secs();
        if !(1..=MAX_CACHE_TTL_SECS).contains(&ttl_secs) {
            return Err(ConfigError::Invalid {
                var: "CACHE_TTL_SECS",
                value: ttl_secs.to_string(),
                reason: format!("must be between 1 and {MAX_CACHE_TTL_SECS}"),
            });
        }

        Ok(Self {
            host,
            port: parse_or(&lookup, "PORT", 8123)?,
            cors_origins,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 10)?,
            sweep_interval_secs: parse_or::<u64>(&lookup, "SWEEP_INTERVAL_SECS", 10)?.max(1),
            session_idle_secs: parse_or(&lookup, "SESSION_IDLE_SECS", 3600)?,
            simulation_pace_ms: parse_or(&lookup, "SIMULATION_PACE_MS", 20)?,
            jobs,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
