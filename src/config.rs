//! Configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default idle timeout for live job streams.
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Execution engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of jobs running at once. Extra jobs wait in `Pending`.
    pub max_concurrent_jobs: usize,
    /// A subscriber stream ends after this long without a new event.
    pub stream_idle_timeout: Duration,
    /// Per-job broadcast buffer. Lagging subscribers lose the oldest snapshots.
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 10,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            broadcast_capacity: 256,
        }
    }
}

/// HTTP server configuration, loaded from `ADMIN_TOOLS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Default `limit` for the recent-jobs listing.
    pub recent_jobs_limit: usize,
    /// Directory for rolling log files (stderr only when unset).
    pub log_dir: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            recent_jobs_limit: 20,
            log_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> crate::error::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Load from an arbitrary key lookup. Unset keys fall back to defaults;
    /// set-but-unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_var(&lookup, "ADMIN_TOOLS_HOST")?.unwrap_or(defaults.host);
        let port = parse_var(&lookup, "ADMIN_TOOLS_PORT")?.unwrap_or(defaults.port);
        let recent_jobs_limit = parse_var(&lookup, "ADMIN_TOOLS_RECENT_JOBS_LIMIT")?
            .unwrap_or(defaults.recent_jobs_limit);

        let max_concurrent_jobs: usize = parse_var(&lookup, "ADMIN_TOOLS_MAX_JOBS")?
            .unwrap_or(defaults.engine.max_concurrent_jobs);
        if max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ADMIN_TOOLS_MAX_JOBS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let stream_idle_timeout = parse_var::<u64, _>(&lookup, "ADMIN_TOOLS_STREAM_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.engine.stream_idle_timeout);

        let log_dir = lookup("ADMIN_TOOLS_LOG_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            recent_jobs_limit,
            log_dir,
            engine: EngineConfig {
                max_concurrent_jobs,
                stream_idle_timeout,
                ..defaults.engine
            },
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}
