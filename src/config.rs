//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::middleware::DEFAULT_CACHE_TTL;
use crate::session::DEFAULT_SESSION_LIFETIME;

/// Settings for an app and its stores.
///
/// Every value has a default; [`Config::from_env`] overrides them from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address [`App::start`](crate::App::start) binds to.
    pub addr: String,
    /// Lifetime of cached responses. Zero never expires.
    pub cache_ttl: Duration,
    /// Absolute lifetime of a session.
    pub session_ttl: Duration,
    /// Directory for the durable response cache; in memory when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// # Environment Variables
    /// - `PYLON_ADDR` - bind address (default: `0.0.0.0:3000`)
    /// - `PYLON_CACHE_TTL_SECS` - response cache TTL in seconds (default: 600)
    /// - `PYLON_SESSION_TTL_SECS` - session lifetime in seconds (default: 1800)
    /// - `PYLON_CACHE_DIR` - durable cache directory (default: unset, in memory)
    ///
    /// Unparseable numbers fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            addr: var("PYLON_ADDR").unwrap_or(defaults.addr),
            cache_ttl: secs("PYLON_CACHE_TTL_SECS", defaults.cache_ttl),
            session_ttl: secs("PYLON_SESSION_TTL_SECS", defaults.session_ttl),
            cache_dir: var("PYLON_CACHE_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            cache_ttl: DEFAULT_CACHE_TTL,
            session_ttl: DEFAULT_SESSION_LIFETIME,
            cache_dir: None,
        }
    }
}
