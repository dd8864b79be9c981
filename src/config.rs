use std::{env, net::SocketAddr, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// ConfigError
///
/// Why [`AppConfig::load`] refused the environment. Startup stops on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set when APP_ENV=production")]
    Missing(&'static str),
    #[error("APP_ADDR is not a valid socket address: {0}")]
    InvalidAddr(#[from] std::net::AddrParseError),
}

/// AppConfig
///
/// Holds the application's configuration, read once at startup and shared through the
/// application state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Runtime environment marker. Selects the log format and how strict loading is.
    pub env: Env,
    /// Postgres connection string. `None` selects the in-memory store.
    pub db_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// Optional JSON fixture loaded into the store at startup.
    pub fixture_path: Option<PathBuf>,
}

/// Env
///
/// `APP_ENV=production` selects `Production`; anything else, or nothing, is `Local`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Local, in-memory configuration for tests that don't touch the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            fixture_path: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl AppConfig {
    /// load
    ///
    /// Reads `APP_ENV`, `DATABASE_URL`, `APP_ADDR` and `FIXTURE_PATH`.
    /// Production refuses to start without a database; locally a missing `DATABASE_URL`
    /// falls back to the in-memory store.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match non_empty_var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = non_empty_var("DATABASE_URL");
        if env == Env::Production && db_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let bind_addr = non_empty_var("APP_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_ADDR)
            .parse::<SocketAddr>()?;

        Ok(Self {
            env,
            db_url,
            bind_addr,
            fixture_path: non_empty_var("FIXTURE_PATH").map(PathBuf::from),
        })
    }
}
