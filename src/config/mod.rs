//! Configuration module for PokeClass sync.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the JSON document store
    pub store_url: String,
    /// Path to the SQLite file used for local persistence and the reference store
    pub db_path: PathBuf,
    /// Shared session code for single-tenant deployments
    pub session_code: Option<String>,
    /// Address that share links point at
    pub share_url: String,
    /// How often the remote document is polled
    pub poll_interval: Duration,
    /// Quiet period after local activity during which polls are skipped
    pub guard_window: Duration,
    /// Idle time after the last mutation before publishing
    pub debounce: Duration,
    /// Address to bind the reference store to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: "https://api.npoint.io".to_string(),
            db_path: PathBuf::from("./data/pokeclass.sqlite"),
            session_code: None,
            share_url: "http://localhost:3000/".to_string(),
            poll_interval: Duration::from_secs(10),
            guard_window: Duration::from_secs(5),
            debounce: Duration::from_millis(1000),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let store_url = env::var("POKECLASS_STORE_URL").unwrap_or(defaults.store_url);

        let db_path = env::var("POKECLASS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let session_code = env::var("POKECLASS_SESSION_CODE")
            .ok()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());

        let share_url = env::var("POKECLASS_SHARE_URL").unwrap_or(defaults.share_url);

        let poll_interval = Duration::from_secs(parse_var(
            "POKECLASS_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?);
        let guard_window = Duration::from_secs(parse_var(
            "POKECLASS_GUARD_WINDOW_SECS",
            defaults.guard_window.as_secs(),
        )?);
        let debounce = Duration::from_millis(parse_var(
            "POKECLASS_DEBOUNCE_MS",
            defaults.debounce.as_millis() as u64,
        )?);

        let bind_addr = parse_var("POKECLASS_BIND_ADDR", defaults.bind_addr)?;

        let log_level = env::var("POKECLASS_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            store_url,
            db_path,
            session_code,
            share_url,
            poll_interval,
            guard_window,
            debounce,
            bind_addr,
            log_level,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {} value: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
