use std::env;

use anyhow::Context;

use crate::classify::{DEFAULT_SESSION_DURATION_MINUTES, MAX_SESSION_DURATION_MINUTES};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub session_duration_minutes: i64,
    pub max_connections: u32,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let log_level = env::var("PORTAL_LOG_LEVEL").unwrap_or_else(|_| "info".into());
        let session_duration_minutes =
            parse_duration_minutes(env::var("SESSION_DURATION_MINUTES").ok().as_deref());
        let max_connections = env::var("PORTAL_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(5);

        Config {
            database_url,
            log_level,
            session_duration_minutes,
            max_connections,
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the portal's Postgres instance")
    }
}

/// Falls back to the default for anything unparseable or outside `1..=MAX`.
fn parse_duration_minutes(raw: Option<&str>) -> i64 {
    match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(minutes) if (1..=MAX_SESSION_DURATION_MINUTES).contains(&minutes) => minutes,
        Some(minutes) => {
            log::warn!(
                "SESSION_DURATION_MINUTES={minutes} is outside 1..={MAX_SESSION_DURATION_MINUTES}, \
                 using {DEFAULT_SESSION_DURATION_MINUTES}"
            );
            DEFAULT_SESSION_DURATION_MINUTES
        }
        None => DEFAULT_SESSION_DURATION_MINUTES,
    }
}

/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logger(config: &Config) {
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
