use std::env;
use std::time::Duration;

use crate::distance::google::DEFAULT_BASE_URL;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub transition_timeout: Duration,
    pub maps_api_key: Option<String>,
    pub maps_base_url: String,
    pub maps_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: expected text or json, got {other}"
                )));
            }
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or_default("DB_MAX_CONNECTIONS", 10)?,
            transition_timeout: Duration::from_millis(parse_or_default(
                "TRANSITION_TIMEOUT_MS",
                2_000,
            )?),
            maps_api_key: non_empty("MAPS_API_KEY"),
            maps_base_url: non_empty("MAPS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            maps_timeout: Duration::from_millis(parse_or_default("MAPS_TIMEOUT_MS", 5_000)?),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
