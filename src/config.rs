use std::env;
use std::time::Duration;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, CoreError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 15)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 64)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            request_timeout_secs: 15,
            event_buffer_size: 64,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| CoreError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
