//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::rate_limit::WS_MESSAGE_RATE_LIMIT;

/// Default pre-subscribe event buffer per player session
pub const EVENT_BUFFER_CAPACITY: usize = 64;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,
    /// Events held per player session before a subscriber arms delivery.
    /// Also sizes the per-connection outbound channel.
    pub event_buffer_capacity: usize,
    /// Client messages per second accepted on the event channel
    pub ws_message_rate: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins when the host provides one, then SERVER_ADDR, then default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            event_buffer_capacity: parse_positive("EVENT_BUFFER_CAPACITY", EVENT_BUFFER_CAPACITY)?,
            ws_message_rate: parse_positive("WS_MESSAGE_RATE", WS_MESSAGE_RATE_LIMIT)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: "http://localhost:8080".to_string(),
            event_buffer_capacity: EVENT_BUFFER_CAPACITY,
            ws_message_rate: WS_MESSAGE_RATE_LIMIT,
        }
    }
}

fn parse_positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => Ok(value),
            _ => Err(ConfigError::Invalid(name)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_rejects_zero_and_garbage() {
        // Names are unique to this test. Other tests build `Config::default()`
        // and never read the environment.
        env::set_var("TTT_TEST_CAPACITY_ZERO", "0");
        env::set_var("TTT_TEST_CAPACITY_BAD", "lots");
        env::set_var("TTT_TEST_CAPACITY_OK", " 16 ");

        assert!(matches!(
            parse_positive::<usize>("TTT_TEST_CAPACITY_ZERO", 64),
            Err(ConfigError::Invalid("TTT_TEST_CAPACITY_ZERO"))
        ));
        assert!(parse_positive::<usize>("TTT_TEST_CAPACITY_BAD", 64).is_err());
        assert_eq!(parse_positive::<usize>("TTT_TEST_CAPACITY_OK", 64).unwrap(), 16);
        assert_eq!(parse_positive::<u32>("TTT_TEST_CAPACITY_UNSET", 10).unwrap(), 10);

        for name in ["TTT_TEST_CAPACITY_ZERO", "TTT_TEST_CAPACITY_BAD", "TTT_TEST_CAPACITY_OK"] {
            env::remove_var(name);
        }
    }
}
