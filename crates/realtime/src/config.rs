//! Relay configuration

use std::env;
use std::time::Duration;

use crate::websocket::ReconnectPolicy;

/// Default API origin the realtime endpoint is derived from
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Relay configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// API base URL, e.g. `https://lotline.example/api`
    pub api_url: String,

    pub reconnect: ReconnectPolicy,

    /// Re-send auction subscriptions after every (re)connect
    pub redeclare_topics: bool,

    /// Session credential for standalone tools; the library reads tokens
    /// through a `CredentialSource` instead
    pub access_token: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            redeclare_topics: false,
            access_token: None,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let delay_ms: u64 = env::var("REALTIME_RECONNECT_DELAY_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);
        if delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "REALTIME_RECONNECT_DELAY_MS must be greater than zero",
            ));
        }

        let reconnect = match env::var("REALTIME_RECONNECT_STRATEGY")
            .unwrap_or_else(|_| "fixed".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "fixed" => ReconnectPolicy::Fixed {
                delay: Duration::from_millis(delay_ms),
            },
            "exponential" => {
                let max_delay_ms: u64 = env::var("REALTIME_RECONNECT_MAX_DELAY_MS")
                    .unwrap_or_else(|_| "60000".to_string())
                    .parse()
                    .unwrap_or(60000);
                if max_delay_ms < delay_ms {
                    return Err(ConfigError::Invalid(
                        "REALTIME_RECONNECT_MAX_DELAY_MS must not be below REALTIME_RECONNECT_DELAY_MS",
                    ));
                }

                let max_attempts = match env::var("REALTIME_RECONNECT_MAX_ATTEMPTS") {
                    Ok(raw) => Some(raw.parse::<u32>().map_err(|_| {
                        ConfigError::Invalid("REALTIME_RECONNECT_MAX_ATTEMPTS must be a number")
                    })?),
                    Err(_) => None,
                };

                ReconnectPolicy::Exponential {
                    initial: Duration::from_millis(delay_ms),
                    max: Duration::from_millis(max_delay_ms),
                    max_attempts,
                }
            }
            _ => {
                return Err(ConfigError::Invalid(
                    "REALTIME_RECONNECT_STRATEGY must be 'fixed' or 'exponential'",
                ))
            }
        };

        Ok(Self {
            api_url: env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            reconnect,
            redeclare_topics: env::var("REALTIME_REDECLARE_TOPICS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            access_token: env::var("ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
