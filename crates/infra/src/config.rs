//! Runtime configuration from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Where records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    InMemory,
    Rest { url: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub backend: BackendConfig,
    pub realtime_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind = match get("PROVENTORY_BIND") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "PROVENTORY_BIND",
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let backend = match (get("BACKEND_URL"), get("BACKEND_KEY")) {
            (Some(url), Some(key)) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Invalid {
                        var: "BACKEND_URL",
                        reason: "must be an http(s) URL".to_string(),
                    });
                }
                BackendConfig::Rest {
                    url: url.trim_end_matches('/').to_string(),
                    key,
                }
            }
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: "BACKEND_URL",
                    missing: "BACKEND_KEY",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: "BACKEND_KEY",
                    missing: "BACKEND_URL",
                });
            }
            (None, None) => BackendConfig::InMemory,
        };

        let realtime_capacity = match get("REALTIME_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "REALTIME_CAPACITY",
                        reason: format!("expected a positive integer, got '{raw}'"),
                    });
                }
            },
            None => 256,
        };

        Ok(Self {
            bind,
            jwt_secret,
            backend,
            realtime_capacity,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
