//! Server settings read from the environment.

use std::net::SocketAddr;

use orderservice_store::ConfigError;

/// Interface to bind.
pub const ENV_HOST: &str = "HOST";
/// Port to bind.
pub const ENV_PORT: &str = "PORT";
/// Whether to apply pending migrations before serving.
pub const ENV_MIGRATE_ON_START: &str = "ORDERS_MIGRATE_ON_START";

/// Listener and startup settings for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub addr: SocketAddr,
    /// Run schema migrations before accepting requests.
    pub migrate_on_start: bool,
}

impl ServerConfig {
    /// Reads the settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(ENV_HOST).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = lookup(ENV_PORT)
            .unwrap_or_else(|| "3000".to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: ENV_PORT,
                message: format!("must be a valid u16: {e}"),
            })?;
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: ENV_HOST,
                message: format!("invalid HOST:PORT combination: {e}"),
            })?;

        let migrate_on_start = match lookup(ENV_MIGRATE_ON_START) {
            None => true,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        var: ENV_MIGRATE_ON_START,
                        message: format!("expected true or false, got {other:?}"),
                    });
                }
            },
        };

        Ok(Self {
            addr,
            migrate_on_start,
        })
    }
}
