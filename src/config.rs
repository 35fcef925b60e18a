//! Session configuration.
//!
//! Defaults match a tutoring service running locally; every value can be
//! overridden through [`ConfigBuilder`] or, for deployments, the environment.

use std::time::Duration;

use crate::client::consts::{
    DEFAULT_CAPACITY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_WS_PATH,
    ERROR_TTL_MS, SECTION_COMPLETE_TTL_MS,
};
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    host: String,
    secure: bool,
    path: String,
    capacity: usize,
    connect_timeout: Duration,
    section_complete_ttl: Duration,
    error_ttl: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    /// `host[:port]` of the tutoring service.
    pub fn with_host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    /// Use `wss` instead of `ws`, as a page served over https would.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.config.path = path.trim_end_matches('/').to_string();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_section_complete_ttl(mut self, ttl: Duration) -> Self {
        self.config.section_complete_ttl = ttl;
        self
    }

    pub fn with_error_ttl(mut self, ttl: Duration) -> Self {
        self.config.error_ttl = ttl;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        Self { config }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: false,
            path: DEFAULT_WS_PATH.to_string(),
            capacity: DEFAULT_CAPACITY,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            section_complete_ttl: Duration::from_millis(SECTION_COMPLETE_TTL_MS),
            error_ttl: Duration::from_millis(ERROR_TTL_MS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads configuration from environment variables.
    ///
    /// *   `TUTOR_HOST`: `host[:port]` of the tutoring service. Defaults to `localhost:8000`.
    /// *   `TUTOR_SECURE`: `true`/`1` selects `wss`. Defaults to `false`.
    /// *   `TUTOR_WS_PATH`: route prefix of the session channel. Defaults to `/ws/conversation`.
    /// *   `TUTOR_CONNECT_TIMEOUT_MS`: handshake timeout. Defaults to 10000.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Ok(host) = std::env::var("TUTOR_HOST") {
            builder = builder.with_host(&host);
        }
        if let Ok(secure) = std::env::var("TUTOR_SECURE") {
            let secure = match secure.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "TUTOR_SECURE".to_string(),
                        format!("'{}' is not a boolean", other),
                    ))
                }
            };
            builder = builder.with_secure(secure);
        }
        if let Ok(path) = std::env::var("TUTOR_WS_PATH") {
            builder = builder.with_path(&path);
        }
        if let Ok(timeout) = std::env::var("TUTOR_CONNECT_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("TUTOR_CONNECT_TIMEOUT_MS".to_string(), e.to_string())
            })?;
            builder = builder.with_connect_timeout(Duration::from_millis(millis));
        }
        Ok(builder.build())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// How long a section completion stays visible.
    pub fn section_complete_ttl(&self) -> Duration {
        self.section_complete_ttl
    }

    /// How long a transient error stays visible.
    pub fn error_ttl(&self) -> Duration {
        self.error_ttl
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_visibility_windows() {
        let config = Config::new();
        assert_eq!(config.section_complete_ttl(), Duration::from_secs(3));
        assert_eq!(config.error_ttl(), Duration::from_secs(5));
        assert!(!config.secure());
        assert_eq!(config.path(), "/ws/conversation");
    }

    #[test]
    fn builder_overrides() {
        let config = Config::builder()
            .with_host("tutor.example.com")
            .with_secure(true)
            .with_path("/session/")
            .with_capacity(0)
            .build();
        assert_eq!(config.host(), "tutor.example.com");
        assert!(config.secure());
        assert_eq!(config.path(), "/session");
        assert_eq!(config.capacity(), 1);
    }
}
