//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `housectl.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use housectl_adapter_mqtt::MqttConfig;
use housectl_app::config::ControllerConfig;
use housectl_domain::error::ValidationError;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker session settings.
    pub mqtt: MqttConfig,
    /// HTTP bridge settings.
    pub http: HttpConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Topics, devices, and wiring.
    pub controller: ControllerConfig,
}

/// HTTP bridge listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve the bridge at all.
    pub enabled: bool,
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `housectl.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("housectl.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HOUSECTL_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(val) = var("HOUSECTL_MQTT_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("HOUSECTL_HTTP_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.http.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.http.port = port;
            }
        }
        if let Some(val) = var("HOUSECTL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt port must be non-zero".to_string(),
            ));
        }
        if self.http.enabled && self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http port must be non-zero".to_string(),
            ));
        }
        self.controller.blueprint()?;
        Ok(())
    }

    /// Return the `host:port` bind address of the HTTP bridge.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "housectld=info,housectl=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Device or wiring rejected by the controller.
    #[error("invalid controller configuration")]
    Controller(#[from] ValidationError),
}
