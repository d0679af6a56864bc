//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Base URLs of the backends fronted by the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_school_url")]
    pub school_url: String,
    #[serde(default = "default_student_url")]
    pub student_url: String,
}

fn default_auth_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_school_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_student_url() -> String {
    "http://localhost:8083".to_string()
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
    /// Threshold for breakers of targets outside the configured services
    #[serde(default = "default_fallback_max_failures")]
    pub fallback_max_failures: u32,
}

fn default_max_failures() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    30
}

fn default_fallback_max_failures() -> u32 {
    3
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

/// Outbound call timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_proxy_timeout")]
    pub proxy_secs: u64,
    #[serde(default = "default_short_timeout")]
    pub validation_secs: u64,
    #[serde(default = "default_short_timeout")]
    pub health_secs: u64,
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_short_timeout() -> u64 {
    5
}

/// Request size limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Deployment variables understood by the platform's other services
const LEGACY_OVERRIDES: [(&str, &str); 4] = [
    ("PORT", "server.port"),
    ("AUTH_SERVICE_URL", "services.auth_url"),
    ("SCHOOL_SERVICE_URL", "services.school_url"),
    ("STUDENT_SERVICE_URL", "services.student_url"),
];

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("services.auth_url", default_auth_url())?
            .set_default("services.school_url", default_school_url())?
            .set_default("services.student_url", default_student_url())?
            .set_default("circuit_breaker.max_failures", default_max_failures() as i64)?
            .set_default("circuit_breaker.reset_timeout_secs", default_reset_timeout() as i64)?
            .set_default(
                "circuit_breaker.fallback_max_failures",
                default_fallback_max_failures() as i64,
            )?
            .set_default("timeouts.proxy_secs", default_proxy_timeout() as i64)?
            .set_default("timeouts.validation_secs", default_short_timeout() as i64)?
            .set_default("timeouts.health_secs", default_short_timeout() as i64)?
            .set_default("limits.max_body_bytes", default_max_body_bytes() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            // Load from configuration file
            .add_source(File::from(path.as_ref()).required(false))
            // Override with environment variables (prefixed with GATEWAY__)
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_OVERRIDES {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0".to_string()));
        }

        for (name, url) in [
            ("auth", &self.services.auth_url),
            ("school", &self.services.school_url),
            ("student", &self.services.student_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!(
                    "Service '{}' has invalid URL '{}'. Must start with http:// or https://",
                    name, url
                )));
            }
        }

        if self.circuit_breaker.max_failures == 0 || self.circuit_breaker.fallback_max_failures == 0
        {
            return Err(invalid(
                "Circuit breaker failure thresholds must be positive".to_string(),
            ));
        }

        if self.timeouts.proxy_secs == 0
            || self.timeouts.validation_secs == 0
            || self.timeouts.health_secs == 0
        {
            return Err(invalid("Timeouts must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            services: ServicesConfig {
                auth_url: default_auth_url(),
                school_url: default_school_url(),
                student_url: default_student_url(),
            },
            circuit_breaker: CircuitBreakerConfig {
                max_failures: default_max_failures(),
                reset_timeout_secs: default_reset_timeout(),
                fallback_max_failures: default_fallback_max_failures(),
            },
            timeouts: TimeoutConfig {
                proxy_secs: default_proxy_timeout(),
                validation_secs: default_short_timeout(),
                health_secs: default_short_timeout(),
            },
            limits: LimitsConfig {
                max_body_bytes: default_max_body_bytes(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
