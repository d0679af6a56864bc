//! Configuration module

pub mod settings;

pub use settings::{
    CircuitBreakerConfig, LimitsConfig, LoggingConfig, ServerConfig, ServicesConfig, Settings,
    TimeoutConfig,
};
