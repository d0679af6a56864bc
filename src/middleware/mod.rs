//! Pipeline stages shared by the gateway routes

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{AuthGate, AuthLayer, ValidatedIdentity};
pub use cors::CorsLayer;
pub use rate_limit::RateLimitLayer;
