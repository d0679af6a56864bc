//! Gateway module - circuit breaking, forwarding, health aggregation and dispatch

pub mod circuit_breaker;
pub mod dispatcher;
pub mod health_check;
pub mod proxy;
pub mod router;
