//! Backend module - descriptors and the breaker registry

pub mod descriptor;
pub mod registry;

pub use descriptor::{BackendDescriptor, AUTH, SCHOOL, STUDENT};
pub use registry::BackendRegistry;
