//! Route bindings from URL prefixes to backends

use crate::backend::descriptor::{AUTH, SCHOOL, STUDENT};

/// What a route forwards to and which stages it passes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Identity of the target backend
    pub backend: String,
    /// Prefix removed from the path before forwarding
    pub strip_prefix: Option<String>,
    /// Whether the auth gate runs before forwarding
    pub protected: bool,
}

impl Route {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            strip_prefix: None,
            protected: false,
        }
    }

    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// `/auth/*`: identity backend, `/auth` stripped, no token required
    pub fn auth() -> Self {
        Self::new(AUTH).strip_prefix("/auth")
    }

    /// `/schools[/...]`: school backend, token required
    pub fn schools() -> Self {
        Self::new(SCHOOL).protected()
    }

    /// `/students[/...]`: student backend, token required
    pub fn students() -> Self {
        Self::new(STUDENT).protected()
    }
}
