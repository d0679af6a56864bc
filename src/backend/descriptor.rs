//! Backend identities and addresses

use serde::{Deserialize, Serialize};

use crate::config::ServicesConfig;

/// Identity of the identity/authentication backend
pub const AUTH: &str = "auth";
/// Identity of the school records backend
pub const SCHOOL: &str = "school";
/// Identity of the student records backend
pub const STUDENT: &str = "student";

/// A backend the gateway can forward to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub identity: String,
    pub base_url: String,
}

impl BackendDescriptor {
    pub fn new(identity: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            identity: identity.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<base_url><path>`; `path` is expected to start with `/`
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The three platform backends, in identity order
    pub fn from_services(services: &ServicesConfig) -> Vec<Self> {
        vec![
            Self::new(AUTH, &services.auth_url),
            Self::new(SCHOOL, &services.school_url),
            Self::new(STUDENT, &services.student_url),
        ]
    }
}
