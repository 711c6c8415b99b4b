use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Address the HTTP server binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Host the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on. `0` picks a random free port.
    pub port: u16,
}

impl ApplicationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "application.host".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
