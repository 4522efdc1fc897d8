use thiserror::Error;

/// Core error types for Carelink domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unknown organization status: {0}")]
    InvalidStatus(String),

    #[error("Unknown plan code: {0}")]
    InvalidPlan(i32),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new InvalidRole error
    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole(role.into())
    }

    /// Create a new InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus(status.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRole(_)
                | Self::InvalidStatus(_)
                | Self::InvalidPlan(_)
                | Self::UuidError(_)
                | Self::JsonError(_)
        )
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_role("superuser");
        assert_eq!(err.to_string(), "Unknown role: superuser");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_configuration_error() {
        let err = CoreError::configuration("missing encryption key");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing encryption key"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_uuid_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("not-a-uuid").unwrap_err();
        let core_err: CoreError = uuid_err.into();
        assert!(matches!(core_err, CoreError::UuidError(_)));
        assert!(core_err.is_client_error());
    }
}
