use thiserror::Error;

/// Error types for IP whitelist configuration and per-request evaluation.
///
/// # Where Each Variant Surfaces
///
/// - `ConfigError` - only at setup time, aborts strategy registration
/// - `InvalidAddress` - per request, always downgraded to a denial
/// - `InternalEvaluation` - per request, reported and then downgraded to a denial
///
/// Per-request variants never escape the decision path; they are handed to a
/// [`Reporter`](crate::decision::Reporter) and converted to
/// [`Decision::Denied`](crate::decision::Decision::Denied).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid client address: {0}")]
    InvalidAddress(String),

    #[error("Policy evaluation failed: {0}")]
    InternalEvaluation(String),
}

impl AuthError {
    /// Short machine-readable classification, used for response bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::ConfigError(_) => "config_error",
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::InternalEvaluation(_) => "internal_error",
        }
    }
}

/// Convenience type alias for Results with AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::InvalidAddress("30.3.0.300".to_string());
        assert_eq!(err.to_string(), "Invalid client address: 30.3.0.300");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(AuthError::ConfigError(String::new()).kind(), "config_error");
        assert_eq!(
            AuthError::InternalEvaluation(String::new()).kind(),
            "internal_error"
        );
    }
}
