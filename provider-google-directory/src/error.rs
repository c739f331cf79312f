//! Error types for the Google Directory provider

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleDirectoryError {
    /// Token rejected (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Directory API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("{resource} not found: {key}")]
    NotFound { resource: &'static str, key: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, GoogleDirectoryError>;

impl GoogleDirectoryError {
    /// Classify a non-2xx response.
    pub(crate) fn from_status(status_code: u16, message: String, resource: &'static str, key: &str) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationFailed(message),
            404 => Self::NotFound {
                resource,
                key: key.to_string(),
            },
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }
}

impl From<GoogleDirectoryError> for BridgeError {
    fn from(error: GoogleDirectoryError) -> Self {
        match error {
            GoogleDirectoryError::AuthenticationFailed(msg) => {
                BridgeError::OperationFailed(format!("Directory authentication failed: {}", msg))
            }
            GoogleDirectoryError::ApiError {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            GoogleDirectoryError::NotFound { resource, key } => BridgeError::not_found(resource, key),
            GoogleDirectoryError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDirectoryError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDirectoryError::ApiError {
            status_code: 500,
            message: "backend error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Directory API error (status 500): backend error"
        );
    }

    #[test]
    fn test_status_classification() {
        let not_found = GoogleDirectoryError::from_status(404, String::new(), "group", "eng@x.com");
        let bridge: BridgeError = not_found.into();
        assert!(bridge.is_not_found());

        let denied = GoogleDirectoryError::from_status(403, "forbidden".to_string(), "user", "*");
        assert!(matches!(denied, GoogleDirectoryError::AuthenticationFailed(_)));
    }
}
