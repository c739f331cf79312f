use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// The entity does not exist on the remote side.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Http { status: 404, .. })
    }

    /// The remote side refused a create because the entity already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Http { status: 409, .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(BridgeError::not_found("user", "a@x.com").is_not_found());
        assert!(BridgeError::Http {
            status: 404,
            message: "gone".to_string()
        }
        .is_not_found());
        assert!(!BridgeError::OperationFailed("boom".to_string()).is_not_found());
    }

    #[test]
    fn test_conflict_classification() {
        assert!(BridgeError::Conflict("a@x.com".to_string()).is_conflict());
        assert!(BridgeError::Http {
            status: 409,
            message: "duplicate".to_string()
        }
        .is_conflict());
        assert!(!BridgeError::not_found("user", "a@x.com").is_conflict());
    }

    #[test]
    fn test_error_display() {
        let error = BridgeError::not_found("group", "engineering");
        assert_eq!(error.to_string(), "group not found: engineering");
    }
}
