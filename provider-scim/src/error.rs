//! Error types for the SCIM provider

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::types::ErrorBody;

#[derive(Error, Debug)]
pub enum ScimError {
    #[error("SCIM authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("{resource} not found: {key}")]
    NotFound { resource: &'static str, key: String },

    /// 409 on create
    #[error("{resource} already exists: {key}")]
    Conflict { resource: &'static str, key: String },

    #[error("SCIM error (status {status_code}): {detail}")]
    ApiError { status_code: u16, detail: String },

    #[error("Failed to parse SCIM response: {0}")]
    ParseError(String),

    /// A record came back without the id the store must assign
    #[error("SCIM {resource} {key} has no id")]
    MissingId { resource: &'static str, key: String },

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ScimError>;

impl ScimError {
    /// Classify a non-2xx response, pulling `detail` out of a SCIM error body when present.
    pub(crate) fn from_response(status_code: u16, body: &[u8], resource: &'static str, key: &str) -> Self {
        let detail = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

        match status_code {
            401 | 403 => Self::AuthenticationFailed(detail),
            404 => Self::NotFound {
                resource,
                key: key.to_string(),
            },
            409 => Self::Conflict {
                resource,
                key: key.to_string(),
            },
            _ => Self::ApiError {
                status_code,
                detail,
            },
        }
    }
}

impl From<ScimError> for BridgeError {
    fn from(error: ScimError) -> Self {
        match error {
            ScimError::NotFound { resource, key } => BridgeError::not_found(resource, key),
            ScimError::Conflict { resource, key } => {
                BridgeError::Conflict(format!("{} {}", resource, key))
            }
            ScimError::ApiError {
                status_code,
                detail,
            } => BridgeError::Http {
                status: status_code,
                message: detail,
            },
            ScimError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_bridge_conflict() {
        let body = br#"{"schemas":["urn:ietf:params:scim:api:messages:2.0:Error"],"status":"409","detail":"Duplicate"}"#;
        let error = ScimError::from_response(409, body, "user", "a@x.com");
        let bridge: BridgeError = error.into();
        assert!(bridge.is_conflict());
    }

    #[test]
    fn test_detail_is_extracted() {
        let body = br#"{"status":"400","detail":"Request is unparsable"}"#;
        let error = ScimError::from_response(400, body, "user", "a@x.com");
        assert_eq!(
            error.to_string(),
            "SCIM error (status 400): Request is unparsable"
        );
    }

    #[test]
    fn test_plain_body_is_kept() {
        let error = ScimError::from_response(502, b"bad gateway", "group", "eng");
        assert!(matches!(
            error,
            ScimError::ApiError { status_code: 502, ref detail } if detail == "bad gateway"
        ));
    }
}
