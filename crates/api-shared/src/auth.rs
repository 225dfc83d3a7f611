/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing {API_KEY_HEADER} header")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the key presented by a caller against the configured one.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    match provided_key {
        None => Err(AuthError::Missing),
        Some(key) if key == expected_key => Ok(()),
        Some(_) => Err(AuthError::Invalid),
    }
}
