//! Error types for the Spotify provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Spotify provider errors
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Client id or secret not configured
    #[error("Spotify client credentials not configured")]
    MissingCredentials,

    /// Token endpoint rejected the credentials or failed
    #[error("Failed to fetch Spotify token: {status} {message}")]
    TokenRequest { status: u16, message: String },

    /// Web API returned a non-success status
    #[error("Spotify API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Failed to parse Spotify response: {0}")]
    ParseError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Spotify operations
pub type Result<T> = std::result::Result<T, SpotifyError>;

impl From<SpotifyError> for BridgeError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::MissingCredentials => BridgeError::NotAvailable(error.to_string()),
            SpotifyError::Bridge(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SpotifyError::ApiError {
            status: 404,
            message: "Resource not found".to_string(),
        };
        assert_eq!(error.to_string(), "Spotify API error 404: Resource not found");
    }

    #[test]
    fn test_missing_credentials_maps_to_not_available() {
        let bridge: BridgeError = SpotifyError::MissingCredentials.into();
        match bridge {
            BridgeError::NotAvailable(msg) => {
                assert_eq!(msg, "Spotify client credentials not configured")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_api_error_maps_to_operation_failed() {
        let bridge: BridgeError = SpotifyError::TokenRequest {
            status: 400,
            message: "invalid_client".to_string(),
        }
        .into();
        assert!(matches!(bridge, BridgeError::OperationFailed(ref m) if m.contains("400")));
    }
}
