use thiserror::Error;

/// Errors from the client sync layer.
///
/// A failed send is always one of these, never an empty success.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-success status, carrying the server's error message.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ClientError {
    /// Whether the server rejected the input itself (HTTP 4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClientError::Status { status, .. } if (400..500).contains(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_classification() {
        let err = ClientError::Status {
            status: 400,
            message: "sessionId is required".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 400: sessionId is required");
        assert!(err.is_client_error());

        let err = ClientError::Status {
            status: 500,
            message: "Internal server error".to_string(),
        };
        assert!(!err.is_client_error());
    }
}
