use thiserror::Error;

/// Errors surfaced by the odds engine and the service around it
#[derive(Error, Debug)]
pub enum OddsError {
    /// Request parameters failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream payload did not match any known shape
    #[error("Unrecognized odds payload: {0}")]
    UnrecognizedShape(String),

    /// Requested line/event/player is not present in the payload
    #[error("Not found: {0}")]
    NotFound(String),

    /// The Odds API or another upstream answered with an error
    #[error("Upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}

/// Result type alias for odds engine errors
pub type OddsResult<T> = Result<T, OddsError>;

impl OddsError {
    /// Whether the error is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, OddsError::Validation(_) | OddsError::InvalidUuid(_))
    }

    /// HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            OddsError::Validation(_) | OddsError::InvalidUuid(_) => 400,
            OddsError::NotFound(_) => 404,
            OddsError::Upstream { .. } | OddsError::Http(_) => 502,
            OddsError::Redis(_) => 503,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(OddsError::Validation("x".into()).status_code(), 400);
        assert_eq!(OddsError::NotFound("line".into()).status_code(), 404);
        assert_eq!(
            OddsError::Upstream { status: 422, body: String::new() }.status_code(),
            502
        );
        assert_eq!(OddsError::Config("x".into()).status_code(), 500);
    }

    #[test]
    fn test_uuid_errors_are_client_errors() {
        let err: OddsError = uuid::Uuid::parse_str("not-a-uuid").unwrap_err().into();
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
    }
}
