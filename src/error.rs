//! Error types for the realtime client and the relay

use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised while reading the embedded snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Snapshot is not a JSON object")]
    NotAnObject,
}

/// Errors raised while constructing or driving a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport cannot exist in the current environment
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Transport closed")]
    Closed,
}

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors raised by the relay server
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::InvalidValue {
            name: "KATANA_RELOAD_COOLDOWN_MS",
            value: "soon".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for KATANA_RELOAD_COOLDOWN_MS: soon");

        let err = TransportError::UnsupportedScheme("ftp".to_string());
        assert_eq!(err.to_string(), "Unsupported scheme: ftp");
    }
}
