//! Error type for server startup and shutdown.

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Bind, accept or file access failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate or key could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid listener network `{0}`, expected tcp, tcp4 or tcp6")]
    InvalidListenerNetwork(String),

    #[error("invalid bind address `{0}`")]
    InvalidAddress(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err = ServerError::from(std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken"));
        assert!(matches!(err, ServerError::Io(_)));
        assert_eq!(err.to_string(), "io error: taken");
    }

    #[test]
    fn test_network_message() {
        let err = ServerError::InvalidListenerNetwork("udp".into());
        assert_eq!(
            err.to_string(),
            "invalid listener network `udp`, expected tcp, tcp4 or tcp6"
        );
    }
}
