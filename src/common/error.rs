//! Error types for the proxy

use std::io;
use thiserror::Error;

/// Proxy error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed target: {0}")]
    Target(String),

    #[error("Resolution error: {0}")]
    Resolve(String),

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Error::Parse(msg.into())
    }

    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn target<S: Into<String>>(msg: S) -> Self {
        Error::Target(msg.into())
    }

    pub fn resolve<S: Into<String>>(msg: S) -> Self {
        Error::Resolve(msg.into())
    }

    pub fn unreachable<S: Into<String>>(msg: S) -> Self {
        Error::Unreachable(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Error::Backend(msg.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let e = Error::config("test error");
        assert!(matches!(e, Error::Config(_)));
    }

    #[test]
    fn test_error_display() {
        let e = Error::unreachable("connect refused");
        assert_eq!(e.to_string(), "Backend unreachable: connect refused");
    }
}
