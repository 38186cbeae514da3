//! Error types for the relaycast agent
//!
//! One error enum per subsystem, rolled up into [`AgentError`] at the crate
//! boundary. Errors that the remote side must never observe (encryption API
//! misuse) stay local to the dispatch path.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Screen capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Input injection errors
    #[error("Input error: {0}")]
    Input(#[from] InjectionError),

    /// Encryption errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Relay connection and protocol errors
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Screen capture errors
///
/// A capture failure is never fatal to a running stream: the loop logs it and
/// keeps going. Viewers observe a skipped frame number at most.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No displays available for capture")]
    NoDisplays,

    #[error("Display {0} not found")]
    DisplayNotFound(u32),

    #[error("Frame capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("Capture backend error: {0}")]
    Backend(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

/// Input injection errors
///
/// Returned to the caller as a plain failure; the dispatch path logs and
/// continues.
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("Input injection is disabled")]
    Disabled,

    #[error("Unknown key name: {0}")]
    UnsupportedKey(String),

    #[error("Unsupported character: {0:?}")]
    UnsupportedChar(char),

    #[error("Host input dispatch failed: {0}")]
    Dispatch(String),
}

/// Encryption errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key agreement attempted before `initialize()`. Local programming
    /// error; never surfaced to the remote party.
    #[error("Encryption context not initialized")]
    NotInitialized,

    /// Encrypt/decrypt attempted before key agreement completed.
    #[error("Encryption context not ready")]
    NotReady,

    #[error("Invalid peer public key: {0}")]
    InvalidPeerKey(String),

    /// AEAD encryption failed (payload exceeds the cipher's limits)
    #[error("Cipher operation failed")]
    Cipher,

    /// Authentication tag verification failed. The payload is discarded;
    /// partial plaintext is never returned.
    #[error("Ciphertext integrity check failed")]
    Integrity,
}

/// Relay connection and protocol errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Registration not acknowledged within {0:?}")]
    RegistrationTimeout(Duration),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Relay channel closed")]
    ChannelClosed,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Configuration directory not found")]
    DirectoryNotFound,

    #[error("Failed to create configuration directory: {0}")]
    DirectoryCreationFailed(String),
}

/// Type alias for Results using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

/// Type alias for capture Results
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Type alias for input Results
pub type InjectionResult<T> = std::result::Result<T, InjectionError>;

/// Type alias for crypto Results
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Type alias for relay Results
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Type alias for config Results
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Protocol(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CryptoError::Integrity;
        assert_eq!(error.to_string(), "Ciphertext integrity check failed");

        let error = CaptureError::Timeout(Duration::from_millis(1000));
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn test_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let agent_error: AgentError = io_error.into();
        assert!(matches!(agent_error, AgentError::Io(_)));

        let crypto_error: AgentError = CryptoError::NotReady.into();
        assert!(matches!(
            crypto_error,
            AgentError::Crypto(CryptoError::NotReady)
        ));
    }
}
