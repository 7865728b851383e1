//! Error types for the KeePass configuration provider
//!
//! Two layers are kept apart:
//!
//! - [`StoreError`] is raised at the secret-store boundary: opening the
//!   database file, unlocking it and reading its tree.
//! - [`ConfigError`] is raised by the configuration layer: building
//!   sources from options and loading providers.
//!
//! Failures while unlocking a store are never downgraded. Entries with
//! missing fields and colliding keys are not errors at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening and reading a secret store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file does not exist
    #[error("Secret store not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The unlock credential was rejected or is unusable
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// A platform-identity factor was requested but the host cannot supply its key
    #[error("Platform identity unavailable: {0}")]
    PlatformIdentityUnavailable(String),

    /// I/O error while reading the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the KDBX reader, carried unmodified
    #[error("KDBX error: {0}")]
    Kdbx(#[from] keepass::error::DatabaseOpenError),
}

impl StoreError {
    /// Create an invalid credential error
    pub fn invalid_credential(msg: impl Into<String>) -> Self {
        StoreError::InvalidCredential(msg.into())
    }

    /// Check if the store file was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this is a failure to unlock (wrong credential or unreadable file)
    pub fn is_unlock_failure(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidCredential(_)
                | StoreError::PlatformIdentityUnavailable(_)
                | StoreError::Kdbx(_)
        )
    }
}

/// Errors raised by configuration sources and providers
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Opening or reading the secret store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Declarative options are contradictory or incomplete
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// An environment variable named by the options is not set
    #[error("Environment variable not set: {0}")]
    MissingEnvironment(String),
}

impl ConfigError {
    /// Create an invalid options error
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        ConfigError::InvalidOptions(msg.into())
    }

    /// Check if the failure was caused by a missing store file
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Store(e) if e.is_not_found())
    }
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound {
            path: PathBuf::from("secrets.kdbx"),
        };
        assert_eq!(err.to_string(), "Secret store not found: secrets.kdbx");

        let err = ConfigError::from(StoreError::invalid_credential("wrong key"));
        assert_eq!(err.to_string(), "Invalid credential: wrong key");
    }

    #[test]
    fn test_classification() {
        let missing = StoreError::NotFound {
            path: PathBuf::from("a.kdbx"),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_unlock_failure());

        let locked = StoreError::invalid_credential("rejected");
        assert!(locked.is_unlock_failure());
        assert!(!ConfigError::from(locked).is_not_found());

        assert!(ConfigError::from(missing).is_not_found());
        assert!(!ConfigError::invalid_options("x").is_not_found());
    }
}
