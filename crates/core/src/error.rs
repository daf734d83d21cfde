//! Validation errors for connection and subscription values.

use thiserror::Error;

/// Result type used across the core values.
pub type CoreResult<T> = Result<T, CoreError>;

/// A connection string or subscription target failed validation.
///
/// These are configuration mistakes; nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("connection string is empty")]
    EmptyConnectionString,

    #[error("invalid scheme `{0}`")]
    InvalidScheme(String),

    /// `user@host:port` or `:password@host:port`.
    #[error("credentials must be given as `user:password`")]
    IncompleteCredentials,

    #[error("invalid host `{0}`")]
    InvalidHost(String),

    #[error("connection string has no port")]
    MissingPort,

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("stream name must not be empty")]
    EmptyStream,

    #[error("group name must not be empty")]
    EmptyGroup,
}
