//! # Error Handling Module
//!
//! Error types and a result alias used throughout the router. Uses
//! `thiserror` for the library error type; `anyhow` is reserved for the
//! process boundary (CLI command bodies in `commands/`).
//!
//! ## Error Categories
//!
//! - `Io`: file system and I/O related errors
//! - `Git`: git subprocess related errors
//! - `Validation`: untrusted-input guard violations (refs, paths, ranges)
//! - `Config`: configuration loading/parsing errors
//! - `Preflight`: accumulated preflight errors (never a single error)
//! - `Analysis`: CFA core errors
//! - `Network`: reporter HTTP errors

use thiserror::Error;

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Structured codes for validation failures on untrusted input.
/// Never silently downgraded; always bubbled with the offending input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    #[error("INVALID_GIT_REF")]
    InvalidGitRef,
    #[error("INVALID_PATH")]
    InvalidPath,
    #[error("DIFF_TOO_LARGE")]
    DiffTooLarge,
    #[error("TOO_MANY_FILES")]
    TooManyFiles,
    #[error("MALFORMED_RANGE_MULTIPLE_OPERATORS")]
    MalformedRangeMultipleOperators,
    #[error("MALFORMED_RANGE_EMPTY_BASE")]
    MalformedRangeEmptyBase,
    #[error("MALFORMED_RANGE_EMPTY_HEAD")]
    MalformedRangeEmptyHead,
    #[error("MALFORMED_RANGE_MISSING")]
    MalformedRangeMissing,
}

/// Comprehensive error type for the router application.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(String),

    #[error("validation error [{code}]: {message} (input: {input})")]
    Validation {
        code: ValidationErrorCode,
        message: String,
        input: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("preflight failed with {} error(s): {}", .0.len(), .0.join("; "))]
    Preflight(Vec<String>),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required agent '{0}' failed: {1}")]
    RequiredAgentFailed(String, String),

    #[error("policy violation: {0}")]
    PolicyDenied(String),

    #[error("{0}")]
    Generic(String),
}

impl RouterError {
    pub fn git<S: Into<String>>(message: S) -> Self {
        Self::Git(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn analysis<S: Into<String>>(message: S) -> Self {
        Self::Analysis(message.into())
    }

    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    pub fn validation<S: Into<String>, I: Into<String>>(
        code: ValidationErrorCode,
        message: S,
        input: I,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            input: input.into(),
        }
    }
}
