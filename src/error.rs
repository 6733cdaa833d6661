//! Error types for model building and solving.

use thiserror::Error;

/// Main error type for model building, validation and solving.
#[derive(Debug, Error)]
pub enum CpError {
    /// A domain violated its interval invariants at construction.
    #[error("malformed domain: {0}")]
    MalformedDomain(String),

    /// A constraint was built from inconsistent arguments.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// The engine rejected the problem document.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Conflicting or malformed solve options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The engine reported a status code this crate does not know about.
    #[error("unrecognized solver status code {0}")]
    UnrecognizedStatus(i32),

    /// A handle was used against a result it does not belong to.
    #[error("foreign handle: {0}")]
    ForeignHandle(String),

    /// A value was requested from a result that holds no solution.
    #[error("no solution available: status {0}")]
    NoSolution(String),

    /// An evaluated value fell outside the `i64` range.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// The engine failed outside of the normal status reporting.
    #[error("engine failure: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, CpError>;
