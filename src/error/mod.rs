//! Error types for logsift.
//!
//! Uses `thiserror` for structured error types.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into four main categories:
//! - **Capture**: the hook could not take an entry (buffer full) or was
//!   used out of order (started twice, stopped before start)
//! - **Matching**: a predicate could not be evaluated against a value
//! - **Configuration**: invalid patterns or environment values
//! - **Internal**: I/O and serialization failures while exporting entries
//!
//! A match that simply does not succeed (timeout, unexpected entry) is not
//! an error. It is reported through the matcher's failure message.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Capture-side issues (overflow, lifecycle misuse).
    Capture,
    /// Predicate evaluation issues.
    Matching,
    /// Invalid construction-time values.
    Configuration,
    /// I/O and serialization.
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Capture => "Capture error",
            Self::Matching => "Matching error",
            Self::Configuration => "Configuration error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Capture => "C",
            Self::Matching => "M",
            Self::Configuration => "F",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Main error type for logsift operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Capture errors (Category: Capture)
    // ==========================================================================
    /// The hook's bounded buffer is full. Raised from `fire` so the logger
    /// reports it on its error stream.
    #[error("internal buffer full, use a higher capacity value")]
    BufferFull { capacity: usize },

    /// `start` called on a hook that is already attached.
    #[error("log hook already started")]
    AlreadyStarted,

    /// `stop` called on a hook that was never started.
    #[error("log hook not started")]
    NotStarted,

    /// The hook's consumer side is gone, nothing can read new entries.
    #[error("log hook closed")]
    Closed,

    // ==========================================================================
    // Matching errors (Category: Matching)
    // ==========================================================================
    /// A textual predicate was evaluated against a non-textual field value.
    #[error("{predicate} expects a string, got {actual}")]
    NotText { predicate: String, actual: String },

    /// A custom predicate failed while evaluating.
    #[error("predicate failed: {0}")]
    Predicate(#[source] anyhow::Error),

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Regular expression did not compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Invalid configuration value.
    #[error("invalid config value for '{key}': {message}")]
    Config {
        key: String,
        value: String,
        message: String,
    },

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error category for classification.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BufferFull { .. } | Self::AlreadyStarted | Self::NotStarted | Self::Closed => {
                ErrorCategory::Capture
            }
            Self::NotText { .. } | Self::Predicate(_) => ErrorCategory::Matching,
            Self::InvalidPattern { .. } | Self::Config { .. } => ErrorCategory::Configuration,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Stable error code, e.g. `LSFT-C001`.
    #[must_use]
    pub fn error_code(&self) -> String {
        let number = match self {
            Self::BufferFull { .. }
            | Self::NotText { .. }
            | Self::InvalidPattern { .. }
            | Self::Io(_) => 1,
            Self::AlreadyStarted | Self::Predicate(_) | Self::Config { .. } | Self::Json(_) => 2,
            Self::NotStarted => 3,
            Self::Closed => 4,
        };
        format!("LSFT-{}{number:03}", self.category().code_prefix())
    }

    /// Whether the error means captured entries were lost.
    #[must_use]
    pub const fn is_data_loss(&self) -> bool {
        matches!(self, Self::BufferFull { .. })
    }
}

/// Result type alias using logsift's Error.
pub type Result<T> = std::result::Result<T, Error>;
