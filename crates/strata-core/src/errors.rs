//! Error types for STRATA.
//!
//! Provides a unified error type for hierarchy construction, coloring, and
//! inter-level propagation, with structured, actionable messages.

use thiserror::Error;

/// Result type alias for STRATA operations.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for all STRATA operations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// A structural invariant of the hierarchy did not hold (e.g. adjacency
    /// link records are not packed to their expected size).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Greedy coloring needed more than 254 distinct colors. The byte-encoded
    /// color id space reserves `0xFF` for "no color"; exceeding the ceiling
    /// almost always means the input graph is corrupt.
    #[error("Ran out of colors during graph coloring; the input graph is very likely corrupt")]
    ColoringExhausted,

    /// A symmetry parameter outside the supported set was requested.
    #[error("Unsupported symmetry: {kind} = {value} (supported: {supported})")]
    UnsupportedSymmetry {
        /// Which parameter was rejected (`"rosy"` or `"posy"`).
        kind: &'static str,
        /// The offending value.
        value: u32,
        /// The accepted values, for the error message.
        supported: &'static str,
    },

    /// Caller-provided data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StrataError {
    /// Creates an invariant-violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        StrataError::InvariantViolation(message.into())
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StrataError::InvalidInput(message.into())
    }

    /// Creates an unsupported-symmetry error for a rotational symmetry value.
    pub fn unsupported_rosy(value: u32) -> Self {
        StrataError::UnsupportedSymmetry {
            kind: "rosy",
            value,
            supported: "2, 4, 6",
        }
    }

    /// Creates an unsupported-symmetry error for a positional symmetry value.
    pub fn unsupported_posy(value: u32) -> Self {
        StrataError::UnsupportedSymmetry {
            kind: "posy",
            value,
            supported: "3, 4",
        }
    }

    /// Whether the caller can recover by fixing its input and retrying.
    ///
    /// Invariant violations indicate a build or platform problem and are not
    /// recoverable; symmetry errors are caller bugs.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StrataError::ColoringExhausted | StrataError::InvalidInput(_)
        )
    }
}
