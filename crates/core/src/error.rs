//! Core error model.

use thiserror::Error;

/// Result type used across the core crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core-level error.
///
/// Keep this focused on deterministic failures of the pure primitives (identifier
/// parsing, value decoding, schema registration). Store failures belong to the infra
/// layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A value could not be decoded into the requested Rust type.
    #[error("cannot decode {found} as {expected}")]
    Decode {
        expected: &'static str,
        found: &'static str,
    },

    /// Two entity descriptors claimed the same table.
    #[error("entity `{0}` registered more than once")]
    DuplicateEntity(&'static str),

    /// A descriptor points at a table or column that is not registered.
    #[error("unknown reference: {0}")]
    UnknownReference(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn decode(expected: &'static str, found: &'static str) -> Self {
        Self::Decode { expected, found }
    }

    pub fn unknown_reference(msg: impl Into<String>) -> Self {
        Self::UnknownReference(msg.into())
    }
}
