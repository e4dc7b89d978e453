//! Error taxonomy of the data-access layer.
//!
//! ## Categories
//!
//! - **Construction**: the plan is invalid and never reaches the store
//! - **Constraint**: the store rejected a write (unique, foreign key, not null, check)
//! - **MultipleRows**: a scalar-unique read matched more than one record
//! - **Decode**: a returned value does not have the requested type
//! - **Schema**: the entity catalog failed to register (duplicate table, dangling reference)
//! - **TransactionAborted**: an earlier failure poisoned the session
//! - **Store**: connection, pool, timeout or I/O failure; the only transient category
//!
//! Nothing in this crate retries or formats user-facing messages.

use core::fmt;

use marketplace_core::{ColumnRef, CoreError};
use thiserror::Error;

/// Invalid query or mutation plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("query projects nothing")]
    EmptyProjection,

    #[error("`{0}` is referenced before it is joined")]
    UnjoinedEntity(&'static str),

    #[error("`{0}` is joined more than once")]
    DuplicateJoin(&'static str),

    #[error("unknown column {0}")]
    UnknownColumn(ColumnRef),

    #[error("aggregates are only allowed in projections, HAVING and ORDER BY")]
    MisplacedAggregate,

    #[error("insert into `{0}` has no rows")]
    EmptyInsert(&'static str),

    #[error("insert into `{table}` is missing required column `{column}`")]
    MissingRequired {
        table: &'static str,
        column: &'static str,
    },

    #[error("update of `{0}` assigns no columns")]
    EmptyAssignments(&'static str),

    #[error("mutation of `{0}` has an empty filter; use Filter::All to target every row")]
    UnfilteredMutation(&'static str),

    #[error("conflict target on `{0}` is not a unique key")]
    InvalidConflictTarget(&'static str),

    #[error("paginating `{0}` with an eager collection requires filters and ordering on `{0}` alone")]
    PagedCollection(&'static str),
}

/// Kind of integrity constraint the store enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
        })
    }
}

/// Data-access operation error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("invalid query: {0}")]
    Construction(#[from] ConstructionError),

    #[error("{kind} constraint `{constraint}` violated: {message}")]
    Constraint {
        kind: ConstraintKind,
        constraint: String,
        message: String,
    },

    #[error("expected at most one record, found {count}")]
    MultipleRows { count: usize },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("store error: {0}")]
    Store(String),
}

impl DataError {
    pub fn constraint(
        kind: ConstraintKind,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Constraint {
            kind,
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Connection-level failures that a caller may choose to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Store(_))
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            DataError::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Errors raised by the store leave the surrounding transaction unusable.
    pub(crate) fn aborts_transaction(&self) -> bool {
        matches!(
            self,
            DataError::Constraint { .. } | DataError::Store(_) | DataError::TransactionAborted(_)
        )
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateEntity(_) | CoreError::UnknownReference(_) => {
                DataError::Schema(err.to_string())
            }
            CoreError::InvalidId(_) | CoreError::Decode { .. } => DataError::Decode(err.to_string()),
        }
    }
}
