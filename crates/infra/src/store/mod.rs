//! Store boundary.
//!
//! A [`Backend`] hands out [`Connection`]s, each owning exactly one open transaction.
//! Connections execute validated plans and return rows laid out per the plan's
//! [`Layout`](crate::query::Layout); they never shape records themselves.
//!
//! Implementations:
//! - [`PostgresBackend`]: sqlx connection pool
//! - [`MemoryBackend`]: serializable in-process store for tests and local runs

mod memory;
mod postgres;

use marketplace_core::{ColumnType, EntityDescriptor, Value};

use crate::error::DataError;
use crate::query::{DeletePlan, InsertPlan, QueryPlan, UpdatePlan};

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

/// One returned row, positionally matching the statement's slots.
pub type Row = Vec<Value>;

/// A plan ready for one round trip.
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    Select(&'a QueryPlan),
    /// Number of rows the select would return.
    Count(&'a QueryPlan),
    Insert(&'a InsertPlan),
    Update(&'a UpdatePlan),
    Delete(&'a DeletePlan),
}

impl Statement<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Count(_) => "count",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }

    pub fn entity(&self) -> &'static EntityDescriptor {
        match self {
            Statement::Select(plan) | Statement::Count(plan) => plan.base(),
            Statement::Insert(plan) => plan.entity(),
            Statement::Update(plan) => plan.entity(),
            Statement::Delete(plan) => plan.entity(),
        }
    }

    /// Storage types of the returned positions.
    pub fn slot_types(&self) -> Vec<ColumnType> {
        match self {
            Statement::Select(plan) => plan.layout().slot_types(),
            Statement::Count(_) => vec![ColumnType::BigInt],
            Statement::Insert(plan) => plan.returning().layout().slot_types(),
            Statement::Update(plan) => plan.returning().layout().slot_types(),
            Statement::Delete(plan) => plan.returning().layout().slot_types(),
        }
    }
}

/// Source of transactional connections.
#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Acquire a connection and begin a transaction on it.
    async fn begin(&self) -> Result<Box<dyn Connection>, DataError>;
}

/// One live transaction.
///
/// Dropping a connection that was neither committed nor rolled back rolls it back.
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn fetch(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, DataError>;

    async fn commit(&mut self) -> Result<(), DataError>;

    async fn rollback(&mut self) -> Result<(), DataError>;
}
