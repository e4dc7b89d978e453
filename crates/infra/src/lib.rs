//! Data-access layer: query plans, operations, sessions and store adapters.
//!
//! - [`query`]: declarative read/write plans validated at construction
//! - [`ops`] / [`registry`]: per-entity verbs and the accessor registry
//! - [`session`]: transaction scopes over a [`store::Backend`]
//! - [`store`]: Postgres (sqlx) and in-memory backends
//! - [`availability`] / [`pricing`]: composite marketplace queries

pub mod availability;
pub mod config;
pub mod error;
pub mod ops;
pub mod pricing;
pub mod query;
pub mod record;
pub mod registry;
pub mod session;
pub mod sql;
pub mod store;

pub use config::{ConfigError, DatabaseConfig};
pub use error::{ConstraintKind, ConstructionError, DataError};
pub use ops::{Delete, Get, Insert, Operations, Update};
pub use record::{Record, Related};
pub use registry::Accessors;
pub use session::{Database, ScopeFuture, Session};
