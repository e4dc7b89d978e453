//! `marketplace-core` — pure schema and value primitives.
//!
//! This crate contains **no infrastructure concerns**: descriptors, values, typed
//! identifiers and predicate trees are plain data shared by the catalog and the
//! data-access layer.

pub mod error;
pub mod id;
pub mod predicate;
pub mod schema;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use id::{CompanyId, OrderId, ProductId, SupplierId, UserId, VariationCountId, VariationValueId};
pub use predicate::{Aggregate, CompareOp, Direction, Operand, OrderKey, Predicate};
pub use schema::{
    Cardinality, Column, ColumnDef, ColumnRef, ColumnType, DefaultValue, Entity,
    EntityDescriptor, FieldName, ForeignKey, Relation, RelationDef, SchemaRegistry, Values,
};
pub use value::{FromValue, Value, ValueKey};
