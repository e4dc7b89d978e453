//! Query Primitive Builder.
//!
//! Declarative read and write plans over entity descriptors. Builders never touch the
//! store; `build()` validates the plan and returns an immutable, executable value.

mod layout;
mod mutation;
mod scope;
mod select;

use marketplace_core::{ColumnRef, CompareOp, Entity, Operand, Predicate, Value, Values};

pub use layout::{Layout, Slot, SlotExpr};
pub use mutation::{
    ConflictUpdate, DeletePlan, DeleteQuery, Filter, InsertPlan, InsertQuery, OnConflict,
    Returning, UpdatePlan, UpdateQuery,
};
pub use select::{Attachment, Eager, Join, JoinKind, Projection, QueryPlan, Select, select};

pub(crate) use layout::Node;

/// One equality predicate per entry of a field→value mapping. `Null` values match with
/// `IS NULL`.
pub fn equality_predicates<E: Entity>(values: &Values<E>) -> Vec<Predicate> {
    values
        .iter()
        .map(|(column, value)| match value {
            Value::Null => column.is_null(),
            value => column.eq(value.clone()),
        })
        .collect()
}

/// "`target` appears in any of `slots`": one equality per slot, joined with OR.
///
/// An empty slot list never matches.
pub fn any_slot_matches<C: Into<ColumnRef>>(
    slots: impl IntoIterator<Item = C>,
    target: impl Into<Operand>,
) -> Predicate {
    let target = target.into();
    Predicate::any(slots.into_iter().map(|slot| Predicate::Compare {
        lhs: Operand::Column(slot.into()),
        op: CompareOp::Eq,
        rhs: target.clone(),
    }))
}
