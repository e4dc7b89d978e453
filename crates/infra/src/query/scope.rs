//! Construction-time validation: which entities a plan may reference at each point.

use marketplace_core::{
    Aggregate, ColumnDef, ColumnRef, ColumnType, EntityDescriptor, Operand, Predicate,
};

use super::select::Join;
use crate::error::ConstructionError;

/// Entities visible to a plan, base first, then joins in application order.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    descriptors: Vec<&'static EntityDescriptor>,
}

impl Scope {
    pub(crate) fn new(base: &'static EntityDescriptor) -> Self {
        Self {
            descriptors: vec![base],
        }
    }

    /// Validate and apply one join. The join predicate sees the target and everything
    /// joined before it.
    pub(crate) fn join(&mut self, join: &Join) -> Result<(), ConstructionError> {
        if self.get(join.target.table).is_some() {
            return Err(ConstructionError::DuplicateJoin(join.target.table));
        }
        self.descriptors.push(join.target);
        self.check_predicate(&join.on, false)
    }

    pub(crate) fn get(&self, table: &str) -> Option<&'static EntityDescriptor> {
        self.descriptors.iter().copied().find(|d| d.table == table)
    }

    pub(crate) fn require(&self, table: &'static str) -> Result<&'static EntityDescriptor, ConstructionError> {
        self.get(table)
            .ok_or(ConstructionError::UnjoinedEntity(table))
    }

    pub(crate) fn column(&self, column: ColumnRef) -> Result<&'static ColumnDef, ConstructionError> {
        self.require(column.table)?
            .column(column.column)
            .ok_or(ConstructionError::UnknownColumn(column))
    }

    pub(crate) fn aggregate_type(&self, aggregate: &Aggregate) -> Result<ColumnType, ConstructionError> {
        let ty = match aggregate {
            Aggregate::CountAll => ColumnType::BigInt,
            Aggregate::Count(c) => {
                self.column(*c)?;
                ColumnType::BigInt
            }
            Aggregate::Sum(c) => match self.column(*c)?.ty {
                ColumnType::Double => ColumnType::Double,
                _ => ColumnType::BigInt,
            },
            Aggregate::Avg(c) => {
                self.column(*c)?;
                ColumnType::Double
            }
            Aggregate::Min(c) | Aggregate::Max(c) => self.column(*c)?.ty,
        };
        Ok(ty)
    }

    pub(crate) fn check_operand(
        &self,
        operand: &Operand,
        allow_aggregate: bool,
    ) -> Result<(), ConstructionError> {
        match operand {
            Operand::Value(_) => Ok(()),
            Operand::Column(c) => self.column(*c).map(|_| ()),
            Operand::Aggregate(_) if !allow_aggregate => {
                Err(ConstructionError::MisplacedAggregate)
            }
            Operand::Aggregate(a) => self.aggregate_type(a).map(|_| ()),
        }
    }

    pub(crate) fn check_predicate(
        &self,
        predicate: &Predicate,
        allow_aggregate: bool,
    ) -> Result<(), ConstructionError> {
        let mut result = Ok(());
        predicate.for_each_operand(&mut |operand| {
            if result.is_ok() {
                result = self.check_operand(operand, allow_aggregate);
            }
        });
        result
    }

    pub(crate) fn into_descriptors(self) -> Vec<&'static EntityDescriptor> {
        self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_catalog::{OrderLines, Orders, Users};
    use marketplace_core::{Column, Entity};

    #[test]
    fn unjoined_tables_are_rejected() {
        let scope = Scope::new(Orders::descriptor());
        let err = scope
            .check_predicate(&OrderLines::STATUS.eq("completed"), false)
            .unwrap_err();
        assert_eq!(err, ConstructionError::UnjoinedEntity("order_lines"));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let scope = Scope::new(Users::descriptor());
        let bogus: Column<Users> = Column::new("nickname");
        let err = scope.check_predicate(&bogus.eq("x"), false).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::UnknownColumn(ColumnRef::new("users", "nickname"))
        );
    }

    #[test]
    fn aggregates_need_permission() {
        let scope = Scope::new(Orders::descriptor());
        let having = Orders::ID.count().gt(1);
        assert_eq!(
            scope.check_predicate(&having, false),
            Err(ConstructionError::MisplacedAggregate)
        );
        assert_eq!(scope.check_predicate(&having, true), Ok(()));
    }
}
