//! Write plans: insert, update and delete, each returning the affected rows.

use core::marker::PhantomData;

use marketplace_core::{Column, ColumnRef, Entity, EntityDescriptor, Predicate, Value, Values};

use super::layout::{Layout, LayoutBuilder};
use super::scope::Scope;
use super::select::{Eager, EagerStep, Join, expand_eager};
use crate::error::ConstructionError;

/// Row filter of an update or delete.
///
/// There is no default: targeting every row takes the explicit [`Filter::All`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Conjunction of the predicates; must not be empty.
    Where(Vec<Predicate>),
    All,
}

impl Filter {
    pub fn by(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Filter::Where(predicates.into_iter().collect())
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Filter::Where(vec![predicate])
    }
}

/// What an insert does when a row collides with a unique key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OnConflict {
    /// Surface the collision as a unique-constraint error.
    #[default]
    Fail,
    /// Overwrite the supplied columns of the existing row matching `target`.
    Update { target: Vec<&'static str> },
}

impl OnConflict {
    pub fn update<E: Entity>(target: impl IntoIterator<Item = Column<E>>) -> Self {
        OnConflict::Update {
            target: target.into_iter().map(|c| c.name()).collect(),
        }
    }
}

/// Affected-row projection shared by every write plan.
#[derive(Debug, Clone)]
pub struct Returning {
    pub(crate) joins: Vec<Join>,
    pub(crate) layout: Layout,
}

impl Returning {
    fn build(
        entity: &'static EntityDescriptor,
        eager: Vec<EagerStep>,
    ) -> Result<Self, ConstructionError> {
        let mut joins = Vec::new();
        expand_eager(&mut joins, eager);

        let mut scope = Scope::new(entity);
        for join in &joins {
            scope.join(join)?;
        }

        let mut layout = LayoutBuilder::new(entity);
        layout.entity_root(entity);
        for join in &joins {
            if let Some(attach) = join.attach {
                layout.attach(
                    attach.parent,
                    attach.relation.name,
                    attach.relation.cardinality,
                    join.target,
                );
            }
        }
        Ok(Self {
            joins,
            layout: layout.finish(),
        })
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Whether the affected rows are wrapped to join eager relations.
    pub fn is_wrapped(&self) -> bool {
        !self.joins.is_empty()
    }
}

fn filter_predicates(
    entity: &'static EntityDescriptor,
    filter: Filter,
) -> Result<Vec<Predicate>, ConstructionError> {
    match filter {
        Filter::All => Ok(Vec::new()),
        Filter::Where(predicates) if predicates.is_empty() => {
            Err(ConstructionError::UnfilteredMutation(entity.table))
        }
        Filter::Where(predicates) => {
            let scope = Scope::new(entity);
            for predicate in &predicates {
                scope.check_predicate(predicate, false)?;
            }
            Ok(predicates)
        }
    }
}

fn check_columns(
    entity: &'static EntityDescriptor,
    names: impl IntoIterator<Item = &'static str>,
) -> Result<(), ConstructionError> {
    for name in names {
        if !entity.has_column(name) {
            return Err(ConstructionError::UnknownColumn(ColumnRef::new(
                entity.table,
                name,
            )));
        }
    }
    Ok(())
}

/// Insert builder for entity `E`.
pub struct InsertQuery<E> {
    rows: Vec<Values<E>>,
    on_conflict: OnConflict,
    eager: Vec<EagerStep>,
}

impl<E: Entity> InsertQuery<E> {
    pub fn new(rows: impl IntoIterator<Item = Values<E>>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            on_conflict: OnConflict::Fail,
            eager: Vec::new(),
        }
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    pub fn eager<T: Entity>(mut self, path: impl Into<Eager<E, T>>) -> Self {
        self.eager.extend(path.into().into_steps());
        self
    }

    pub fn build(self) -> Result<InsertPlan, ConstructionError> {
        let entity = E::descriptor();
        if self.rows.is_empty() {
            return Err(ConstructionError::EmptyInsert(entity.table));
        }

        for row in &self.rows {
            for required in entity.required_columns() {
                if !row.contains(required.name) {
                    return Err(ConstructionError::MissingRequired {
                        table: entity.table,
                        column: required.name,
                    });
                }
            }
        }

        for row in &self.rows {
            check_columns(entity, row.iter().map(|(c, _)| c.name()))?;
        }
        let columns: Vec<&'static str> = entity
            .columns
            .iter()
            .map(|c| c.name)
            .filter(|name| self.rows.iter().any(|row| row.contains(name)))
            .collect();

        let conflict = match self.on_conflict {
            OnConflict::Fail => None,
            OnConflict::Update { target } => {
                let is_unique_key = entity.unique_sets().any(|set| {
                    set.len() == target.len() && set.iter().all(|c| target.contains(c))
                });
                if !is_unique_key {
                    return Err(ConstructionError::InvalidConflictTarget(entity.table));
                }
                let mut update: Vec<&'static str> = columns
                    .iter()
                    .copied()
                    .filter(|c| !target.contains(c))
                    .collect();
                if update.is_empty() {
                    update = target.clone();
                }
                Some(ConflictUpdate { target, update })
            }
        };

        let rows = self
            .rows
            .iter()
            .map(|row| columns.iter().map(|c| row.get(c).cloned()).collect())
            .collect();

        let returning = Returning::build(entity, self.eager)?;
        Ok(InsertPlan {
            entity,
            columns,
            rows,
            conflict,
            returning,
        })
    }
}

impl<E: Entity> From<Values<E>> for InsertQuery<E> {
    fn from(values: Values<E>) -> Self {
        InsertQuery::new([values])
    }
}

impl<E: Entity> From<Vec<Values<E>>> for InsertQuery<E> {
    fn from(rows: Vec<Values<E>>) -> Self {
        InsertQuery::new(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictUpdate {
    pub target: Vec<&'static str>,
    pub update: Vec<&'static str>,
}

/// Validated insert. `None` cells take the column default.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub(crate) entity: &'static EntityDescriptor,
    pub(crate) columns: Vec<&'static str>,
    pub(crate) rows: Vec<Vec<Option<Value>>>,
    pub(crate) conflict: Option<ConflictUpdate>,
    pub(crate) returning: Returning,
}

impl InsertPlan {
    pub fn entity(&self) -> &'static EntityDescriptor {
        self.entity
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn returning(&self) -> &Returning {
        &self.returning
    }
}

/// Update builder for entity `E`.
pub struct UpdateQuery<E> {
    values: Values<E>,
    filter: Filter,
    eager: Vec<EagerStep>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> UpdateQuery<E> {
    pub fn new(values: Values<E>, filter: impl Into<Filter>) -> Self {
        Self {
            values,
            filter: filter.into(),
            eager: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn eager<T: Entity>(mut self, path: impl Into<Eager<E, T>>) -> Self {
        self.eager.extend(path.into().into_steps());
        self
    }

    pub fn build(self) -> Result<UpdatePlan, ConstructionError> {
        let entity = E::descriptor();
        if self.values.is_empty() {
            return Err(ConstructionError::EmptyAssignments(entity.table));
        }
        let assignments = self.values.into_entries();
        check_columns(entity, assignments.iter().map(|(name, _)| *name))?;
        let predicates = filter_predicates(entity, self.filter)?;
        let returning = Returning::build(entity, self.eager)?;
        Ok(UpdatePlan {
            entity,
            assignments,
            predicates,
            returning,
        })
    }
}

/// Validated update. An empty predicate list means every row.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub(crate) entity: &'static EntityDescriptor,
    pub(crate) assignments: Vec<(&'static str, Value)>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) returning: Returning,
}

impl UpdatePlan {
    pub fn entity(&self) -> &'static EntityDescriptor {
        self.entity
    }

    pub fn returning(&self) -> &Returning {
        &self.returning
    }
}

/// Delete builder for entity `E`.
pub struct DeleteQuery<E> {
    filter: Filter,
    eager: Vec<EagerStep>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> DeleteQuery<E> {
    pub fn new(filter: impl Into<Filter>) -> Self {
        Self {
            filter: filter.into(),
            eager: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn eager<T: Entity>(mut self, path: impl Into<Eager<E, T>>) -> Self {
        self.eager.extend(path.into().into_steps());
        self
    }

    pub fn build(self) -> Result<DeletePlan, ConstructionError> {
        let entity = E::descriptor();
        let predicates = filter_predicates(entity, self.filter)?;
        let returning = Returning::build(entity, self.eager)?;
        Ok(DeletePlan {
            entity,
            predicates,
            returning,
        })
    }
}

impl<E: Entity> From<Filter> for DeleteQuery<E> {
    fn from(filter: Filter) -> Self {
        DeleteQuery::new(filter)
    }
}

impl<E: Entity> From<Predicate> for DeleteQuery<E> {
    fn from(predicate: Predicate) -> Self {
        DeleteQuery::new(predicate)
    }
}

/// Validated delete. An empty predicate list means every row.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub(crate) entity: &'static EntityDescriptor,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) returning: Returning,
}

impl DeletePlan {
    pub fn entity(&self) -> &'static EntityDescriptor {
        self.entity
    }

    pub fn returning(&self) -> &Returning {
        &self.returning
    }
}
