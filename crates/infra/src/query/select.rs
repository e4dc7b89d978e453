//! Read plans: projections, joins, eager paths, filtering, grouping and pagination.

use core::marker::PhantomData;

use marketplace_core::{
    Aggregate, Cardinality, ColumnRef, CompareOp, Entity, EntityDescriptor, OrderKey, Operand, Predicate,
    Relation, RelationDef,
};

use super::layout::{Layout, LayoutBuilder};
use super::scope::Scope;
use crate::error::ConstructionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// Where the rows of an eager join land: under `relation` of the `parent` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub parent: &'static str,
    pub relation: RelationDef,
}

/// One join step of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub target: &'static EntityDescriptor,
    pub on: Predicate,
    pub kind: JoinKind,
    pub attach: Option<Attachment>,
}

/// What a read plan returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every column of an entity. The base entity fills the record itself; any other
    /// entity is nested under its table name.
    Entity(&'static EntityDescriptor),
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    Aggregate {
        aggregate: Aggregate,
        alias: String,
    },
}

impl Projection {
    pub fn entity<E: Entity>() -> Self {
        Projection::Entity(E::descriptor())
    }

    pub fn column(column: impl Into<ColumnRef>) -> Self {
        Projection::Column {
            column: column.into(),
            alias: None,
        }
    }

    pub fn column_as(column: impl Into<ColumnRef>, alias: impl Into<String>) -> Self {
        Projection::Column {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn aggregate(aggregate: Aggregate, alias: impl Into<String>) -> Self {
        Projection::Aggregate {
            aggregate,
            alias: alias.into(),
        }
    }

    fn has_aggregate(&self) -> bool {
        matches!(self, Projection::Aggregate { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EagerStep {
    parent: &'static EntityDescriptor,
    relation: RelationDef,
    target: &'static EntityDescriptor,
}

/// Typed relationship path from `F` to `T`, loaded in the same round trip.
///
/// ```ignore
/// Eager::new(Users::SUPPLIER).then(Suppliers::COMPANY).then(Companies::IMAGES)
/// ```
pub struct Eager<F, T> {
    steps: Vec<EagerStep>,
    _path: PhantomData<fn() -> (F, T)>,
}

impl<F: Entity, T: Entity> Eager<F, T> {
    pub fn new(relation: Relation<F, T>) -> Self {
        Self {
            steps: vec![EagerStep {
                parent: F::descriptor(),
                relation: relation.def(),
                target: T::descriptor(),
            }],
            _path: PhantomData,
        }
    }

    pub fn then<N: Entity>(mut self, relation: Relation<T, N>) -> Eager<F, N> {
        self.steps.push(EagerStep {
            parent: T::descriptor(),
            relation: relation.def(),
            target: N::descriptor(),
        });
        Eager {
            steps: self.steps,
            _path: PhantomData,
        }
    }

    pub(crate) fn into_steps(self) -> Vec<EagerStep> {
        self.steps
    }
}

impl<F: Entity, T: Entity> From<Relation<F, T>> for Eager<F, T> {
    fn from(relation: Relation<F, T>) -> Self {
        Eager::new(relation)
    }
}

/// Append one left join per eager step. Paths sharing a prefix share its joins.
pub(crate) fn expand_eager(joins: &mut Vec<Join>, steps: impl IntoIterator<Item = EagerStep>) {
    for step in steps {
        let already = joins.iter().any(|j| {
            j.attach.is_some_and(|a| {
                a.parent == step.parent.table && a.relation.name == step.relation.name
            })
        });
        if already {
            continue;
        }
        joins.push(Join {
            target: step.target,
            on: Predicate::compare(
                ColumnRef::new(step.parent.table, step.relation.local),
                CompareOp::Eq,
                ColumnRef::new(step.target.table, step.relation.remote),
            ),
            kind: JoinKind::Left,
            attach: Some(Attachment {
                parent: step.parent.table,
                relation: step.relation,
            }),
        });
    }
}

/// Builder of a read plan rooted at entity `E`.
///
/// Every list argument accepts any iterator; nothing is validated until [`Select::build`].
pub struct Select<E> {
    pub(crate) base: &'static EntityDescriptor,
    pub(crate) projections: Vec<Projection>,
    pub(crate) joins: Vec<Join>,
    pub(crate) eager: Vec<EagerStep>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) order_by: Vec<OrderKey>,
    pub(crate) group_by: Vec<ColumnRef>,
    pub(crate) having: Vec<Predicate>,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for Select<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Select<E> {
    /// Every column of `E`.
    pub fn new() -> Self {
        Self::project([Projection::entity::<E>()])
    }

    /// Explicit projections; `E` is still the `FROM` entity.
    pub fn project(projections: impl IntoIterator<Item = Projection>) -> Self {
        Self {
            base: E::descriptor(),
            projections: projections.into_iter().collect(),
            joins: Vec::new(),
            eager: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            offset: None,
            limit: None,
            _entity: PhantomData,
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn join<T: Entity>(self, on: Predicate) -> Self {
        self.push_join(T::descriptor(), on, JoinKind::Inner)
    }

    pub fn left_join<T: Entity>(self, on: Predicate) -> Self {
        self.push_join(T::descriptor(), on, JoinKind::Left)
    }

    fn push_join(mut self, target: &'static EntityDescriptor, on: Predicate, kind: JoinKind) -> Self {
        self.joins.push(Join {
            target,
            on,
            kind,
            attach: None,
        });
        self
    }

    /// Load a relationship path of `E` into each returned record.
    pub fn eager<T: Entity>(mut self, path: impl Into<Eager<E, T>>) -> Self {
        self.eager.extend(path.into().into_steps());
        self
    }

    pub fn order_by(mut self, keys: impl IntoIterator<Item = OrderKey>) -> Self {
        self.order_by.extend(keys);
        self
    }

    pub fn group_by<C: Into<ColumnRef>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.having.extend(predicates);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an eager path loads a collection, so one record spans several rows.
    pub(crate) fn fans_out(&self) -> bool {
        self.eager
            .iter()
            .any(|step| step.relation.cardinality == Cardinality::Many)
    }

    pub fn build(self) -> Result<QueryPlan, ConstructionError> {
        if self.projections.is_empty() {
            return Err(ConstructionError::EmptyProjection);
        }

        let mut joins = self.joins;
        expand_eager(&mut joins, self.eager);

        let mut scope = Scope::new(self.base);
        for join in &joins {
            scope.join(join)?;
        }

        let mut layout = LayoutBuilder::new(self.base);
        for projection in &self.projections {
            match projection {
                Projection::Entity(descriptor) => {
                    scope.require(descriptor.table)?;
                    if descriptor.table == self.base.table {
                        layout.entity_root(descriptor);
                    } else {
                        layout.attach(
                            self.base.table,
                            descriptor.table,
                            Cardinality::One,
                            descriptor,
                        );
                    }
                }
                Projection::Column { column, alias } => {
                    let def = scope.column(*column)?;
                    let key = match alias {
                        Some(alias) => alias.clone(),
                        None if column.table == self.base.table => column.column.to_string(),
                        None => column.to_string(),
                    };
                    layout.push_column(key, *column, def.ty);
                }
                Projection::Aggregate { aggregate, alias } => {
                    let ty = scope.aggregate_type(aggregate)?;
                    layout.push_aggregate(alias.clone(), *aggregate, ty);
                }
            }
        }
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

        for predicate in &self.predicates {
            scope.check_predicate(predicate, false)?;
        }
        for column in &self.group_by {
            scope.column(*column)?;
        }
        for predicate in &self.having {
            scope.check_predicate(predicate, true)?;
        }
        for key in &self.order_by {
            scope.check_operand(&key.operand, true)?;
        }

        let aggregated = !self.group_by.is_empty()
            || !self.having.is_empty()
            || self.projections.iter().any(Projection::has_aggregate)
            || self
                .order_by
                .iter()
                .any(|k| matches!(k.operand, Operand::Aggregate(_)));
        let paginated = self.limit.is_some() || self.offset.is_some();
        let paged_base = check_paged_base(
            self.base.table,
            &joins,
            &self.predicates,
            &self.order_by,
            paginated,
            aggregated,
        )?;

        Ok(QueryPlan {
            base: self.base,
            projections: self.projections,
            joins,
            predicates: self.predicates,
            order_by: self.order_by,
            group_by: self.group_by,
            having: self.having,
            offset: self.offset,
            limit: self.limit,
            aggregated,
            paged_base,
            descriptors: scope.into_descriptors(),
            layout: layout.finish(),
        })
    }
}

/// Limit and offset count records, not rows: with a collection loaded eagerly the base
/// entity is paginated on its own and joined afterwards. That needs filters and ordering
/// the base rows can answer alone.
fn check_paged_base(
    base: &'static str,
    joins: &[Join],
    predicates: &[Predicate],
    order_by: &[OrderKey],
    paginated: bool,
    aggregated: bool,
) -> Result<bool, ConstructionError> {
    let fans_out = joins.iter().any(|j| {
        j.attach
            .is_some_and(|a| a.relation.cardinality == Cardinality::Many)
    });
    if !paginated || !fans_out {
        return Ok(false);
    }
    let explicit_join = joins.iter().any(|j| j.attach.is_none());
    let foreign_filter = predicates
        .iter()
        .any(|p| p.tables().into_iter().any(|t| t != base));
    let foreign_order = order_by
        .iter()
        .any(|k| matches!(k.operand, Operand::Column(c) if c.table != base));
    if aggregated || explicit_join || foreign_filter || foreign_order {
        return Err(ConstructionError::PagedCollection(base));
    }
    Ok(true)
}

/// Start a read plan over every column of `E`.
pub fn select<E: Entity>() -> Select<E> {
    Select::new()
}

/// Validated, immutable read plan. Executed once per operation.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub(crate) base: &'static EntityDescriptor,
    pub(crate) projections: Vec<Projection>,
    pub(crate) joins: Vec<Join>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) order_by: Vec<OrderKey>,
    pub(crate) group_by: Vec<ColumnRef>,
    pub(crate) having: Vec<Predicate>,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) aggregated: bool,
    pub(crate) paged_base: bool,
    pub(crate) descriptors: Vec<&'static EntityDescriptor>,
    pub(crate) layout: Layout,
}

impl QueryPlan {
    pub fn base(&self) -> &'static EntityDescriptor {
        self.base
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Whether rows are grouped (explicit `GROUP BY`, or any aggregate in the plan).
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Whether limit and offset apply to base rows before the eager joins.
    pub fn pages_base(&self) -> bool {
        self.paged_base
    }

    /// Entities in scope: base first, then joins in order.
    pub fn descriptors(&self) -> &[&'static EntityDescriptor] {
        &self.descriptors
    }
}
