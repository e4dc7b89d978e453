use core::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use marketplace_core::{
    Aggregate, ColumnDef, ColumnRef, ColumnType, CompareOp, DefaultValue, Direction,
    EntityDescriptor, Operand, OrderKey, Predicate, SchemaRegistry, Value, ValueKey,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Backend, Connection, Row, Statement};
use crate::error::{ConstraintKind, DataError};
use crate::query::{
    DeletePlan, InsertPlan, Join, JoinKind, QueryPlan, Returning, Slot, SlotExpr, UpdatePlan,
};

/// In-process store evaluating plans with SQL semantics.
///
/// Intended for tests/dev. A connection holds the store lock from `begin` until it
/// commits, rolls back or is dropped, so sessions are fully serialized. Opening a
/// second session from the task that holds the first one waits forever.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    schema: SchemaRegistry,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Empty tables for every registered entity.
    pub fn new(schema: &SchemaRegistry) -> Self {
        let tables = schema
            .names()
            .map(|name| (name, Table::default()))
            .collect();
        Self {
            schema: schema.clone(),
            state: Arc::new(Mutex::new(MemoryState { tables })),
        }
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn Connection>, DataError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryConnection {
            schema: self.schema.clone(),
            guard: Some(guard),
            snapshot: Some(snapshot),
        }))
    }
}

struct MemoryConnection {
    schema: SchemaRegistry,
    guard: Option<OwnedMutexGuard<MemoryState>>,
    /// State as of `begin`, restored on rollback.
    snapshot: Option<MemoryState>,
}

impl MemoryConnection {
    fn restore(&mut self) {
        if let (Some(mut guard), Some(snapshot)) = (self.guard.take(), self.snapshot.take()) {
            *guard = snapshot;
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    async fn fetch(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, DataError> {
        let Self { schema, guard, .. } = self;
        let state: &mut MemoryState = guard
            .as_deref_mut()
            .ok_or_else(|| DataError::store("connection already closed"))?;

        let rows = match statement {
            Statement::Select(plan) => state.select(plan)?,
            Statement::Count(plan) => {
                let count = state.units(plan)?.len();
                vec![vec![Value::Int(i64::try_from(count).unwrap_or(i64::MAX))]]
            }
            write => {
                // Statements are atomic: a failure leaves no partial effects.
                let before = state.clone();
                let result = state.write(schema, &before, write);
                if result.is_err() {
                    *state = before;
                }
                result?
            }
        };

        tracing::debug!(
            backend = "memory",
            statement = statement.kind(),
            table = statement.entity().table,
            rows = rows.len(),
            "statement executed"
        );
        Ok(rows)
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        if self.guard.take().is_none() {
            return Err(DataError::store("connection already closed"));
        }
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        self.restore();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeMap<&'static str, Table>,
}

/// Rows of one entity, cells in descriptor column order.
#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    next_serial: i64,
}

impl Table {
    fn generate(&mut self, column: &ColumnDef) -> Value {
        match column.default {
            DefaultValue::None => Value::Null,
            DefaultValue::Serial => {
                self.next_serial += 1;
                Value::Int(self.next_serial)
            }
            DefaultValue::Now => Value::Timestamp(Utc::now()),
            DefaultValue::GeneratedUuid => Value::Uuid(Uuid::now_v7()),
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => coerce(column.ty, Value::Int(i)),
            DefaultValue::Text(s) => Value::Text(s.to_string()),
        }
    }
}

impl MemoryState {
    fn table(&self, name: &str) -> Result<&Table, DataError> {
        self.tables
            .get(name)
            .ok_or_else(|| DataError::store(format!("relation \"{name}\" does not exist")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, DataError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DataError::store(format!("relation \"{name}\" does not exist")))
    }

    fn select(&self, plan: &QueryPlan) -> Result<Vec<Row>, DataError> {
        let slots = plan.layout().slots();
        Ok(self
            .units(plan)?
            .iter()
            .map(|unit| project(unit.ctx(), slots))
            .collect())
    }

    /// Result rows (or groups) of a read plan, filtered, ordered and paginated.
    fn units<'a>(&'a self, plan: &'a QueryPlan) -> Result<Vec<Unit<'a>>, DataError> {
        let scope = plan.descriptors();
        let frames: Vec<Frame<'a>> = self
            .table(plan.base.table)?
            .rows
            .iter()
            .map(|row| Frame::base(scope, row))
            .collect();

        if plan.pages_base() {
            // Filters and ordering only read the base row here; joins keep base order.
            let mut frames: Vec<Frame<'a>> = frames
                .into_iter()
                .filter(|frame| holds(Ctx::Row(frame), &plan.predicates))
                .collect();
            if !plan.order_by.is_empty() {
                frames.sort_by(|a, b| order(Ctx::Row(a), Ctx::Row(b), &plan.order_by));
            }
            let page = paginate(frames, plan);
            return Ok(self.join(page, &plan.joins)?.into_iter().map(Unit::Row).collect());
        }

        let frames = self.join(frames, &plan.joins)?;
        let frames = frames
            .into_iter()
            .filter(|frame| holds(Ctx::Row(frame), &plan.predicates));

        let mut units: Vec<Unit<'a>> = if plan.aggregated {
            group(frames, &plan.group_by)
                .into_iter()
                .map(Unit::Group)
                .filter(|unit| holds(unit.ctx(), &plan.having))
                .collect()
        } else {
            frames.map(Unit::Row).collect()
        };

        if !plan.order_by.is_empty() {
            units.sort_by(|a, b| order(a.ctx(), b.ctx(), &plan.order_by));
        }

        Ok(paginate(units, plan))
    }

    /// Apply joins in order; join `i` fills scope position `i + 1`.
    fn join<'a>(&'a self, mut frames: Vec<Frame<'a>>, joins: &[Join]) -> Result<Vec<Frame<'a>>, DataError> {
        for (i, join) in joins.iter().enumerate() {
            let position = i + 1;
            let target = self.table(join.target.table)?;
            let mut next = Vec::with_capacity(frames.len());
            for frame in frames {
                let mut matched = false;
                for row in &target.rows {
                    let mut candidate = frame.clone();
                    candidate.rows[position] = Some(row);
                    if Ctx::Row(&candidate).test(&join.on) == Some(true) {
                        matched = true;
                        next.push(candidate);
                    }
                }
                if !matched && join.kind == JoinKind::Left {
                    next.push(frame);
                }
            }
            frames = next;
        }
        Ok(frames)
    }

    fn write(
        &mut self,
        schema: &SchemaRegistry,
        before: &MemoryState,
        statement: Statement<'_>,
    ) -> Result<Vec<Row>, DataError> {
        let (entity, returning, affected) = match statement {
            Statement::Insert(plan) => (plan.entity, &plan.returning, self.insert(schema, plan)?),
            Statement::Update(plan) => (plan.entity, &plan.returning, self.update(schema, plan)?),
            Statement::Delete(plan) => (plan.entity, &plan.returning, self.delete(schema, plan)?),
            Statement::Select(_) | Statement::Count(_) => {
                return Err(DataError::store("read statement routed as a write"));
            }
        };
        returned(before, entity, returning, &affected)
    }

    fn insert(&mut self, schema: &SchemaRegistry, plan: &InsertPlan) -> Result<Vec<Row>, DataError> {
        let entity = plan.entity;
        let mut affected = Vec::with_capacity(plan.rows.len());
        // Rows this statement already inserted or updated.
        let mut touched = Vec::with_capacity(plan.rows.len());

        for cells in &plan.rows {
            let mut row = Vec::with_capacity(entity.columns.len());
            for column in entity.columns {
                let supplied = plan
                    .columns
                    .iter()
                    .position(|c| *c == column.name)
                    .and_then(|i| cells.get(i).cloned().flatten());
                let table = self.table_mut(entity.table)?;
                let value = match supplied {
                    Some(value) => {
                        let value = conform(entity, column, value)?;
                        if let (DefaultValue::Serial, Value::Int(n)) = (column.default, &value) {
                            table.next_serial = table.next_serial.max(*n);
                        }
                        value
                    }
                    None => table.generate(column),
                };
                row.push(value);
            }
            self.check_row(schema, entity, &row)?;

            if let Some(conflict) = &plan.conflict {
                if let Some(index) = self.conflicting(entity, &conflict.target, &row)? {
                    if touched.contains(&index) {
                        return Err(DataError::store(
                            "database error in insert (21000): ON CONFLICT DO UPDATE command cannot affect row a second time",
                        ));
                    }
                    touched.push(index);
                    let table = self.table_mut(entity.table)?;
                    let mut merged = table.rows[index].clone();
                    for name in &conflict.update {
                        let i = column_index(entity, name)?;
                        merged[i] = row[i].clone();
                    }
                    self.check_unique(entity, &merged, Some(index))?;
                    self.table_mut(entity.table)?.rows[index] = merged.clone();
                    affected.push(merged);
                    continue;
                }
            }

            self.check_unique(entity, &row, None)?;
            let table = self.table_mut(entity.table)?;
            touched.push(table.rows.len());
            table.rows.push(row.clone());
            affected.push(row);
        }
        Ok(affected)
    }

    fn update(&mut self, schema: &SchemaRegistry, plan: &UpdatePlan) -> Result<Vec<Row>, DataError> {
        let entity = plan.entity;
        let targets = self.matching(entity, &plan.predicates)?;

        let mut assignments = Vec::with_capacity(plan.assignments.len());
        for (name, value) in &plan.assignments {
            let i = column_index(entity, name)?;
            assignments.push((i, conform(entity, &entity.columns[i], value.clone())?));
        }

        let mut affected = Vec::with_capacity(targets.len());
        for &index in &targets {
            let old = self.table(entity.table)?.rows[index].clone();
            let mut row = old.clone();
            for (i, value) in &assignments {
                row[*i] = value.clone();
            }
            self.check_row(schema, entity, &row)?;
            self.check_unreferenced(schema, entity, &old, Some(&row), &[])?;
            self.table_mut(entity.table)?.rows[index] = row.clone();
            affected.push(row);
        }
        for (&index, row) in targets.iter().zip(&affected) {
            self.check_unique(entity, row, Some(index))?;
        }
        Ok(affected)
    }

    fn delete(&mut self, schema: &SchemaRegistry, plan: &DeletePlan) -> Result<Vec<Row>, DataError> {
        let entity = plan.entity;
        let targets = self.matching(entity, &plan.predicates)?;
        for &index in &targets {
            let row = &self.table(entity.table)?.rows[index];
            self.check_unreferenced(schema, entity, row, None, &targets)?;
        }

        let mut affected = Vec::with_capacity(targets.len());
        let mut index = 0;
        self.table_mut(entity.table)?.rows.retain(|row| {
            let hit = targets.binary_search(&index).is_ok();
            index += 1;
            if hit {
                affected.push(row.clone());
            }
            !hit
        });
        Ok(affected)
    }

    /// Ascending indices of the rows of `entity` satisfying every predicate.
    fn matching(
        &self,
        entity: &'static EntityDescriptor,
        predicates: &[Predicate],
    ) -> Result<Vec<usize>, DataError> {
        let scope = [entity];
        Ok(self
            .table(entity.table)?
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| holds(Ctx::Row(&Frame::base(&scope, row)), predicates))
            .map(|(i, _)| i)
            .collect())
    }

    /// Not-null and foreign-key checks of one candidate row.
    fn check_row(
        &self,
        schema: &SchemaRegistry,
        entity: &'static EntityDescriptor,
        row: &Row,
    ) -> Result<(), DataError> {
        for (column, value) in entity.columns.iter().zip(row) {
            if value.is_null() {
                if !column.nullable {
                    return Err(DataError::constraint(
                        ConstraintKind::NotNull,
                        format!("{}_{}_not_null", entity.table, column.name),
                        format!(
                            "null value in column \"{}\" of relation \"{}\"",
                            column.name, entity.table
                        ),
                    ));
                }
                continue;
            }
            let Some(fk) = column.references else {
                continue;
            };
            let parent = schema
                .get(fk.table)
                .ok_or_else(|| DataError::store(format!("relation \"{}\" does not exist", fk.table)))?;
            let i = column_index(parent, fk.column)?;
            let key = value.key();
            let present = self
                .table(fk.table)?
                .rows
                .iter()
                .any(|r| r.get(i).is_some_and(|v| v.key() == key));
            if !present {
                return Err(DataError::constraint(
                    ConstraintKind::ForeignKey,
                    format!("{}_{}_fkey", entity.table, column.name),
                    format!(
                        "Key ({})=({}) is not present in table \"{}\".",
                        column.name,
                        value.to_json(),
                        fk.table
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_unique(
        &self,
        entity: &'static EntityDescriptor,
        row: &Row,
        skip: Option<usize>,
    ) -> Result<(), DataError> {
        let table = self.table(entity.table)?;
        for set in entity.unique_sets() {
            let indices = set
                .iter()
                .map(|c| column_index(entity, c))
                .collect::<Result<Vec<_>, _>>()?;
            // NULLs never collide.
            if indices.iter().any(|&i| row[i].is_null()) {
                continue;
            }
            let key: Vec<ValueKey> = indices.iter().map(|&i| row[i].key()).collect();
            let clash = table.rows.iter().enumerate().any(|(n, other)| {
                Some(n) != skip && indices.iter().zip(&key).all(|(&i, k)| other[i].key() == *k)
            });
            if clash {
                let constraint = if set == entity.primary_key {
                    format!("{}_pkey", entity.table)
                } else {
                    format!("{}_{}_key", entity.table, set.join("_"))
                };
                let values: Vec<String> = indices.iter().map(|&i| row[i].to_json().to_string()).collect();
                return Err(DataError::constraint(
                    ConstraintKind::Unique,
                    constraint,
                    format!("Key ({})=({}) already exists.", set.join(", "), values.join(", ")),
                ));
            }
        }
        Ok(())
    }

    fn conflicting(
        &self,
        entity: &'static EntityDescriptor,
        target: &[&'static str],
        row: &Row,
    ) -> Result<Option<usize>, DataError> {
        let indices = target
            .iter()
            .map(|c| column_index(entity, c))
            .collect::<Result<Vec<_>, _>>()?;
        if indices.iter().any(|&i| row[i].is_null()) {
            return Ok(None);
        }
        Ok(self
            .table(entity.table)?
            .rows
            .iter()
            .position(|other| indices.iter().all(|&i| other[i].key() == row[i].key())))
    }

    /// Foreign keys restrict: a referenced key may not disappear or change while rows
    /// outside `removing` still point at it.
    fn check_unreferenced(
        &self,
        schema: &SchemaRegistry,
        entity: &'static EntityDescriptor,
        old: &Row,
        new: Option<&Row>,
        removing: &[usize],
    ) -> Result<(), DataError> {
        for child in schema.descriptors() {
            for column in child.columns {
                let Some(fk) = column.references.filter(|fk| fk.table == entity.table) else {
                    continue;
                };
                let k = column_index(entity, fk.column)?;
                let referenced = &old[k];
                if referenced.is_null() || new.is_some_and(|n| n[k].key() == referenced.key()) {
                    continue;
                }
                let c = column_index(child, column.name)?;
                let key = referenced.key();
                let still = self
                    .table(child.table)?
                    .rows
                    .iter()
                    .enumerate()
                    .any(|(n, r)| {
                        r[c].key() == key
                            && !(child.table == entity.table && removing.binary_search(&n).is_ok())
                    });
                if still {
                    return Err(DataError::constraint(
                        ConstraintKind::ForeignKey,
                        format!("{}_{}_fkey", child.table, column.name),
                        format!(
                            "Key ({})=({}) is still referenced from table \"{}\".",
                            fk.column,
                            referenced.to_json(),
                            child.table
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Project affected rows, joining eager relations against the pre-statement state.
fn returned(
    before: &MemoryState,
    entity: &'static EntityDescriptor,
    returning: &Returning,
    affected: &[Row],
) -> Result<Vec<Row>, DataError> {
    let mut scope = vec![entity];
    scope.extend(returning.joins().iter().map(|j| j.target));
    let frames = affected.iter().map(|row| Frame::base(&scope, row)).collect();
    let frames = before.join(frames, returning.joins())?;
    let slots = returning.layout().slots();
    Ok(frames.iter().map(|f| project(Ctx::Row(f), slots)).collect())
}

fn column_index(entity: &EntityDescriptor, name: &str) -> Result<usize, DataError> {
    entity.column_index(name).ok_or_else(|| {
        DataError::store(format!(
            "column \"{name}\" of relation \"{}\" does not exist",
            entity.table
        ))
    })
}

fn coerce(ty: ColumnType, value: Value) -> Value {
    match (ty, value) {
        (ColumnType::Double, Value::Int(i)) => Value::Float(i as f64),
        (_, value) => value,
    }
}

/// Coerce `value` into the column's storage type, rejecting mismatches.
fn conform(entity: &EntityDescriptor, column: &ColumnDef, value: Value) -> Result<Value, DataError> {
    let value = coerce(column.ty, value);
    let fits = matches!(
        (column.ty, &value),
        (_, Value::Null)
            | (ColumnType::Bool, Value::Bool(_))
            | (ColumnType::BigInt, Value::Int(_))
            | (ColumnType::Double, Value::Float(_))
            | (ColumnType::Text, Value::Text(_))
            | (ColumnType::Uuid, Value::Uuid(_))
            | (ColumnType::Timestamp, Value::Timestamp(_))
            | (ColumnType::Json, Value::Json(_))
    );
    if fits {
        Ok(value)
    } else {
        Err(DataError::store(format!(
            "column \"{}\" of relation \"{}\" is of type {} but expression is of type {}",
            column.name,
            entity.table,
            column.ty.sql_name(),
            value.type_name()
        )))
    }
}

/// One joined row: an optional source row per entity in scope.
#[derive(Clone)]
struct Frame<'a> {
    scope: &'a [&'static EntityDescriptor],
    rows: Vec<Option<&'a Row>>,
}

impl<'a> Frame<'a> {
    fn base(scope: &'a [&'static EntityDescriptor], row: &'a Row) -> Self {
        let mut rows = vec![None; scope.len()];
        if let Some(first) = rows.first_mut() {
            *first = Some(row);
        }
        Self { scope, rows }
    }

    fn value(&self, column: ColumnRef) -> Value {
        self.scope
            .iter()
            .position(|d| d.table == column.table)
            .and_then(|pos| {
                let index = self.scope[pos].column_index(column.column)?;
                self.rows.get(pos).copied().flatten()?.get(index).cloned()
            })
            .unwrap_or(Value::Null)
    }
}

enum Unit<'a> {
    Row(Frame<'a>),
    Group(Vec<Frame<'a>>),
}

impl<'a> Unit<'a> {
    fn ctx(&self) -> Ctx<'_, 'a> {
        match self {
            Unit::Row(frame) => Ctx::Row(frame),
            Unit::Group(frames) => Ctx::Group(frames),
        }
    }
}

/// Evaluation context: a single row, or a group for aggregates.
#[derive(Clone, Copy)]
enum Ctx<'c, 'a> {
    Row(&'c Frame<'a>),
    Group(&'c [Frame<'a>]),
}

impl Ctx<'_, '_> {
    fn column(self, column: ColumnRef) -> Value {
        match self {
            Ctx::Row(frame) => frame.value(column),
            Ctx::Group(frames) => frames.first().map_or(Value::Null, |f| f.value(column)),
        }
    }

    fn operand(self, operand: &Operand) -> Value {
        match operand {
            Operand::Value(value) => value.clone(),
            Operand::Column(column) => self.column(*column),
            Operand::Aggregate(aggregate) => match self {
                Ctx::Group(frames) => aggregate_value(aggregate, frames),
                Ctx::Row(_) => Value::Null,
            },
        }
    }

    /// Three-valued evaluation; `None` is SQL unknown.
    fn test(self, predicate: &Predicate) -> Option<bool> {
        match predicate {
            Predicate::Const(b) => Some(*b),
            Predicate::Compare { lhs, op, rhs } => {
                let ord = self.operand(lhs).compare(&self.operand(rhs))?;
                Some(match op {
                    CompareOp::Eq => ord.is_eq(),
                    CompareOp::Ne => ord.is_ne(),
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Le => ord.is_le(),
                    CompareOp::Gt => ord.is_gt(),
                    CompareOp::Ge => ord.is_ge(),
                })
            }
            Predicate::InList {
                operand,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Some(*negated);
                }
                let value = self.operand(operand);
                if value.is_null() {
                    return None;
                }
                let mut unknown = false;
                for candidate in values {
                    match value.compare(candidate) {
                        Some(Ordering::Equal) => return Some(!negated),
                        None => unknown = true,
                        Some(_) => {}
                    }
                }
                if unknown { None } else { Some(*negated) }
            }
            Predicate::IsNull { operand, negated } => {
                Some(self.operand(operand).is_null() != *negated)
            }
            Predicate::Between { operand, low, high } => {
                let value = self.operand(operand);
                all3([
                    value.compare(low).map(Ordering::is_ge),
                    value.compare(high).map(Ordering::is_le),
                ])
            }
            Predicate::Like {
                operand,
                pattern,
                case_insensitive,
            } => match self.operand(operand) {
                Value::Text(text) if *case_insensitive => {
                    Some(like(&text.to_lowercase(), &pattern.to_lowercase()))
                }
                Value::Text(text) => Some(like(&text, pattern)),
                _ => None,
            },
            Predicate::And(parts) => all3(parts.iter().map(|p| self.test(p))),
            Predicate::Or(parts) => any3(parts.iter().map(|p| self.test(p))),
            Predicate::Not(inner) => self.test(inner).map(|b| !b),
        }
    }
}

fn paginate<T>(items: Vec<T>, plan: &QueryPlan) -> Vec<T> {
    let offset = plan.offset.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let limit = plan
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    items.into_iter().skip(offset).take(limit).collect()
}

fn holds(ctx: Ctx<'_, '_>, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| ctx.test(p) == Some(true))
}

fn all3(parts: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for part in parts {
        match part {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

fn any3(parts: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for part in parts {
        match part {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown { None } else { Some(false) }
}

/// `LIKE` with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p).copied() {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp + 1;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Group frames by key, first-seen order. Without keys every frame (possibly none)
/// forms a single group.
fn group<'a>(frames: impl Iterator<Item = Frame<'a>>, by: &[ColumnRef]) -> Vec<Vec<Frame<'a>>> {
    if by.is_empty() {
        return vec![frames.collect()];
    }
    let mut index: BTreeMap<Vec<ValueKey>, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<Frame<'a>>> = Vec::new();
    for frame in frames {
        let key: Vec<ValueKey> = by.iter().map(|c| frame.value(*c).key()).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(frame);
    }
    groups
}

fn aggregate_value(aggregate: &Aggregate, frames: &[Frame<'_>]) -> Value {
    let present = |column: ColumnRef| {
        frames
            .iter()
            .map(move |f| f.value(column))
            .filter(|v| !v.is_null())
    };
    match aggregate {
        Aggregate::CountAll => Value::Int(i64::try_from(frames.len()).unwrap_or(i64::MAX)),
        Aggregate::Count(c) => Value::Int(i64::try_from(present(*c).count()).unwrap_or(i64::MAX)),
        Aggregate::Sum(c) => sum(present(*c)),
        Aggregate::Min(c) => extreme(present(*c), Ordering::Less),
        Aggregate::Max(c) => extreme(present(*c), Ordering::Greater),
        Aggregate::Avg(c) => {
            let numbers: Vec<f64> = present(*c)
                .filter_map(|v| match v {
                    Value::Int(i) => Some(i as f64),
                    Value::Float(f) => Some(f),
                    _ => None,
                })
                .collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
    }
}

fn sum(values: impl Iterator<Item = Value>) -> Value {
    let mut int: Option<i64> = None;
    let mut float: Option<f64> = None;
    for value in values {
        match value {
            Value::Int(i) => int = Some(int.unwrap_or(0).saturating_add(i)),
            Value::Float(f) => float = Some(float.unwrap_or(0.0) + f),
            _ => {}
        }
    }
    match (int, float) {
        (None, None) => Value::Null,
        (Some(i), None) => Value::Int(i),
        (i, Some(f)) => Value::Float(f + i.unwrap_or(0) as f64),
    }
}

fn extreme(values: impl Iterator<Item = Value>, wanted: Ordering) -> Value {
    values
        .reduce(|best, v| if v.compare(&best) == Some(wanted) { v } else { best })
        .unwrap_or(Value::Null)
}

/// Postgres ordering: nulls sort above every value.
fn order(a: Ctx<'_, '_>, b: Ctx<'_, '_>, keys: &[OrderKey]) -> Ordering {
    for key in keys {
        let (x, y) = (a.operand(&key.operand), b.operand(&key.operand));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.compare(&y).unwrap_or(Ordering::Equal),
        };
        let ord = match key.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn project(ctx: Ctx<'_, '_>, slots: &[Slot]) -> Row {
    slots
        .iter()
        .map(|slot| match &slot.expr {
            SlotExpr::Column(column) => ctx.column(*column),
            SlotExpr::Aggregate(aggregate) => ctx.operand(&Operand::Aggregate(*aggregate)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::Entity;

    #[test]
    fn like_handles_both_wildcards() {
        assert!(like("marketplace", "market%"));
        assert!(like("marketplace", "%place"));
        assert!(like("marketplace", "m_rket%e"));
        assert!(like("", "%"));
        assert!(!like("market", "market_"));
        assert!(!like("marketplace", "%plaza"));
    }

    #[test]
    fn three_valued_connectives() {
        assert_eq!(all3([Some(true), None]), None);
        assert_eq!(all3([None, Some(false)]), Some(false));
        assert_eq!(any3([None, Some(true)]), Some(true));
        assert_eq!(any3([Some(false), None]), None);
        assert_eq!(all3([]), Some(true));
        assert_eq!(any3([]), Some(false));
    }

    #[test]
    fn sums_stay_integral_until_a_float_appears() {
        assert_eq!(sum([Value::Int(2), Value::Int(3)].into_iter()), Value::Int(5));
        assert_eq!(
            sum([Value::Int(2), Value::Float(0.5)].into_iter()),
            Value::Float(2.5)
        );
        assert_eq!(sum(core::iter::empty()), Value::Null);
    }

    #[test]
    fn doubles_accept_integers_but_text_does_not() {
        let column = ColumnDef::new("discount", ColumnType::Double);
        let entity = marketplace_catalog::ProductPrices::descriptor();
        assert_eq!(conform(entity, &column, Value::Int(3)), Ok(Value::Float(3.0)));

        let column = ColumnDef::new("name", ColumnType::Text);
        assert!(matches!(
            conform(entity, &column, Value::Int(3)),
            Err(DataError::Store(_))
        ));
    }
}
