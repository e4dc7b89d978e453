//! Postgres rendering of plans.
//!
//! Identifiers are always double-quoted and table-qualified. Literal values become `$n`
//! placeholders numbered in textual order; `NULL` is written inline so it never needs a
//! typed bind. Writes return their rows with `RETURNING`, and a write that eagerly loads
//! relations is wrapped as `WITH "__affected" AS (... RETURNING *) SELECT ...` with the
//! CTE aliased back to the entity's table name, so every column reference stays valid.

use core::fmt::Write as _;

use marketplace_core::{
    Aggregate, ColumnRef, ColumnType, Direction, EntityDescriptor, Operand, OrderKey, Predicate,
    Value,
};

use crate::query::{
    DeletePlan, InsertPlan, Join, QueryPlan, Returning, Slot, SlotExpr, UpdatePlan,
};
use crate::store::Statement;

const AFFECTED: &str = "__affected";

/// Rendered SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn render(statement: Statement<'_>) -> SqlStatement {
    let mut writer = Writer::default();
    match statement {
        Statement::Select(plan) => {
            writer.scope = plan.descriptors().to_vec();
            writer.select(plan);
        }
        Statement::Count(plan) => {
            writer.scope = plan.descriptors().to_vec();
            writer.sql.push_str("SELECT COUNT(*) FROM (");
            writer.select(plan);
            writer.sql.push_str(") AS \"__counted\"");
        }
        Statement::Insert(plan) => writer.insert(plan),
        Statement::Update(plan) => writer.update(plan),
        Statement::Delete(plan) => writer.delete(plan),
    }
    SqlStatement {
        sql: writer.sql,
        params: writer.params,
    }
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Default)]
struct Writer {
    sql: String,
    params: Vec<Value>,
    scope: Vec<&'static EntityDescriptor>,
}

impl Writer {
    fn ident(&mut self, ident: &str) {
        self.sql.push_str(&quote(ident));
    }

    fn column(&mut self, column: ColumnRef) {
        self.ident(column.table);
        self.sql.push('.');
        self.ident(column.column);
    }

    fn value(&mut self, value: &Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.params.push(value.clone());
        let _ = write!(self.sql, "${}", self.params.len());
    }

    fn column_type(&self, column: ColumnRef) -> Option<ColumnType> {
        self.scope
            .iter()
            .find(|d| d.table == column.table)
            .and_then(|d| d.column(column.column))
            .map(|c| c.ty)
    }

    fn aggregate(&mut self, aggregate: &Aggregate) {
        match aggregate {
            Aggregate::CountAll => self.sql.push_str("COUNT(*)"),
            Aggregate::Count(c) => self.call("COUNT", *c, None),
            Aggregate::Sum(c) => {
                // Postgres widens SUM(bigint) to numeric.
                let cast = match self.column_type(*c) {
                    Some(ColumnType::Double) => "double precision",
                    _ => "bigint",
                };
                self.call("SUM", *c, Some(cast));
            }
            Aggregate::Min(c) => self.call("MIN", *c, None),
            Aggregate::Max(c) => self.call("MAX", *c, None),
            Aggregate::Avg(c) => self.call("AVG", *c, Some("double precision")),
        }
    }

    fn call(&mut self, function: &str, column: ColumnRef, cast: Option<&str>) {
        self.sql.push_str(function);
        self.sql.push('(');
        self.column(column);
        self.sql.push(')');
        if let Some(cast) = cast {
            self.sql.push_str("::");
            self.sql.push_str(cast);
        }
    }

    fn operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Column(c) => self.column(*c),
            Operand::Value(v) => self.value(v),
            Operand::Aggregate(a) => self.aggregate(a),
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Const(true) => self.sql.push_str("TRUE"),
            Predicate::Const(false) => self.sql.push_str("FALSE"),
            Predicate::Compare { lhs, op, rhs } => {
                self.operand(lhs);
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.operand(rhs);
            }
            Predicate::InList {
                values, negated, ..
            } if values.is_empty() => {
                self.sql.push_str(if *negated { "TRUE" } else { "FALSE" });
            }
            Predicate::InList {
                operand,
                values,
                negated,
            } => {
                self.operand(operand);
                self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.value(value);
                }
                self.sql.push(')');
            }
            Predicate::IsNull { operand, negated } => {
                self.operand(operand);
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Between { operand, low, high } => {
                self.operand(operand);
                self.sql.push_str(" BETWEEN ");
                self.value(low);
                self.sql.push_str(" AND ");
                self.value(high);
            }
            Predicate::Like {
                operand,
                pattern,
                case_insensitive,
            } => {
                self.operand(operand);
                self.sql
                    .push_str(if *case_insensitive { " ILIKE " } else { " LIKE " });
                self.value(&Value::Text(pattern.clone()));
            }
            Predicate::And(parts) => self.junction(parts, " AND ", "TRUE"),
            Predicate::Or(parts) => self.junction(parts, " OR ", "FALSE"),
            Predicate::Not(inner) => {
                self.sql.push_str("NOT (");
                self.predicate(inner);
                self.sql.push(')');
            }
        }
    }

    fn junction(&mut self, parts: &[Predicate], separator: &str, empty: &str) {
        if parts.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.predicate(part);
        }
        self.sql.push(')');
    }

    fn conjunction(&mut self, keyword: &str, predicates: &[Predicate]) {
        if predicates.is_empty() {
            return;
        }
        self.sql.push_str(keyword);
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(" AND ");
            }
            if predicates.len() > 1 {
                self.sql.push('(');
                self.predicate(predicate);
                self.sql.push(')');
            } else {
                self.predicate(predicate);
            }
        }
    }

    fn slots(&mut self, slots: &[Slot]) {
        for (i, slot) in slots.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            match &slot.expr {
                SlotExpr::Column(c) => self.column(*c),
                SlotExpr::Aggregate(a) => self.aggregate(a),
            }
        }
    }

    fn joins(&mut self, joins: &[Join]) {
        for join in joins {
            self.sql.push(' ');
            self.sql.push_str(join.kind.as_sql());
            self.sql.push(' ');
            self.ident(join.target.table);
            self.sql.push_str(" ON ");
            self.predicate(&join.on);
        }
    }

    fn order_by(&mut self, keys: &[OrderKey]) {
        if keys.is_empty() {
            return;
        }
        self.sql.push_str(" ORDER BY ");
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.operand(&key.operand);
            self.sql.push_str(match key.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
    }

    fn select(&mut self, plan: &QueryPlan) {
        self.sql.push_str("SELECT ");
        self.slots(plan.layout().slots());
        self.sql.push_str(" FROM ");
        if plan.pages_base() {
            self.paged_base(plan);
            self.joins(&plan.joins);
            self.order_by(&plan.order_by);
            return;
        }
        self.ident(plan.base.table);
        self.joins(&plan.joins);
        self.conjunction(" WHERE ", &plan.predicates);
        if !plan.group_by.is_empty() {
            self.sql.push_str(" GROUP BY ");
            for (i, column) in plan.group_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.column(*column);
            }
        }
        self.conjunction(" HAVING ", &plan.having);
        self.order_by(&plan.order_by);
        self.page(plan);
    }

    /// `(SELECT * FROM base WHERE .. ORDER BY .. LIMIT .. OFFSET ..) AS base`, so the
    /// eager joins outside see exactly one page of base rows.
    fn paged_base(&mut self, plan: &QueryPlan) {
        self.sql.push_str("(SELECT * FROM ");
        self.ident(plan.base.table);
        self.conjunction(" WHERE ", &plan.predicates);
        self.order_by(&plan.order_by);
        self.page(plan);
        self.sql.push_str(") AS ");
        self.ident(plan.base.table);
    }

    fn page(&mut self, plan: &QueryPlan) {
        if let Some(limit) = plan.limit {
            self.sql.push_str(" LIMIT ");
            self.value(&Value::Int(clamp(limit)));
        }
        if let Some(offset) = plan.offset {
            self.sql.push_str(" OFFSET ");
            self.value(&Value::Int(clamp(offset)));
        }
    }

    /// Write `body` followed by its returning clause, wrapping in a CTE when eager
    /// relations have to be joined onto the affected rows.
    fn mutation(
        &mut self,
        entity: &'static EntityDescriptor,
        returning: &Returning,
        body: impl FnOnce(&mut Self),
    ) {
        self.scope = vec![entity];
        self.scope
            .extend(returning.joins().iter().map(|j| j.target));

        if !returning.is_wrapped() {
            body(self);
            self.sql.push_str(" RETURNING ");
            self.slots(returning.layout().slots());
            return;
        }

        self.sql.push_str("WITH ");
        self.ident(AFFECTED);
        self.sql.push_str(" AS (");
        body(self);
        self.sql.push_str(" RETURNING *) SELECT ");
        self.slots(returning.layout().slots());
        self.sql.push_str(" FROM ");
        self.ident(AFFECTED);
        self.sql.push_str(" AS ");
        self.ident(entity.table);
        self.joins(returning.joins());
    }

    fn insert(&mut self, plan: &InsertPlan) {
        self.mutation(plan.entity, &plan.returning, |w| {
            w.sql.push_str("INSERT INTO ");
            w.ident(plan.entity.table);

            // A row that sets nothing still needs one column to say DEFAULT for.
            let default_only = plan.columns.is_empty();
            let columns: Vec<&str> = if default_only {
                plan.entity.columns.iter().take(1).map(|c| c.name).collect()
            } else {
                plan.columns.clone()
            };

            w.sql.push_str(" (");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    w.sql.push_str(", ");
                }
                w.ident(column);
            }
            w.sql.push_str(") VALUES ");
            for (r, row) in plan.rows.iter().enumerate() {
                if r > 0 {
                    w.sql.push_str(", ");
                }
                w.sql.push('(');
                if default_only {
                    w.sql.push_str("DEFAULT");
                }
                for (i, cell) in row.iter().enumerate() {
                    if i > 0 {
                        w.sql.push_str(", ");
                    }
                    match cell {
                        Some(value) => w.value(value),
                        None => w.sql.push_str("DEFAULT"),
                    }
                }
                w.sql.push(')');
            }

            if let Some(conflict) = &plan.conflict {
                w.sql.push_str(" ON CONFLICT (");
                for (i, column) in conflict.target.iter().enumerate() {
                    if i > 0 {
                        w.sql.push_str(", ");
                    }
                    w.ident(column);
                }
                w.sql.push_str(") DO UPDATE SET ");
                for (i, column) in conflict.update.iter().enumerate() {
                    if i > 0 {
                        w.sql.push_str(", ");
                    }
                    w.ident(column);
                    w.sql.push_str(" = EXCLUDED.");
                    w.ident(column);
                }
            }
        });
    }

    fn update(&mut self, plan: &UpdatePlan) {
        self.mutation(plan.entity, &plan.returning, |w| {
            w.sql.push_str("UPDATE ");
            w.ident(plan.entity.table);
            w.sql.push_str(" SET ");
            for (i, (column, value)) in plan.assignments.iter().enumerate() {
                if i > 0 {
                    w.sql.push_str(", ");
                }
                w.ident(column);
                w.sql.push_str(" = ");
                w.value(value);
            }
            w.conjunction(" WHERE ", &plan.predicates);
        });
    }

    fn delete(&mut self, plan: &DeletePlan) {
        self.mutation(plan.entity, &plan.returning, |w| {
            w.sql.push_str("DELETE FROM ");
            w.ident(plan.entity.table);
            w.conjunction(" WHERE ", &plan.predicates);
        });
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
