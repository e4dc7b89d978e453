//! Composable boolean conditions over entity fields.
//!
//! Predicates are plain data: they name columns by [`ColumnRef`] and carry literal
//! [`Value`]s. Rendering them to SQL or evaluating them in memory is the store layer's
//! job.

use std::collections::BTreeSet;

use crate::schema::{Column, ColumnRef, Entity};
use crate::value::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub const fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Aggregate over the rows of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    CountAll,
    Count(ColumnRef),
    Sum(ColumnRef),
    Min(ColumnRef),
    Max(ColumnRef),
    Avg(ColumnRef),
}

impl Aggregate {
    pub const fn column(&self) -> Option<ColumnRef> {
        match self {
            Aggregate::CountAll => None,
            Aggregate::Count(c)
            | Aggregate::Sum(c)
            | Aggregate::Min(c)
            | Aggregate::Max(c)
            | Aggregate::Avg(c) => Some(*c),
        }
    }
}

/// Operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Value(Value),
    Aggregate(Aggregate),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }
}

impl From<ColumnRef> for Operand {
    fn from(column: ColumnRef) -> Self {
        Operand::Column(column)
    }
}

impl<E: Entity> From<Column<E>> for Operand {
    fn from(column: Column<E>) -> Self {
        Operand::Column(column.to_ref())
    }
}

impl From<Aggregate> for Operand {
    fn from(aggregate: Aggregate) -> Self {
        Operand::Aggregate(aggregate)
    }
}

/// Boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    /// `IN` / `NOT IN`; an empty list never matches.
    InList {
        operand: Operand,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Value,
        high: Value,
    },
    Like {
        operand: Operand,
        pattern: String,
        case_insensitive: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(lhs: impl Into<Operand>, op: CompareOp, rhs: impl Into<Operand>) -> Self {
        Predicate::Compare {
            lhs: lhs.into(),
            op,
            rhs: rhs.into(),
        }
    }

    /// Conjunction of every predicate; an empty input is `true`.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts: Vec<_> = predicates.into_iter().collect();
        match parts.len() {
            0 => Predicate::Const(true),
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Disjunction of every predicate; an empty input is `false`.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts: Vec<_> = predicates.into_iter().collect();
        match parts.len() {
            0 => Predicate::Const(false),
            1 => parts.remove(0),
            _ => Predicate::Or(parts),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Visit every operand in the tree.
    pub fn for_each_operand<'a>(&'a self, f: &mut impl FnMut(&'a Operand)) {
        match self {
            Predicate::Const(_) => {}
            Predicate::Compare { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Predicate::InList { operand, .. }
            | Predicate::IsNull { operand, .. }
            | Predicate::Between { operand, .. }
            | Predicate::Like { operand, .. } => f(operand),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    part.for_each_operand(f);
                }
            }
            Predicate::Not(inner) => inner.for_each_operand(f),
        }
    }

    /// Every column the predicate reads, including aggregate arguments.
    pub fn columns(&self) -> BTreeSet<ColumnRef> {
        let mut out = BTreeSet::new();
        self.for_each_operand(&mut |operand| match operand {
            Operand::Column(c) => {
                out.insert(*c);
            }
            Operand::Aggregate(a) => {
                if let Some(c) = a.column() {
                    out.insert(c);
                }
            }
            Operand::Value(_) => {}
        });
        out
    }

    /// Every table the predicate reads.
    pub fn tables(&self) -> BTreeSet<&'static str> {
        self.columns().into_iter().map(|c| c.table).collect()
    }

    pub fn has_aggregate(&self) -> bool {
        let mut found = false;
        self.for_each_operand(&mut |operand| {
            if matches!(operand, Operand::Aggregate(_)) {
                found = true;
            }
        });
        found
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ordering key; keys apply left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub operand: Operand,
    pub direction: Direction,
}

impl OrderKey {
    pub fn asc(operand: impl Into<Operand>) -> Self {
        Self {
            operand: operand.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(operand: impl Into<Operand>) -> Self {
        Self {
            operand: operand.into(),
            direction: Direction::Desc,
        }
    }
}

impl<E: Entity> Column<E> {
    fn cmp_value(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self.to_ref(), op, Operand::value(value))
    }

    /// Equality with a literal. A null literal lowers to `IS NULL`, since `= NULL` never holds.
    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        match value.into() {
            Value::Null => self.is_null(),
            value => self.cmp_value(CompareOp::Eq, value),
        }
    }

    /// Inequality with a literal; a null literal lowers to `IS NOT NULL`.
    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        match value.into() {
            Value::Null => self.is_not_null(),
            value => self.cmp_value(CompareOp::Ne, value),
        }
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.cmp_value(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.cmp_value(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.cmp_value(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.cmp_value(CompareOp::Ge, value)
    }

    /// Column-to-column equality, typically a join condition.
    pub fn eq_col(self, other: impl Into<ColumnRef>) -> Predicate {
        Predicate::compare(self.to_ref(), CompareOp::Eq, other.into())
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::InList {
            operand: self.to_ref().into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::InList {
            operand: self.to_ref().into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull {
            operand: self.to_ref().into(),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNull {
            operand: self.to_ref().into(),
            negated: true,
        }
    }

    /// Inclusive range.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        Predicate::Between {
            operand: self.to_ref().into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            operand: self.to_ref().into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    pub fn ilike(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            operand: self.to_ref().into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn asc(self) -> OrderKey {
        OrderKey::asc(self.to_ref())
    }

    pub fn desc(self) -> OrderKey {
        OrderKey::desc(self.to_ref())
    }

    pub fn count(self) -> Aggregate {
        Aggregate::Count(self.to_ref())
    }

    pub fn sum(self) -> Aggregate {
        Aggregate::Sum(self.to_ref())
    }

    pub fn min(self) -> Aggregate {
        Aggregate::Min(self.to_ref())
    }

    pub fn max(self) -> Aggregate {
        Aggregate::Max(self.to_ref())
    }

    pub fn avg(self) -> Aggregate {
        Aggregate::Avg(self.to_ref())
    }
}

impl Aggregate {
    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Gt, Operand::value(value))
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Ge, Operand::value(value))
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Lt, Operand::value(value))
    }
}
