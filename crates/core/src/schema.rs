//! Entity descriptors: static storage metadata for persisted record types.
//!
//! Descriptors are `'static` data produced by the schema-definition layer (see the
//! `marketplace-catalog` crate). They are never mutated after process start, which is
//! what lets accessors and plans share them across concurrent sessions without locking.

use core::fmt;
use core::marker::PhantomData;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::value::Value;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    BigInt,
    Double,
    Text,
    Uuid,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Postgres type name used when rendering casts.
    pub const fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Bool => "boolean",
            ColumnType::BigInt => "bigint",
            ColumnType::Double => "double precision",
            ColumnType::Text => "text",
            ColumnType::Uuid => "uuid",
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Json => "jsonb",
        }
    }
}

/// Value a column takes when an insert does not mention it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// No default: the column is required unless nullable.
    None,
    /// Store-generated sequence value.
    Serial,
    /// Current timestamp at insert time.
    Now,
    /// Fresh time-ordered uuid.
    GeneratedUuid,
    Bool(bool),
    Int(i64),
    Text(&'static str),
}

/// Foreign-key reference from a column to `table.column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

/// Declared column of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: DefaultValue,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: DefaultValue::None,
            references: None,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn default(self, default: DefaultValue) -> Self {
        Self { default, ..self }
    }

    pub const fn references(self, table: &'static str, column: &'static str) -> Self {
        Self {
            references: Some(ForeignKey { table, column }),
            ..self
        }
    }

    /// Required columns must be supplied by every insert.
    pub const fn is_required(&self) -> bool {
        !self.nullable && matches!(self.default, DefaultValue::None)
    }
}

/// Whether a relationship yields one related record or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Declared relationship: `self.local = target.remote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: &'static str,
    pub local: &'static str,
    pub remote: &'static str,
    pub cardinality: Cardinality,
}

impl RelationDef {
    pub const fn one(
        name: &'static str,
        target: &'static str,
        local: &'static str,
        remote: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local,
            remote,
            cardinality: Cardinality::One,
        }
    }

    pub const fn many(
        name: &'static str,
        target: &'static str,
        local: &'static str,
        remote: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local,
            remote,
            cardinality: Cardinality::Many,
        }
    }
}

/// Storage shape of one persisted record type.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub table: &'static str,
    pub primary_key: &'static [&'static str],
    pub columns: &'static [ColumnDef],
    /// Composite unique constraints, in addition to the primary key.
    pub unique: &'static [&'static [&'static str]],
    pub relationships: &'static [RelationDef],
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relationship(&self, name: &str) -> Option<&'static RelationDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        self.columns.iter().filter(|c| c.is_required())
    }

    /// Every uniqueness constraint, primary key first.
    pub fn unique_sets(&self) -> impl Iterator<Item = &'static [&'static str]> {
        core::iter::once(self.primary_key).chain(self.unique.iter().copied())
    }
}

impl PartialEq for EntityDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl Eq for EntityDescriptor {}

/// A persisted record type with a static descriptor.
pub trait Entity: Send + Sync + 'static {
    const TABLE: &'static str;

    fn descriptor() -> &'static EntityDescriptor;
}

/// Untyped, qualified column reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnRef {
    pub table: &'static str,
    pub column: &'static str,
}

impl ColumnRef {
    pub const fn new(table: &'static str, column: &'static str) -> Self {
        Self { table, column }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Column of entity `E`; field names are checked by the compiler through the
/// constants the catalog declares.
pub struct Column<E> {
    name: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Column").field(&self.name).finish()
    }
}

impl<E> Column<E> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _entity: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<E: Entity> Column<E> {
    pub const fn to_ref(self) -> ColumnRef {
        ColumnRef::new(E::TABLE, self.name)
    }
}

impl<E: Entity> From<Column<E>> for ColumnRef {
    fn from(column: Column<E>) -> Self {
        column.to_ref()
    }
}

/// Typed relationship from `F` to `T`.
pub struct Relation<F, T> {
    def: RelationDef,
    _entities: PhantomData<fn() -> (F, T)>,
}

impl<F, T> Clone for Relation<F, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F, T> Copy for Relation<F, T> {}

impl<F, T> fmt::Debug for Relation<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Relation").field(&self.def.name).finish()
    }
}

impl<F, T> Relation<F, T> {
    pub const fn new(def: RelationDef) -> Self {
        Self {
            def,
            _entities: PhantomData,
        }
    }

    pub const fn def(&self) -> RelationDef {
        self.def
    }

    pub const fn name(&self) -> &'static str {
        self.def.name
    }
}

/// Anything that names a record field.
pub trait FieldName {
    fn field_name(&self) -> &str;
}

impl FieldName for &str {
    fn field_name(&self) -> &str {
        self
    }
}

impl FieldName for String {
    fn field_name(&self) -> &str {
        self
    }
}

impl<E> FieldName for Column<E> {
    fn field_name(&self) -> &str {
        self.name
    }
}

/// Explicit field→value mapping for entity `E`.
///
/// Setting the same column twice keeps the last value. Fields that are never set take
/// their schema default on insert and stay untouched on update.
pub struct Values<E> {
    entries: Vec<(&'static str, Value)>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Values<E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Values<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<E> Default for Values<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Values<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: Column<E>, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column.name()) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.name(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column<E>, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (Column::new(*name), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(&'static str, Value)> {
        self.entries
    }
}

/// Name → descriptor lookup for every registered entity.
///
/// Construction validates the invariant that each table is registered exactly once and
/// that every foreign key and relationship points at a registered table and column.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<&'static str, &'static EntityDescriptor>,
}

impl SchemaRegistry {
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = &'static EntityDescriptor>,
    ) -> CoreResult<Self> {
        let mut entities = BTreeMap::new();
        for descriptor in descriptors {
            if entities.insert(descriptor.table, descriptor).is_some() {
                return Err(CoreError::DuplicateEntity(descriptor.table));
            }
        }

        let registry = Self { entities };
        registry.validate_references()?;
        Ok(registry)
    }

    fn validate_references(&self) -> CoreResult<()> {
        for descriptor in self.entities.values() {
            for key in descriptor.primary_key {
                if !descriptor.has_column(key) {
                    return Err(CoreError::unknown_reference(format!(
                        "primary key column {}.{key}",
                        descriptor.table
                    )));
                }
            }
            for column in descriptor.columns {
                if let Some(fk) = column.references {
                    self.require_column(fk.table, fk.column)?;
                }
            }
            for relation in descriptor.relationships {
                self.require_column(descriptor.table, relation.local)?;
                self.require_column(relation.target, relation.remote)?;
            }
        }
        Ok(())
    }

    fn require_column(&self, table: &str, column: &str) -> CoreResult<()> {
        let descriptor = self
            .get(table)
            .ok_or_else(|| CoreError::unknown_reference(format!("table {table}")))?;
        if descriptor.has_column(column) {
            Ok(())
        } else {
            Err(CoreError::unknown_reference(format!("column {table}.{column}")))
        }
    }

    pub fn get(&self, table: &str) -> Option<&'static EntityDescriptor> {
        self.entities.get(table).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.keys().copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        self.entities.values().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PARENTS: EntityDescriptor = EntityDescriptor {
        table: "parents",
        primary_key: &["id"],
        columns: &[
            ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("note", ColumnType::Text).nullable(),
        ],
        unique: &[&["name"]],
        relationships: &[RelationDef::many("children", "children", "id", "parent_id")],
    };

    static CHILDREN: EntityDescriptor = EntityDescriptor {
        table: "children",
        primary_key: &["id"],
        columns: &[
            ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
            ColumnDef::new("parent_id", ColumnType::BigInt).references("parents", "id"),
        ],
        unique: &[],
        relationships: &[],
    };

    static BROKEN: EntityDescriptor = EntityDescriptor {
        table: "broken",
        primary_key: &["id"],
        columns: &[ColumnDef::new("id", ColumnType::BigInt).references("missing", "id")],
        unique: &[],
        relationships: &[],
    };

    #[test]
    fn required_columns_exclude_defaults_and_nullables() {
        let required: Vec<_> = PARENTS.required_columns().map(|c| c.name).collect();
        assert_eq!(required, vec!["name"]);
    }

    #[test]
    fn unique_sets_start_with_primary_key() {
        let sets: Vec<_> = PARENTS.unique_sets().collect();
        assert_eq!(sets, vec![&["id"][..], &["name"][..]]);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let err = SchemaRegistry::from_descriptors([&PARENTS, &CHILDREN, &PARENTS]).unwrap_err();
        assert_eq!(err, CoreError::DuplicateEntity("parents"));
    }

    #[test]
    fn registry_rejects_dangling_foreign_keys() {
        let err = SchemaRegistry::from_descriptors([&BROKEN]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownReference(_)));
    }

    #[test]
    fn registry_resolves_by_table_name() {
        let registry = SchemaRegistry::from_descriptors([&PARENTS, &CHILDREN]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("children").map(|d| d.table), Some("children"));
        assert!(registry.get("nope").is_none());
    }
}
