//! Shaped results.
//!
//! Stores return flat rows; a [`Record`] is one primary entity (or projection) with its
//! eagerly loaded relations nested underneath. Unique shaping collapses the fan-out of
//! to-many joins by primary key, merging nested collections recursively.

use std::collections::BTreeMap;

use marketplace_core::{Cardinality, FieldName, FromValue, Relation, Value, ValueKey};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::DataError;
use crate::query::{Layout, Node};
use crate::store::Row;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entity: Option<&'static str>,
    values: BTreeMap<String, Value>,
    related: BTreeMap<&'static str, Related>,
}

/// Records loaded through one relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Record {
    /// Table of the entity this record holds, `None` for pure projections.
    pub fn entity(&self) -> Option<&'static str> {
        self.entity
    }

    pub fn value(&self, field: impl FieldName) -> Option<&Value> {
        self.values.get(field.field_name())
    }

    pub fn get<T: FromValue>(&self, field: impl FieldName) -> Result<T, DataError> {
        let name = field.field_name();
        let value = self
            .values
            .get(name)
            .ok_or_else(|| DataError::Decode(format!("record has no field `{name}`")))?;
        T::from_value(value).map_err(|e| DataError::Decode(format!("field `{name}`: {e}")))
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    /// The record loaded through a to-one relation; `None` when it was not loaded or
    /// nothing matched.
    pub fn one<F, T>(&self, relation: Relation<F, T>) -> Option<&Record> {
        match self.related.get(relation.name()) {
            Some(Related::One(record)) => record.as_deref(),
            Some(Related::Many(records)) => records.first(),
            None => None,
        }
    }

    pub fn many<F, T>(&self, relation: Relation<F, T>) -> &[Record] {
        match self.related.get(relation.name()) {
            Some(Related::Many(records)) => records,
            Some(Related::One(Some(record))) => core::slice::from_ref(&**record),
            Some(Related::One(None)) | None => &[],
        }
    }

    /// Untagged JSON object with relations nested under their names.
    pub fn to_json(&self) -> JsonValue {
        let mut object: Map<String, JsonValue> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        for (name, related) in &self.related {
            let value = match related {
                Related::One(Some(record)) => record.to_json(),
                Related::One(None) => JsonValue::Null,
                Related::Many(records) => records.iter().map(Record::to_json).collect(),
            };
            object.insert((*name).to_string(), value);
        }
        JsonValue::Object(object)
    }

    /// Deserialize into a caller-defined row type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DataError> {
        serde_json::from_value(self.to_json()).map_err(|e| DataError::Decode(e.to_string()))
    }

    fn identity(&self, node: &Node) -> Vec<ValueKey> {
        if node.key.is_empty() {
            return self.values.values().map(Value::key).collect();
        }
        node.key
            .iter()
            .map(|k| self.values.get(k).map_or(ValueKey::Null, Value::key))
            .collect()
    }

    fn absorb(&mut self, other: Record, node: &Node) {
        let mut incoming = other.related;
        for child in &node.children {
            let Some(theirs) = incoming.remove(child.name) else {
                continue;
            };
            let Some(ours) = self.related.get_mut(child.name) else {
                self.related.insert(child.name, theirs);
                continue;
            };
            match (ours, theirs) {
                (Related::Many(ours), Related::Many(theirs)) => {
                    for record in theirs {
                        merge(ours, record, &child.node);
                    }
                }
                (Related::One(ours), Related::One(Some(theirs))) => match ours.as_deref_mut() {
                    Some(existing) => existing.absorb(*theirs, &child.node),
                    None => *ours = Some(theirs),
                },
                _ => {}
            }
        }
    }
}

fn merge(records: &mut Vec<Record>, record: Record, node: &Node) {
    let identity = record.identity(node);
    match records.iter_mut().find(|r| r.identity(node) == identity) {
        Some(existing) => existing.absorb(record, node),
        None => records.push(record),
    }
}

fn build(node: &Node, row: &Row) -> Record {
    let values = node
        .fields
        .iter()
        .map(|(name, index)| (name.clone(), row.get(*index).cloned().unwrap_or(Value::Null)))
        .collect();
    let related = node
        .children
        .iter()
        .map(|child| {
            let record = Some(build(&child.node, row)).filter(|r| r.is_present(&child.node));
            let related = match child.cardinality {
                Cardinality::One => Related::One(record.map(Box::new)),
                Cardinality::Many => Related::Many(record.into_iter().collect()),
            };
            (child.name, related)
        })
        .collect();
    Record {
        entity: node.entity,
        values,
        related,
    }
}

impl Record {
    /// A left join that matched nothing yields an all-null key.
    fn is_present(&self, node: &Node) -> bool {
        self.identity(node).iter().any(|k| *k != ValueKey::Null)
    }
}

/// One record per row, in row order.
pub(crate) fn shape(layout: &Layout, rows: &[Row]) -> Vec<Record> {
    rows.iter().map(|row| build(layout.root(), row)).collect()
}

/// Rows collapsed by primary key, first-seen order.
pub(crate) fn shape_unique(layout: &Layout, rows: &[Row]) -> Vec<Record> {
    let mut records = Vec::new();
    for row in rows {
        merge(&mut records, build(layout.root(), row), layout.root());
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Eager, Projection, Select};
    use marketplace_catalog::{Companies, CompanyImages, Suppliers, Users};
    use marketplace_core::{Entity, UserId};

    fn eager_layout() -> Layout {
        Select::<Suppliers>::new()
            .eager(Eager::new(Suppliers::COMPANY).then(Companies::IMAGES))
            .build()
            .unwrap()
            .layout()
            .clone()
    }

    fn row(supplier: i64, company: Option<i64>, image: Option<(i64, &str)>) -> Row {
        let mut row = vec![
            Value::Int(supplier),
            Value::Int(supplier * 10),
            Value::Null,
            Value::Null,
        ];
        assert_eq!(row.len(), Suppliers::descriptor().columns.len());
        match company {
            Some(id) => row.extend([
                Value::Int(id),
                Value::Int(supplier),
                Value::from("Acme"),
                Value::from("biz@acme.io"),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ]),
            None => row.extend(vec![Value::Null; 8]),
        }
        assert_eq!(
            row.len(),
            Suppliers::descriptor().columns.len() + Companies::descriptor().columns.len()
        );
        match image {
            Some((id, url)) => row.extend([
                Value::Int(id),
                Value::Int(company.unwrap_or_default()),
                Value::from(url),
                Value::Int(0),
            ]),
            None => row.extend(vec![Value::Null; CompanyImages::descriptor().columns.len()]),
        }
        row
    }

    #[test]
    fn fan_out_rows_merge_by_primary_key() {
        let layout = eager_layout();
        let rows = vec![
            row(1, Some(7), Some((100, "a.png"))),
            row(1, Some(7), Some((101, "b.png"))),
            row(2, None, None),
        ];

        let flat = shape(&layout, &rows);
        assert_eq!(flat.len(), 3);

        let unique = shape_unique(&layout, &rows);
        assert_eq!(unique.len(), 2);

        let company = unique[0].one(Suppliers::COMPANY).unwrap();
        let urls: Vec<String> = company
            .many(Companies::IMAGES)
            .iter()
            .map(|r| r.get(CompanyImages::URL).unwrap())
            .collect();
        assert_eq!(urls, vec!["a.png", "b.png"]);

        assert!(unique[1].one(Suppliers::COMPANY).is_none());
        assert!(unique[1].related("company").is_some());
    }

    #[test]
    fn projections_without_keys_merge_on_every_field() {
        let layout = Select::<Users>::project([Projection::column(Users::EMAIL)])
            .build()
            .unwrap()
            .layout()
            .clone();
        let rows = vec![
            vec![Value::from("a@x.io")],
            vec![Value::from("a@x.io")],
            vec![Value::from("b@x.io")],
        ];
        assert_eq!(shape_unique(&layout, &rows).len(), 2);
        assert_eq!(shape(&layout, &rows)[0].entity(), None);
    }

    #[test]
    fn typed_access_and_json_decoding() {
        #[derive(serde::Deserialize)]
        struct Contact {
            id: i64,
            email: String,
            first_name: Option<String>,
        }

        let layout = Select::<Users>::project([
            Projection::column(Users::ID),
            Projection::column(Users::EMAIL),
            Projection::column(Users::FIRST_NAME),
        ])
        .build()
        .unwrap()
        .layout()
        .clone();
        let record = &shape(
            &layout,
            &[vec![Value::Int(3), Value::from("ada@x.io"), Value::Null]],
        )[0];

        assert_eq!(record.get::<UserId>(Users::ID).unwrap(), UserId::new(3));
        assert!(matches!(
            record.get::<String>(Users::LAST_NAME),
            Err(DataError::Decode(_))
        ));
        let contact: Contact = record.decode().unwrap();
        assert_eq!((contact.id, contact.email.as_str()), (3, "ada@x.io"));
        assert_eq!(contact.first_name, None);
    }
}
