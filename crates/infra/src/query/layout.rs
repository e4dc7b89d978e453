//! Output layout of an executable plan.
//!
//! A layout lists the values every returned row carries (in order) and describes how
//! those positions nest into [`Record`](crate::record::Record)s: which slots belong to
//! the primary entity, which to eagerly loaded relations, and which primary-key fields
//! identify a record when fan-out rows are collapsed.

use marketplace_core::{Aggregate, Cardinality, ColumnRef, ColumnType, EntityDescriptor};

/// Expression producing one output position.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotExpr {
    Column(ColumnRef),
    Aggregate(Aggregate),
}

/// One output position and the storage type it decodes as.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub expr: SlotExpr,
    pub ty: ColumnType,
}

#[derive(Debug, Clone)]
pub struct Layout {
    slots: Vec<Slot>,
    root: Node,
}

impl Layout {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot_types(&self) -> Vec<ColumnType> {
        self.slots.iter().map(|s| s.ty).collect()
    }

    pub(crate) fn root(&self) -> &Node {
        &self.root
    }

    /// Number of distinct relations loaded alongside the primary record.
    pub fn relation_count(&self) -> usize {
        self.root.descendants()
    }
}

/// A record-shaped group of slots.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) table: &'static str,
    pub(crate) entity: Option<&'static str>,
    /// Field name → slot index.
    pub(crate) fields: Vec<(String, usize)>,
    /// Fields identifying a record; empty means every field does.
    pub(crate) key: Vec<String>,
    pub(crate) children: Vec<Child>,
}

#[derive(Debug, Clone)]
pub(crate) struct Child {
    pub(crate) name: &'static str,
    pub(crate) cardinality: Cardinality,
    pub(crate) node: Node,
}

impl Node {
    fn empty(table: &'static str) -> Self {
        Self {
            table,
            entity: None,
            fields: Vec::new(),
            key: Vec::new(),
            children: Vec::new(),
        }
    }

    fn descendants(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.node.descendants())
            .sum()
    }

    fn find_mut(&mut self, table: &str) -> Option<&mut Node> {
        if self.table == table {
            return Some(self);
        }
        for child in &mut self.children {
            if let Some(found) = child.node.find_mut(table) {
                return Some(found);
            }
        }
        None
    }
}

pub(crate) struct LayoutBuilder {
    slots: Vec<Slot>,
    root: Node,
}

impl LayoutBuilder {
    pub(crate) fn new(base: &'static EntityDescriptor) -> Self {
        Self {
            slots: Vec::new(),
            root: Node::empty(base.table),
        }
    }

    /// Project every column of the base entity into the root record.
    pub(crate) fn entity_root(&mut self, base: &'static EntityDescriptor) {
        let node = entity_node(&mut self.slots, base);
        self.root.entity = node.entity;
        self.root.fields.extend(node.fields);
        self.root.key = node.key;
    }

    pub(crate) fn push_column(&mut self, key: String, column: ColumnRef, ty: ColumnType) {
        let index = self.slots.len();
        self.slots.push(Slot {
            expr: SlotExpr::Column(column),
            ty,
        });
        self.root.fields.push((key, index));
    }

    pub(crate) fn push_aggregate(&mut self, key: String, aggregate: Aggregate, ty: ColumnType) {
        let index = self.slots.len();
        self.slots.push(Slot {
            expr: SlotExpr::Aggregate(aggregate),
            ty,
        });
        self.root.fields.push((key, index));
    }

    /// Nest every column of `target` under the record of `parent`.
    pub(crate) fn attach(
        &mut self,
        parent: &'static str,
        name: &'static str,
        cardinality: Cardinality,
        target: &'static EntityDescriptor,
    ) {
        let node = entity_node(&mut self.slots, target);
        let child = Child {
            name,
            cardinality,
            node,
        };
        match self.root.find_mut(parent) {
            Some(parent) => parent.children.push(child),
            None => self.root.children.push(child),
        }
    }

    pub(crate) fn finish(self) -> Layout {
        Layout {
            slots: self.slots,
            root: self.root,
        }
    }
}

fn entity_node(slots: &mut Vec<Slot>, descriptor: &'static EntityDescriptor) -> Node {
    let mut node = Node::empty(descriptor.table);
    node.entity = Some(descriptor.table);
    for column in descriptor.columns {
        node.fields.push((column.name.to_string(), slots.len()));
        slots.push(Slot {
            expr: SlotExpr::Column(ColumnRef::new(descriptor.table, column.name)),
            ty: column.ty,
        });
    }
    node.key = descriptor
        .primary_key
        .iter()
        .map(|k| k.to_string())
        .collect();
    node
}
