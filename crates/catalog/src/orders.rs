//! Orders and their lines.

use core::fmt;
use core::str::FromStr;

use marketplace_core::{
    Column, ColumnDef, ColumnType, DefaultValue, Entity, EntityDescriptor, Relation, RelationDef,
    Value,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounts::Users;
use crate::products::VariationCounts;

/// A buyer's order. An order stays a cart until it is checked out.
pub struct Orders;

impl Orders {
    pub const ID: Column<Orders> = Column::new("id");
    pub const USER_ID: Column<Orders> = Column::new("user_id");
    pub const IS_CART: Column<Orders> = Column::new("is_cart");
    pub const CREATED_AT: Column<Orders> = Column::new("created_at");

    pub const USER: Relation<Orders, Users> = Relation::new(ORDER_USER);
    pub const LINES: Relation<Orders, OrderLines> = Relation::new(ORDER_LINES_REL);
}

const ORDER_USER: RelationDef = RelationDef::one("user", Users::TABLE, "user_id", "id");
const ORDER_LINES_REL: RelationDef =
    RelationDef::many("lines", OrderLines::TABLE, "id", "order_id");

static ORDERS: EntityDescriptor = EntityDescriptor {
    table: Orders::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("user_id", ColumnType::BigInt).references(Users::TABLE, "id"),
        ColumnDef::new("is_cart", ColumnType::Bool).default(DefaultValue::Bool(true)),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[],
    relationships: &[ORDER_USER, ORDER_LINES_REL],
};

impl Entity for Orders {
    const TABLE: &'static str = "orders";

    fn descriptor() -> &'static EntityDescriptor {
        &ORDERS
    }
}

/// One variation combination within an order.
pub struct OrderLines;

impl OrderLines {
    pub const ID: Column<OrderLines> = Column::new("id");
    pub const ORDER_ID: Column<OrderLines> = Column::new("order_id");
    pub const VARIATION_COUNT_ID: Column<OrderLines> = Column::new("variation_count_id");
    pub const AMOUNT: Column<OrderLines> = Column::new("amount");
    pub const STATUS: Column<OrderLines> = Column::new("status");
    pub const CREATED_AT: Column<OrderLines> = Column::new("created_at");

    pub const ORDER: Relation<OrderLines, Orders> = Relation::new(LINE_ORDER);
    pub const VARIATION_COUNT: Relation<OrderLines, VariationCounts> = Relation::new(LINE_COUNT);
}

const LINE_ORDER: RelationDef = RelationDef::one("order", Orders::TABLE, "order_id", "id");
const LINE_COUNT: RelationDef = RelationDef::one(
    "variation_count",
    VariationCounts::TABLE,
    "variation_count_id",
    "id",
);

static ORDER_LINES: EntityDescriptor = EntityDescriptor {
    table: OrderLines::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("order_id", ColumnType::BigInt).references(Orders::TABLE, "id"),
        ColumnDef::new("variation_count_id", ColumnType::BigInt)
            .references(VariationCounts::TABLE, "id"),
        ColumnDef::new("amount", ColumnType::BigInt),
        ColumnDef::new("status", ColumnType::Text)
            .default(DefaultValue::Text(OrderStatus::Opened.as_str())),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[],
    relationships: &[LINE_ORDER, LINE_COUNT],
};

impl Entity for OrderLines {
    const TABLE: &'static str = "order_lines";

    fn descriptor() -> &'static EntityDescriptor {
        &ORDER_LINES
    }
}

/// Lifecycle status of an order line, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Opened,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Opened => "opened",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(OrderStatus::Opened),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl From<OrderStatus> for Value {
    fn from(status: OrderStatus) -> Self {
        Value::Text(status.as_str().to_string())
    }
}
