//! Shared fixtures for the in-memory integration suites.

#![allow(dead_code)]

use marketplace_catalog::{
    OrderLines, OrderStatus, Orders, Products, Suppliers, Users, VariationCounts, VariationValues,
};
use marketplace_core::{
    FromValue, OrderId, ProductId, SupplierId, UserId, VariationCountId, VariationValueId, Values,
};
use marketplace_infra::{Accessors, DataError, Database, Record, Session};

pub struct Harness {
    pub db: Database,
    pub api: Accessors,
}

/// In-memory database over the full catalog plus the accessor registry.
pub fn setup() -> Harness {
    marketplace_observability::init();
    let api = Accessors::new().expect("catalog validates");
    let db = Database::in_memory(api.schema());
    Harness { db, api }
}

pub fn id<T: FromValue>(record: &Record) -> T {
    record.get("id").expect("record carries an id")
}

pub async fn user(session: &mut Session, api: &Accessors, email: &str) -> Result<UserId, DataError> {
    let record = api
        .users
        .insert
        .one(session, Values::<Users>::new().set(Users::EMAIL, email))
        .await?;
    Ok(id(&record))
}

pub async fn supplier(
    session: &mut Session,
    api: &Accessors,
    owner: UserId,
) -> Result<SupplierId, DataError> {
    let record = api
        .suppliers
        .insert
        .one(session, Values::<Suppliers>::new().set(Suppliers::USER_ID, owner))
        .await?;
    Ok(id(&record))
}

pub async fn product(
    session: &mut Session,
    api: &Accessors,
    supplier: SupplierId,
    name: &str,
) -> Result<ProductId, DataError> {
    let record = api
        .products
        .insert
        .one(
            session,
            Values::<Products>::new()
                .set(Products::SUPPLIER_ID, supplier)
                .set(Products::NAME, name),
        )
        .await?;
    Ok(id(&record))
}

pub async fn variation(
    session: &mut Session,
    api: &Accessors,
    product: ProductId,
    name: &str,
    value: &str,
) -> Result<VariationValueId, DataError> {
    let record = api
        .variation_values
        .insert
        .one(
            session,
            Values::<VariationValues>::new()
                .set(VariationValues::PRODUCT_ID, product)
                .set(VariationValues::NAME, name)
                .set(VariationValues::VALUE, value),
        )
        .await?;
    Ok(id(&record))
}

pub async fn combination(
    session: &mut Session,
    api: &Accessors,
    first: VariationValueId,
    second: Option<VariationValueId>,
    count: i64,
) -> Result<VariationCountId, DataError> {
    let record = api
        .variation_counts
        .insert
        .one(
            session,
            Values::<VariationCounts>::new()
                .set(VariationCounts::VARIATION_VALUE_1_ID, first)
                .set(VariationCounts::VARIATION_VALUE_2_ID, second)
                .set(VariationCounts::COUNT, count),
        )
        .await?;
    Ok(id(&record))
}

pub async fn order(session: &mut Session, api: &Accessors, buyer: UserId) -> Result<OrderId, DataError> {
    let record = api
        .orders
        .insert
        .one(session, Values::<Orders>::new().set(Orders::USER_ID, buyer))
        .await?;
    Ok(id(&record))
}

pub async fn order_line(
    session: &mut Session,
    api: &Accessors,
    order: OrderId,
    combination: VariationCountId,
    status: OrderStatus,
) -> Result<i64, DataError> {
    let record = api
        .order_lines
        .insert
        .one(
            session,
            Values::<OrderLines>::new()
                .set(OrderLines::ORDER_ID, order)
                .set(OrderLines::VARIATION_COUNT_ID, combination)
                .set(OrderLines::AMOUNT, 1)
                .set(OrderLines::STATUS, status),
        )
        .await?;
    Ok(id(&record))
}

/// A small shop: one seller, a buyer, a t-shirt in two colours and sizes, and a mug.
pub struct Shop {
    pub buyer: UserId,
    pub seller: UserId,
    pub supplier: SupplierId,
    pub shirt: ProductId,
    pub mug: ProductId,
    pub red: VariationValueId,
    pub blue: VariationValueId,
    pub large: VariationValueId,
    pub white: VariationValueId,
    pub red_large: VariationCountId,
    pub blue_large: VariationCountId,
    pub white_mug: VariationCountId,
}

pub async fn shop(session: &mut Session, api: &Accessors) -> Result<Shop, DataError> {
    let buyer = user(session, api, "buyer@example.com").await?;
    let seller = user(session, api, "seller@example.com").await?;
    let supplier = supplier(session, api, seller).await?;
    let shirt = product(session, api, supplier, "Shirt").await?;
    let mug = product(session, api, supplier, "Mug").await?;

    let red = variation(session, api, shirt, "colour", "red").await?;
    let blue = variation(session, api, shirt, "colour", "blue").await?;
    let large = variation(session, api, shirt, "size", "L").await?;
    let white = variation(session, api, mug, "colour", "white").await?;

    let red_large = combination(session, api, red, Some(large), 5).await?;
    let blue_large = combination(session, api, blue, Some(large), 0).await?;
    let white_mug = combination(session, api, white, None, 3).await?;

    Ok(Shop {
        buyer,
        seller,
        supplier,
        shirt,
        mug,
        red,
        blue,
        large,
        white,
        red_large,
        blue_large,
        white_mug,
    })
}
