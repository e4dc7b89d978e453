//! `marketplace-catalog` — the marketplace's persisted record types.
//!
//! Each entity is a unit struct carrying typed [`Column`](marketplace_core::Column) and
//! [`Relation`](marketplace_core::Relation) constants plus a `'static` descriptor. Nothing
//! here talks to a store.

pub mod accounts;
pub mod orders;
pub mod products;

use marketplace_core::{CoreResult, Entity, EntityDescriptor, SchemaRegistry};

pub use accounts::{Companies, CompanyImages, Suppliers, Users};
pub use orders::{OrderLines, OrderStatus, Orders, UnknownStatus};
pub use products::{
    Categories, Favorites, ProductPrices, Products, Reviews, VariationCounts, VariationValues,
};

/// Every catalog descriptor, parents before children.
pub fn descriptors() -> [&'static EntityDescriptor; 13] {
    [
        Users::descriptor(),
        Suppliers::descriptor(),
        Companies::descriptor(),
        CompanyImages::descriptor(),
        Categories::descriptor(),
        Products::descriptor(),
        ProductPrices::descriptor(),
        VariationValues::descriptor(),
        VariationCounts::descriptor(),
        Orders::descriptor(),
        OrderLines::descriptor(),
        Reviews::descriptor(),
        Favorites::descriptor(),
    ]
}

/// Validated name → descriptor lookup over the whole catalog.
pub fn schema() -> CoreResult<SchemaRegistry> {
    SchemaRegistry::from_descriptors(descriptors())
}
