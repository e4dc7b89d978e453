//! Typed Accessor Registry.
//!
//! One [`Operations`] value per catalog entity, built once at startup and passed
//! explicitly (usually behind an `Arc`). Accessors are stateless; the session is always
//! supplied per call.

use marketplace_catalog::{
    Categories, Companies, CompanyImages, Favorites, OrderLines, Orders, ProductPrices,
    Products, Reviews, Suppliers, Users, VariationCounts, VariationValues,
};
use marketplace_core::SchemaRegistry;

use crate::error::DataError;
use crate::ops::Operations;

#[derive(Debug, Clone)]
pub struct Accessors {
    pub users: Operations<Users>,
    pub suppliers: Operations<Suppliers>,
    pub companies: Operations<Companies>,
    pub company_images: Operations<CompanyImages>,
    pub categories: Operations<Categories>,
    pub products: Operations<Products>,
    pub products_prices: Operations<ProductPrices>,
    pub variation_values: Operations<VariationValues>,
    pub variation_counts: Operations<VariationCounts>,
    pub orders: Operations<Orders>,
    pub order_lines: Operations<OrderLines>,
    pub reviews: Operations<Reviews>,
    pub favorites: Operations<Favorites>,
    schema: SchemaRegistry,
}

impl Accessors {
    /// Validate the catalog and bind every entity.
    pub fn new() -> Result<Self, DataError> {
        let schema = marketplace_catalog::schema()?;
        tracing::debug!(entities = schema.len(), "accessor registry ready");
        Ok(Self {
            users: Operations::new(),
            suppliers: Operations::new(),
            companies: Operations::new(),
            company_images: Operations::new(),
            categories: Operations::new(),
            products: Operations::new(),
            products_prices: Operations::new(),
            variation_values: Operations::new(),
            variation_counts: Operations::new(),
            orders: Operations::new(),
            order_lines: Operations::new(),
            reviews: Operations::new(),
            favorites: Operations::new(),
            schema,
        })
    }

    /// Name → descriptor lookup of every bound entity.
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_the_catalog() {
        let accessors = Accessors::new().unwrap();
        let names: Vec<_> = accessors.schema().names().collect();
        assert_eq!(names.len(), 13);
        for table in ["users", "products_prices", "variation_counts", "favorites"] {
            assert!(names.contains(&table), "{table} missing");
        }
        assert_eq!(format!("{:?}", accessors.orders), "Operations<orders>");
    }
}
