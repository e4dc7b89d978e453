//! Quantity-tiered product prices.
//!
//! A product carries several price rows, each valid from `min_quantity` units upward
//! within a date window. The applicable tier for an order quantity is the active row with
//! the largest `min_quantity` not above it.

use chrono::{DateTime, Utc};
use marketplace_catalog::ProductPrices;
use marketplace_core::ProductId;

use crate::error::DataError;
use crate::ops::Get;
use crate::query::Select;
use crate::record::Record;
use crate::session::Session;

pub fn active_price_query(
    product: ProductId,
    quantity: i64,
    now: DateTime<Utc>,
) -> Select<ProductPrices> {
    Select::<ProductPrices>::new()
        .filter(ProductPrices::PRODUCT_ID.eq(product))
        .filter(ProductPrices::MIN_QUANTITY.le(quantity))
        .filter(ProductPrices::START_DATE.le(now))
        .filter(
            ProductPrices::END_DATE
                .is_null()
                .or(ProductPrices::END_DATE.gt(now)),
        )
        .order_by([ProductPrices::MIN_QUANTITY.desc()])
        .limit(1)
}

/// Price tier that applies to `quantity` units of `product` right now.
pub async fn active_price(
    session: &mut Session,
    product: ProductId,
    quantity: i64,
) -> Result<Option<Record>, DataError> {
    Get::<ProductPrices>::new()
        .one(session, active_price_query(product, quantity, Utc::now()))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;
    use crate::store::Statement;

    #[test]
    fn tier_query_orders_by_threshold_descending() {
        let plan = active_price_query(ProductId::new(5), 12, Utc::now())
            .build()
            .unwrap();
        let rendered = sql::render(Statement::Select(&plan));
        assert!(rendered.sql.contains(
            "((\"products_prices\".\"end_date\" IS NULL OR \"products_prices\".\"end_date\" > $4))"
        ));
        assert!(rendered
            .sql
            .ends_with("ORDER BY \"products_prices\".\"min_quantity\" DESC LIMIT $5"));
    }
}
