//! Composite availability checks across the order → stock → variation chain.
//!
//! A buyer may review a product once a qualifying order line exists for a variation
//! combination of that product. A combination references its variation values through
//! positional slot columns, so "references this value" means "any slot equals it".

use marketplace_catalog::{OrderLines, OrderStatus, Orders, VariationCounts, VariationValues};
use marketplace_core::{ColumnRef, Operand, Predicate, ProductId, UserId};
use tracing::instrument;

use crate::error::DataError;
use crate::ops::Get;
use crate::query::{Projection, Select, any_slot_matches};
use crate::record::Record;
use crate::session::Session;
use crate::store::Statement;

/// Disjunctive match over N positional slot columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMatch {
    slots: Vec<ColumnRef>,
}

impl SlotMatch {
    pub fn new<C: Into<ColumnRef>>(slots: impl IntoIterator<Item = C>) -> Self {
        Self {
            slots: slots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn slots(&self) -> &[ColumnRef] {
        &self.slots
    }

    /// `target` equals at least one slot. No slots never matches.
    pub fn matching(&self, target: impl Into<Operand>) -> Predicate {
        any_slot_matches(self.slots.iter().copied(), target)
    }
}

impl Default for SlotMatch {
    fn default() -> Self {
        Self::new(VariationCounts::SLOTS)
    }
}

/// Existence check: actor's order → line with the qualifying status → variation
/// combination → variation value of the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityCheck {
    status: OrderStatus,
    slots: SlotMatch,
}

impl Default for AvailabilityCheck {
    fn default() -> Self {
        Self {
            status: OrderStatus::Completed,
            slots: SlotMatch::default(),
        }
    }
}

impl AvailabilityCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_slots(mut self, slots: SlotMatch) -> Self {
        self.slots = slots;
        self
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn query(&self, actor: UserId, product: ProductId) -> Select<Orders> {
        Select::<Orders>::project([Projection::column(Orders::ID)])
            .join::<OrderLines>(OrderLines::ORDER_ID.eq_col(Orders::ID))
            .join::<VariationCounts>(VariationCounts::ID.eq_col(OrderLines::VARIATION_COUNT_ID))
            .join::<VariationValues>(self.slots.matching(VariationValues::ID))
            .filter(Orders::USER_ID.eq(actor))
            .filter(OrderLines::STATUS.eq(self.status))
            .filter(VariationValues::PRODUCT_ID.eq(product))
            .limit(1)
    }

    #[instrument(skip(self, session), fields(actor = %actor, product = %product, status = %self.status), err)]
    pub async fn check(
        &self,
        session: &mut Session,
        actor: UserId,
        product: ProductId,
    ) -> Result<bool, DataError> {
        let plan = self.query(actor, product).build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        Ok(!rows.is_empty())
    }
}

/// Whether `actor` has a completed order line for any variation of `product`.
pub async fn can_review_product(
    session: &mut Session,
    actor: UserId,
    product: ProductId,
) -> Result<bool, DataError> {
    AvailabilityCheck::new().check(session, actor, product).await
}

/// Variation combinations of `product` with stock on hand, by id.
pub fn available_variations_query(product: ProductId) -> Select<VariationCounts> {
    Select::<VariationCounts>::new()
        .join::<VariationValues>(SlotMatch::default().matching(VariationValues::ID))
        .filter(VariationValues::PRODUCT_ID.eq(product))
        .filter(VariationCounts::COUNT.gt(0))
        .order_by([VariationCounts::ID.asc()])
}

/// A combination whose two slots both belong to the product matches twice; rows are
/// collapsed so each combination appears once.
pub async fn available_variations(
    session: &mut Session,
    product: ProductId,
) -> Result<Vec<Record>, DataError> {
    Get::<VariationCounts>::new()
        .many_unique(session, available_variations_query(product))
        .await
}
