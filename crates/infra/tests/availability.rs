//! Review eligibility and stock lookups over the order → variation chain.

mod common;

use common::{combination, order, order_line, setup, shop, user, variation};
use marketplace_catalog::{OrderStatus, VariationCounts};
use marketplace_core::VariationCountId;
use marketplace_infra::availability::{AvailabilityCheck, SlotMatch, available_variations, can_review_product};

#[tokio::test]
async fn completed_line_grants_review() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let order = order(&mut session, &h.api, shop.buyer).await.unwrap();
    order_line(&mut session, &h.api, order, shop.red_large, OrderStatus::Completed)
        .await
        .unwrap();

    assert!(can_review_product(&mut session, shop.buyer, shop.shirt).await.unwrap());
    assert!(!can_review_product(&mut session, shop.buyer, shop.mug).await.unwrap());
    assert!(!can_review_product(&mut session, shop.seller, shop.shirt).await.unwrap());
}

#[tokio::test]
async fn only_the_qualifying_status_counts() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let order = order(&mut session, &h.api, shop.buyer).await.unwrap();
    order_line(&mut session, &h.api, order, shop.red_large, OrderStatus::Paid)
        .await
        .unwrap();

    assert!(!can_review_product(&mut session, shop.buyer, shop.shirt).await.unwrap());

    let paid = AvailabilityCheck::new().with_status(OrderStatus::Paid);
    assert!(paid.check(&mut session, shop.buyer, shop.shirt).await.unwrap());
}

#[tokio::test]
async fn no_orders_means_no_review() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let stranger = user(&mut session, &h.api, "stranger@example.com").await.unwrap();

    assert!(!can_review_product(&mut session, stranger, shop.shirt).await.unwrap());
}

#[tokio::test]
async fn match_through_the_second_slot() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    // Bundle whose first slot belongs to the mug and second to the shirt.
    let bundle = combination(&mut session, &h.api, shop.white, Some(shop.red), 1)
        .await
        .unwrap();
    let order = order(&mut session, &h.api, shop.buyer).await.unwrap();
    order_line(&mut session, &h.api, order, bundle, OrderStatus::Completed)
        .await
        .unwrap();

    assert!(can_review_product(&mut session, shop.buyer, shop.shirt).await.unwrap());
    assert!(can_review_product(&mut session, shop.buyer, shop.mug).await.unwrap());

    let first_slot_only = AvailabilityCheck::new()
        .with_slots(SlotMatch::new([VariationCounts::VARIATION_VALUE_1_ID]));
    assert!(!first_slot_only.check(&mut session, shop.buyer, shop.shirt).await.unwrap());
    assert!(first_slot_only.check(&mut session, shop.buyer, shop.mug).await.unwrap());
}

#[tokio::test]
async fn stocked_variations_are_listed_once() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let small = variation(&mut session, &h.api, shop.shirt, "size", "S").await.unwrap();
    let red_small = combination(&mut session, &h.api, shop.red, Some(small), 2)
        .await
        .unwrap();

    let stocked: Vec<VariationCountId> = available_variations(&mut session, shop.shirt)
        .await
        .unwrap()
        .iter()
        .map(|r| r.get("id").unwrap())
        .collect();
    // red/L matches through both slots but appears once; blue/L is out of stock.
    assert_eq!(stocked, [shop.red_large, red_small]);

    let mugs = available_variations(&mut session, shop.mug).await.unwrap();
    assert_eq!(mugs.len(), 1);
    assert_eq!(mugs[0].get::<i64>(VariationCounts::COUNT).unwrap(), 3);
    assert!(!stocked.contains(&shop.blue_large));
}
