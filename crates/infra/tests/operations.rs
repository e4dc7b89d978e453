//! Operation Set against the in-memory store.
//!
//! Verifies:
//! - inserts fill schema defaults and report missing required fields before the store
//! - constraint violations surface as `DataError::Constraint` with the constraint name
//! - reads: first/unique/many/by/count/exists, ordering and pagination, eager loading
//! - updates and deletes honour explicit filters and foreign-key restriction
//! - limit and offset count records when a collection is loaded eagerly
//! - insert/read-back and update laws over generated rows

mod common;

use common::{id, setup, shop};
use marketplace_catalog::{
    Companies, CompanyImages, OrderLines, OrderStatus, ProductPrices, Products, Suppliers, Users,
};
use marketplace_core::{UserId, Value, Values};
use marketplace_infra::query::{Eager, Filter, InsertQuery, OnConflict, Projection, Select, UpdateQuery};
use marketplace_infra::{ConstraintKind, ConstructionError, DataError, Related};
use proptest::prelude::*;

fn user_row(email: &str) -> Values<Users> {
    Values::new().set(Users::EMAIL, email)
}

#[tokio::test]
async fn insert_returns_the_stored_row_with_defaults() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();

    let user = h
        .api
        .users
        .insert
        .one(&mut session, user_row("ada@example.com").set(Users::FIRST_NAME, "Ada"))
        .await
        .unwrap();

    assert_eq!(user.entity(), Some("users"));
    assert_eq!(id::<UserId>(&user), UserId::new(1));
    assert_eq!(user.get::<String>(Users::EMAIL).unwrap(), "ada@example.com");
    assert_eq!(user.get::<Option<String>>(Users::LAST_NAME).unwrap(), None);
    assert!(!user.get::<bool>(Users::IS_VERIFIED).unwrap());
    assert!(matches!(user.value(Users::CREATED_AT), Some(Value::Timestamp(_))));

    let second = h.api.users.insert.one(&mut session, user_row("bob@example.com")).await.unwrap();
    assert_eq!(id::<UserId>(&second), UserId::new(2));
    session.commit().await.unwrap();
}

#[tokio::test]
async fn missing_required_field_never_reaches_the_store() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();

    let err = h
        .api
        .users
        .insert
        .one(&mut session, Values::<Users>::new().set(Users::FIRST_NAME, "Nobody"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DataError::Construction(ConstructionError::MissingRequired {
            table: "users",
            column: "email",
        })
    );
    assert!(!session.is_poisoned());
    assert_eq!(h.api.users.get.count(&mut session, Select::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_unique_key_is_a_constraint_error() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    h.api.users.insert.one(&mut session, user_row("dup@example.com")).await.unwrap();

    let err = h
        .api
        .users
        .insert
        .one(&mut session, user_row("dup@example.com"))
        .await
        .unwrap_err();

    match &err {
        DataError::Constraint { kind, constraint, .. } => {
            assert_eq!(*kind, ConstraintKind::Unique);
            assert_eq!(constraint, "users_email_key");
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
    assert!(!err.is_transient());
    assert!(session.is_poisoned());
}

#[tokio::test]
async fn dangling_reference_is_a_foreign_key_error() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();

    let err = h
        .api
        .suppliers
        .insert
        .one(&mut session, Values::<Suppliers>::new().set(Suppliers::USER_ID, 404))
        .await
        .unwrap_err();

    assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
}

#[tokio::test]
async fn insert_many_returns_rows_in_input_order() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();

    let rows = h
        .api
        .users
        .insert
        .many(
            &mut session,
            vec![user_row("c@example.com"), user_row("a@example.com"), user_row("b@example.com")],
        )
        .await
        .unwrap();

    let emails: Vec<String> = rows.iter().map(|r| r.get(Users::EMAIL).unwrap()).collect();
    assert_eq!(emails, ["c@example.com", "a@example.com", "b@example.com"]);
}

#[tokio::test]
async fn upsert_overwrites_the_conflicting_row() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let tier = |value: i64| {
        Values::<ProductPrices>::new()
            .set(ProductPrices::PRODUCT_ID, shop.shirt)
            .set(ProductPrices::MIN_QUANTITY, 10)
            .set(ProductPrices::VALUE, value)
    };
    let first = h.api.products_prices.insert.one(&mut session, tier(900)).await.unwrap();

    let upserted = h
        .api
        .products_prices
        .insert
        .one(
            &mut session,
            InsertQuery::new([tier(850)]).on_conflict(OnConflict::update([
                ProductPrices::PRODUCT_ID,
                ProductPrices::MIN_QUANTITY,
            ])),
        )
        .await
        .unwrap();

    assert_eq!(id::<i64>(&upserted), id::<i64>(&first));
    assert_eq!(upserted.get::<i64>(ProductPrices::VALUE).unwrap(), 850);
    let stored = h.api.products_prices.get.many(&mut session, Select::new()).await.unwrap();
    assert_eq!(stored.len(), 1);

    let err = h.api.products_prices.insert.one(&mut session, tier(800)).await.unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
}

#[tokio::test]
async fn conflict_target_must_be_a_unique_key() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();

    let err = h
        .api
        .users
        .insert
        .one(
            &mut session,
            InsertQuery::new([user_row("x@example.com")]).on_conflict(OnConflict::update([Users::FIRST_NAME])),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DataError::Construction(ConstructionError::InvalidConflictTarget("users"))
    );
}

#[tokio::test]
async fn reads_filter_order_and_paginate() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    for email in ["d@x.io", "a@x.io", "e@x.io", "b@x.io", "c@x.io"] {
        h.api.users.insert.one(&mut session, user_row(email)).await.unwrap();
    }

    let page = h
        .api
        .users
        .get
        .many(
            &mut session,
            h.api
                .users
                .get
                .query()
                .filter(Users::EMAIL.ne("e@x.io"))
                .order_by([Users::EMAIL.desc()])
                .offset(1)
                .limit(2),
        )
        .await
        .unwrap();
    let emails: Vec<String> = page.iter().map(|r| r.get(Users::EMAIL).unwrap()).collect();
    assert_eq!(emails, ["c@x.io", "b@x.io"]);

    let none = h
        .api
        .users
        .get
        .many(&mut session, Select::new().filter(Users::EMAIL.like("%@nowhere")))
        .await
        .unwrap();
    assert!(none.is_empty());

    let first = h
        .api
        .users
        .get
        .one(&mut session, Select::new().order_by([Users::EMAIL.asc()]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get::<String>(Users::EMAIL).unwrap(), "a@x.io");
}

#[tokio::test]
async fn by_matches_every_supplied_field() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    h.api
        .users
        .insert
        .one(&mut session, user_row("ada@x.io").set(Users::FIRST_NAME, "Ada"))
        .await
        .unwrap();

    let found = h
        .api
        .users
        .get
        .by(&mut session, Values::new().set(Users::EMAIL, "ada@x.io").set(Users::LAST_NAME, Value::Null))
        .await
        .unwrap();
    assert_eq!(found.unwrap().get::<String>(Users::FIRST_NAME).unwrap(), "Ada");

    let missing = h
        .api
        .users
        .get
        .by(&mut session, Values::new().set(Users::EMAIL, "ada@x.io").set(Users::FIRST_NAME, "Bob"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn one_unique_rejects_ambiguous_reads() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    for email in ["a@x.io", "b@x.io"] {
        h.api
            .users
            .insert
            .one(&mut session, user_row(email).set(Users::FIRST_NAME, "Sam"))
            .await
            .unwrap();
    }

    let err = h
        .api
        .users
        .get
        .one_unique(&mut session, Select::new().filter(Users::FIRST_NAME.eq("Sam")))
        .await
        .unwrap_err();
    assert_eq!(err, DataError::MultipleRows { count: 2 });

    let single = h
        .api
        .users
        .get
        .one_unique(&mut session, Select::new().filter(Users::EMAIL.eq("b@x.io")))
        .await
        .unwrap();
    assert!(single.is_some());
    assert!(!session.is_poisoned());
}

#[tokio::test]
async fn eager_relations_collapse_fan_out_rows() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let company = h
        .api
        .companies
        .insert
        .one(
            &mut session,
            Values::<Companies>::new()
                .set(Companies::SUPPLIER_ID, shop.supplier)
                .set(Companies::NAME, "Acme")
                .set(Companies::BUSINESS_EMAIL, "sales@acme.io"),
        )
        .await
        .unwrap();
    for (serial, url) in [(1, "a.png"), (2, "b.png")] {
        h.api
            .company_images
            .insert
            .one(
                &mut session,
                Values::<CompanyImages>::new()
                    .set(CompanyImages::COMPANY_ID, id::<i64>(&company))
                    .set(CompanyImages::URL, url)
                    .set(CompanyImages::SERIAL, serial),
            )
            .await
            .unwrap();
    }

    let supplier = h
        .api
        .suppliers
        .get
        .one_unique(
            &mut session,
            Select::new()
                .filter(Suppliers::ID.eq(shop.supplier))
                .eager(Eager::new(Suppliers::COMPANY).then(Companies::IMAGES)),
        )
        .await
        .unwrap()
        .unwrap();

    let company = supplier.one(Suppliers::COMPANY).unwrap();
    assert_eq!(company.get::<String>(Companies::NAME).unwrap(), "Acme");
    let urls: Vec<String> = company
        .many(Companies::IMAGES)
        .iter()
        .map(|image| image.get(CompanyImages::URL).unwrap())
        .collect();
    assert_eq!(urls, ["a.png", "b.png"]);

    let flat = h
        .api
        .suppliers
        .get
        .many(
            &mut session,
            Select::new().eager(Eager::new(Suppliers::COMPANY).then(Companies::IMAGES)),
        )
        .await
        .unwrap();
    assert_eq!(flat.len(), 2);
}

#[tokio::test]
async fn left_join_without_match_nests_nothing() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let rows = h
        .api
        .users
        .get
        .many(
            &mut session,
            Select::<Users>::new()
                .select(Projection::entity::<Suppliers>())
                .left_join::<Suppliers>(Suppliers::USER_ID.eq_col(Users::ID))
                .order_by([Users::ID.asc()]),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(id::<UserId>(&rows[0]), shop.buyer);
    assert!(matches!(rows[0].related("suppliers"), Some(Related::One(None))));
    assert!(matches!(rows[1].related("suppliers"), Some(Related::One(Some(_)))));
}

#[tokio::test]
async fn grouped_aggregates_with_having() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let first = common::order(&mut session, &h.api, shop.buyer).await.unwrap();
    let second = common::order(&mut session, &h.api, shop.buyer).await.unwrap();
    for (order, amount) in [(first, 2), (first, 3), (second, 1)] {
        h.api
            .order_lines
            .insert
            .one(
                &mut session,
                Values::<OrderLines>::new()
                    .set(OrderLines::ORDER_ID, order)
                    .set(OrderLines::VARIATION_COUNT_ID, shop.red_large)
                    .set(OrderLines::AMOUNT, amount),
            )
            .await
            .unwrap();
    }

    let totals = h
        .api
        .order_lines
        .get
        .many(
            &mut session,
            Select::<OrderLines>::project([
                Projection::column(OrderLines::ORDER_ID),
                Projection::aggregate(OrderLines::AMOUNT.sum(), "total"),
            ])
            .group_by([OrderLines::ORDER_ID])
            .having([OrderLines::AMOUNT.sum().gt(1)]),
        )
        .await
        .unwrap();

    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].get::<i64>("order_id").unwrap(), first.get());
    assert_eq!(totals[0].get::<i64>("total").unwrap(), 5);

    let opened = h
        .api
        .order_lines
        .get
        .count(&mut session, Select::new().filter(OrderLines::STATUS.eq(OrderStatus::Opened)))
        .await
        .unwrap();
    assert_eq!(opened, 3);
    assert!(
        h.api
            .order_lines
            .get
            .exists(&mut session, Select::new().filter(OrderLines::AMOUNT.ge(3)))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn update_returns_every_affected_row() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    for email in ["a@x.io", "b@x.io", "c@x.io"] {
        h.api.users.insert.one(&mut session, user_row(email)).await.unwrap();
    }

    let verified = h
        .api
        .users
        .update
        .many(
            &mut session,
            UpdateQuery::new(
                Values::new().set(Users::IS_VERIFIED, true),
                Users::EMAIL.is_in(["a@x.io", "c@x.io"]),
            ),
        )
        .await
        .unwrap();
    assert_eq!(verified.len(), 2);
    assert!(verified.iter().all(|r| r.get::<bool>(Users::IS_VERIFIED).unwrap()));

    let nothing = h
        .api
        .users
        .update
        .one(
            &mut session,
            UpdateQuery::new(Values::new().set(Users::IS_VERIFIED, true), Users::EMAIL.eq("zz@x.io")),
        )
        .await
        .unwrap();
    assert!(nothing.is_none());

    let everyone = h
        .api
        .users
        .update
        .many(
            &mut session,
            UpdateQuery::new(Values::new().set(Users::IS_DELETED, true), Filter::All),
        )
        .await
        .unwrap();
    assert_eq!(everyone.len(), 3);
}

#[tokio::test]
async fn update_into_an_existing_key_is_rejected() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    for email in ["a@x.io", "b@x.io"] {
        h.api.users.insert.one(&mut session, user_row(email)).await.unwrap();
    }

    let err = h
        .api
        .users
        .update
        .one(
            &mut session,
            UpdateQuery::new(Values::new().set(Users::EMAIL, "a@x.io"), Users::EMAIL.eq("b@x.io")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
}

#[tokio::test]
async fn mutations_require_an_explicit_filter() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    h.api.users.insert.one(&mut session, user_row("a@x.io")).await.unwrap();

    let err = h
        .api
        .users
        .delete
        .many(&mut session, Filter::Where(Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DataError::Construction(ConstructionError::UnfilteredMutation("users"))
    );

    let err = h
        .api
        .users
        .update
        .many(&mut session, UpdateQuery::new(Values::new(), Filter::All))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DataError::Construction(ConstructionError::EmptyAssignments("users"))
    );

    let removed = h.api.users.delete.many(&mut session, Filter::All).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(h.api.users.get.count(&mut session, Select::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn referenced_rows_cannot_be_deleted() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let err = h
        .api
        .users
        .delete
        .one(&mut session, Users::ID.eq(shop.seller))
        .await
        .unwrap_err();

    match err {
        DataError::Constraint { kind, constraint, .. } => {
            assert_eq!(kind, ConstraintKind::ForeignKey);
            assert_eq!(constraint, "suppliers_user_id_fkey");
        }
        other => panic!("expected foreign key violation, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_one_reports_the_removed_row() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let removed = h
        .api
        .users
        .delete
        .one(&mut session, Users::ID.eq(shop.buyer))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.get::<String>(Users::EMAIL).unwrap(), "buyer@example.com");

    let again = h
        .api
        .users
        .delete
        .one(&mut session, Users::ID.eq(shop.buyer))
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn mutations_return_eager_relations() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();

    let product = h
        .api
        .products
        .update
        .one(
            &mut session,
            UpdateQuery::new(
                Values::new().set(Products::DESCRIPTION, "Organic cotton"),
                Products::ID.eq(shop.shirt),
            )
            .eager(Products::SUPPLIER),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        product.get::<Option<String>>(Products::DESCRIPTION).unwrap().as_deref(),
        Some("Organic cotton")
    );
    let supplier = product.one(Products::SUPPLIER).unwrap();
    assert_eq!(supplier.get::<UserId>(Suppliers::USER_ID).unwrap(), shop.seller);

    let company = h
        .api
        .companies
        .insert
        .one(
            &mut session,
            InsertQuery::new([Values::<Companies>::new()
                .set(Companies::SUPPLIER_ID, shop.supplier)
                .set(Companies::NAME, "Acme")
                .set(Companies::BUSINESS_EMAIL, "sales@acme.io")])
            .eager(Companies::SUPPLIER),
        )
        .await
        .unwrap();
    assert!(company.one(Companies::SUPPLIER).is_some());
}

/// A company of the shop's supplier with `images` pictures.
async fn company_with_images(
    session: &mut marketplace_infra::Session,
    h: &common::Harness,
    supplier: marketplace_core::SupplierId,
    images: i64,
) -> i64 {
    let company = h
        .api
        .companies
        .insert
        .one(
            session,
            Values::<Companies>::new()
                .set(Companies::SUPPLIER_ID, supplier)
                .set(Companies::NAME, "Acme")
                .set(Companies::BUSINESS_EMAIL, "sales@acme.io"),
        )
        .await
        .unwrap();
    let company = id::<i64>(&company);
    h.api
        .company_images
        .insert
        .many(
            session,
            InsertQuery::new((1..=images).map(|serial| {
                Values::<CompanyImages>::new()
                    .set(CompanyImages::COMPANY_ID, company)
                    .set(CompanyImages::URL, format!("{serial}.png"))
                    .set(CompanyImages::SERIAL, serial)
            })),
        )
        .await
        .unwrap();
    company
}

#[tokio::test]
async fn pagination_counts_records_when_collections_load_eagerly() {
    let h = setup();
    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    company_with_images(&mut session, &h, shop.supplier, 3).await;
    let companies = h.api.companies;

    let first_page = companies
        .get
        .many_unique(&mut session, Select::new().eager(Companies::IMAGES).limit(1))
        .await
        .unwrap();
    assert_eq!(first_page.len(), 1);
    assert_eq!(first_page[0].many(Companies::IMAGES).len(), 3);

    let past_the_end = companies
        .get
        .many_unique(
            &mut session,
            Select::new().eager(Companies::IMAGES).limit(5).offset(1),
        )
        .await
        .unwrap();
    assert!(past_the_end.is_empty());

    let one = companies
        .get
        .one(&mut session, Select::new().eager(Companies::IMAGES))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.many(Companies::IMAGES).len(), 3);
    assert!(companies
        .get
        .exists(&mut session, Select::new().eager(Companies::IMAGES))
        .await
        .unwrap());

    let err = companies
        .get
        .many_unique(
            &mut session,
            Select::new()
                .eager(Companies::IMAGES)
                .filter(CompanyImages::SERIAL.gt(1))
                .limit(1),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DataError::Construction(ConstructionError::PagedCollection("companies"))
    );
    assert!(!session.is_poisoned());
}

#[tokio::test]
async fn upsert_cannot_affect_a_row_twice() {
    let h = setup();
    let prices = h.api.products_prices;

    let mut session = h.db.session().await.unwrap();
    let shop = shop(&mut session, &h.api).await.unwrap();
    let tier = move |value: i64| {
        Values::<ProductPrices>::new()
            .set(ProductPrices::PRODUCT_ID, shop.shirt)
            .set(ProductPrices::MIN_QUANTITY, 10)
            .set(ProductPrices::VALUE, value)
    };
    prices.insert.one(&mut session, tier(900)).await.unwrap();
    session.commit().await.unwrap();

    let mut session = h.db.session().await.unwrap();
    let err = prices
        .insert
        .many(
            &mut session,
            InsertQuery::new([tier(850), tier(800)]).on_conflict(OnConflict::update([
                ProductPrices::PRODUCT_ID,
                ProductPrices::MIN_QUANTITY,
            ])),
        )
        .await
        .unwrap_err();
    assert!(matches!(&err, DataError::Store(msg) if msg.contains("cannot affect row a second time")));
    assert!(session.is_poisoned());
    drop(session);

    let mut session = h.db.session().await.unwrap();
    let stored = prices.get.many(&mut session, Select::new()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get::<i64>(ProductPrices::VALUE).unwrap(), 900);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn inserted_users_read_back_field_for_field(
        local in "[a-z]{1,12}",
        first_name in proptest::option::of("[A-Za-z]{1,16}"),
        last_name in proptest::option::of("[A-Za-z]{1,16}"),
        phone in proptest::option::of("[0-9]{6,12}"),
        verified in any::<bool>(),
    ) {
        let values = Values::<Users>::new()
            .set(Users::EMAIL, format!("{local}@example.com"))
            .set(Users::FIRST_NAME, first_name)
            .set(Users::LAST_NAME, last_name)
            .set(Users::PHONE_NUMBER, phone)
            .set(Users::IS_VERIFIED, verified);

        let (inserted, fetched) = block_on(async {
            let h = setup();
            let mut session = h.db.session().await.unwrap();
            let inserted = h.api.users.insert.one(&mut session, values.clone()).await.unwrap();
            let fetched = h
                .api
                .users
                .get
                .one(&mut session, Select::new().filter(Users::ID.eq(id::<i64>(&inserted))))
                .await
                .unwrap();
            (inserted, fetched)
        });

        prop_assert!(fetched.is_some());
        let fetched = fetched.unwrap_or_default();
        for (column, value) in values.iter() {
            prop_assert_eq!(fetched.value(column), Some(value));
        }
        prop_assert_eq!(fetched.values(), inserted.values());
    }

    #[test]
    fn updates_change_only_assigned_fields_and_repeat_cleanly(
        name in "[A-Za-z ]{1,24}",
        description in proptest::option::of("[a-z ]{0,40}"),
        new_description in proptest::option::of("[a-z ]{0,40}"),
        active in proptest::option::of(any::<bool>()),
    ) {
        let mut change = Values::<Products>::new().set(Products::DESCRIPTION, new_description);
        if let Some(active) = active {
            change = change.set(Products::IS_ACTIVE, active);
        }

        let (before, once, twice, stored) = block_on(async {
            let h = setup();
            let products = h.api.products;
            let mut session = h.db.session().await.unwrap();
            let shop = shop(&mut session, &h.api).await.unwrap();
            let before = products
                .insert
                .one(
                    &mut session,
                    Values::<Products>::new()
                        .set(Products::SUPPLIER_ID, shop.supplier)
                        .set(Products::NAME, name.as_str())
                        .set(Products::DESCRIPTION, description.clone()),
                )
                .await
                .unwrap();
            let target = Products::ID.eq(id::<i64>(&before));
            let once = products
                .update
                .one(&mut session, UpdateQuery::new(change.clone(), target.clone()))
                .await
                .unwrap();
            let twice = products
                .update
                .one(&mut session, UpdateQuery::new(change.clone(), target.clone()))
                .await
                .unwrap();
            let stored = products
                .get
                .one(&mut session, Select::new().filter(target))
                .await
                .unwrap();
            (before, once, twice, stored)
        });

        prop_assert!(once.is_some() && twice.is_some() && stored.is_some());
        let (once, twice, stored) = (
            once.unwrap_or_default(),
            twice.unwrap_or_default(),
            stored.unwrap_or_default(),
        );
        for (field, original) in before.values() {
            let expected = change.get(field).unwrap_or(original);
            prop_assert_eq!(once.value(field.as_str()), Some(expected), "field {}", field);
        }
        prop_assert_eq!(once.values(), twice.values());
        prop_assert_eq!(twice.values(), stored.values());
    }
}
