//! Product catalogue: categories, products, price tiers, variations and buyer feedback.

use marketplace_core::{
    Column, ColumnDef, ColumnType, DefaultValue, Entity, EntityDescriptor, Relation, RelationDef,
};

use crate::accounts::{Suppliers, Users};
use crate::orders::OrderLines;

pub struct Categories;

impl Categories {
    pub const ID: Column<Categories> = Column::new("id");
    pub const NAME: Column<Categories> = Column::new("name");
    pub const PARENT_ID: Column<Categories> = Column::new("parent_id");

    pub const PRODUCTS: Relation<Categories, Products> = Relation::new(CATEGORY_PRODUCTS);
}

const CATEGORY_PRODUCTS: RelationDef =
    RelationDef::many("products", Products::TABLE, "id", "category_id");

static CATEGORIES: EntityDescriptor = EntityDescriptor {
    table: Categories::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("parent_id", ColumnType::BigInt)
            .nullable()
            .references(Categories::TABLE, "id"),
    ],
    unique: &[&["name"]],
    relationships: &[CATEGORY_PRODUCTS],
};

impl Entity for Categories {
    const TABLE: &'static str = "categories";

    fn descriptor() -> &'static EntityDescriptor {
        &CATEGORIES
    }
}

/// Listed product owned by a supplier.
pub struct Products;

impl Products {
    pub const ID: Column<Products> = Column::new("id");
    pub const SUPPLIER_ID: Column<Products> = Column::new("supplier_id");
    pub const CATEGORY_ID: Column<Products> = Column::new("category_id");
    pub const NAME: Column<Products> = Column::new("name");
    pub const DESCRIPTION: Column<Products> = Column::new("description");
    pub const IS_ACTIVE: Column<Products> = Column::new("is_active");
    pub const CREATED_AT: Column<Products> = Column::new("created_at");

    pub const SUPPLIER: Relation<Products, Suppliers> = Relation::new(PRODUCT_SUPPLIER);
    pub const CATEGORY: Relation<Products, Categories> = Relation::new(PRODUCT_CATEGORY);
    pub const PRICES: Relation<Products, ProductPrices> = Relation::new(PRODUCT_PRICES);
    pub const VARIATIONS: Relation<Products, VariationValues> = Relation::new(PRODUCT_VARIATIONS);
    pub const REVIEWS: Relation<Products, Reviews> = Relation::new(PRODUCT_REVIEWS);
}

const PRODUCT_SUPPLIER: RelationDef =
    RelationDef::one("supplier", Suppliers::TABLE, "supplier_id", "id");
const PRODUCT_CATEGORY: RelationDef =
    RelationDef::one("category", Categories::TABLE, "category_id", "id");
const PRODUCT_PRICES: RelationDef =
    RelationDef::many("prices", ProductPrices::TABLE, "id", "product_id");
const PRODUCT_VARIATIONS: RelationDef =
    RelationDef::many("variations", VariationValues::TABLE, "id", "product_id");
const PRODUCT_REVIEWS: RelationDef =
    RelationDef::many("reviews", Reviews::TABLE, "id", "product_id");

static PRODUCTS: EntityDescriptor = EntityDescriptor {
    table: Products::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("supplier_id", ColumnType::BigInt).references(Suppliers::TABLE, "id"),
        ColumnDef::new("category_id", ColumnType::BigInt)
            .nullable()
            .references(Categories::TABLE, "id"),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("description", ColumnType::Text).nullable(),
        ColumnDef::new("is_active", ColumnType::Bool).default(DefaultValue::Bool(true)),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[],
    relationships: &[
        PRODUCT_SUPPLIER,
        PRODUCT_CATEGORY,
        PRODUCT_PRICES,
        PRODUCT_VARIATIONS,
        PRODUCT_REVIEWS,
    ],
};

impl Entity for Products {
    const TABLE: &'static str = "products";

    fn descriptor() -> &'static EntityDescriptor {
        &PRODUCTS
    }
}

/// Quantity-tiered price of a product.
///
/// `value` is stored in minor currency units. A tier applies to orders of at least
/// `min_quantity` items while `start_date <= now` and `end_date` is unset or in the future.
pub struct ProductPrices;

impl ProductPrices {
    pub const ID: Column<ProductPrices> = Column::new("id");
    pub const PRODUCT_ID: Column<ProductPrices> = Column::new("product_id");
    pub const VALUE: Column<ProductPrices> = Column::new("value");
    pub const MIN_QUANTITY: Column<ProductPrices> = Column::new("min_quantity");
    pub const DISCOUNT: Column<ProductPrices> = Column::new("discount");
    pub const START_DATE: Column<ProductPrices> = Column::new("start_date");
    pub const END_DATE: Column<ProductPrices> = Column::new("end_date");

    pub const PRODUCT: Relation<ProductPrices, Products> = Relation::new(PRICE_PRODUCT);
}

const PRICE_PRODUCT: RelationDef =
    RelationDef::one("product", Products::TABLE, "product_id", "id");

static PRODUCTS_PRICES: EntityDescriptor = EntityDescriptor {
    table: ProductPrices::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("product_id", ColumnType::BigInt).references(Products::TABLE, "id"),
        ColumnDef::new("value", ColumnType::BigInt),
        ColumnDef::new("min_quantity", ColumnType::BigInt).default(DefaultValue::Int(1)),
        ColumnDef::new("discount", ColumnType::Double).nullable(),
        ColumnDef::new("start_date", ColumnType::Timestamp).default(DefaultValue::Now),
        ColumnDef::new("end_date", ColumnType::Timestamp).nullable(),
    ],
    unique: &[&["product_id", "min_quantity"]],
    relationships: &[PRICE_PRODUCT],
};

impl Entity for ProductPrices {
    const TABLE: &'static str = "products_prices";

    fn descriptor() -> &'static EntityDescriptor {
        &PRODUCTS_PRICES
    }
}

/// One selectable option of a product, e.g. `color = red`.
pub struct VariationValues;

impl VariationValues {
    pub const ID: Column<VariationValues> = Column::new("id");
    pub const PRODUCT_ID: Column<VariationValues> = Column::new("product_id");
    pub const NAME: Column<VariationValues> = Column::new("name");
    pub const VALUE: Column<VariationValues> = Column::new("value");

    pub const PRODUCT: Relation<VariationValues, Products> = Relation::new(VARIATION_PRODUCT);
}

const VARIATION_PRODUCT: RelationDef =
    RelationDef::one("product", Products::TABLE, "product_id", "id");

static VARIATION_VALUES: EntityDescriptor = EntityDescriptor {
    table: VariationValues::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("product_id", ColumnType::BigInt).references(Products::TABLE, "id"),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("value", ColumnType::Text),
    ],
    unique: &[&["product_id", "name", "value"]],
    relationships: &[VARIATION_PRODUCT],
};

impl Entity for VariationValues {
    const TABLE: &'static str = "variation_values";

    fn descriptor() -> &'static EntityDescriptor {
        &VARIATION_VALUES
    }
}

/// Stock of one variation combination.
///
/// A combination references up to two variation values (slot 1 is mandatory, slot 2 is
/// absent for single-axis products). `count` is the quantity on hand.
pub struct VariationCounts;

impl VariationCounts {
    pub const ID: Column<VariationCounts> = Column::new("id");
    pub const VARIATION_VALUE_1_ID: Column<VariationCounts> = Column::new("variation_value_1_id");
    pub const VARIATION_VALUE_2_ID: Column<VariationCounts> = Column::new("variation_value_2_id");
    pub const COUNT: Column<VariationCounts> = Column::new("count");

    /// The value in slot 1. Only one slot relation can be eager-loaded per query.
    pub const FIRST_VALUE: Relation<VariationCounts, VariationValues> =
        Relation::new(COUNT_FIRST_VALUE);
    pub const SECOND_VALUE: Relation<VariationCounts, VariationValues> =
        Relation::new(COUNT_SECOND_VALUE);
    pub const ORDER_LINES: Relation<VariationCounts, OrderLines> = Relation::new(COUNT_LINES);

    /// Slot columns, in slot order.
    pub const SLOTS: [Column<VariationCounts>; 2] =
        [Self::VARIATION_VALUE_1_ID, Self::VARIATION_VALUE_2_ID];
}

const COUNT_FIRST_VALUE: RelationDef =
    RelationDef::one("first_value", VariationValues::TABLE, "variation_value_1_id", "id");
const COUNT_SECOND_VALUE: RelationDef =
    RelationDef::one("second_value", VariationValues::TABLE, "variation_value_2_id", "id");
const COUNT_LINES: RelationDef =
    RelationDef::many("order_lines", OrderLines::TABLE, "id", "variation_count_id");

static VARIATION_COUNTS: EntityDescriptor = EntityDescriptor {
    table: VariationCounts::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("variation_value_1_id", ColumnType::BigInt)
            .references(VariationValues::TABLE, "id"),
        ColumnDef::new("variation_value_2_id", ColumnType::BigInt)
            .nullable()
            .references(VariationValues::TABLE, "id"),
        ColumnDef::new("count", ColumnType::BigInt).default(DefaultValue::Int(0)),
    ],
    unique: &[],
    relationships: &[COUNT_FIRST_VALUE, COUNT_SECOND_VALUE, COUNT_LINES],
};

impl Entity for VariationCounts {
    const TABLE: &'static str = "variation_counts";

    fn descriptor() -> &'static EntityDescriptor {
        &VARIATION_COUNTS
    }
}

/// A buyer's review; one per (user, product).
pub struct Reviews;

impl Reviews {
    pub const ID: Column<Reviews> = Column::new("id");
    pub const USER_ID: Column<Reviews> = Column::new("user_id");
    pub const PRODUCT_ID: Column<Reviews> = Column::new("product_id");
    pub const GRADE: Column<Reviews> = Column::new("grade");
    pub const TEXT: Column<Reviews> = Column::new("text");
    pub const CREATED_AT: Column<Reviews> = Column::new("created_at");

    pub const USER: Relation<Reviews, Users> = Relation::new(REVIEW_USER);
    pub const PRODUCT: Relation<Reviews, Products> = Relation::new(REVIEW_PRODUCT);
}

const REVIEW_USER: RelationDef = RelationDef::one("user", Users::TABLE, "user_id", "id");
const REVIEW_PRODUCT: RelationDef =
    RelationDef::one("product", Products::TABLE, "product_id", "id");

static REVIEWS: EntityDescriptor = EntityDescriptor {
    table: Reviews::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("user_id", ColumnType::BigInt).references(Users::TABLE, "id"),
        ColumnDef::new("product_id", ColumnType::BigInt).references(Products::TABLE, "id"),
        ColumnDef::new("grade", ColumnType::BigInt),
        ColumnDef::new("text", ColumnType::Text).nullable(),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[&["user_id", "product_id"]],
    relationships: &[REVIEW_USER, REVIEW_PRODUCT],
};

impl Entity for Reviews {
    const TABLE: &'static str = "reviews";

    fn descriptor() -> &'static EntityDescriptor {
        &REVIEWS
    }
}

pub struct Favorites;

impl Favorites {
    pub const ID: Column<Favorites> = Column::new("id");
    pub const USER_ID: Column<Favorites> = Column::new("user_id");
    pub const PRODUCT_ID: Column<Favorites> = Column::new("product_id");

    pub const PRODUCT: Relation<Favorites, Products> = Relation::new(FAVORITE_PRODUCT);
}

const FAVORITE_PRODUCT: RelationDef =
    RelationDef::one("product", Products::TABLE, "product_id", "id");

static FAVORITES: EntityDescriptor = EntityDescriptor {
    table: Favorites::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("user_id", ColumnType::BigInt).references(Users::TABLE, "id"),
        ColumnDef::new("product_id", ColumnType::BigInt).references(Products::TABLE, "id"),
    ],
    unique: &[&["user_id", "product_id"]],
    relationships: &[FAVORITE_PRODUCT],
};

impl Entity for Favorites {
    const TABLE: &'static str = "favorites";

    fn descriptor() -> &'static EntityDescriptor {
        &FAVORITES
    }
}
