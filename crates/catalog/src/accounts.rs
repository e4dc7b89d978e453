//! Accounts: buyers, suppliers and the companies suppliers trade as.

use marketplace_core::{
    Column, ColumnDef, ColumnType, DefaultValue, Entity, EntityDescriptor, Relation, RelationDef,
};

use crate::orders::Orders;
use crate::products::{Favorites, Products, Reviews};

/// Registered marketplace user (buyer and/or supplier owner).
pub struct Users;

impl Users {
    pub const ID: Column<Users> = Column::new("id");
    pub const EMAIL: Column<Users> = Column::new("email");
    pub const FIRST_NAME: Column<Users> = Column::new("first_name");
    pub const LAST_NAME: Column<Users> = Column::new("last_name");
    pub const PHONE_NUMBER: Column<Users> = Column::new("phone_number");
    pub const IS_VERIFIED: Column<Users> = Column::new("is_verified");
    pub const IS_DELETED: Column<Users> = Column::new("is_deleted");
    pub const CREATED_AT: Column<Users> = Column::new("created_at");

    pub const SUPPLIER: Relation<Users, Suppliers> = Relation::new(USER_SUPPLIER);
    pub const ORDERS: Relation<Users, Orders> = Relation::new(USER_ORDERS);
    pub const REVIEWS: Relation<Users, Reviews> = Relation::new(USER_REVIEWS);
    pub const FAVORITES: Relation<Users, Favorites> = Relation::new(USER_FAVORITES);
}

const USER_SUPPLIER: RelationDef = RelationDef::one("supplier", Suppliers::TABLE, "id", "user_id");
const USER_ORDERS: RelationDef = RelationDef::many("orders", Orders::TABLE, "id", "user_id");
const USER_REVIEWS: RelationDef = RelationDef::many("reviews", Reviews::TABLE, "id", "user_id");
const USER_FAVORITES: RelationDef =
    RelationDef::many("favorites", Favorites::TABLE, "id", "user_id");

static USERS: EntityDescriptor = EntityDescriptor {
    table: Users::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("email", ColumnType::Text),
        ColumnDef::new("first_name", ColumnType::Text).nullable(),
        ColumnDef::new("last_name", ColumnType::Text).nullable(),
        ColumnDef::new("phone_number", ColumnType::Text).nullable(),
        ColumnDef::new("is_verified", ColumnType::Bool).default(DefaultValue::Bool(false)),
        ColumnDef::new("is_deleted", ColumnType::Bool).default(DefaultValue::Bool(false)),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[&["email"]],
    relationships: &[USER_SUPPLIER, USER_ORDERS, USER_REVIEWS, USER_FAVORITES],
};

impl Entity for Users {
    const TABLE: &'static str = "users";

    fn descriptor() -> &'static EntityDescriptor {
        &USERS
    }
}

/// Supplier profile attached to a user.
pub struct Suppliers;

impl Suppliers {
    pub const ID: Column<Suppliers> = Column::new("id");
    pub const USER_ID: Column<Suppliers> = Column::new("user_id");
    pub const LICENSE_NUMBER: Column<Suppliers> = Column::new("license_number");
    pub const CREATED_AT: Column<Suppliers> = Column::new("created_at");

    pub const USER: Relation<Suppliers, Users> = Relation::new(SUPPLIER_USER);
    pub const COMPANY: Relation<Suppliers, Companies> = Relation::new(SUPPLIER_COMPANY);
    pub const PRODUCTS: Relation<Suppliers, Products> = Relation::new(SUPPLIER_PRODUCTS);
}

const SUPPLIER_USER: RelationDef = RelationDef::one("user", Users::TABLE, "user_id", "id");
const SUPPLIER_COMPANY: RelationDef =
    RelationDef::one("company", Companies::TABLE, "id", "supplier_id");
const SUPPLIER_PRODUCTS: RelationDef =
    RelationDef::many("products", Products::TABLE, "id", "supplier_id");

static SUPPLIERS: EntityDescriptor = EntityDescriptor {
    table: Suppliers::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("user_id", ColumnType::BigInt).references(Users::TABLE, "id"),
        ColumnDef::new("license_number", ColumnType::Text).nullable(),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[&["user_id"]],
    relationships: &[SUPPLIER_USER, SUPPLIER_COMPANY, SUPPLIER_PRODUCTS],
};

impl Entity for Suppliers {
    const TABLE: &'static str = "suppliers";

    fn descriptor() -> &'static EntityDescriptor {
        &SUPPLIERS
    }
}

/// Legal entity a supplier sells as.
pub struct Companies;

impl Companies {
    pub const ID: Column<Companies> = Column::new("id");
    pub const SUPPLIER_ID: Column<Companies> = Column::new("supplier_id");
    pub const NAME: Column<Companies> = Column::new("name");
    pub const BUSINESS_EMAIL: Column<Companies> = Column::new("business_email");
    pub const PHONE_NUMBER: Column<Companies> = Column::new("phone_number");
    pub const COUNTRY: Column<Companies> = Column::new("country");
    pub const TAX_NUMBER: Column<Companies> = Column::new("tax_number");
    pub const CREATED_AT: Column<Companies> = Column::new("created_at");

    pub const SUPPLIER: Relation<Companies, Suppliers> = Relation::new(COMPANY_SUPPLIER);
    pub const IMAGES: Relation<Companies, CompanyImages> = Relation::new(COMPANY_IMAGES_REL);
}

const COMPANY_SUPPLIER: RelationDef =
    RelationDef::one("supplier", Suppliers::TABLE, "supplier_id", "id");
const COMPANY_IMAGES_REL: RelationDef =
    RelationDef::many("images", CompanyImages::TABLE, "id", "company_id");

static COMPANIES: EntityDescriptor = EntityDescriptor {
    table: Companies::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("supplier_id", ColumnType::BigInt).references(Suppliers::TABLE, "id"),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("business_email", ColumnType::Text),
        ColumnDef::new("phone_number", ColumnType::Text).nullable(),
        ColumnDef::new("country", ColumnType::Text).nullable(),
        ColumnDef::new("tax_number", ColumnType::Text).nullable(),
        ColumnDef::new("created_at", ColumnType::Timestamp).default(DefaultValue::Now),
    ],
    unique: &[&["supplier_id"], &["tax_number"]],
    relationships: &[COMPANY_SUPPLIER, COMPANY_IMAGES_REL],
};

impl Entity for Companies {
    const TABLE: &'static str = "companies";

    fn descriptor() -> &'static EntityDescriptor {
        &COMPANIES
    }
}

/// Uploaded company picture; `serial` orders the gallery.
pub struct CompanyImages;

impl CompanyImages {
    pub const ID: Column<CompanyImages> = Column::new("id");
    pub const COMPANY_ID: Column<CompanyImages> = Column::new("company_id");
    pub const URL: Column<CompanyImages> = Column::new("url");
    pub const SERIAL: Column<CompanyImages> = Column::new("serial");

    pub const COMPANY: Relation<CompanyImages, Companies> = Relation::new(IMAGE_COMPANY);
}

const IMAGE_COMPANY: RelationDef =
    RelationDef::one("company", Companies::TABLE, "company_id", "id");

static COMPANY_IMAGES: EntityDescriptor = EntityDescriptor {
    table: CompanyImages::TABLE,
    primary_key: &["id"],
    columns: &[
        ColumnDef::new("id", ColumnType::BigInt).default(DefaultValue::Serial),
        ColumnDef::new("company_id", ColumnType::BigInt).references(Companies::TABLE, "id"),
        ColumnDef::new("url", ColumnType::Text),
        ColumnDef::new("serial", ColumnType::BigInt).default(DefaultValue::Int(0)),
    ],
    unique: &[],
    relationships: &[IMAGE_COMPANY],
};

impl Entity for CompanyImages {
    const TABLE: &'static str = "company_images";

    fn descriptor() -> &'static EntityDescriptor {
        &COMPANY_IMAGES
    }
}
