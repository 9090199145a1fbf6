//! Collection declarations shared by both stores.
//!
//! The relational store applies the DDL; the document store creates a unique
//! index per declared key and uses the keys to resolve `INSERT OR REPLACE`.

/// SQLite expression producing the shared `YYYY-MM-DDTHH:MM:SS.mmmZ` text format.
pub const TIMESTAMP_DEFAULT: &str = "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub ddl: &'static str,
    /// Fields whose values are unique across the collection.
    pub unique: &'static [&'static str],
}

impl CollectionSchema {
    /// `CREATE TABLE IF NOT EXISTS` statement with the timestamp defaults filled in.
    pub fn create_table_sql(&self) -> String {
        self.ddl.replace("{now}", TIMESTAMP_DEFAULT)
    }
}

pub const USERS: CollectionSchema = CollectionSchema {
    name: "users",
    ddl: "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'customer',
        phone TEXT,
        address TEXT,
        verification_status TEXT NOT NULL DEFAULT 'unverified',
        verification_data TEXT,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &["email"],
};

pub const PRODUCTS: CollectionSchema = CollectionSchema {
    name: "products",
    ddl: "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        price REAL NOT NULL,
        category TEXT,
        image_url TEXT,
        stock INTEGER NOT NULL DEFAULT 0,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &[],
};

pub const ORDERS: CollectionSchema = CollectionSchema {
    name: "orders",
    ddl: "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        total REAL NOT NULL,
        shipping_address TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &[],
};

pub const ORDER_ITEMS: CollectionSchema = CollectionSchema {
    name: "order_items",
    ddl: "CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        product_name TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price REAL NOT NULL,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &[],
};

pub const NOTIFICATION_PREFERENCES: CollectionSchema = CollectionSchema {
    name: "notification_preferences",
    ddl: "CREATE TABLE IF NOT EXISTS notification_preferences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        email_orders BOOLEAN NOT NULL DEFAULT 1,
        email_promotions BOOLEAN NOT NULL DEFAULT 0,
        sms_orders BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &["user_id"],
};

pub const ADMIN_SETTINGS: CollectionSchema = CollectionSchema {
    name: "admin_settings",
    ddl: "CREATE TABLE IF NOT EXISTS admin_settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        setting_key TEXT NOT NULL UNIQUE,
        setting_value TEXT,
        created_at TEXT NOT NULL DEFAULT {now},
        updated_at TEXT NOT NULL DEFAULT {now}
    )",
    unique: &["setting_key"],
};

pub const COLLECTIONS: &[CollectionSchema] = &[
    USERS,
    PRODUCTS,
    ORDERS,
    ORDER_ITEMS,
    NOTIFICATION_PREFERENCES,
    ADMIN_SETTINGS,
];

pub fn lookup(name: &str) -> Option<&'static CollectionSchema> {
    COLLECTIONS.iter().find(|schema| schema.name == name)
}

/// Unique keys declared for `name`; empty for unknown collections.
pub fn unique_keys(name: &str) -> &'static [&'static str] {
    lookup(name).map(|schema| schema.unique).unwrap_or(&[])
}
