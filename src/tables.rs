//! Logical source tables and the column names the pipeline reads from them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    Orders,
    OrderItems,
    Products,
    Sellers,
    Geolocation,
    CategoryTranslation,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Orders,
        TableName::OrderItems,
        TableName::Products,
        TableName::Sellers,
        TableName::Geolocation,
        TableName::CategoryTranslation,
    ];

    /// Stable identifier used in configuration and cache keys.
    pub fn id(&self) -> &'static str {
        match self {
            TableName::Orders => "orders",
            TableName::OrderItems => "order_items",
            TableName::Products => "products",
            TableName::Sellers => "sellers",
            TableName::Geolocation => "geolocation",
            TableName::CategoryTranslation => "category_translation",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            TableName::Orders => "olist_orders_dataset.csv",
            TableName::OrderItems => "olist_order_items_dataset.csv",
            TableName::Products => "olist_products_dataset.csv",
            TableName::Sellers => "olist_sellers_dataset.csv",
            TableName::Geolocation => "olist_geolocation_dataset.csv",
            TableName::CategoryTranslation => "product_category_name_translation.csv",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub mod columns {
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_STATUS: &str = "order_status";
    pub const PURCHASE_TS: &str = "order_purchase_timestamp";
    pub const DELIVERED_TS: &str = "order_delivered_customer_date";
    pub const ESTIMATED_TS: &str = "order_estimated_delivery_date";

    pub const PRODUCT_ID: &str = "product_id";
    pub const SELLER_ID: &str = "seller_id";
    pub const PRICE: &str = "price";
    pub const FREIGHT: &str = "freight_value";

    pub const RAW_CATEGORY: &str = "product_category_name";
    pub const ENGLISH_CATEGORY: &str = "product_category_name_english";
    pub const CATEGORY: &str = "category";

    pub const SELLER_STATE: &str = "seller_state";
    pub const SELLER_ZIP: &str = "seller_zip_code_prefix";

    pub const GEO_STATE: &str = "geolocation_state";
    pub const GEO_LAT: &str = "geolocation_lat";
    pub const GEO_LNG: &str = "geolocation_lng";

    // Derived by the pipeline
    pub const ORDER_VALUE: &str = "order_value";
    pub const LATE: &str = "late";
    pub const PERIOD_START: &str = "period_start";
    pub const WEEKDAY: &str = "weekday";
    pub const HOUR: &str = "hour";
}
