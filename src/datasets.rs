//! Base views: the joined, typed row-level frames pages aggregate over.

use polars::prelude::*;
use tracing::debug;

use crate::clean::{
    category_expr, coerce_numeric, coerce_timestamp, drop_missing, MissingPolicy, UNKNOWN_CATEGORY,
};
use crate::error::Result;
use crate::join::{left_join, project};
use crate::source::TableProvider;
use crate::tables::{columns as c, TableName};

pub struct BaseViews<'a> {
    tables: &'a dyn TableProvider,
    timestamp_format: &'a str,
}

impl<'a> BaseViews<'a> {
    pub fn new(tables: &'a dyn TableProvider, timestamp_format: &'a str) -> Self {
        Self {
            tables,
            timestamp_format,
        }
    }

    fn load(&self, table: TableName, columns: &[&str]) -> Result<DataFrame> {
        let df = self.tables.load(table)?;
        project(&df, table.id(), columns)
    }

    /// `product_id` with its resolved `category`.
    pub fn products_with_category(&self) -> Result<DataFrame> {
        let products = self.load(TableName::Products, &[c::PRODUCT_ID, c::RAW_CATEGORY])?;

        let (joined, translated) = match self.tables.load_optional(TableName::CategoryTranslation)? {
            Some(translation) => {
                let translation = project(
                    &translation,
                    TableName::CategoryTranslation.id(),
                    &[c::RAW_CATEGORY, c::ENGLISH_CATEGORY],
                )?;
                let translation = drop_missing(translation, &[c::RAW_CATEGORY])?;
                let joined = left_join(
                    products,
                    &translation,
                    c::RAW_CATEGORY,
                    TableName::CategoryTranslation.id(),
                )?;
                (joined, Some(c::ENGLISH_CATEGORY))
            }
            None => {
                debug!("no category translation table, using raw names");
                (products, None)
            }
        };

        Ok(joined
            .lazy()
            .select([
                col(c::PRODUCT_ID),
                category_expr(c::RAW_CATEGORY, translated).alias(c::CATEGORY),
            ])
            .collect()?)
    }

    fn orders(&self, timestamps: &[&str]) -> Result<DataFrame> {
        let mut wanted = vec![c::ORDER_ID, c::ORDER_STATUS];
        wanted.extend_from_slice(timestamps);
        let orders = self.load(TableName::Orders, &wanted)?;
        coerce_timestamp(orders, timestamps, self.timestamp_format)
    }

    /// One row per order item with price and freight under `policy`, joined with the order's
    /// status and purchase time, the product category and the seller state.
    pub fn item_sales(&self, policy: MissingPolicy, require_purchase_time: bool) -> Result<DataFrame> {
        let items = self.load(
            TableName::OrderItems,
            &[c::ORDER_ID, c::PRODUCT_ID, c::SELLER_ID, c::PRICE, c::FREIGHT],
        )?;
        let items = coerce_numeric(items, &[c::PRICE, c::FREIGHT], policy)?;
        let orders = self.orders(&[c::PURCHASE_TS])?;
        let products = self.products_with_category()?;
        let sellers = self.load(TableName::Sellers, &[c::SELLER_ID, c::SELLER_STATE])?;

        let rows = left_join(items, &orders, c::ORDER_ID, TableName::Orders.id())?;
        let rows = left_join(rows, &products, c::PRODUCT_ID, TableName::Products.id())?;
        let rows = left_join(rows, &sellers, c::SELLER_ID, TableName::Sellers.id())?;
        let rows = rows
            .lazy()
            .with_column(col(c::CATEGORY).fill_null(lit(UNKNOWN_CATEGORY)))
            .collect()?;

        let rows = if require_purchase_time {
            drop_missing(rows, &[c::PURCHASE_TS])?
        } else {
            rows
        };
        debug!(rows = rows.height(), ?policy, "item sales");
        Ok(rows)
    }

    /// One row per order with a known purchase time: `order_value` is the sum of its item
    /// prices (malformed prices and orders without items count as 0), plus the delivery
    /// timestamps and a `late` flag (1.0 late, 0.0 on time, missing when unknown).
    pub fn order_values(&self) -> Result<DataFrame> {
        let orders = self.orders(&[c::PURCHASE_TS, c::DELIVERED_TS, c::ESTIMATED_TS])?;
        let orders = drop_missing(orders, &[c::PURCHASE_TS])?;

        let items = self.load(TableName::OrderItems, &[c::ORDER_ID, c::PRICE])?;
        let items = coerce_numeric(items, &[c::PRICE], MissingPolicy::ZeroFill)?;
        let per_order = items
            .lazy()
            .filter(col(c::ORDER_ID).is_not_null())
            .group_by([col(c::ORDER_ID)])
            .agg([col(c::PRICE).sum().alias(c::ORDER_VALUE)])
            .collect()?;

        let delivered = col(c::DELIVERED_TS);
        let estimated = col(c::ESTIMATED_TS);
        let late = when(delivered.clone().is_null().or(estimated.clone().is_null()))
            .then(lit(NULL).cast(DataType::Float64))
            .otherwise(
                when(delivered.gt(estimated))
                    .then(lit(1.0))
                    .otherwise(lit(0.0)),
            );

        let rows = left_join(orders, &per_order, c::ORDER_ID, TableName::OrderItems.id())?
            .lazy()
            .with_columns([
                col(c::ORDER_VALUE).fill_null(lit(0.0)),
                late.alias(c::LATE),
            ])
            .collect()?;
        debug!(rows = rows.height(), "order values");
        Ok(rows)
    }

    /// Mean latitude and longitude per state, keyed by `seller_state`, sorted by state.
    /// Points with a missing state or coordinate are ignored.
    pub fn state_centroids(&self) -> Result<DataFrame> {
        let geo = self.load(TableName::Geolocation, &[c::GEO_STATE, c::GEO_LAT, c::GEO_LNG])?;
        let geo = coerce_numeric(geo, &[c::GEO_LAT, c::GEO_LNG], MissingPolicy::Exclude)?;
        let geo = drop_missing(geo, &[c::GEO_STATE, c::GEO_LAT, c::GEO_LNG])?;
        Ok(geo
            .lazy()
            .group_by([col(c::GEO_STATE).alias(c::SELLER_STATE)])
            .agg([col(c::GEO_LAT).mean(), col(c::GEO_LNG).mean()])
            .sort([c::SELLER_STATE], SortMultipleOptions::default())
            .collect()?)
    }
}

/// Earliest and latest purchase day in `rows`, if any row has a purchase time.
pub fn purchase_day_bounds(rows: &DataFrame) -> Result<Option<(chrono::NaiveDate, chrono::NaiveDate)>> {
    let micros = rows.column(c::PURCHASE_TS)?.cast(&DataType::Int64)?;
    let micros = micros.i64()?;
    let to_day = |v: Option<i64>| v.and_then(crate::period::to_naive).map(|d| d.date());
    Ok(to_day(micros.min()).zip(to_day(micros.max())))
}
