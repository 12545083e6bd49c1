#![allow(dead_code)]

use olist_insights::config::AppConfig;
use olist_insights::tables::{columns as c, TableName};
use olist_insights::{DataSource, InMemoryTables};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

pub const FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn text_frame(cols: &[(&str, Vec<Option<&str>>)]) -> DataFrame {
    let columns: Vec<Column> = cols
        .iter()
        .map(|(name, values)| Column::new((*name).into(), values.clone()))
        .collect();
    DataFrame::new(columns).unwrap()
}

/// Seven orders: o3 canceled, o6 with an unparseable purchase time, o7 without items.
pub fn orders() -> DataFrame {
    text_frame(&[
        (c::ORDER_ID, vec![Some("o1"), Some("o2"), Some("o3"), Some("o4"), Some("o5"), Some("o6"), Some("o7")]),
        (
            c::ORDER_STATUS,
            vec![
                Some("delivered"),
                Some("delivered"),
                Some("canceled"),
                Some("delivered"),
                Some("delivered"),
                Some("delivered"),
                Some("delivered"),
            ],
        ),
        (
            c::PURCHASE_TS,
            vec![
                Some("2018-01-10 10:00:00"),
                Some("2018-02-11 11:00:00"),
                Some("2018-02-15 09:00:00"),
                Some("2018-04-03 14:00:00"),
                Some("2018-05-20 20:00:00"),
                Some("not a date"),
                Some("2018-06-10 10:00:00"),
            ],
        ),
        (
            c::DELIVERED_TS,
            vec![
                Some("2018-01-20 00:00:00"),
                Some("2018-02-12 00:00:00"),
                None,
                Some("2018-04-10 00:00:00"),
                Some("2018-06-05 00:00:00"),
                None,
                Some("2018-06-15 00:00:00"),
            ],
        ),
        (
            c::ESTIMATED_TS,
            vec![
                Some("2018-01-15 00:00:00"),
                Some("2018-02-20 00:00:00"),
                Some("2018-02-25 00:00:00"),
                Some("2018-04-20 00:00:00"),
                Some("2018-06-01 00:00:00"),
                None,
                Some("2018-06-20 00:00:00"),
            ],
        ),
    ])
}

/// o2's price is malformed.
pub fn order_items() -> DataFrame {
    text_frame(&[
        (c::ORDER_ID, vec![Some("o1"), Some("o1"), Some("o2"), Some("o3"), Some("o4"), Some("o5"), Some("o6")]),
        (c::PRODUCT_ID, vec![Some("p1"), Some("p2"), Some("p1"), Some("p3"), Some("p2"), Some("p3"), Some("p1")]),
        (c::SELLER_ID, vec![Some("s1"), Some("s2"), Some("s1"), Some("s3"), Some("s2"), Some("s1"), Some("s1")]),
        (
            c::PRICE,
            vec![Some("100.00"), Some("50.00"), Some("abc"), Some("30.00"), Some("200.00"), Some("70.00"), Some("40.00")],
        ),
        (
            c::FREIGHT,
            vec![Some("10.00"), Some("5.00"), Some("8.00"), Some("3.00"), Some("20.00"), Some("7.00"), Some("4.00")],
        ),
    ])
}

/// p3 has no category.
pub fn products() -> DataFrame {
    text_frame(&[
        (c::PRODUCT_ID, vec![Some("p1"), Some("p2"), Some("p3")]),
        (c::RAW_CATEGORY, vec![Some("beleza_saude"), Some("informatica"), None]),
    ])
}

/// Only beleza_saude is translated.
pub fn category_translation() -> DataFrame {
    text_frame(&[
        (c::RAW_CATEGORY, vec![Some("beleza_saude")]),
        (c::ENGLISH_CATEGORY, vec![Some("health_beauty")]),
    ])
}

pub fn sellers() -> DataFrame {
    text_frame(&[
        (c::SELLER_ID, vec![Some("s1"), Some("s2"), Some("s3")]),
        (c::SELLER_ZIP, vec![Some("01001"), Some("20010"), Some("01310")]),
        (c::SELLER_STATE, vec![Some("SP"), Some("RJ"), Some("SP")]),
    ])
}

pub fn geolocation() -> DataFrame {
    text_frame(&[
        (c::GEO_STATE, vec![Some("SP"), Some("SP"), Some("RJ")]),
        (c::GEO_LAT, vec![Some("-23.5"), Some("-23.7"), Some("-22.9")]),
        (c::GEO_LNG, vec![Some("-46.6"), Some("-46.8"), Some("-43.2")]),
    ])
}

pub fn all_tables() -> Vec<(TableName, DataFrame)> {
    vec![
        (TableName::Orders, orders()),
        (TableName::OrderItems, order_items()),
        (TableName::Products, products()),
        (TableName::Sellers, sellers()),
        (TableName::Geolocation, geolocation()),
        (TableName::CategoryTranslation, category_translation()),
    ]
}

pub fn olist_tables() -> InMemoryTables {
    all_tables()
        .into_iter()
        .fold(InMemoryTables::new(), |tables, (name, df)| tables.with(name, df))
}

pub fn write_csv(dir: &Path, table: TableName, df: &DataFrame) {
    let mut df = df.clone();
    let mut file = File::create(dir.join(table.default_file_name())).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
}

/// The fixture tables written as CSV files into a fresh directory.
pub fn olist_csv_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for (table, df) in all_tables() {
        write_csv(dir.path(), table, &df);
    }
    dir
}

pub fn csv_source(dir: &TempDir) -> DataSource {
    DataSource::new(dir.path())
}

pub fn config() -> AppConfig {
    AppConfig::default()
}
