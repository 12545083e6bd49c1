mod common;

use olist_insights::pages::{run_page, PageContext, PageId, PageParams};
use olist_insights::period::Granularity;
use olist_insights::source::read_csv;
use olist_insights::{export_csv, DashboardError};
use tempfile::TempDir;

use common::{config, olist_tables};

fn export_page(page: PageId, params: &PageParams) -> polars::prelude::DataFrame {
    let tables = olist_tables();
    let config = config();
    let outcome = run_page(page, &PageContext::new(&tables, &config), params).unwrap();
    let report = outcome.report().expect("page has data");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.csv");
    export_csv(report.primary_table().unwrap(), &path).unwrap();
    read_csv(&path).unwrap()
}

fn text(df: &polars::prelude::DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

#[test]
fn test_export_top_categories() {
    let df = export_page(PageId::TopCategories, &PageParams::default());
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["category", "revenue", "avg_price", "items", "revenue_share"]);
    assert_eq!(
        text(&df, "category"),
        vec![Some("informatica".into()), Some("health_beauty".into()), Some("unknown".into())]
    );
    let shares: Vec<f64> = text(&df, "revenue_share")
        .into_iter()
        .map(|v| v.unwrap().parse().unwrap())
        .collect();
    assert_eq!(shares, vec![51.0, 28.6, 20.4]);
    assert_eq!(text(&df, "items"), vec![Some("2".into()); 3]);
}

#[test]
fn test_export_labels_periods_and_leaves_undefined_empty() {
    let params = PageParams {
        granularity: Some(Granularity::Month),
        ..PageParams::default()
    };
    let df = export_page(PageId::OrdersOverTime, &params);
    assert_eq!(text(&df, "period_start")[0].as_deref(), Some("2018-01"));
    // January has no previous month in the data
    assert_eq!(text(&df, "revenue_growth")[0], None);
}

#[test]
fn test_export_into_missing_directory_names_target() {
    let tables = olist_tables();
    let config = config();
    let outcome = run_page(PageId::TopCategories, &PageContext::new(&tables, &config), &PageParams::default()).unwrap();
    let table = outcome.report().unwrap().primary_table().unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("export.csv");
    let err = export_csv(table, &path).unwrap_err();
    assert!(matches!(&err, DashboardError::Export { path: p, .. } if *p == path));
    assert!(err.user_message().contains("export.csv"));
}
