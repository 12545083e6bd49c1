//! Aggregation pipeline and page reports over the Olist e-commerce dataset.
//!
//! Raw CSV tables flow through [`source`] (loading and caching), [`clean`] (coercion and
//! fallback labels), [`join`], [`period`] (calendar bins), [`aggregate`], [`metrics`] and
//! finally [`presentation`]. [`pages`] wires these into the dashboard's reports.

pub mod aggregate;
pub mod cache;
pub mod clean;
pub mod config;
pub mod datasets;
pub mod error;
pub mod join;
pub mod metrics;
pub mod pages;
pub mod period;
pub mod pipeline;
pub mod presentation;
pub mod source;
pub mod tables;

pub use aggregate::{aggregate, AggregateTable, GroupKey, KeyValue, Measure, Reduction};
pub use cache::{CacheStats, TableCache};
pub use config::{AppConfig, ConfigManager};
pub use error::{DashboardError, Result};
pub use olist_insights_cli::Args;
pub use pages::{run_page, PageContext, PageId, PageOutcome, PageParams, PageReport};
pub use period::{DateRange, Granularity, PeriodBin};
pub use pipeline::{Dimension, Filters, Pipeline};
pub use presentation::{export_csv, finalize, FinalizeOptions, RoundingPolicy, ValueKind};
pub use source::{DataSource, InMemoryTables, TableProvider};
pub use tables::TableName;

/// Application name used for the config directory
pub const APP_NAME: &str = "olist-insights";
