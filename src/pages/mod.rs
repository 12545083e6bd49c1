//! Dashboard pages. Each one is a [`Pipeline`](crate::pipeline::Pipeline) configuration plus
//! derived metrics and finalization, turned into a [`PageReport`].

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::info;

use olist_insights_cli::{Args, GranularityArg, HeatmapMetricArg, PageArg, RankMetricArg};

use crate::aggregate::AggregateTable;
use crate::config::AppConfig;
use crate::datasets::BaseViews;
use crate::error::{DashboardError, Result};
use crate::period::{parse_date, DateRange, Granularity};
use crate::presentation::{RoundingPolicy, TableView, ValueKind};
use crate::source::TableProvider;

pub mod activity_heatmap;
pub mod category_momentum;
pub mod delivery_performance;
pub mod orders_over_time;
pub mod seller_correlation;
pub mod seller_landscape;
mod sellers;
pub mod state_leaderboard;
pub mod top_categories;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageId {
    TopCategories,
    OrdersOverTime,
    DeliveryPerformance,
    ActivityHeatmap,
    SellerLandscape,
    StateLeaderboard,
    SellerCorrelation,
    CategoryMomentum,
}

impl PageId {
    pub const ALL: [PageId; 8] = [
        PageId::TopCategories,
        PageId::OrdersOverTime,
        PageId::DeliveryPerformance,
        PageId::ActivityHeatmap,
        PageId::SellerLandscape,
        PageId::StateLeaderboard,
        PageId::SellerCorrelation,
        PageId::CategoryMomentum,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            PageId::TopCategories => "top-categories",
            PageId::OrdersOverTime => "orders-over-time",
            PageId::DeliveryPerformance => "delivery-performance",
            PageId::ActivityHeatmap => "activity-heatmap",
            PageId::SellerLandscape => "seller-landscape",
            PageId::StateLeaderboard => "state-leaderboard",
            PageId::SellerCorrelation => "seller-correlation",
            PageId::CategoryMomentum => "category-momentum",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PageId::TopCategories => "Top Product Categories: Revenue & Avg Price",
            PageId::OrdersOverTime => "Orders & Revenue Over Time",
            PageId::DeliveryPerformance => "Delivery Performance",
            PageId::ActivityHeatmap => "Time Heatmap: When Orders Happen",
            PageId::SellerLandscape => "Seller Landscape",
            PageId::StateLeaderboard => "Top Seller Leaderboard by State",
            PageId::SellerCorrelation => "Seller Count vs Revenue Correlation",
            PageId::CategoryMomentum => "Top Categories Momentum Matrix",
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl From<PageArg> for PageId {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::TopCategories => PageId::TopCategories,
            PageArg::OrdersOverTime => PageId::OrdersOverTime,
            PageArg::DeliveryPerformance => PageId::DeliveryPerformance,
            PageArg::ActivityHeatmap => PageId::ActivityHeatmap,
            PageArg::SellerLandscape => PageId::SellerLandscape,
            PageArg::StateLeaderboard => PageId::StateLeaderboard,
            PageArg::SellerCorrelation => PageId::SellerCorrelation,
            PageArg::CategoryMomentum => PageId::CategoryMomentum,
        }
    }
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
            GranularityArg::Quarter => Granularity::Quarter,
            GranularityArg::Year => Granularity::Year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeatmapMetric {
    #[default]
    OrderCount,
    Revenue,
    AverageOrderValue,
}

impl From<HeatmapMetricArg> for HeatmapMetric {
    fn from(arg: HeatmapMetricArg) -> Self {
        match arg {
            HeatmapMetricArg::OrderCount => HeatmapMetric::OrderCount,
            HeatmapMetricArg::Revenue => HeatmapMetric::Revenue,
            HeatmapMetricArg::AverageOrderValue => HeatmapMetric::AverageOrderValue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankMetric {
    #[default]
    Revenue,
    Orders,
    AvgOrderValue,
    NumberOfSellers,
}

impl RankMetric {
    /// Output column the metric reads.
    pub fn column(&self) -> &'static str {
        match self {
            RankMetric::Revenue => "revenue",
            RankMetric::Orders => "orders",
            RankMetric::AvgOrderValue => "avg_order_value",
            RankMetric::NumberOfSellers => "number_of_sellers",
        }
    }
}

impl From<RankMetricArg> for RankMetric {
    fn from(arg: RankMetricArg) -> Self {
        match arg {
            RankMetricArg::Revenue => RankMetric::Revenue,
            RankMetricArg::Orders => RankMetric::Orders,
            RankMetricArg::AvgOrderValue => RankMetric::AvgOrderValue,
            RankMetricArg::NumberOfSellers => RankMetric::NumberOfSellers,
        }
    }
}

/// User-selected parameters shared by all pages. Each page reads the ones it understands and
/// applies its own defaults to the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct PageParams {
    pub granularity: Option<Granularity>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub top_n: Option<usize>,
    pub states: Vec<String>,
    pub min_orders: Option<usize>,
    /// `None` keeps every status
    pub status: Option<String>,
    pub heatmap_metric: HeatmapMetric,
    pub rank_by: RankMetric,
    pub max_states: Option<usize>,
    pub min_active_sellers: Option<usize>,
    pub rolling: Option<usize>,
    pub dense: bool,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            granularity: None,
            start: None,
            end: None,
            top_n: None,
            states: Vec::new(),
            min_orders: None,
            status: Some("delivered".to_string()),
            heatmap_metric: HeatmapMetric::default(),
            rank_by: RankMetric::default(),
            max_states: None,
            min_active_sellers: None,
            rolling: None,
            dense: false,
        }
    }
}

fn status_filter(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn positive(name: &str, value: Option<usize>) -> Result<Option<usize>> {
    match value {
        Some(0) => Err(DashboardError::invalid_parameter(name, "must be at least 1")),
        other => Ok(other),
    }
}

impl PageParams {
    /// Build parameters from CLI args and config, with CLI args taking precedence.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let start = args.start.as_deref().map(|s| parse_date("start", s)).transpose()?;
        let end = args.end.as_deref().map(|s| parse_date("end", s)).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            DateRange::new(start, end)?;
        }

        let status = args
            .status
            .as_deref()
            .unwrap_or(config.pages.status_filter.as_str());

        Ok(Self {
            granularity: args.granularity.map(Granularity::from),
            start,
            end,
            top_n: positive("top-n", args.top_n)?,
            states: args.states.iter().map(|s| s.trim().to_uppercase()).collect(),
            min_orders: args.min_orders,
            status: status_filter(status),
            heatmap_metric: args.metric.map(HeatmapMetric::from).unwrap_or_default(),
            rank_by: args.rank_by.map(RankMetric::from).unwrap_or_default(),
            max_states: positive("max-states", args.max_states)?,
            min_active_sellers: args.min_active_sellers,
            rolling: positive("rolling", args.rolling)?,
            dense: args.dense,
        })
    }

    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// The explicitly selected range, if both ends were given.
    pub fn date_range(&self) -> Result<Option<DateRange>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::new(start, end).map(Some),
            _ => Ok(None),
        }
    }

    /// The selected range with missing ends taken from `bounds` (the data's first and last day).
    pub fn date_range_within(&self, bounds: Option<(NaiveDate, NaiveDate)>) -> Result<Option<DateRange>> {
        let start = self.start.or(bounds.map(|b| b.0));
        let end = self.end.or(bounds.map(|b| b.1));
        match (start, end) {
            (Some(start), Some(end)) => DateRange::new(start, end).map(Some),
            _ => Ok(None),
        }
    }
}

/// Everything a page needs besides its parameters.
pub struct PageContext<'a> {
    pub tables: &'a dyn TableProvider,
    pub config: &'a AppConfig,
}

impl<'a> PageContext<'a> {
    pub fn new(tables: &'a dyn TableProvider, config: &'a AppConfig) -> Self {
        Self { tables, config }
    }

    pub fn views(&self) -> BaseViews<'a> {
        BaseViews::new(self.tables, &self.config.data.timestamp_format)
    }

    pub fn rounding(&self) -> RoundingPolicy {
        RoundingPolicy::from(&self.config.presentation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(Option<f64>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetric {
    pub label: String,
    pub value: MetricValue,
    #[serde(skip)]
    kind: ValueKind,
    #[serde(skip)]
    decimals: Option<u32>,
}

impl SummaryMetric {
    /// A rounded number. `None` is reported as undefined.
    pub fn number(label: impl Into<String>, value: Option<f64>, kind: ValueKind, policy: &RoundingPolicy) -> Self {
        Self {
            label: label.into(),
            value: MetricValue::Number(value.map(|v| policy.apply(kind, v))),
            kind,
            decimals: policy.decimals(kind),
        }
    }

    pub fn text(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: MetricValue::Text(value.into()),
            kind: ValueKind::Raw,
            decimals: None,
        }
    }

    pub fn display_value(&self) -> String {
        match &self.value {
            MetricValue::Text(s) => s.clone(),
            MetricValue::Number(None) => "undefined".to_string(),
            MetricValue::Number(Some(v)) => {
                let body = match self.decimals {
                    Some(d) => format!("{:.*}", d as usize, v),
                    None => v.to_string(),
                };
                if self.kind == ValueKind::Percent {
                    format!("{}%", body)
                } else {
                    body
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub name: String,
    pub table: AggregateTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub page: PageId,
    pub title: String,
    pub caption: String,
    pub summary: Vec<SummaryMetric>,
    /// Finalized tables; the first is the one exported
    pub tables: Vec<ReportTable>,
    pub notes: Vec<String>,
}

impl PageReport {
    pub fn new(page: PageId, caption: impl Into<String>) -> Self {
        Self {
            page,
            title: page.title().to_string(),
            caption: caption.into(),
            summary: Vec::new(),
            tables: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn metric(mut self, metric: SummaryMetric) -> Self {
        self.summary.push(metric);
        self
    }

    pub fn table(mut self, name: impl Into<String>, table: AggregateTable) -> Self {
        self.tables.push(ReportTable {
            name: name.into(),
            table,
        });
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn primary_table(&self) -> Option<&AggregateTable> {
        self.tables.first().map(|t| &t.table)
    }

    pub fn get_table(&self, name: &str) -> Option<&AggregateTable> {
        self.tables.iter().find(|t| t.name == name).map(|t| &t.table)
    }

    pub fn get_metric(&self, label: &str) -> Option<&MetricValue> {
        self.summary.iter().find(|m| m.label == label).map(|m| &m.value)
    }

    pub fn view(&self, policy: &RoundingPolicy) -> ReportView {
        ReportView {
            page: self.page,
            title: self.title.clone(),
            caption: self.caption.clone(),
            summary: self.summary.clone(),
            tables: self
                .tables
                .iter()
                .map(|t| TableView::new(t.name.clone(), &t.table, policy))
                .collect(),
            notes: self.notes.clone(),
        }
    }
}

/// Serializable report with tables converted for display.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub page: PageId,
    pub title: String,
    pub caption: String,
    pub summary: Vec<SummaryMetric>,
    pub tables: Vec<TableView>,
    pub notes: Vec<String>,
}

impl ReportView {
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title, self.caption);
        if !self.summary.is_empty() {
            out.push('\n');
            let width = self.summary.iter().map(|m| m.label.chars().count()).max().unwrap_or(0);
            for m in &self.summary {
                out.push_str(&format!("{:<width$}  {}\n", m.label, m.display_value(), width = width));
            }
        }
        for table in &self.tables {
            out.push_str(&format!("\n[{}]\n", table.name));
            out.push_str(&table.to_text());
        }
        for note in &self.notes {
            out.push_str(&format!("\nnote: {}\n", note));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Ready(PageReport),
    /// Filters left nothing to aggregate
    NoData { reason: String },
}

impl PageOutcome {
    pub fn no_data(reason: impl Into<String>) -> Self {
        PageOutcome::NoData {
            reason: reason.into(),
        }
    }

    pub fn report(&self) -> Option<&PageReport> {
        match self {
            PageOutcome::Ready(report) => Some(report),
            PageOutcome::NoData { .. } => None,
        }
    }
}

pub fn run_page(page: PageId, ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    info!(page = page.slug(), "running page");
    let outcome = match page {
        PageId::TopCategories => top_categories::run(ctx, params),
        PageId::OrdersOverTime => orders_over_time::run(ctx, params),
        PageId::DeliveryPerformance => delivery_performance::run(ctx, params),
        PageId::ActivityHeatmap => activity_heatmap::run(ctx, params),
        PageId::SellerLandscape => seller_landscape::run(ctx, params),
        PageId::StateLeaderboard => state_leaderboard::run(ctx, params),
        PageId::SellerCorrelation => seller_correlation::run(ctx, params),
        PageId::CategoryMomentum => category_momentum::run(ctx, params),
    }?;
    if let PageOutcome::NoData { reason } = &outcome {
        info!(page = page.slug(), reason = reason.as_str(), "no data");
    }
    Ok(outcome)
}
