use tracing::debug;

use crate::aggregate::Measure;
use crate::clean::MissingPolicy;
use crate::error::Result;
use crate::metrics::{linear_trend, mean, pearson_correlation, safe_div};
use crate::period::Granularity;
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

/// Per period: how many sellers were active and how much they sold, with the Pearson
/// correlation and least-squares trend of revenue against active sellers.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let granularity = params.granularity.unwrap_or(Granularity::Week);
    let rows = ctx.views().item_sales(MissingPolicy::ZeroFill, true)?;

    let table = Pipeline::new(Dimension::Period(granularity))
        .measure(Measure::count_distinct("active_sellers", columns::SELLER_ID))
        .measure(Measure::sum("revenue", columns::PRICE).with_kind(ValueKind::Currency))
        .measure(Measure::count_distinct("orders", columns::ORDER_ID))
        .measure(Measure::count("items", columns::ORDER_ID))
        .with_filters(
            Filters::new()
                .with_date_range(params.date_range()?)
                .with_status(params.status.clone())
                .require(columns::SELLER_ID),
        )
        .run(rows)?;

    let min_active = params.min_active_sellers.unwrap_or(1) as f64;
    let table = table
        .retain(|r| r.value("active_sellers").is_some_and(|n| n >= min_active))
        .with_derived("revenue_per_seller", ValueKind::Currency, |r| {
            Some(safe_div(r.value("revenue")?, r.value("active_sellers")?))
        });
    if table.is_empty() {
        return Ok(PageOutcome::no_data("No periods with enough active sellers for the selected filters."));
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = table
        .iter()
        .filter_map(|r| Some((r.value("active_sellers")?, r.value("revenue")?)))
        .unzip();
    let correlation = pearson_correlation(&xs, &ys);
    let trend = linear_trend(&xs, &ys);
    debug!(periods = xs.len(), ?correlation, "seller correlation");

    let table = table.with_derived("trend_revenue", ValueKind::Currency, |r| {
        Some(trend?.at(r.value("active_sellers")?))
    });

    let total_revenue = table.total("revenue")?;
    let per_seller: Vec<f64> = table.values("revenue_per_seller")?.into_iter().flatten().collect();
    let policy = ctx.rounding();
    let mut report = PageReport::new(
        PageId::SellerCorrelation,
        format!("{} active sellers (distinct seller id) against revenue", granularity),
    )
    .metric(SummaryMetric::number("Periods", Some(table.len() as f64), ValueKind::Count, &policy))
    .metric(SummaryMetric::number("Pearson correlation", correlation, ValueKind::Score, &policy))
    .metric(SummaryMetric::number("Trend slope", trend.map(|t| t.slope), ValueKind::Currency, &policy))
    .metric(SummaryMetric::number(
        "Trend intercept",
        trend.map(|t| t.intercept),
        ValueKind::Currency,
        &policy,
    ))
    .metric(SummaryMetric::number("Total revenue", Some(total_revenue), ValueKind::Currency, &policy))
    .metric(SummaryMetric::number(
        "Avg revenue per seller",
        mean(&per_seller),
        ValueKind::Currency,
        &policy,
    ));
    if correlation.is_none() {
        report = report.note("Correlation is undefined: it needs at least two periods and variation in both series.");
    }
    let report = report.table("periods", finalize(table, &FinalizeOptions::by_keys(), &policy)?);

    Ok(PageOutcome::Ready(report))
}
