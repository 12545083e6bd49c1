use chrono::Months;
use tracing::debug;

use crate::aggregate::Measure;
use crate::clean::MissingPolicy;
use crate::datasets::purchase_day_bounds;
use crate::error::Result;
use crate::metrics::{growth, median, with_previous_value, with_share_of_total};
use crate::period::DateRange;
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, select_top, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

fn category_pipeline(range: DateRange, params: &PageParams) -> Pipeline {
    Pipeline::new(Dimension::Category)
        .measure(Measure::sum("revenue", columns::PRICE).with_kind(ValueKind::Currency))
        .measure(Measure::count_distinct("orders", columns::ORDER_ID))
        .measure(Measure::count("items", columns::ORDER_ID))
        .measure(Measure::mean("avg_item_price", columns::PRICE).with_kind(ValueKind::Currency))
        .with_filters(
            Filters::new()
                .with_date_range(Some(range))
                .with_status(params.status.clone()),
        )
}

/// Category revenue in the selected window against the equal-length window just before it.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let rows = ctx.views().item_sales(MissingPolicy::ZeroFill, true)?;
    let Some((first_day, last_day)) = purchase_day_bounds(&rows)? else {
        return Ok(PageOutcome::no_data("No purchases with a valid timestamp."));
    };

    let current = if params.start.is_some() || params.end.is_some() {
        params.date_range_within(Some((first_day, last_day)))?
    } else {
        let months = Months::new(ctx.config.pages.momentum_default_months);
        let start = last_day
            .checked_sub_months(months)
            .map_or(first_day, |d| d.max(first_day));
        Some(DateRange::new(start, last_day)?)
    };
    let Some(current) = current else {
        return Ok(PageOutcome::no_data("No purchases with a valid timestamp."));
    };
    let previous = current.previous();
    if previous.start() < first_day {
        return Ok(PageOutcome::no_data(format!(
            "Not enough history: the comparison window {} starts before the first purchase on {}.",
            previous, first_day
        )));
    }
    debug!(%current, %previous, "momentum windows");

    let now = category_pipeline(current, params).run(rows.clone())?;
    if now.is_empty() {
        return Ok(PageOutcome::no_data("No sales in the selected range."));
    }
    let before = category_pipeline(previous, params).run(rows)?;

    let top_n = params.top_n.unwrap_or(ctx.config.pages.momentum_categories);
    let min_orders = params.min_orders.unwrap_or(ctx.config.pages.momentum_min_orders) as f64;
    let options = FinalizeOptions::by_measure("revenue").top_n(Some(top_n));
    let shown = select_top(with_share_of_total(now, "revenue", "revenue_share")?, &options)?
        .retain(|r| r.value("orders").is_some_and(|o| o >= min_orders));
    if shown.is_empty() {
        return Ok(PageOutcome::no_data("No categories meet the minimum orders filter."));
    }

    let comparison = with_previous_value(shown, &before, "revenue", "prev_revenue", ValueKind::Currency)?
        .with_derived("growth_pct", ValueKind::Percent, |r| {
            growth(r.value("revenue")?, r.value("prev_revenue")?)
        });
    let chart = comparison.clone().retain(|r| r.value("growth_pct").is_some());
    let excluded = comparison.len() - chart.len();

    let growths: Vec<f64> = chart.values("growth_pct")?.into_iter().flatten().collect();
    let growing = if growths.is_empty() {
        None
    } else {
        let up = growths.iter().filter(|g| **g > 0.0).count();
        Some(up as f64 / growths.len() as f64 * 100.0)
    };

    let policy = ctx.rounding();
    let mut report = PageReport::new(
        PageId::CategoryMomentum,
        format!(
            "Selected range: {} | Compared against: {} (the {} days before)",
            current,
            previous,
            current.days()
        ),
    )
    .metric(SummaryMetric::number("Categories shown", Some(chart.len() as f64), ValueKind::Count, &policy))
    .metric(SummaryMetric::number(
        "Selected-range revenue",
        Some(chart.total("revenue")?),
        ValueKind::Currency,
        &policy,
    ))
    .metric(SummaryMetric::number("Median growth", median(&growths), ValueKind::Percent, &policy))
    .metric(SummaryMetric::number("Categories growing", growing, ValueKind::Percent, &policy))
    .metric(SummaryMetric::number(
        "Excluded (no prior revenue)",
        Some(excluded as f64),
        ValueKind::Count,
        &policy,
    ));
    if excluded > 0 {
        report = report.note(format!(
            "{} categor{} had no revenue in the comparison window; growth is undefined and left out of the chart.",
            excluded,
            if excluded == 1 { "y" } else { "ies" }
        ));
    }
    if chart.is_empty() {
        report = report.note("No category has revenue in both windows.");
    }
    let report = report
        .table("comparison", finalize(comparison, &options, &policy)?)
        .table("chart", finalize(chart, &FinalizeOptions::by_measure("growth_pct"), &policy)?);

    Ok(PageOutcome::Ready(report))
}
