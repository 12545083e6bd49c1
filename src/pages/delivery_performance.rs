use crate::aggregate::Measure;
use crate::error::{DashboardError, Result};
use crate::metrics::ratio;
use crate::period::Granularity;
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

/// On-time and late deliveries per period. An order is late when it was delivered after its
/// estimated date; orders missing either date are not counted.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let granularity = params.granularity.unwrap_or(Granularity::Quarter);
    if granularity == Granularity::Week {
        return Err(DashboardError::invalid_parameter(
            "granularity",
            "delivery performance is reported by month, quarter or year",
        ));
    }

    let rows = ctx.views().order_values()?;
    let table = Pipeline::new(Dimension::Period(granularity))
        .measure(Measure::sum("late_orders", columns::LATE).with_kind(ValueKind::Count))
        .measure(Measure::count("known_orders", columns::LATE))
        .with_filters(Filters::new().with_date_range(params.date_range()?).require(columns::LATE))
        .run(rows)?;
    if table.is_empty() {
        return Ok(PageOutcome::no_data("No orders with known delivery dates in the selected range."));
    }

    let table = table
        .with_derived("on_time_orders", ValueKind::Count, |r| {
            Some(r.value("known_orders")? - r.value("late_orders")?)
        })
        .with_derived("late_percentage", ValueKind::Percent, |r| {
            Some(ratio(r.value("late_orders")?, r.value("known_orders")?))
        });

    let late = table.total("late_orders")?;
    let known = table.total("known_orders")?;

    let policy = ctx.rounding();
    let report = PageReport::new(
        PageId::DeliveryPerformance,
        format!("Late share of delivered orders per {}", granularity),
    )
    .metric(SummaryMetric::number("On time orders", Some(known - late), ValueKind::Count, &policy))
    .metric(SummaryMetric::number("Late orders", Some(late), ValueKind::Count, &policy))
    .metric(SummaryMetric::number("Late percentage", Some(ratio(late, known)), ValueKind::Percent, &policy))
    .table("periods", finalize(table, &FinalizeOptions::by_keys(), &policy)?);

    Ok(PageOutcome::Ready(report))
}
