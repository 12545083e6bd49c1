use chrono::Days;
use std::collections::HashMap;

use crate::aggregate::{GapFill, KeyValue, Measure};
use crate::datasets::purchase_day_bounds;
use crate::error::Result;
use crate::metrics::{growth, rolling_mean};
use crate::period::{bin, Granularity};
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

/// Distinct orders and revenue per calendar period. Orders without items count with zero
/// revenue.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let granularity = params.granularity.unwrap_or(Granularity::Month);
    let rows = ctx.views().order_values()?;
    let range = params.date_range_within(purchase_day_bounds(&rows)?)?;

    let table = Pipeline::new(Dimension::Period(granularity))
        .measure(Measure::count_distinct("orders", columns::ORDER_ID))
        .measure(Measure::sum("revenue", columns::ORDER_VALUE).with_kind(ValueKind::Currency))
        .with_filters(Filters::new().with_date_range(range))
        .run(rows)?;
    if table.is_empty() {
        return Ok(PageOutcome::no_data("No orders in the selected range."));
    }

    let mut table = table;
    if params.dense {
        if let Some(range) = range {
            let expected: Vec<Vec<KeyValue>> = range
                .bins(granularity)?
                .into_iter()
                .map(|b| vec![KeyValue::Period(b)])
                .collect();
            table = table.densify(&expected, GapFill::Additive);
        }
    }

    // growth is against the calendar bin just before, whether or not it has a row
    let revenue_by_start: HashMap<_, f64> = table
        .iter()
        .filter_map(|r| Some((r.key(columns::PERIOD_START)?.as_period()?.start, r.value("revenue")?)))
        .collect();
    let table = table.with_derived("revenue_growth", ValueKind::Percent, |r| {
        let period = r.key(columns::PERIOD_START)?.as_period()?;
        let previous_start = bin(period.start - Days::new(1), granularity).start;
        let previous = revenue_by_start.get(&previous_start).copied().unwrap_or(0.0);
        growth(r.value("revenue")?, previous)
    });

    let table = match params.rolling {
        Some(window) => {
            let rolled = rolling_mean(&table.values("revenue")?, window);
            table.with_column_values("revenue_rolling", ValueKind::Currency, rolled)?
        }
        None => table,
    };

    let policy = ctx.rounding();
    let mut report = PageReport::new(
        PageId::OrdersOverTime,
        format!("{} orders (unique order id) and revenue (sum of item prices)", granularity),
    )
    .metric(SummaryMetric::number("Total orders", Some(table.total("orders")?), ValueKind::Count, &policy))
    .metric(SummaryMetric::number(
        "Total revenue",
        Some(table.total("revenue")?),
        ValueKind::Currency,
        &policy,
    ));
    if params.rolling.is_some() && !params.dense {
        report = report.note("Rolling mean runs over the listed periods; use --dense to include empty ones.");
    }
    let report = report.table("periods", finalize(table, &FinalizeOptions::by_keys(), &policy)?);

    Ok(PageOutcome::Ready(report))
}
