use crate::aggregate::{GapFill, KeyValue, Measure};
use crate::error::Result;
use crate::period::weekday_name;
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{HeatmapMetric, PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

fn measure(metric: HeatmapMetric) -> Measure {
    match metric {
        HeatmapMetric::OrderCount => Measure::count_distinct("order_count", columns::ORDER_ID),
        HeatmapMetric::Revenue => {
            Measure::sum("revenue", columns::ORDER_VALUE).with_kind(ValueKind::Currency)
        }
        HeatmapMetric::AverageOrderValue => {
            Measure::mean("average_order_value", columns::ORDER_VALUE).with_kind(ValueKind::Currency)
        }
    }
}

/// The full 7 x 24 grid of purchase weekday and hour, empty slots as zero.
fn grid() -> Vec<Vec<KeyValue>> {
    (0..7)
        .flat_map(|d| (0..24).map(move |h| vec![KeyValue::Weekday(d), KeyValue::Integer(h)]))
        .collect()
}

pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let measure = measure(params.heatmap_metric);
    let name = measure.name.clone();
    let kind = measure.kind;

    let pipeline = Pipeline::new(Dimension::WeekdayHour).measure(measure).with_filters(
        Filters::new()
            .with_status(params.status.clone())
            .with_date_range(params.date_range()?),
    );
    let rows = pipeline.filter(ctx.views().order_values()?)?;
    if rows.height() == 0 {
        return Ok(PageOutcome::no_data("No orders match the selected filters."));
    }
    let included = rows.height();
    let table = pipeline.run(rows)?.densify(&grid(), GapFill::Zero);

    // first maximum in (weekday, hour) order
    let peak = table
        .iter()
        .filter_map(|r| r.value(&name).map(|v| (r, v)))
        .fold(None, |best: Option<(_, f64)>, (r, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((r, v)),
        });
    let busiest = peak
        .and_then(|(r, _)| match r.keys() {
            [KeyValue::Weekday(d), KeyValue::Integer(h)] => Some(format!("{} @ {:02}:00", weekday_name(*d), h)),
            _ => None,
        })
        .unwrap_or_else(|| "-".to_string());
    let peak_value = peak.map(|(_, v)| v);

    let policy = ctx.rounding();
    let report = PageReport::new(
        PageId::ActivityHeatmap,
        format!("{} by purchase weekday and hour", name.replace('_', " ")),
    )
    .metric(SummaryMetric::number("Rows included", Some(included as f64), ValueKind::Count, &policy))
    .metric(SummaryMetric::text("Busiest slot", busiest))
    .metric(SummaryMetric::number("Peak value", peak_value, kind, &policy))
    .table("grid", finalize(table, &FinalizeOptions::by_keys(), &policy)?);

    Ok(PageOutcome::Ready(report))
}
