use crate::aggregate::{AggregateRow, AggregateTable, ColumnSpec, GroupKey, KeyValue, Measure};
use crate::clean::MissingPolicy;
use crate::error::Result;
use crate::metrics::{share_of_total, with_share_of_total};
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::{finalize, select_top, FinalizeOptions, ValueKind};
use crate::tables::columns;

use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

/// Revenue, average price and item count per category, with each category's share of the
/// revenue of all categories. Items whose price is malformed are left out entirely.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let rows = ctx.views().item_sales(MissingPolicy::Exclude, false)?;
    let filters = Filters::new()
        .with_date_range(params.date_range()?)
        .require(columns::PRICE);

    let table = Pipeline::new(Dimension::Category)
        .measure(Measure::sum("revenue", columns::PRICE).with_kind(ValueKind::Currency))
        .measure(Measure::mean("avg_price", columns::PRICE).with_kind(ValueKind::Currency))
        .measure(Measure::count("items", columns::PRICE))
        .with_filters(filters)
        .run(rows)?;
    if table.is_empty() {
        return Ok(PageOutcome::no_data("No priced order items in the selected range."));
    }

    let total = table.total("revenue")?;
    let table = with_share_of_total(table, "revenue", "revenue_share")?;

    let top_n = params.top_n.unwrap_or(ctx.config.pages.top_categories);
    let options = FinalizeOptions::by_measure("revenue").top_n(Some(top_n));
    let top = select_top(table, &options)?;
    let top_revenue = top.total("revenue")?;
    let rest_revenue = (total - top_revenue).max(0.0);

    let split_row = |segment: &str, revenue: f64| AggregateRow {
        keys: vec![KeyValue::Text(segment.to_string())],
        values: vec![Some(revenue), Some(share_of_total(revenue, total))],
    };
    let split = AggregateTable::new(
        vec![GroupKey::text("segment")],
        vec![
            ColumnSpec {
                name: "revenue".into(),
                kind: ValueKind::Currency,
                reduction: None,
            },
            ColumnSpec {
                name: "share".into(),
                kind: ValueKind::Percent,
                reduction: None,
            },
        ],
        vec![
            split_row(&format!("top {}", top.len()), top_revenue),
            split_row("rest", rest_revenue),
        ],
    );

    let policy = ctx.rounding();
    let report = PageReport::new(
        PageId::TopCategories,
        "Revenue is the sum of item prices; shares are of total revenue across all categories.",
    )
    .metric(SummaryMetric::number(
        format!("Top {} revenue", top.len()),
        Some(top_revenue),
        ValueKind::Currency,
        &policy,
    ))
    .metric(SummaryMetric::number("Total revenue", Some(total), ValueKind::Currency, &policy))
    .metric(SummaryMetric::number(
        "Top share of total",
        Some(share_of_total(top_revenue, total)),
        ValueKind::Percent,
        &policy,
    ))
    .metric(SummaryMetric::number("Rest revenue", Some(rest_revenue), ValueKind::Currency, &policy))
    .table("categories", finalize(top, &options, &policy)?)
    .table("revenue_split", finalize(split, &FinalizeOptions::by_keys(), &policy)?);

    Ok(PageOutcome::Ready(report))
}
