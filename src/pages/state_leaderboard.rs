use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::aggregate::{AggregateRow, AggregateTable, ColumnSpec, GroupKey, KeyValue};
use crate::error::Result;
use crate::presentation::{finalize, select_top, sort_rows, FinalizeOptions, SortKey, ValueKind};
use crate::tables::columns;

use super::sellers::seller_statistics;
use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, RankMetric, SummaryMetric};

const CARRIED: [&str; 7] = [
    "orders",
    "items",
    "revenue",
    "avg_order_value",
    "freight_ratio_pct",
    "lat",
    "lng",
];

/// The top seller of each state, ranked across states by the chosen metric and placed at
/// the state's centroid.
pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let stats = seller_statistics(ctx, params, true)?;
    if stats.is_empty() {
        return Ok(PageOutcome::no_data("No seller sales match the selected filters."));
    }
    let min_orders = params.min_orders.unwrap_or(1) as f64;
    let mut stats = stats.retain(|r| r.value("orders").is_some_and(|o| o >= min_orders));
    if stats.is_empty() {
        return Ok(PageOutcome::no_data("No sellers match the minimum orders filter."));
    }

    let mut sellers_per_state: BTreeMap<KeyValue, f64> = BTreeMap::new();
    for row in stats.iter() {
        if let Some(state) = row.key(columns::SELLER_STATE) {
            *sellers_per_state.entry(state.clone()).or_insert(0.0) += 1.0;
        }
    }

    // ranking by seller count still needs a seller to show: pick the top earner
    let pick = match params.rank_by {
        RankMetric::NumberOfSellers => RankMetric::Revenue,
        other => other,
    };
    sort_rows(&mut stats, &SortKey::Measure(pick.column().to_string()), false)?;

    let mut columns_out = vec![ColumnSpec {
        name: "number_of_sellers".into(),
        kind: ValueKind::Count,
        reduction: None,
    }];
    let mut carried_idx = Vec::with_capacity(CARRIED.len());
    for name in CARRIED {
        let idx = stats.column_index(name)?;
        carried_idx.push(idx);
        columns_out.push(stats.columns()[idx].clone());
    }

    let mut seen = HashSet::new();
    let mut leaders = Vec::new();
    for row in stats.iter() {
        let (Some(seller), Some(state)) = (row.key(columns::SELLER_ID), row.key(columns::SELLER_STATE)) else {
            continue;
        };
        if !seen.insert(state.clone()) {
            continue;
        }
        let mut values = vec![sellers_per_state.get(state).copied()];
        values.extend(carried_idx.iter().map(|&i| row.value_at(i)));
        leaders.push(AggregateRow {
            keys: vec![state.clone(), seller.clone()],
            values,
        });
    }

    let leaders = AggregateTable::new(
        vec![GroupKey::text(columns::SELLER_STATE), GroupKey::text(columns::SELLER_ID)],
        columns_out,
        leaders,
    );
    let max_states = params.max_states.unwrap_or(leaders.len());
    let options = FinalizeOptions::by_measure(params.rank_by.column()).top_n(Some(max_states));
    let ranked = select_top(leaders, &options)?;

    let before = ranked.len();
    let mapped = ranked.retain(|r| r.value("lat").is_some() && r.value("lng").is_some());
    let unmapped = before - mapped.len();
    if unmapped > 0 {
        warn!(states = unmapped, "dropped states without centroid coordinates");
    }
    if mapped.is_empty() {
        return Ok(PageOutcome::no_data("Could not map the selected states (missing centroid coordinates)."));
    }

    let policy = ctx.rounding();
    let mut report = PageReport::new(PageId::StateLeaderboard, "Top seller in each state after your filters.")
        .metric(SummaryMetric::number("States shown", Some(mapped.len() as f64), ValueKind::Count, &policy))
        .metric(SummaryMetric::text("Top seller metric", params.rank_by.column()))
        .metric(SummaryMetric::number(
            "Combined revenue",
            Some(mapped.total("revenue")?),
            ValueKind::Currency,
            &policy,
        ));
    if unmapped > 0 {
        report = report.note(format!("{} state(s) without centroid coordinates were left out.", unmapped));
    }
    let report = report.table("leaderboard", finalize(mapped, &options, &policy)?);

    Ok(PageOutcome::Ready(report))
}
