use crate::error::Result;
use crate::metrics::mean;
use crate::presentation::{finalize, select_top, FinalizeOptions, ValueKind};

use super::sellers::seller_statistics;
use super::{PageContext, PageId, PageOutcome, PageParams, PageReport, SummaryMetric};

pub fn run(ctx: &PageContext<'_>, params: &PageParams) -> Result<PageOutcome> {
    let stats = seller_statistics(ctx, params, false)?;
    if stats.is_empty() {
        return Ok(PageOutcome::no_data("No seller sales match the selected filters."));
    }

    let top_n = params.top_n.unwrap_or(ctx.config.pages.top_sellers);
    let options = FinalizeOptions::by_measure("revenue").top_n(Some(top_n));
    let shown = select_top(stats, &options)?;

    let ratios: Vec<f64> = shown.values("freight_ratio_pct")?.into_iter().flatten().collect();
    let mean_ratio = mean(&ratios);

    let policy = ctx.rounding();
    let report = PageReport::new(
        PageId::SellerLandscape,
        "Top sellers by revenue; freight ratio is freight as a percentage of revenue.",
    )
    .metric(SummaryMetric::number("Sellers shown", Some(shown.len() as f64), ValueKind::Count, &policy))
    .metric(SummaryMetric::number(
        "Total seller revenue",
        Some(shown.total("revenue")?),
        ValueKind::Currency,
        &policy,
    ))
    .metric(SummaryMetric::number("Avg freight ratio", mean_ratio, ValueKind::Percent, &policy))
    .table("sellers", finalize(shown, &options, &policy)?);

    Ok(PageOutcome::Ready(report))
}
