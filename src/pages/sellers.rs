//! Per-seller statistics shared by the seller landscape and the state leaderboard.

use crate::aggregate::{AggregateTable, Measure};
use crate::clean::MissingPolicy;
use crate::error::Result;
use crate::join::left_join;
use crate::metrics::{ratio, safe_div};
use crate::pipeline::{Dimension, Filters, Pipeline};
use crate::presentation::ValueKind;
use crate::tables::{columns, TableName};

use super::{PageContext, PageParams};

/// Orders, items, revenue, freight, average order value and freight ratio per seller, over
/// item sales with zero-filled prices and freight. Sellers without a known state are left out.
///
/// With `centroids`, each seller also carries its state's mean `lat` / `lng`, missing when
/// the state has no geolocation points.
pub(super) fn seller_statistics(ctx: &PageContext<'_>, params: &PageParams, centroids: bool) -> Result<AggregateTable> {
    let views = ctx.views();
    let mut rows = views.item_sales(MissingPolicy::ZeroFill, true)?;

    let mut pipeline = Pipeline::new(Dimension::Seller)
        .measure(Measure::count_distinct("orders", columns::ORDER_ID))
        .measure(Measure::count("items", columns::ORDER_ID))
        .measure(Measure::sum("revenue", columns::PRICE).with_kind(ValueKind::Currency))
        .measure(Measure::sum("freight", columns::FREIGHT).with_kind(ValueKind::Currency));
    if centroids {
        rows = left_join(rows, &views.state_centroids()?, columns::SELLER_STATE, TableName::Geolocation.id())?;
        pipeline = pipeline
            .measure(Measure::mean("lat", columns::GEO_LAT))
            .measure(Measure::mean("lng", columns::GEO_LNG));
    }

    let filters = Filters::new()
        .with_date_range(params.date_range()?)
        .with_status(params.status.clone())
        .with_states(params.states.clone())
        .require(columns::SELLER_ID)
        .require(columns::SELLER_STATE);

    let table = pipeline
        .with_filters(filters)
        .run(rows)?
        .with_derived("avg_order_value", ValueKind::Currency, |r| {
            Some(safe_div(r.value("revenue")?, r.value("orders")?))
        })
        .with_derived("freight_ratio_pct", ValueKind::Percent, |r| {
            Some(ratio(r.value("freight")?, r.value("revenue")?))
        });
    Ok(table)
}
