//! One parameterized filter → annotate → aggregate pass over a base view.
//!
//! Pages differ only in the [`Dimension`], the [`Measure`] list and the [`Filters`] they
//! configure here.

use polars::prelude::*;
use tracing::debug;

use crate::aggregate::{aggregate, AggregateTable, GroupKey, Measure};
use crate::error::Result;
use crate::period::{annotate, DateRange, Granularity};
use crate::source::ensure_columns;
use crate::tables::columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Category,
    /// Seller id together with the seller's state
    Seller,
    SellerState,
    Period(Granularity),
    WeekdayHour,
}

impl Dimension {
    pub fn keys(&self) -> Vec<GroupKey> {
        match self {
            Dimension::Category => vec![GroupKey::text(columns::CATEGORY)],
            Dimension::Seller => vec![
                GroupKey::text(columns::SELLER_ID),
                GroupKey::text(columns::SELLER_STATE),
            ],
            Dimension::SellerState => vec![GroupKey::text(columns::SELLER_STATE)],
            Dimension::Period(g) => vec![GroupKey::period(*g)],
            Dimension::WeekdayHour => vec![GroupKey::weekday(), GroupKey::hour()],
        }
    }

    fn time_keys(&self) -> Option<Option<Granularity>> {
        match self {
            Dimension::Period(g) => Some(Some(*g)),
            Dimension::WeekdayHour => Some(None),
            _ => None,
        }
    }
}

/// Row predicates applied before grouping. Empty filters keep every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    /// Inclusive calendar days on the timestamp column
    pub date_range: Option<DateRange>,
    /// Exact order status
    pub status: Option<String>,
    /// Seller state membership
    pub states: Vec<String>,
    /// Columns that must not be missing
    pub require: Vec<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, range: Option<DateRange>) -> Self {
        self.date_range = range;
        self
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn with_states(mut self, states: Vec<String>) -> Self {
        self.states = states;
        self
    }

    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.require.push(column.into());
        self
    }

    fn predicates(&self, timestamp: &str) -> Vec<Expr> {
        let mut predicates = Vec::new();
        if let Some(range) = &self.date_range {
            let micros = col(timestamp).cast(DataType::Int64);
            predicates.push(
                micros
                    .clone()
                    .gt_eq(lit(range.start_micros()))
                    .and(micros.lt(lit(range.end_exclusive_micros()))),
            );
        }
        if let Some(status) = &self.status {
            predicates.push(col(columns::ORDER_STATUS).eq(lit(status.clone())));
        }
        if let Some(any_state) = self
            .states
            .iter()
            .map(|s| col(columns::SELLER_STATE).eq(lit(s.clone())))
            .reduce(|a, b| a.or(b))
        {
            predicates.push(any_state);
        }
        for column in &self.require {
            predicates.push(col(column.as_str()).is_not_null());
        }
        predicates
    }

    fn required_columns<'a>(&'a self, timestamp: &'a str) -> Vec<&'a str> {
        let mut needed = Vec::new();
        if self.date_range.is_some() {
            needed.push(timestamp);
        }
        if self.status.is_some() {
            needed.push(columns::ORDER_STATUS);
        }
        if !self.states.is_empty() {
            needed.push(columns::SELLER_STATE);
        }
        needed.extend(self.require.iter().map(String::as_str));
        needed
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    dimension: Dimension,
    measures: Vec<Measure>,
    filters: Filters,
    timestamp: String,
}

impl Pipeline {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            measures: Vec::new(),
            filters: Filters::default(),
            timestamp: columns::PURCHASE_TS.to_string(),
        }
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Timestamp used for the date range and time keys (default: purchase time).
    pub fn timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp = column.into();
        self
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn filter(&self, base: DataFrame) -> Result<DataFrame> {
        ensure_columns(&base, "base view", &self.filters.required_columns(&self.timestamp))?;
        let Some(predicate) = self
            .filters
            .predicates(&self.timestamp)
            .into_iter()
            .reduce(|a, b| a.and(b))
        else {
            return Ok(base);
        };
        let before = base.height();
        let out = base.lazy().filter(predicate).collect()?;
        debug!(before, after = out.height(), "filtered");
        Ok(out)
    }

    pub fn run(&self, base: DataFrame) -> Result<AggregateTable> {
        let mut rows = self.filter(base)?;
        if let Some(granularity) = self.dimension.time_keys() {
            rows = annotate(rows, &self.timestamp, granularity)?;
        }
        aggregate(&rows, &self.dimension.keys(), &self.measures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::KeyValue;
    use chrono::NaiveDate;

    fn micros(y: i32, m: u32, d: u32, h: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }

    fn base() -> DataFrame {
        df!(
            columns::ORDER_STATUS => &["delivered", "delivered", "canceled", "delivered"],
            columns::SELLER_STATE => &[Some("SP"), Some("RJ"), Some("SP"), None],
            columns::CATEGORY => &["toys", "toys", "books", "books"],
            columns::PRICE => &[10.0, 20.0, 40.0, 80.0],
            columns::PURCHASE_TS => &[
                micros(2018, 1, 31, 23),
                micros(2018, 2, 1, 0),
                micros(2018, 2, 15, 12),
                micros(2018, 3, 1, 9),
            ]
        )
        .unwrap()
        .lazy()
        .with_column(col(columns::PURCHASE_TS).cast(DataType::Datetime(TimeUnit::Microseconds, None)))
        .collect()
        .unwrap()
    }

    fn revenue() -> Measure {
        Measure::sum("revenue", columns::PRICE)
    }

    #[test]
    fn test_date_range_is_inclusive_of_whole_days() {
        let range = DateRange::parse("2018-02-01", "2018-02-28").unwrap();
        let p = Pipeline::new(Dimension::Category).with_filters(Filters::new().with_date_range(Some(range)));
        assert_eq!(p.filter(base()).unwrap().height(), 2);

        let jan = DateRange::parse("2018-01-31", "2018-01-31").unwrap();
        let p = Pipeline::new(Dimension::Category).with_filters(Filters::new().with_date_range(Some(jan)));
        assert_eq!(p.filter(base()).unwrap().height(), 1);
    }

    #[test]
    fn test_status_states_and_required() {
        let filters = Filters::new()
            .with_status(Some("delivered".into()))
            .with_states(vec!["SP".into(), "RJ".into()]);
        let p = Pipeline::new(Dimension::Category).with_filters(filters);
        assert_eq!(p.filter(base()).unwrap().height(), 2);

        let p = Pipeline::new(Dimension::Category).with_filters(Filters::new().require(columns::SELLER_STATE));
        assert_eq!(p.filter(base()).unwrap().height(), 3);
    }

    #[test]
    fn test_run_by_month() {
        let table = Pipeline::new(Dimension::Period(Granularity::Month))
            .measure(revenue())
            .run(base())
            .unwrap();
        let labels: Vec<String> = table.rows().iter().map(|r| r.keys[0].label()).collect();
        assert_eq!(labels, vec!["2018-01", "2018-02", "2018-03"]);
        assert_eq!(table.values("revenue").unwrap(), vec![Some(10.0), Some(60.0), Some(80.0)]);
    }

    #[test]
    fn test_run_by_weekday_hour() {
        let table = Pipeline::new(Dimension::WeekdayHour)
            .measure(revenue())
            .run(base())
            .unwrap();
        assert_eq!(table.len(), 4);
        // 2018-02-01 is a Thursday
        assert!(table
            .rows()
            .iter()
            .any(|r| r.keys == vec![KeyValue::Weekday(3), KeyValue::Integer(0)]));
    }

    #[test]
    fn test_filter_on_absent_column_is_missing_column() {
        let df = base().drop(columns::ORDER_STATUS).unwrap();
        let p = Pipeline::new(Dimension::Category)
            .with_filters(Filters::new().with_status(Some("delivered".into())));
        assert!(p.filter(df).is_err());
    }
}
