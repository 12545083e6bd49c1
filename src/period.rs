//! Calendar bucketing: period bins, labels, date ranges and per-row time keys.
//!
//! Bins come only from calendar rules. Weeks start on Monday; months, quarters and years
//! follow the calendar. A bin covers `[start, end)`.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

use crate::error::{DashboardError, Result};
use crate::tables::columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    /// Polars duration string for `dt().truncate`. Week truncation lands on Monday.
    fn every(&self) -> &'static str {
        match self {
            Granularity::Week => "1w",
            Granularity::Month => "1mo",
            Granularity::Quarter => "1q",
            Granularity::Year => "1y",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Name of a weekday index where Monday is 0.
pub fn weekday_name(index: i64) -> &'static str {
    usize::try_from(index)
        .ok()
        .and_then(|i| WEEKDAY_NAMES.get(i).copied())
        .unwrap_or("?")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodBin {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub granularity: Granularity,
}

impl PeriodBin {
    pub fn label(&self) -> String {
        label(self)
    }

    pub fn start_micros(&self) -> i64 {
        self.start.and_utc().timestamp_micros()
    }

    pub fn from_start_micros(micros: i64, granularity: Granularity) -> Option<Self> {
        to_naive(micros).map(|ts| bin(ts, granularity))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn next(&self) -> Self {
        let start = self.end.date();
        PeriodBin {
            start: self.end,
            end: step(start, self.granularity).and_time(NaiveTime::MIN),
            granularity: self.granularity,
        }
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d - Days::new(u64::from(d.day0()))
}

fn first_of_year(d: NaiveDate) -> NaiveDate {
    d - Days::new(u64::from(d.ordinal0()))
}

fn floor(d: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Week => d - Days::new(u64::from(d.weekday().num_days_from_monday())),
        Granularity::Month => first_of_month(d),
        Granularity::Quarter => {
            let mut m = first_of_month(d);
            for _ in 0..(m.month0() % 3) {
                m = first_of_month(m - Days::new(1));
            }
            m
        }
        Granularity::Year => first_of_year(d),
    }
}

// `start` must already be floored to `granularity`.
fn step(start: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Week => start + Days::new(7),
        Granularity::Month => first_of_month(start + Days::new(32)),
        Granularity::Quarter => {
            let mut m = start;
            for _ in 0..3 {
                m = first_of_month(m + Days::new(32));
            }
            m
        }
        Granularity::Year => first_of_year(start + Days::new(366)),
    }
}

/// The bin of `granularity` containing `ts`.
pub fn bin(ts: NaiveDateTime, granularity: Granularity) -> PeriodBin {
    let start = floor(ts.date(), granularity);
    PeriodBin {
        start: start.and_time(NaiveTime::MIN),
        end: step(start, granularity).and_time(NaiveTime::MIN),
        granularity,
    }
}

/// Sortable display label: "2018-03-05" (the Monday), "2018-03", "2018 Q1" or "2018".
pub fn label(bin: &PeriodBin) -> String {
    match bin.granularity {
        Granularity::Week => bin.start.format("%Y-%m-%d").to_string(),
        Granularity::Month => bin.start.format("%Y-%m").to_string(),
        Granularity::Quarter => format!("{} Q{}", bin.start.year(), bin.start.month0() / 3 + 1),
        Granularity::Year => bin.start.format("%Y").to_string(),
    }
}

/// Every bin touching the closed day interval `[start, end]`, in order, gap-free.
pub fn enumerate_bins(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Result<Vec<PeriodBin>> {
    if end < start {
        return Err(DashboardError::InvalidDateRange { start, end });
    }
    let mut bins = Vec::new();
    let mut current = bin(start.and_time(NaiveTime::MIN), granularity);
    while current.start.date() <= end {
        let next = current.next();
        bins.push(current);
        current = next;
    }
    Ok(bins)
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(DashboardError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date("start", start)?, parse_date("end", end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// The window of the same length ending the day before this one starts.
    pub fn previous(&self) -> Self {
        let len = self.days() as u64;
        let end = self.start - Days::new(1);
        Self {
            start: self.start - Days::new(len),
            end,
        }
    }

    pub fn start_micros(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp_micros()
    }

    /// Midnight after the last day.
    pub fn end_exclusive_micros(&self) -> i64 {
        (self.end + Days::new(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_micros()
    }

    pub fn bins(&self, granularity: Granularity) -> Result<Vec<PeriodBin>> {
        enumerate_bins(self.start, self.end, granularity)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

pub fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| DashboardError::invalid_parameter(name, format!("'{}' is not a YYYY-MM-DD date ({})", value, e)))
}

pub(crate) fn to_naive(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|d| d.naive_utc())
}

/// Expressions for `period_start` (bin start as epoch microseconds, only with a
/// granularity), `weekday` (Monday = 0) and `hour`, all Int64, over datetime column `ts`.
pub fn time_key_exprs(ts: &str, granularity: Option<Granularity>) -> Vec<Expr> {
    let mut exprs = Vec::with_capacity(3);
    if let Some(g) = granularity {
        exprs.push(
            col(ts)
                .dt()
                .truncate(lit(g.every()))
                .cast(DataType::Int64)
                .alias(columns::PERIOD_START),
        );
    }
    exprs.push((col(ts).dt().weekday().cast(DataType::Int64) - lit(1i64)).alias(columns::WEEKDAY));
    exprs.push(col(ts).dt().hour().cast(DataType::Int64).alias(columns::HOUR));
    exprs
}

/// Add the time key columns of [`time_key_exprs`]. Missing timestamps give missing keys.
pub fn annotate(df: DataFrame, ts: &str, granularity: Option<Granularity>) -> Result<DataFrame> {
    Ok(df.lazy().with_columns(time_key_exprs(ts, granularity)).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        day(y, m, d).and_hms_opt(h, 30, 0).unwrap()
    }

    #[test]
    fn test_week_starts_monday() {
        // 2018-03-07 is a Wednesday
        let b = bin(at(2018, 3, 7, 12), Granularity::Week);
        assert_eq!(b.start.date(), day(2018, 3, 5));
        assert_eq!(b.end.date(), day(2018, 3, 12));
        assert_eq!(b.label(), "2018-03-05");
    }

    #[test]
    fn test_calendar_bins_and_labels() {
        let ts = at(2018, 11, 30, 23);
        let m = bin(ts, Granularity::Month);
        assert_eq!((m.start.date(), m.end.date()), (day(2018, 11, 1), day(2018, 12, 1)));
        assert_eq!(m.label(), "2018-11");

        let q = bin(ts, Granularity::Quarter);
        assert_eq!((q.start.date(), q.end.date()), (day(2018, 10, 1), day(2019, 1, 1)));
        assert_eq!(q.label(), "2018 Q4");

        let y = bin(ts, Granularity::Year);
        assert_eq!((y.start.date(), y.end.date()), (day(2018, 1, 1), day(2019, 1, 1)));
        assert_eq!(y.label(), "2018");
    }

    #[test]
    fn test_month_boundaries_across_short_months() {
        let feb = bin(at(2016, 2, 29, 0), Granularity::Month);
        assert_eq!(feb.end.date(), day(2016, 3, 1));
        assert_eq!(feb.next().end.date(), day(2016, 4, 1));
        assert!(feb.contains(at(2016, 2, 1, 0)));
        assert!(!feb.contains(day(2016, 3, 1).and_time(NaiveTime::MIN)));
    }

    #[test]
    fn test_full_year_has_four_quarters() {
        let bins = enumerate_bins(day(2018, 1, 1), day(2018, 12, 31), Granularity::Quarter).unwrap();
        let labels: Vec<String> = bins.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec!["2018 Q1", "2018 Q2", "2018 Q3", "2018 Q4"]);
    }

    #[test]
    fn test_enumerated_bins_are_contiguous() {
        for g in [Granularity::Week, Granularity::Month, Granularity::Quarter, Granularity::Year] {
            let bins = enumerate_bins(day(2016, 9, 4), day(2018, 10, 17), g).unwrap();
            assert!(bins[0].start.date() <= day(2016, 9, 4));
            assert!(bins.last().unwrap().end.date() > day(2018, 10, 17));
            for pair in bins.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "{g} bins must touch");
            }
        }
        assert_eq!(
            enumerate_bins(day(2018, 1, 1), day(2018, 12, 31), Granularity::Month).unwrap().len(),
            12
        );
    }

    #[test]
    fn test_enumerate_single_day_and_reversed() {
        let one = enumerate_bins(day(2018, 5, 5), day(2018, 5, 5), Granularity::Year).unwrap();
        assert_eq!(one.len(), 1);
        assert!(matches!(
            enumerate_bins(day(2018, 5, 5), day(2018, 5, 4), Granularity::Year),
            Err(DashboardError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_date_range_previous_window() {
        let r = DateRange::new(day(2018, 6, 1), day(2018, 8, 31)).unwrap();
        assert_eq!(r.days(), 92);
        let p = r.previous();
        assert_eq!(p.end(), day(2018, 5, 31));
        assert_eq!(p.days(), 92);
        assert_eq!(p.start(), day(2018, 3, 1));
        assert!(r.contains(day(2018, 8, 31)));
        assert!(!r.contains(day(2018, 9, 1)));
    }

    #[test]
    fn test_date_range_rejects_reversed_and_garbage() {
        assert!(matches!(
            DateRange::parse("2018-03-01", "2018-02-01"),
            Err(DashboardError::InvalidDateRange { .. })
        ));
        assert!(matches!(
            DateRange::parse("2018-13-01", "2018-12-01"),
            Err(DashboardError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_annotate_adds_time_keys() {
        let ts = at(2018, 3, 7, 14).and_utc().timestamp_micros();
        let df = df!("ts" => &[Some(ts), None]).unwrap();
        let df = df
            .lazy()
            .with_column(col("ts").cast(DataType::Datetime(TimeUnit::Microseconds, None)))
            .collect()
            .unwrap();

        let out = annotate(df, "ts", Some(Granularity::Month)).unwrap();
        let start = out.column(columns::PERIOD_START).unwrap().i64().unwrap().get(0).unwrap();
        assert_eq!(
            PeriodBin::from_start_micros(start, Granularity::Month).unwrap().label(),
            "2018-03"
        );
        assert_eq!(out.column(columns::WEEKDAY).unwrap().i64().unwrap().get(0), Some(2));
        assert_eq!(out.column(columns::HOUR).unwrap().i64().unwrap().get(0), Some(14));
        assert_eq!(out.column(columns::HOUR).unwrap().null_count(), 1);
        assert_eq!(weekday_name(2), "Wednesday");
    }

    #[test]
    fn test_annotated_starts_match_calendar_bins() {
        let stamps = [at(2018, 3, 7, 14), at(2018, 3, 11, 23), at(2016, 2, 29, 0), at(2018, 12, 31, 9)];
        let micros: Vec<i64> = stamps.iter().map(|t| t.and_utc().timestamp_micros()).collect();
        let df = df!("ts" => &micros)
            .unwrap()
            .lazy()
            .with_column(col("ts").cast(DataType::Datetime(TimeUnit::Microseconds, None)))
            .collect()
            .unwrap();

        for g in [Granularity::Week, Granularity::Month, Granularity::Quarter, Granularity::Year] {
            let out = annotate(df.clone(), "ts", Some(g)).unwrap();
            let starts: Vec<Option<i64>> = out.column(columns::PERIOD_START).unwrap().i64().unwrap().into_iter().collect();
            let expected: Vec<Option<i64>> = stamps.iter().map(|t| Some(bin(*t, g).start_micros())).collect();
            assert_eq!(starts, expected, "{}", g);
        }
        // a Sunday is the last day of its week
        let out = annotate(df, "ts", None).unwrap();
        assert_eq!(out.column(columns::WEEKDAY).unwrap().i64().unwrap().get(1), Some(6));
        assert!(out.column(columns::PERIOD_START).is_err());
    }
}
