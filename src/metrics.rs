//! Derived metrics over aggregated values.
//!
//! Undefined results are `None`, never zero or NaN.

use serde::Serialize;

use crate::aggregate::{AggregateTable, KeyValue};
use crate::error::Result;
use crate::presentation::ValueKind;

/// `value / total * 100`, or 0 when `total` is 0.
pub fn share_of_total(value: f64, total: f64) -> f64 {
    ratio(value, total)
}

/// Percentage change from `previous` to `current`; undefined on a zero base.
pub fn growth(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// `numerator / denominator * 100`, or 0 when `denominator` is 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    safe_div(numerator, denominator) * 100.0
}

/// `numerator / denominator`, or 0 when `denominator` is 0.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Simple moving average. Positions before the first full window, and windows containing an
/// undefined value, are undefined.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum: Option<f64> = slice.iter().copied().sum();
            sum.map(|s| s / window as f64)
        })
        .collect()
}

fn means(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    Some((xs.iter().sum::<f64>() / n, ys.iter().sum::<f64>() / n))
}

/// Pearson correlation coefficient; undefined for fewer than 2 points, mismatched lengths,
/// or a constant series.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let (mx, my) = means(xs, ys)?;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx * vy).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTrend {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares fit of `ys` on `xs`, undefined under the same conditions as
/// [`pearson_correlation`].
pub fn linear_trend(xs: &[f64], ys: &[f64]) -> Option<LinearTrend> {
    pearson_correlation(xs, ys)?;
    let (mx, my) = means(xs, ys)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
    }
    let slope = sxy / sxx;
    Some(LinearTrend {
        slope,
        intercept: my - slope * mx,
    })
}

/// Arithmetic mean; None for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Append `name` = each row's `measure` as a percentage of the column total.
///
/// Call before any truncation so the denominator is the whole population.
pub fn with_share_of_total(table: AggregateTable, measure: &str, name: &str) -> Result<AggregateTable> {
    let total = table.total(measure)?;
    let measure = measure.to_string();
    Ok(table.with_derived(name, ValueKind::Percent, move |row| {
        row.value(&measure).map(|v| share_of_total(v, total))
    }))
}

/// Append `name` = growth of `measure` against the previous row (rows must be in time order).
pub fn with_growth_vs_previous(table: AggregateTable, measure: &str, name: &str) -> Result<AggregateTable> {
    let values = table.values(measure)?;
    let growths: Vec<Option<f64>> = values
        .iter()
        .enumerate()
        .map(|(i, current)| {
            let previous = if i == 0 { None } else { values[i - 1] };
            match (current, previous) {
                (Some(c), Some(p)) => growth(*c, p),
                _ => None,
            }
        })
        .collect();
    table.with_column_values(name, ValueKind::Percent, growths)
}

/// Append `name` = the value of `measure` in `previous` for the same keys, 0 where `previous`
/// has no such row.
pub fn with_previous_value(
    table: AggregateTable,
    previous: &AggregateTable,
    measure: &str,
    name: &str,
    kind: ValueKind,
) -> Result<AggregateTable> {
    let idx = previous.column_index(measure)?;
    let lookup: std::collections::HashMap<&[KeyValue], Option<f64>> = previous
        .rows()
        .iter()
        .map(|r| (r.keys.as_slice(), r.values[idx]))
        .collect();
    let values: Vec<Option<f64>> = table
        .rows()
        .iter()
        .map(|r| Some(lookup.get(r.keys.as_slice()).copied().flatten().unwrap_or(0.0)))
        .collect();
    table.with_column_values(name, kind, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GroupKey, Measure};
    use polars::prelude::*;
    use super::{mean, median};

    #[test]
    fn test_share_and_ratio_zero_guard() {
        assert_eq!(share_of_total(30.0, 60.0), 50.0);
        assert_eq!(share_of_total(5.0, 0.0), 0.0);
        assert_eq!(ratio(1.0, 4.0), 25.0);
        assert_eq!(safe_div(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_growth_undefined_on_zero_base() {
        assert_eq!(growth(150.0, 100.0), Some(50.0));
        assert_eq!(growth(50.0, 100.0), Some(-50.0));
        for x in [0.0, 1.0, -3.0, 1e9] {
            assert_eq!(growth(x, 0.0), None);
        }
    }

    #[test]
    fn test_rolling_mean_leading_gaps() {
        let v = [Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(7.0)];
        assert_eq!(
            rolling_mean(&v, 2),
            vec![None, Some(1.5), Some(2.5), None, None, Some(6.0)]
        );
        assert_eq!(rolling_mean(&v, 1)[0], Some(1.0));
        assert_eq!(rolling_mean(&v, 0), vec![None; 6]);
        assert_eq!(rolling_mean(&v[..2], 3), vec![None, None]);
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson_correlation(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
        let inverse = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&xs, &inverse).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate() {
        assert_eq!(pearson_correlation(&[1.0], &[2.0]), None);
        assert_eq!(pearson_correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson_correlation(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(linear_trend(&[3.0, 3.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_linear_trend() {
        let t = linear_trend(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((t.slope - 2.0).abs() < 1e-12);
        assert!((t.intercept - 1.0).abs() < 1e-12);
        assert!((t.at(10.0) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[75.0, 0.0, 200.0, 70.0]), Some(86.25));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    fn revenue_table(keys: &[&str], revenue: &[f64]) -> AggregateTable {
        let df = df!("k" => keys, "r" => revenue).unwrap();
        aggregate(&df, &[GroupKey::text("k")], &[Measure::sum("revenue", "r")]).unwrap()
    }

    #[test]
    fn test_share_column_sums_to_hundred() {
        let t = with_share_of_total(revenue_table(&["a", "b", "c"], &[1.0, 2.0, 7.0]), "revenue", "share").unwrap();
        assert!((t.total("share").unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(t.values("share").unwrap()[2], Some(70.0));
    }

    #[test]
    fn test_growth_vs_previous_and_previous_value() {
        let t = revenue_table(&["1", "2", "3"], &[0.0, 10.0, 15.0]);
        let g = with_growth_vs_previous(t.clone(), "revenue", "growth").unwrap();
        assert_eq!(g.values("growth").unwrap(), vec![None, None, Some(50.0)]);

        let prev = revenue_table(&["2"], &[5.0]);
        let p = with_previous_value(t, &prev, "revenue", "prev", ValueKind::Currency).unwrap();
        assert_eq!(p.values("prev").unwrap(), vec![Some(0.0), Some(5.0), Some(0.0)]);
    }
}
