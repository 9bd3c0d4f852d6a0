//! Pearson correlation over the merged table.

use crate::domain::{CorrelationResult, MergedTable};

/// Pearson correlation coefficient.
///
/// Returns `None` when the columns differ in length, hold fewer than two
/// pairs, or either column has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n != ys.len() || n < 2 {
        return None;
    }

    if is_constant(xs) || is_constant(ys) {
        return None;
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Every value equal to the first. Checked exactly: a column whose spread is
/// tiny next to its magnitude still has a defined correlation.
fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// `(metric_t, return_t)` for every row with a defined return.
pub fn same_day_pairs(table: &MergedTable) -> (Vec<f64>, Vec<f64>) {
    table
        .records
        .iter()
        .filter_map(|r| r.derived_return.map(|ret| (r.metric, ret)))
        .unzip()
}

/// `(metric_t, return_{t+1})` for every row whose successor has a defined
/// return. The metric leads the price change by one day.
pub fn lagged_pairs(table: &MergedTable) -> (Vec<f64>, Vec<f64>) {
    table
        .records
        .windows(2)
        .filter_map(|w| w[1].derived_return.map(|next| (w[0].metric, next)))
        .unzip()
}

/// Same-day and lag-1 coefficients for a merged table.
pub fn correlation_result(table: &MergedTable) -> CorrelationResult {
    let (same_x, same_y) = same_day_pairs(table);
    let (lag_x, lag_y) = lagged_pairs(table);
    CorrelationResult {
        same_day: pearson(&same_x, &same_y),
        next_day_lagged: pearson(&lag_x, &lag_y),
        same_day_pairs: same_x.len(),
        lagged_pairs: lag_x.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn perfect_positive_and_negative() {
        assert_close(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0);
        assert_close(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0);
    }

    #[test]
    fn known_value() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.0, 4.0, 5.0, 4.0, 5.0];
        let r = pearson(&xs, &ys).unwrap();
        assert_close(r, 0.7745966692414834);
    }

    #[test]
    fn undefined_cases() {
        assert_eq!(pearson(&[], &[]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]), None);
        assert_eq!(pearson(&[5.0, 5.0], &[1.0, 2.0]), None);
        assert_eq!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn large_magnitude_small_spread_is_defined() {
        let supply = [1.2e8, 1.2e8 + 1.0, 1.2e8 + 2.0, 1.2e8 + 3.0];
        let r = pearson(&supply, &[0.01, 0.02, 0.03, 0.04]).unwrap();
        assert!((r - 1.0).abs() < 1e-9, "{r}");

        let r = pearson(&[1e8, 1e8 + 1.0, 1e8 + 2.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-9, "{r}");
    }
}
