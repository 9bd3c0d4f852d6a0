//! Daily time series: one value per UTC calendar day, ascending, no duplicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single daily observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Errors from constructing a series out of raw points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("duplicate date {0} in series")]
    DuplicateDate(NaiveDate),

    #[error("series out of order: {previous} followed by {next}")]
    OutOfOrder { previous: NaiveDate, next: NaiveDate },

    #[error("non-finite value on {0}")]
    NonFinite(NaiveDate),
}

/// Ordered daily series.
///
/// Invariant: dates are strictly ascending, so each day appears at most once.
/// Serialized as a plain point array; deserializing goes through `new`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimeSeriesPoint>", into = "Vec<TimeSeriesPoint>")]
pub struct TimeSeries {
    points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    /// Build a series from points already in ascending date order.
    ///
    /// Rejects duplicates, disorder, and NaN/infinite values.
    pub fn new(points: Vec<TimeSeriesPoint>) -> Result<Self, SeriesError> {
        for point in &points {
            if !point.value.is_finite() {
                return Err(SeriesError::NonFinite(point.date));
            }
        }
        for pair in points.windows(2) {
            let (previous, next) = (pair[0].date, pair[1].date);
            if previous == next {
                return Err(SeriesError::DuplicateDate(next));
            }
            if previous > next {
                return Err(SeriesError::OutOfOrder { previous, next });
            }
        }
        Ok(Self { points })
    }

    /// Collapse any number of samples into one mean value per day.
    ///
    /// Input order does not matter. Non-finite samples are skipped, and so is
    /// a day whose sum overflows.
    pub fn from_daily_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, value) in samples {
            if !value.is_finite() {
                continue;
            }
            let entry = buckets.entry(date).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        let points = buckets
            .into_iter()
            .filter_map(|(date, (sum, count))| {
                let mean = sum / count as f64;
                mean.is_finite().then(|| TimeSeriesPoint::new(date, mean))
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Keep only points inside `[start, end]`.
    pub fn restrict(self, start: NaiveDate, end: NaiveDate) -> Self {
        let points = self
            .points
            .into_iter()
            .filter(|p| p.date >= start && p.date <= end)
            .collect();
        Self { points }
    }
}

impl TryFrom<Vec<TimeSeriesPoint>> for TimeSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<TimeSeriesPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<TimeSeries> for Vec<TimeSeriesPoint> {
    fn from(series: TimeSeries) -> Self {
        series.points
    }
}

impl IntoIterator for TimeSeries {
    type Item = TimeSeriesPoint;
    type IntoIter = std::vec::IntoIter<TimeSeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn new_accepts_ascending_points() {
        let series = TimeSeries::new(vec![
            TimeSeriesPoint::new(d("2024-01-01"), 1.0),
            TimeSeriesPoint::new(d("2024-01-02"), 2.0),
        ])
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(d("2024-01-01")));
        assert_eq!(series.last_date(), Some(d("2024-01-02")));
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        let err = TimeSeries::new(vec![
            TimeSeriesPoint::new(d("2024-01-01"), 1.0),
            TimeSeriesPoint::new(d("2024-01-01"), 2.0),
        ])
        .unwrap_err();
        assert_eq!(err, SeriesError::DuplicateDate(d("2024-01-01")));
    }

    #[test]
    fn new_rejects_descending_dates() {
        let err = TimeSeries::new(vec![
            TimeSeriesPoint::new(d("2024-01-02"), 1.0),
            TimeSeriesPoint::new(d("2024-01-01"), 2.0),
        ])
        .unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { .. }));
    }

    #[test]
    fn new_rejects_nan() {
        let err = TimeSeries::new(vec![TimeSeriesPoint::new(d("2024-01-01"), f64::NAN)])
            .unwrap_err();
        assert_eq!(err, SeriesError::NonFinite(d("2024-01-01")));
    }

    #[test]
    fn daily_samples_are_averaged_and_sorted() {
        let series = TimeSeries::from_daily_samples(vec![
            (d("2024-01-02"), 30.0),
            (d("2024-01-01"), 10.0),
            (d("2024-01-01"), 20.0),
            (d("2024-01-02"), f64::NAN),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0], TimeSeriesPoint::new(d("2024-01-01"), 15.0));
        assert_eq!(series.points()[1], TimeSeriesPoint::new(d("2024-01-02"), 30.0));
    }

    #[test]
    fn restrict_drops_points_outside_range() {
        let series = TimeSeries::from_daily_samples(vec![
            (d("2023-12-31"), 1.0),
            (d("2024-01-01"), 2.0),
            (d("2024-01-02"), 3.0),
        ])
        .restrict(d("2024-01-01"), d("2024-01-01"));
        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].value, 2.0);
    }

    #[test]
    fn deserialize_enforces_ordering() {
        let ok: TimeSeries = serde_json::from_str(
            r#"[{"date":"2024-01-01","value":1.0},{"date":"2024-01-02","value":2.0}]"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(serde_json::from_str::<TimeSeries>(&json).unwrap(), ok);

        let unordered = serde_json::from_str::<TimeSeries>(
            r#"[{"date":"2024-01-02","value":1.0},{"date":"2024-01-01","value":2.0}]"#,
        );
        assert!(unordered.is_err());

        let duplicate = serde_json::from_str::<TimeSeries>(
            r#"[{"date":"2024-01-01","value":1.0},{"date":"2024-01-01","value":2.0}]"#,
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn overflowing_day_is_dropped() {
        let series = TimeSeries::from_daily_samples([
            (d("2024-01-01"), f64::MAX),
            (d("2024-01-01"), f64::MAX),
            (d("2024-01-02"), 3.0),
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.first_date(), Some(d("2024-01-02")));
        assert!(series.points().iter().all(|p| p.value.is_finite()));
    }
}
