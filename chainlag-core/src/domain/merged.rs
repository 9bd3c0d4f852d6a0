//! Output types of the alignment pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One joined day: the on-chain metric, the price, and the return into this day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    /// Transaction count or supply, depending on the metric source.
    pub metric: f64,
    pub price: f64,
    /// Percentage change of `price` against the previous record.
    /// `None` on the first record or when the previous price is zero.
    pub derived_return: Option<f64>,
}

/// Inner join of a metric series and a price series, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedTable {
    pub records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.records.iter().map(|r| r.date)
    }

    /// Number of rows with a defined return.
    pub fn return_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.derived_return.is_some())
            .count()
    }
}

/// Same-day and lag-1 Pearson coefficients for one run.
///
/// A `None` coefficient means the correlation is undefined for the data
/// (fewer than two pairs, or one column has zero variance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub same_day: Option<f64>,
    /// Metric on day t against the return into day t+1.
    pub next_day_lagged: Option<f64>,
    pub same_day_pairs: usize,
    pub lagged_pairs: usize,
}
