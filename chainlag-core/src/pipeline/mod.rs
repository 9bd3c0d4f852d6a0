//! Alignment and correlation pipeline.
//!
//! metric series + price series → inner join → returns → Pearson (same-day,
//! lag-1). An empty intermediate stage is reported as
//! `AnalysisError::EmptyResult` instead of an undefined coefficient.

pub mod align;
pub mod correlation;

pub use align::{align, derive_returns};
pub use correlation::{correlation_result, lagged_pairs, pearson, same_day_pairs};

use crate::domain::{CorrelationResult, MergedTable, TimeSeries};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which stage left nothing to correlate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    MetricSeriesEmpty,
    PriceSeriesEmpty,
    /// The two series share no dates.
    NoOverlap,
    /// Rows were joined but none has a defined return.
    NoDerivedReturns,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EmptyReason::MetricSeriesEmpty => "metric series is empty",
            EmptyReason::PriceSeriesEmpty => "price series is empty",
            EmptyReason::NoOverlap => "no overlapping dates between metric and price series",
            EmptyReason::NoDerivedReturns => "no rows left after deriving returns",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("empty result: {0}")]
    EmptyResult(EmptyReason),
}

/// Merged table plus its correlation coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub table: MergedTable,
    pub correlation: CorrelationResult,
}

/// Join, derive returns, and correlate.
pub fn correlate(metric: &TimeSeries, price: &TimeSeries) -> Result<Analysis, AnalysisError> {
    if metric.is_empty() {
        return Err(AnalysisError::EmptyResult(EmptyReason::MetricSeriesEmpty));
    }
    if price.is_empty() {
        return Err(AnalysisError::EmptyResult(EmptyReason::PriceSeriesEmpty));
    }

    let table = align(metric, price);
    tracing::debug!(
        metric_days = metric.len(),
        price_days = price.len(),
        joined = table.len(),
        "series aligned"
    );
    if table.is_empty() {
        return Err(AnalysisError::EmptyResult(EmptyReason::NoOverlap));
    }
    if table.return_count() == 0 {
        return Err(AnalysisError::EmptyResult(EmptyReason::NoDerivedReturns));
    }

    let correlation = correlation_result(&table);
    Ok(Analysis { table, correlation })
}
