//! Domain types for ChainLag

pub mod merged;
pub mod series;

pub use merged::{CorrelationResult, MergedRecord, MergedTable};
pub use series::{SeriesError, TimeSeries, TimeSeriesPoint};
