//! Date alignment of a metric series against a price series.
//!
//! Unlike a union alignment, this is a strict inner join: a day survives only
//! if both series have it. Returns are derived after the join, so a gap in
//! either series makes the return span the gap.

use crate::domain::{MergedRecord, MergedTable, TimeSeries};
use std::cmp::Ordering;

/// Inner-join two series on date and derive the return column.
///
/// Both inputs are ascending and duplicate-free, so a single merge pass
/// keeps the output ascending.
pub fn align(metric: &TimeSeries, price: &TimeSeries) -> MergedTable {
    let (m, p) = (metric.points(), price.points());
    let mut records = Vec::with_capacity(m.len().min(p.len()));
    let (mut i, mut j) = (0, 0);

    while i < m.len() && j < p.len() {
        match m[i].date.cmp(&p[j].date) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                records.push(MergedRecord {
                    date: m[i].date,
                    metric: m[i].value,
                    price: p[j].value,
                    derived_return: None,
                });
                i += 1;
                j += 1;
            }
        }
    }

    derive_returns(&mut records);
    MergedTable { records }
}

/// Fill `derived_return` with the percentage change against the previous row.
///
/// The first row has no predecessor. A zero previous price yields no return
/// rather than an infinite one.
pub fn derive_returns(records: &mut [MergedRecord]) {
    let mut previous: Option<f64> = None;
    for record in records.iter_mut() {
        record.derived_return = previous
            .map(|prev| (record.price - prev) / prev)
            .filter(|r| r.is_finite());
        previous = Some(record.price);
    }
}
