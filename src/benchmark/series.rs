//! Day-resolution series with as-of lookup semantics.
//!
//! A [`DailySeries`] holds sparse observations sorted by date. Forward-fill
//! is implicit in [`DailySeries::value_as_of`]: any day resolves to the most
//! recent observation on or before it, and days before the first observation
//! resolve to nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Sparse day-keyed series, sorted ascending, one value per date.
#[derive(Debug, Clone, Default)]
pub struct DailySeries {
    points: Vec<(NaiveDate, Decimal)>,
}

impl DailySeries {
    /// Build from raw observations. Dates are normalized to one value per
    /// day; when a date appears more than once the last observation wins.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Decimal)>,
    {
        let mut points: Vec<(NaiveDate, Decimal)> = observations.into_iter().collect();
        points.sort_by_key(|(date, _)| *date);

        let mut deduped: Vec<(NaiveDate, Decimal)> = Vec::with_capacity(points.len());
        for (date, value) in points {
            match deduped.last_mut() {
                Some((last_date, last_value)) if *last_date == date => *last_value = value,
                _ => deduped.push((date, value)),
            }
        }

        Self { points: deduped }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(date, _)| *date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(date, _)| *date)
    }

    /// The value as of `day`: the most recent observation on or before it.
    ///
    /// Returns None for days before the first observation; never
    /// interpolates or extrapolates backward.
    pub fn value_as_of(&self, day: NaiveDate) -> Option<Decimal> {
        let idx = self.points.partition_point(|(date, _)| *date <= day);
        if idx == 0 {
            None
        } else {
            Some(self.points[idx - 1].1)
        }
    }
}

/// Contiguous calendar timeline from `start` to `end` inclusive.
pub fn build_timeline(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        let Some(next) = current.succ_opt() else {
            break;
        };
        current = next;
    }
    days
}
