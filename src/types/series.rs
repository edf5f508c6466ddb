use super::{Bar, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bars for one instrument, ascending by date with no duplicate dates.
///
/// Only the series preparer builds these, so a `PreparedSeries` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    bars: Vec<Bar>,
}

impl PreparedSeries {
    pub(crate) fn from_sorted(bars: Vec<Bar>) -> Self {
        debug_assert!(!bars.is_empty());
        debug_assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// First and last trading date covered.
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.bars[0].date, self.bars[self.bars.len() - 1].date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }
}

/// A bar plus every derived indicator value at that date.
///
/// Maps are keyed by window (moving averages) or period (RSI). `None` means the
/// indicator does not have enough history at this row yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub bar: Bar,
    pub close_ma: BTreeMap<usize, Option<f64>>,
    pub volume_ma: BTreeMap<usize, Option<f64>>,
    pub rsi: BTreeMap<usize, Option<f64>>,
}

impl FeatureRow {
    pub fn ma(&self, window: usize) -> Option<f64> {
        self.close_ma.get(&window).copied().flatten()
    }

    pub fn volume_ma(&self, window: usize) -> Option<f64> {
        self.volume_ma.get(&window).copied().flatten()
    }

    pub fn rsi(&self, period: usize) -> Option<f64> {
        self.rsi.get(&period).copied().flatten()
    }
}

/// Date-aligned feature rows for one instrument, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub rows: Vec<FeatureRow>,
}

impl FeatureSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// The most recent `count` rows (fewer if the series is shorter).
    pub fn recent(&self, count: usize) -> &[FeatureRow] {
        let start = self.rows.len().saturating_sub(count);
        &self.rows[start..]
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;
        Some(DateRange::new(first.bar.date, last.bar.date))
    }
}
