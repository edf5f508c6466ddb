//! Technical indicator implementations.

pub mod rsi;
pub mod sma;

pub use rsi::smoothed_rsi;
pub use sma::simple_moving_average;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::types::{FeatureRow, FeatureSeries, PreparedSeries};
use std::collections::BTreeMap;

/// Compute every configured indicator and zip the results into date-aligned rows.
pub fn compute_features(series: &PreparedSeries, config: &AnalysisConfig) -> Result<FeatureSeries> {
    let closes = series.closes();
    let volumes = series.volumes();

    let close_ma: Vec<(usize, Vec<Option<f64>>)> = config
        .ma_windows
        .iter()
        .map(|&w| (w, simple_moving_average(&closes, w)))
        .collect();

    let volume_ma: Vec<(usize, Vec<Option<f64>>)> = config
        .volume_ma_windows
        .iter()
        .map(|&w| (w, simple_moving_average(&volumes, w)))
        .collect();

    let rsi = config
        .rsi_periods
        .iter()
        .map(|&p| smoothed_rsi(&closes, p, config.zero_loss).map(|values| (p, values)))
        .collect::<Result<Vec<_>>>()?;

    ensure_finite(series, "MA", &close_ma)?;
    ensure_finite(series, "volume MA", &volume_ma)?;
    ensure_finite(series, "RSI", &rsi)?;

    let rows = series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            bar: bar.clone(),
            close_ma: column_at(&close_ma, i),
            volume_ma: column_at(&volume_ma, i),
            rsi: column_at(&rsi, i),
        })
        .collect();

    Ok(FeatureSeries { rows })
}

/// Extreme prices can overflow a running sum. Such values cannot be stored as
/// JSON, so the bar that produced the first one is rejected.
fn ensure_finite(
    series: &PreparedSeries,
    name: &str,
    columns: &[(usize, Vec<Option<f64>>)],
) -> Result<()> {
    for (window, values) in columns {
        if let Some(i) = values.iter().position(|v| v.map_or(false, |x| !x.is_finite())) {
            return Err(AnalysisError::InvalidBar {
                date: series.bars()[i].date,
                reason: format!("{}{} is not a finite number", name, window),
            });
        }
    }
    Ok(())
}

fn column_at(columns: &[(usize, Vec<Option<f64>>)], i: usize) -> BTreeMap<usize, Option<f64>> {
    columns.iter().map(|(key, values)| (*key, values[i])).collect()
}
