//! Rule-based classification of the latest feature rows.
//!
//! Band and composite rules are ordered tables evaluated top to bottom; the
//! first matching rule decides the label.

use crate::config::{AnalysisConfig, Thresholds};
use crate::error::{AnalysisError, Result};
use crate::services::summary::render_summary;
use crate::types::{
    ClassificationResult, CompositeSignal, FeatureRow, FeatureSeries, RsiSignal, VolumeHit,
};

/// Strict comparison against a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Below(f64),
    Above(f64),
}

impl Bound {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Bound::Below(limit) => value < limit,
            Bound::Above(limit) => value > limit,
        }
    }
}

/// Maps one RSI reading to a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRule {
    pub bound: Bound,
    pub label: RsiSignal,
}

/// Maps a (short, medium) RSI pair to a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeRule {
    pub short: Bound,
    pub medium: Bound,
    pub label: CompositeSignal,
}

/// Short-horizon bands. Severe bands come first so they win over the wider
/// ones they overlap.
pub fn short_rsi_rules(t: &Thresholds) -> Vec<BandRule> {
    vec![
        BandRule {
            bound: Bound::Below(t.severe_oversold),
            label: RsiSignal::SevereOversold,
        },
        BandRule {
            bound: Bound::Above(t.severe_overbought),
            label: RsiSignal::SevereOverbought,
        },
        BandRule {
            bound: Bound::Below(t.oversold),
            label: RsiSignal::Oversold,
        },
        BandRule {
            bound: Bound::Above(t.overbought),
            label: RsiSignal::Overbought,
        },
    ]
}

pub fn medium_rsi_rules(t: &Thresholds) -> Vec<BandRule> {
    vec![
        BandRule {
            bound: Bound::Below(t.oversold),
            label: RsiSignal::Oversold,
        },
        BandRule {
            bound: Bound::Above(t.overbought),
            label: RsiSignal::Overbought,
        },
    ]
}

pub fn composite_rules(t: &Thresholds) -> Vec<CompositeRule> {
    vec![
        CompositeRule {
            short: Bound::Below(t.oversold),
            medium: Bound::Below(t.oversold),
            label: CompositeSignal::StrongBuy,
        },
        CompositeRule {
            short: Bound::Above(t.overbought),
            medium: Bound::Above(t.overbought),
            label: CompositeSignal::StrongSell,
        },
        CompositeRule {
            short: Bound::Below(t.oversold),
            medium: Bound::Above(t.composite_pivot),
            label: CompositeSignal::ShortTermBounce,
        },
        CompositeRule {
            short: Bound::Above(t.overbought),
            medium: Bound::Below(t.composite_pivot),
            label: CompositeSignal::ShortTermPullback,
        },
    ]
}

/// First matching band, or `Neutral`.
pub fn classify_band(rules: &[BandRule], value: f64) -> RsiSignal {
    rules
        .iter()
        .find(|rule| rule.bound.holds(value))
        .map(|rule| rule.label)
        .unwrap_or(RsiSignal::Neutral)
}

/// First matching composite rule, or `Hold`.
pub fn classify_composite(rules: &[CompositeRule], short: f64, medium: f64) -> CompositeSignal {
    rules
        .iter()
        .find(|rule| rule.short.holds(short) && rule.medium.holds(medium))
        .map(|rule| rule.label)
        .unwrap_or(CompositeSignal::Hold)
}

/// Classify the latest rows of a feature series.
///
/// Fails with `InsufficientHistory` before evaluating any rule when the
/// series cannot give every window defined indicator values.
pub fn classify(
    instrument_id: &str,
    features: &FeatureSeries,
    config: &AnalysisConfig,
) -> Result<ClassificationResult> {
    let required = config.required_history();
    let available = features.len();
    let insufficient = || AnalysisError::InsufficientHistory { required, available };

    if available < required {
        return Err(insufficient());
    }

    let latest = features.latest().ok_or_else(insufficient)?;

    let trend_rows = features.recent(config.windows.trend);
    let condition1 = closes_below(trend_rows, config.trend_short_ma);
    let condition2 = closes_below(trend_rows, config.trend_long_ma);

    let volume_hits: Vec<VolumeHit> = features
        .recent(config.windows.volume)
        .iter()
        .filter_map(|row| {
            let volume_ma = row.volume_ma(config.volume_ma)?;
            (row.bar.volume as f64 > volume_ma).then(|| VolumeHit {
                date: row.bar.date,
                volume: row.bar.volume,
                volume_ma,
            })
        })
        .collect();
    let volume_condition = volume_hits.len() >= config.volume_min_hits;

    let rsi_row = features
        .recent(config.windows.rsi)
        .last()
        .ok_or_else(insufficient)?;
    let rsi_short = rsi_row.rsi(config.rsi_short_period).ok_or_else(insufficient)?;
    let rsi_medium = rsi_row.rsi(config.rsi_medium_period).ok_or_else(insufficient)?;

    let thresholds = &config.thresholds;
    let rsi_short_signal = classify_band(&short_rsi_rules(thresholds), rsi_short);
    let rsi_medium_signal = classify_band(&medium_rsi_rules(thresholds), rsi_medium);
    let composite = classify_composite(&composite_rules(thresholds), rsi_short, rsi_medium);

    let mut result = ClassificationResult {
        instrument_id: instrument_id.to_string(),
        analysis_date: latest.bar.date,
        open: latest.bar.open,
        high: latest.bar.high,
        low: latest.bar.low,
        close: latest.bar.close,
        volume: latest.bar.volume,
        close_ma: latest.close_ma.clone(),
        volume_ma: latest.volume_ma.clone(),
        rsi: latest.rsi.clone(),
        rsi_short,
        rsi_medium,
        condition1,
        condition2,
        volume_condition,
        volume_hits,
        rsi_short_signal,
        rsi_medium_signal,
        composite,
        summary: String::new(),
    };
    result.summary = render_summary(&result, config);

    Ok(result)
}

/// Every row closes strictly below its MA(window).
fn closes_below(rows: &[FeatureRow], window: usize) -> bool {
    rows.iter()
        .all(|row| row.ma(window).map_or(false, |ma| row.bar.close < ma))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::default()
    }

    fn short(value: f64) -> RsiSignal {
        classify_band(&short_rsi_rules(&thresholds()), value)
    }

    fn medium(value: f64) -> RsiSignal {
        classify_band(&medium_rsi_rules(&thresholds()), value)
    }

    fn composite(s: f64, m: f64) -> CompositeSignal {
        classify_composite(&composite_rules(&thresholds()), s, m)
    }

    #[test]
    fn test_short_bands_severe_take_precedence() {
        assert_eq!(short(15.0), RsiSignal::SevereOversold);
        assert_eq!(short(85.0), RsiSignal::SevereOverbought);
        assert_eq!(short(25.0), RsiSignal::Oversold);
        assert_eq!(short(75.0), RsiSignal::Overbought);
        assert_eq!(short(50.0), RsiSignal::Neutral);
    }

    #[test]
    fn test_short_band_edges_are_strict() {
        assert_eq!(short(20.0), RsiSignal::Oversold);
        assert_eq!(short(30.0), RsiSignal::Neutral);
        assert_eq!(short(70.0), RsiSignal::Neutral);
        assert_eq!(short(80.0), RsiSignal::Overbought);
    }

    #[test]
    fn test_medium_bands() {
        assert_eq!(medium(10.0), RsiSignal::Oversold);
        assert_eq!(medium(29.9), RsiSignal::Oversold);
        assert_eq!(medium(30.0), RsiSignal::Neutral);
        assert_eq!(medium(70.1), RsiSignal::Overbought);
        assert_eq!(medium(95.0), RsiSignal::Overbought);
    }

    #[test]
    fn test_composite_strong_buy_beats_lower_rules() {
        assert_eq!(composite(15.0, 15.0), CompositeSignal::StrongBuy);
    }

    #[test]
    fn test_composite_bounce() {
        assert_eq!(composite(18.0, 60.0), CompositeSignal::ShortTermBounce);
    }

    #[test]
    fn test_composite_strong_sell_and_pullback() {
        assert_eq!(composite(85.0, 75.0), CompositeSignal::StrongSell);
        assert_eq!(composite(75.0, 40.0), CompositeSignal::ShortTermPullback);
    }

    #[test]
    fn test_composite_falls_back_to_hold() {
        assert_eq!(composite(50.0, 50.0), CompositeSignal::Hold);
        // oversold short, medium between 30 and 50
        assert_eq!(composite(25.0, 40.0), CompositeSignal::Hold);
        // overbought short, medium between 50 and 70
        assert_eq!(composite(75.0, 60.0), CompositeSignal::Hold);
        // pivot itself is neither above nor below
        assert_eq!(composite(25.0, 50.0), CompositeSignal::Hold);
    }

    #[test]
    fn test_custom_thresholds_change_bands() {
        let t = Thresholds {
            severe_oversold: 10.0,
            oversold: 25.0,
            overbought: 75.0,
            severe_overbought: 90.0,
            composite_pivot: 50.0,
        };
        assert_eq!(classify_band(&short_rsi_rules(&t), 15.0), RsiSignal::Oversold);
        assert_eq!(classify_band(&short_rsi_rules(&t), 85.0), RsiSignal::Overbought);
        assert_eq!(classify_band(&medium_rsi_rules(&t), 72.0), RsiSignal::Neutral);
    }

    fn features_with_volume_spikes(spike_rows: &[usize]) -> FeatureSeries {
        use crate::services::{compute_features, prepare_series};
        use crate::types::Bar;
        use chrono::{Duration, NaiveDate};

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..70)
            .map(|i| {
                let close = 100.0 + (i % 3) as f64;
                let volume = if spike_rows.contains(&i) { 5_000 } else { 1_000 };
                Bar::new(start + Duration::days(i as i64), close, close, close, close, volume)
            })
            .collect();
        let series = prepare_series("2330", bars).unwrap();
        compute_features(&series, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_volume_condition_needs_min_hits() {
        let config = AnalysisConfig::default();

        let features = features_with_volume_spikes(&[65, 67]);
        let two = classify("2330", &features, &config).unwrap();
        assert_eq!(two.volume_hits.len(), 2);
        assert!(!two.volume_condition);

        let features = features_with_volume_spikes(&[65, 67, 69]);
        let three = classify("2330", &features, &config).unwrap();
        assert_eq!(three.volume_hits.len(), 3);
        assert!(three.volume_condition);
    }

    #[test]
    fn test_volume_spike_outside_window_is_ignored() {
        let config = AnalysisConfig::default();
        let features = features_with_volume_spikes(&[60, 66]);
        let result = classify("2330", &features, &config).unwrap();
        assert_eq!(result.volume_hits.len(), 1);
        assert!(!result.volume_condition);
    }

    #[test]
    fn test_bound_is_strict() {
        assert!(Bound::Below(30.0).holds(29.99));
        assert!(!Bound::Below(30.0).holds(30.0));
        assert!(Bound::Above(70.0).holds(70.01));
        assert!(!Bound::Above(70.0).holds(70.0));
    }
}
