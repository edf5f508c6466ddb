use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Band an RSI reading falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSignal {
    SevereOversold,
    Oversold,
    Neutral,
    Overbought,
    SevereOverbought,
}

impl RsiSignal {
    /// Get display label for this band.
    pub fn label(&self) -> &'static str {
        match self {
            RsiSignal::SevereOversold => "severe oversold",
            RsiSignal::Oversold => "oversold",
            RsiSignal::Neutral => "neutral",
            RsiSignal::Overbought => "overbought",
            RsiSignal::SevereOverbought => "severe overbought",
        }
    }

    /// Parse a display label back into a band.
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "severe oversold" => Some(RsiSignal::SevereOversold),
            "oversold" => Some(RsiSignal::Oversold),
            "neutral" => Some(RsiSignal::Neutral),
            "overbought" => Some(RsiSignal::Overbought),
            "severe overbought" => Some(RsiSignal::SevereOverbought),
            _ => None,
        }
    }
}

/// Final verdict combining the short and medium RSI readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeSignal {
    StrongBuy,
    StrongSell,
    ShortTermBounce,
    ShortTermPullback,
    Hold,
}

impl CompositeSignal {
    pub fn label(&self) -> &'static str {
        match self {
            CompositeSignal::StrongBuy => "strong buy",
            CompositeSignal::StrongSell => "strong sell",
            CompositeSignal::ShortTermBounce => "short-term bounce",
            CompositeSignal::ShortTermPullback => "short-term pullback",
            CompositeSignal::Hold => "hold/unclear",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "strong buy" => Some(CompositeSignal::StrongBuy),
            "strong sell" => Some(CompositeSignal::StrongSell),
            "short-term bounce" => Some(CompositeSignal::ShortTermBounce),
            "short-term pullback" => Some(CompositeSignal::ShortTermPullback),
            "hold/unclear" => Some(CompositeSignal::Hold),
            _ => None,
        }
    }

    /// One-line explanation used in the rendered summary.
    pub fn explanation(&self) -> &'static str {
        match self {
            CompositeSignal::StrongBuy => {
                "short and medium term both oversold, buy signal is strong"
            }
            CompositeSignal::StrongSell => {
                "short and medium term both overbought, sell signal is strong"
            }
            CompositeSignal::ShortTermBounce => {
                "short term oversold but medium term firm, a bounce is likely"
            }
            CompositeSignal::ShortTermPullback => {
                "short term overbought but medium term weak, a pullback is likely"
            }
            CompositeSignal::Hold => "no clear signal, wait and see",
        }
    }
}

/// A day in the volume window whose volume beat its moving average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeHit {
    pub date: NaiveDate,
    pub volume: u64,
    pub volume_ma: f64,
}

/// Verdict for one instrument at its latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub instrument_id: String,
    /// Date of the latest bar the verdict was computed on.
    pub analysis_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub close_ma: BTreeMap<usize, Option<f64>>,
    pub volume_ma: BTreeMap<usize, Option<f64>>,
    pub rsi: BTreeMap<usize, Option<f64>>,
    pub rsi_short: f64,
    pub rsi_medium: f64,
    /// Close below the short trend average for the whole trend window.
    pub condition1: bool,
    /// Close below the long trend average for the whole trend window.
    pub condition2: bool,
    pub volume_condition: bool,
    pub volume_hits: Vec<VolumeHit>,
    pub rsi_short_signal: RsiSignal,
    pub rsi_medium_signal: RsiSignal,
    pub composite: CompositeSignal,
    pub summary: String,
}
