use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// What RSI reports when the average loss is exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroLossPolicy {
    /// RSI = 100.
    #[default]
    Saturate,
    /// Fail the computation with `DivisionDegenerate`.
    Reject,
}

impl ZeroLossPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "saturate" | "100" => Some(Self::Saturate),
            "reject" | "error" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// RSI band boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub severe_oversold: f64,
    pub oversold: f64,
    pub overbought: f64,
    pub severe_overbought: f64,
    /// Medium RSI level splitting firm from weak for the bounce/pullback rules.
    pub composite_pivot: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            severe_oversold: 20.0,
            oversold: 30.0,
            overbought: 70.0,
            severe_overbought: 80.0,
            composite_pivot: 50.0,
        }
    }
}

/// Trailing row counts the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierWindows {
    /// Rows that must all close below the trend averages.
    pub trend: usize,
    /// Rows inspected for above-average volume.
    pub volume: usize,
    /// Rows the RSI signals read (the latest one).
    pub rsi: usize,
}

impl Default for ClassifierWindows {
    fn default() -> Self {
        Self {
            trend: 3,
            volume: 5,
            rsi: 1,
        }
    }
}

/// Indicator and classifier configuration, passed into the engine per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Close-price moving average windows.
    pub ma_windows: Vec<usize>,
    /// Volume moving average windows.
    pub volume_ma_windows: Vec<usize>,
    /// RSI periods.
    pub rsi_periods: Vec<usize>,
    /// MA window behind condition1.
    pub trend_short_ma: usize,
    /// MA window behind condition2.
    pub trend_long_ma: usize,
    /// Volume MA window behind the volume condition.
    pub volume_ma: usize,
    /// Minimum above-average days in the volume window.
    pub volume_min_hits: usize,
    pub rsi_short_period: usize,
    pub rsi_medium_period: usize,
    pub windows: ClassifierWindows,
    pub thresholds: Thresholds,
    pub zero_loss: ZeroLossPolicy,
    /// Rows handed to chart renderers.
    pub chart_lookback: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![4, 10, 20, 60],
            volume_ma_windows: vec![10],
            rsi_periods: vec![4, 14],
            trend_short_ma: 20,
            trend_long_ma: 60,
            volume_ma: 10,
            volume_min_hits: 3,
            rsi_short_period: 4,
            rsi_medium_period: 14,
            windows: ClassifierWindows::default(),
            thresholds: Thresholds::default(),
            zero_loss: ZeroLossPolicy::default(),
            chart_lookback: 30,
        }
    }
}

impl AnalysisConfig {
    /// Rows needed before every classifier rule sees defined indicator values
    /// and every configured average is defined on the latest row.
    ///
    /// A trend rule over `trend` rows of MA(w) needs `w + trend - 1` rows; the
    /// volume rule likewise. RSI is undefined on the first row.
    pub fn required_history(&self) -> usize {
        let trend_ma = self.trend_short_ma.max(self.trend_long_ma);
        let trend = trend_ma + self.windows.trend.saturating_sub(1);
        let volume = self.volume_ma + self.windows.volume.saturating_sub(1);
        let rsi = self.windows.rsi + 1;
        let widest = self
            .ma_windows
            .iter()
            .chain(&self.volume_ma_windows)
            .copied()
            .max()
            .unwrap_or(0);
        trend.max(volume).max(rsi).max(widest)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        for (name, set) in [
            ("ma_windows", &self.ma_windows),
            ("volume_ma_windows", &self.volume_ma_windows),
            ("rsi_periods", &self.rsi_periods),
        ] {
            if set.is_empty() {
                return invalid(format!("{} must not be empty", name));
            }
            if set.contains(&0) {
                return invalid(format!("{} must not contain 0", name));
            }
        }

        for (name, window) in [
            ("trend_short_ma", self.trend_short_ma),
            ("trend_long_ma", self.trend_long_ma),
        ] {
            if !self.ma_windows.contains(&window) {
                return invalid(format!("{} {} is not in ma_windows", name, window));
            }
        }
        if !self.volume_ma_windows.contains(&self.volume_ma) {
            return invalid(format!(
                "volume_ma {} is not in volume_ma_windows",
                self.volume_ma
            ));
        }
        for (name, period) in [
            ("rsi_short_period", self.rsi_short_period),
            ("rsi_medium_period", self.rsi_medium_period),
        ] {
            if !self.rsi_periods.contains(&period) {
                return invalid(format!("{} {} is not in rsi_periods", name, period));
            }
        }

        let w = &self.windows;
        if w.trend == 0 || w.volume == 0 || w.rsi == 0 {
            return invalid("classifier windows must be at least 1".to_string());
        }
        if self.volume_min_hits > w.volume {
            return invalid(format!(
                "volume_min_hits {} exceeds volume window {}",
                self.volume_min_hits, w.volume
            ));
        }

        let t = &self.thresholds;
        let ordered = 0.0 <= t.severe_oversold
            && t.severe_oversold <= t.oversold
            && t.oversold < t.overbought
            && t.overbought <= t.severe_overbought
            && t.severe_overbought <= 100.0;
        if !ordered {
            return invalid(format!("RSI thresholds out of order: {:?}", t));
        }
        if !(0.0..=100.0).contains(&t.composite_pivot) {
            return invalid(format!("composite pivot {} outside 0-100", t.composite_pivot));
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding `<instrument>.json` bar files.
    pub bars_dir: PathBuf,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = AnalysisConfig::default();

        let analysis = AnalysisConfig {
            ma_windows: env_list("SIGNALBOOK_MA_WINDOWS").unwrap_or(defaults.ma_windows),
            volume_ma_windows: env_list("SIGNALBOOK_VOLUME_MA_WINDOWS")
                .unwrap_or(defaults.volume_ma_windows),
            rsi_periods: env_list("SIGNALBOOK_RSI_PERIODS").unwrap_or(defaults.rsi_periods),
            zero_loss: env::var("SIGNALBOOK_RSI_ZERO_LOSS")
                .ok()
                .and_then(|v| ZeroLossPolicy::from_str(&v))
                .unwrap_or(defaults.zero_loss),
            chart_lookback: env::var("SIGNALBOOK_CHART_LOOKBACK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chart_lookback),
            ..defaults
        };

        Self {
            db_path: env::var("SIGNALBOOK_DB_PATH")
                .unwrap_or_else(|_| "signalbook.db".to_string())
                .into(),
            bars_dir: env::var("SIGNALBOOK_BARS_DIR")
                .unwrap_or_else(|_| "bars".to_string())
                .into(),
            analysis,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_list(key: &str) -> Option<Vec<usize>> {
    env::var(key).ok().and_then(|v| parse_list(&v))
}

/// Parse "4,10,20" into windows. Any bad entry rejects the whole list.
pub fn parse_list(s: &str) -> Option<Vec<usize>> {
    let values: Option<Vec<usize>> = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().ok())
        .collect();
    values.filter(|v| !v.is_empty())
}
