//! Per-instrument analysis pipeline: prepare, compute, classify, persist.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result, StoreError};
use crate::services::classifier::classify;
use crate::services::indicators::compute_features;
use crate::services::prepare::prepare_series;
use crate::services::ResultStore;
use crate::sources::BarSource;
use crate::types::{Bar, ClassificationResult, DateRange, FeatureRow, FeatureSeries};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub instrument_id: String,
    /// Range recorded with the raw series.
    pub range: DateRange,
    pub features: FeatureSeries,
    pub result: ClassificationResult,
    pub chart_lookback: usize,
}

impl Analysis {
    pub fn summary(&self) -> &str {
        &self.result.summary
    }

    /// The trailing rows a chart renderer should draw.
    pub fn chart_rows(&self) -> &[FeatureRow] {
        self.features.recent(self.chart_lookback)
    }
}

/// Run the in-memory part of the pipeline. Nothing is persisted.
///
/// `range` is the window the bars were requested for; when absent the span of
/// the prepared series is used.
pub fn evaluate(
    instrument_id: &str,
    bars: Vec<Bar>,
    range: Option<DateRange>,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let instrument_id = instrument_id.trim();
    if instrument_id.is_empty() {
        return Err(AnalysisError::InvalidInstrument(instrument_id.to_string()));
    }

    let series = prepare_series(instrument_id, bars)?;
    let range = range.unwrap_or_else(|| series.date_range());

    let required = config.required_history();
    if series.len() < required {
        return Err(AnalysisError::InsufficientHistory {
            required,
            available: series.len(),
        });
    }

    debug!(
        "Computing indicators for {} over {} bars",
        instrument_id,
        series.len()
    );
    let features = compute_features(&series, config)?;
    let result = classify(instrument_id, &features, config)?;

    Ok(Analysis {
        instrument_id: instrument_id.to_string(),
        range,
        features,
        result,
        chart_lookback: config.chart_lookback,
    })
}

/// Runs analyses against a shared result store.
pub struct Analyzer {
    store: Arc<ResultStore>,
    config: AnalysisConfig,
}

impl Analyzer {
    /// Create an analyzer. The configuration is validated once here.
    pub fn new(store: Arc<ResultStore>, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Analyze bars and persist the raw series and result.
    ///
    /// If only the write fails the error carries the finished analysis so the
    /// caller can retry with [`Analyzer::persist`].
    pub fn analyze(
        &self,
        instrument_id: &str,
        bars: Vec<Bar>,
        range: Option<DateRange>,
    ) -> Result<Analysis> {
        let analysis = evaluate(instrument_id, bars, range, &self.config)?;

        if let Err(source) = self.persist(&analysis) {
            warn!(
                "Failed to persist analysis for {}: {}",
                analysis.instrument_id, source
            );
            return Err(AnalysisError::StoreWrite {
                instrument_id: analysis.instrument_id.clone(),
                source,
                analysis: Box::new(analysis),
            });
        }

        info!(
            "Analyzed {} on {}: RSI{}={:.2} ({}), RSI{}={:.2} ({}), composite={}",
            analysis.instrument_id,
            analysis.result.analysis_date,
            self.config.rsi_short_period,
            analysis.result.rsi_short,
            analysis.result.rsi_short_signal.label(),
            self.config.rsi_medium_period,
            analysis.result.rsi_medium,
            analysis.result.rsi_medium_signal.label(),
            analysis.result.composite.label()
        );

        Ok(analysis)
    }

    /// Fetch bars from a source, then analyze and persist them.
    pub fn analyze_from<S: BarSource + ?Sized>(
        &self,
        source: &S,
        instrument_id: &str,
        range: DateRange,
    ) -> Result<Analysis> {
        let bars = source.fetch(instrument_id, range)?;
        debug!("Fetched {} bars for {}", bars.len(), instrument_id);
        self.analyze(instrument_id, bars, Some(range))
    }

    /// Write a finished analysis to the store.
    pub fn persist(&self, analysis: &Analysis) -> std::result::Result<(), StoreError> {
        self.store.persist_analysis(
            &analysis.instrument_id,
            analysis.range,
            &analysis.features,
            &analysis.result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(count: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..count)
            .map(|i| {
                let close = 100.0 + (i % 7) as f64 - (i % 3) as f64;
                Bar::new(
                    start + Duration::days(i as i64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1_000 + (i % 4) as u64 * 100,
                )
            })
            .collect()
    }

    #[test]
    fn test_evaluate_rejects_blank_instrument() {
        let err = evaluate("  ", bars(70), None, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInstrument(_)));
    }

    #[test]
    fn test_evaluate_uses_series_span_without_range() {
        let analysis = evaluate("2330", bars(70), None, &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.range.start.to_string(), "2024-01-01");
        assert_eq!(analysis.range.end, analysis.result.analysis_date);
    }

    #[test]
    fn test_evaluate_keeps_requested_range() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        let analysis = evaluate("2330", bars(70), Some(range), &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.range, range);
    }

    #[test]
    fn test_evaluate_requires_widest_configured_window() {
        let config = AnalysisConfig {
            ma_windows: vec![4, 10, 20, 60, 120],
            ..AnalysisConfig::default()
        };
        let err = evaluate("2330", bars(70), None, &config).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientHistory {
                required: 120,
                available: 70,
            }
        ));
        assert!(evaluate("2330", bars(120), None, &config).is_ok());
    }

    #[test]
    fn test_chart_rows_use_lookback() {
        let analysis = evaluate("2330", bars(70), None, &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.chart_rows().len(), 30);
        assert_eq!(
            analysis.chart_rows().last().unwrap().bar.date,
            analysis.result.analysis_date
        );
    }

    #[test]
    fn test_analyzer_rejects_invalid_config() {
        let store = Arc::new(ResultStore::new_in_memory().unwrap());
        let config = AnalysisConfig {
            rsi_short_period: 5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            Analyzer::new(store, config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_insufficient_history_persists_nothing() {
        let store = Arc::new(ResultStore::new_in_memory().unwrap());
        let analyzer = Analyzer::new(store.clone(), AnalysisConfig::default()).unwrap();

        let err = analyzer.analyze("2330", bars(61), None).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientHistory {
                required: 62,
                available: 61,
            }
        ));
        assert_eq!(store.result_count().unwrap(), 0);
        assert_eq!(store.raw_count().unwrap(), 0);
    }
}
