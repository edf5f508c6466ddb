//! Series preparation: ordering and de-duplicating raw bars.

use crate::error::{AnalysisError, Result};
use crate::types::{Bar, PreparedSeries};
use tracing::debug;

/// Sort bars ascending by date and collapse duplicate dates.
///
/// When a date appears more than once the bar that came last in the input
/// wins. Missing trading days are left as gaps.
pub fn prepare_series(instrument_id: &str, mut bars: Vec<Bar>) -> Result<PreparedSeries> {
    if bars.is_empty() {
        return Err(AnalysisError::EmptySeries {
            instrument_id: instrument_id.to_string(),
        });
    }

    for bar in &bars {
        validate_bar(bar)?;
    }

    let received = bars.len();

    // Stable sort keeps input order within a date, so the last of each run is
    // the last occurrence.
    bars.sort_by_key(|b| b.date);

    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        if let Some(last) = deduped.last_mut() {
            if last.date == bar.date {
                *last = bar;
                continue;
            }
        }
        deduped.push(bar);
    }

    if deduped.len() != received {
        debug!(
            "Collapsed {} duplicate bars for {}",
            received - deduped.len(),
            instrument_id
        );
    }

    Ok(PreparedSeries::from_sorted(deduped))
}

fn validate_bar(bar: &Bar) -> Result<()> {
    let prices = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ];
    for (field, value) in prices {
        if !value.is_finite() {
            return Err(AnalysisError::InvalidBar {
                date: bar.date,
                reason: format!("{} is not a finite number", field),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        Bar::new(
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            close,
            close,
            close,
            close,
            100,
        )
    }

    #[test]
    fn test_empty_input_is_empty_series() {
        let err = prepare_series("2330", Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::EmptySeries { ref instrument_id } if instrument_id == "2330"
        ));
    }

    #[test]
    fn test_sorts_ascending() {
        let series = prepare_series("x", vec![bar(3, 3.0), bar(1, 1.0), bar(2, 2.0)]).unwrap();
        let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_dates_last_occurrence_wins() {
        let series = prepare_series(
            "x",
            vec![bar(2, 20.0), bar(1, 1.0), bar(2, 21.0), bar(3, 3.0), bar(2, 22.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[1].close, 22.0);
    }

    #[test]
    fn test_gaps_are_not_filled() {
        let series = prepare_series("x", vec![bar(1, 1.0), bar(10, 2.0)]).unwrap();
        assert_eq!(series.len(), 2);
        let range = series.date_range();
        assert_eq!(range.start.to_string(), "2024-05-01");
        assert_eq!(range.end.to_string(), "2024-05-10");
    }

    #[test]
    fn test_non_finite_price_rejected() {
        let mut bad = bar(2, 1.0);
        bad.close = f64::NAN;
        let err = prepare_series("x", vec![bar(1, 1.0), bad]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidBar { .. }));
    }
}
