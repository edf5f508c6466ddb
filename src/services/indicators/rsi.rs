//! Relative Strength Index (RSI) with exponential smoothing.

use crate::config::ZeroLossPolicy;
use crate::error::{AnalysisError, Result};

/// RSI aligned to `closes`.
///
/// Gains and losses are smoothed with `avg = a * x + (1 - a) * avg_prev`,
/// `a = 1 / period`, starting from the first price change. Row 0 has no
/// change and is `None`. Values range 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A zero average loss is resolved by `policy`.
pub fn smoothed_rsi(
    closes: &[f64],
    period: usize,
    policy: ZeroLossPolicy,
) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(AnalysisError::InvalidConfig(
            "RSI period must be at least 1".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return Ok(out);
    }
    out.push(None);

    let alpha = 1.0 / period as f64;
    let mut averages: Option<(f64, f64)> = None;

    for (index, pair) in closes.windows(2).enumerate() {
        let index = index + 1;
        let change = pair[1] - pair[0];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        let (avg_gain, avg_loss) = match averages {
            None => (gain, loss),
            Some((prev_gain, prev_loss)) => (
                alpha * gain + (1.0 - alpha) * prev_gain,
                alpha * loss + (1.0 - alpha) * prev_loss,
            ),
        };
        averages = Some((avg_gain, avg_loss));

        let rsi = rsi_from_averages(avg_gain, avg_loss, policy)
            .ok_or(AnalysisError::DivisionDegenerate { period, index })?;
        out.push(Some(rsi));
    }

    Ok(out)
}

/// RSI from smoothed averages. `None` only when the policy rejects a zero loss.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64, policy: ZeroLossPolicy) -> Option<f64> {
    if avg_loss == 0.0 {
        return match policy {
            ZeroLossPolicy::Saturate => Some(100.0),
            ZeroLossPolicy::Reject => None,
        };
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rsi_first_row_undefined() {
        let out = smoothed_rsi(&[10.0, 11.0], 14, ZeroLossPolicy::Saturate).unwrap();
        assert_eq!(out[0], None);
        assert!(out[1].is_some());
    }

    #[test]
    fn test_rsi_empty_input() {
        let out = smoothed_rsi(&[], 14, ZeroLossPolicy::Saturate).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_rsi_seeds_from_first_change() {
        // Changes: +2, -1, +1 with period 2 (alpha 0.5)
        // row1: gain 2, loss 0            -> saturated
        // row2: gain 1.0, loss 0.5        -> rs 2 -> 66.666..
        // row3: gain 1.0, loss 0.25       -> rs 4 -> 80
        let out = smoothed_rsi(&[10.0, 12.0, 11.0, 12.0], 2, ZeroLossPolicy::Saturate).unwrap();
        assert_eq!(out[1], Some(100.0));
        assert!(approx(out[2].unwrap(), 200.0 / 3.0));
        assert!(approx(out[3].unwrap(), 80.0));
    }

    #[test]
    fn test_rsi_falling_series_is_zero() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = smoothed_rsi(&closes, 14, ZeroLossPolicy::Saturate).unwrap();
        for value in out.iter().skip(1) {
            assert!(approx(value.unwrap(), 0.0));
        }
    }

    #[test]
    fn test_rsi_rising_series_saturates() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = smoothed_rsi(&closes, 4, ZeroLossPolicy::Saturate).unwrap();
        assert!(out.iter().skip(1).all(|v| *v == Some(100.0)));
    }

    #[test]
    fn test_rsi_reject_policy_reports_first_degenerate_row() {
        let err = smoothed_rsi(&[1.0, 2.0, 3.0], 4, ZeroLossPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DivisionDegenerate {
                period: 4,
                index: 1,
            }
        ));
    }

    #[test]
    fn test_rsi_reject_policy_passes_when_losses_exist() {
        let out = smoothed_rsi(&[3.0, 2.0, 3.0, 2.5], 4, ZeroLossPolicy::Reject).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_rsi_zero_period_rejected() {
        assert!(smoothed_rsi(&[1.0, 2.0], 0, ZeroLossPolicy::Saturate).is_err());
    }

    proptest! {
        #[test]
        fn prop_rsi_bounded(
            closes in prop::collection::vec(1.0f64..1000.0, 2..120),
            period in 1usize..30,
        ) {
            let out = smoothed_rsi(&closes, period, ZeroLossPolicy::Saturate).unwrap();
            prop_assert_eq!(out.len(), closes.len());
            prop_assert!(out[0].is_none());
            for value in out.iter().skip(1) {
                let v = value.expect("defined after the first row");
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }

        #[test]
        fn prop_rsi_is_causal(
            closes in prop::collection::vec(1.0f64..1000.0, 3..60),
            cut in 2usize..60,
        ) {
            let cut = cut.min(closes.len());
            let full = smoothed_rsi(&closes, 14, ZeroLossPolicy::Saturate).unwrap();
            let prefix = smoothed_rsi(&closes[..cut], 14, ZeroLossPolicy::Saturate).unwrap();
            prop_assert_eq!(&full[..cut], &prefix[..]);
        }
    }
}
