//! Simple Moving Average (SMA).

/// Trailing arithmetic mean aligned to `values`.
///
/// Entry `i` is the mean of `values[i + 1 - window..=i]`, or `None` while fewer
/// than `window` values exist. A zero window yields no values at all.
pub fn simple_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    // Summed per window, no running total.
    for (offset, chunk) in values.windows(window).enumerate() {
        out[offset + window - 1] = Some(chunk.iter().sum::<f64>() / window as f64);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sma_undefined_until_window_filled() {
        let out = simple_moving_average(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sma_shorter_than_window_all_undefined() {
        let out = simple_moving_average(&[1.0, 2.0], 4);
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn test_sma_window_one_is_identity() {
        let values = [5.0, 7.5, 1.25];
        let out = simple_moving_average(&values, 1);
        assert_eq!(out, vec![Some(5.0), Some(7.5), Some(1.25)]);
    }

    #[test]
    fn test_sma_zero_window() {
        assert_eq!(simple_moving_average(&[1.0], 0), vec![None]);
    }

    #[test]
    fn test_sma_empty_input() {
        assert!(simple_moving_average(&[], 3).is_empty());
    }

    proptest! {
        #[test]
        fn prop_sma_matches_trailing_mean(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 0..80),
            window in 1usize..25,
        ) {
            let out = simple_moving_average(&values, window);
            prop_assert_eq!(out.len(), values.len());

            for (i, value) in out.iter().enumerate() {
                if i + 1 < window {
                    prop_assert!(value.is_none());
                } else {
                    let slice = &values[i + 1 - window..=i];
                    let expected = slice.iter().sum::<f64>() / window as f64;
                    let actual = value.expect("defined once the window is full");
                    prop_assert!((actual - expected).abs() <= 1e-9 * expected.abs().max(1.0));
                }
            }
        }
    }
}
