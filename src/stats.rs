/// Arithmetic mean, or `None` for an empty slice.
pub fn mean_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn min_f64(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max_f64(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Mean absolute difference between consecutive values.
///
/// Requires at least two values.
pub fn mean_abs_diff(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let diffs: Vec<f64> =
        values.windows(2).map(|pair| (pair[0] - pair[1]).abs()).collect();

    mean_f64(&diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean_f64(&[]), None);
        assert_eq!(min_f64(&[]), None);
        assert_eq!(max_f64(&[]), None);
    }

    #[test]
    fn test_mean_values() {
        assert_eq!(mean_f64(&[100.0, 120.0, 110.0]), Some(110.0));
        assert_eq!(min_f64(&[3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(max_f64(&[3.0, 1.0, 2.0]), Some(3.0));
    }

    #[test]
    fn test_mean_abs_diff() {
        assert_eq!(mean_abs_diff(&[10.0]), None);
        assert_eq!(mean_abs_diff(&[10.0, 20.0, 15.0]), Some(7.5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: min <= mean <= max for any non-empty input
        #[test]
        fn mean_is_bounded_by_min_and_max(
            values in prop::collection::vec(0.0f64..10_000.0, 1..200)
        ) {
            let mean = mean_f64(&values).unwrap();
            let min = min_f64(&values).unwrap();
            let max = max_f64(&values).unwrap();

            // Summation error is far below this tolerance for these ranges
            prop_assert!(min <= mean + 1e-9, "min {} > mean {}", min, mean);
            prop_assert!(mean <= max + 1e-9, "mean {} > max {}", mean, max);
        }

        #[test]
        fn mean_abs_diff_is_non_negative(
            values in prop::collection::vec(0.0f64..1000.0, 2..50)
        ) {
            prop_assert!(mean_abs_diff(&values).unwrap() >= 0.0);
        }
    }
}
