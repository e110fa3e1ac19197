//! Descriptive statistics used by the normalizer, aggregator and scorer.
//!
//! Two standard deviation flavours are needed: the sample estimate (n-1) for
//! per-trial series and per-channel cross-trial spreads, and the population
//! estimate (n) for saturation counts, movement totals and humidity /
//! temperature variability.

use statrs::statistics::Statistics;

/// Median, `NaN` for an empty slice. Even lengths average the two middle
/// values exactly.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Arithmetic mean, `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation, `NaN` with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    values.iter().std_dev()
}

/// Population standard deviation, `NaN` for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().population_std_dev()
}

/// Mean over the finite values only.
pub fn nan_mean(values: &[f64]) -> f64 {
    mean(&finite(values))
}

/// Sample standard deviation over the finite values only.
pub fn nan_sample_std(values: &[f64]) -> f64 {
    sample_std(&finite(values))
}

/// Population standard deviation over the finite values only.
pub fn nan_population_std(values: &[f64]) -> f64 {
    population_std(&finite(values))
}

/// `max - min`, 0 for an empty slice.
pub fn range(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

/// Sign as an integer in {-1, 0, 1}.
pub fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_std_flavours() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&values) - 2.0).abs() < 1e-12);
        assert!((sample_std(&values) - 2.138_089_935_299_395).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_nan());
        assert_eq!(population_std(&[1.0]), 0.0);
    }

    #[test]
    fn test_nan_aware_reductions() {
        let values = [1.0, f64::NAN, 3.0];
        assert_eq!(nan_mean(&values), 2.0);
        assert!((nan_sample_std(&values) - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_range_and_sign() {
        assert_eq!(range(&[40.0, 42.5, 41.0]), 2.5);
        assert_eq!(range(&[]), 0.0);
        assert_eq!(sign(-0.3), -1);
        assert_eq!(sign(0.0), 0);
        assert_eq!(sign(1e-9), 1);
    }
}
