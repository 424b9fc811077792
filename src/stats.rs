//! NaN-aware descriptive statistics and rolling windows.
//!
//! NaN marks a missing value: it is skipped by reductions and counts against
//! `min_periods` in rolling windows.

pub fn mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));

    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.len() <= ddof {
        return f64::NAN;
    }

    let mu = mean(&valid);
    let ss: f64 = valid.iter().map(|v| (v - mu).powi(2)).sum();

    (ss / (valid.len() - ddof) as f64).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between the closest ranks.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Shifts by `periods` positions; positive looks back, negative looks ahead.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let source = i - periods;
            if (0..n).contains(&source) {
                values[source as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Trailing window ending at each position (inclusive).
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, mean)
}

pub fn rolling_std(values: &[f64], window: usize, min_periods: usize, ddof: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| std_dev(w, ddof))
}

fn rolling(
    values: &[f64],
    window: usize,
    min_periods: usize,
    reduce: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            let valid = slice.iter().filter(|v| !v.is_nan()).count();
            if valid < min_periods.max(1) {
                f64::NAN
            } else {
                reduce(slice)
            }
        })
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn should_skip_nan_in_reductions() {
        let values = [1.0, f64::NAN, 3.0];
        assert_relative_eq!(mean(&values), 2.0);
        assert_relative_eq!(median(&values), 2.0);
        assert_relative_eq!(std_dev(&values, 1), 2f64.sqrt());
    }

    #[test]
    fn should_return_nan_when_degrees_of_freedom_exhausted() {
        assert!(std_dev(&[5.0], 1).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn should_interpolate_quantiles() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_relative_eq!(quantile(&values, 0.01), 1.0);
        assert_relative_eq!(quantile(&[1.0, 2.0], 0.25), 1.25);
    }

    #[test]
    fn should_shift_both_directions() {
        let values = [1.0, 2.0, 3.0];
        let back = shift(&values, 1);
        assert!(back[0].is_nan());
        assert_eq!(&back[1..], &[1.0, 2.0]);

        let ahead = shift(&values, -1);
        assert_eq!(&ahead[..2], &[2.0, 3.0]);
        assert!(ahead[2].is_nan());
    }

    #[test]
    fn should_require_min_periods_in_rolling_windows() {
        let values = [1.0, 2.0, 3.0, f64::NAN, 5.0];
        let means = rolling_mean(&values, 3, 3);

        assert!(means[0].is_nan());
        assert!(means[1].is_nan());
        assert_relative_eq!(means[2], 2.0);
        assert!(means[3].is_nan());
        assert!(means[4].is_nan());

        let relaxed = rolling_mean(&values, 3, 2);
        assert_relative_eq!(relaxed[4], 4.0);
    }

    #[test]
    fn should_compute_population_rolling_std() {
        let values = [1.0, 2.0, 3.0];
        let stds = rolling_std(&values, 3, 3, 0);
        assert_relative_eq!(stds[2], (2.0f64 / 3.0).sqrt());
    }
}
