//! Descriptive statistics and fit metrics over nalgebra vectors

use nalgebra::DVector;

/// Whether the values have no spread relative to their own magnitude
///
/// Fewer than two values count as constant.
pub(crate) fn is_constant(values: &DVector<f64>) -> bool {
    if values.len() < 2 {
        return true;
    }
    let tolerance = values.len() as f64 * f64::EPSILON * values.amax();
    values.variance().sqrt() <= tolerance
}

pub(crate) fn mean(values: &DVector<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.mean()
}

/// Population standard deviation (ddof = 0)
pub(crate) fn population_std(values: &DVector<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.variance().sqrt()
}

/// Sample standard deviation (Bessel's correction)
pub(crate) fn sample_std(values: &DVector<f64>) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    (values.variance() * n / (n - 1.0)).sqrt()
}

pub(crate) fn min(values: &DVector<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.min()
}

pub(crate) fn max(values: &DVector<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.max()
}

/// Pearson correlation over pairs where both values are present
///
/// Returns `None` when fewer than two pairs remain or either side is constant.
pub(crate) fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }

    let xs = DVector::from_vec(xs);
    let ys = DVector::from_vec(ys);
    if is_constant(&xs) || is_constant(&ys) {
        return None;
    }

    let dx = xs.add_scalar(-xs.mean());
    let dy = ys.add_scalar(-ys.mean());
    let r = dx.dot(&dy) / (dx.norm() * dy.norm());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Coefficient of determination; NaN when the observed values are constant
pub(crate) fn r2_score(observed: &DVector<f64>, predicted: &DVector<f64>) -> f64 {
    if is_constant(observed) {
        return f64::NAN;
    }
    let sse = (observed - predicted).norm_squared();
    let sst = observed.add_scalar(-observed.mean()).norm_squared();
    1.0 - sse / sst
}

pub(crate) fn rmse(observed: &DVector<f64>, predicted: &DVector<f64>) -> f64 {
    (observed - predicted).norm() / (observed.len() as f64).sqrt()
}

pub(crate) fn mae(observed: &DVector<f64>, predicted: &DVector<f64>) -> f64 {
    (observed - predicted).abs().sum() / observed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(values)
    }

    #[test]
    fn test_std_variants() {
        let values = vector(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        assert!((population_std(&values) - 2.0).abs() < 1e-12);
        assert!((sample_std(&values) - 2.138).abs() < 1e-3);
        assert!(sample_std(&vector(&[1.0])).is_nan());
        assert!(mean(&vector(&[])).is_nan());
    }

    #[test]
    fn test_min_max() {
        let values = vector(&[3.0, -1.5, 8.0]);
        assert_eq!(min(&values), -1.5);
        assert_eq!(max(&values), 8.0);
        assert!(min(&vector(&[])).is_nan());
    }

    #[test]
    fn test_constant_detection_is_scale_relative() {
        assert!(is_constant(&vector(&[0.1, 0.1, 0.1])));
        assert!(is_constant(&vector(&[123456.7; 5])));
        assert!(is_constant(&vector(&[4.0])));
        assert!(!is_constant(&vector(&[1e-9, 2e-9, 3e-9])));
        assert!(!is_constant(&vector(&[1e6, 1e6 + 1.0])));
    }

    #[test]
    fn test_pearson_perfect_and_missing() {
        let x = [Some(1.0), Some(2.0), None, Some(4.0)];
        let y = [Some(3.0), Some(5.0), Some(100.0), Some(9.0)];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);

        let neg = [Some(9.0), Some(5.0), Some(0.0), Some(3.0)];
        assert!((pearson(&x, &neg).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_small_magnitude_values() {
        let x: Vec<Option<f64>> = (1..=5).map(|i| Some(i as f64 * 1e-9)).collect();
        let y: Vec<Option<f64>> = x.iter().map(|v| v.map(|v| 3e9 * v + 1.0)).collect();
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_undefined_cases() {
        let constant = [Some(1.0), Some(1.0), Some(1.0)];
        let y = [Some(1.0), Some(2.0), Some(3.0)];
        assert_eq!(pearson(&constant, &y), None);
        assert_eq!(pearson(&[Some(1.0), None], &[Some(2.0), Some(3.0)]), None);
    }

    #[test]
    fn test_fit_metrics() {
        let observed = vector(&[1.0, 2.0, 3.0]);
        assert_eq!(r2_score(&observed, &observed), 1.0);
        assert!((rmse(&observed, &vector(&[2.0, 3.0, 4.0])) - 1.0).abs() < 1e-12);
        assert!((mae(&observed, &vector(&[0.0, 2.0, 5.0])) - 1.0).abs() < 1e-12);
        assert!(r2_score(&vector(&[2.0, 2.0]), &vector(&[1.0, 3.0])).is_nan());
    }
}
