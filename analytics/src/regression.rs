//! Single-feature least squares with a seeded hold-out split.

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

use crate::models::polars_err;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Fitted line plus its held-out evaluation.
#[derive(Debug, Clone)]
pub struct HeldOutFit {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
    pub train_size: usize,
    pub test_x: Vec<f64>,
    pub test_y: Vec<f64>,
    pub test_pred: Vec<f64>,
}

impl HeldOutFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

// ───────── helpers ─────────

/// Shuffled `(train, test)` row indices; the test side gets `ceil(n * test_fraction)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.min(n);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test = order[..n_test].to_vec();
    let train = order[n_test..].to_vec();
    (train, test)
}

/// Coefficient of determination via linfa. A constant target scores 1.0 when
/// matched exactly and 0.0 otherwise, instead of dividing by zero.
pub fn r2_score(actual: &Array1<f64>, predicted: &Array1<f64>) -> PolarsResult<f64> {
    if actual.is_empty() {
        return Ok(f64::NAN);
    }
    if actual.iter().all(|a| *a == actual[0]) {
        let exact = actual.iter().zip(predicted.iter()).all(|(a, p)| a == p);
        return Ok(if exact { 1.0 } else { 0.0 });
    }
    predicted.r2(actual).map_err(|e| polars_err(Box::new(e)))
}

fn column_matrix(values: &[f64]) -> PolarsResult<Array2<f64>> {
    Array2::from_shape_vec((values.len(), 1), values.to_vec())
        .map_err(|e| polars_err(Box::new(e)))
}

// ───────── public API ─────────

/// Fit `y ~ x` on the training split and score it on the test split.
pub fn fit_held_out(x: &[f64], y: &[f64], test_fraction: f64, seed: u64) -> PolarsResult<HeldOutFit> {
    if x.len() != y.len() {
        return Err(PolarsError::ShapeMismatch(
            format!("regression: {} features vs {} targets", x.len(), y.len()).into(),
        ));
    }
    let (train_idx, test_idx) = train_test_split(x.len(), test_fraction, seed);
    if train_idx.len() < 2 || test_idx.is_empty() {
        return Err(PolarsError::ComputeError(
            format!("not enough rows for a hold-out regression ({})", x.len()).into(),
        ));
    }

    let train_x: Vec<f64> = train_idx.iter().map(|&i| x[i]).collect();
    let train_y: Array1<f64> = train_idx.iter().map(|&i| y[i]).collect();
    let test_x: Vec<f64> = test_idx.iter().map(|&i| x[i]).collect();
    let test_y: Array1<f64> = test_idx.iter().map(|&i| y[i]).collect();

    let dataset = Dataset::new(column_matrix(&train_x)?, train_y);
    let model = LinearRegression::default()
        .fit(&dataset)
        .map_err(|e| polars_err(Box::new(e)))?;

    let slope = model.params()[0];
    let intercept = model.intercept();

    let pred: Array1<f64> = model.predict(&column_matrix(&test_x)?);
    let r2 = r2_score(&test_y, &pred)?;

    debug!(
        "OLS on {} train / {} test rows: slope {:.6}, intercept {:.3}, R² {:.4}",
        train_idx.len(),
        test_idx.len(),
        slope,
        intercept,
        r2
    );

    Ok(HeldOutFit {
        slope,
        intercept,
        r2,
        train_size: train_idx.len(),
        test_x,
        test_y: test_y.to_vec(),
        test_pred: pred.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn split_is_reproducible_and_disjoint() {
        let (train_a, test_a) = train_test_split(10, 0.2, 42);
        let (train_b, test_b) = train_test_split(10, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 2);
        assert_eq!(train_a.len(), 8);
        assert!(test_a.iter().all(|i| !train_a.contains(i)));

        let (_, test_c) = train_test_split(11, 0.2, 42);
        assert_eq!(test_c.len(), 3);
    }

    #[test]
    fn perfect_line_is_recovered() {
        let likes: Vec<f64> = (1..=50).map(|v| v as f64 * 37.0).collect();
        let followers: Vec<f64> = likes.iter().map(|l| 50.0 * l + 1000.0).collect();
        let fit = fit_held_out(&likes, &followers, DEFAULT_TEST_FRACTION, DEFAULT_SEED).unwrap();
        assert!((fit.r2 - 1.0).abs() < 1e-6, "r2 = {}", fit.r2);
        assert!((fit.slope - 50.0).abs() < 1e-6, "slope = {}", fit.slope);
        assert!((fit.intercept - 1000.0).abs() < 1e-3, "intercept = {}", fit.intercept);
        assert_eq!(fit.test_x.len(), 10);
        assert_eq!(fit.train_size, 40);
    }

    #[test]
    fn r2_handles_constant_targets() {
        let flat = array![3.0, 3.0];
        assert_eq!(r2_score(&flat, &array![3.0, 3.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&flat, &array![2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn r2_scores_predictions_against_the_actual_values() {
        let actual = array![1.0, 2.0, 3.0];
        assert!((r2_score(&actual, &actual.clone()).unwrap() - 1.0).abs() < 1e-9);
        // predicting the mean everywhere explains nothing
        let mean = array![2.0, 2.0, 2.0];
        assert!(r2_score(&actual, &mean).unwrap().abs() < 1e-9);
    }

    #[test]
    fn too_few_rows_is_an_error() {
        assert!(fit_held_out(&[1.0, 2.0], &[2.0, 4.0], 0.2, 42).is_err());
    }
}
