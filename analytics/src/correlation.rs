use std::fmt;

use ndarray::Array2;
use ndarray_stats::CorrelationExt;
use polars::prelude::*;
use statrs::statistics::Statistics;

use crate::models::polars_err;

/// Qualitative bucket for a Pearson coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStrength {
    StrongPositive,
    ModeratePositive,
    WeakPositive,
    StrongNegative,
    ModerateNegative,
    WeakNegative,
}

impl CorrelationStrength {
    /// Boundaries belong to the weaker bucket; `0.0` and NaN land in `WeakNegative`.
    pub fn classify(r: f64) -> Self {
        if r > 0.7 {
            CorrelationStrength::StrongPositive
        } else if r > 0.4 {
            CorrelationStrength::ModeratePositive
        } else if r > 0.0 {
            CorrelationStrength::WeakPositive
        } else if r < -0.7 {
            CorrelationStrength::StrongNegative
        } else if r < -0.4 {
            CorrelationStrength::ModerateNegative
        } else {
            CorrelationStrength::WeakNegative
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CorrelationStrength::StrongPositive => "Strong positive",
            CorrelationStrength::ModeratePositive => "Moderate positive",
            CorrelationStrength::WeakPositive => "Weak positive",
            CorrelationStrength::StrongNegative => "Strong negative",
            CorrelationStrength::ModerateNegative => "Moderate negative",
            CorrelationStrength::WeakNegative => "Weak negative",
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pearson correlation of two equally long samples. NaN when either side is
/// constant or there are fewer than two observations.
pub fn pearson(x: &[f64], y: &[f64]) -> PolarsResult<f64> {
    if x.len() != y.len() {
        return Err(PolarsError::ShapeMismatch(
            format!("pearson: {} vs {} observations", x.len(), y.len()).into(),
        ));
    }
    let n = x.len();
    if n < 2 {
        return Ok(f64::NAN);
    }
    let observations = Array2::from_shape_vec((2, n), x.iter().chain(y.iter()).copied().collect())
        .map_err(|e| polars_err(Box::new(e)))?;
    let corr = observations
        .pearson_correlation()
        .map_err(|e| polars_err(Box::new(e)))?;
    Ok(corr[[0, 1]])
}

/// Ordinary least squares line `y = slope * x + intercept`.
pub fn ols_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let var_x = x.iter().variance();
    if !var_x.is_finite() || var_x == 0.0 {
        return None;
    }
    let slope = x.iter().covariance(y.iter()) / var_x;
    let intercept = y.iter().mean() - slope * x.iter().mean();
    Some((slope, intercept))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries_fall_to_weaker_bucket() {
        use CorrelationStrength::*;
        assert_eq!(CorrelationStrength::classify(0.71), StrongPositive);
        assert_eq!(CorrelationStrength::classify(0.7), ModeratePositive);
        assert_eq!(CorrelationStrength::classify(0.41), ModeratePositive);
        assert_eq!(CorrelationStrength::classify(0.4), WeakPositive);
        assert_eq!(CorrelationStrength::classify(0.0), WeakNegative);
        assert_eq!(CorrelationStrength::classify(-0.4), WeakNegative);
        assert_eq!(CorrelationStrength::classify(-0.41), ModerateNegative);
        assert_eq!(CorrelationStrength::classify(-0.7), ModerateNegative);
        assert_eq!(CorrelationStrength::classify(-0.71), StrongNegative);
        assert_eq!(CorrelationStrength::classify(f64::NAN), WeakNegative);
        // pure
        assert_eq!(CorrelationStrength::classify(0.55), CorrelationStrength::classify(0.55));
    }

    #[test]
    fn pearson_is_symmetric() {
        let likes = [10.0, 250.0, 31.0, 4000.0, 77.0, 950.0];
        let followers = [1_000.0, 9_000.0, 2_500.0, 80_000.0, 400.0, 33_000.0];
        let a = pearson(&likes, &followers).unwrap();
        let b = pearson(&followers, &likes).unwrap();
        assert!((a - b).abs() < 1e-12);
        assert!(a > 0.9);
    }

    #[test]
    fn pearson_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0], &[2.0]).unwrap().is_nan());
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn ols_line_recovers_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let (slope, intercept) = ols_line(&x, &y).unwrap();
        assert!((slope - 3.0).abs() < 1e-12);
        assert!((intercept + 2.0).abs() < 1e-12);
        assert!(ols_line(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }
}
