use ndarray::Array2;
use polars::prelude::*;

use crate::helper_functions::{f64_values, str_values};

/// Column names grouped by how they enter the feature matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSplit {
    pub numerical: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureSplit {
    pub fn is_empty(&self) -> bool {
        self.numerical.is_empty() && self.categorical.is_empty()
    }

    /// Numerical first, then categorical, as shown in hover text.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.numerical.iter().chain(self.categorical.iter())
    }
}

/// Integers and floats are numerical, strings categorical, anything else is ignored.
pub fn split_features(df: &DataFrame) -> FeatureSplit {
    let mut split = FeatureSplit::default();
    for column in df.get_columns() {
        let dtype = column.dtype();
        if dtype.is_integer() || dtype.is_float() {
            split.numerical.push(column.name().to_string());
        } else if matches!(dtype, DataType::String) {
            split.categorical.push(column.name().to_string());
        }
    }
    split
}

pub fn numeric_columns(df: &DataFrame, names: &[String]) -> PolarsResult<Vec<Vec<Option<f64>>>> {
    names.iter().map(|n| f64_values(df, n)).collect()
}

pub fn string_columns(df: &DataFrame, names: &[String]) -> PolarsResult<Vec<Vec<Option<String>>>> {
    names.iter().map(|n| str_values(df, n)).collect()
}

/// Z-scoring with population standard deviation. Missing values are imputed
/// with the column mean (so they land on zero), constant columns get scale 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(columns: &[Vec<Option<f64>>]) -> Self {
        let mut scaler = StandardScaler::default();
        for column in columns {
            let present: Vec<f64> = column.iter().flatten().copied().collect();
            if present.is_empty() {
                scaler.means.push(0.0);
                scaler.scales.push(1.0);
                continue;
            }
            let n = present.len() as f64;
            let mean = present.iter().sum::<f64>() / n;
            let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            scaler.means.push(mean);
            scaler.scales.push(if std > 0.0 { std } else { 1.0 });
        }
        scaler
    }

    /// Rows × columns matrix of scaled values.
    pub fn transform(&self, columns: &[Vec<Option<f64>>]) -> Array2<f64> {
        let n_rows = columns.first().map_or(0, Vec::len);
        Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| {
            let value = columns[j][i].unwrap_or(self.means[j]);
            (value - self.means[j]) / self.scales[j]
        })
    }

    pub fn fit_transform(columns: &[Vec<Option<f64>>]) -> Array2<f64> {
        Self::fit(columns).transform(columns)
    }
}

/// One indicator column per distinct value, categories in sorted order.
/// Nulls and values not seen while fitting encode as all zeros.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(columns: &[Vec<Option<String>>]) -> Self {
        let categories = columns
            .iter()
            .map(|column| {
                let mut values: Vec<String> = column.iter().flatten().cloned().collect();
                values.sort();
                values.dedup();
                values
            })
            .collect();
        OneHotEncoder { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn transform(&self, columns: &[Vec<Option<String>>]) -> Array2<f64> {
        let n_rows = columns.first().map_or(0, Vec::len);
        let mut out = Array2::zeros((n_rows, self.width()));
        let mut offset = 0;
        for (column, categories) in columns.iter().zip(&self.categories) {
            for (i, value) in column.iter().enumerate() {
                let hit = value
                    .as_ref()
                    .and_then(|v| categories.binary_search(v).ok());
                if let Some(k) = hit {
                    out[[i, offset + k]] = 1.0;
                }
            }
            offset += categories.len();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn splits_by_dtype() {
        let df = df!(
            "name" => &["a", "b"],
            "views" => &[1i64, 2],
            "ratio" => &[0.5, 0.7],
            "flag" => &[true, false]
        )
        .unwrap();
        let split = split_features(&df);
        assert_eq!(split.numerical, vec!["views".to_string(), "ratio".to_string()]);
        assert_eq!(split.categorical, vec!["name".to_string()]);
    }

    #[test]
    fn scaler_imputes_mean_and_handles_constants() {
        let columns = vec![
            vec![Some(1.0), None, Some(3.0)],
            vec![Some(5.0), Some(5.0), Some(5.0)],
        ];
        let m = StandardScaler::fit_transform(&columns);
        assert_eq!(m.dim(), (3, 2));
        assert!((m[[0, 0]] + 1.0).abs() < 1e-12);
        assert_eq!(m[[1, 0]], 0.0);
        assert!((m[[2, 0]] - 1.0).abs() < 1e-12);
        assert!(m.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn unseen_category_encodes_to_zero_row() {
        let train = vec![vec![Some("Music".to_string()), Some("Gaming".to_string())]];
        let encoder = OneHotEncoder::fit(&train);
        assert_eq!(encoder.categories[0], vec!["Gaming".to_string(), "Music".to_string()]);

        let unseen = vec![vec![Some("Sports".to_string()), None, Some("Music".to_string())]];
        let m = encoder.transform(&unseen);
        assert_eq!(m.row(0).sum(), 0.0);
        assert_eq!(m.row(1).sum(), 0.0);
        assert_eq!(m.row(2).to_vec(), vec![0.0, 1.0]);
    }
}
