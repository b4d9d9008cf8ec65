use std::collections::BTreeMap;

use ndarray::Array2;

use super::NOISE;
use crate::helper_functions::{quantile, value_counts};

pub const NOISE_LABEL: &str = "Noise";
const TOP_NUMERICAL: usize = 3;

/// Inputs for naming: the scaled numerical matrix plus the raw columns.
pub struct NamingInput<'a> {
    pub numerical_names: &'a [String],
    pub scaled: &'a Array2<f64>,
    pub numerical_raw: &'a [Vec<Option<f64>>],
    pub categorical_names: &'a [String],
    pub categorical_raw: &'a [Vec<Option<String>>],
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn entropy(counts: &[(String, usize)]) -> f64 {
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .map(|(_, c)| *c as f64 / total as f64)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

/// `High`, `Low` or `Moderate` depending on where the mean sits against Q1/Q3.
fn level(values: &[f64]) -> &'static str {
    let (Some(q1), Some(q3)) = (quantile(values, 0.25), quantile(values, 0.75)) else {
        return "Moderate";
    };
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean > q3 {
        "High"
    } else if mean < q1 {
        "Low"
    } else {
        "Moderate"
    }
}

fn describe_numerical(input: &NamingInput, rows: &[usize]) -> Vec<String> {
    let mut by_variance: Vec<(usize, f64)> = (0..input.numerical_names.len())
        .map(|j| {
            let values: Vec<f64> = rows.iter().map(|&i| input.scaled[[i, j]]).collect();
            (j, sample_variance(&values))
        })
        .collect();
    // NaN variances sort last
    by_variance.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (false, false) => b.1.total_cmp(&a.1),
        (x, y) => x.cmp(&y),
    });

    by_variance
        .into_iter()
        .take(TOP_NUMERICAL)
        .filter_map(|(j, _)| {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|&i| input.numerical_raw[j][i])
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(format!("{} {}", level(&values), input.numerical_names[j]))
        })
        .collect()
}

/// Most dominant categorical feature by `(mode frequency, -entropy)` and its modal value.
fn describe_categorical(input: &NamingInput, rows: &[usize]) -> Option<String> {
    let mut best: Option<(usize, f64, &str, String)> = None;
    for (name, column) in input.categorical_names.iter().zip(input.categorical_raw) {
        let mut counts = value_counts(rows.iter().filter_map(|&i| column[i].as_deref()));
        let Some(&(_, mode_frequency)) = counts.first() else {
            continue;
        };
        let score = -entropy(&counts);
        counts.retain(|(_, c)| *c == mode_frequency);
        let mode = counts.into_iter().map(|(v, _)| v).min().unwrap_or_default();

        let better = match &best {
            None => true,
            Some((freq, s, _, _)) => (mode_frequency, score) > (*freq, *s),
        };
        if better {
            best = Some((mode_frequency, score, name.as_str(), mode));
        }
    }
    best.map(|(_, _, name, mode)| format!("{}: {}", name, mode))
}

/// Human readable name per cluster label, e.g.
/// `Cluster 2 - High Views & Low Likes & Moderate followers - Category: Music`.
pub fn cluster_names(labels: &[i32], input: &NamingInput) -> BTreeMap<i32, String> {
    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        members.entry(*label).or_default().push(i);
    }

    members
        .into_iter()
        .map(|(label, rows)| {
            if label == NOISE {
                return (label, NOISE_LABEL.to_string());
            }
            let mut parts = Vec::new();
            let numerical = describe_numerical(input, &rows);
            if !numerical.is_empty() {
                parts.push(numerical.join(" & "));
            }
            if let Some(categorical) = describe_categorical(input, &rows) {
                parts.push(categorical);
            }
            let name = if parts.is_empty() {
                format!("Cluster {}", label)
            } else {
                format!("Cluster {} - {}", label, parts.join(" - "))
            };
            (label, name)
        })
        .collect()
}
