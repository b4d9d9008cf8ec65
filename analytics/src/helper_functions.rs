use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use polars::prelude::*;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn has_columns(df: &DataFrame, names: &[&str]) -> bool {
    names.iter().all(|n| has_column(df, n))
}

/// Column values as `f64`, whatever numeric dtype the CSV reader picked.
pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

pub fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|opt| opt.map(str::to_string))
        .collect())
}

/// Occurrences per value, most frequent first. Ties keep first-appearance order.
pub fn value_counts<I, S>(values: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for v in values {
        let v = v.as_ref();
        match index.get(v) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(v.to_string(), counts.len());
                counts.push((v.to_string(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let pos = (n as f64 - 1.0) * p.clamp(0.0, 1.0);
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    if idx + 1 < n {
        Some(sorted[idx] * (1.0 - frac) + sorted[idx + 1] * frac)
    } else {
        Some(sorted[idx])
    }
}

/// `1234567` → `"1,234,567"`.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

/// `12_345_678.0` → `"$12.3M"`.
pub fn format_millions_usd(value: f64) -> String {
    format!("${:.1}M", value / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn value_counts_sorted_with_stable_ties() {
        let counts = value_counts(["b", "a", "b", "c", "a", "b"]);
        assert_eq!(
            counts,
            vec![("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
        let ties = value_counts(["x", "y"]);
        assert_eq!(ties[0].0, "x");
    }

    #[test]
    fn quantile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&v, 0.75), Some(3.25));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[7.0], 0.9), Some(7.0));
    }

    #[test]
    fn thousands_and_millions() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(-1000), "-1,000");
        assert_eq!(format_millions_usd(12_345_678.0), "$12.3M");
    }

    #[test]
    fn numeric_columns_are_cast() {
        let df = df!(
            "ints" => &[Some(1i64), None, Some(3)],
            "names" => &["a", "b", "c"]
        )
        .unwrap();
        assert_eq!(f64_values(&df, "ints").unwrap(), vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(str_values(&df, "names").unwrap()[2].as_deref(), Some("c"));
        assert!(has_columns(&df, &["ints", "names"]));
        assert!(!has_column(&df, "missing"));
    }
}
