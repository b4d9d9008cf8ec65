use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info};

use crate::data_handling::{drop_duplicate_rows, Dataset, CATEGORY};
use crate::helper_functions::{has_column, read_csv};

/// The per-channel attribute table (`top_100_youtubers.csv`).
pub struct ChannelDataset {
    pub path: PathBuf,
    pub default_category: String,
}

fn fill_missing_category(df: DataFrame, default_category: &str) -> PolarsResult<DataFrame> {
    if !has_column(&df, CATEGORY) {
        return Ok(df);
    }
    df.lazy()
        .with_column(
            col(CATEGORY)
                .cast(DataType::String)
                .fill_null(lit(default_category.to_string()))
                .alias(CATEGORY),
        )
        .collect()
}

/// Drop columns that carry no value at all.
fn drop_all_null_columns(df: DataFrame) -> PolarsResult<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }
    let keep: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() < c.len())
        .map(|c| c.name().clone())
        .collect();
    if keep.len() < df.width() {
        debug!("Dropping {} all-null column(s)", df.width() - keep.len());
    }
    df.select(keep)
}

impl Dataset for ChannelDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading channel data from {}", self.path.display());
        let raw = read_csv(&self.path)?;
        let raw_rows = raw.height();

        let df = drop_duplicate_rows(raw)?;
        let df = fill_missing_category(df, &self.default_category)?;
        let df = drop_all_null_columns(df)?;

        debug!(
            "Channel table: {} rows ({} duplicates removed), {} columns",
            df.height(),
            raw_rows - df.height(),
            df.width()
        );
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper_functions::str_values;
    use std::io::Write;

    #[test]
    fn load_dedupes_fills_and_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "ChannelName,Category,followers,Empty").unwrap();
        writeln!(f, "A,Music,10,").unwrap();
        writeln!(f, "A,Music,10,").unwrap();
        writeln!(f, "B,,20,").unwrap();
        writeln!(f, "A,Music,11,").unwrap();
        drop(f);

        let ds = ChannelDataset {
            path: path.clone(),
            default_category: "Other".to_string(),
        };
        let df = ds.load().unwrap();

        assert_eq!(df.height(), 3);
        assert!(!has_column(&df, "Empty"));
        let cats = str_values(&df, CATEGORY).unwrap();
        assert_eq!(cats[1].as_deref(), Some("Other"));
        let names = str_values(&df, "ChannelName").unwrap();
        assert_eq!(names[0].as_deref(), Some("A"));
        assert_eq!(names[1].as_deref(), Some("B"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let ds = ChannelDataset {
            path: PathBuf::from("/definitely/not/here.csv"),
            default_category: "Other".into(),
        };
        assert!(ds.load().is_err());
    }
}
