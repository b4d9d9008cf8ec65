use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info};

use crate::data_handling::{drop_duplicate_rows, Dataset};
use crate::helper_functions::read_csv;

/// Wide table of yearly views (`avg_view_every_year.csv`): `Year` plus one column per channel.
pub struct YearlyViewDataset {
    pub path: PathBuf,
}

impl Dataset for YearlyViewDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading yearly views from {}", self.path.display());
        let df = drop_duplicate_rows(read_csv(&self.path)?)?;
        debug!("Yearly view table: {} years x {} columns", df.height(), df.width());
        Ok(df)
    }
}
