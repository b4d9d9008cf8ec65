use polars::prelude::*;
use tracing::{error, info};

use crate::config::DashboardConfig;

pub mod channels;
pub mod yearly_views;

pub use channels::ChannelDataset;
pub use yearly_views::YearlyViewDataset;

// Channel table columns
pub const CHANNEL_NAME: &str = "ChannelName";
pub const CATEGORY: &str = "Category";
pub const COUNTRY: &str = "Country";
pub const FOLLOWERS: &str = "followers";
pub const LIKES: &str = "Likes";
pub const VIEWS: &str = "Views";
pub const INCOME_QUARTERS: [&str; 4] = ["Income q1", "Income q2", "Income q3", "Income q4"];

// Yearly view table
pub const YEAR: &str = "Year";

pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Both tables as handed to the analyzers. `None` means the load failed.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub channels: Option<DataFrame>,
    pub yearly_views: Option<DataFrame>,
}

impl Tables {
    pub fn new(channels: DataFrame, yearly_views: DataFrame) -> Self {
        Tables {
            channels: Some(channels),
            yearly_views: Some(yearly_views),
        }
    }
}

/// Load both tables, logging (not propagating) failures.
pub fn load_tables(config: &DashboardConfig) -> Tables {
    let channels = ChannelDataset {
        path: config.channels_path.clone(),
        default_category: config.default_category.clone(),
    };
    let yearly = YearlyViewDataset {
        path: config.yearly_views_path.clone(),
    };

    let channels = match channels.load() {
        Ok(df) => Some(df),
        Err(e) => {
            error!("Error loading channel data from {}: {}", config.channels_path.display(), e);
            None
        }
    };
    let yearly_views = match yearly.load() {
        Ok(df) => Some(df),
        Err(e) => {
            error!("Error loading yearly views from {}: {}", config.yearly_views_path.display(), e);
            None
        }
    };

    if channels.is_some() && yearly_views.is_some() {
        info!("Data loaded successfully");
    }
    Tables {
        channels,
        yearly_views,
    }
}

/// Remove exact duplicate rows, keeping the first occurrence in file order.
pub(crate) fn drop_duplicate_rows(df: DataFrame) -> PolarsResult<DataFrame> {
    df.lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
}
