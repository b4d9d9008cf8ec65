//! Dashboard configuration: file paths, styling and clustering parameters.
//!
//! Resolution order is an explicit JSON file, then `<PROJECT_ROOT>/dashboard.json`,
//! then built-in defaults. `YT_CHANNELS_CSV`, `YT_YEARLY_VIEWS_CSV` and
//! `YT_OUTPUT_DIR` override the paths afterwards.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clustering::ClusteringParams;
use crate::figure::ChartStyle;
use crate::helper_functions::project_root;

pub const CONFIG_FILE_NAME: &str = "dashboard.json";
pub const DEFAULT_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub channels_path: PathBuf,
    pub yearly_views_path: PathBuf,
    pub output_dir: PathBuf,
    pub default_category: String,
    pub style: ChartStyle,
    pub clustering: ClusteringParams,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let root = project_root();
        DashboardConfig {
            channels_path: root.join("data/top_100_youtubers.csv"),
            yearly_views_path: root.join("data/avg_view_every_year.csv"),
            output_dir: root.join("dashboard_output"),
            default_category: DEFAULT_CATEGORY.to_string(),
            style: ChartStyle::default(),
            clustering: ClusteringParams::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidate = project_root().join(CONFIG_FILE_NAME);
                if candidate.exists() {
                    Self::from_file(&candidate)?
                } else {
                    debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        info!(
            channels = %config.channels_path.display(),
            yearly = %config.yearly_views_path.display(),
            output = %config.output_dir.display(),
            "Configuration resolved"
        );
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(p) = env::var_os("YT_CHANNELS_CSV") {
            self.channels_path = PathBuf::from(p);
        }
        if let Some(p) = env::var_os("YT_YEARLY_VIEWS_CSV") {
            self.yearly_views_path = PathBuf::from(p);
        }
        if let Some(p) = env::var_os("YT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(p);
        }
    }
}
