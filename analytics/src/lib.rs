pub mod analysis;
pub mod clustering;
pub mod config;
pub mod correlation;
pub mod data_handling;
pub mod figure;
pub mod helper_functions;
pub mod models;
pub mod regression;
pub mod render;

pub use analysis::{AnalysisKind, Analyzer};
pub use config::DashboardConfig;
pub use data_handling::{load_tables, Tables};
pub use figure::{ChartStyle, Figure};
pub use models::{MetricValue, Metrics, VisualizationResult};
