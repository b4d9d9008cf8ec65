use polars::prelude::*;
use tracing::info;

use crate::analysis::Analyzer;
use crate::data_handling::CATEGORY;
use crate::figure::{ChartStyle, Figure, Trace};
use crate::helper_functions::{has_column, str_values, value_counts};
use crate::models::{Metrics, VisualizationResult};

/// Share of channels per category, as a donut chart.
pub struct CategoryDistributionAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> CategoryDistributionAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        CategoryDistributionAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// Channels per non-null category, most common first.
    pub fn category_counts(&self) -> PolarsResult<Vec<(String, usize)>> {
        let categories = str_values(self.df, CATEGORY)?;
        Ok(value_counts(categories.into_iter().flatten()))
    }
}

impl Analyzer for CategoryDistributionAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "category_distribution"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if !has_column(self.df, CATEGORY) {
            return Ok(VisualizationResult::empty());
        }
        let counts = self.category_counts()?;
        let Some((top_category, _)) = counts.first().cloned() else {
            return Ok(VisualizationResult::empty());
        };
        info!("{} categories, most common: {}", counts.len(), top_category);

        let figure = Figure::new("YouTube Channels by Category", &self.style).with_trace(Trace::Pie {
            labels: counts.iter().map(|(c, _)| c.clone()).collect(),
            values: counts.iter().map(|(_, n)| *n as f64).collect(),
            hole: 0.3,
        });

        let mut metrics = Metrics::new();
        metrics.insert("top_category", top_category.clone());
        metrics.insert("category_count", counts.len());

        let insights = vec![
            format!("Most common category: {}", top_category),
            format!("Total number of categories: {}", counts.len()),
        ];
        Ok(VisualizationResult::new(figure, metrics, insights))
    }
}
