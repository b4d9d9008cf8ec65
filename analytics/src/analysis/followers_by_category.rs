use polars::prelude::*;
use tracing::info;

use crate::analysis::Analyzer;
use crate::data_handling::{CATEGORY, FOLLOWERS};
use crate::figure::{padded_range, Axis, ChartStyle, Figure, TextPosition, Trace};
use crate::helper_functions::{f64_values, has_columns, str_values};
use crate::models::{Metrics, VisualizationResult};

const FOLLOWERS_BILLIONS: &str = "Followers";

/// Total followers per category, in billions.
pub struct FollowersByCategoryAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> FollowersByCategoryAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        FollowersByCategoryAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// `Category`, `Followers` (billions), smallest total first, ties alphabetical.
    pub fn followers_table(&self) -> PolarsResult<DataFrame> {
        self.df
            .clone()
            .lazy()
            .filter(col(CATEGORY).is_not_null())
            .group_by([col(CATEGORY)])
            .agg([col(FOLLOWERS)
                .cast(DataType::Float64)
                .sum()
                .alias(FOLLOWERS_BILLIONS)])
            .sort([CATEGORY], SortMultipleOptions::default())
            .sort(
                [FOLLOWERS_BILLIONS],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .with_column((col(FOLLOWERS_BILLIONS) / lit(1_000_000_000.0)).alias(FOLLOWERS_BILLIONS))
            .collect()
    }
}

impl Analyzer for FollowersByCategoryAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "followers_by_category"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if !has_columns(self.df, &[CATEGORY, FOLLOWERS]) {
            return Ok(VisualizationResult::empty());
        }
        let table = self.followers_table()?;
        let categories: Vec<String> = str_values(&table, CATEGORY)?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let billions: Vec<f64> = f64_values(&table, FOLLOWERS_BILLIONS)?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();

        let (Some(top_category), Some(top_value)) = (categories.last(), billions.last()) else {
            return Ok(VisualizationResult::empty());
        };
        info!("Most followed category: {} ({:.2}B)", top_category, top_value);

        let (lo, hi) = padded_range(&billions, 0.2);
        let figure = Figure::new("Followers by Category", &self.style)
            .with_axes(
                Axis::titled("Category").with_tick_angle(45),
                Axis::titled("Followers (billion)").with_range(lo, hi),
            )
            .with_trace(Trace::Bar {
                name: FOLLOWERS_BILLIONS.to_string(),
                categories: categories.clone(),
                values: billions.clone(),
                colors: Vec::new(),
                text: Vec::new(),
                text_position: TextPosition::Inside,
            });

        let insights = vec![
            format!(
                "The category with the most followers is {} with {:.2} billion followers.",
                top_category, top_value
            ),
            "This chart highlights the total number of followers for each category.".to_string(),
        ];
        Ok(VisualizationResult::new(figure, Metrics::new(), insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn largest_category_is_last() {
        let df = df!(
            "Category" => &[Some("Music"), Some("Gaming"), Some("Music"), None, Some("Education")],
            "followers" => &[Some(1_500_000_000i64), Some(900_000_000), Some(1_000_000_000), Some(5), None]
        )
        .unwrap();
        let result = FollowersByCategoryAnalyzer::new(&df).create_visualization();

        assert!(result.metrics.is_empty());
        assert_eq!(
            result.insights[0],
            "The category with the most followers is Music with 2.50 billion followers."
        );
        let Trace::Bar { categories, values, .. } = &result.figure.unwrap().traces[0] else {
            panic!("expected bars");
        };
        assert_eq!(categories.last().map(String::as_str), Some("Music"));
        assert_eq!(categories.len(), 3);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn needs_both_columns() {
        let df = df!("Category" => &["Music"]).unwrap();
        assert!(FollowersByCategoryAnalyzer::new(&df).create_visualization().is_empty());
    }
}
