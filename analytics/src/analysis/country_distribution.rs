use polars::prelude::*;
use tracing::info;

use crate::analysis::Analyzer;
use crate::data_handling::COUNTRY;
use crate::figure::{Axis, ChartStyle, Figure, TextPosition, Trace};
use crate::helper_functions::{has_column, str_values, value_counts};
use crate::models::{Metrics, VisualizationResult};

pub const TOP_COUNTRY: &str = "Top Country";
pub const TOP_COUNTRY_COUNT: &str = "Most \"Top 100\" Channels in a Country";
pub const COUNTRY_TOTAL: &str = "Total Countries in the Top 100";

/// Where the top channels come from.
pub struct CountryDistributionAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> CountryDistributionAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        CountryDistributionAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }
}

impl Analyzer for CountryDistributionAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "country_distribution"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if !has_column(self.df, COUNTRY) {
            return Ok(VisualizationResult::empty());
        }
        let counts = value_counts(str_values(self.df, COUNTRY)?.into_iter().flatten());
        let Some((top_country, top_count)) = counts.first().cloned() else {
            return Ok(VisualizationResult::empty());
        };
        info!("Channels from {} countries, led by {} ({})", counts.len(), top_country, top_count);

        let figure = Figure::new("🌐 Global Distribution of Top Youtube Channels", &self.style)
            .with_axes(Axis::titled("Country"), Axis::titled("Number of YouTubers"))
            .with_trace(Trace::Bar {
                name: "Count".to_string(),
                categories: counts.iter().map(|(c, _)| c.clone()).collect(),
                values: counts.iter().map(|(_, n)| *n as f64).collect(),
                colors: Vec::new(),
                text: Vec::new(),
                text_position: TextPosition::Inside,
            });

        let mut metrics = Metrics::new();
        metrics.insert(TOP_COUNTRY, top_country.clone());
        metrics.insert(TOP_COUNTRY_COUNT, top_count);
        metrics.insert(COUNTRY_TOTAL, counts.len());

        let insights = vec![
            format!(
                "The highest population of \"Top 100\" YouTubers are from {} ({} channels)",
                top_country, top_count
            ),
            format!("The \"Top 100\" creators are spread across {} countries", counts.len()),
        ];
        Ok(VisualizationResult::new(figure, metrics, insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn counts_countries_descending() {
        let df = df!(
            "Country" => &[Some("IN"), Some("US"), Some("IN"), None, Some("BR"), Some("IN"), Some("US")]
        )
        .unwrap();
        let result = CountryDistributionAnalyzer::new(&df).create_visualization();

        assert_eq!(result.metrics.get(TOP_COUNTRY).unwrap().as_str(), Some("IN"));
        assert_eq!(result.metrics.get(TOP_COUNTRY_COUNT).unwrap().as_f64(), Some(3.0));
        assert_eq!(result.metrics.get(COUNTRY_TOTAL).unwrap().as_f64(), Some(3.0));
        assert_eq!(
            result.insights,
            vec![
                "The highest population of \"Top 100\" YouTubers are from IN (3 channels)".to_string(),
                "The \"Top 100\" creators are spread across 3 countries".to_string(),
            ]
        );

        let Trace::Bar { categories, values, .. } = &result.figure.unwrap().traces[0] else {
            panic!("expected bars");
        };
        assert_eq!(categories, &vec!["IN".to_string(), "US".into(), "BR".into()]);
        assert_eq!(values, &vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn missing_column_is_a_no_op() {
        let df = df!("Category" => &["Music"]).unwrap();
        assert!(CountryDistributionAnalyzer::new(&df).create_visualization().is_empty());
    }
}
