use polars::prelude::*;
use tracing::info;

use crate::analysis::Analyzer;
use crate::data_handling::{CHANNEL_NAME, FOLLOWERS};
use crate::figure::{Annotation, Axis, ChartStyle, Figure};
use crate::helper_functions::{f64_values, format_thousands, has_columns, str_values};
use crate::models::{Metrics, VisualizationResult};

/// Headline card for the single most subscribed channel.
pub struct MostSubscribersAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> MostSubscribersAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        MostSubscribersAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// First row holding the maximum follower count.
    fn top_channel(&self) -> PolarsResult<Option<(String, i64)>> {
        let names = str_values(self.df, CHANNEL_NAME)?;
        let followers = f64_values(self.df, FOLLOWERS)?;

        let mut best: Option<(usize, f64)> = None;
        for (i, f) in followers.iter().enumerate() {
            let Some(f) = *f else { continue };
            if best.map_or(true, |(_, b)| f > b) {
                best = Some((i, f));
            }
        }
        Ok(best.map(|(i, f)| (names[i].clone().unwrap_or_default(), f.round() as i64)))
    }
}

impl Analyzer for MostSubscribersAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "most_subscribers"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if !has_columns(self.df, &[CHANNEL_NAME, FOLLOWERS]) {
            return Ok(VisualizationResult::empty());
        }
        let Some((channel, followers)) = self.top_channel()? else {
            return Ok(VisualizationResult::empty());
        };
        let formatted = format_thousands(followers);
        info!("Most subscribed channel: {} ({})", channel, formatted);

        let mut style = self.style.clone();
        style.height = 400;
        let mut figure = Figure::new("🌟 Channel with the Most Subscribers 🌟", &style)
            .with_annotation(Annotation {
                text: channel.clone(),
                x: 0.5,
                y: 0.7,
                font_size: 24,
                color: "red".to_string(),
                bold: true,
            })
            .with_annotation(Annotation {
                text: format!("Subscribers: {}", formatted),
                x: 0.5,
                y: 0.5,
                font_size: 20,
                color: "red".to_string(),
                bold: true,
            });
        figure.x_axis = Axis::hidden();
        figure.y_axis = Axis::hidden();

        let mut metrics = Metrics::new();
        metrics.insert("Top Channel", channel.clone());
        metrics.insert("Subscribers", followers);

        let insights = vec![format!(
            "The channel with the most subscribers is {}, with {} subscribers.",
            channel, formatted
        )];
        Ok(VisualizationResult::new(figure, metrics, insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricValue;
    use polars::df;

    #[test]
    fn first_maximum_wins() {
        let df = df!(
            "ChannelName" => &["T-Series", "MrBeast", "Cocomelon", "Tie"],
            "followers" => &[Some(245_000_000i64), None, Some(170_000_000), Some(245_000_000)]
        )
        .unwrap();
        let result = MostSubscribersAnalyzer::new(&df).create_visualization();

        assert_eq!(result.metrics.get("Top Channel").unwrap().as_str(), Some("T-Series"));
        assert_eq!(
            result.metrics.get("Subscribers"),
            Some(&MetricValue::Integer(245_000_000))
        );
        assert_eq!(
            result.insights,
            vec!["The channel with the most subscribers is T-Series, with 245,000,000 subscribers.".to_string()]
        );

        let figure = result.figure.unwrap();
        assert!(figure.traces.is_empty());
        assert_eq!(figure.annotations.len(), 2);
        assert_eq!(figure.annotations[1].text, "Subscribers: 245,000,000");
        assert!(!figure.x_axis.visible && !figure.y_axis.visible);
    }

    #[test]
    fn missing_columns_are_a_no_op() {
        let df = df!("ChannelName" => &["a"]).unwrap();
        assert!(MostSubscribersAnalyzer::new(&df).create_visualization().is_empty());
    }
}
