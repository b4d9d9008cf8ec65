use std::collections::HashSet;

use polars::prelude::*;
use tracing::{debug, info};

use crate::analysis::Analyzer;
use crate::data_handling::{CHANNEL_NAME, INCOME_QUARTERS, VIEWS};
use crate::figure::{Axis, ChartStyle, Figure, TextPosition, Trace};
use crate::helper_functions::{f64_values, format_millions_usd, has_columns, str_values};
use crate::models::{Metrics, VisualizationResult};

const TOTAL_INCOME: &str = "Total Income";
const AVERAGE_INCOME: &str = "Average Income";
const TOP_N: usize = 5;

/// Average quarterly income of the most viewed channels.
pub struct QuarterlyIncomeAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> QuarterlyIncomeAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        QuarterlyIncomeAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// The `TOP_N` channel names with the greatest summed views.
    fn top_channels(&self) -> PolarsResult<Vec<String>> {
        let names = str_values(self.df, CHANNEL_NAME)?;
        let views = f64_values(self.df, VIEWS)?;

        let mut totals: Vec<(String, f64)> = Vec::new();
        for (name, v) in names.into_iter().zip(views) {
            let Some(name) = name else { continue };
            match totals.iter_mut().find(|(n, _)| *n == name) {
                Some((_, total)) => *total += v.unwrap_or(0.0),
                None => totals.push((name, v.unwrap_or(0.0))),
            }
        }
        totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(totals.into_iter().take(TOP_N).map(|(n, _)| n).collect())
    }

    /// `ChannelName`, `Average Income` for the top channels, highest income first.
    pub fn income_table(&self) -> PolarsResult<DataFrame> {
        let top: HashSet<String> = self.top_channels()?.into_iter().collect();
        let mask: BooleanChunked = str_values(self.df, CHANNEL_NAME)?
            .into_iter()
            .map(|n| n.is_some_and(|n| top.contains(&n)))
            .collect();
        let rows = self.df.filter(&mask)?;
        debug!("{} rows belong to the top {} channels", rows.height(), TOP_N);

        let row_total = INCOME_QUARTERS
            .iter()
            .map(|q| col(*q).cast(DataType::Float64).fill_null(lit(0.0)))
            .reduce(|acc, e| acc + e)
            .unwrap_or_else(|| lit(0.0));

        rows.lazy()
            .with_column(row_total.alias(TOTAL_INCOME))
            .group_by_stable([col(CHANNEL_NAME)])
            .agg([col(TOTAL_INCOME).mean().alias(AVERAGE_INCOME)])
            .sort(
                [AVERAGE_INCOME],
                SortMultipleOptions::default()
                    .with_order_descending(true)
                    .with_maintain_order(true),
            )
            .collect()
    }
}

impl Analyzer for QuarterlyIncomeAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "quarterly_income"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        let mut required = vec![CHANNEL_NAME, VIEWS];
        required.extend(INCOME_QUARTERS);
        if !has_columns(self.df, &required) {
            return Ok(VisualizationResult::empty());
        }

        let table = self.income_table()?;
        let channels: Vec<String> = str_values(&table, CHANNEL_NAME)?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let averages: Vec<f64> = f64_values(&table, AVERAGE_INCOME)?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        let (Some(top_channel), Some(&top_average)) = (channels.first(), averages.first()) else {
            return Ok(VisualizationResult::empty());
        };
        let top_income = format_millions_usd(top_average);
        info!("Highest average quarterly income: {} ({})", top_channel, top_income);

        let colors = channels
            .iter()
            .map(|c| {
                if c == top_channel {
                    self.style.highlight_color.clone()
                } else {
                    self.style.base_color.clone()
                }
            })
            .collect();
        let max_income = averages.iter().copied().fold(0.0, f64::max);
        let figure = Figure::new("💰 Average Quarterly Income of Top 5 YouTube Channels", &self.style)
            .with_axes(
                Axis::titled("Channel Name").with_tick_angle(45),
                Axis::titled("Average Income ($M)").with_range(0.0, max_income * 1.1),
            )
            .with_trace(Trace::Bar {
                name: AVERAGE_INCOME.to_string(),
                categories: channels.clone(),
                values: averages.clone(),
                colors,
                text: averages.iter().map(|v| format_millions_usd(*v)).collect(),
                text_position: TextPosition::Outside,
            });

        let mut metrics = Metrics::new();
        metrics.insert("top_channel", top_channel.clone());
        metrics.insert("top_income", top_income.clone());

        let insights = vec![
            format!(
                "The top channel is {} with an average income of {} per quarter.",
                top_channel, top_income
            ),
            "The highlighted bar represents the channel with the highest average income.".to_string(),
            "The chart uses clear annotations to make data interpretation easier.".to_string(),
        ];
        Ok(VisualizationResult::new(figure, metrics, insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn channels() -> DataFrame {
        df!(
            "ChannelName" => &["A", "B", "C", "D", "E", "F", "A"],
            "Views" => &[100i64, 90, 80, 70, 60, 10, 50],
            "Income q1" => &[Some(1_000_000.0), Some(4_000_000.0), Some(1.0), Some(1.0), Some(1.0), Some(99_000_000.0), Some(500_000.0)],
            "Income q2" => &[Some(1_000_000.0), None, Some(1.0), Some(1.0), Some(1.0), Some(99_000_000.0), Some(500_000.0)],
            "Income q3" => &[Some(1_000_000.0), Some(6_000_000.0), Some(1.0), Some(1.0), Some(1.0), Some(99_000_000.0), Some(500_000.0)],
            "Income q4" => &[Some(1_000_000.0), None, Some(1.0), Some(1.0), Some(1.0), Some(99_000_000.0), Some(500_000.0)]
        )
        .unwrap()
    }

    #[test]
    fn keeps_top_five_by_views_and_averages_row_sums() {
        let df = channels();
        let table = QuarterlyIncomeAnalyzer::new(&df).income_table().unwrap();
        assert_eq!(table.height(), 5);

        let names: Vec<String> = str_values(&table, "ChannelName")
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert!(!names.contains(&"F".to_string()));
        assert_eq!(names[0], "B");
        assert_eq!(names[1], "A");

        let averages = f64_values(&table, "Average Income").unwrap();
        // B: 4M + 6M with two null quarters; A: mean of 4M and 2M.
        assert_eq!(averages[0], Some(10_000_000.0));
        assert_eq!(averages[1], Some(3_000_000.0));
    }

    #[test]
    fn top_bar_is_highlighted() {
        let df = channels();
        let result = QuarterlyIncomeAnalyzer::new(&df).create_visualization();
        assert_eq!(result.metrics.get("top_channel").unwrap().as_str(), Some("B"));
        assert_eq!(result.metrics.get("top_income").unwrap().as_str(), Some("$10.0M"));
        assert_eq!(
            result.insights[0],
            "The top channel is B with an average income of $10.0M per quarter."
        );

        let figure = result.figure.unwrap();
        let (lo, hi) = figure.y_axis.range.unwrap();
        assert_eq!(lo, 0.0);
        assert!((hi - 11_000_000.0).abs() < 1e-3);
        let Trace::Bar { colors, text, text_position, .. } = &figure.traces[0] else {
            panic!("expected bars");
        };
        let style = ChartStyle::default();
        assert_eq!(colors[0], style.highlight_color);
        assert!(colors[1..].iter().all(|c| *c == style.base_color));
        assert_eq!(text[1], "$3.0M");
        assert_eq!(*text_position, TextPosition::Outside);
    }

    #[test]
    fn needs_every_income_column() {
        let df = channels().drop("Income q3").unwrap();
        assert!(QuarterlyIncomeAnalyzer::new(&df).create_visualization().is_empty());
    }
}
