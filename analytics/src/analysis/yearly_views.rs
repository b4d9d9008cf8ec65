use polars::prelude::*;
use tracing::{debug, info};

use crate::analysis::Analyzer;
use crate::data_handling::YEAR;
use crate::figure::{padded_range, Axis, ChartStyle, Figure, ScatterMode, Trace, PALETTE};
use crate::helper_functions::{f64_values, has_column};
use crate::models::{Metrics, VisualizationResult};

pub const TOP_IN_A_YEAR: &str = "Top Viewed Channel in a Year";
pub const TOP_TOTAL: &str = "Top Total Viewed Channel";
pub const HIGHEST_GROWTH: &str = "Highest Viewership Growth";

/// One `(year, channel, views in millions)` observation of the melted table.
#[derive(Debug, Clone, PartialEq)]
struct YearlyView {
    year: i64,
    channel: String,
    views: f64,
}

/// Yearly view trends from the wide `Year × channel` table.
pub struct YearlyViewAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> YearlyViewAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        YearlyViewAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// Long form in column order (channel-major), null years and views dropped.
    fn melt(&self) -> PolarsResult<Vec<YearlyView>> {
        let years: Vec<Option<i64>> = self
            .df
            .column(YEAR)?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect();

        let mut long = Vec::new();
        for name in self.df.get_column_names() {
            if name.as_str() == YEAR {
                continue;
            }
            let views = f64_values(self.df, name.as_str())?;
            for (year, v) in years.iter().zip(views) {
                if let (Some(year), Some(v)) = (year, v) {
                    long.push(YearlyView {
                        year: *year,
                        channel: name.to_string(),
                        views: v / 1_000_000.0,
                    });
                }
            }
        }
        Ok(long)
    }
}

/// `(last - first) / first * 100` over year-ordered values; `None` when `first` is zero.
fn growth_rate(points: &[&YearlyView]) -> Option<f64> {
    let first = points.first()?.views;
    let last = points.last()?.views;
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

impl Analyzer for YearlyViewAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "yearly_views"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if !has_column(self.df, YEAR) {
            return Ok(VisualizationResult::empty());
        }
        let long = self.melt()?;
        if long.is_empty() {
            return Ok(VisualizationResult::empty());
        }
        debug!("Melted yearly views into {} observations", long.len());

        let mut sorted = long.clone();
        sorted.sort_by(|a, b| a.year.cmp(&b.year).then(b.views.total_cmp(&a.views)));

        let mut channels: Vec<&str> = Vec::new();
        for row in &sorted {
            if !channels.contains(&row.channel.as_str()) {
                channels.push(&row.channel);
            }
        }

        let all_views: Vec<f64> = long.iter().map(|r| r.views).collect();
        let (lo, hi) = padded_range(&all_views, 0.1);
        let mut figure = Figure::new("👀 Annual Views of Top 5 YouTube Channels", &self.style).with_axes(
            Axis::titled("Year").with_tick_angle(45),
            Axis::titled("Annual Views (M)").with_range(lo, hi),
        );
        for (i, channel) in channels.iter().enumerate() {
            let points: Vec<&YearlyView> = sorted.iter().filter(|r| r.channel == *channel).collect();
            figure = figure.with_trace(Trace::Scatter {
                name: channel.to_string(),
                x: points.iter().map(|r| r.year as f64).collect(),
                y: points.iter().map(|r| r.views).collect(),
                mode: ScatterMode::LinesMarkers,
                color: Some(PALETTE[i % PALETTE.len()].to_string()),
                hover: Vec::new(),
            });
        }

        // Sorted by views descending within each year, so the first row of a year is its champion.
        let mut champions: Vec<&YearlyView> = Vec::new();
        for row in &sorted {
            if champions.last().map_or(true, |c| c.year != row.year) {
                champions.push(row);
            }
        }

        let mut metrics = Metrics::new();
        let peak = long
            .iter()
            .fold(None::<&YearlyView>, |best, r| match best {
                Some(b) if b.views >= r.views => Some(b),
                _ => Some(r),
            });
        if let Some(peak) = peak {
            info!("Peak yearly views: {} with {:.1}M in {}", peak.channel, peak.views, peak.year);
            metrics.insert(
                TOP_IN_A_YEAR,
                format!("{}, with {:.1}M views in {}.", peak.channel, peak.views, peak.year),
            );
            let total: f64 = long
                .iter()
                .filter(|r| r.channel == peak.channel)
                .map(|r| r.views)
                .sum();
            metrics.insert(
                TOP_TOTAL,
                format!("{}, with {:.1}M total views.", peak.channel, total),
            );
        }

        let mut in_column_order: Vec<&str> = Vec::new();
        for row in &long {
            if in_column_order.last() != Some(&row.channel.as_str()) {
                in_column_order.push(&row.channel);
            }
        }
        let mut best_growth: Option<(&str, f64)> = None;
        for channel in in_column_order {
            let mut points: Vec<&YearlyView> = long.iter().filter(|r| r.channel == channel).collect();
            points.sort_by_key(|r| r.year);
            match (growth_rate(&points), best_growth) {
                (Some(g), Some((_, best))) if g <= best => {}
                (Some(g), _) => best_growth = Some((channel, g)),
                (None, _) => debug!("{} has no usable first-year views, skipping growth", channel),
            }
        }
        if let Some((channel, growth)) = best_growth {
            let first_year = long.iter().map(|r| r.year).min().unwrap_or_default();
            let last_year = long.iter().map(|r| r.year).max().unwrap_or_default();
            metrics.insert(
                HIGHEST_GROWTH,
                format!(
                    "{}, who grew {:.2}% from {} to {}.",
                    channel, growth, first_year, last_year
                ),
            );
        }

        let mut insights: Vec<String> = champions
            .iter()
            .map(|c| {
                format!(
                    "In {}, the top channel was {} with {:.1}M views.",
                    c.year, c.channel, c.views
                )
            })
            .collect();
        insights.push("The coloured lines represent the channels and their average viewership per year.".to_string());
        insights.push("The chart uses clear annotations to make data interpretation easier.".to_string());

        Ok(VisualizationResult::new(figure, metrics, insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn yearly() -> DataFrame {
        df!(
            "Year" => &[2019i64, 2020, 2021],
            "A" => &[Some(0.0), Some(5_000_000.0), Some(10_000_000.0)],
            "B" => &[Some(2_000_000.0), Some(3_000_000.0), Some(4_000_000.0)],
            "C" => &[Some(1_000_000.0), None, Some(8_000_000.0)]
        )
        .unwrap()
    }

    #[test]
    fn metrics_and_per_year_champions() {
        let df = yearly();
        let result = YearlyViewAnalyzer::new(&df).create_visualization();

        assert_eq!(
            result.metrics.get(TOP_IN_A_YEAR).unwrap().as_str(),
            Some("A, with 10.0M views in 2021.")
        );
        assert_eq!(
            result.metrics.get(TOP_TOTAL).unwrap().as_str(),
            Some("A, with 15.0M total views.")
        );
        // A starts at zero and is skipped; C grows 700%, B 100%.
        assert_eq!(
            result.metrics.get(HIGHEST_GROWTH).unwrap().as_str(),
            Some("C, who grew 700.00% from 2019 to 2021.")
        );
        assert_eq!(
            &result.insights[..3],
            &[
                "In 2019, the top channel was B with 2.0M views.".to_string(),
                "In 2020, the top channel was A with 5.0M views.".to_string(),
                "In 2021, the top channel was A with 10.0M views.".to_string(),
            ]
        );
        assert_eq!(result.insights.len(), 5);

        let figure = result.figure.unwrap();
        assert_eq!(figure.traces.len(), 3);
        let c = figure.traces.iter().find(|t| t.name() == "C").unwrap();
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn zero_first_year_never_wins_growth() {
        let df = df!(
            "Year" => &[2020i64, 2021],
            "A" => &[0.0, 5_000_000.0]
        )
        .unwrap();
        let result = YearlyViewAnalyzer::new(&df).create_visualization();
        assert!(result.metrics.get(HIGHEST_GROWTH).is_none());
        assert!(result.metrics.get(TOP_TOTAL).is_some());
    }

    #[test]
    fn needs_year_column() {
        let df = df!("A" => &[1.0, 2.0]).unwrap();
        assert!(YearlyViewAnalyzer::new(&df).create_visualization().is_empty());
    }
}
