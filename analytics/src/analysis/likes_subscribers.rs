use polars::prelude::*;
use tracing::{info, warn};

use crate::analysis::Analyzer;
use crate::correlation::{ols_line, pearson, CorrelationStrength};
use crate::data_handling::{CHANNEL_NAME, FOLLOWERS, LIKES};
use crate::figure::{Annotation, Axis, ChartStyle, Figure, ScatterMode, Trace};
use crate::helper_functions::{f64_values, format_thousands, has_column, has_columns, str_values};
use crate::models::{Metrics, VisualizationResult};
use crate::regression::{fit_held_out, DEFAULT_SEED, DEFAULT_TEST_FRACTION};

/// R² scores of alternative model families, measured offline on the same
/// dataset. Shown next to the live linear fit for comparison only.
pub const BENCHMARK_SCORES: [(&str, f64); 7] = [
    ("Log-Transformed Linear Regression", 0.6812),
    ("Square-Root-Transformed Linear Regression", 0.5937),
    ("Linear Regression (Outliers Removed)", 0.5214),
    ("Polynomial Regression (Degree 2)", 0.4478),
    ("Polynomial Regression (Degree 3)", 0.4023),
    ("Random Forest Regressor", 0.5561),
    ("Gradient Boosting Regressor", 0.5789),
];

/// Cleaned `(channel, likes, followers)` rows.
#[derive(Debug, Clone, Default)]
struct EngagementRows {
    names: Vec<String>,
    likes: Vec<f64>,
    followers: Vec<f64>,
}

/// How likes relate to subscriber counts, with an opt-in regression.
pub struct LikesSubscribersAnalyzer<'a> {
    df: &'a DataFrame,
    style: ChartStyle,
}

impl<'a> LikesSubscribersAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        LikesSubscribersAnalyzer {
            df,
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    /// Rows with both likes and followers present; `None` if a column is missing.
    fn prepare_data(&self) -> PolarsResult<Option<EngagementRows>> {
        if !has_columns(self.df, &[LIKES, FOLLOWERS]) {
            return Ok(None);
        }
        let likes = f64_values(self.df, LIKES)?;
        let followers = f64_values(self.df, FOLLOWERS)?;
        let names = if has_column(self.df, CHANNEL_NAME) {
            str_values(self.df, CHANNEL_NAME)?
        } else {
            vec![None; self.df.height()]
        };

        let mut rows = EngagementRows::default();
        for i in 0..self.df.height() {
            if let (Some(l), Some(f)) = (likes[i], followers[i]) {
                rows.names.push(names[i].clone().unwrap_or_default());
                rows.likes.push(l);
                rows.followers.push(f);
            }
        }
        if rows.likes.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows))
    }

    pub fn benchmark_table() -> PolarsResult<DataFrame> {
        let models: Vec<&str> = BENCHMARK_SCORES.iter().map(|(m, _)| *m).collect();
        let scores: Vec<f64> = BENCHMARK_SCORES.iter().map(|(_, s)| *s).collect();
        df!("Model" => models, "R² Score" => scores)
    }
}

impl Analyzer for LikesSubscribersAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "likes_subscribers"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        let Some(rows) = self.prepare_data()? else {
            return Ok(VisualizationResult::empty());
        };

        let correlation = pearson(&rows.likes, &rows.followers)?;
        let strength = CorrelationStrength::classify(correlation);
        info!(
            "Likes vs followers over {} channels: r = {:.3} ({})",
            rows.likes.len(),
            correlation,
            strength
        );

        let mut figure = Figure::new("Relationship between Likes and Subscribers", &self.style)
            .with_axes(
                Axis::titled("Total Likes (log scale)").log_scale(),
                Axis::titled("Number of Subscribers (log scale)").log_scale(),
            )
            .with_trace(Trace::Scatter {
                name: "Channels".to_string(),
                x: rows.likes.clone(),
                y: rows.followers.clone(),
                mode: ScatterMode::Markers,
                color: None,
                hover: rows.names.clone(),
            });

        if let Some((slope, intercept)) = ols_line(&rows.likes, &rows.followers) {
            let mut xs = rows.likes.clone();
            xs.sort_by(|a, b| a.total_cmp(b));
            xs.dedup();
            let ys: Vec<f64> = xs.iter().map(|x| slope * x + intercept).collect();
            figure = figure.with_trace(Trace::Scatter {
                name: "OLS trend".to_string(),
                x: xs,
                y: ys,
                mode: ScatterMode::Lines,
                color: Some(self.style.highlight_color.clone()),
                hover: Vec::new(),
            });
        }

        let mut metrics = Metrics::new();
        metrics.insert("correlation", correlation);
        metrics.insert("correlation_strength", strength.label());

        let insights = vec![
            format!(
                "There is a {} correlation (r={:.2}) between likes and subscribers",
                strength.label().to_lowercase(),
                correlation
            ),
            "Channels are plotted on logarithmic scales to better show the relationship across different sizes".to_string(),
            "The trend line shows the general relationship direction".to_string(),
            "Outliers may represent channels with unusual engagement patterns".to_string(),
            "Hover over points to see specific channel details".to_string(),
        ];
        Ok(VisualizationResult::new(figure, metrics, insights))
    }

    fn predict(&self) -> PolarsResult<Option<VisualizationResult>> {
        let Some(rows) = self.prepare_data()? else {
            return Ok(Some(VisualizationResult::empty()));
        };
        if rows.likes.len() < 3 {
            warn!("Only {} complete rows, skipping regression", rows.likes.len());
            return Ok(Some(VisualizationResult::empty()));
        }

        let fit = fit_held_out(&rows.likes, &rows.followers, DEFAULT_TEST_FRACTION, DEFAULT_SEED)?;
        info!(
            "Linear regression: R² = {:.4}, intercept = {:.1}, slope = {:.4}",
            fit.r2, fit.intercept, fit.slope
        );

        let mut line_x = fit.test_x.clone();
        line_x.sort_by(|a, b| a.total_cmp(b));
        let line_y: Vec<f64> = line_x.iter().map(|&x| fit.predict(x)).collect();

        let figure = Figure::new("Linear Regression: Likes → Subscribers (test set)", &self.style)
            .with_axes(Axis::titled("Likes"), Axis::titled("Subscribers"))
            .with_trace(Trace::Scatter {
                name: "Actual".to_string(),
                x: fit.test_x.clone(),
                y: fit.test_y.clone(),
                mode: ScatterMode::Markers,
                color: Some(self.style.base_color.clone()),
                hover: Vec::new(),
            })
            .with_trace(Trace::Scatter {
                name: "Fitted line".to_string(),
                x: line_x,
                y: line_y,
                mode: ScatterMode::Lines,
                color: Some(self.style.highlight_color.clone()),
                hover: Vec::new(),
            })
            .with_annotation(Annotation {
                text: format!(
                    "R² = {:.3} | Intercept = {:.1} | Slope = {:.4}",
                    fit.r2, fit.intercept, fit.slope
                ),
                x: 0.5,
                y: 0.95,
                font_size: 14,
                color: "black".to_string(),
                bold: false,
            });

        let mut metrics = Metrics::new();
        metrics.insert("R² Score", fit.r2);
        metrics.insert("Intercept", fit.intercept);
        metrics.insert("Slope", fit.slope);

        let insights = vec![
            format!(
                "The model explains {:.1}% of the variance in subscriber counts on held-out channels (R² = {:.3}).",
                fit.r2 * 100.0,
                fit.r2
            ),
            format!(
                "A channel with zero likes is predicted to have about {} subscribers (intercept).",
                format_thousands(fit.intercept.round() as i64)
            ),
            format!(
                "Each additional like is associated with {:.4} more subscribers (slope).",
                fit.slope
            ),
            "Adding features such as views, category or country would likely improve the prediction.".to_string(),
        ];

        Ok(Some(
            VisualizationResult::new(figure, metrics, insights).with_extra_data(Self::benchmark_table()?),
        ))
    }
}
