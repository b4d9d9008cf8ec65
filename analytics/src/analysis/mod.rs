use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use tracing::{error, info};

use crate::clustering::ClusteringParams;
use crate::data_handling::Tables;
use crate::figure::ChartStyle;
use crate::models::VisualizationResult;

pub mod category_distribution;
pub mod clustering;
pub mod country_distribution;
pub mod followers_by_category;
pub mod likes_subscribers;
pub mod most_subscribers;
pub mod quarterly_income;
pub mod yearly_views;

pub use category_distribution::CategoryDistributionAnalyzer;
pub use clustering::ClusteringAnalyzer;
pub use country_distribution::CountryDistributionAnalyzer;
pub use followers_by_category::FollowersByCategoryAnalyzer;
pub use likes_subscribers::LikesSubscribersAnalyzer;
pub use most_subscribers::MostSubscribersAnalyzer;
pub use quarterly_income::QuarterlyIncomeAnalyzer;
pub use yearly_views::YearlyViewAnalyzer;

/// Common capability of every analysis.
///
/// Implementors only write [`Analyzer::analyze`] (and optionally
/// [`Analyzer::predict`]); the provided `create_*` methods turn internal
/// errors into an empty result so callers never see a failure.
pub trait Analyzer {
    fn name(&self) -> &'static str;

    fn analyze(&self) -> PolarsResult<VisualizationResult>;

    fn predict(&self) -> PolarsResult<Option<VisualizationResult>> {
        Ok(None)
    }

    fn create_visualization(&self) -> VisualizationResult {
        match self.analyze() {
            Ok(result) => result,
            Err(e) => {
                error!(analyzer = self.name(), "analysis failed: {}", e);
                VisualizationResult::empty()
            }
        }
    }

    /// `None` when the analysis has no prediction mode.
    fn create_prediction(&self) -> Option<VisualizationResult> {
        match self.predict() {
            Ok(result) => result,
            Err(e) => {
                error!(analyzer = self.name(), "prediction failed: {}", e);
                Some(VisualizationResult::empty())
            }
        }
    }
}

/// The fixed menu of analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    CategoryDistribution,
    LikesVsSubscribers,
    GlobalDistribution,
    ViewTrends,
    IncomeAnalysis,
    FollowersByCategory,
    MostSubscribers,
    ChannelClusters,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 8] = [
        AnalysisKind::CategoryDistribution,
        AnalysisKind::LikesVsSubscribers,
        AnalysisKind::GlobalDistribution,
        AnalysisKind::ViewTrends,
        AnalysisKind::IncomeAnalysis,
        AnalysisKind::FollowersByCategory,
        AnalysisKind::MostSubscribers,
        AnalysisKind::ChannelClusters,
    ];

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::CategoryDistribution => "Category Distribution",
            AnalysisKind::LikesVsSubscribers => "Likes vs Subscribers",
            AnalysisKind::GlobalDistribution => "Global Distribution",
            AnalysisKind::ViewTrends => "View Trends",
            AnalysisKind::IncomeAnalysis => "Income Analysis",
            AnalysisKind::FollowersByCategory => "Followers by Category",
            AnalysisKind::MostSubscribers => "Most Subscribers",
            AnalysisKind::ChannelClusters => "Channel Clusters",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::CategoryDistribution => "Category Distribution of YouTube Channels",
            AnalysisKind::LikesVsSubscribers => "Likes vs Subscribers Analysis",
            AnalysisKind::GlobalDistribution => "Global Distribution of Top YouTubers",
            AnalysisKind::ViewTrends => "Annual Views of Top YouTube Channels",
            AnalysisKind::IncomeAnalysis => "Average Quarterly Income of Top 5 YouTube Channels",
            AnalysisKind::FollowersByCategory => "Followers by Category",
            AnalysisKind::MostSubscribers => "Channel with the Most Subscribers",
            AnalysisKind::ChannelClusters => "Category Clustering of Top Youtube Channels",
        }
    }

    /// File-name friendly identifier.
    pub fn slug(&self) -> String {
        self.label().to_lowercase().replace(' ', "_")
    }

    pub fn supports_prediction(&self) -> bool {
        matches!(self, AnalysisKind::LikesVsSubscribers)
    }

    /// Build the analyzer over the table it needs, or `None` if that table failed to load.
    pub fn analyzer<'a>(
        &self,
        tables: &'a Tables,
        style: &ChartStyle,
        clustering: &ClusteringParams,
    ) -> Option<Box<dyn Analyzer + 'a>> {
        let style = style.clone();
        if let AnalysisKind::ViewTrends = self {
            let df = tables.yearly_views.as_ref()?;
            return Some(Box::new(YearlyViewAnalyzer::new(df).with_style(style)));
        }
        let df = tables.channels.as_ref()?;
        let analyzer: Box<dyn Analyzer + 'a> = match self {
            AnalysisKind::CategoryDistribution => {
                Box::new(CategoryDistributionAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::LikesVsSubscribers => {
                Box::new(LikesSubscribersAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::GlobalDistribution => {
                Box::new(CountryDistributionAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::IncomeAnalysis => {
                Box::new(QuarterlyIncomeAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::FollowersByCategory => {
                Box::new(FollowersByCategoryAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::MostSubscribers => {
                Box::new(MostSubscribersAnalyzer::new(df).with_style(style))
            }
            AnalysisKind::ChannelClusters => Box::new(
                ClusteringAnalyzer::new(df)
                    .with_params(clustering.clone())
                    .with_style(style),
            ),
            AnalysisKind::ViewTrends => unreachable!("handled above"),
        };
        Some(analyzer)
    }

    pub fn run(&self, tables: &Tables, style: &ChartStyle, clustering: &ClusteringParams) -> VisualizationResult {
        info!("Running analysis: {}", self.label());
        match self.analyzer(tables, style, clustering) {
            Some(analyzer) => analyzer.create_visualization(),
            None => VisualizationResult::empty(),
        }
    }

    pub fn run_prediction(
        &self,
        tables: &Tables,
        style: &ChartStyle,
        clustering: &ClusteringParams,
    ) -> Option<VisualizationResult> {
        if !self.supports_prediction() {
            return None;
        }
        match self.analyzer(tables, style, clustering) {
            Some(analyzer) => analyzer.create_prediction(),
            None => Some(VisualizationResult::empty()),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    /// Accepts the menu label or its slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-'], " ");
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.label().to_lowercase() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = AnalysisKind::ALL.iter().map(|k| k.label()).collect();
                format!("unknown analysis '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn parse_labels_and_slugs() {
        for kind in AnalysisKind::ALL {
            assert_eq!(kind.label().parse::<AnalysisKind>().unwrap(), kind);
            assert_eq!(kind.slug().parse::<AnalysisKind>().unwrap(), kind);
        }
        assert!("nope".parse::<AnalysisKind>().is_err());
        assert_eq!(AnalysisKind::ViewTrends.slug(), "view_trends");
    }

    #[test]
    fn only_likes_supports_prediction() {
        let supported: Vec<AnalysisKind> = AnalysisKind::ALL
            .into_iter()
            .filter(|k| k.supports_prediction())
            .collect();
        assert_eq!(supported, vec![AnalysisKind::LikesVsSubscribers]);
    }

    #[test]
    fn missing_tables_give_empty_results() {
        let tables = Tables::default();
        let style = ChartStyle::default();
        let params = ClusteringParams::default();
        for kind in AnalysisKind::ALL {
            assert!(kind.run(&tables, &style, &params).is_empty(), "{kind}");
        }
        let pred = AnalysisKind::LikesVsSubscribers.run_prediction(&tables, &style, &params);
        assert!(pred.unwrap().is_empty());
        assert!(AnalysisKind::CategoryDistribution
            .run_prediction(&tables, &style, &params)
            .is_none());
    }

    #[test]
    fn every_analyzer_is_a_no_op_without_its_columns() {
        // A table with none of the expected schema columns and nothing clusterable.
        let unrelated = df!("flag" => &[true, false, true]).unwrap();
        let tables = Tables::new(unrelated.clone(), unrelated);
        let style = ChartStyle::default();
        let params = ClusteringParams::default();
        for kind in AnalysisKind::ALL {
            let result = kind.run(&tables, &style, &params);
            assert!(result.figure.is_none(), "{kind}");
            assert!(result.metrics.is_empty(), "{kind}");
            if kind != AnalysisKind::ChannelClusters {
                assert!(result.insights.is_empty(), "{kind}");
            }
        }
    }
}
