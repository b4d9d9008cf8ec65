use std::collections::BTreeMap;

use ndarray::Array2;
use polars::prelude::*;
use tracing::{debug, info};

use crate::analysis::Analyzer;
use crate::clustering::features::{numeric_columns, string_columns};
use crate::clustering::{
    cluster_names, label_summary, split_features, ClusteringParams, FeatureSplit, NamingInput,
    OneHotEncoder, StandardScaler,
};
use crate::figure::{Axis, ChartStyle, Figure, ScatterMode, Trace, PALETTE};
use crate::models::{Metrics, VisualizationResult};

pub const CLUSTER: &str = "Cluster";
pub const CLUSTER_NAME: &str = "Cluster_Name";

/// Everything the clustering pipeline produces for one table.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub labels: Vec<i32>,
    pub names: BTreeMap<i32, String>,
    pub embedding: Array2<f64>,
    pub features: FeatureSplit,
    hover: Vec<String>,
}

impl ClusterAssignment {
    pub fn name_of(&self, label: i32) -> &str {
        self.names.get(&label).map(String::as_str).unwrap_or_default()
    }
}

/// Groups channels by UMAP projection followed by HDBSCAN.
pub struct ClusteringAnalyzer<'a> {
    df: &'a DataFrame,
    params: ClusteringParams,
    style: ChartStyle,
}

impl<'a> ClusteringAnalyzer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        ClusteringAnalyzer {
            df,
            params: ClusteringParams::default(),
            style: ChartStyle::default(),
        }
    }

    pub fn with_params(mut self, params: ClusteringParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    fn features(&self) -> FeatureSplit {
        let mut split = split_features(self.df);
        split.numerical.retain(|c| c != CLUSTER);
        split.categorical.retain(|c| c != CLUSTER_NAME);
        split
    }

    /// Run the pipeline. `None` when there is nothing to cluster.
    pub fn fit(&self) -> PolarsResult<Option<ClusterAssignment>> {
        let features = self.features();
        if features.is_empty() || self.df.height() == 0 {
            return Ok(None);
        }
        let numerical = numeric_columns(self.df, &features.numerical)?;
        let categorical = string_columns(self.df, &features.categorical)?;

        let scaled = if numerical.is_empty() {
            Array2::zeros((self.df.height(), 0))
        } else {
            StandardScaler::fit_transform(&numerical)
        };
        let matrix = if numerical.is_empty() {
            OneHotEncoder::fit(&categorical).transform(&categorical)
        } else {
            scaled.clone()
        };
        debug!(
            "Clustering {} rows over {} numerical and {} categorical features ({} matrix columns)",
            self.df.height(),
            features.numerical.len(),
            features.categorical.len(),
            matrix.ncols()
        );

        let embedding = self.params.umap().fit_transform(&matrix);
        let labels = self.params.hdbscan().fit_predict(&embedding);
        let names = cluster_names(
            &labels,
            &NamingInput {
                numerical_names: &features.numerical,
                scaled: &scaled,
                numerical_raw: &numerical,
                categorical_names: &features.categorical,
                categorical_raw: &categorical,
            },
        );

        let hover = (0..self.df.height())
            .map(|i| {
                let values = numerical
                    .iter()
                    .map(|col| col[i].map_or("null".to_string(), |v| v.to_string()))
                    .chain(
                        categorical
                            .iter()
                            .map(|col| col[i].clone().unwrap_or_else(|| "null".to_string())),
                    );
                features
                    .all()
                    .zip(values)
                    .map(|(name, value)| format!("{}: {}", name, value))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();

        Ok(Some(ClusterAssignment {
            labels,
            names,
            embedding,
            features,
            hover,
        }))
    }

    /// A copy of the input with `Cluster` and `Cluster_Name` appended.
    pub fn annotated_table(&self, assignment: &ClusterAssignment) -> PolarsResult<DataFrame> {
        let names: Vec<&str> = assignment.labels.iter().map(|l| assignment.name_of(*l)).collect();
        let mut out = self.df.clone();
        out.with_column(Series::new(CLUSTER.into(), assignment.labels.clone()))?;
        out.with_column(Series::new(CLUSTER_NAME.into(), names))?;
        Ok(out)
    }

    fn figure(&self, assignment: &ClusterAssignment) -> Figure {
        let three_d = assignment.embedding.ncols() >= 3;
        let mut figure = Figure::new("✨ Category Clustering of Top Youtube Channels", &self.style)
            .with_axes(Axis::titled("UMAP 1"), Axis::titled("UMAP 2"));
        figure.legend_title = Some("Cluster Name".to_string());
        if three_d {
            figure.z_axis = Some(Axis::titled("UMAP 3"));
        }

        for (i, (label, name)) in assignment.names.iter().enumerate() {
            let rows: Vec<usize> = (0..assignment.labels.len())
                .filter(|r| assignment.labels[*r] == *label)
                .collect();
            let coord = |d: usize| -> Vec<f64> {
                rows.iter().map(|r| assignment.embedding[[*r, d]]).collect()
            };
            let hover = rows.iter().map(|r| assignment.hover[*r].clone()).collect();
            let color = Some(PALETTE[i % PALETTE.len()].to_string());
            let trace = if three_d {
                Trace::Scatter3d {
                    name: name.clone(),
                    x: coord(0),
                    y: coord(1),
                    z: coord(2),
                    color,
                    hover,
                }
            } else {
                Trace::Scatter {
                    name: name.clone(),
                    x: coord(0),
                    y: coord(1),
                    mode: ScatterMode::Markers,
                    color,
                    hover,
                }
            };
            figure = figure.with_trace(trace);
        }
        figure
    }
}

impl Analyzer for ClusteringAnalyzer<'_> {
    fn name(&self) -> &'static str {
        "clustering"
    }

    fn analyze(&self) -> PolarsResult<VisualizationResult> {
        if self.features().is_empty() {
            return Ok(VisualizationResult {
                insights: vec!["No features selected for clustering.".to_string()],
                ..VisualizationResult::default()
            });
        }
        let Some(assignment) = self.fit()? else {
            return Ok(VisualizationResult::empty());
        };
        let (clusters, outliers) = label_summary(&assignment.labels);
        info!("Found {} clusters and {} outliers", clusters, outliers);

        let mut metrics = Metrics::new();
        metrics.insert("Number of Clusters", clusters);
        metrics.insert("Number of Outliers", outliers);
        let insights = vec![
            format!("Number of clusters identified: {}", clusters),
            format!("Number of outliers detected: {}", outliers),
        ];

        let table = self.annotated_table(&assignment)?;
        Ok(VisualizationResult::new(self.figure(&assignment), metrics, insights).with_extra_data(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn two_blobs() -> DataFrame {
        let views: Vec<i64> = (0..12)
            .map(|i| 1_000_000_000 + i * 1_000_000)
            .chain((0..12).map(|i| 1_000_000 + i * 1_000))
            .collect();
        let likes: Vec<i64> = (0..12)
            .map(|i| 5_000_000 + i * 10_000)
            .chain((0..12).map(|i| 1_000 + i * 10))
            .collect();
        let category: Vec<&str> = (0..24).map(|i| if i < 12 { "Music" } else { "Gaming" }).collect();
        df!("Views" => views, "Likes" => likes, "Category" => category).unwrap()
    }

    /// Two Gaussian clouds of `per_blob` channels, centred 100 apart on both axes.
    fn gaussian_blobs(per_blob: usize, seed: u64) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut normal = || {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            let v: f64 = rng.gen_range(0.0..1.0);
            (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
        };
        let mut views = Vec::with_capacity(2 * per_blob);
        let mut likes = Vec::with_capacity(2 * per_blob);
        for i in 0..2 * per_blob {
            let centre = if i < per_blob { 0.0 } else { 100.0 };
            views.push(centre + normal());
            likes.push(centre + normal());
        }
        df!("Views" => views, "Likes" => likes).unwrap()
    }

    #[test]
    fn gaussian_blobs_give_exactly_two_clusters() {
        let df = gaussian_blobs(50, 3);
        let assignment = ClusteringAnalyzer::new(&df).fit().unwrap().unwrap();
        let (clusters, _) = label_summary(&assignment.labels);
        assert_eq!(clusters, 2);

        for label in assignment.labels.iter().filter(|l| **l >= 0) {
            let rows: Vec<usize> = (0..100).filter(|r| assignment.labels[*r] == *label).collect();
            assert!(rows.iter().all(|r| *r < 50) || rows.iter().all(|r| *r >= 50));
        }
    }

    #[test]
    fn uniform_table_is_noise_dominated() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut column = || -> Vec<f64> { (0..100).map(|_| rng.gen_range(0.0..1.0)).collect() };
        let df = df!(
            "Views" => column(),
            "Likes" => column(),
            "followers" => column(),
            "Income" => column()
        )
        .unwrap();
        let assignment = ClusteringAnalyzer::new(&df).fit().unwrap().unwrap();
        let (clusters, outliers) = label_summary(&assignment.labels);
        assert_eq!(assignment.labels.len(), 100);
        assert!(clusters == 0 || outliers > clusters, "{clusters} clusters, {outliers} outliers");
    }

    #[test]
    fn result_carries_metrics_and_annotated_copy() {
        let df = two_blobs();
        let result = ClusteringAnalyzer::new(&df).create_visualization();

        let clusters = result.metrics.get("Number of Clusters").unwrap().as_f64().unwrap();
        let outliers = result.metrics.get("Number of Outliers").unwrap().as_f64().unwrap();
        assert_eq!(result.insights[0], format!("Number of clusters identified: {}", clusters));
        assert_eq!(result.insights[1], format!("Number of outliers detected: {}", outliers));

        let figure = result.figure.unwrap();
        assert!(figure.is_3d());
        let points: usize = figure.traces.iter().map(Trace::len).sum();
        assert_eq!(points, 24);

        let table = result.extra_data.unwrap();
        assert_eq!(table.height(), 24);
        assert_eq!(table.column(CLUSTER).unwrap().dtype(), &DataType::Int32);
        assert!(table.column(CLUSTER_NAME).is_ok());
        // the input is left untouched
        assert!(df.column(CLUSTER).is_err());
    }

    #[test]
    fn hover_lists_numerical_then_categorical_features() {
        let df = df!(
            "Category" => &[Some("Music"), None, Some("Gaming")],
            "Views" => &[1.5, 2.0, 3.0]
        )
        .unwrap();
        let assignment = ClusteringAnalyzer::new(&df).fit().unwrap().unwrap();
        assert_eq!(assignment.hover[0], "Views: 1.5, Category: Music");
        assert_eq!(assignment.hover[1], "Views: 2, Category: null");
    }

    #[test]
    fn two_components_give_flat_scatter() {
        let df = two_blobs();
        let params = ClusteringParams {
            n_components: 2,
            ..ClusteringParams::default()
        };
        let result = ClusteringAnalyzer::new(&df).with_params(params).create_visualization();
        let figure = result.figure.unwrap();
        assert!(!figure.is_3d());
        assert!(figure.z_axis.is_none());
    }

    #[test]
    fn categorical_only_tables_are_one_hot_encoded() {
        let df = df!(
            "Category" => &["Music", "Music", "Music", "Gaming", "Gaming", "Gaming", "Film", "Film"],
            "Country" => &["IN", "IN", "IN", "US", "US", "US", "BR", "BR"]
        )
        .unwrap();
        let result = ClusteringAnalyzer::new(&df).create_visualization();
        assert!(result.figure.is_some());
        assert_eq!(result.extra_data.unwrap().height(), 8);
    }

    #[test]
    fn nothing_to_cluster() {
        let df = df!("flag" => &[true, false]).unwrap();
        let result = ClusteringAnalyzer::new(&df).create_visualization();
        assert!(result.figure.is_none());
        assert!(result.metrics.is_empty());
        assert_eq!(result.insights, vec!["No features selected for clustering.".to_string()]);
    }

    #[test]
    fn repeated_runs_agree() {
        let df = two_blobs();
        let analyzer = ClusteringAnalyzer::new(&df);
        let a = analyzer.create_visualization();
        let b = analyzer.create_visualization();
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.figure, b.figure);
    }
}
