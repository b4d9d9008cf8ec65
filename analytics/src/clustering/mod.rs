//! Density clustering of channels: feature preparation, a UMAP-style manifold
//! projection, HDBSCAN-style cluster extraction and human readable names.
//!
//! Everything here works on dense `ndarray` matrices and is quadratic in the
//! number of rows, which is fine for the few hundred channels of a top list.

use serde::{Deserialize, Serialize};

pub mod features;
pub mod hdbscan;
pub mod naming;
pub mod umap;

pub use features::{split_features, FeatureSplit, OneHotEncoder, StandardScaler};
pub use hdbscan::Hdbscan;
pub use naming::{cluster_names, NamingInput, NOISE_LABEL};
pub use umap::Umap;

/// Label given to points that belong to no cluster.
pub const NOISE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// 2 or 3.
    pub n_components: usize,
    pub min_cluster_size: usize,
    /// Neighbourhood size behind the HDBSCAN core distance.
    pub min_samples: usize,
    pub seed: u64,
    pub n_epochs: usize,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        ClusteringParams {
            n_neighbors: 10,
            min_dist: 0.1,
            spread: 1.0,
            n_components: 3,
            min_cluster_size: 2,
            min_samples: 20,
            seed: 42,
            n_epochs: 500,
        }
    }
}

impl ClusteringParams {
    pub fn umap(&self) -> Umap {
        Umap {
            n_neighbors: self.n_neighbors,
            n_components: self.n_components.clamp(2, 3),
            min_dist: self.min_dist,
            spread: self.spread,
            n_epochs: self.n_epochs,
            seed: self.seed,
        }
    }

    pub fn hdbscan(&self) -> Hdbscan {
        Hdbscan {
            min_cluster_size: self.min_cluster_size.max(2),
            min_samples: self.min_samples.max(1),
        }
    }
}

/// Number of clusters and of noise points in a label vector.
pub fn label_summary(labels: &[i32]) -> (usize, usize) {
    let mut clusters: Vec<i32> = labels.iter().copied().filter(|l| *l != NOISE).collect();
    clusters.sort_unstable();
    clusters.dedup();
    let outliers = labels.iter().filter(|l| **l == NOISE).count();
    (clusters.len(), outliers)
}
