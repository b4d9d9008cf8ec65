//! HDBSCAN-style density clustering: mutual reachability, minimum spanning
//! tree, condensed cluster tree and excess-of-mass selection.
//!
//! The root of the condensed tree is never selected, so a single dense blob
//! comes out as noise rather than as one cluster.

use std::collections::{HashMap, VecDeque};

use ndarray::Array2;
use tracing::debug;

use super::NOISE;

/// Smallest distance used when turning distances into densities.
const MIN_DISTANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Hdbscan {
    pub min_cluster_size: usize,
    /// Neighbourhood, the point itself included, that sets each core distance.
    pub min_samples: usize,
}

/// A merge in the single-linkage dendrogram. Node ids `>= n` are merges.
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// Edge of the condensed tree: `child` leaves `parent` at density `lambda`.
#[derive(Debug, Clone, Copy)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }
}

fn pairwise_distances(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        data.row(i)
            .iter()
            .zip(data.row(j).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    })
}

/// Distance to the `min_samples`-th nearest point, the point itself included.
fn core_distances(distances: &Array2<f64>, min_samples: usize) -> Vec<f64> {
    distances
        .rows()
        .into_iter()
        .map(|row| {
            let mut sorted = row.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            sorted[(min_samples - 1).min(sorted.len() - 1)]
        })
        .collect()
}

/// Prim's algorithm over the dense mutual reachability graph.
fn minimum_spanning_tree(reachability: &Array2<f64>) -> Vec<(usize, usize, f64)> {
    let n = reachability.nrows();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        for j in 0..n {
            if !in_tree[j] && reachability[[current, j]] < best[j] {
                best[j] = reachability[[current, j]];
                from[j] = current;
            }
        }
        let next = (0..n)
            .filter(|j| !in_tree[*j])
            .min_by(|a, b| best[*a].total_cmp(&best[*b]));
        let Some(next) = next else { break };
        edges.push((from[next], next, best[next]));
        in_tree[next] = true;
        current = next;
    }
    edges
}

fn single_linkage(n: usize, mut mst: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    mst.sort_by(|a, b| a.2.total_cmp(&b.2));
    let mut uf = UnionFind::new(2 * n);
    let mut node_of_root: Vec<usize> = (0..2 * n).collect();
    let mut merges = Vec::with_capacity(mst.len());
    for (a, b, distance) in mst {
        let (ra, rb) = (uf.find(a), uf.find(b));
        let (left, right) = (node_of_root[ra], node_of_root[rb]);
        let id = n + merges.len();
        let size = uf.size[ra] + uf.size[rb];
        merges.push(Merge {
            left,
            right,
            distance,
            size,
        });
        uf.parent[ra] = rb;
        uf.size[rb] = size;
        node_of_root[rb] = id;
    }
    merges
}

fn node_size(node: usize, n: usize, merges: &[Merge]) -> usize {
    if node < n {
        1
    } else {
        merges[node - n].size
    }
}

fn leaves_below(node: usize, n: usize, merges: &[Merge]) -> Vec<usize> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(x) = stack.pop() {
        if x < n {
            leaves.push(x);
        } else {
            stack.push(merges[x - n].left);
            stack.push(merges[x - n].right);
        }
    }
    leaves
}

/// Walk the dendrogram top-down, keeping only splits where both sides hold
/// at least `min_size` points. Cluster ids start at `n` for the root.
fn condense_tree(n: usize, merges: &[Merge], min_size: usize) -> Vec<CondensedEdge> {
    let root = n + merges.len() - 1;
    let mut relabel: HashMap<usize, usize> = HashMap::new();
    relabel.insert(root, n);
    let mut next_label = n + 1;
    let mut condensed = Vec::new();

    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        if node < n {
            continue;
        }
        let merge = merges[node - n];
        let parent = relabel[&node];
        let lambda = 1.0 / merge.distance.max(MIN_DISTANCE);
        let left_size = node_size(merge.left, n, merges);
        let right_size = node_size(merge.right, n, merges);

        let fall_out = |child: usize, condensed: &mut Vec<CondensedEdge>| {
            for leaf in leaves_below(child, n, merges) {
                condensed.push(CondensedEdge {
                    parent,
                    child: leaf,
                    lambda,
                    size: 1,
                });
            }
        };

        match (left_size >= min_size, right_size >= min_size) {
            (true, true) => {
                for (child, size) in [(merge.left, left_size), (merge.right, right_size)] {
                    relabel.insert(child, next_label);
                    condensed.push(CondensedEdge {
                        parent,
                        child: next_label,
                        lambda,
                        size,
                    });
                    next_label += 1;
                    queue.push_back(child);
                }
            }
            (false, false) => {
                fall_out(merge.left, &mut condensed);
                fall_out(merge.right, &mut condensed);
            }
            (false, true) => {
                relabel.insert(merge.right, parent);
                fall_out(merge.left, &mut condensed);
                queue.push_back(merge.right);
            }
            (true, false) => {
                relabel.insert(merge.left, parent);
                fall_out(merge.right, &mut condensed);
                queue.push_back(merge.left);
            }
        }
    }
    condensed
}

/// Excess of mass per cluster id: `Σ (λ_leave − λ_birth) · size`.
fn stabilities(condensed: &[CondensedEdge], root: usize) -> HashMap<usize, f64> {
    let mut birth: HashMap<usize, f64> = HashMap::from([(root, 0.0)]);
    for edge in condensed.iter().filter(|e| e.child > root) {
        birth.insert(edge.child, edge.lambda);
    }
    let mut stability: HashMap<usize, f64> = birth.keys().map(|c| (*c, 0.0)).collect();
    for edge in condensed {
        let born = birth.get(&edge.parent).copied().unwrap_or(0.0);
        *stability.entry(edge.parent).or_insert(0.0) += (edge.lambda - born) * edge.size as f64;
    }
    stability
}

impl Hdbscan {
    /// Cluster labels `0..k` per row, [`NOISE`] for outliers.
    pub fn fit_predict(&self, data: &Array2<f64>) -> Vec<i32> {
        let n = data.nrows();
        if n < self.min_cluster_size || n < 2 {
            return vec![NOISE; n];
        }

        let distances = pairwise_distances(data);
        let core = core_distances(&distances, self.min_samples.max(1));
        let reachability = Array2::from_shape_fn((n, n), |(i, j)| {
            distances[[i, j]].max(core[i]).max(core[j])
        });
        let mst = minimum_spanning_tree(&reachability);
        let merges = single_linkage(n, mst);
        let condensed = condense_tree(n, &merges, self.min_cluster_size);
        let root = n;

        let mut stability = stabilities(&condensed, root);
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut parent_of: HashMap<usize, usize> = HashMap::new();
        for edge in &condensed {
            parent_of.insert(edge.child, edge.parent);
            if edge.child >= n {
                children.entry(edge.parent).or_default().push(edge.child);
            }
        }

        // Children always carry larger ids than their parents.
        let mut clusters: Vec<usize> = stability.keys().copied().filter(|c| *c != root).collect();
        clusters.sort_unstable_by(|a, b| b.cmp(a));
        let mut selected: HashMap<usize, bool> = clusters.iter().map(|c| (*c, true)).collect();
        for &cluster in &clusters {
            let kids = children.get(&cluster).cloned().unwrap_or_default();
            let subtree: f64 = kids.iter().map(|k| stability[k]).sum();
            if subtree > stability[&cluster] {
                selected.insert(cluster, false);
                stability.insert(cluster, subtree);
            } else {
                let mut stack = kids;
                while let Some(sub) = stack.pop() {
                    selected.insert(sub, false);
                    if let Some(grand) = children.get(&sub) {
                        stack.extend(grand.iter().copied());
                    }
                }
            }
        }

        let mut chosen: Vec<usize> = selected
            .into_iter()
            .filter_map(|(c, keep)| keep.then_some(c))
            .collect();
        chosen.sort_unstable();
        debug!("HDBSCAN selected {} clusters from {} candidates", chosen.len(), clusters.len());
        let label_of: HashMap<usize, i32> = chosen
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as i32))
            .collect();

        (0..n)
            .map(|point| {
                let mut node = point;
                while let Some(&parent) = parent_of.get(&node) {
                    if let Some(&label) = label_of.get(&parent) {
                        return label;
                    }
                    node = parent;
                }
                NOISE
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::label_summary;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn hdbscan(min_cluster_size: usize, min_samples: usize) -> Hdbscan {
        Hdbscan {
            min_cluster_size,
            min_samples,
        }
    }

    /// Two Gaussian clouds of `per_blob` points, centred 100 apart.
    fn gaussian_blobs(per_blob: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut normal = || {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            let v: f64 = rng.gen_range(0.0..1.0);
            (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
        };
        Array2::from_shape_fn((2 * per_blob, 2), |(i, _)| {
            let centre = if i < per_blob { 0.0 } else { 100.0 };
            centre + normal()
        })
    }

    fn column(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn two_separated_blobs_give_two_clusters() {
        let data = column(&[0.0, 0.1, 0.2, 0.3, 10.0, 10.1, 10.2, 10.3]);
        let labels = hdbscan(2, 2).fit_predict(&data);
        assert_eq!(label_summary(&labels), (2, 0));
        assert!(labels[..4].iter().all(|l| *l == labels[0]));
        assert!(labels[4..].iter().all(|l| *l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn isolated_point_is_noise() {
        let data = column(&[0.0, 0.1, 0.2, 0.3, 10.0, 10.1, 10.2, 10.3, 50.0]);
        let labels = hdbscan(2, 2).fit_predict(&data);
        assert_eq!(labels[8], NOISE);
        assert_eq!(label_summary(&labels), (2, 1));
    }

    #[test]
    fn single_blob_is_all_noise() {
        let data = column(&[0.0, 0.1, 0.2, 0.3]);
        let labels = hdbscan(4, 4).fit_predict(&data);
        assert!(labels.iter().all(|l| *l == NOISE));
    }

    #[test]
    fn wider_core_keeps_gaussian_blobs_whole() {
        let data = gaussian_blobs(50, 7);
        let labels = hdbscan(2, 10).fit_predict(&data);
        assert_eq!(label_summary(&labels).0, 2);
        for label in labels.iter().filter(|l| **l != NOISE) {
            let rows: Vec<usize> = (0..100).filter(|r| labels[*r] == *label).collect();
            assert!(rows.iter().all(|r| *r < 50) || rows.iter().all(|r| *r >= 50));
        }
    }

    #[test]
    fn nearest_neighbour_core_splits_gaussian_blobs() {
        let data = gaussian_blobs(50, 7);
        let (clusters, _) = label_summary(&hdbscan(2, 2).fit_predict(&data));
        assert!(clusters > 2, "found {clusters} clusters");
    }

    #[test]
    fn uniform_noise_is_mostly_outliers() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = Array2::from_shape_fn((100, 4), |_| rng.gen_range(0.0..1.0));
        let labels = hdbscan(2, 10).fit_predict(&data);
        assert_eq!(labels.len(), 100);
        let (clusters, outliers) = label_summary(&labels);
        assert!(clusters == 0 || outliers > clusters, "{clusters} clusters, {outliers} outliers");
    }

    #[test]
    fn duplicate_points_are_handled() {
        let data = column(&[1.0, 1.0, 1.0, 5.0, 5.0, 5.0]);
        let labels = hdbscan(2, 2).fit_predict(&data);
        assert_eq!(label_summary(&labels), (2, 0));
    }

    #[test]
    fn too_few_points_are_noise() {
        let labels = hdbscan(2, 2).fit_predict(&column(&[3.0]));
        assert_eq!(labels, vec![NOISE]);
    }
}
