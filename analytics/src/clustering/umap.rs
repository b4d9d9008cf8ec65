//! UMAP-style embedding: a fuzzy simplicial set over the k nearest neighbours,
//! laid out in low dimension by stochastic gradient descent.
//!
//! The layout starts from the leading non-trivial eigenvectors of the
//! normalised graph, so separate components start apart and a single
//! component starts in one piece.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const BINARY_SEARCH_STEPS: usize = 64;
const NEGATIVE_SAMPLE_RATE: f64 = 5.0;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;
const INIT_JITTER: f64 = 1e-4;
const SPECTRAL_ITERATIONS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Umap {
    pub n_neighbors: usize,
    pub n_components: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: usize,
    pub seed: u64,
}

/// A directed edge of the fuzzy graph.
#[derive(Debug, Clone, Copy)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f64,
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Indices and distances of the `k` nearest points of every row, the row itself first.
pub fn nearest_neighbors(data: &Array2<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = data.nrows();
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);
    for i in 0..n {
        let mut row: Vec<(usize, f64)> = (0..n)
            .map(|j| (j, if i == j { 0.0 } else { euclidean(data.row(i), data.row(j)) }))
            .collect();
        // self wins ties at distance zero
        row.sort_by(|a, b| a.1.total_cmp(&b.1).then((a.0 != i).cmp(&(b.0 != i))));
        row.truncate(k);
        indices.push(row.iter().map(|(j, _)| *j).collect());
        distances.push(row.iter().map(|(_, d)| *d).collect());
    }
    (indices, distances)
}

/// Per-point `(sigma, rho)` so that the fuzzy neighbourhood has `log2(k)` total membership.
pub fn smooth_knn_dist(distances: &[Vec<f64>], k: usize) -> (Vec<f64>, Vec<f64>) {
    let target = (k as f64).log2();
    let all_mean = {
        let flat: Vec<f64> = distances.iter().flatten().copied().collect();
        if flat.is_empty() {
            0.0
        } else {
            flat.iter().sum::<f64>() / flat.len() as f64
        }
    };

    let mut sigmas = Vec::with_capacity(distances.len());
    let mut rhos = Vec::with_capacity(distances.len());
    for row in distances {
        let rho = row.iter().copied().find(|d| *d > 0.0).unwrap_or(0.0);

        let (mut lo, mut hi, mut mid) = (0.0_f64, f64::INFINITY, 1.0_f64);
        for _ in 0..BINARY_SEARCH_STEPS {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|d| {
                    let d = d - rho;
                    if d > 0.0 {
                        (-d / mid).exp()
                    } else {
                        1.0
                    }
                })
                .sum();
            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
            }
        }

        let row_mean = row.iter().sum::<f64>() / row.len().max(1) as f64;
        let floor = if rho > 0.0 { row_mean } else { all_mean } * MIN_K_DIST_SCALE;
        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }
    (sigmas, rhos)
}

/// Dense symmetric membership matrix `A + Aᵀ - A∘Aᵀ`.
fn fuzzy_simplicial_set(data: &Array2<f64>, k: usize) -> Array2<f64> {
    let n = data.nrows();
    let (indices, distances) = nearest_neighbors(data, k);
    let (sigmas, rhos) = smooth_knn_dist(&distances, k);

    let mut directed = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for (&j, &d) in indices[i].iter().zip(&distances[i]) {
            if i == j {
                continue;
            }
            directed[[i, j]] = if d - rhos[i] <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-(d - rhos[i]) / sigmas[i]).exp()
            };
        }
    }
    let transposed = directed.t().to_owned();
    &directed + &transposed - &directed * &transposed
}

/// Gram-Schmidt over the columns of `basis`, also removing `trivial`.
fn orthonormalize(basis: &mut Array2<f64>, trivial: &Array1<f64>) {
    for c in 0..basis.ncols() {
        let mut v = basis.column(c).to_owned();
        let along = trivial.dot(&v);
        v.scaled_add(-along, trivial);
        for prev in 0..c {
            let u = basis.column(prev);
            let along = u.dot(&v);
            v.scaled_add(-along, &u);
        }
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        basis.column_mut(c).assign(&v);
    }
}

/// Leading eigenvectors of `D^-1/2 G D^-1/2` after the trivial `sqrt(degree)`
/// one, by subspace iteration. Scaled so the largest coordinate is `INIT_RANGE`.
fn spectral_layout(graph: &Array2<f64>, dim: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = graph.nrows();
    let degree = graph.sum_axis(Axis(1));
    let inv_sqrt = degree.mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });

    // (I + D^-1/2 G D^-1/2) / 2 has its spectrum in [0, 1]
    let mut operator = Array2::from_shape_fn((n, n), |(i, j)| {
        0.5 * graph[[i, j]] * inv_sqrt[i] * inv_sqrt[j]
    });
    operator.diag_mut().mapv_inplace(|v| v + 0.5);

    let mut trivial = degree.mapv(f64::sqrt);
    let norm = trivial.dot(&trivial).sqrt();
    if norm > 0.0 {
        trivial /= norm;
    }

    let mut basis = Array2::from_shape_fn((n, dim), |_| rng.gen_range(-1.0..1.0));
    orthonormalize(&mut basis, &trivial);
    for _ in 0..SPECTRAL_ITERATIONS {
        basis = operator.dot(&basis);
        orthonormalize(&mut basis, &trivial);
    }

    let max_abs = basis.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let expansion = if max_abs > 0.0 { INIT_RANGE / max_abs } else { 1.0 };
    basis.mapv(|v| v * expansion + rng.gen_range(-INIT_JITTER..INIT_JITTER))
}

fn curve(x: f64, a: f64, b: f64) -> f64 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

/// Fit `1 / (1 + a·x^(2b))` to the target membership curve with
/// Levenberg-Marquardt, starting from `a = b = 1`.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300)
        .map(|i| spread * 3.0 * i as f64 / 299.0)
        .filter(|x| *x > 0.0)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();
    let cost = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (curve(x, a, b) - y).powi(2))
            .sum()
    };

    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    let mut lambda = 1e-3;
    let mut current = cost(a, b);
    for _ in 0..500 {
        let (mut jtj, mut jtr) = ([[0.0; 2]; 2], [0.0; 2]);
        for (&x, &y) in xs.iter().zip(&ys) {
            let u = x.powf(2.0 * b);
            let denom = (1.0 + a * u).powi(2);
            let da = -u / denom;
            let db = -a * u * 2.0 * x.ln() / denom;
            let r = curve(x, a, b) - y;
            let j = [da, db];
            for p in 0..2 {
                jtr[p] += j[p] * r;
                for q in 0..2 {
                    jtj[p][q] += j[p] * j[q];
                }
            }
        }
        let m00 = jtj[0][0] * (1.0 + lambda);
        let m11 = jtj[1][1] * (1.0 + lambda);
        let det = m00 * m11 - jtj[0][1] * jtj[1][0];
        if det.abs() < f64::EPSILON {
            break;
        }
        let step_a = (m11 * jtr[0] - jtj[0][1] * jtr[1]) / det;
        let step_b = (m00 * jtr[1] - jtj[1][0] * jtr[0]) / det;
        let (na, nb) = (a - step_a, b - step_b);
        let candidate = cost(na, nb);
        if candidate.is_finite() && candidate < current {
            let improvement = current - candidate;
            a = na;
            b = nb;
            current = candidate;
            lambda = (lambda / 10.0).max(1e-12);
            if improvement < 1e-14 {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }
    (a, b)
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

impl Umap {
    /// Embed `data` (rows are points) into `n_components` dimensions.
    pub fn fit_transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let n = data.nrows();
        let dim = self.n_components;
        if n < 2 {
            return Array2::zeros((n, dim));
        }
        let k = self.n_neighbors.clamp(2, n);
        let graph = fuzzy_simplicial_set(data, k);
        let (a, b) = find_ab_params(self.spread, self.min_dist);
        debug!("UMAP over {} points, k = {}, a = {:.3}, b = {:.3}", n, k, a, b);

        let max_weight = graph.iter().copied().fold(0.0, f64::max);
        let threshold = max_weight / self.n_epochs.max(1) as f64;
        let mut edges = Vec::new();
        for ((head, tail), &weight) in graph.indexed_iter() {
            if head != tail && weight > 0.0 && weight >= threshold {
                edges.push(Edge { head, tail, weight });
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut embedding = spectral_layout(&graph, dim, &mut rng);
        for mut column in embedding.columns_mut() {
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let span = if max > min { max - min } else { 1.0 };
            column.mapv_inplace(|v| INIT_RANGE * (v - min) / span);
        }
        if edges.is_empty() {
            return embedding;
        }

        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
        let epochs_per_negative: Vec<f64> = epochs_per_sample
            .iter()
            .map(|e| e / NEGATIVE_SAMPLE_RATE)
            .collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        let mut delta = vec![0.0; dim];
        for epoch in 0..self.n_epochs {
            let alpha = 1.0 - epoch as f64 / self.n_epochs as f64;
            let now = epoch as f64;
            for (e, edge) in edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }
                let (j, k) = (edge.head, edge.tail);

                for d in 0..dim {
                    delta[d] = embedding[[j, d]] - embedding[[k, d]];
                }
                let dist2: f64 = delta.iter().map(|v| v * v).sum();
                let coeff = if dist2 > 0.0 {
                    -2.0 * a * b * dist2.powf(b - 1.0) / (a * dist2.powf(b) + 1.0)
                } else {
                    0.0
                };
                for d in 0..dim {
                    let grad = clip(coeff * delta[d]) * alpha;
                    embedding[[j, d]] += grad;
                    embedding[[k, d]] -= grad;
                }
                next_sample[e] += epochs_per_sample[e];

                let n_negative = ((now - next_negative[e]) / epochs_per_negative[e]).floor().max(0.0) as usize;
                for _ in 0..n_negative {
                    let other = rng.gen_range(0..n);
                    if other == j {
                        continue;
                    }
                    for d in 0..dim {
                        delta[d] = embedding[[j, d]] - embedding[[other, d]];
                    }
                    let dist2: f64 = delta.iter().map(|v| v * v).sum();
                    let coeff = if dist2 > 0.0 {
                        2.0 * b / ((0.001 + dist2) * (a * dist2.powf(b) + 1.0))
                    } else {
                        0.0
                    };
                    for d in 0..dim {
                        let grad = if coeff > 0.0 { clip(coeff * delta[d]) } else { GRADIENT_CLIP };
                        embedding[[j, d]] += grad * alpha;
                    }
                }
                next_negative[e] += n_negative as f64 * epochs_per_negative[e];
            }
        }
        embedding
    }
}
