/// Weighted cluster assignment.
///
/// Lloyd's k-means over the scaled feature matrix, seeded with k-means++
/// from `StdRng::seed_from_u64(seed)`, followed by a per-cluster severity
/// score: the weighted sum of the cluster's mean scaled features.
///
/// # Seeding
/// - The first centroid is a uniformly drawn point.
/// - Each further centroid is drawn with probability proportional to its
///   squared distance to the nearest chosen centroid.
/// - If every point is already at distance 0 (fewer distinct points than
///   `k`), the lowest-index point not yet chosen is taken without drawing.
///
/// Identical input, `k` and seed always yield identical labels. Points that
/// tie between centroids go to the lowest centroid index, and an emptied
/// cluster keeps its previous centroid.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansParams {
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            clusters: 5,
            seed: 42,
            max_iterations: 300,
        }
    }
}

/// One realized (non-empty) cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    /// Label in first-seen order: 0 is the cluster of the first row.
    pub label: usize,
    pub size: usize,
    pub feature_means: Vec<f64>,
    pub severity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Per-row cluster label, aligned with the feature rows.
    pub labels: Vec<usize>,
    /// Realized clusters, indexed by label.
    pub clusters: Vec<ClusterSummary>,
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// k-means
// ---------------------------------------------------------------------------

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// k-means++ initial centroids.
fn seed_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut chosen = vec![false; n];
    let first = rng.gen_range(0..n);
    chosen[first] = true;
    let mut centroids = vec![points[first].clone()];

    while centroids.len() < k {
        let d2: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = d2.iter().sum();

        let next = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut acc = 0.0;
            let mut pick = None;
            for (i, d) in d2.iter().enumerate() {
                acc += d;
                if *d > 0.0 && acc > target {
                    pick = Some(i);
                    break;
                }
            }
            // Rounding can leave `acc` just under `target`; fall back to the
            // last point with non-zero weight.
            pick.or_else(|| d2.iter().rposition(|d| *d > 0.0))
        } else {
            None
        };

        let next = match next.or_else(|| chosen.iter().position(|c| !c)) {
            Some(i) => i,
            None => break,
        };
        chosen[next] = true;
        centroids.push(points[next].clone());
    }

    centroids
}

/// Raw k-means labels (centroid indices) and iteration count.
fn lloyd(points: &[Vec<f64>], params: KMeansParams) -> (Vec<usize>, usize) {
    let n = points.len();
    let k = params.clusters.clamp(1, n);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let width = points[0].len();

    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;

    for _ in 0..params.max_iterations.max(1) {
        iterations += 1;
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest(p, &centroids);
            if labels[i] != c {
                labels[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; width]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (p, &c) in points.iter().zip(&labels) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p) {
                *s += v;
            }
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                *centroid = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            }
        }
    }

    (labels, iterations)
}

/// Renumbers labels in order of first appearance.
fn relabel_first_seen(raw: &[usize]) -> Vec<usize> {
    let mut mapping: Vec<(usize, usize)> = Vec::new();
    raw.iter()
        .map(|r| match mapping.iter().find(|(from, _)| from == r) {
            Some(&(_, to)) => to,
            None => {
                let to = mapping.len();
                mapping.push((*r, to));
                to
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Clusters the scaled rows and scores each realized cluster.
///
/// Fewer than `params.clusters` clusters may be realized when there are
/// fewer distinct rows than requested clusters. Empty input yields an
/// empty clustering.
pub fn assign_clusters(rows: &[Vec<f64>], weights: &[f64], params: KMeansParams) -> Clustering {
    if rows.is_empty() {
        return Clustering {
            labels: Vec::new(),
            clusters: Vec::new(),
            iterations: 0,
        };
    }

    let (raw, iterations) = lloyd(rows, params);
    let labels = relabel_first_seen(&raw);
    let realized = labels.iter().max().map_or(0, |m| m + 1);
    let width = weights.len();

    let mut sums = vec![vec![0.0; width]; realized];
    let mut sizes = vec![0usize; realized];
    for (row, &label) in rows.iter().zip(&labels) {
        sizes[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(row) {
            *s += v;
        }
    }

    let clusters = (0..realized)
        .map(|label| {
            let feature_means: Vec<f64> =
                sums[label].iter().map(|s| s / sizes[label] as f64).collect();
            let severity: f64 = feature_means.iter().zip(weights).map(|(m, w)| m * w).sum();
            ClusterSummary {
                label,
                size: sizes[label],
                feature_means,
                severity,
            }
        })
        .collect();

    Clustering {
        labels,
        clusters,
        iterations,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
