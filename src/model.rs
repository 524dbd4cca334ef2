//! K-Means clustering over a range of candidate cluster counts

use crate::data::ResponseMatrix;
use crate::error::AnalysisError;
use crate::items::N_ITEMS;
use linfa::prelude::*;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Knobs shared by every k-means fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansSettings {
    /// Maximum Lloyd iterations per run
    pub max_iters: u64,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Number of k-means++ restarts; the best run is kept
    pub n_runs: usize,
    /// Base seed; each k derives its own generator from it
    pub seed: u64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            max_iters: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: 42,
        }
    }
}

impl KMeansSettings {
    /// Seed for the fit with `k` clusters, independent of the order fits are run in
    pub fn seed_for(&self, k: usize) -> u64 {
        self.seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// Result of fitting k-means with a fixed number of clusters
#[derive(Debug, Clone)]
pub struct ClusterFit {
    /// Number of clusters
    pub k: usize,
    /// Zero-based cluster index per record, in record order
    pub assignments: Array1<usize>,
    /// Mean item vector of every cluster (k, 10)
    pub centroids: Array2<f64>,
    /// Total within-cluster sum of squared distances
    pub wss: f64,
}

impl ClusterFit {
    /// One-based cluster label of a record, as shown in reports
    pub fn label(&self, record: usize) -> usize {
        self.assignments[record] + 1
    }

    /// Number of records in every cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &cluster in self.assignments.iter() {
            if cluster < self.k {
                sizes[cluster] += 1;
            }
        }
        sizes
    }

    /// Nearest centroid for a new response vector (zero-based)
    pub fn predict(&self, response: ArrayView1<f64>) -> crate::Result<usize> {
        if response.len() != N_ITEMS {
            anyhow::bail!(
                "Response vector must have exactly {} items, got {}",
                N_ITEMS,
                response.len()
            );
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;
        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = squared_distance(response, centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Mean silhouette coefficient over the first `sample_size` records
    pub fn compute_silhouette_sample(&self, records: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = records.nrows().min(sample_size);
        if n_samples < 2 || self.k < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;
        for i in 0..n_samples {
            let point = records.row(i);
            let cluster = self.assignments[i];

            let mut same_cluster = (0.0, 0usize);
            let mut other_clusters = vec![(0.0, 0usize); self.k];
            for j in (0..n_samples).filter(|&j| j != i) {
                let distance = squared_distance(point, records.row(j)).sqrt();
                let other = self.assignments[j];
                let slot = if other == cluster {
                    &mut same_cluster
                } else {
                    &mut other_clusters[other]
                };
                slot.0 += distance;
                slot.1 += 1;
            }

            let a_i = if same_cluster.1 == 0 {
                0.0
            } else {
                same_cluster.0 / same_cluster.1 as f64
            };
            let b_i = other_clusters
                .iter()
                .filter(|(_, count)| *count > 0)
                .map(|(sum, count)| sum / *count as f64)
                .fold(f64::INFINITY, f64::min);

            if !b_i.is_infinite() && a_i.max(b_i) > 0.0 {
                silhouette_sum += (b_i - a_i) / a_i.max(b_i);
            }
        }

        silhouette_sum / n_samples as f64
    }
}

/// Fits for every candidate k, ordered by k
#[derive(Debug, Clone)]
pub struct ClusterFitCollection {
    fits: Vec<ClusterFit>,
}

impl ClusterFitCollection {
    pub fn iter(&self) -> impl Iterator<Item = &ClusterFit> {
        self.fits.iter()
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// The fit for a given k
    pub fn get(&self, k: usize) -> crate::Result<&ClusterFit> {
        self.fits
            .iter()
            .find(|fit| fit.k == k)
            .ok_or_else(|| AnalysisError::UnknownCandidate { k }.into())
    }

    /// `(k, wss)` pairs in ascending k
    pub fn wss_curve(&self) -> Vec<(usize, f64)> {
        self.fits.iter().map(|fit| (fit.k, fit.wss)).collect()
    }
}

/// Candidate cluster counts `1..=max_k`
pub fn candidate_range(max_k: usize) -> Vec<usize> {
    (1..=max_k).collect()
}

/// Fit K-Means with `k` clusters
///
/// # Arguments
/// * `responses` - Cleaned response matrix
/// * `k` - Number of clusters, at least 1 and at most the number of distinct responses
/// * `settings` - Iteration limits, restarts and seed
///
/// # Returns
/// * `ClusterFit` whose centroids are the exact means of the final assignments
pub fn fit_kmeans(
    responses: &ResponseMatrix,
    k: usize,
    settings: &KMeansSettings,
) -> crate::Result<ClusterFit> {
    if k == 0 {
        return Err(AnalysisError::InvalidClusterCount { k }.into());
    }

    let records = responses.records();
    let distinct = count_distinct(records);
    if k > distinct {
        return Err(AnalysisError::InsufficientDistinctPoints { k, distinct }.into());
    }

    let n_samples = records.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(records.clone(), targets);

    let rng = StdRng::seed_from_u64(settings.seed_for(k));
    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(settings.max_iters)
        .tolerance(settings.tolerance)
        .n_runs(settings.n_runs)
        .init_method(KMeansInit::KMeansPlusPlus)
        .fit(&dataset)?;

    let assignments: Array1<usize> = model.predict(records);
    let centroids = mean_centroids(records, &assignments, model.centroids());
    let wss = compute_wss(records, &assignments, &centroids);

    debug!(k, wss, "fitted k-means");

    Ok(ClusterFit {
        k,
        assignments,
        centroids,
        wss,
    })
}

/// Fit every candidate k independently, in parallel
///
/// Each fit seeds its own generator from `settings.seed` and its k, so the collection is the
/// same whatever order the fits complete in.
pub fn fit_candidates(
    responses: &ResponseMatrix,
    candidates: &[usize],
    settings: &KMeansSettings,
) -> crate::Result<ClusterFitCollection> {
    info!(
        candidates = candidates.len(),
        max_iters = settings.max_iters,
        tolerance = settings.tolerance,
        n_runs = settings.n_runs,
        seed = settings.seed,
        "fitting k-means candidates"
    );

    let mut fits = candidates
        .par_iter()
        .map(|&k| fit_kmeans(responses, k, settings))
        .collect::<crate::Result<Vec<_>>>()?;
    fits.sort_by_key(|fit| fit.k);
    fits.dedup_by_key(|fit| fit.k);

    Ok(ClusterFitCollection { fits })
}

/// Number of distinct response vectors
pub fn count_distinct(records: &Array2<f64>) -> usize {
    records
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Arithmetic mean of the records assigned to each cluster
///
/// A cluster left without members keeps the fallback centroid from the fitted model.
fn mean_centroids(
    records: &Array2<f64>,
    assignments: &Array1<usize>,
    fallback: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(fallback.raw_dim());
    let mut counts = vec![0usize; fallback.nrows()];

    for (record, &cluster) in records.outer_iter().zip(assignments.iter()) {
        let mut row = sums.row_mut(cluster);
        row += &record;
        counts[cluster] += 1;
    }

    for (cluster, &count) in counts.iter().enumerate() {
        if count == 0 {
            warn!(cluster, "empty cluster after convergence, keeping fitted centroid");
            sums.row_mut(cluster).assign(&fallback.row(cluster));
        } else {
            sums.row_mut(cluster).mapv_inplace(|v| v / count as f64);
        }
    }

    sums
}

/// Total within-cluster sum of squares
fn compute_wss(records: &Array2<f64>, assignments: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    records
        .outer_iter()
        .zip(assignments.iter())
        .map(|(record, &cluster)| squared_distance(record, centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
