//! Cluster summaries: PCA scatter join, centroid tables and console statistics

use crate::data::ResponseMatrix;
use crate::items::{Item, ITEMS};
use crate::model::ClusterFit;
use crate::pca::Projection;
use crate::selection::{ElbowCurve, Selection};
use anyhow::Context;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// One record in principal component space with its cluster label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterPoint {
    pub pc1: f64,
    pub pc2: f64,
    /// One-based cluster label
    pub cluster: usize,
}

/// Join the projection with cluster labels by record position
pub fn scatter_points(projection: &Projection, fit: &ClusterFit) -> crate::Result<Vec<ScatterPoint>> {
    if projection.len() != fit.assignments.len() {
        anyhow::bail!(
            "Projection has {} rows but the model assigned {} records",
            projection.len(),
            fit.assignments.len()
        );
    }

    Ok(projection
        .scores
        .outer_iter()
        .enumerate()
        .map(|(record, row)| ScatterPoint {
            pc1: row[0],
            pc2: row[1],
            cluster: fit.label(record),
        })
        .collect())
}

/// Size and overall mean item score of one cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSummary {
    /// One-based cluster label
    pub cluster: usize,
    pub size: usize,
    /// Mean of the centroid's ten item scores
    pub overall_mean: f64,
}

/// `(cluster, item, average score)` triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidScore {
    /// One-based cluster label
    pub cluster: usize,
    pub item: Item,
    pub average_score: f64,
}

/// Centroids of the selected model reshaped for presentation
#[derive(Debug, Clone)]
pub struct CentroidReport {
    /// Clusters in ascending overall mean (legend order)
    pub clusters: Vec<ClusterSummary>,
    /// Triples grouped by cluster in legend order, items in scale order
    pub scores: Vec<CentroidScore>,
}

impl CentroidReport {
    pub fn from_fit(fit: &ClusterFit) -> Self {
        let sizes = fit.cluster_sizes();
        let mut clusters: Vec<ClusterSummary> = fit
            .centroids
            .outer_iter()
            .enumerate()
            .map(|(idx, centroid)| ClusterSummary {
                cluster: idx + 1,
                size: sizes[idx],
                overall_mean: centroid.mean().unwrap_or(0.0),
            })
            .collect();
        clusters.sort_by(|a, b| {
            a.overall_mean
                .total_cmp(&b.overall_mean)
                .then(a.cluster.cmp(&b.cluster))
        });

        let scores = clusters
            .iter()
            .flat_map(|summary| {
                let centroid = fit.centroids.row(summary.cluster - 1);
                ITEMS
                    .iter()
                    .zip(centroid.to_vec())
                    .map(move |(item, average_score)| CentroidScore {
                        cluster: summary.cluster,
                        item: *item,
                        average_score,
                    })
            })
            .collect();

        Self { clusters, scores }
    }

    /// One-based cluster labels from least to most distressed
    pub fn legend_order(&self) -> Vec<usize> {
        self.clusters.iter().map(|summary| summary.cluster).collect()
    }

    /// Long-format table with one row per `(cluster, item)`
    pub fn to_dataframe(&self) -> crate::Result<DataFrame> {
        let size_of = |cluster: usize| {
            self.clusters
                .iter()
                .find(|summary| summary.cluster == cluster)
                .map_or(0, |summary| summary.size as u32)
        };

        let df = df!(
            "cluster" => self.scores.iter().map(|s| s.cluster as u32).collect::<Vec<_>>(),
            "cluster_size" => self.scores.iter().map(|s| size_of(s.cluster)).collect::<Vec<_>>(),
            "item" => self.scores.iter().map(|s| s.item.id).collect::<Vec<_>>(),
            "question" => self.scores.iter().map(|s| s.item.question).collect::<Vec<_>>(),
            "average_score" => self.scores.iter().map(|s| s.average_score).collect::<Vec<_>>()
        )?;
        Ok(df)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let mut df = self.to_dataframe()?;
        write_csv(&mut df, path.as_ref())
    }
}

/// Write the `(k, wss)` table behind the elbow chart
pub fn write_elbow_csv(curve: &ElbowCurve, path: impl AsRef<Path>) -> crate::Result<()> {
    let mut df = df!(
        "k" => curve.points().iter().map(|(k, _)| *k as u32).collect::<Vec<_>>(),
        "wss" => curve.points().iter().map(|(_, wss)| *wss).collect::<Vec<_>>()
    )?;
    write_csv(&mut df, path.as_ref())
}

fn write_csv(df: &mut DataFrame, path: &Path) -> crate::Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    CsvWriter::new(&mut file).finish(df)?;
    info!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

/// Print the elbow curve and the selection decision
pub fn print_selection(curve: &ElbowCurve, selection: &Selection) {
    println!("\n=== Elbow Curve ===");
    println!("  k | Within-cluster SS");
    println!("  --|------------------");
    for &(k, wss) in curve.points() {
        let marker = if k == selection.k { "  <- selected" } else { "" };
        println!("  {:>2}| {:>16.2}{}", k, wss, marker);
    }

    match selection.suggested {
        Some(suggested) => println!("\nElbow suggestion: k = {}", suggested),
        None => println!("\nElbow suggestion: none (curve too short or flat)"),
    }
    println!(
        "Selected k = {} ({}; manual choice was {})",
        selection.k, selection.source, selection.manual
    );
}

/// Print sizes, fit quality and centroids of the selected model
pub fn print_cluster_statistics(responses: &ResponseMatrix, fit: &ClusterFit, report: &CentroidReport) {
    let total = responses.len();
    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", fit.k);
    println!("Total responses: {}", total);
    println!("Within-cluster sum of squares: {:.2}", fit.wss);
    let silhouette = fit.compute_silhouette_sample(responses.records(), 500);
    println!("Silhouette score (sample): {:.3}", silhouette);

    println!("\nClusters (ascending overall distress):");
    for summary in &report.clusters {
        let percentage = (summary.size as f64 / total as f64) * 100.0;
        println!(
            "  Cluster {}: {} responses ({:.1}%), mean item score {:.2}",
            summary.cluster, summary.size, percentage, summary.overall_mean
        );
    }

    println!("\nCluster centroids (mean item score):");
    let header: Vec<String> = report
        .legend_order()
        .iter()
        .map(|cluster| format!("C{:<5}", cluster))
        .collect();
    println!("  {:<7}| {}", "Item", header.join("| "));
    for (column, item) in ITEMS.iter().enumerate() {
        let cells: Vec<String> = report
            .legend_order()
            .iter()
            .map(|&cluster| format!("{:<6.2}", fit.centroids[[cluster - 1, column]]))
            .collect();
        println!("  {:<7}| {}", item.id, cells.join("| "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::N_ITEMS;
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    /// Hand-built fit: cluster 1 high distress, cluster 2 low, cluster 3 moderate
    fn sample_fit() -> ClusterFit {
        let mut centroids = Array2::zeros((3, N_ITEMS));
        centroids.row_mut(0).fill(4.5);
        centroids.row_mut(1).fill(1.2);
        centroids.row_mut(2).fill(2.8);
        ClusterFit {
            k: 3,
            assignments: Array1::from(vec![0, 1, 1, 2, 1, 0]),
            centroids,
            wss: 12.0,
        }
    }

    #[test]
    fn test_legend_order_ascending_distress() {
        let report = CentroidReport::from_fit(&sample_fit());
        assert_eq!(report.legend_order(), vec![2, 3, 1]);
        assert_eq!(
            report.clusters.iter().map(|c| c.size).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn test_triples_grouped_by_cluster_in_item_order() {
        let report = CentroidReport::from_fit(&sample_fit());
        assert_eq!(report.scores.len(), 3 * N_ITEMS);

        let first = &report.scores[..N_ITEMS];
        assert!(first.iter().all(|s| s.cluster == 2 && s.average_score == 1.2));
        for (score, item) in first.iter().zip(ITEMS.iter()) {
            assert_eq!(score.item.id, item.id);
        }
        assert_eq!(report.scores[2 * N_ITEMS].cluster, 1);
    }

    #[test]
    fn test_scatter_points_join_by_position() {
        let fit = sample_fit();
        let projection = Projection {
            scores: Array2::from_shape_fn((6, 2), |(r, c)| (r * 10 + c) as f64),
            explained_variance_ratio: Array1::from(vec![0.6, 0.1]),
        };

        let points = scatter_points(&projection, &fit).unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(points[3], ScatterPoint { pc1: 30.0, pc2: 31.0, cluster: 3 });
        assert_eq!(points[5].cluster, 1);
    }

    #[test]
    fn test_scatter_points_length_mismatch() {
        let projection = Projection {
            scores: Array2::zeros((4, 2)),
            explained_variance_ratio: Array1::zeros(2),
        };
        assert!(scatter_points(&projection, &sample_fit()).is_err());
    }

    #[test]
    fn test_write_centroid_csv() {
        let report = CentroidReport::from_fit(&sample_fit());
        let dir = tempdir().unwrap();
        let path = dir.path().join("centroids.csv");

        report.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("cluster,cluster_size,item,question,average_score")
        );
        assert_eq!(lines.count(), 3 * N_ITEMS);
        assert!(contents.contains("k10_10"));
    }

    #[test]
    fn test_write_elbow_csv() {
        let curve = ElbowCurve::new(vec![(1, 40.0), (2, 12.5)]);
        let dir = tempdir().unwrap();
        let path = dir.path().join("elbow.csv");

        write_elbow_csv(&curve, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "k,wss");

        let parsed: Vec<(u32, f64)> = lines[1..]
            .iter()
            .map(|line| {
                let (k, wss) = line.split_once(',').unwrap();
                (k.parse().unwrap(), wss.parse().unwrap())
            })
            .collect();
        assert_eq!(parsed, vec![(1, 40.0), (2, 12.5)]);
    }
}
