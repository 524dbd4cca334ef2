//! Command-line interface definitions and argument parsing

use crate::model::KMeansSettings;
use crate::pca::PcaSettings;
use clap::Parser;
use std::path::PathBuf;

/// Exploratory segmentation of K10 psychological distress responses
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the survey CSV file
    #[arg(short, long, default_value = "k10.csv")]
    pub input: PathBuf,

    /// Directory for charts and CSV tables (created if missing)
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Number of clusters to report, chosen by reading the elbow chart
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Use the automatic elbow suggestion instead of --clusters
    #[arg(long)]
    pub auto_elbow: bool,

    /// Largest candidate number of clusters (candidates are 1..=max-k)
    #[arg(long, default_value = "10")]
    pub max_k: usize,

    /// Seed for K-Means initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Number of K-Means restarts per candidate
    #[arg(long, default_value = "10")]
    pub n_runs: usize,

    /// Standardize items before PCA instead of only centring them
    #[arg(long)]
    pub scale_pca: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Check option combinations clap cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_k == 0 {
            anyhow::bail!("--max-k must be at least 1");
        }
        if self.clusters == 0 || self.clusters > self.max_k {
            anyhow::bail!(
                "--clusters must be between 1 and --max-k ({}), got {}",
                self.max_k,
                self.clusters
            );
        }
        if self.n_runs == 0 {
            anyhow::bail!("--n-runs must be at least 1");
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            anyhow::bail!("--tolerance must be positive, got {}", self.tolerance);
        }
        Ok(())
    }

    pub fn kmeans_settings(&self) -> KMeansSettings {
        KMeansSettings {
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            n_runs: self.n_runs,
            seed: self.seed,
        }
    }

    pub fn pca_settings(&self) -> PcaSettings {
        PcaSettings {
            scale: self.scale_pca,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["k10-segment"]);
        assert_eq!(args.input, PathBuf::from("k10.csv"));
        assert_eq!(args.clusters, 3);
        assert_eq!(args.max_k, 10);
        assert!(!args.auto_elbow);
        assert!(args.validate().is_ok());
        assert_eq!(args.kmeans_settings(), KMeansSettings::default());
    }

    #[test]
    fn test_validate() {
        let mut args = Args::parse_from(["k10-segment", "-k", "4", "--max-k", "6", "-vv"]);
        assert_eq!(args.verbose, 2);
        assert!(args.validate().is_ok());

        args.clusters = 7;
        assert!(args.validate().is_err());

        args.clusters = 0;
        assert!(args.validate().is_err());

        args.clusters = 3;
        args.tolerance = 0.0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_pca_settings() {
        let args = Args::parse_from(["k10-segment", "--scale-pca"]);
        assert!(args.pca_settings().scale);
    }
}
