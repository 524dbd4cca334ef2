//! k10-segment: exploratory segmentation of K10 psychological distress survey responses
//!
//! Loads survey responses, explores item distributions and correlations, fits K-Means for a
//! range of cluster counts, supports choosing k from the elbow chart, projects the responses
//! with PCA and summarizes the cluster centroids.

pub mod cli;
pub mod data;
pub mod error;
pub mod items;
pub mod model;
pub mod pca;
pub mod report;
pub mod selection;
pub mod stats;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_responses, ResponseMatrix};
pub use error::AnalysisError;
pub use model::{
    candidate_range, fit_candidates, fit_kmeans, ClusterFit, ClusterFitCollection, KMeansSettings,
};
pub use pca::{project, PcaSettings, Projection};
pub use report::CentroidReport;
pub use selection::{select_k, ElbowCurve, Selection};
pub use stats::CorrelationView;
pub use viz::{generate_visualization_report, RenderConfig, ReportInputs};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
