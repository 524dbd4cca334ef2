//! k10-segment: K10 distress survey segmentation using K-Means and PCA
//!
//! This is the main entrypoint that runs the analysis pipeline from data loading through
//! clustering, selection, projection and reporting.

use anyhow::{Context, Result};
use clap::Parser;
use k10_segment::report::{print_cluster_statistics, print_selection, write_elbow_csv};
use k10_segment::{
    candidate_range, fit_candidates, generate_visualization_report, load_responses, project,
    select_k, Args, CentroidReport, CorrelationView, ElbowCurve, RenderConfig, ReportInputs,
};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    args.validate()?;

    run_pipeline(&args)
}

/// Logging to stderr; `RUST_LOG` applies when no -v is given
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the full analysis pipeline
fn run_pipeline(args: &Args) -> Result<()> {
    println!("=== K10 Distress Segmentation ===\n");
    let start_time = Instant::now();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Cannot create output directory {}", args.output_dir.display()))?;

    // Step 1: Load and clean responses
    let step = Instant::now();
    let responses = load_responses(&args.input)?;
    println!(
        "✓ Data loaded: {} complete responses ({} of {} rows dropped for missing items)",
        responses.len(),
        responses.dropped_rows(),
        responses.source_rows()
    );
    info!(elapsed = ?step.elapsed(), "loading finished");

    // Step 2: Exploration
    let correlation = CorrelationView::from_responses(&responses);
    let display_order: Vec<&str> = correlation
        .ordered_items()
        .iter()
        .map(|item| item.id)
        .collect();
    println!("✓ Item correlations computed (display order: {})", display_order.join(", "));

    // Step 3: Fit candidates
    let step = Instant::now();
    let settings = args.kmeans_settings();
    let fits = fit_candidates(&responses, &candidate_range(args.max_k), &settings)?;
    println!(
        "✓ K-Means fitted for k = 1..={} in {:.2}s",
        args.max_k,
        step.elapsed().as_secs_f64()
    );

    // Step 4: Select k
    let curve = ElbowCurve::from_fits(&fits);
    let selection = select_k(&curve, args.clusters, args.auto_elbow)?;
    print_selection(&curve, &selection);
    let fit = fits.get(selection.k)?;

    // Step 5: Project
    let projection = project(&responses, &args.pca_settings())?;
    println!(
        "\n✓ PCA projection: PC1 {:.1}%, PC2 {:.1}% of variance",
        projection.explained_variance_ratio[0] * 100.0,
        projection.explained_variance_ratio[1] * 100.0
    );

    // Step 6: Report
    let centroids = CentroidReport::from_fit(fit);
    print_cluster_statistics(&responses, fit, &centroids);

    let centroid_csv = args.output_dir.join("centroids.csv");
    let elbow_csv = args.output_dir.join("elbow.csv");
    centroids.write_csv(&centroid_csv)?;
    write_elbow_csv(&curve, &elbow_csv)?;

    let step = Instant::now();
    let inputs = ReportInputs {
        responses: &responses,
        correlation: &correlation,
        curve: &curve,
        selection: &selection,
        fit,
        projection: &projection,
        centroids: &centroids,
    };
    let charts = generate_visualization_report(&inputs, &RenderConfig::default(), &args.output_dir)?;
    info!(elapsed = ?step.elapsed(), "rendering finished");

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    for path in charts.iter().chain([&centroid_csv, &elbow_csv]) {
        println!("Saved: {}", path.display());
    }

    Ok(())
}
