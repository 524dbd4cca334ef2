//! Chart rendering using Plotters
//!
//! Every chart takes a [`RenderConfig`] instead of relying on global plotting state. Only the
//! numbers entering the charts are part of the contract; colours and layout are cosmetic.

use crate::data::ResponseMatrix;
use crate::items::{ITEMS, MAX_SCORE, MIN_SCORE, N_ITEMS, SCORE_LABELS};
use crate::model::ClusterFit;
use crate::pca::Projection;
use crate::report::{scatter_points, CentroidReport};
use crate::selection::{ElbowCurve, Selection};
use crate::stats::{score_counts, CorrelationView};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use tracing::info;

/// Colour palette for different clusters
pub const CLUSTER_COLORS: [RGBColor; 10] = [
    RGBColor(27, 158, 119),
    RGBColor(217, 95, 2),
    RGBColor(117, 112, 179),
    RGBColor(231, 41, 138),
    RGBColor(102, 166, 30),
    RGBColor(230, 171, 2),
    RGBColor(166, 118, 29),
    RGBColor(31, 120, 180),
    RGBColor(227, 26, 28),
    RGBColor(102, 102, 102),
];

/// File names written by [`generate_visualization_report`]
pub const HISTOGRAM_FILE: &str = "item_histograms.png";
pub const HEATMAP_FILE: &str = "correlation_heatmap.png";
pub const ELBOW_FILE: &str = "elbow.png";
pub const SCATTER_FILE: &str = "pca_clusters.png";
pub const CENTROID_FILE: &str = "cluster_centroids.png";

/// Styling and layout shared by every chart
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Colours assigned to clusters in label order
    pub palette: Vec<RGBColor>,
    /// Single-series colour for histograms and the elbow line
    pub accent: RGBColor,
    /// Marker colour of the selected k
    pub highlight: RGBColor,
    /// Diverging scale: negative, neutral and positive correlation
    pub diverging: (RGBColor, RGBColor, RGBColor),
    /// Histogram facet grid as (rows, columns)
    pub grid: (usize, usize),
    pub histogram_size: (u32, u32),
    pub heatmap_size: (u32, u32),
    pub elbow_size: (u32, u32),
    pub scatter_size: (u32, u32),
    pub centroid_size: (u32, u32),
    pub font_family: &'static str,
    pub title_font_size: u32,
    pub label_font_size: u32,
    /// Decimals on continuous axis labels
    pub axis_decimals: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            palette: CLUSTER_COLORS.to_vec(),
            accent: RGBColor(70, 130, 180),
            highlight: RED,
            diverging: (RGBColor(33, 102, 172), WHITE, RGBColor(178, 24, 43)),
            grid: (5, 2),
            histogram_size: (1200, 1500),
            heatmap_size: (900, 800),
            elbow_size: (800, 600),
            scatter_size: (800, 600),
            centroid_size: (900, 900),
            font_family: "sans-serif",
            title_font_size: 28,
            label_font_size: 14,
            axis_decimals: 1,
        }
    }
}

impl RenderConfig {
    /// Colour of a one-based cluster label
    pub fn cluster_color(&self, cluster: usize) -> RGBColor {
        if self.palette.is_empty() {
            return BLACK;
        }
        self.palette[cluster.saturating_sub(1) % self.palette.len()]
    }

    /// Position of `value` in [-1, 1] on the diverging scale; undefined correlations are grey
    pub fn diverging_color(&self, value: f64) -> RGBColor {
        if value.is_nan() {
            return RGBColor(200, 200, 200);
        }
        let (low, mid, high) = self.diverging;
        let t = value.clamp(-1.0, 1.0);
        let (target, weight) = if t < 0.0 { (low, -t) } else { (high, t) };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * weight).round() as u8;
        RGBColor(
            lerp(mid.0, target.0),
            lerp(mid.1, target.1),
            lerp(mid.2, target.2),
        )
    }

    fn font(&self, size: u32) -> (&'static str, u32) {
        (self.font_family, size)
    }
}

/// Grid of per-item score histograms, items in scale order
pub fn render_item_histograms(
    responses: &ResponseMatrix,
    config: &RenderConfig,
    output_path: &Path,
) -> crate::Result<()> {
    let (rows, cols) = config.grid;
    if rows * cols < N_ITEMS {
        anyhow::bail!(
            "Histogram grid {}x{} has fewer than {} panels",
            rows,
            cols,
            N_ITEMS
        );
    }

    let counts = score_counts(responses);
    let max_count = counts
        .iter()
        .flat_map(|(_, item_counts)| item_counts.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1) as u32;

    let root = BitMapBackend::new(output_path, config.histogram_size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(
        "K10 item score distributions",
        config.font(config.title_font_size),
    )?;

    let panels = root.split_evenly(config.grid);
    for ((item, item_counts), panel) in counts.iter().zip(panels.iter()) {
        let mut chart = ChartBuilder::on(panel)
            .caption(item.question, config.font(config.label_font_size))
            .margin(8)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(
                (MIN_SCORE as u32..MAX_SCORE as u32).into_segmented(),
                0u32..(max_count + max_count / 10 + 1),
            )?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&score_tick_label)
            .x_desc("Score")
            .y_desc("Count")
            .label_style(config.font(config.label_font_size - 2))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(config.accent.filled())
                .margin(4)
                .data(
                    item_counts
                        .iter()
                        .enumerate()
                        .map(|(i, &count)| (MIN_SCORE as u32 + i as u32, count as u32)),
                ),
        )?;
    }

    root.present()?;
    info!(path = %output_path.display(), "wrote item histograms");
    Ok(())
}

/// Response-option label under each histogram bar; the trailing segment stays blank
fn score_tick_label(value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::CenterOf(score) | SegmentValue::Exact(score) => score
            .checked_sub(u32::from(MIN_SCORE))
            .and_then(|i| SCORE_LABELS.get(i as usize))
            .map(|label| label.to_string())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    }
}

/// Lower-triangular annotated correlation heatmap in hierarchical-clustering order
pub fn render_correlation_heatmap(
    view: &CorrelationView,
    config: &RenderConfig,
    output_path: &Path,
) -> crate::Result<()> {
    let items = view.ordered_items();
    let n = items.len() as f64;

    let root = BitMapBackend::new(output_path, config.heatmap_size).into_drawing_area();
    root.fill(&WHITE)?;

    // Left and bottom strips of the coordinate space hold the item labels
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Inter-item correlation (Pearson)",
            config.font(config.title_font_size),
        )
        .margin(20)
        .build_cartesian_2d(-1.2f64..n, -0.8f64..n)?;

    let cells = view.lower_triangle();
    // Row 0 of the reordered matrix is drawn at the top
    let top = |y: usize| n - 1.0 - y as f64;

    chart.draw_series(cells.iter().map(|cell| {
        let x = cell.x as f64;
        let y = top(cell.y);
        Rectangle::new(
            [(x, y), (x + 1.0, y + 1.0)],
            config.diverging_color(cell.value).filled(),
        )
    }))?;

    let centered = TextStyle::from(config.font(config.label_font_size).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|cell| {
        let label = if cell.value.is_nan() {
            "NA".to_string()
        } else {
            format!("{:.2}", cell.value)
        };
        Text::new(
            label,
            (cell.x as f64 + 0.5, top(cell.y) + 0.5),
            centered.clone(),
        )
    }))?;

    let right_aligned = TextStyle::from(config.font(config.label_font_size).into_font())
        .pos(Pos::new(HPos::Right, VPos::Center));
    chart.draw_series(items.iter().enumerate().map(|(i, item)| {
        Text::new(item.id.to_string(), (-0.1, top(i) + 0.5), right_aligned.clone())
    }))?;
    let below = TextStyle::from(config.font(config.label_font_size).into_font())
        .pos(Pos::new(HPos::Center, VPos::Top));
    chart.draw_series(items.iter().enumerate().map(|(i, item)| {
        Text::new(item.id.to_string(), (i as f64 + 0.5, -0.1), below.clone())
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "wrote correlation heatmap");
    Ok(())
}

/// Within-cluster sum of squares against k, with the selected k highlighted
pub fn render_elbow(
    curve: &ElbowCurve,
    selection: &Selection,
    config: &RenderConfig,
    output_path: &Path,
) -> crate::Result<()> {
    let points: Vec<(u32, f64)> = curve
        .points()
        .iter()
        .map(|&(k, wss)| (k as u32, wss))
        .collect();
    let max_k = points.iter().map(|(k, _)| *k).max().unwrap_or(1);
    let max_wss = points
        .iter()
        .map(|(_, wss)| *wss)
        .fold(0.0, f64::max)
        .max(1.0);

    let root = BitMapBackend::new(output_path, config.elbow_size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Elbow method: choosing the number of clusters",
            config.font(config.title_font_size),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0u32..(max_k + 1), 0f64..(max_wss * 1.1))?;

    let decimals = config.axis_decimals;
    chart
        .configure_mesh()
        .x_desc("Number of clusters (k)")
        .y_desc("Total within-cluster sum of squares")
        .x_labels(max_k as usize + 2)
        .y_label_formatter(&|v| format!("{:.*}", decimals, v))
        .axis_desc_style(config.font(config.label_font_size + 1))
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        config.accent.stroke_width(2),
    ))?;
    chart.draw_series(
        points
            .iter()
            .map(|&point| Circle::new(point, 4, config.accent.filled())),
    )?;

    if let Some(suggested) = selection.suggested.filter(|&s| s != selection.k) {
        if let Some(&point) = points.iter().find(|(k, _)| *k as usize == suggested) {
            chart
                .draw_series(std::iter::once(Circle::new(
                    point,
                    9,
                    BLACK.stroke_width(2),
                )))?
                .label(format!("Elbow suggestion: k = {}", suggested))
                .legend(|(x, y)| Circle::new((x, y), 5, BLACK.stroke_width(2)));
        }
    }

    if let Some(&point) = points.iter().find(|(k, _)| *k as usize == selection.k) {
        let highlight = config.highlight;
        chart
            .draw_series(std::iter::once(Circle::new(point, 7, highlight.filled())))?
            .label(format!("Selected: k = {} ({})", selection.k, selection.source))
            .legend(move |(x, y)| Circle::new((x, y), 5, highlight.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "wrote elbow chart");
    Ok(())
}

/// Scatter of the first two principal components coloured by cluster
pub fn render_pca_scatter(
    projection: &Projection,
    fit: &ClusterFit,
    report: &CentroidReport,
    config: &RenderConfig,
    output_path: &Path,
) -> crate::Result<()> {
    let points = scatter_points(projection, fit)?;

    let bounds = |values: Vec<f64>| {
        let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let pad = ((max - min) * 0.05).max(0.5);
        (min - pad)..(max + pad)
    };
    let x_range = bounds(points.iter().map(|p| p.pc1).collect());
    let y_range = bounds(points.iter().map(|p| p.pc2).collect());

    let root = BitMapBackend::new(output_path, config.scatter_size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("K10 responses by cluster (k = {})", fit.k),
            config.font(config.title_font_size),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    let ratio = &projection.explained_variance_ratio;
    let decimals = config.axis_decimals;
    chart
        .configure_mesh()
        .x_desc(format!("PC1 ({:.1}% of variance)", ratio[0] * 100.0))
        .y_desc(format!("PC2 ({:.1}% of variance)", ratio[1] * 100.0))
        .x_label_formatter(&|v| format!("{:.*}", decimals, v))
        .y_label_formatter(&|v| format!("{:.*}", decimals, v))
        .axis_desc_style(config.font(config.label_font_size + 1))
        .draw()?;

    for summary in &report.clusters {
        let color = config.cluster_color(summary.cluster);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.cluster == summary.cluster)
                    .map(|p| Circle::new((p.pc1, p.pc2), 3, color.mix(0.7).filled())),
            )?
            .label(format!("Cluster {} (n = {})", summary.cluster, summary.size))
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "wrote PCA scatter");
    Ok(())
}

/// Grouped horizontal bars of mean item score per cluster
///
/// Items run top to bottom in scale order; within each item the clusters appear in legend
/// order, least distressed first.
pub fn render_centroid_bars(
    report: &CentroidReport,
    config: &RenderConfig,
    output_path: &Path,
) -> crate::Result<()> {
    let n_clusters = report.clusters.len().max(1);
    let n = N_ITEMS as f64;
    let band = 0.8 / n_clusters as f64;

    let root = BitMapBackend::new(output_path, config.centroid_size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Average item score by cluster",
            config.font(config.title_font_size),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..(MAX_SCORE as f64 + 0.2), 0f64..n)?;

    // Band centres sit on the half steps
    let item_at = |y: f64| {
        let offset = y - y.floor();
        if (offset - 0.5).abs() > 1e-6 {
            return String::new();
        }
        let slot = N_ITEMS - 1 - y.floor() as usize;
        ITEMS.get(slot).map(|item| item.id.to_string()).unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Average score (1 = none of the time, 5 = all of the time)")
        .y_labels(2 * N_ITEMS + 1)
        .y_label_formatter(&|y| item_at(*y))
        .axis_desc_style(config.font(config.label_font_size + 1))
        .draw()?;

    for (position, summary) in report.clusters.iter().enumerate() {
        let color = config.cluster_color(summary.cluster);
        let bars = report
            .scores
            .iter()
            .filter(|score| score.cluster == summary.cluster)
            .enumerate()
            .map(|(slot, score)| {
                let band_top = n - slot as f64 - 0.1;
                let y1 = band_top - position as f64 * band;
                Rectangle::new([(0.0, y1 - band), (score.average_score, y1)], color.filled())
            });
        chart
            .draw_series(bars)?
            .label(format!("Cluster {} (n = {})", summary.cluster, summary.size))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "wrote centroid bar chart");
    Ok(())
}

/// Everything the report needs, already computed
pub struct ReportInputs<'a> {
    pub responses: &'a ResponseMatrix,
    pub correlation: &'a CorrelationView,
    pub curve: &'a ElbowCurve,
    pub selection: &'a Selection,
    pub fit: &'a ClusterFit,
    pub projection: &'a Projection,
    pub centroids: &'a CentroidReport,
}

/// Render all five charts into `output_dir`
///
/// # Returns
/// * Paths of the written images in pipeline order
pub fn generate_visualization_report(
    inputs: &ReportInputs<'_>,
    config: &RenderConfig,
    output_dir: &Path,
) -> crate::Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = [
        HISTOGRAM_FILE,
        HEATMAP_FILE,
        ELBOW_FILE,
        SCATTER_FILE,
        CENTROID_FILE,
    ]
    .iter()
    .map(|name| output_dir.join(name))
    .collect();

    render_item_histograms(inputs.responses, config, &paths[0])?;
    render_correlation_heatmap(inputs.correlation, config, &paths[1])?;
    render_elbow(inputs.curve, inputs.selection, config, &paths[2])?;
    render_pca_scatter(
        inputs.projection,
        inputs.fit,
        inputs.centroids,
        config,
        &paths[3],
    )?;
    render_centroid_bars(inputs.centroids, config, &paths[4])?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{candidate_range, fit_candidates, KMeansSettings};
    use crate::pca::{project, PcaSettings};
    use crate::selection::select_k;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn create_test_responses() -> ResponseMatrix {
        let mut values = Vec::new();
        for r in 0..12 {
            for c in 0..N_ITEMS {
                let base = [1, 3, 5][r % 3];
                let jitter = if (r + c) % 5 == 0 { 1 } else { 0 };
                let value = if base == 5 { base - jitter } else { base + jitter };
                values.push(value as f64);
            }
        }
        ResponseMatrix::from_records(Array2::from_shape_vec((12, N_ITEMS), values).unwrap())
            .unwrap()
    }

    #[test]
    fn test_diverging_color() {
        let config = RenderConfig::default();
        assert_eq!(config.diverging_color(0.0), WHITE);
        assert_eq!(config.diverging_color(1.0), config.diverging.2);
        assert_eq!(config.diverging_color(-1.0), config.diverging.0);
        assert_eq!(config.diverging_color(3.0), config.diverging.2);
        assert_eq!(config.diverging_color(f64::NAN), RGBColor(200, 200, 200));
    }

    #[test]
    fn test_cluster_color_wraps() {
        let config = RenderConfig::default();
        assert_eq!(config.cluster_color(1), CLUSTER_COLORS[0]);
        assert_eq!(config.cluster_color(11), CLUSTER_COLORS[0]);
    }

    #[test]
    fn test_score_tick_label() {
        assert_eq!(score_tick_label(&SegmentValue::CenterOf(1)), "None of the time");
        assert_eq!(score_tick_label(&SegmentValue::CenterOf(5)), "All of the time");
        assert_eq!(score_tick_label(&SegmentValue::CenterOf(6)), "");
        assert_eq!(score_tick_label(&SegmentValue::Last), "");
    }

    #[test]
    fn test_histogram_grid_too_small() {
        let config = RenderConfig {
            grid: (3, 3),
            ..RenderConfig::default()
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("hist.png");
        assert!(render_item_histograms(&create_test_responses(), &config, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_generate_visualization_report() {
        let responses = create_test_responses();
        let correlation = CorrelationView::from_responses(&responses);
        let fits =
            fit_candidates(&responses, &candidate_range(4), &KMeansSettings::default()).unwrap();
        let curve = ElbowCurve::from_fits(&fits);
        let selection = select_k(&curve, 3, false).unwrap();
        let fit = fits.get(selection.k).unwrap();
        let projection = project(&responses, &PcaSettings::default()).unwrap();
        let centroids = CentroidReport::from_fit(fit);

        let inputs = ReportInputs {
            responses: &responses,
            correlation: &correlation,
            curve: &curve,
            selection: &selection,
            fit,
            projection: &projection,
            centroids: &centroids,
        };

        let dir = tempdir().unwrap();
        let paths =
            generate_visualization_report(&inputs, &RenderConfig::default(), dir.path()).unwrap();

        assert_eq!(paths.len(), 5);
        for path in &paths {
            assert!(path.exists(), "missing {}", path.display());
        }
    }
}
