//! Principal components projection of the responses onto two axes for plotting

use crate::data::ResponseMatrix;
use linfa::prelude::*;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Number of principal axes kept
pub const N_COMPONENTS: usize = 2;

/// How columns are prepared before the decomposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PcaSettings {
    /// Divide each centred column by its standard deviation (correlation-matrix PCA)
    pub scale: bool,
}

/// Two-column projection, one row per record in input order
#[derive(Debug, Clone)]
pub struct Projection {
    /// Principal component scores (n_records, 2)
    pub scores: Array2<f64>,
    /// Share of total variance carried by each component
    pub explained_variance_ratio: Array1<f64>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.scores.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.nrows() == 0
    }
}

/// Project the responses onto their first two principal axes
///
/// Eigenvectors are only defined up to sign. Each component is flipped so that its scores
/// correlate non-negatively with the total K10 score, which makes "further right / further up"
/// mean "more distressed" and keeps the output stable across runs and platforms.
pub fn project(responses: &ResponseMatrix, settings: &PcaSettings) -> crate::Result<Projection> {
    let records = responses.records();
    if records.nrows() < 2 {
        anyhow::bail!(
            "PCA needs at least 2 records, got {}",
            records.nrows()
        );
    }

    let input = if settings.scale {
        standardize(records)
    } else {
        records.clone()
    };

    let dataset = DatasetBase::from(input.clone());
    let pca: Pca<f64> = Pca::params(N_COMPONENTS).fit(&dataset)?;
    let mut scores: Array2<f64> = pca.predict(&input);

    orient_components(&mut scores, &responses.total_scores());

    let total_variance: f64 = input.var_axis(Axis(0), 1.0).sum();
    let explained_variance_ratio = if total_variance > 0.0 {
        scores.var_axis(Axis(0), 1.0) / total_variance
    } else {
        Array1::zeros(N_COMPONENTS)
    };

    debug!(
        scale = settings.scale,
        ratio = ?explained_variance_ratio.to_vec(),
        "projected responses onto principal components"
    );

    Ok(Projection {
        scores,
        explained_variance_ratio,
    })
}

/// Centre every column and divide by its sample standard deviation; constant columns stay zero
fn standardize(records: &Array2<f64>) -> Array2<f64> {
    let means = records
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(records.ncols()));
    let stds = records.std_axis(Axis(0), 1.0);

    let mut out = records - &means;
    for (mut column, &std) in out.axis_iter_mut(Axis(1)).zip(stds.iter()) {
        if std > 0.0 {
            column.mapv_inplace(|v| v / std);
        }
    }
    out
}

/// Negate components whose scores run against the reference
fn orient_components(scores: &mut Array2<f64>, reference: &Array1<f64>) {
    let reference_mean = reference.mean().unwrap_or(0.0);
    for mut column in scores.axis_iter_mut(Axis(1)) {
        let column_mean = column.mean().unwrap_or(0.0);
        let covariance: f64 = column
            .iter()
            .zip(reference.iter())
            .map(|(s, r)| (s - column_mean) * (r - reference_mean))
            .sum();
        if covariance < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }
}
