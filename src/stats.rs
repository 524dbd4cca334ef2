//! Descriptive statistics behind the exploratory charts

use crate::data::ResponseMatrix;
use crate::items::{Item, ITEMS, MAX_SCORE, MIN_SCORE};
use ndarray::{Array2, Axis};

/// Number of distinct response options
pub const N_SCORES: usize = (MAX_SCORE - MIN_SCORE + 1) as usize;

/// One `(item, score)` observation from the long-format reshape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemScore {
    pub item: Item,
    pub score: u8,
}

/// Reshape the response matrix to long format, item-major in scale order
pub fn long_scores(responses: &ResponseMatrix) -> Vec<ItemScore> {
    let records = responses.records();
    let mut out = Vec::with_capacity(records.len());
    for (column, item) in ITEMS.iter().enumerate() {
        out.extend(records.column(column).iter().map(|&value| ItemScore {
            item: *item,
            score: value as u8,
        }));
    }
    out
}

/// Frequency of each score (1..=5) per item, in scale order
pub fn score_counts(responses: &ResponseMatrix) -> Vec<(Item, [usize; N_SCORES])> {
    let mut counts: Vec<(Item, [usize; N_SCORES])> =
        ITEMS.iter().map(|item| (*item, [0usize; N_SCORES])).collect();
    for observation in long_scores(responses) {
        if let Some((_, item_counts)) = counts
            .iter_mut()
            .find(|(item, _)| item.id == observation.item.id)
        {
            item_counts[(observation.score - MIN_SCORE) as usize] += 1;
        }
    }
    counts
}

/// Pearson correlation between every pair of items
///
/// Items with zero variance have an undefined correlation with everything, including
/// themselves; those entries are `NaN`.
pub fn pearson_correlation(records: &Array2<f64>) -> Array2<f64> {
    let n_features = records.ncols();
    let mut corr = Array2::from_elem((n_features, n_features), f64::NAN);
    let Some(means) = records.mean_axis(Axis(0)) else {
        return corr;
    };
    let centered = records - &means;
    let cross = centered.t().dot(&centered);

    for i in 0..n_features {
        for j in 0..n_features {
            let denom = (cross[[i, i]] * cross[[j, j]]).sqrt();
            if denom > 0.0 {
                corr[[i, j]] = (cross[[i, j]] / denom).clamp(-1.0, 1.0);
            }
        }
    }

    corr
}

/// Leaf order of a complete-linkage hierarchical clustering on `(1 - r) / 2`
///
/// Closest pairs merge first; ties go to the pair with the smallest indices. Within a merge the
/// cluster holding the lower original index is placed first, so the order is deterministic.
/// Zero-variance items (`NaN` diagonal) are moved to the end, keeping their relative order.
pub fn hierarchical_order(corr: &Array2<f64>) -> Vec<usize> {
    let n = corr.nrows();
    let dissimilarity = |i: usize, j: usize| {
        let d = (1.0 - corr[[i, j]]) / 2.0;
        if d.is_nan() {
            1.0
        } else {
            d
        }
    };

    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    while clusters.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let linkage = clusters[a]
                    .iter()
                    .flat_map(|&i| clusters[b].iter().map(move |&j| (i, j)))
                    .map(|(i, j)| dissimilarity(i, j))
                    .fold(f64::NEG_INFINITY, f64::max);
                if linkage < best.2 {
                    best = (a, b, linkage);
                }
            }
        }

        let (a, b, _) = best;
        let right = clusters.remove(b);
        let left = clusters.remove(a);
        let merged = if left.iter().min() <= right.iter().min() {
            [left, right].concat()
        } else {
            [right, left].concat()
        };
        clusters.insert(a, merged);
    }

    // Items without a defined correlation trail the display order
    let (defined, undefined): (Vec<usize>, Vec<usize>) = clusters
        .pop()
        .unwrap_or_default()
        .into_iter()
        .partition(|&i| !corr[[i, i]].is_nan());
    [defined, undefined].concat()
}

/// One annotated cell of the lower-triangular heatmap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationCell {
    /// Position along the reordered x axis
    pub x: usize,
    /// Position along the reordered y axis
    pub y: usize,
    pub row_item: Item,
    pub column_item: Item,
    /// Correlation rounded to two decimals
    pub value: f64,
}

/// Correlation matrix reordered for display
#[derive(Debug, Clone)]
pub struct CorrelationView {
    /// Full Pearson matrix in scale order
    pub matrix: Array2<f64>,
    /// Item indices in display order
    pub order: Vec<usize>,
}

impl CorrelationView {
    pub fn from_responses(responses: &ResponseMatrix) -> Self {
        let matrix = pearson_correlation(responses.records());
        let order = hierarchical_order(&matrix);
        Self { matrix, order }
    }

    /// Items in display order
    pub fn ordered_items(&self) -> Vec<Item> {
        self.order.iter().map(|&i| ITEMS[i]).collect()
    }

    /// Cells on and below the diagonal of the reordered matrix
    pub fn lower_triangle(&self) -> Vec<CorrelationCell> {
        let mut cells = Vec::new();
        for (y, &row) in self.order.iter().enumerate() {
            for (x, &column) in self.order.iter().enumerate().take(y + 1) {
                cells.push(CorrelationCell {
                    x,
                    y,
                    row_item: ITEMS[row],
                    column_item: ITEMS[column],
                    value: (self.matrix[[row, column]] * 100.0).round() / 100.0,
                });
            }
        }
        cells
    }
}
