//! Choosing the number of clusters from the within-cluster sum of squares curve
//!
//! The chosen k is a human judgment made by reading the elbow chart. [`ElbowCurve::suggest_elbow`]
//! offers a kneedle-style suggestion, but the manual value wins unless the caller opts in.

use crate::error::AnalysisError;
use crate::model::ClusterFitCollection;
use std::fmt;

/// `(k, wss)` points in ascending k
#[derive(Debug, Clone, PartialEq)]
pub struct ElbowCurve {
    points: Vec<(usize, f64)>,
}

impl ElbowCurve {
    pub fn new(mut points: Vec<(usize, f64)>) -> Self {
        points.sort_by_key(|(k, _)| *k);
        Self { points }
    }

    pub fn from_fits(fits: &ClusterFitCollection) -> Self {
        Self::new(fits.wss_curve())
    }

    pub fn points(&self) -> &[(usize, f64)] {
        &self.points
    }

    pub fn contains(&self, k: usize) -> bool {
        self.points.iter().any(|(candidate, _)| *candidate == k)
    }

    /// k of the point lying furthest below the chord from the first to the last point
    ///
    /// Both axes are scaled to [0, 1] first. Returns `None` with fewer than three points, a flat
    /// curve, or no point below the chord.
    pub fn suggest_elbow(&self) -> Option<usize> {
        if self.points.len() < 3 {
            return None;
        }

        let (k_first, _) = self.points[0];
        let (k_last, _) = self.points[self.points.len() - 1];
        let (wss_min, wss_max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, w)| {
                (lo.min(w), hi.max(w))
            });
        let k_span = (k_last - k_first) as f64;
        let wss_span = wss_max - wss_min;
        if k_span <= 0.0 || wss_span <= 0.0 {
            return None;
        }

        let normalized: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|&(k, w)| ((k - k_first) as f64 / k_span, (w - wss_min) / wss_span))
            .collect();
        let (x0, y0) = normalized[0];
        let (x1, y1) = normalized[normalized.len() - 1];
        let slope = (y1 - y0) / (x1 - x0);

        let mut best: Option<(usize, f64)> = None;
        for (&(k, _), &(x, y)) in self.points.iter().zip(normalized.iter()) {
            let gap = (y0 + slope * (x - x0)) - y;
            if gap > 0.0 && best.map_or(true, |(_, best_gap)| gap > best_gap) {
                best = Some((k, gap));
            }
        }

        best.map(|(k, _)| k)
    }
}

/// Where the selected k came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Manual,
    Suggested,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionSource::Manual => write!(f, "manual"),
            SelectionSource::Suggested => write!(f, "elbow suggestion"),
        }
    }
}

/// The chosen cluster count alongside the automatic suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub k: usize,
    pub manual: usize,
    pub suggested: Option<usize>,
    pub source: SelectionSource,
}

/// Choose k from the curve
///
/// The manual value is used unless `use_suggestion` is set and the curve yields a suggestion.
/// Either way the chosen k must be one of the fitted candidates.
pub fn select_k(curve: &ElbowCurve, manual: usize, use_suggestion: bool) -> crate::Result<Selection> {
    let suggested = curve.suggest_elbow();
    let (k, source) = match suggested {
        Some(k) if use_suggestion => (k, SelectionSource::Suggested),
        _ => (manual, SelectionSource::Manual),
    };

    if !curve.contains(k) {
        return Err(AnalysisError::UnknownCandidate { k }.into());
    }

    Ok(Selection {
        k,
        manual,
        suggested,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve() -> ElbowCurve {
        ElbowCurve::new(vec![
            (1, 100.0),
            (2, 60.0),
            (3, 25.0),
            (4, 20.0),
            (5, 17.0),
            (6, 15.0),
        ])
    }

    #[test]
    fn test_suggest_elbow() {
        assert_eq!(sample_curve().suggest_elbow(), Some(3));
    }

    #[test]
    fn test_no_suggestion_for_short_or_flat_curves() {
        assert_eq!(ElbowCurve::new(vec![(1, 10.0), (2, 5.0)]).suggest_elbow(), None);
        assert_eq!(
            ElbowCurve::new(vec![(1, 4.0), (2, 4.0), (3, 4.0)]).suggest_elbow(),
            None
        );
        // Straight line has nothing below the chord
        assert_eq!(
            ElbowCurve::new(vec![(1, 30.0), (2, 20.0), (3, 10.0)]).suggest_elbow(),
            None
        );
    }

    #[test]
    fn test_manual_choice_wins_by_default() {
        let selection = select_k(&sample_curve(), 4, false).unwrap();
        assert_eq!(selection.k, 4);
        assert_eq!(selection.suggested, Some(3));
        assert_eq!(selection.source, SelectionSource::Manual);
    }

    #[test]
    fn test_opt_in_suggestion() {
        let selection = select_k(&sample_curve(), 4, true).unwrap();
        assert_eq!(selection.k, 3);
        assert_eq!(selection.manual, 4);
        assert_eq!(selection.source, SelectionSource::Suggested);
    }

    #[test]
    fn test_unfitted_k_rejected() {
        let err = select_k(&sample_curve(), 9, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::UnknownCandidate { k: 9 })
        ));
    }
}
