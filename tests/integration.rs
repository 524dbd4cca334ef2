//! Integration tests for k10-segment

use k10_segment::items::N_ITEMS;
use k10_segment::{
    candidate_range, fit_candidates, fit_kmeans, load_responses, project, select_k,
    AnalysisError, CentroidReport, ElbowCurve, KMeansSettings, PcaSettings,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// Survey export with extra columns, mixed-case headers and a few incomplete rows
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "ParticipantID,Age,K10 1,K10 2,K10 3,K10 4,K10 5,K10 6,K10 7,K10 8,K10 9,K10 10"
    )
    .unwrap();

    // Low distress
    writeln!(file, "101,23,1,1,1,1,1,1,1,1,1,1").unwrap();
    writeln!(file, "102,31,1,2,1,1,1,1,2,1,1,1").unwrap();
    writeln!(file, "103,45,2,1,1,1,2,1,1,1,1,1").unwrap();
    writeln!(file, "104,52,1,1,1,2,1,1,1,1,1,2").unwrap();

    // Moderate distress
    writeln!(file, "201,27,3,3,2,3,3,2,3,3,2,3").unwrap();
    writeln!(file, "202,39,3,2,3,3,2,3,3,2,3,3").unwrap();
    writeln!(file, "203,44,2,3,3,2,3,3,2,3,3,2").unwrap();
    writeln!(file, "204,61,3,3,3,3,3,3,3,3,3,3").unwrap();

    // High distress
    writeln!(file, "301,19,5,5,4,5,5,4,5,5,4,5").unwrap();
    writeln!(file, "302,22,4,5,5,4,5,5,4,5,5,4").unwrap();
    writeln!(file, "303,35,5,4,5,5,4,5,5,4,5,5").unwrap();
    writeln!(file, "304,48,5,5,5,5,5,5,5,5,5,5").unwrap();

    // Incomplete
    writeln!(file, "401,33,NA,3,3,3,3,3,3,3,3,3").unwrap();
    writeln!(file, "402,29,2,2,2,2,2,,2,2,2,2").unwrap();

    file
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();

    let responses = load_responses(test_file.path()).unwrap();
    assert_eq!(responses.len(), 12);
    assert_eq!(responses.dropped_rows(), 2);

    let settings = KMeansSettings::default();
    let fits = fit_candidates(&responses, &candidate_range(6), &settings).unwrap();
    assert_eq!(fits.len(), 6);

    let curve = ElbowCurve::from_fits(&fits);
    let selection = select_k(&curve, 3, false).unwrap();
    assert_eq!(selection.k, 3);
    let fit = fits.get(selection.k).unwrap();

    // Each block of four responses forms its own cluster
    for block in 0..3 {
        let first = fit.assignments[block * 4];
        assert!((0..4).all(|i| fit.assignments[block * 4 + i] == first));
    }
    assert_eq!(fit.cluster_sizes(), vec![4, 4, 4]);

    let report = CentroidReport::from_fit(fit);
    let legend = report.legend_order();
    assert_eq!(legend[0], fit.label(0));
    assert_eq!(legend[1], fit.label(4));
    assert_eq!(legend[2], fit.label(8));

    let projection = project(&responses, &PcaSettings::default()).unwrap();
    assert_eq!(projection.scores.shape(), &[responses.len(), 2]);
    // Low distress on the left, high distress on the right
    assert!(projection.scores[[0, 0]] < projection.scores[[11, 0]]);
}

#[test]
fn test_loader_is_idempotent() {
    let test_file = create_test_csv();

    let first = load_responses(test_file.path()).unwrap();
    let second = load_responses(test_file.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_loaded_rows_are_complete() {
    let test_file = create_test_csv();
    let responses = load_responses(test_file.path()).unwrap();

    assert_eq!(responses.records().ncols(), N_ITEMS);
    for row in responses.records().outer_iter() {
        assert_eq!(row.len(), N_ITEMS);
        assert!(row.iter().all(|v| v.is_finite() && (1.0..=5.0).contains(v)));
    }
}

#[test]
fn test_wss_non_increasing_over_candidates() {
    let test_file = create_test_csv();
    let responses = load_responses(test_file.path()).unwrap();

    let fits = fit_candidates(&responses, &candidate_range(6), &KMeansSettings::default()).unwrap();
    let curve = fits.wss_curve();
    for pair in curve.windows(2) {
        assert!(
            pair[0].1 + 1e-9 >= pair[1].1,
            "wss increased from k={} to k={}",
            pair[0].0,
            pair[1].0
        );
    }
}

#[test]
fn test_fits_do_not_depend_on_evaluation_order() {
    let test_file = create_test_csv();
    let responses = load_responses(test_file.path()).unwrap();
    let settings = KMeansSettings::default();

    let all = fit_candidates(&responses, &candidate_range(5), &settings).unwrap();
    let alone = fit_kmeans(&responses, 4, &settings).unwrap();
    let from_all = all.get(4).unwrap();
    assert_eq!(from_all.assignments, alone.assignments);
    assert_eq!(from_all.wss, alone.wss);
}

#[test]
fn test_too_many_clusters_for_data() {
    let test_file = create_test_csv();
    let responses = load_responses(test_file.path()).unwrap();

    let err = fit_kmeans(&responses, 13, &KMeansSettings::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AnalysisError>(),
        Some(AnalysisError::InsufficientDistinctPoints { k: 13, distinct: 12 })
    ));
}

#[test]
fn test_file_without_complete_rows() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "k10_1,k10_2,k10_3,k10_4,k10_5,k10_6,k10_7,k10_8,k10_9,k10_10").unwrap();
    writeln!(file, "1,2,3,4,5,NA,1,2,3,4").unwrap();
    writeln!(file, ",2,3,4,5,1,1,2,3,4").unwrap();

    let err = load_responses(file.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AnalysisError>(),
        Some(AnalysisError::EmptyData { .. })
    ));
}
