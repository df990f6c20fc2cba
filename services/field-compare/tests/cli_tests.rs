//! Bundle-to-output tests for the field-compare front end.

use field_compare::{run_compare, run_verify, Bundle, ComparisonReport, ResultsReport};
use field_engine::{EngineConfig, ReduceMode, VerificationRecord};
use test_utils::{assert_approx_eq, require_test_file, temp_test_dir};

fn sample_bundle() -> Option<Bundle> {
    test_utils::find_test_file("sample.yaml").map(|path| Bundle::from_file(path).unwrap())
}

#[test]
fn test_sample_bundle_loads() {
    let path = require_test_file!("sample.yaml");
    let bundle = Bundle::from_file(&path).unwrap();
    bundle.validate().unwrap();

    assert_eq!(bundle.sources.len(), 1);
    assert_eq!(bundle.curves.len(), 2);
    assert_eq!(bundle.engine_config(), EngineConfig::strict());
}

#[test]
fn test_compare_sample_bundle() {
    let Some(bundle) = sample_bundle() else {
        eprintln!("SKIPPED: sample.yaml not found");
        return;
    };
    let comparison = run_compare(&bundle, &bundle.engine_config()).unwrap();

    let forecast = &comparison.forecasts[0];
    assert_eq!(forecast.members(), &[ReduceMode::Member(0), ReduceMode::Mean]);
    assert_eq!(forecast.units(), Some("°C"));
    // Mean of 280 K and 282 K at the first point.
    assert_approx_eq!(forecast.layer(0, 1)[0], 281.0 - 273.15, 1e-3);

    let (lo, hi) = comparison.difference_range.unwrap();
    assert_approx_eq!(lo, -1.0, 1e-3);
    assert_approx_eq!(hi, 0.0, 1e-3);

    let report = ComparisonReport::from(&comparison);
    assert_eq!(report.fields.len(), 2);
    assert_eq!(report.differences.len(), 1);
    let table = ResultsReport::format_table(&report);
    assert!(table.contains("analysis"));
    assert!(table.contains("Difference range: -1.00"));
}

#[test]
fn test_verify_writes_csv() {
    let Some(bundle) = sample_bundle() else {
        eprintln!("SKIPPED: sample.yaml not found");
        return;
    };
    let records = run_verify(&bundle, &bundle.engine_config()).unwrap();
    // Forecast: 2 leads x 2 selections x 4 points. Analysis: 2 times x 4 points.
    assert_eq!(records.len(), 24);
    assert_eq!(records.iter().filter(|r| r.is_missing()).count(), 2);

    let dir = temp_test_dir();
    let out = dir.path().join("records.csv");
    std::fs::write(&out, ResultsReport::records_csv(&records)).unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], ResultsReport::csv_header());
    assert_eq!(lines.len(), 25);
    assert_eq!(lines.iter().filter(|l| l.ends_with(',')).count(), 2);
    assert!(lines.iter().any(|l| l.starts_with("analysis,air_temperature_2m,2023-08-15T06:00:00+00:00")));
}

#[test]
fn test_records_json_round_trips_missing_values() {
    let Some(bundle) = sample_bundle() else {
        eprintln!("SKIPPED: sample.yaml not found");
        return;
    };
    let records = run_verify(&bundle, &bundle.engine_config()).unwrap();
    let json = ResultsReport::format_json(&records).unwrap();
    let parsed: Vec<VerificationRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), records.len());
    assert_eq!(parsed.iter().filter(|r| r.value.is_none()).count(), 2);
    assert!(json.contains("\"member\": \"mean\""));
}

#[test]
fn test_json_bundle_matches_yaml() {
    let Some(bundle) = sample_bundle() else {
        eprintln!("SKIPPED: sample.yaml not found");
        return;
    };
    let dir = temp_test_dir();
    let path = dir.path().join("sample.json");
    std::fs::write(&path, serde_json::to_string(&bundle).unwrap()).unwrap();

    let from_json = Bundle::from_file(&path).unwrap();
    let a = run_verify(&bundle, &bundle.engine_config()).unwrap();
    let b = run_verify(&from_json, &from_json.engine_config()).unwrap();
    assert_eq!(a.len(), b.len());
    assert_eq!(a.iter().filter(|r| r.is_missing()).count(), b.iter().filter(|r| r.is_missing()).count());
}

#[test]
fn test_uncovered_reference_fails_strict_bundle() {
    let Some(mut bundle) = sample_bundle() else {
        eprintln!("SKIPPED: sample.yaml not found");
        return;
    };
    // Move the analysis grid partly outside the mesh.
    if let Some(reference) = bundle.reference.as_mut() {
        reference.grid = field_engine::GridDescriptor::Regular {
            lat_axis: vec![60.0, 63.0],
            lon_axis: vec![10.0, 11.0],
        };
    }
    assert!(run_compare(&bundle, &bundle.engine_config()).is_err());

    let lenient = EngineConfig::default();
    let comparison = run_compare(&bundle, &lenient).unwrap();
    assert!(comparison.forecasts[0].missing_count() > 0);
}

#[test]
fn test_bundle_without_request_is_rejected() {
    let dir = temp_test_dir();
    let path = dir.path().join("curves.yaml");
    std::fs::write(&path, "curves:\n  - label: a\n    points: [[0, 1.0]]\n").unwrap();

    let bundle = Bundle::from_file(&path).unwrap();
    assert!(run_compare(&bundle, &EngineConfig::default()).is_err());
    assert_eq!(bundle.curves[0].points, vec![(0, 1.0)]);
}
