//! Tests for the string forms accepted on the command line and in bundles.

use chrono::{Duration, TimeZone, Utc};
use field_common::bbox::{BboxParseError, BoundingBox};
use field_common::time::parse_datetime;
use field_common::{lead_label, lookup_variable, parse_step, ForecastTime, TimeParseError};

// ============================================================================
// Bounding boxes
// ============================================================================

#[test]
fn test_parse_bbox_with_spaces() {
    let bbox = BoundingBox::parse(" 4.5, 54.0 ,32,72 ").unwrap();
    assert_eq!(bbox, BoundingBox::new(4.5, 54.0, 32.0, 72.0));
    assert_eq!(bbox.width(), 27.5);
    assert_eq!(bbox.height(), 18.0);
}

#[test]
fn test_parse_bbox_errors() {
    assert!(matches!(BoundingBox::parse("1,2,3"), Err(BboxParseError::InvalidFormat(_))));
    assert!(matches!(BoundingBox::parse("1,2,x,4"), Err(BboxParseError::InvalidNumber(_))));
    assert!(matches!(BoundingBox::parse("10,0,5,1"), Err(BboxParseError::Inverted(_))));
}

#[test]
fn test_bbox_deserializes_from_json() {
    let bbox: BoundingBox =
        serde_json::from_str(r#"{"min_lon": 0, "min_lat": 1, "max_lon": 2, "max_lat": 3}"#).unwrap();
    assert!(bbox.contains(2.0, 1.0));
    assert!(!bbox.contains(1.0, 3.0));
}

#[test]
fn test_expand_then_contains() {
    let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).expand(0.5);
    assert!(bbox.contains(1.4, -0.4));
    assert!(!bbox.contains(1.6, 0.0));
}

// ============================================================================
// Times and steps
// ============================================================================

#[test]
fn test_cycle_forms_agree() {
    let expected = Utc.with_ymd_and_hms(2023, 8, 15, 6, 0, 0).unwrap();
    for s in [
        "2023-08-15T06",
        "2023-08-15T06:00",
        "2023-08-15T06:00:00",
        "2023-08-15 06:00:00",
        "2023-08-15T06:00:00Z",
        "2023-08-15T08:00:00+02:00",
    ] {
        assert_eq!(parse_datetime(s).unwrap(), expected, "form {}", s);
    }
    assert!(matches!(parse_datetime("15/08/2023"), Err(TimeParseError::InvalidFormat(_))));
}

#[test]
fn test_step_aliases() {
    assert_eq!(parse_step("6H").unwrap(), Duration::hours(6));
    assert_eq!(parse_step("1day").unwrap(), Duration::days(1));
    assert_eq!(parse_step("90m").unwrap(), Duration::minutes(90));
    assert!(parse_step("0h").is_err());
    assert!(parse_step("h").is_err());
    assert!(parse_step("6 fortnights").is_err());
}

#[test]
fn test_forecast_time_and_label() {
    let cycle = Utc.with_ymd_and_hms(2023, 8, 15, 0, 0, 0).unwrap();
    let ft = ForecastTime::new(cycle, 5, Duration::hours(3));
    assert_eq!(ft.valid_time(), cycle + Duration::hours(15));
    assert_eq!(lead_label(ft.lead, Duration::minutes(ft.step_minutes)), "+15h");
    assert_eq!(ForecastTime::analysis(cycle).valid_time(), cycle);
}

// ============================================================================
// Variable catalog
// ============================================================================

#[test]
fn test_catalog_conversions() {
    let msl = lookup_variable("msl").unwrap();
    assert_eq!(msl.units, "hPa");
    assert!((msl.convert(101325.0) - 1013.25).abs() < 1e-3);

    let tp = lookup_variable("precipitation_amount_acc6h").unwrap();
    assert!((tp.convert(0.0042) - 4.2).abs() < 1e-4);
    assert!(tp.convert(f32::NAN).is_nan());

    assert!(lookup_variable("vorticity").is_none());
}
