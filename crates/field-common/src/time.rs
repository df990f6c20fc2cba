//! Time handling utilities for forecast data.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Default spacing between lead-time offsets.
pub const DEFAULT_STEP_HOURS: i64 = 6;

/// A single forecast time.
///
/// Combines the cycle start (model run time) with a lead offset counted in
/// steps of the source's lead-time spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastTime {
    /// Forecast cycle start
    pub cycle: DateTime<Utc>,
    /// Lead offset in steps
    pub lead: u32,
    /// Minutes per lead step
    pub step_minutes: i64,
}

impl ForecastTime {
    pub fn new(cycle: DateTime<Utc>, lead: u32, step: Duration) -> Self {
        Self {
            cycle,
            lead,
            step_minutes: step.num_minutes(),
        }
    }

    /// Create from analysis time (lead = 0)
    pub fn analysis(cycle: DateTime<Utc>) -> Self {
        Self::new(cycle, 0, Duration::hours(DEFAULT_STEP_HOURS))
    }

    /// Lead offset as a duration.
    pub fn lead_duration(&self) -> Duration {
        Duration::minutes(self.step_minutes * self.lead as i64)
    }

    /// The wall-clock time this forecast refers to (cycle + lead * step).
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.cycle + self.lead_duration()
    }
}

/// Parse an ISO 8601 timestamp, assuming UTC when no zone is given.
///
/// Accepts full RFC 3339 timestamps as well as the shortened forms commonly
/// used for forecast cycles: `2023-08-15T00`, `2023-08-15T00:00`,
/// `2023-08-15T00:00:00` and `2023-08-15`.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Hour-only cycle stamps, e.g. "2023-08-15T00"
    if s.len() == 13 && s.as_bytes()[10] == b'T' {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}:00:00", s), "%Y-%m-%dT%H:%M:%S")
        {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse a step/frequency alias such as `6h`, `3H`, `1d`, `30min` or `90m`.
pub fn parse_step(s: &str) -> Result<Duration, TimeParseError> {
    let s = s.trim().to_lowercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| TimeParseError::InvalidStep(s.clone()))?;
    let (count, unit) = s.split_at(split);
    let count: i64 = count
        .parse()
        .map_err(|_| TimeParseError::InvalidStep(s.clone()))?;
    if count <= 0 {
        return Err(TimeParseError::InvalidStep(s.clone()));
    }

    match unit {
        "h" | "hr" | "hour" | "hours" => Ok(Duration::hours(count)),
        "d" | "day" | "days" => Ok(Duration::days(count)),
        "m" | "min" | "minutes" => Ok(Duration::minutes(count)),
        _ => Err(TimeParseError::InvalidStep(s.clone())),
    }
}

/// Human-readable lead label in hours, e.g. `+12h`.
pub fn lead_label(lead: u32, step: Duration) -> String {
    let minutes = step.num_minutes() * lead as i64;
    if minutes % 60 == 0 {
        format!("+{}h", minutes / 60)
    } else {
        format!("+{}min", minutes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid step alias: {0} (expected e.g. '6h', '1d', '30min')")]
    InvalidStep(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_cycle_stamp() {
        let dt = parse_datetime("2023-08-15T06").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month(), 8);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_parse_rfc3339_and_date_only() {
        let dt = parse_datetime("2024-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.hour(), 12);

        let dt = parse_datetime("2024-01-15").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.day(), 15);

        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_parse_step() {
        assert_eq!(parse_step("6h").unwrap(), Duration::hours(6));
        assert_eq!(parse_step("3H").unwrap(), Duration::hours(3));
        assert_eq!(parse_step("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_step("30min").unwrap(), Duration::minutes(30));
        assert!(parse_step("h").is_err());
        assert!(parse_step("0h").is_err());
        assert!(parse_step("6w").is_err());
    }

    #[test]
    fn test_valid_time() {
        let cycle = Utc.with_ymd_and_hms(2023, 8, 15, 0, 0, 0).unwrap();
        let ft = ForecastTime::new(cycle, 4, Duration::hours(6));
        assert_eq!(ft.valid_time(), Utc.with_ymd_and_hms(2023, 8, 16, 0, 0, 0).unwrap());
        assert_eq!(ForecastTime::analysis(cycle).valid_time(), cycle);
    }

    #[test]
    fn test_lead_label() {
        assert_eq!(lead_label(0, Duration::hours(6)), "+0h");
        assert_eq!(lead_label(4, Duration::hours(6)), "+24h");
        assert_eq!(lead_label(3, Duration::minutes(20)), "+1h");
        assert_eq!(lead_label(1, Duration::minutes(30)), "+30min");
    }
}
