//! Output formatting for comparisons, verification records and loss curves.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use field_engine::{AlignedCurves, Comparison, CurveSummary, SliceSummary, VerificationRecord};
use serde::Serialize;

/// Serializable view of a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub fields: Vec<SliceSummary>,
    pub differences: Vec<SliceSummary>,
    pub value_range: Option<(f32, f32)>,
    pub difference_range: Option<(f32, f32)>,
}

impl From<&Comparison> for ComparisonReport {
    fn from(comparison: &Comparison) -> Self {
        Self {
            fields: comparison.fields().iter().map(SliceSummary::from).collect(),
            differences: comparison.differences.iter().map(SliceSummary::from).collect(),
            value_range: comparison.value_range,
            difference_range: comparison.difference_range,
        }
    }
}

/// Formats results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format a comparison as a console table.
    pub fn format_table(report: &ComparisonReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Source", "Variable", "Units", "Grid", "Leads", "Members", "Missing", "Min / Max"]);

        for summary in report.fields.iter().chain(&report.differences) {
            table.add_row(vec![
                summary.source.clone(),
                summary.variable.clone(),
                summary.units.clone().unwrap_or_default(),
                summary.grid.clone(),
                summary.lead_labels.join(" "),
                summary.members.join(" "),
                format!("{} / {}", summary.missing, summary.values),
                format_range(summary.min.zip(summary.max)),
            ]);
        }

        format!(
            "{}\nShared range: {}\nDifference range: {}",
            table,
            format_range(report.value_range),
            format_range(report.difference_range)
        )
    }

    /// Format any serializable result as pretty JSON.
    pub fn format_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// CSV header matching [`ResultsReport::format_csv`].
    pub fn csv_header() -> &'static str {
        "source,variable,valid_time,lead_time,member,latitude,longitude,value"
    }

    /// Format one record as a CSV row. Missing values are left empty.
    pub fn format_csv(record: &VerificationRecord) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            record.source,
            record.variable,
            record.valid_time.to_rfc3339(),
            record.lead_time,
            record.member,
            record.latitude,
            record.longitude,
            record.value.map(|v| v.to_string()).unwrap_or_default()
        )
    }

    /// Header plus one row per record.
    pub fn records_csv(records: &[VerificationRecord]) -> String {
        let mut out = String::with_capacity(64 * (records.len() + 1));
        out.push_str(Self::csv_header());
        out.push('\n');
        for record in records {
            out.push_str(&Self::format_csv(record));
            out.push('\n');
        }
        out
    }

    /// Format loss-curve summaries as a console table.
    pub fn format_curves_table(summaries: &[CurveSummary]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Run", "Points", "Final step", "Final", "Min step", "Min"]);
        for s in summaries {
            table.add_row(vec![
                s.label.clone(),
                s.points.to_string(),
                opt(s.final_step),
                s.final_value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string()),
                opt(s.min_step),
                s.min_value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string()),
            ]);
        }
        table.to_string()
    }

    /// Aligned curves as CSV, one column per run. Gaps are empty fields.
    pub fn curves_csv(aligned: &AlignedCurves) -> String {
        let mut out = String::from("step");
        for label in &aligned.labels {
            out.push(',');
            out.push_str(label);
        }
        out.push('\n');
        for (i, step) in aligned.steps.iter().enumerate() {
            out.push_str(&step.to_string());
            for run in &aligned.values {
                out.push(',');
                if let Some(v) = run[i] {
                    out.push_str(&v.to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

fn format_range(range: Option<(f32, f32)>) -> String {
    match range {
        Some((lo, hi)) => format!("{:.2} / {:.2}", lo, hi),
        None => "-".to_string(),
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use field_engine::ReduceMode;

    fn record(value: Option<f32>) -> VerificationRecord {
        VerificationRecord {
            source: "fc".to_string(),
            variable: "air_temperature_2m".to_string(),
            valid_time: Utc.with_ymd_and_hms(2023, 8, 15, 6, 0, 0).unwrap(),
            lead_time: 1,
            member: ReduceMode::Mean,
            latitude: 60.5,
            longitude: 10.25,
            value,
        }
    }

    #[test]
    fn test_csv_row() {
        assert_eq!(
            ResultsReport::format_csv(&record(Some(1.5))),
            "fc,air_temperature_2m,2023-08-15T06:00:00+00:00,1,mean,60.5,10.25,1.5"
        );
        assert!(ResultsReport::format_csv(&record(None)).ends_with(",10.25,"));
    }

    #[test]
    fn test_records_csv_has_header_and_rows() {
        let csv = ResultsReport::records_csv(&[record(Some(1.0)), record(None)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ResultsReport::csv_header());
    }

    #[test]
    fn test_range_formatting() {
        assert_eq!(format_range(Some((-1.0, 2.5))), "-1.00 / 2.50");
        assert_eq!(format_range(None), "-");
    }

    #[test]
    fn test_curves_csv_leaves_gaps_empty() {
        let aligned = AlignedCurves {
            steps: vec![0, 10],
            labels: vec!["a".to_string(), "b".to_string()],
            values: vec![vec![Some(1.5), Some(1.0)], vec![None, Some(2.0)]],
        };
        assert_eq!(ResultsReport::curves_csv(&aligned), "step,a,b\n0,1.5,\n10,1,2\n");
    }
}
