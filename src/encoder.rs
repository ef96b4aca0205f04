//! Output encoding
//!
//! Encodes augmented records and SLA records as CSV, NDJSON or JSON, and
//! renders the two side channels: the unmatched-timestamp list and the parse
//! error log.

use crate::error::CadenceError;
use crate::types::{OutputRecord, ParseFailure, SlaRecord};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Output format for augmented records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    #[default]
    Csv,
    Ndjson,
    Json,
    JsonPretty,
}

/// Format one error-log line for a failed timestamp
pub fn error_log_line(text: &str, failure: ParseFailure) -> String {
    format!("Failed to parse: {} | Error: {}", text, failure)
}

/// Encoder for run outputs
pub struct ReportEncoder;

impl ReportEncoder {
    /// Write records to `writer` in the requested format
    pub fn write_records<W: Write>(
        writer: W,
        records: &[OutputRecord],
        format: RecordFormat,
    ) -> Result<(), CadenceError> {
        write_rows(writer, records, &CSV_HEADER, format)
    }

    /// Write SLA records to `writer` in the requested format
    pub fn write_sla<W: Write>(
        writer: W,
        records: &[SlaRecord],
        format: RecordFormat,
    ) -> Result<(), CadenceError> {
        write_rows(writer, records, &SLA_CSV_HEADER, format)
    }

    /// Encode records to a string
    pub fn encode_records(
        records: &[OutputRecord],
        format: RecordFormat,
    ) -> Result<String, CadenceError> {
        let mut buffer = Vec::new();
        Self::write_records(&mut buffer, records, format)?;
        String::from_utf8(buffer).map_err(|e| {
            CadenceError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// One raw timestamp text per line
    pub fn encode_unmatched(unmatched: &[String]) -> String {
        lines(unmatched)
    }

    /// One error-log line per parse failure
    pub fn encode_error_log(error_log: &[String]) -> String {
        lines(error_log)
    }
}

/// Serialize rows in `format`; `header` is written for an empty CSV
fn write_rows<W: Write, T: Serialize>(
    mut writer: W,
    rows: &[T],
    header: &[&str],
    format: RecordFormat,
) -> Result<(), CadenceError> {
    match format {
        RecordFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            if rows.is_empty() {
                csv_writer.write_record(header)?;
            }
            for row in rows {
                csv_writer.serialize(row)?;
            }
            csv_writer.flush()?;
        }
        RecordFormat::Ndjson => {
            for row in rows {
                serde_json::to_writer(&mut writer, row)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        RecordFormat::Json => {
            serde_json::to_writer(&mut writer, rows)?;
            writer.flush()?;
        }
        RecordFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
        }
    }
    Ok(())
}

const SLA_CSV_HEADER: [&str; 5] = ["id", "name", "timestamp", "last_feed", "sla_met"];

const CSV_HEADER: [&str; 7] = [
    "id",
    "name",
    "timestamp",
    "utc",
    "category",
    "median_minutes",
    "stddev_minutes",
];

fn lines(entries: &[String]) -> String {
    entries.iter().map(|e| format!("{}\n", e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records() -> Vec<OutputRecord> {
        vec![
            OutputRecord {
                id: "1".to_string(),
                name: "feed_a".to_string(),
                timestamp: "2024-01-15 08:30:00".to_string(),
                utc: "15-01-2024-08-30".to_string(),
                category: "weekly".to_string(),
                median_minutes: Some(10080),
                stddev_minutes: Some(12),
            },
            OutputRecord {
                id: "2".to_string(),
                name: "feed_b".to_string(),
                timestamp: "garbage".to_string(),
                utc: String::new(),
                category: "unclassified".to_string(),
                median_minutes: None,
                stddev_minutes: None,
            },
        ]
    }

    #[test]
    fn test_csv_output() {
        let csv = ReportEncoder::encode_records(&records(), RecordFormat::Csv).unwrap();

        assert_eq!(
            csv,
            "id,name,timestamp,utc,category,median_minutes,stddev_minutes\n\
             1,feed_a,2024-01-15 08:30:00,15-01-2024-08-30,weekly,10080,12\n\
             2,feed_b,garbage,,unclassified,,\n"
        );
    }

    #[test]
    fn test_csv_output_empty_still_has_header() {
        let csv = ReportEncoder::encode_records(&[], RecordFormat::Csv).unwrap();

        assert_eq!(csv, "id,name,timestamp,utc,category,median_minutes,stddev_minutes\n");
    }

    #[test]
    fn test_ndjson_output() {
        let ndjson = ReportEncoder::encode_records(&records(), RecordFormat::Ndjson).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();

        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["category"], "unclassified");
        assert!(second["median_minutes"].is_null());
    }

    #[test]
    fn test_json_output_roundtrip() {
        let json = ReportEncoder::encode_records(&records(), RecordFormat::JsonPretty).unwrap();
        let parsed: Vec<OutputRecord> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, records());
    }

    #[test]
    fn test_sla_csv_output() {
        let rows = vec![
            SlaRecord {
                id: "1".to_string(),
                name: "rpt_sales".to_string(),
                timestamp: "2025-06-02 10:00:00".to_string(),
                last_feed: Some("02-06-2025-08-00".to_string()),
                sla_met: true,
            },
            SlaRecord {
                id: "2".to_string(),
                name: "rpt_orphan".to_string(),
                timestamp: "2025-06-02 10:00:00".to_string(),
                last_feed: None,
                sla_met: false,
            },
        ];

        let mut buffer = Vec::new();
        ReportEncoder::write_sla(&mut buffer, &rows, RecordFormat::Csv).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "id,name,timestamp,last_feed,sla_met\n\
             1,rpt_sales,2025-06-02 10:00:00,02-06-2025-08-00,true\n\
             2,rpt_orphan,2025-06-02 10:00:00,,false\n"
        );

        let mut empty = Vec::new();
        ReportEncoder::write_sla(&mut empty, &[], RecordFormat::Csv).unwrap();
        assert_eq!(String::from_utf8(empty).unwrap(), "id,name,timestamp,last_feed,sla_met\n");
    }

    #[test]
    fn test_side_channels() {
        assert_eq!(
            error_log_line("garbage", ParseFailure::UnparsableFormat),
            "Failed to parse: garbage | Error: unparsable format"
        );
        assert_eq!(
            ReportEncoder::encode_unmatched(&["a".to_string(), "b".to_string()]),
            "a\nb\n"
        );
        assert_eq!(ReportEncoder::encode_error_log(&[]), "");
    }
}
