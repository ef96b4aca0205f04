//! CSV and NDJSON record adapters

use crate::config::ColumnMapping;
use crate::error::CadenceError;
use crate::types::RawRecord;
use serde_json::Value;
use std::io::Read;

/// Adapter for reading raw records from CSV and JSON inputs
pub struct RecordAdapter;

impl RecordAdapter {
    /// Lazily read CSV records with a header row
    pub fn csv_records<R: Read>(
        reader: R,
        columns: &ColumnMapping,
    ) -> Result<CsvRecords<R>, CadenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let indices = ColumnIndices {
            id: column_position(&headers, &columns.id)?,
            name: column_position(&headers, &columns.name)?,
            timestamp: column_position(&headers, &columns.timestamp)?,
        };

        Ok(CsvRecords {
            records: reader.into_records(),
            indices,
        })
    }

    /// Read all CSV records from a string
    pub fn parse_csv(input: &str, columns: &ColumnMapping) -> Result<Vec<RawRecord>, CadenceError> {
        Self::csv_records(input.as_bytes(), columns)?.collect()
    }

    /// Lazily read NDJSON (one JSON object per line); blank lines are skipped
    pub fn ndjson_records<'a>(
        input: &'a str,
        columns: &'a ColumnMapping,
    ) -> impl Iterator<Item = Result<RawRecord, CadenceError>> + 'a {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(move |(idx, line)| {
                let line_num = idx + 1;
                let value: Value =
                    serde_json::from_str(line.trim()).map_err(|e| CadenceError::InvalidRecord {
                        line: line_num,
                        reason: e.to_string(),
                    })?;
                record_from_value(&value, columns, line_num)
            })
    }

    /// Read all NDJSON records from a string
    pub fn parse_ndjson(
        input: &str,
        columns: &ColumnMapping,
    ) -> Result<Vec<RawRecord>, CadenceError> {
        Self::ndjson_records(input, columns).collect()
    }

    /// Read a JSON array of record objects one element at a time.
    ///
    /// A malformed array yields a single error. Otherwise each element maps to
    /// its own result, numbered from 1, so a bad element does not discard the
    /// elements before it.
    pub fn json_records<'a>(
        json: &str,
        columns: &'a ColumnMapping,
    ) -> impl Iterator<Item = Result<RawRecord, CadenceError>> + 'a {
        let (values, error) = match serde_json::from_str::<Vec<Value>>(json) {
            Ok(values) => (values, None),
            Err(e) => (Vec::new(), Some(CadenceError::from(e))),
        };

        error.map(Err).into_iter().chain(
            values
                .into_iter()
                .enumerate()
                .map(move |(idx, value)| record_from_value(&value, columns, idx + 1)),
        )
    }

    /// Read a JSON array of record objects
    pub fn parse_array(json: &str, columns: &ColumnMapping) -> Result<Vec<RawRecord>, CadenceError> {
        Self::json_records(json, columns).collect()
    }
}

/// Index of a header, or `MissingColumn`
pub(crate) fn column_position(
    headers: &csv::StringRecord,
    column: &str,
) -> Result<usize, CadenceError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| CadenceError::MissingColumn(column.to_string()))
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    id: usize,
    name: usize,
    timestamp: usize,
}

/// Iterator over CSV rows mapped to [`RawRecord`]s
pub struct CsvRecords<R> {
    records: csv::StringRecordsIntoIter<R>,
    indices: ColumnIndices,
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<RawRecord, CadenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.records.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        let field = |idx: usize| row.get(idx).unwrap_or_default();
        let timestamp = field(self.indices.timestamp);

        Some(Ok(RawRecord {
            id: field(self.indices.id).to_string(),
            name: field(self.indices.name).to_string(),
            timestamp: (!timestamp.is_empty()).then(|| timestamp.to_string()),
        }))
    }
}

fn record_from_value(
    value: &Value,
    columns: &ColumnMapping,
    line: usize,
) -> Result<RawRecord, CadenceError> {
    let object = value.as_object().ok_or_else(|| CadenceError::InvalidRecord {
        line,
        reason: "expected a JSON object".to_string(),
    })?;

    let scalar = |column: &str| -> Result<Option<String>, CadenceError> {
        match object.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(_) => Err(CadenceError::InvalidRecord {
                line,
                reason: format!("column '{}' is not a scalar", column),
            }),
        }
    };
    let required = |column: &str| {
        scalar(column)?.ok_or_else(|| CadenceError::InvalidRecord {
            line,
            reason: format!("missing column '{}'", column),
        })
    };

    Ok(RawRecord {
        id: required(columns.id.as_str())?,
        name: required(columns.name.as_str())?,
        timestamp: scalar(columns.timestamp.as_str())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_csv_allow_list() {
        let input = "id,region,name,timestamp,owner\n\
                     1,emea,feed_a,2024-01-15 08:30:00,ops\n\
                     2,apac,feed_b,,ops\n";

        let records = RecordAdapter::parse_csv(input, &ColumnMapping::default()).unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::new("1", "feed_a", Some("2024-01-15 08:30:00")),
                RawRecord::new("2", "feed_b", None),
            ]
        );
    }

    #[test]
    fn test_csv_custom_columns() {
        let columns = ColumnMapping {
            id: "rec_id".to_string(),
            name: "rec_name".to_string(),
            timestamp: "rec_built_timestamp".to_string(),
        };
        let input = "rec_id,rec_name,rec_built_timestamp\nR1,RPT_001,21-MAR-25 2.07.06.4343 AM\n";

        let records = RecordAdapter::parse_csv(input, &columns).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "RPT_001");
        assert_eq!(records[0].timestamp.as_deref(), Some("21-MAR-25 2.07.06.4343 AM"));
    }

    #[test]
    fn test_csv_missing_column() {
        let result = RecordAdapter::parse_csv("id,name\n1,a\n", &ColumnMapping::default());

        assert!(matches!(result, Err(CadenceError::MissingColumn(c)) if c == "timestamp"));
    }

    #[test]
    fn test_csv_ragged_row_is_an_error_mid_stream() {
        let input = "id,name,timestamp\n1,a,2024-01-15\n2,b\n3,c,2024-01-16\n";
        let mut records = RecordAdapter::csv_records(input.as_bytes(), &ColumnMapping::default())
            .unwrap();

        assert!(records.next().unwrap().is_ok());
        assert!(matches!(records.next(), Some(Err(CadenceError::Csv(_)))));
    }

    #[test]
    fn test_ndjson() {
        let input = r#"{"id": 1, "name": "feed_a", "timestamp": "2024-01-15T08:30:00Z", "extra": [1]}

{"id": "2", "name": "feed_a", "timestamp": null}
"#;

        let records = RecordAdapter::parse_ndjson(input, &ColumnMapping::default()).unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::new("1", "feed_a", Some("2024-01-15T08:30:00Z")),
                RawRecord::new("2", "feed_a", None),
            ]
        );
    }

    #[test]
    fn test_ndjson_errors_carry_line_numbers() {
        let input = "{\"id\": \"1\", \"name\": \"a\"}\nnot json\n";
        let results: Vec<_> = RecordAdapter::ndjson_records(input, &ColumnMapping::default())
            .collect();

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CadenceError::InvalidRecord { line: 2, .. })));

        let missing_name = "{\"id\": \"1\"}";
        let result = RecordAdapter::parse_ndjson(missing_name, &ColumnMapping::default());
        assert!(matches!(result, Err(CadenceError::InvalidRecord { line: 1, .. })));
    }

    #[test]
    fn test_json_array() {
        let json = r#"[{"id": "1", "name": "a", "timestamp": "03/21/2025 14:05"}]"#;
        let records = RecordAdapter::parse_array(json, &ColumnMapping::default()).unwrap();

        assert_eq!(records, vec![RawRecord::new("1", "a", Some("03/21/2025 14:05"))]);

        let nested = r#"[{"id": "1", "name": {"x": 1}}]"#;
        assert!(RecordAdapter::parse_array(nested, &ColumnMapping::default()).is_err());
    }

    #[test]
    fn test_json_array_bad_element_keeps_earlier_records() {
        let json = r#"[{"id": "1", "name": "a", "timestamp": "2025-06-02 10:00:00"},
                       {"id": "2", "timestamp": "2025-06-02 11:00:00"},
                       {"id": "3", "name": "a"}]"#;
        let results: Vec<_> = RecordAdapter::json_records(json, &ColumnMapping::default())
            .collect();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &RawRecord::new("1", "a", Some("2025-06-02 10:00:00"))
        );
        assert!(matches!(results[1], Err(CadenceError::InvalidRecord { line: 2, .. })));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_json_array_malformed_yields_one_error() {
        let results: Vec<_> = RecordAdapter::json_records("[{", &ColumnMapping::default())
            .collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CadenceError::Json(_))));
    }
}
