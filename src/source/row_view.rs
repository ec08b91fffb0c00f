use serde_json::Value;
use tracing::warn;

use super::utilities::date_helpers::parse_timestamp;
use crate::data::{FieldValue, Record, Schema, Table};
use crate::errors::ExplorerError;

/// Maps one raw source payload row onto the flat schema of its source.
pub trait RecordNormalizer: Send + Sync {
    /// Stable source id for produced tables.
    fn source_id(&self) -> &str;
    /// Schema every normalized record conforms to.
    fn schema(&self) -> Schema;
    /// Normalize one raw row.
    ///
    /// Missing optional fields become `Null`; only rows with no usable shape
    /// or identifier fail, with `MalformedRecord`.
    fn normalize(&self, raw: &Value, row_index: usize) -> Result<Record, ExplorerError>;
}

/// Result of normalizing one payload.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedBatch {
    /// Records that normalized cleanly.
    pub table: Table,
    /// Number of rows skipped as malformed.
    pub skipped: usize,
}

/// Normalize every row, skipping malformed ones individually.
///
/// `first_index` offsets row indices for paged payloads so warnings and
/// synthetic ids refer to the global row position.
pub fn normalize_batch<N>(normalizer: &N, rows: &[Value], first_index: usize) -> NormalizedBatch
where
    N: RecordNormalizer + ?Sized,
{
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (offset, raw) in rows.iter().enumerate() {
        match normalizer.normalize(raw, first_index + offset) {
            Ok(record) => records.push(record),
            Err(err) => {
                skipped += 1;
                warn!(
                    "[hf_explorer:normalize] skipping row {} from '{}': {}",
                    first_index + offset,
                    normalizer.source_id(),
                    err
                );
            }
        }
    }
    NormalizedBatch {
        table: Table::new(normalizer.schema(), records),
        skipped,
    }
}

/// Build the `MalformedRecord` error for `source_id`.
pub fn malformed(source_id: &str, details: impl Into<String>) -> ExplorerError {
    ExplorerError::MalformedRecord {
        source_id: source_id.to_string(),
        details: details.into(),
    }
}

/// Follow a path of object keys; any missing step yields `None`.
pub fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Text coercion: strings pass through, numbers and booleans are rendered,
/// everything else (null, arrays, objects, absent) is `Null`.
pub fn json_text(value: Option<&Value>) -> FieldValue {
    match value {
        Some(Value::String(text)) => FieldValue::Text(text.clone()),
        Some(Value::Number(number)) => FieldValue::Text(number.to_string()),
        Some(Value::Bool(flag)) => FieldValue::Text(flag.to_string()),
        _ => FieldValue::Null,
    }
}

/// Numeric coercion: JSON numbers and numeric strings; anything else is `Null`.
pub fn json_number(value: Option<&Value>) -> FieldValue {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    FieldValue::number_or_null(number)
}

/// Timestamp coercion from the string layouts `parse_timestamp` accepts.
pub fn json_timestamp(value: Option<&Value>) -> FieldValue {
    let ts = match value {
        Some(Value::String(text)) => parse_timestamp(text),
        _ => None,
    };
    FieldValue::timestamp_or_null(ts)
}

/// Boolean coercion from JSON booleans and `"true"`/`"false"` strings.
pub fn json_bool(value: Option<&Value>) -> FieldValue {
    match value {
        Some(Value::Bool(flag)) => FieldValue::Bool(*flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => FieldValue::Null,
        },
        _ => FieldValue::Null,
    }
}

/// List coercion: arrays keep their string/number elements, a lone string
/// becomes a one-element list, anything else is `Null`.
pub fn json_list(value: Option<&Value>) -> FieldValue {
    match value {
        Some(Value::Array(items)) => FieldValue::List(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Some(Value::String(text)) => FieldValue::List(vec![text.clone()]),
        _ => FieldValue::Null,
    }
}

/// Non-empty identifier string, or `None`.
pub fn json_identifier(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, FieldKind};
    use serde_json::json;

    struct IdOnly;

    impl RecordNormalizer for IdOnly {
        fn source_id(&self) -> &str {
            "stub"
        }

        fn schema(&self) -> Schema {
            Schema {
                source: "stub".into(),
                id_field: "id".into(),
                time_field: "ts".into(),
                columns: vec![Column::new("n", FieldKind::Number)],
            }
        }

        fn normalize(&self, raw: &Value, _row_index: usize) -> Result<Record, ExplorerError> {
            let id = json_identifier(raw.get("id")).ok_or_else(|| malformed("stub", "missing id"))?;
            Ok(Record::new(id).with("n", json_number(raw.get("n"))))
        }
    }

    #[test]
    fn malformed_rows_are_skipped_individually() {
        let rows = vec![
            json!({"id": "a", "n": 1}),
            json!("not an object"),
            json!({"n": 2}),
            json!({"id": "d", "n": "oops"}),
        ];
        let batch = normalize_batch(&IdOnly, &rows, 0);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.table.len(), 2);
        assert_eq!(batch.table.records[1].get("n"), &FieldValue::Null);
    }

    #[test]
    fn coercions_tolerate_bad_values() {
        assert_eq!(json_number(Some(&json!("3.5"))), FieldValue::Number(3.5));
        assert_eq!(json_number(Some(&json!("n/a"))), FieldValue::Null);
        assert_eq!(json_number(None), FieldValue::Null);
        assert_eq!(json_timestamp(Some(&json!("garbage"))), FieldValue::Null);
        assert!(matches!(json_timestamp(Some(&json!("2024-01-05"))), FieldValue::Timestamp(_)));
        assert_eq!(json_bool(Some(&json!("TRUE"))), FieldValue::Bool(true));
        assert_eq!(json_text(Some(&json!({"nested": 1}))), FieldValue::Null);
    }

    #[test]
    fn lists_accept_arrays_and_lone_strings() {
        assert_eq!(
            json_list(Some(&json!(["en", null, "fr"]))),
            FieldValue::List(vec!["en".into(), "fr".into()])
        );
        assert_eq!(json_list(Some(&json!("en"))), FieldValue::List(vec!["en".into()]));
        assert_eq!(json_list(Some(&json!(42))), FieldValue::Null);
    }

    #[test]
    fn json_path_walks_nested_objects() {
        let value = json!({"cardData": {"language": ["en"]}});
        assert_eq!(json_path(&value, &["cardData", "language"]), Some(&json!(["en"])));
        assert_eq!(json_path(&value, &["cardData", "missing"]), None);
        assert_eq!(json_path(&value, &["cardData", "language", "deeper"]), None);
    }
}
