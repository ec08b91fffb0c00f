use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use crate::types::{FieldName, RecordId, SourceId};

/// Declared kind of a table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Free text (titles, descriptions, names).
    Text,
    /// Single categorical value.
    Category,
    /// Multi-valued categorical list (tags, languages).
    Tags,
    /// Numeric metric.
    Number,
    /// Point in time.
    Timestamp,
    /// Boolean flag.
    Bool,
    /// Link target extracted from markup.
    Link,
}

/// Scalar or small-list value held by one record field.
///
/// `Null` is the sentinel for missing or uncoercible values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Missing value.
    #[default]
    Null,
    /// Free text or a single category.
    Text(String),
    /// Finite number.
    Number(f64),
    /// Flag.
    Bool(bool),
    /// Instant in UTC.
    Timestamp(DateTime<Utc>),
    /// Multi-valued category, such as tags.
    List(Vec<String>),
}

impl FieldValue {
    /// Build a text value, mapping `None` to `Null`.
    pub fn text_or_null(value: Option<impl Into<String>>) -> Self {
        value.map_or(FieldValue::Null, |text| FieldValue::Text(text.into()))
    }

    /// Build a numeric value, mapping `None` and non-finite numbers to `Null`.
    pub fn number_or_null(value: Option<f64>) -> Self {
        match value {
            Some(number) if number.is_finite() => FieldValue::Number(number),
            _ => FieldValue::Null,
        }
    }

    /// Build a timestamp value, mapping `None` to `Null`.
    pub fn timestamp_or_null(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Timestamp)
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// The number, if this is a `Number`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// The instant, if this is a `Timestamp`.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// The text, if this is a `Text`. Lists are not joined.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Categorical members of this value.
    ///
    /// Text and booleans yield one member, lists yield each element, and
    /// numbers, timestamps and `Null` yield none.
    pub fn members(&self) -> Vec<&str> {
        match self {
            FieldValue::Text(text) => vec![text.as_str()],
            FieldValue::Bool(true) => vec!["true"],
            FieldValue::Bool(false) => vec!["false"],
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Render the value as a single display/export cell. `Null` renders empty.
    pub fn to_cell(&self, list_separator: &str) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => number.to_string(),
            FieldValue::Bool(flag) => flag.to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
            FieldValue::List(items) => items.join(list_separator),
        }
    }
}

/// One declared column of a source schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Field name as stored on records.
    pub name: FieldName,
    /// How filters and views interpret the field.
    pub kind: FieldKind,
}

impl Column {
    /// Declare a column.
    pub fn new(name: impl Into<FieldName>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Shared shape of every record in a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Source that produced the table.
    pub source: SourceId,
    /// Column holding the record identifier.
    pub id_field: FieldName,
    /// Canonical timestamp column used for time-series views.
    pub time_field: FieldName,
    /// Ordered column declarations (export order).
    pub columns: Vec<Column>,
}

impl Schema {
    /// Declared kind for `field`, if the schema has it.
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.columns
            .iter()
            .find(|column| column.name == field)
            .map(|column| column.kind)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Names of all numeric columns.
    pub fn metric_fields(&self) -> Vec<FieldName> {
        self.columns
            .iter()
            .filter(|column| column.kind == FieldKind::Number)
            .map(|column| column.name.clone())
            .collect()
    }
}

static NULL_VALUE: FieldValue = FieldValue::Null;

/// One flattened entity (model, dataset, article, or leaderboard row).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier within the source.
    pub id: RecordId,
    /// Field values keyed by column name, in insertion order.
    pub fields: IndexMap<FieldName, FieldValue>,
}

impl Record {
    /// Record with no fields set.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<FieldName>, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    /// Set or overwrite `field`.
    pub fn set(&mut self, field: impl Into<FieldName>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Value for `field`; absent fields read as `Null`.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    /// Numeric value of `field`, if it holds one.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).as_number()
    }

    /// Timestamp value of `field`, if it holds one.
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).as_timestamp()
    }
}

/// Ordered collection of records sharing one schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Shape shared by every record.
    pub schema: Schema,
    /// Records in source order.
    pub records: Vec<Record>,
}

impl Table {
    /// Wrap records under a schema.
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// Empty table with the same schema.
    pub fn empty_like(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            records: Vec::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Source id from the schema.
    pub fn source(&self) -> &str {
        &self.schema.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_fields_read_as_null() {
        let record = Record::new("r1").with("likes", FieldValue::Number(3.0));
        assert_eq!(record.number("likes"), Some(3.0));
        assert!(record.get("downloads").is_null());
        assert_eq!(record.number("downloads"), None);
    }

    #[test]
    fn members_flatten_lists_and_skip_non_categorical_values() {
        let tags = FieldValue::List(vec!["nlp".into(), "text".into()]);
        assert_eq!(tags.members(), vec!["nlp", "text"]);
        assert_eq!(FieldValue::Text("FR".into()).members(), vec!["FR"]);
        assert!(FieldValue::Number(1.0).members().is_empty());
        assert!(FieldValue::Null.members().is_empty());
    }

    #[test]
    fn number_or_null_rejects_non_finite_values() {
        assert_eq!(FieldValue::number_or_null(Some(f64::NAN)), FieldValue::Null);
        assert_eq!(FieldValue::number_or_null(None), FieldValue::Null);
        assert_eq!(
            FieldValue::number_or_null(Some(2.5)),
            FieldValue::Number(2.5)
        );
    }

    #[test]
    fn cells_render_every_variant() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(FieldValue::Null.to_cell(";"), "");
        assert_eq!(FieldValue::Timestamp(ts).to_cell(";"), "2024-01-05T00:00:00+00:00");
        assert_eq!(
            FieldValue::List(vec!["a".into(), "b".into()]).to_cell(";"),
            "a;b"
        );
        assert_eq!(FieldValue::Bool(true).to_cell(";"), "true");
    }
}
