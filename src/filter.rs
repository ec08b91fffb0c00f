//! Predicate filtering over normalized tables.
//!
//! Every operation here is a pure function of its inputs: the source table is
//! borrowed immutably and a new, derived table is returned.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::data::{FieldKind, FieldValue, Record, Table};
use crate::types::{CategoryValue, FieldName};
use crate::utils::contains_ignore_case;

/// One per-field predicate. All predicates of a [`FilterSpec`] are ANDed.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Categorical membership. List-valued fields match when any element is
    /// selected. An empty selection matches nothing.
    OneOf {
        /// Filtered field.
        field: FieldName,
        /// Accepted values.
        values: BTreeSet<CategoryValue>,
    },
    /// Numeric value within `[lo, hi]`.
    Range {
        /// Filtered field.
        field: FieldName,
        /// Inclusive lower bound.
        lo: f64,
        /// Inclusive upper bound.
        hi: f64,
    },
    /// Timestamp within `[start, end]`.
    Between {
        /// Filtered field.
        field: FieldName,
        /// Inclusive start.
        start: DateTime<Utc>,
        /// Inclusive end.
        end: DateTime<Utc>,
    },
    /// Case-insensitive substring match on a text field. An empty needle
    /// matches every record, including ones with a null field.
    Contains {
        /// Searched field.
        field: FieldName,
        /// Substring to look for.
        needle: String,
    },
}

impl Predicate {
    /// Categorical predicate from any iterable of values.
    pub fn one_of<I, S>(field: impl Into<FieldName>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CategoryValue>,
    {
        Predicate::OneOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Inclusive numeric range. An inverted range matches nothing.
    pub fn range(field: impl Into<FieldName>, lo: f64, hi: f64) -> Self {
        Predicate::Range {
            field: field.into(),
            lo,
            hi,
        }
    }

    /// Inclusive timestamp window.
    pub fn between(field: impl Into<FieldName>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Predicate::Between {
            field: field.into(),
            start,
            end,
        }
    }

    /// Case-insensitive substring search.
    pub fn contains(field: impl Into<FieldName>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    /// Field this predicate reads.
    pub fn field(&self) -> &str {
        match self {
            Predicate::OneOf { field, .. }
            | Predicate::Range { field, .. }
            | Predicate::Between { field, .. }
            | Predicate::Contains { field, .. } => field,
        }
    }

    /// Evaluate against one record. Null values fail every non-trivial predicate.
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(self.field());
        match self {
            Predicate::OneOf { values, .. } => value
                .members()
                .into_iter()
                .any(|member| values.contains(member)),
            Predicate::Range { lo, hi, .. } => value
                .as_number()
                .is_some_and(|number| *lo <= number && number <= *hi),
            Predicate::Between { start, end, .. } => value
                .as_timestamp()
                .is_some_and(|ts| *start <= ts && ts <= *end),
            Predicate::Contains { needle, .. } => {
                if needle.is_empty() {
                    return true;
                }
                match value {
                    FieldValue::Text(text) => contains_ignore_case(text, needle),
                    FieldValue::List(items) => {
                        items.iter().any(|item| contains_ignore_case(item, needle))
                    }
                    _ => false,
                }
            }
        }
    }

    /// Merge two predicates on the same field into one equivalent to their
    /// conjunction, when the pair has a closed form.
    ///
    /// `OneOf` intersects sets only for scalar fields; for list-valued fields
    /// "any tag in A and any tag in B" is not "any tag in A∩B", so callers
    /// pass `scalar_field = false` to keep both predicates.
    fn merge(&self, other: &Predicate, scalar_field: bool) -> Option<Predicate> {
        if self.field() != other.field() {
            return None;
        }
        match (self, other) {
            (
                Predicate::OneOf { field, values: a },
                Predicate::OneOf { values: b, .. },
            ) if scalar_field => Some(Predicate::OneOf {
                field: field.clone(),
                values: a.intersection(b).cloned().collect(),
            }),
            (
                Predicate::Range { field, lo: lo_a, hi: hi_a },
                Predicate::Range { lo: lo_b, hi: hi_b, .. },
            ) => Some(Predicate::Range {
                field: field.clone(),
                lo: lo_a.max(*lo_b),
                hi: hi_a.min(*hi_b),
            }),
            (
                Predicate::Between { field, start: start_a, end: end_a },
                Predicate::Between { start: start_b, end: end_b, .. },
            ) => Some(Predicate::Between {
                field: field.clone(),
                start: (*start_a).max(*start_b),
                end: (*end_a).min(*end_b),
            }),
            _ => None,
        }
    }
}

/// Set of ANDed predicates. The empty spec is the identity filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    /// The identity filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style predicate append.
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Append a predicate.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Predicates in insertion order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// True for the identity filter.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// `true` when every predicate accepts `record`.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(record))
    }

    /// Spec equivalent to applying `self` then `other`.
    ///
    /// Same-field predicates with a closed form are merged (set intersection,
    /// range/period overlap); everything else is carried side by side.
    /// `table` tells scalar from list fields: a field counts as scalar only
    /// when its column is declared with a non-list kind and no record holds
    /// a list there. Undeclared fields keep both predicates.
    pub fn intersect(&self, other: &FilterSpec, table: &Table) -> FilterSpec {
        let mut merged = self.predicates.clone();
        for incoming in &other.predicates {
            let scalar_field = is_scalar_field(table, incoming.field());
            let slot = merged
                .iter()
                .position(|existing| existing.merge(incoming, scalar_field).is_some());
            match slot {
                Some(idx) => {
                    if let Some(combined) = merged[idx].merge(incoming, scalar_field) {
                        merged[idx] = combined;
                    }
                }
                None => merged.push(incoming.clone()),
            }
        }
        FilterSpec { predicates: merged }
    }
}

fn is_scalar_field(table: &Table, field: &str) -> bool {
    let declared_scalar = table
        .schema
        .kind_of(field)
        .is_some_and(|kind| kind != FieldKind::Tags);
    declared_scalar
        && !table
            .records
            .iter()
            .any(|record| matches!(record.get(field), FieldValue::List(_)))
}

impl FromIterator<Predicate> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}

/// Retain the records of `table` that satisfy every predicate of `spec`.
///
/// The input is never mutated; relative record order is preserved.
pub fn apply_filters(table: &Table, spec: &FilterSpec) -> Table {
    let records = table
        .records
        .iter()
        .filter(|record| spec.matches(record))
        .cloned()
        .collect();
    Table::new(table.schema.clone(), records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Schema};
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn article_table() -> Table {
        let schema = Schema {
            source: "news".into(),
            id_field: "uri".into(),
            time_field: "date".into(),
            columns: vec![
                Column::new("country", FieldKind::Category),
                Column::new("sentiment", FieldKind::Number),
                Column::new("date", FieldKind::Timestamp),
                Column::new("title", FieldKind::Text),
                Column::new("tags", FieldKind::Tags),
            ],
        };
        let records = vec![
            Record::new("a1")
                .with("country", FieldValue::Text("FR".into()))
                .with("sentiment", FieldValue::Number(0.5))
                .with("date", FieldValue::Timestamp(ts(5)))
                .with("title", FieldValue::Text("New LLM released".into()))
                .with("tags", FieldValue::List(vec!["nlp".into(), "llm".into()])),
            Record::new("a2")
                .with("country", FieldValue::Text("US".into()))
                .with("sentiment", FieldValue::Number(-0.2))
                .with("date", FieldValue::Timestamp(ts(20)))
                .with("title", FieldValue::Text("Model benchmarks".into()))
                .with("tags", FieldValue::List(vec!["vision".into()])),
            Record::new("a3")
                .with("country", FieldValue::Null)
                .with("sentiment", FieldValue::Null)
                .with("date", FieldValue::Null),
        ];
        Table::new(schema, records)
    }

    fn ids(table: &Table) -> Vec<&str> {
        table.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn empty_spec_is_identity() {
        let table = article_table();
        assert_eq!(apply_filters(&table, &FilterSpec::new()), table);
    }

    #[test]
    fn empty_selection_yields_empty_table() {
        let table = article_table();
        let spec = FilterSpec::new().with(Predicate::one_of("country", Vec::<String>::new()));
        let filtered = apply_filters(&table, &spec);
        assert!(filtered.is_empty());
        assert_eq!(filtered.schema, table.schema);
    }

    #[test]
    fn range_is_inclusive_and_rejects_nulls() {
        let table = article_table();
        let spec = FilterSpec::new().with(Predicate::range("sentiment", 0.0, 1.0));
        let filtered = apply_filters(&table, &spec);
        assert_eq!(ids(&filtered), vec!["a1"]);
        let spec = FilterSpec::new().with(Predicate::range("sentiment", -0.2, 0.5));
        let filtered = apply_filters(&table, &spec);
        assert_eq!(ids(&filtered), vec!["a1", "a2"]);
    }

    #[test]
    fn between_is_inclusive() {
        let table = article_table();
        let spec = FilterSpec::new().with(Predicate::between("date", ts(5), ts(19)));
        assert_eq!(ids(&apply_filters(&table, &spec)), vec!["a1"]);
        let spec = FilterSpec::new().with(Predicate::between("date", ts(5), ts(20)));
        assert_eq!(ids(&apply_filters(&table, &spec)), vec!["a1", "a2"]);
    }

    #[test]
    fn contains_is_case_insensitive_and_empty_needle_passes_all() {
        let table = article_table();
        let spec = FilterSpec::new().with(Predicate::contains("title", "llm"));
        assert_eq!(ids(&apply_filters(&table, &spec)), vec!["a1"]);
        let spec = FilterSpec::new().with(Predicate::contains("title", ""));
        assert_eq!(apply_filters(&table, &spec).len(), 3);
    }

    #[test]
    fn list_fields_match_any_selected_member() {
        let table = article_table();
        let spec = FilterSpec::new().with(Predicate::one_of("tags", ["llm", "audio"]));
        assert_eq!(ids(&apply_filters(&table, &spec)), vec!["a1"]);
    }

    #[test]
    fn filtering_does_not_mutate_source() {
        let table = article_table();
        let before = table.clone();
        let spec = FilterSpec::new().with(Predicate::one_of("country", ["US"]));
        let _ = apply_filters(&table, &spec);
        assert_eq!(table, before);
    }

    #[test]
    fn intersect_merges_same_field_predicates() {
        let table = article_table();
        let a = FilterSpec::new()
            .with(Predicate::one_of("country", ["FR", "US"]))
            .with(Predicate::range("sentiment", -1.0, 0.6));
        let b = FilterSpec::new()
            .with(Predicate::one_of("country", ["US", "DE"]))
            .with(Predicate::range("sentiment", -0.5, 1.0))
            .with(Predicate::contains("title", "model"));
        let merged = a.intersect(&b, &table);
        assert_eq!(merged.predicates().len(), 3);
        assert_eq!(merged.predicates()[0], Predicate::one_of("country", ["US"]));
        assert_eq!(merged.predicates()[1], Predicate::range("sentiment", -0.5, 0.6));
        assert_eq!(
            apply_filters(&apply_filters(&table, &a), &b),
            apply_filters(&table, &merged)
        );
    }

    #[test]
    fn intersect_keeps_both_tag_selections() {
        let table = article_table();
        let a = FilterSpec::new().with(Predicate::one_of("tags", ["nlp"]));
        let b = FilterSpec::new().with(Predicate::one_of("tags", ["llm"]));
        let merged = a.intersect(&b, &table);
        assert_eq!(merged.predicates().len(), 2);
        assert_eq!(ids(&apply_filters(&table, &merged)), vec!["a1"]);
    }

    #[test]
    fn intersect_keeps_both_selections_on_undeclared_list_field() {
        let table = Table::new(
            article_table().schema,
            vec![Record::new("a1").with(
                "topics",
                FieldValue::List(vec!["nlp".into(), "llm".into()]),
            )],
        );
        let a = FilterSpec::new().with(Predicate::one_of("topics", ["nlp"]));
        let b = FilterSpec::new().with(Predicate::one_of("topics", ["llm"]));
        let merged = a.intersect(&b, &table);
        assert_eq!(merged.predicates().len(), 2);
        assert_eq!(
            apply_filters(&apply_filters(&table, &a), &b),
            apply_filters(&table, &merged)
        );
        assert_eq!(apply_filters(&table, &merged).len(), 1);
    }

    #[test]
    fn intersect_keeps_both_selections_when_declared_category_holds_lists() {
        let table = Table::new(
            article_table().schema,
            vec![Record::new("a1").with(
                "country",
                FieldValue::List(vec!["FR".into(), "US".into()]),
            )],
        );
        let a = FilterSpec::new().with(Predicate::one_of("country", ["FR"]));
        let b = FilterSpec::new().with(Predicate::one_of("country", ["US"]));
        let merged = a.intersect(&b, &table);
        assert_eq!(merged.predicates().len(), 2);
        assert_eq!(ids(&apply_filters(&table, &merged)), vec!["a1"]);
    }
}
