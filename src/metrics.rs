//! Aggregate views derived from a (filtered) table.
//!
//! All functions borrow their input table and return freshly built views;
//! callers are expected to pass the currently filtered subset.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::BucketWidth;
use crate::data::{Record, Table};
use crate::source::utilities::date_helpers::bucket_start;
use crate::source::utilities::grouping::{argmax_per_group, group_by_first_seen};
use crate::types::{CategoryValue, MetricName, RecordId};

/// Top record for one (metric, time bucket) pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BucketLeader {
    /// Metric the record leads on.
    pub metric: MetricName,
    /// First day of the calendar bucket.
    pub bucket: NaiveDate,
    /// The leading metric value.
    pub value: f64,
    /// The full winning record.
    pub record: Record,
}

/// One step of a running sum over time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CumulativePoint {
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
    /// Record contributing this step.
    pub record_id: RecordId,
    /// The record's own value.
    pub value: f64,
    /// Sum of values up to and including this step.
    pub running_total: f64,
}

/// Number of records whose timestamp falls in one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    /// First day of the bucket.
    pub bucket: NaiveDate,
    /// Records in the bucket.
    pub count: usize,
}

/// Record count and mean metric for one group (category or bucket).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupStat<K> {
    /// Category value or bucket start.
    pub key: K,
    /// Records in the group, including ones with a null metric.
    pub count: usize,
    /// Mean over non-null metric values; `None` when all are null.
    pub mean: Option<f64>,
}

/// Distribution summary of a numeric column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NumericSummary {
    /// Non-null values summarized.
    pub count: usize,
    /// Smallest value.
    pub min: f64,
    /// First quartile (linear interpolation).
    pub q1: f64,
    /// Second quartile.
    pub median: f64,
    /// Third quartile.
    pub q3: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

/// One (x, y) observation for scatter views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPoint {
    /// Record the point comes from.
    pub record_id: RecordId,
    /// Horizontal metric value.
    pub x: f64,
    /// Vertical metric value.
    pub y: f64,
}

/// Top performer per (metric, calendar bucket).
///
/// Each metric field is melted into its own series; records with a null
/// metric or null timestamp are dropped from that series. Within a group the
/// maximum value wins and ties keep the first-seen record. Output is ordered
/// by metric (in the order given, duplicates ignored) then bucket ascending.
pub fn top_per_bucket<S: AsRef<str>>(
    table: &Table,
    metric_fields: &[S],
    time_field: &str,
    width: BucketWidth,
) -> Vec<BucketLeader> {
    let mut seen: Vec<&str> = Vec::new();
    let mut leaders = Vec::new();
    for metric in metric_fields.iter().map(AsRef::as_ref) {
        if seen.contains(&metric) {
            continue;
        }
        seen.push(metric);
        let per_bucket = argmax_per_group(
            &table.records,
            |record: &Record| {
                record
                    .timestamp(time_field)
                    .map(|ts| bucket_start(ts, width))
            },
            |record: &Record| record.number(metric),
        );
        let mut series: Vec<BucketLeader> = per_bucket
            .into_iter()
            .map(|(bucket, (record, value))| BucketLeader {
                metric: metric.to_string(),
                bucket,
                value,
                record: record.clone(),
            })
            .collect();
        series.sort_by_key(|leader| leader.bucket);
        leaders.extend(series);
    }
    leaders
}

/// Running sum of `metric_field` ordered by `time_field` ascending.
///
/// Records with a null metric or null timestamp are skipped. Records sharing a
/// timestamp keep their table order.
pub fn cumulative(table: &Table, metric_field: &str, time_field: &str) -> Vec<CumulativePoint> {
    let mut observations: Vec<(DateTime<Utc>, &Record, f64)> = table
        .records
        .iter()
        .filter_map(|record| {
            let ts = record.timestamp(time_field)?;
            let value = record.number(metric_field)?;
            Some((ts, record, value))
        })
        .collect();
    observations.sort_by_key(|(ts, _, _)| *ts);

    let mut running_total = 0.0;
    observations
        .into_iter()
        .map(|(timestamp, record, value)| {
            running_total += value;
            CumulativePoint {
                timestamp,
                record_id: record.id.clone(),
                value,
                running_total,
            }
        })
        .collect()
}

/// Occurrences per category value.
///
/// List-valued fields count once per element (a record with three tags
/// increments three counters). Null values are skipped. Ordered by count
/// descending, then category ascending.
pub fn category_counts(table: &Table, category_field: &str) -> IndexMap<CategoryValue, usize> {
    let mut counts: IndexMap<CategoryValue, usize> = IndexMap::new();
    for record in &table.records {
        for member in record.get(category_field).members() {
            *counts.entry(member.to_string()).or_default() += 1;
        }
    }
    counts.sort_by(|key_a, count_a, key_b, count_b| {
        count_b.cmp(count_a).then_with(|| key_a.cmp(key_b))
    });
    counts
}

/// Distinct categorical values in first-seen order (multiselect options).
pub fn distinct_values(table: &Table, field: &str) -> Vec<CategoryValue> {
    let mut values: IndexMap<&str, ()> = IndexMap::new();
    for record in &table.records {
        for member in record.get(field).members() {
            values.entry(member).or_insert(());
        }
    }
    values.into_keys().map(str::to_string).collect()
}

/// Records per calendar bucket, ascending. Null timestamps are skipped.
pub fn bucket_counts(table: &Table, time_field: &str, width: BucketWidth) -> Vec<BucketCount> {
    let groups = group_by_first_seen(&table.records, |record| {
        record
            .timestamp(time_field)
            .map(|ts| bucket_start(ts, width))
    });
    let mut counts: Vec<BucketCount> = groups
        .into_iter()
        .map(|(bucket, members)| BucketCount {
            bucket,
            count: members.len(),
        })
        .collect();
    counts.sort_by_key(|entry| entry.bucket);
    counts
}

/// Count and mean metric per category, ordered by category ascending.
///
/// List-valued categories contribute the record to every member group.
pub fn category_stats(
    table: &Table,
    category_field: &str,
    metric_field: &str,
) -> Vec<GroupStat<CategoryValue>> {
    let mut groups: IndexMap<&str, Accumulator> = IndexMap::new();
    for record in &table.records {
        let metric = record.number(metric_field);
        for member in record.get(category_field).members() {
            groups.entry(member).or_default().push(metric);
        }
    }
    let mut stats: Vec<GroupStat<CategoryValue>> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key.to_string()))
        .collect();
    stats.sort_by(|a, b| a.key.cmp(&b.key));
    stats
}

/// Count and mean metric per calendar bucket, ascending. Null timestamps are skipped.
pub fn bucket_stats(
    table: &Table,
    time_field: &str,
    metric_field: &str,
    width: BucketWidth,
) -> Vec<GroupStat<NaiveDate>> {
    let mut groups: IndexMap<NaiveDate, Accumulator> = IndexMap::new();
    for record in &table.records {
        if let Some(ts) = record.timestamp(time_field) {
            groups
                .entry(bucket_start(ts, width))
                .or_default()
                .push(record.number(metric_field));
        }
    }
    let mut stats: Vec<GroupStat<NaiveDate>> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect();
    stats.sort_by_key(|stat| stat.key);
    stats
}

/// Count, quartiles, and mean of the non-null values of `field`.
///
/// Quartiles use linear interpolation between closest ranks. Returns `None`
/// when the column has no numeric values.
pub fn numeric_summary(table: &Table, field: &str) -> Option<NumericSummary> {
    let mut values: Vec<f64> = table
        .records
        .iter()
        .filter_map(|record| record.number(field))
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    Some(NumericSummary {
        count,
        min: values[0],
        q1: quantile_sorted(&values, 0.25),
        median: quantile_sorted(&values, 0.5),
        q3: quantile_sorted(&values, 0.75),
        max: values[count - 1],
        mean,
    })
}

/// Paired observations of two numeric fields; records missing either are skipped.
pub fn scatter_points(table: &Table, x_field: &str, y_field: &str) -> Vec<ScatterPoint> {
    table
        .records
        .iter()
        .filter_map(|record| {
            Some(ScatterPoint {
                record_id: record.id.clone(),
                x: record.number(x_field)?,
                y: record.number(y_field)?,
            })
        })
        .collect()
}

/// Pearson correlation coefficient of scatter points.
///
/// Returns `None` for fewer than two points or when either axis is constant.
pub fn pearson_correlation(points: &[ScatterPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for point in points {
        let dx = point.x - mean_x;
        let dy = point.y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    non_null: usize,
}

impl Accumulator {
    fn push(&mut self, metric: Option<f64>) {
        self.count += 1;
        if let Some(value) = metric {
            self.sum += value;
            self.non_null += 1;
        }
    }

    fn finish<K>(self, key: K) -> GroupStat<K> {
        GroupStat {
            key,
            count: self.count,
            mean: (self.non_null > 0).then(|| self.sum / self.non_null as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, FieldKind, FieldValue, Schema};
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> FieldValue {
        FieldValue::Timestamp(Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap())
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn leaderboard() -> Table {
        let schema = Schema {
            source: "leaderboard".into(),
            id_field: "fullname".into(),
            time_field: "submission_date".into(),
            columns: vec![
                Column::new("score", FieldKind::Number),
                Column::new("BBH", FieldKind::Number),
                Column::new("type", FieldKind::Category),
                Column::new("submission_date", FieldKind::Timestamp),
            ],
        };
        let row = |id: &str, score: FieldValue, bbh: FieldValue, ty: &str, when: FieldValue| {
            Record::new(id)
                .with("score", score)
                .with("BBH", bbh)
                .with("type", FieldValue::Text(ty.into()))
                .with("submission_date", when)
        };
        Table::new(
            schema,
            vec![
                row("m1", FieldValue::Number(0.8), FieldValue::Number(0.4), "chat", at(2024, 1, 3)),
                row("m2", FieldValue::Number(0.9), FieldValue::Null, "base", at(2024, 1, 25)),
                row(
                    "m3",
                    FieldValue::Number(0.9),
                    FieldValue::Number(0.7),
                    "chat",
                    at(2024, 1, 28),
                ),
                row("m4", FieldValue::Number(0.5), FieldValue::Number(0.9), "base", at(2024, 2, 2)),
                row("m5", FieldValue::Null, FieldValue::Number(0.95), "chat", FieldValue::Null),
            ],
        )
    }

    #[test]
    fn top_per_bucket_keeps_max_per_metric_and_month() {
        let leaders = top_per_bucket(
            &leaderboard(),
            &["score", "BBH"],
            "submission_date",
            BucketWidth::Month,
        );
        let summary: Vec<(&str, NaiveDate, f64, &str)> = leaders
            .iter()
            .map(|l| (l.metric.as_str(), l.bucket, l.value, l.record.id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("score", date(2024, 1, 1), 0.9, "m2"),
                ("score", date(2024, 2, 1), 0.5, "m4"),
                ("BBH", date(2024, 1, 1), 0.7, "m3"),
                ("BBH", date(2024, 2, 1), 0.9, "m4"),
            ]
        );
    }

    #[test]
    fn top_per_bucket_daily_buckets_and_duplicate_metrics() {
        let leaders = top_per_bucket(
            &leaderboard(),
            &["score", "score"],
            "submission_date",
            BucketWidth::Day,
        );
        assert_eq!(leaders.len(), 4);
        assert!(leaders.windows(2).all(|pair| pair[0].bucket < pair[1].bucket));
    }

    #[test]
    fn cumulative_sorts_by_time_and_skips_nulls() {
        let points = cumulative(&leaderboard(), "BBH", "submission_date");
        let totals: Vec<(&str, f64)> = points
            .iter()
            .map(|p| (p.record_id.as_str(), p.running_total))
            .collect();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].0, "m1");
        assert_eq!(totals[1].0, "m3");
        assert_eq!(totals[2].0, "m4");
        assert!((totals[2].1 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn category_counts_orders_by_count_then_name() {
        let counts = category_counts(&leaderboard(), "type");
        let ordered: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(ordered, vec![("chat", 3), ("base", 2)]);
    }

    #[test]
    fn category_counts_count_each_tag() {
        let schema = Schema {
            source: "hub_models".into(),
            id_field: "id".into(),
            time_field: "created_at".into(),
            columns: vec![Column::new("tags", FieldKind::Tags)],
        };
        let table = Table::new(
            schema,
            vec![
                Record::new("a").with(
                    "tags",
                    FieldValue::List(vec!["nlp".into(), "en".into(), "llm".into()]),
                ),
                Record::new("b").with("tags", FieldValue::List(vec!["nlp".into()])),
                Record::new("c"),
            ],
        );
        let counts = category_counts(&table, "tags");
        assert_eq!(counts.values().sum::<usize>(), 4);
        assert_eq!(counts["nlp"], 2);
        assert_eq!(distinct_values(&table, "tags"), vec!["nlp", "en", "llm"]);
    }

    #[test]
    fn bucket_counts_group_by_month() {
        let counts = bucket_counts(&leaderboard(), "submission_date", BucketWidth::Month);
        assert_eq!(
            counts,
            vec![
                BucketCount { bucket: date(2024, 1, 1), count: 3 },
                BucketCount { bucket: date(2024, 2, 1), count: 1 },
            ]
        );
    }

    #[test]
    fn group_stats_count_all_and_average_non_null() {
        let stats = category_stats(&leaderboard(), "type", "BBH");
        assert_eq!(stats[0].key, "base");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].mean, Some(0.9));
        assert_eq!(stats[1].key, "chat");
        assert_eq!(stats[1].count, 3);

        let per_month =
            bucket_stats(&leaderboard(), "submission_date", "score", BucketWidth::Month);
        assert_eq!(per_month.len(), 2);
        assert_eq!(per_month[0].count, 3);
        let mean = per_month[0].mean.unwrap();
        assert!((mean - (0.8 + 0.9 + 0.9) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_summary_interpolates_quartiles() {
        let summary = numeric_summary(&leaderboard(), "score").unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 0.5);
        assert_eq!(summary.max, 0.9);
        assert!((summary.median - 0.85).abs() < 1e-9);
        assert!((summary.q1 - 0.725).abs() < 1e-9);
        assert!(numeric_summary(&leaderboard(), "missing").is_none());
    }

    #[test]
    fn pearson_correlation_detects_linear_relation() {
        let points: Vec<ScatterPoint> = (0..5)
            .map(|i| ScatterPoint {
                record_id: i.to_string(),
                x: i as f64,
                y: 2.0 * i as f64 + 1.0,
            })
            .collect();
        let r = pearson_correlation(&points).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
        assert!(pearson_correlation(&points[..1]).is_none());

        let scatter = scatter_points(&leaderboard(), "score", "BBH");
        assert_eq!(scatter.len(), 3);
    }
}
