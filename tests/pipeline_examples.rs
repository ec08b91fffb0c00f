use chrono::{NaiveDate, TimeZone, Utc};
use hf_explorer::config::BucketWidth;
use hf_explorer::data::{Column, FieldKind, FieldValue, Record, Schema, Table};
use hf_explorer::filter::{FilterSpec, Predicate, apply_filters};
use hf_explorer::metrics::{
    bucket_counts, category_counts, category_stats, numeric_summary, top_per_bucket,
};

fn news_table() -> Table {
    let schema = Schema {
        source: "news".into(),
        id_field: "uri".into(),
        time_field: "date".into(),
        columns: vec![
            Column::new("country", FieldKind::Category),
            Column::new("sentiment", FieldKind::Number),
            Column::new("date", FieldKind::Timestamp),
        ],
    };
    let row = |id: &str, country: &str, sentiment: f64, day: u32| {
        Record::new(id)
            .with("country", FieldValue::Text(country.into()))
            .with("sentiment", FieldValue::Number(sentiment))
            .with(
                "date",
                FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            )
    };
    Table::new(schema, vec![row("a", "FR", 0.5, 5), row("b", "US", -0.2, 20)])
}

#[test]
fn sentiment_range_then_country_counts() {
    let table = news_table();
    let spec = FilterSpec::new().with(Predicate::range("sentiment", 0.0, 1.0));
    let filtered = apply_filters(&table, &spec);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered.records[0].id, "a");

    let counts = category_counts(&filtered, "country");
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("FR"), Some(&1));
    assert_eq!(table.len(), 2);
}

#[test]
fn empty_categorical_selection_yields_empty_table() {
    let table = news_table();
    let spec = FilterSpec::new().with(Predicate::one_of("country", Vec::<String>::new()));
    let filtered = apply_filters(&table, &spec);
    assert!(filtered.is_empty());
    assert_eq!(filtered.schema, table.schema);
}

#[test]
fn top_per_bucket_keeps_higher_score_in_month() {
    let schema = Schema {
        source: "leaderboard".into(),
        id_field: "fullname".into(),
        time_field: "submission_date".into(),
        columns: vec![
            Column::new("score", FieldKind::Number),
            Column::new("submission_date", FieldKind::Timestamp),
        ],
    };
    let row = |id: &str, score: f64, day: u32| {
        Record::new(id).with("score", FieldValue::Number(score)).with(
            "submission_date",
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()),
        )
    };
    let table = Table::new(schema, vec![row("low", 0.8, 3), row("high", 0.9, 17)]);

    let leaders = top_per_bucket(&table, &["score"], "submission_date", BucketWidth::Month);
    assert_eq!(leaders.len(), 1);
    assert_eq!(leaders[0].record.id, "high");
    assert_eq!(leaders[0].value, 0.9);
    assert_eq!(leaders[0].bucket, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
}

#[test]
fn per_country_stats_and_daily_counts() {
    let table = news_table();
    let stats = category_stats(&table, "country", "sentiment");
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].key, "FR");
    assert_eq!(stats[0].mean, Some(0.5));

    let daily = bucket_counts(&table, "date", BucketWidth::Day);
    assert_eq!(daily.len(), 2);
    let monthly = bucket_counts(&table, "date", BucketWidth::Month);
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].count, 2);

    let summary = numeric_summary(&table, "sentiment").unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.min, -0.2);
    assert_eq!(summary.max, 0.5);
}
