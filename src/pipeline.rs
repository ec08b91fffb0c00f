//! One parameterized dashboard pipeline shared by every page.
//!
//! Each page is a `PageLayout` (which fields feed which aggregate views) over
//! a `CachedFetcher`. Rendering a page is: fetch through the cache, filter
//! with the current `ViewState`, then derive aggregates from the filtered
//! subset only.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{BucketWidth, ExplorerConfig, HubListingConfig, HubListingKind};
use crate::constants::{hub, leaderboard, news};
use crate::data::{Schema, Table};
use crate::errors::ExplorerError;
use crate::filter::apply_filters;
use crate::ingestion::{CachedFetcher, FetchCache};
use crate::metrics::{
    BucketCount, BucketLeader, CumulativePoint, GroupStat, NumericSummary, ScatterPoint,
    bucket_counts, bucket_stats, category_counts, category_stats, cumulative, distinct_values,
    numeric_summary, pearson_correlation, scatter_points, top_per_bucket,
};
use crate::source::{DataSource, HubListingSource, LeaderboardSource, NewsSource};
use crate::transport::http::HttpTransport;
use crate::types::{CategoryValue, FieldName, MetricName};
use crate::view::{Page, ViewState};

/// One derived view handed to the presenter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateView {
    /// Record count per category value, most frequent first.
    CategoryCounts {
        /// Heading shown above the view.
        title: String,
        /// Categorical field counted.
        field: FieldName,
        /// Count per value.
        counts: IndexMap<CategoryValue, usize>,
    },
    /// Best record per metric and time bucket.
    TopPerBucket {
        /// Heading shown above the view.
        title: String,
        /// Bucket width label (`day`, `month`, ...).
        width: String,
        /// One leader per (metric, bucket).
        leaders: Vec<BucketLeader>,
    },
    /// Running total of a metric in time order.
    Cumulative {
        /// Heading shown above the view.
        title: String,
        /// Summed metric.
        metric: MetricName,
        /// One point per contributing record.
        points: Vec<CumulativePoint>,
    },
    /// Records per time bucket.
    BucketCounts {
        /// Heading shown above the view.
        title: String,
        /// Bucket width label.
        width: String,
        /// Count per bucket, oldest first.
        counts: Vec<BucketCount>,
    },
    /// Count and mean metric per category value.
    CategoryStats {
        /// Heading shown above the view.
        title: String,
        /// Grouping field.
        category: FieldName,
        /// Averaged metric.
        metric: MetricName,
        /// One row per category value.
        stats: Vec<GroupStat<CategoryValue>>,
    },
    /// Count and mean metric per time bucket.
    BucketStats {
        /// Heading shown above the view.
        title: String,
        /// Bucket width label.
        width: String,
        /// Averaged metric.
        metric: MetricName,
        /// One row per bucket, oldest first.
        stats: Vec<GroupStat<chrono::NaiveDate>>,
    },
    /// Quartile summary of one numeric field.
    Summary {
        /// Heading shown above the view.
        title: String,
        /// Summarized field.
        field: FieldName,
        /// `None` when the field has no values after filtering.
        summary: Option<NumericSummary>,
    },
    /// Paired metric values with their correlation.
    Scatter {
        /// Heading shown above the view.
        title: String,
        /// Horizontal metric.
        x: FieldName,
        /// Vertical metric.
        y: FieldName,
        /// Records with both metrics set.
        points: Vec<ScatterPoint>,
        /// Pearson coefficient, if defined.
        correlation: Option<f64>,
    },
}

impl AggregateView {
    /// Heading of the view.
    pub fn title(&self) -> &str {
        match self {
            AggregateView::CategoryCounts { title, .. }
            | AggregateView::TopPerBucket { title, .. }
            | AggregateView::Cumulative { title, .. }
            | AggregateView::BucketCounts { title, .. }
            | AggregateView::CategoryStats { title, .. }
            | AggregateView::BucketStats { title, .. }
            | AggregateView::Summary { title, .. }
            | AggregateView::Scatter { title, .. } => title,
        }
    }
}

/// Everything the presenter needs to draw one page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardView {
    /// Page slug, as accepted by `--page`.
    pub page: String,
    /// Filtered subset of the source table.
    pub filtered: Table,
    /// Aggregates computed from `filtered`.
    pub aggregates: Vec<AggregateView>,
    /// Empty-state or configuration message shown instead of (or above) data.
    pub notice: Option<String>,
}

/// Which fields of a page's table feed which aggregate views.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    /// Page heading.
    pub title: &'static str,
    /// Text field searched by the free-text box.
    pub search_field: Option<&'static str>,
    /// Fields offered as multiselect filters.
    pub filter_fields: Vec<&'static str>,
    /// Fields rendered as category count charts.
    pub category_fields: Vec<&'static str>,
    /// Metrics for the top-per-bucket trend when the view selects none.
    pub default_metrics: Vec<&'static str>,
    /// Metric summed over time, if the page shows a running total.
    pub cumulative_metric: Option<&'static str>,
    /// Plot records per time bucket.
    pub bucket_counts: bool,
    /// (category, metric) pairs for per-category count + mean tables.
    pub category_stats: Vec<(&'static str, &'static str)>,
    /// Metric averaged per time bucket.
    pub bucket_metric: Option<&'static str>,
    /// Numeric fields given a quartile summary.
    pub summary_fields: Vec<&'static str>,
    /// (x, y) metrics plotted against each other.
    pub scatter: Option<(&'static str, &'static str)>,
}

impl PageLayout {
    /// Layout for `page`.
    pub fn for_page(page: Page) -> PageLayout {
        match page {
            Page::Home => PageLayout {
                title: "Hugging Face explorer",
                ..PageLayout::default()
            },
            Page::Models => PageLayout {
                title: "Models",
                search_field: Some(hub::FIELD_ID),
                filter_fields: vec![hub::FIELD_PIPELINE_TAG, hub::FIELD_LIBRARY, hub::FIELD_AUTHOR],
                category_fields: vec![hub::FIELD_PIPELINE_TAG, hub::FIELD_LIBRARY],
                cumulative_metric: Some(hub::FIELD_LIKES),
                bucket_counts: true,
                summary_fields: vec![hub::FIELD_LIKES, hub::FIELD_DOWNLOADS],
                scatter: Some((hub::FIELD_LIKES, hub::FIELD_DOWNLOADS)),
                ..PageLayout::default()
            },
            Page::Datasets => PageLayout {
                title: "Datasets",
                search_field: Some(hub::FIELD_ID),
                filter_fields: vec![
                    hub::FIELD_LANGUAGES,
                    hub::FIELD_SIZE_CATEGORIES,
                    hub::FIELD_AUTHOR,
                ],
                category_fields: vec![hub::FIELD_LANGUAGES, hub::FIELD_SIZE_CATEGORIES],
                bucket_counts: true,
                summary_fields: vec![hub::FIELD_LIKES, hub::FIELD_DOWNLOADS],
                scatter: Some((hub::FIELD_LIKES, hub::FIELD_DOWNLOADS)),
                ..PageLayout::default()
            },
            Page::Benchmarks => PageLayout {
                title: "Benchmarks",
                search_field: Some(leaderboard::FIELD_MODEL_NAME),
                filter_fields: vec![leaderboard::FIELD_TYPE, leaderboard::FIELD_PRECISION],
                category_fields: vec![leaderboard::FIELD_TYPE],
                default_metrics: vec![leaderboard::FIELD_SCORE],
                summary_fields: vec![leaderboard::FIELD_SCORE],
                ..PageLayout::default()
            },
            Page::News => PageLayout {
                title: "News",
                search_field: Some(news::FIELD_TITLE),
                filter_fields: vec![news::FIELD_COUNTRY, news::FIELD_LANG],
                category_fields: vec![news::FIELD_COUNTRY],
                bucket_counts: true,
                category_stats: vec![(news::FIELD_COUNTRY, news::FIELD_SENTIMENT)],
                bucket_metric: Some(news::FIELD_SENTIMENT),
                summary_fields: vec![news::FIELD_SENTIMENT],
                scatter: Some((news::FIELD_SENTIMENT, news::FIELD_RELEVANCE)),
                ..PageLayout::default()
            },
        }
    }

    /// Derive every aggregate of this layout from `filtered`.
    pub fn aggregates(&self, filtered: &Table, state: &ViewState) -> Vec<AggregateView> {
        let time_field = filtered.schema.time_field.as_str();
        let width = state.bucket();
        let width_label = bucket_label(width).to_string();
        let mut views = Vec::new();

        for field in &self.category_fields {
            views.push(AggregateView::CategoryCounts {
                title: format!("{} by {field}", self.title),
                field: field.to_string(),
                counts: category_counts(filtered, field),
            });
        }
        let metrics: Vec<&str> = if state.metrics().is_empty() {
            self.default_metrics.clone()
        } else {
            state.metrics().iter().map(String::as_str).collect()
        };
        if !metrics.is_empty() {
            views.push(AggregateView::TopPerBucket {
                title: format!("Top performer per {width_label}"),
                width: width_label.clone(),
                leaders: top_per_bucket(filtered, &metrics, time_field, width),
            });
        }
        if let Some(metric) = self.cumulative_metric {
            views.push(AggregateView::Cumulative {
                title: format!("Cumulative {metric}"),
                metric: metric.to_string(),
                points: cumulative(filtered, metric, time_field),
            });
        }
        if self.bucket_counts {
            views.push(AggregateView::BucketCounts {
                title: format!("{} per {width_label}", self.title),
                width: width_label.clone(),
                counts: bucket_counts(filtered, time_field, width),
            });
        }
        for (category, metric) in &self.category_stats {
            views.push(AggregateView::CategoryStats {
                title: format!("{metric} by {category}"),
                category: category.to_string(),
                metric: metric.to_string(),
                stats: category_stats(filtered, category, metric),
            });
        }
        if let Some(metric) = self.bucket_metric {
            views.push(AggregateView::BucketStats {
                title: format!("{metric} per {width_label}"),
                width: width_label.clone(),
                metric: metric.to_string(),
                stats: bucket_stats(filtered, time_field, metric, width),
            });
        }
        for field in &self.summary_fields {
            views.push(AggregateView::Summary {
                title: format!("{field} distribution"),
                field: field.to_string(),
                summary: numeric_summary(filtered, field),
            });
        }
        if let Some((x, y)) = self.scatter {
            let points = scatter_points(filtered, x, y);
            views.push(AggregateView::Scatter {
                title: format!("{x} vs {y}"),
                x: x.to_string(),
                y: y.to_string(),
                correlation: pearson_correlation(&points),
                points,
            });
        }
        views
    }
}

fn bucket_label(width: BucketWidth) -> &'static str {
    match width {
        BucketWidth::Day => "day",
        BucketWidth::Month => "month",
    }
}

fn home_table() -> Table {
    Table::new(
        Schema {
            source: "home".to_string(),
            id_field: "id".to_string(),
            time_field: String::new(),
            columns: Vec::new(),
        },
        Vec::new(),
    )
}

/// Page pipelines over a shared fetch cache.
pub struct Dashboard {
    fetchers: HashMap<Page, CachedFetcher>,
    cache: FetchCache,
}

impl Dashboard {
    /// Dashboard with no pages wired; see `with_source`.
    pub fn new(cache: FetchCache) -> Self {
        Self {
            fetchers: HashMap::new(),
            cache,
        }
    }

    /// Wire every data page to its upstream source over `transport`.
    pub fn from_config(config: &ExplorerConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let models = HubListingConfig {
            kind: HubListingKind::Models,
            ..config.hub.clone()
        };
        let datasets = HubListingConfig {
            kind: HubListingKind::Datasets,
            ..config.hub.clone()
        };
        let creds = &config.credentials;
        Dashboard::new(FetchCache::new(config.fetch.cache_ttl))
            .with_source(
                Page::Models,
                Arc::new(HubListingSource::new(models, &config.fetch, creds, transport.clone())),
            )
            .with_source(
                Page::Datasets,
                Arc::new(HubListingSource::new(datasets, &config.fetch, creds, transport.clone())),
            )
            .with_source(
                Page::Benchmarks,
                Arc::new(LeaderboardSource::new(
                    config.leaderboard.clone(),
                    &config.fetch,
                    creds,
                    transport.clone(),
                )),
            )
            .with_source(
                Page::News,
                Arc::new(NewsSource::new(config.news.clone(), &config.fetch, creds, transport)),
            )
    }

    /// Serve `page` from `source` through this dashboard's cache.
    pub fn with_source(mut self, page: Page, source: Arc<dyn DataSource>) -> Self {
        self.fetchers
            .insert(page, CachedFetcher::new(source, self.cache.clone()));
        self
    }

    /// Cache shared by every page.
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetcher registered for `page`; `None` for pages without data.
    pub fn fetcher(&self, page: Page) -> Option<&CachedFetcher> {
        self.fetchers.get(&page)
    }

    /// Unfiltered table for `page`.
    pub fn table(&self, page: Page) -> Result<Arc<Table>, ExplorerError> {
        let fetcher = self.fetchers.get(&page).ok_or_else(|| {
            ExplorerError::Configuration(format!("page '{page}' has no data source"))
        })?;
        fetcher.fetch_default()
    }

    /// Multiselect options for `field` on `page`, from the unfiltered table.
    pub fn options(&self, page: Page, field: &str) -> Result<Vec<CategoryValue>, ExplorerError> {
        let table = self.table(page)?;
        Ok(distinct_values(&table, field))
    }

    /// Render-ready view of `state`.
    ///
    /// Upstream failures and missing credentials do not propagate: they
    /// become an empty table plus a `notice`, so other pages stay usable.
    pub fn view(&self, state: &ViewState) -> DashboardView {
        let page = state.page();
        let layout = PageLayout::for_page(page);
        let Some(fetcher) = self.fetchers.get(&page) else {
            let notice = (page != Page::Home)
                .then(|| format!("No data source is configured for the {page} page."));
            return DashboardView {
                page: page.to_string(),
                filtered: home_table(),
                aggregates: Vec::new(),
                notice,
            };
        };

        let table = match fetcher.fetch_default() {
            Ok(table) => table,
            Err(err) => {
                warn!("[hf_explorer:dashboard] page '{}' unavailable: {}", page, err);
                return DashboardView {
                    page: page.to_string(),
                    filtered: Table::new(fetcher.source().schema(), Vec::new()),
                    aggregates: Vec::new(),
                    notice: Some(notice_for(&err)),
                };
            }
        };

        let spec = state.filter_spec(&table.schema.time_field, layout.search_field);
        let filtered = apply_filters(&table, &spec);
        debug!(
            "[hf_explorer:dashboard] page '{}' kept {}/{} rows with {} predicate(s)",
            page,
            filtered.len(),
            table.len(),
            spec.predicates().len()
        );
        let notice = filtered
            .is_empty()
            .then(|| "No records match the current filters.".to_string());
        let aggregates = layout.aggregates(&filtered, state);
        DashboardView {
            page: page.to_string(),
            filtered,
            aggregates,
            notice,
        }
    }
}

fn notice_for(err: &ExplorerError) -> String {
    match err {
        ExplorerError::MissingConfiguration(what) => {
            format!("This page needs configuration: {what}.")
        }
        ExplorerError::SourceUnavailable { source_id, reason } => {
            format!("Data from '{source_id}' is currently unavailable ({reason}). Try again later.")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, FieldKind, FieldValue, Record};
    use crate::source::InMemorySource;
    use crate::view::UiEvent;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn news_table() -> Table {
        let schema = Schema {
            source: news::SOURCE_ID.into(),
            id_field: news::FIELD_URI.into(),
            time_field: news::FIELD_DATE.into(),
            columns: vec![
                Column::new(news::FIELD_URI, FieldKind::Text),
                Column::new(news::FIELD_DATE, FieldKind::Timestamp),
                Column::new(news::FIELD_COUNTRY, FieldKind::Category),
                Column::new(news::FIELD_SENTIMENT, FieldKind::Number),
            ],
        };
        let row = |id: &str, country: &str, sentiment: f64, day: u32| {
            Record::new(id)
                .with(news::FIELD_URI, FieldValue::Text(id.into()))
                .with(
                    news::FIELD_DATE,
                    FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
                )
                .with(news::FIELD_COUNTRY, FieldValue::Text(country.into()))
                .with(news::FIELD_SENTIMENT, FieldValue::Number(sentiment))
        };
        Table::new(schema, vec![row("a", "FR", 0.5, 5), row("b", "US", -0.2, 20)])
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(FetchCache::new(Duration::from_secs(60)))
            .with_source(Page::News, Arc::new(InMemorySource::new(news_table())))
    }

    #[test]
    fn aggregates_use_filtered_subset() {
        let state = ViewState::new(Page::News).apply(UiEvent::SetRange {
            field: news::FIELD_SENTIMENT.into(),
            lo: 0.0,
            hi: 1.0,
        });
        let view = dashboard().view(&state);
        assert_eq!(view.filtered.len(), 1);
        assert_eq!(view.notice, None);
        let counts = view
            .aggregates
            .iter()
            .find_map(|agg| match agg {
                AggregateView::CategoryCounts { counts, .. } => Some(counts.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(counts.get("FR"), Some(&1));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn empty_selection_renders_empty_state() {
        let state = ViewState::new(Page::News).apply(UiEvent::Select {
            field: news::FIELD_COUNTRY.into(),
            values: vec![],
        });
        let view = dashboard().view(&state);
        assert!(view.filtered.is_empty());
        assert!(view.notice.is_some());
    }

    #[test]
    fn unwired_page_and_home_have_no_data() {
        let dash = dashboard();
        let home = dash.view(&ViewState::new(Page::Home));
        assert!(home.filtered.is_empty());
        assert_eq!(home.notice, None);
        let models = dash.view(&ViewState::new(Page::Models));
        assert!(models.notice.unwrap().contains("models"));
    }

    #[test]
    fn options_come_from_unfiltered_table() {
        let options = dashboard().options(Page::News, news::FIELD_COUNTRY).unwrap();
        assert_eq!(options, vec!["FR".to_string(), "US".to_string()]);
    }

    #[test]
    fn layouts_cover_every_page() {
        for page in Page::ALL {
            assert!(!PageLayout::for_page(page).title.is_empty());
        }
        assert_eq!(
            PageLayout::for_page(Page::Benchmarks).default_metrics,
            vec![leaderboard::FIELD_SCORE]
        );
        assert_eq!(
            PageLayout::for_page(Page::Datasets).summary_fields,
            vec![hub::FIELD_LIKES, hub::FIELD_DOWNLOADS]
        );
    }
}
