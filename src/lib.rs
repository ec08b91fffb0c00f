#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runner behind the `hf_explorer` binary.
pub mod apps;
/// Fetch, source, and credential configuration.
pub mod config;
/// Centralized constants used by sources, fetching, and export.
pub mod constants;
/// Record, table, and schema types.
pub mod data;
/// CSV export of filtered tables.
pub mod export;
/// Predicate filtering.
pub mod filter;
/// TTL fetch cache with single-flight per query.
pub mod ingestion;
/// Aggregate views over filtered tables.
pub mod metrics;
/// Page layouts and the dashboard pipeline.
pub mod pipeline;
/// Data source traits and built-in sources.
pub mod source;
/// HTTP transports used by sources.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Text helpers.
pub mod utils;
/// Immutable dashboard view state.
pub mod view;

mod errors;

pub use config::{
    BucketWidth, Credentials, ExplorerConfig, FetchConfig, HubListingConfig, HubListingKind,
    LeaderboardConfig, NewsConfig, RetryPolicy,
};
pub use data::{Column, FieldKind, FieldValue, Record, Schema, Table};
pub use errors::ExplorerError;
pub use export::{to_csv, write_csv};
pub use filter::{FilterSpec, Predicate, apply_filters};
pub use ingestion::{CachedFetcher, FetchCache, FetchCacheStats};
pub use metrics::{category_counts, cumulative, top_per_bucket};
pub use pipeline::{AggregateView, Dashboard, DashboardView, PageLayout};
pub use source::{
    DataSource, HubListingSource, InMemorySource, LeaderboardSource, NewsSource, SourceQuery,
};
pub use types::{CategoryValue, FieldName, MetricName, RecordId, SourceId};
pub use view::{Page, UiEvent, ViewState};
