//! Data source interfaces and the in-memory source.
//!
//! Ownership model:
//! - `DataSource` fetches one raw payload and normalizes it into a `Table`.
//! - `RecordNormalizer` (see `row_view`) owns the per-source flattening rules.
//! - `CachedFetcher` (see `ingestion`) owns memoization and single-flight.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::data::{Schema, Table};
use crate::errors::ExplorerError;
use crate::types::{QueryParam, SourceId};

/// Normalization contract and JSON coercion helpers.
pub mod row_view;
/// Source implementation modules.
pub mod sources;
/// Utility helpers used by source implementations.
pub mod utilities;

pub use row_view::{NormalizedBatch, RecordNormalizer, normalize_batch};
pub use sources::{HubListingSource, LeaderboardSource, NewsSource};

/// Source identity plus the full parameter set of one fetch.
///
/// This is the cache key: two queries are the same fetch exactly when the
/// source id and every parameter match. Parameters are kept sorted so the
/// key does not depend on insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceQuery {
    /// Source the query is addressed to.
    pub source_id: SourceId,
    /// Request parameters, stringified.
    pub params: BTreeMap<QueryParam, QueryParam>,
}

impl SourceQuery {
    /// Query with no parameters.
    pub fn new(source_id: impl Into<SourceId>) -> Self {
        Self {
            source_id: source_id.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter (replaces an existing value).
    pub fn with_param(mut self, key: impl Into<QueryParam>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Set `key` only when `value` is present.
    pub fn with_optional(self, key: impl Into<QueryParam>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.with_param(key, value),
            None => self,
        }
    }

    /// Raw value of `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse a numeric parameter; malformed values are a configuration error.
    pub fn usize_param(&self, key: &str) -> Result<Option<usize>, ExplorerError> {
        self.param(key)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|err| {
                    ExplorerError::Configuration(format!(
                        "parameter '{key}' of source '{}' must be a non-negative integer, \
                         got '{raw}': {err}",
                        self.source_id
                    ))
                })
            })
            .transpose()
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source_id)?;
        let mut separator = '?';
        for (key, value) in &self.params {
            write!(f, "{separator}{key}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}

/// Dashboard-facing data source interface.
///
/// Implementations perform network I/O only inside `fetch`; they hold no
/// mutable state between calls.
pub trait DataSource: Send + Sync {
    /// Stable source identifier used in tables, cache keys, and logs.
    fn id(&self) -> &str;

    /// Schema of the tables this source produces.
    fn schema(&self) -> Schema;

    /// Query built from the source's configured defaults.
    fn default_query(&self) -> SourceQuery;

    /// Fetch and normalize one table for `query`.
    ///
    /// Fails with `SourceUnavailable` on transport errors, non-2xx statuses,
    /// or an unrecognized payload shape. Individually malformed records are
    /// skipped, not fatal.
    fn fetch(&self, query: &SourceQuery) -> Result<Table, ExplorerError>;
}

impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn schema(&self) -> Schema {
        (**self).schema()
    }

    fn default_query(&self) -> SourceQuery {
        (**self).default_query()
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Table, ExplorerError> {
        (**self).fetch(query)
    }
}

/// In-memory data source for tests and offline dashboards.
pub struct InMemorySource {
    table: Arc<Table>,
}

impl InMemorySource {
    /// Serve `table` for every query.
    pub fn new(table: Table) -> Self {
        Self {
            table: Arc::new(table),
        }
    }
}

impl DataSource for InMemorySource {
    fn id(&self) -> &str {
        &self.table.schema.source
    }

    fn schema(&self) -> Schema {
        self.table.schema.clone()
    }

    fn default_query(&self) -> SourceQuery {
        SourceQuery::new(self.id())
    }

    fn fetch(&self, _query: &SourceQuery) -> Result<Table, ExplorerError> {
        Ok((*self.table).clone())
    }
}
