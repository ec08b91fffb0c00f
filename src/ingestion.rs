use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::data::Table;
use crate::errors::ExplorerError;
use crate::source::{DataSource, SourceQuery};
use crate::types::SourceId;

/// Thread-safe memo of fetched tables keyed by `SourceQuery`.
///
/// Entries expire after `ttl`. At most one fetch per key is in flight at a
/// time: concurrent callers for the same key block until the leader finishes
/// and then share its outcome, success or failure. Failures are never kept
/// for callers that arrive after the leader finished; they fetch again.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<(Mutex<FetchCacheInner>, Condvar)>,
    ttl: Duration,
}

/// Internal cache storage behind the `FetchCache` lock.
#[derive(Default)]
struct FetchCacheInner {
    slots: HashMap<SourceQuery, Slot>,
    stats: FetchCacheStats,
    next_generation: u64,
}

enum Slot {
    Ready {
        table: Arc<Table>,
        fetched_at: Instant,
    },
    /// A leader is fetching; `waiters` callers are blocked on this generation.
    InFlight { generation: u64, waiters: usize },
    /// The leader of `generation` failed; held until every waiter has read it.
    Failed {
        generation: u64,
        error: ExplorerError,
        unread: usize,
    },
}

enum Lookup {
    Fresh(Arc<Table>),
    Pending(u64),
    SharedFailure { error: ExplorerError, last: bool },
    Missing,
}

/// Hit/miss counters for a `FetchCache`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchCacheStats {
    /// Lookups served from a fresh entry (including waiters of a leader).
    pub hits: u64,
    /// Lookups that ran the fetch.
    pub misses: u64,
    /// Fetches that returned an error.
    pub failures: u64,
    /// Waiters that received the error of the leader they waited on.
    pub shared_failures: u64,
}

/// Removes an in-flight marker if the leader unwinds before completing.
struct InFlightGuard<'a> {
    cache: &'a FetchCache,
    key: Option<(SourceQuery, u64)>,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.key = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let Some((key, generation)) = self.key.take() else {
            return;
        };
        let (lock, cvar) = &*self.cache.inner;
        if let Ok(mut inner) = lock.lock() {
            if matches!(
                inner.slots.get(&key),
                Some(Slot::InFlight { generation: current, .. }) if *current == generation
            ) {
                inner.slots.remove(&key);
            }
        }
        cvar.notify_all();
    }
}

impl FetchCache {
    /// Create a cache whose entries stay valid for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new((Mutex::new(FetchCacheInner::default()), Condvar::new())),
            ttl,
        }
    }

    /// Validity window of stored entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, FetchCacheInner> {
        self.inner.0.lock().expect("fetch cache poisoned")
    }

    /// Return the cached table for `key`, or run `fetch` to produce it.
    ///
    /// Only successful results are stored. Callers blocked on a failing
    /// leader get a copy of its error instead of fetching again.
    pub fn get_or_fetch<F>(&self, key: &SourceQuery, fetch: F) -> Result<Arc<Table>, ExplorerError>
    where
        F: FnOnce() -> Result<Table, ExplorerError>,
    {
        let (_, cvar) = &*self.inner;
        let mut inner = self.lock();
        let mut waiting_on: Option<u64> = None;
        loop {
            let lookup = match inner.slots.get_mut(key) {
                Some(Slot::Ready { table, fetched_at }) if fetched_at.elapsed() < self.ttl => {
                    Lookup::Fresh(Arc::clone(table))
                }
                Some(Slot::InFlight {
                    generation,
                    waiters,
                }) => {
                    if waiting_on != Some(*generation) {
                        *waiters += 1;
                        waiting_on = Some(*generation);
                    }
                    Lookup::Pending(*generation)
                }
                Some(Slot::Failed {
                    generation,
                    error,
                    unread,
                }) if waiting_on == Some(*generation) => {
                    *unread = unread.saturating_sub(1);
                    Lookup::SharedFailure {
                        error: error.clone(),
                        last: *unread == 0,
                    }
                }
                _ => Lookup::Missing,
            };
            match lookup {
                Lookup::Fresh(table) => {
                    inner.stats.hits += 1;
                    debug!("[hf_explorer:cache] hit for {}", key);
                    return Ok(table);
                }
                Lookup::SharedFailure { error, last } => {
                    if last {
                        inner.slots.remove(key);
                    }
                    inner.stats.shared_failures += 1;
                    debug!("[hf_explorer:cache] sharing failed fetch for {}", key);
                    return Err(error);
                }
                Lookup::Pending(generation) => {
                    debug!(
                        "[hf_explorer:cache] waiting on in-flight fetch #{} for {}",
                        generation, key
                    );
                    inner = cvar.wait(inner).expect("fetch cache poisoned");
                }
                Lookup::Missing => break,
            }
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.slots.insert(
            key.clone(),
            Slot::InFlight {
                generation,
                waiters: 0,
            },
        );
        inner.stats.misses += 1;
        drop(inner);

        let guard = InFlightGuard {
            cache: self,
            key: Some((key.clone(), generation)),
        };
        info!("[hf_explorer:cache] miss for {}; fetching", key);
        let started = Instant::now();
        let result = fetch();
        guard.disarm();

        let mut inner = self.lock();
        let waiters = match inner.slots.get(key) {
            Some(Slot::InFlight {
                generation: current,
                waiters,
            }) if *current == generation => *waiters,
            _ => 0,
        };
        let outcome = match result {
            Ok(table) => {
                let table = Arc::new(table);
                debug!(
                    "[hf_explorer:cache] stored {} rows for {} in {}ms",
                    table.len(),
                    key,
                    started.elapsed().as_millis()
                );
                inner.slots.insert(
                    key.clone(),
                    Slot::Ready {
                        table: Arc::clone(&table),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(table)
            }
            Err(err) => {
                inner.stats.failures += 1;
                if waiters > 0 {
                    inner.slots.insert(
                        key.clone(),
                        Slot::Failed {
                            generation,
                            error: err.clone(),
                            unread: waiters,
                        },
                    );
                } else {
                    inner.slots.remove(key);
                }
                Err(err)
            }
        };
        drop(inner);
        cvar.notify_all();
        outcome
    }

    /// Drop the entry for `key` so the next lookup refetches.
    pub fn invalidate(&self, key: &SourceQuery) {
        let mut inner = self.lock();
        if matches!(inner.slots.get(key), Some(Slot::Ready { .. })) {
            inner.slots.remove(key);
        }
    }

    /// Drop every stored entry. In-flight fetches still complete normally.
    pub fn clear(&self) {
        self.lock()
            .slots
            .retain(|_, slot| !matches!(slot, Slot::Ready { .. }));
    }

    /// Number of stored (ready) entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// True when no ready entry is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> FetchCacheStats {
        self.lock().stats
    }
}

/// Last-fetch telemetry captured per source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceFetchStats {
    /// Duration of the most recent successful or failed call, in milliseconds.
    pub last_fetch_ms: u128,
    /// Rows in the most recent successful result.
    pub last_record_count: usize,
    /// Last fetch error message, if any.
    pub last_error: Option<String>,
    /// Total failed calls for this source.
    pub error_count: u64,
}

/// A data source bound to a shared `FetchCache`.
///
/// Empty results are reported as `SourceUnavailable` and never cached.
#[derive(Clone)]
pub struct CachedFetcher {
    source: Arc<dyn DataSource>,
    cache: FetchCache,
    stats: Arc<Mutex<SourceFetchStats>>,
}

impl CachedFetcher {
    /// Bind `source` to `cache`. Clones of one cache share entries.
    pub fn new(source: Arc<dyn DataSource>, cache: FetchCache) -> Self {
        Self {
            source,
            cache,
            stats: Arc::new(Mutex::new(SourceFetchStats::default())),
        }
    }

    /// The wrapped source.
    pub fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    /// Id of the wrapped source.
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// The shared cache.
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch the source's default query.
    pub fn fetch_default(&self) -> Result<Arc<Table>, ExplorerError> {
        self.fetch(&self.source.default_query())
    }

    /// Fetch `query` through the cache.
    pub fn fetch(&self, query: &SourceQuery) -> Result<Arc<Table>, ExplorerError> {
        if query.source_id != self.source.id() {
            return Err(ExplorerError::Configuration(format!(
                "query for source '{}' sent to fetcher for '{}'",
                query.source_id,
                self.source.id()
            )));
        }
        let started = Instant::now();
        let result = self.cache.get_or_fetch(query, || {
            let table = self.source.fetch(query)?;
            if table.is_empty() {
                return Err(ExplorerError::SourceUnavailable {
                    source_id: self.source.id().to_string(),
                    reason: format!("query {query} returned no records"),
                });
            }
            Ok(table)
        });
        self.record(&result, started.elapsed());
        result
    }

    fn record(&self, result: &Result<Arc<Table>, ExplorerError>, elapsed: Duration) {
        let mut stats = self.stats.lock().expect("fetch stats poisoned");
        stats.last_fetch_ms = elapsed.as_millis();
        match result {
            Ok(table) => {
                stats.last_record_count = table.len();
                stats.last_error = None;
            }
            Err(err) => {
                stats.last_record_count = 0;
                stats.last_error = Some(err.to_string());
                stats.error_count = stats.error_count.saturating_add(1);
                warn!(
                    "[hf_explorer:cache] source '{}' fetch failed: {}",
                    self.source.id(),
                    err
                );
            }
        }
    }

    /// Copy of the telemetry for this source.
    pub fn fetch_stats(&self) -> SourceFetchStats {
        self.stats.lock().expect("fetch stats poisoned").clone()
    }
}

/// Fetch every source's default query concurrently, one thread per source.
///
/// Returns per-source row counts or errors in input order.
pub fn warm_all(fetchers: &[CachedFetcher]) -> Vec<(SourceId, Result<usize, ExplorerError>)> {
    thread::scope(|scope| {
        let handles: Vec<_> = fetchers
            .iter()
            .map(|fetcher| scope.spawn(move || fetcher.fetch_default().map(|table| table.len())))
            .collect();
        handles
            .into_iter()
            .zip(fetchers)
            .map(|(handle, fetcher)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ExplorerError::SourceUnavailable {
                        source_id: fetcher.source_id().to_string(),
                        reason: "fetch thread panicked".into(),
                    })
                });
                (fetcher.source_id().to_string(), result)
            })
            .collect()
    })
}
