use std::time::Duration;

use crate::constants::{credentials, fetch, hub, leaderboard, news};
use crate::errors::ExplorerError;

/// Calendar period used to group time-series aggregates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BucketWidth {
    /// One bucket per calendar day.
    Day,
    /// One bucket per calendar month.
    #[default]
    Month,
}

/// Bounded retry with capped exponential backoff for transient upstream failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Sleep before the second attempt; doubled for each later attempt.
    pub initial_backoff: Duration,
    /// Cap applied to every individual sleep.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff to sleep after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: fetch::DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(fetch::DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(fetch::DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

/// HTTP and caching behavior shared by every source.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// How long a successfully fetched table stays valid in the cache.
    pub cache_ttl: Duration,
    /// Retry policy for a single upstream request.
    pub retry: RetryPolicy,
    /// Global timeout for one HTTP request.
    pub request_timeout: Duration,
    /// Largest accepted response body in bytes.
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(fetch::DEFAULT_CACHE_TTL_SECS),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(fetch::DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: fetch::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Which Hub listing endpoint to read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HubListingKind {
    /// `/api/models`.
    #[default]
    Models,
    /// `/api/datasets`.
    Datasets,
}

impl HubListingKind {
    /// Endpoint path segment (`models` / `datasets`).
    pub fn path(self) -> &'static str {
        match self {
            HubListingKind::Models => "models",
            HubListingKind::Datasets => "datasets",
        }
    }

    /// Source id used for tables of this listing.
    pub fn source_id(self) -> &'static str {
        match self {
            HubListingKind::Models => hub::MODELS_SOURCE_ID,
            HubListingKind::Datasets => hub::DATASETS_SOURCE_ID,
        }
    }
}

/// Configuration for the Hub model/dataset listing source.
#[derive(Clone, Debug)]
pub struct HubListingConfig {
    /// Listing endpoint to read.
    pub kind: HubListingKind,
    /// Base URL for listing endpoints.
    pub api_base: String,
    /// Maximum number of rows to return.
    pub row_limit: usize,
    /// Request rows in `offset` pages of this size; `None` is one bulk request.
    pub page_size: Option<usize>,
    /// Optional free-text search forwarded to the API.
    pub search: Option<String>,
    /// Optional author/organization filter forwarded to the API.
    pub author: Option<String>,
    /// Optional sort key forwarded to the API (e.g. `downloads`).
    pub sort: Option<String>,
}

impl Default for HubListingConfig {
    fn default() -> Self {
        Self {
            kind: HubListingKind::Models,
            api_base: hub::HUB_API_BASE.to_string(),
            row_limit: hub::DEFAULT_ROW_LIMIT,
            page_size: None,
            search: None,
            author: None,
            sort: None,
        }
    }
}

/// Configuration for the leaderboard source (datasets-server rows API).
#[derive(Clone, Debug)]
pub struct LeaderboardConfig {
    /// Rows endpoint URL.
    pub endpoint: String,
    /// Dataset id.
    pub dataset: String,
    /// Dataset config name.
    pub config: String,
    /// Split name.
    pub split: String,
    /// Rows per request (clamped to the endpoint maximum).
    pub page_length: usize,
    /// Optional cap on total rows read.
    pub row_limit: Option<usize>,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            endpoint: leaderboard::ROWS_ENDPOINT.to_string(),
            dataset: leaderboard::DATASET.to_string(),
            config: leaderboard::CONFIG.to_string(),
            split: leaderboard::SPLIT.to_string(),
            page_length: leaderboard::MAX_PAGE_LENGTH,
            row_limit: None,
        }
    }
}

/// Configuration for the news article source.
#[derive(Clone, Debug)]
pub struct NewsConfig {
    /// Article search endpoint.
    pub endpoint: String,
    /// Keywords that must all appear in an article.
    pub keywords: Vec<String>,
    /// Article language code (`eng`).
    pub lang: String,
    /// Articles requested per page (clamped to the endpoint maximum).
    pub articles_per_page: usize,
    /// Maximum number of pages read per fetch.
    pub max_pages: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            endpoint: news::ARTICLES_ENDPOINT.to_string(),
            keywords: vec!["LLM".to_string(), "model".to_string()],
            lang: "eng".to_string(),
            articles_per_page: news::MAX_ARTICLES_PER_PAGE,
            max_pages: 5,
        }
    }
}

/// API credentials resolved from the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Optional Hugging Face token.
    pub hf_token: Option<String>,
    /// Event Registry API key; required by the news source.
    pub event_registry_key: Option<String>,
}

impl Credentials {
    /// Read credentials from `HF_TOKEN` and `EVENT_REGISTRY_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary lookup (blank values count as absent).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            hf_token: read(credentials::HF_TOKEN_ENV),
            event_registry_key: read(news::API_KEY_ENV),
        }
    }

    /// The Event Registry key, or `MissingConfiguration` naming the variable to set.
    pub fn require_event_registry_key(&self) -> Result<&str, ExplorerError> {
        self.event_registry_key.as_deref().ok_or_else(|| {
            ExplorerError::MissingConfiguration(format!(
                "set {} to enable the news dashboard",
                news::API_KEY_ENV
            ))
        })
    }
}

/// Top-level configuration for every dashboard source.
#[derive(Clone, Debug, Default)]
pub struct ExplorerConfig {
    /// Cache lifetime, retry policy, and body limits shared by all sources.
    pub fetch: FetchConfig,
    /// Hub listing parameters for the Models and Datasets pages.
    pub hub: HubListingConfig,
    /// Leaderboard paging parameters.
    pub leaderboard: LeaderboardConfig,
    /// Event Registry query parameters.
    pub news: NewsConfig,
    /// Tokens read from the environment.
    pub credentials: Credentials,
}

impl ExplorerConfig {
    /// Defaults plus credentials read from the environment.
    pub fn from_env() -> Self {
        Self {
            credentials: Credentials::from_env(),
            ..Self::default()
        }
    }
}
