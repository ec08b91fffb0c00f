/// Constants used by HTTP fetching, retry, and caching.
pub mod fetch {
    /// Default cache time-to-live for fetched tables, in seconds.
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
    /// Default number of attempts (first call included) for one upstream request.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Backoff applied before the second attempt, in milliseconds.
    pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 250;
    /// Upper bound for any single backoff sleep, in milliseconds.
    pub const DEFAULT_MAX_BACKOFF_MS: u64 = 4_000;
    /// Global per-request timeout, in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
    /// Largest response body accepted from any endpoint.
    pub const DEFAULT_MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;
    /// HTTP status codes that are retried in addition to 5xx responses.
    pub const RETRYABLE_STATUS: &[u16] = &[408, 429];
}

/// Constants used by the Hugging Face Hub listing source.
pub mod hub {
    /// Base URL for Hub listing endpoints (`/models`, `/datasets`).
    pub const HUB_API_BASE: &str = "https://huggingface.co/api";
    /// Default number of listing rows requested.
    pub const DEFAULT_ROW_LIMIT: usize = 10_000;
    /// Source id for the model listing.
    pub const MODELS_SOURCE_ID: &str = "hub_models";
    /// Source id for the dataset listing.
    pub const DATASETS_SOURCE_ID: &str = "hub_datasets";

    /// Repository id (`owner/name`).
    pub const FIELD_ID: &str = "id";
    /// Owning user or organization.
    pub const FIELD_AUTHOR: &str = "author";
    /// Last commit time.
    pub const FIELD_LAST_MODIFIED: &str = "last_modified";
    /// Repository creation time; the canonical time field.
    pub const FIELD_CREATED_AT: &str = "created_at";
    /// Like count.
    pub const FIELD_LIKES: &str = "likes";
    /// Download count over the Hub's rolling window.
    pub const FIELD_DOWNLOADS: &str = "downloads";
    /// Raw tag list.
    pub const FIELD_TAGS: &str = "tags";
    /// Dataset card description.
    pub const FIELD_DESCRIPTION: &str = "description";
    /// Languages parsed from `language:` tags.
    pub const FIELD_LANGUAGES: &str = "languages";
    /// Size buckets parsed from `size_categories:` tags.
    pub const FIELD_SIZE_CATEGORIES: &str = "size_categories";
    /// Model task, e.g. `text-generation`.
    pub const FIELD_PIPELINE_TAG: &str = "pipeline_tag";
    /// Model library, e.g. `transformers`.
    pub const FIELD_LIBRARY: &str = "library_name";
}

/// Constants used by the Open LLM Leaderboard source.
pub mod leaderboard {
    /// Datasets-server rows endpoint.
    pub const ROWS_ENDPOINT: &str = "https://datasets-server.huggingface.co/rows";
    /// Leaderboard dataset id.
    pub const DATASET: &str = "open-llm-leaderboard/contents";
    /// Dataset config name.
    pub const CONFIG: &str = "default";
    /// Dataset split name.
    pub const SPLIT: &str = "train";
    /// Largest page the rows endpoint serves per call.
    pub const MAX_PAGE_LENGTH: usize = 100;
    /// Source id for leaderboard tables.
    pub const SOURCE_ID: &str = "leaderboard";

    /// Full model name; the record id.
    pub const FIELD_ID: &str = "fullname";
    /// Model type label (pretrained, fine-tuned, ...).
    pub const FIELD_TYPE: &str = "type";
    /// Visible text of the model link cell.
    pub const FIELD_MODEL_NAME: &str = "model_name";
    /// Href of the model link cell.
    pub const FIELD_MODEL_LINK: &str = "model_link";
    /// Day the model was submitted; the canonical time field.
    pub const FIELD_SUBMISSION_DATE: &str = "submission_date";
    /// Average benchmark score.
    pub const FIELD_SCORE: &str = "score";
    /// Weight precision, e.g. `bfloat16`.
    pub const FIELD_PRECISION: &str = "precision";

    /// Benchmark metric columns carried through unchanged.
    pub const BENCHMARK_METRICS: &[&str] =
        &["IFEval", "BBH", "MATH Lvl 5", "GPQA", "MUSR", "MMLU-PRO"];

    /// Upstream column name -> normalized field name.
    pub const COLUMN_RENAMES: &[(&str, &str)] = &[
        ("Type", FIELD_TYPE),
        ("Model", FIELD_MODEL_NAME),
        ("Submission Date", FIELD_SUBMISSION_DATE),
        ("Average ⬆️", FIELD_SCORE),
        ("Precision", FIELD_PRECISION),
    ];
}

/// Constants used by the Event Registry news source.
pub mod news {
    /// Article search endpoint.
    pub const ARTICLES_ENDPOINT: &str = "https://eventregistry.org/api/v1/article/getArticles";
    /// Environment variable holding the Event Registry API key.
    pub const API_KEY_ENV: &str = "EVENT_REGISTRY_API_KEY";
    /// Largest page the article endpoint serves per call.
    pub const MAX_ARTICLES_PER_PAGE: usize = 100;
    /// Source id for news tables.
    pub const SOURCE_ID: &str = "news";

    /// Event Registry article uri; the record id.
    pub const FIELD_URI: &str = "uri";
    /// Article language code.
    pub const FIELD_LANG: &str = "lang";
    /// Canonical article URL.
    pub const FIELD_URL: &str = "url";
    /// Sentiment score in `[-1, 1]`.
    pub const FIELD_SENTIMENT: &str = "sentiment";
    /// Publication day; the canonical time field.
    pub const FIELD_DATE: &str = "date";
    /// Relevance to the keyword query.
    pub const FIELD_RELEVANCE: &str = "relevance";
    /// Article headline.
    pub const FIELD_TITLE: &str = "title";
    /// Country resolved from the article location.
    pub const FIELD_COUNTRY: &str = "country";
    /// Whether Event Registry flagged the article as a duplicate.
    pub const FIELD_IS_DUPLICATE: &str = "is_duplicate";
    /// Similarity to the query.
    pub const FIELD_SIM: &str = "sim";
}

/// Constants used by credential resolution.
pub mod credentials {
    /// Optional Hugging Face access token used for Hub and datasets-server calls.
    pub const HF_TOKEN_ENV: &str = "HF_TOKEN";
}

/// Constants used by CSV export.
pub mod export {
    /// Column delimiter.
    pub const DELIMITER: char = ',';
    /// Separator used when a list value is written into one cell.
    pub const LIST_SEPARATOR: &str = ";";
}
