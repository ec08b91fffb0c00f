/// Stable record identifier within one source.
/// Examples: `meta-llama/Llama-3.1-8B`, `8123456789`
pub type RecordId = String;
/// Identifier for the source that produced a table.
/// Examples: `hub_models`, `hub_datasets`, `leaderboard`, `news`
pub type SourceId = String;
/// Name of a column in a normalized table.
/// Examples: `downloads`, `submission_date`, `country`
pub type FieldName = String;
/// Categorical value used by membership filters and counts.
/// Examples: `France`, `bfloat16`, `text-generation`
pub type CategoryValue = String;
/// Query parameter key or value used in cache keys.
/// Examples: `limit`, `10000`, `open-llm-leaderboard/contents`
pub type QueryParam = String;
/// Metric name used in melted aggregate views.
/// Examples: `score`, `IFEval`, `MMLU-PRO`
pub type MetricName = String;
