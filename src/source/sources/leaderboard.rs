use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::hub::json_kind;
use crate::config::{Credentials, FetchConfig, LeaderboardConfig, RetryPolicy};
use crate::constants::leaderboard::*;
use crate::data::{Column, FieldKind, FieldValue, Record, Schema, Table};
use crate::errors::ExplorerError;
use crate::source::row_view::{
    RecordNormalizer, json_identifier, json_number, json_text, json_timestamp, malformed,
    normalize_batch,
};
use crate::source::utilities::markup::extract_first_link;
use crate::source::{DataSource, SourceQuery};
use crate::transport::http::{HttpRequest, HttpTransport, send_with_retry};

const PARAM_DATASET: &str = "dataset";
const PARAM_CONFIG: &str = "config";
const PARAM_SPLIT: &str = "split";
const PARAM_LENGTH: &str = "length";
const PARAM_LIMIT: &str = "limit";

/// Flattens leaderboard rows.
///
/// Upstream display columns are renamed (`Average ⬆️` -> `score`, ...), the
/// `Model` cell is split into a plain name and a link, and the benchmark
/// metric columns are coerced to numbers under their original names.
#[derive(Clone, Debug, Default)]
pub struct LeaderboardNormalizer;

impl LeaderboardNormalizer {
    fn renamed<'a>(row: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
        COLUMN_RENAMES
            .iter()
            .find(|(_, target)| *target == field)
            .and_then(|(upstream, _)| row.get(*upstream))
            .or_else(|| row.get(field))
    }
}

impl RecordNormalizer for LeaderboardNormalizer {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn schema(&self) -> Schema {
        let mut columns = vec![
            Column::new(FIELD_ID, FieldKind::Text),
            Column::new(FIELD_TYPE, FieldKind::Category),
            Column::new(FIELD_MODEL_NAME, FieldKind::Text),
            Column::new(FIELD_MODEL_LINK, FieldKind::Link),
            Column::new(FIELD_SUBMISSION_DATE, FieldKind::Timestamp),
            Column::new(FIELD_SCORE, FieldKind::Number),
            Column::new(FIELD_PRECISION, FieldKind::Category),
        ];
        columns.extend(
            BENCHMARK_METRICS
                .iter()
                .map(|metric| Column::new(*metric, FieldKind::Number)),
        );
        Schema {
            source: SOURCE_ID.to_string(),
            id_field: FIELD_ID.to_string(),
            time_field: FIELD_SUBMISSION_DATE.to_string(),
            columns,
        }
    }

    fn normalize(&self, raw: &Value, row_index: usize) -> Result<Record, ExplorerError> {
        // Rows API wraps each row as {"row_idx": n, "row": {...}}.
        let row = raw
            .get("row")
            .unwrap_or(raw)
            .as_object()
            .ok_or_else(|| {
                malformed(SOURCE_ID, format!("row {row_index} is not a JSON object"))
            })?;

        let (model_name, model_link) = match Self::renamed(row, FIELD_MODEL_NAME) {
            Some(Value::String(cell)) => {
                let link = extract_first_link(cell);
                let href = if link.href.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(link.href)
                };
                (
                    FieldValue::text_or_null(Some(link.text).filter(|text| !text.is_empty())),
                    href,
                )
            }
            _ => (FieldValue::Null, FieldValue::Null),
        };

        let id = json_identifier(row.get(FIELD_ID))
            .or_else(|| model_name.as_text().map(str::to_string))
            .unwrap_or_else(|| format!("row-{row_index}"));

        let mut record = Record::new(id.clone())
            .with(FIELD_ID, FieldValue::Text(id))
            .with(FIELD_TYPE, json_text(Self::renamed(row, FIELD_TYPE)))
            .with(FIELD_MODEL_NAME, model_name)
            .with(FIELD_MODEL_LINK, model_link)
            .with(
                FIELD_SUBMISSION_DATE,
                json_timestamp(Self::renamed(row, FIELD_SUBMISSION_DATE)),
            )
            .with(FIELD_SCORE, json_number(Self::renamed(row, FIELD_SCORE)))
            .with(FIELD_PRECISION, json_text(Self::renamed(row, FIELD_PRECISION)));
        for metric in BENCHMARK_METRICS {
            record.set(*metric, json_number(row.get(*metric)));
        }
        Ok(record)
    }
}

/// Leaderboard contents read page by page from the datasets-server rows API.
pub struct LeaderboardSource {
    config: LeaderboardConfig,
    retry: RetryPolicy,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl LeaderboardSource {
    /// Build the source with the shared retry policy.
    pub fn new(
        config: LeaderboardConfig,
        fetch: &FetchConfig,
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            retry: fetch.retry.clone(),
            token: credentials.hf_token.clone(),
            transport,
        }
    }

    fn unavailable(&self, reason: String) -> ExplorerError {
        ExplorerError::SourceUnavailable {
            source_id: SOURCE_ID.to_string(),
            reason,
        }
    }
}

impl DataSource for LeaderboardSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn schema(&self) -> Schema {
        LeaderboardNormalizer.schema()
    }

    fn default_query(&self) -> SourceQuery {
        SourceQuery::new(SOURCE_ID)
            .with_param(PARAM_DATASET, &self.config.dataset)
            .with_param(PARAM_CONFIG, &self.config.config)
            .with_param(PARAM_SPLIT, &self.config.split)
            .with_param(PARAM_LENGTH, self.config.page_length)
            .with_optional(PARAM_LIMIT, self.config.row_limit)
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Table, ExplorerError> {
        let dataset = query.param(PARAM_DATASET).unwrap_or(&self.config.dataset);
        let config = query.param(PARAM_CONFIG).unwrap_or(&self.config.config);
        let split = query.param(PARAM_SPLIT).unwrap_or(&self.config.split);
        let length = query
            .usize_param(PARAM_LENGTH)?
            .unwrap_or(self.config.page_length)
            .clamp(1, MAX_PAGE_LENGTH);
        let limit = query.usize_param(PARAM_LIMIT)?.or(self.config.row_limit);

        let mut rows: Vec<Value> = Vec::new();
        let mut total: Option<usize> = None;
        loop {
            let offset = rows.len();
            let target = match (total, limit) {
                (Some(total), Some(limit)) => Some(total.min(limit)),
                (total, limit) => total.or(limit),
            };
            if target.is_some_and(|target| offset >= target) {
                break;
            }
            let want = target.map_or(length, |target| length.min(target - offset));
            let request = HttpRequest::get(&self.config.endpoint)
                .query(PARAM_DATASET, dataset)
                .query(PARAM_CONFIG, config)
                .query(PARAM_SPLIT, split)
                .query("offset", offset)
                .query(PARAM_LENGTH, want)
                .bearer(self.token.as_deref());
            let payload =
                send_with_retry(self.transport.as_ref(), &request, &self.retry, SOURCE_ID)?;

            let page = match payload.get("rows") {
                Some(Value::Array(page)) => page.clone(),
                Some(other) => {
                    return Err(self.unavailable(format!(
                        "expected 'rows' to be an array, got {}",
                        json_kind(other)
                    )));
                }
                None => {
                    return Err(self.unavailable(format!(
                        "response from {} has no 'rows' field",
                        self.config.endpoint
                    )));
                }
            };
            if let Some(reported) = payload.get("num_rows_total").and_then(Value::as_u64) {
                total = Some(reported as usize);
            }
            debug!(
                "[hf_explorer:leaderboard] offset={} received={} total={:?}",
                offset,
                page.len(),
                total
            );
            if page.is_empty() {
                break;
            }
            rows.extend(page);
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        let batch = normalize_batch(&LeaderboardNormalizer, &rows, 0);
        info!(
            "[hf_explorer:leaderboard] fetched {} rows from '{}' ({} skipped)",
            batch.table.len(),
            dataset,
            batch.skipped
        );
        Ok(batch.table)
    }
}
