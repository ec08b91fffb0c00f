use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::{Credentials, FetchConfig, HubListingConfig, HubListingKind, RetryPolicy};
use crate::constants::hub::*;
use crate::data::{Column, FieldKind, FieldValue, Record, Schema, Table};
use crate::errors::ExplorerError;
use crate::source::row_view::{
    RecordNormalizer, json_identifier, json_list, json_number, json_path, json_text,
    json_timestamp, malformed, normalize_batch,
};
use crate::source::{DataSource, SourceQuery};
use crate::transport::http::{HttpRequest, HttpTransport, send_with_retry};

const PARAM_LIMIT: &str = "limit";
const PARAM_PAGE_SIZE: &str = "page_size";
const FORWARDED_PARAMS: &[&str] = &["search", "author", "sort"];

/// Flattens Hub listing entries (models or datasets) into catalogue rows.
#[derive(Clone, Debug)]
pub struct HubNormalizer {
    kind: HubListingKind,
}

impl HubNormalizer {
    /// Normalizer for one listing kind.
    pub fn new(kind: HubListingKind) -> Self {
        Self { kind }
    }
}

impl RecordNormalizer for HubNormalizer {
    fn source_id(&self) -> &str {
        self.kind.source_id()
    }

    fn schema(&self) -> Schema {
        Schema {
            source: self.kind.source_id().to_string(),
            id_field: FIELD_ID.to_string(),
            time_field: FIELD_CREATED_AT.to_string(),
            columns: vec![
                Column::new(FIELD_ID, FieldKind::Text),
                Column::new(FIELD_AUTHOR, FieldKind::Category),
                Column::new(FIELD_LAST_MODIFIED, FieldKind::Timestamp),
                Column::new(FIELD_CREATED_AT, FieldKind::Timestamp),
                Column::new(FIELD_LIKES, FieldKind::Number),
                Column::new(FIELD_DOWNLOADS, FieldKind::Number),
                Column::new(FIELD_TAGS, FieldKind::Tags),
                Column::new(FIELD_DESCRIPTION, FieldKind::Text),
                Column::new(FIELD_LANGUAGES, FieldKind::Tags),
                Column::new(FIELD_SIZE_CATEGORIES, FieldKind::Tags),
                Column::new(FIELD_PIPELINE_TAG, FieldKind::Category),
                Column::new(FIELD_LIBRARY, FieldKind::Category),
            ],
        }
    }

    fn normalize(&self, raw: &Value, row_index: usize) -> Result<Record, ExplorerError> {
        if !raw.is_object() {
            return Err(malformed(
                self.source_id(),
                format!("listing entry {row_index} is not a JSON object"),
            ));
        }
        let id = json_identifier(raw.get("id"))
            .or_else(|| json_identifier(raw.get("modelId")))
            .ok_or_else(|| {
                malformed(
                    self.source_id(),
                    format!("listing entry {row_index} has no id"),
                )
            })?;
        Ok(Record::new(id.clone())
            .with(FIELD_ID, FieldValue::Text(id))
            .with(FIELD_AUTHOR, json_text(raw.get("author")))
            .with(FIELD_LAST_MODIFIED, json_timestamp(raw.get("lastModified")))
            .with(FIELD_CREATED_AT, json_timestamp(raw.get("createdAt")))
            .with(FIELD_LIKES, json_number(raw.get("likes")))
            .with(FIELD_DOWNLOADS, json_number(raw.get("downloads")))
            .with(FIELD_TAGS, json_list(raw.get("tags")))
            .with(FIELD_DESCRIPTION, json_text(raw.get("description")))
            .with(
                FIELD_LANGUAGES,
                json_list(json_path(raw, &["cardData", "language"])),
            )
            .with(
                FIELD_SIZE_CATEGORIES,
                json_list(json_path(raw, &["cardData", "size_categories"])),
            )
            .with(FIELD_PIPELINE_TAG, json_text(raw.get("pipeline_tag")))
            .with(FIELD_LIBRARY, json_text(raw.get("library_name"))))
    }
}

/// Hugging Face Hub model/dataset listing source.
pub struct HubListingSource {
    config: HubListingConfig,
    retry: RetryPolicy,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
    normalizer: HubNormalizer,
}

impl HubListingSource {
    /// Listing source; the Hub token is attached when present.
    pub fn new(
        config: HubListingConfig,
        fetch: &FetchConfig,
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let normalizer = HubNormalizer::new(config.kind);
        Self {
            config,
            retry: fetch.retry.clone(),
            token: credentials.hf_token.clone(),
            transport,
            normalizer,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.kind.path()
        )
    }

    fn request(&self, query: &SourceQuery, limit: usize, offset: Option<usize>) -> HttpRequest {
        let mut request = HttpRequest::get(self.endpoint())
            .query(PARAM_LIMIT, limit)
            .query("full", "True")
            .query("config", "True")
            .bearer(self.token.as_deref());
        if let Some(offset) = offset {
            request = request.query("offset", offset);
        }
        for key in FORWARDED_PARAMS {
            if let Some(value) = query.param(key) {
                request = request.query(*key, value);
            }
        }
        if query.param("sort").is_some() {
            request = request.query("direction", "-1");
        }
        request
    }

    fn fetch_page(&self, request: &HttpRequest) -> Result<Vec<Value>, ExplorerError> {
        match send_with_retry(self.transport.as_ref(), request, &self.retry, self.id())? {
            Value::Array(rows) => Ok(rows),
            other => Err(ExplorerError::SourceUnavailable {
                source_id: self.id().to_string(),
                reason: format!(
                    "expected a JSON array from {}, got {}",
                    request.url,
                    json_kind(&other)
                ),
            }),
        }
    }
}

impl DataSource for HubListingSource {
    fn id(&self) -> &str {
        self.config.kind.source_id()
    }

    fn schema(&self) -> Schema {
        self.normalizer.schema()
    }

    fn default_query(&self) -> SourceQuery {
        SourceQuery::new(self.id())
            .with_param(PARAM_LIMIT, self.config.row_limit)
            .with_optional(PARAM_PAGE_SIZE, self.config.page_size)
            .with_optional("search", self.config.search.as_deref())
            .with_optional("author", self.config.author.as_deref())
            .with_optional("sort", self.config.sort.as_deref())
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Table, ExplorerError> {
        let limit = query
            .usize_param(PARAM_LIMIT)?
            .unwrap_or(self.config.row_limit);
        let page_size = query.usize_param(PARAM_PAGE_SIZE)?.filter(|size| *size > 0);

        let mut rows: Vec<Value> = Vec::new();
        match page_size {
            None => rows = self.fetch_page(&self.request(query, limit, None))?,
            Some(page_size) => {
                while rows.len() < limit {
                    let want = page_size.min(limit - rows.len());
                    let page = self.fetch_page(&self.request(query, want, Some(rows.len())))?;
                    let exhausted = page.len() < want;
                    rows.extend(page);
                    if exhausted {
                        break;
                    }
                }
            }
        }
        rows.truncate(limit);

        let batch = normalize_batch(&self.normalizer, &rows, 0);
        info!(
            "[hf_explorer:hub] source '{}' fetched {} rows ({} skipped)",
            self.id(),
            batch.table.len(),
            batch.skipped
        );
        Ok(batch.table)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
