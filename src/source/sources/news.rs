use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use super::hub::json_kind;
use crate::config::{Credentials, FetchConfig, NewsConfig, RetryPolicy};
use crate::constants::news::*;
use crate::data::{Column, FieldKind, FieldValue, Record, Schema, Table};
use crate::errors::ExplorerError;
use crate::source::row_view::{
    RecordNormalizer, json_bool, json_identifier, json_number, json_text, json_timestamp,
    malformed, normalize_batch,
};
use crate::source::{DataSource, SourceQuery};
use crate::transport::http::{HttpRequest, HttpTransport, send_with_retry};
use crate::utils::split_list_arg;

const PARAM_KEYWORDS: &str = "keywords";
const PARAM_LANG: &str = "lang";
const PARAM_PER_PAGE: &str = "per_page";
const PARAM_MAX_PAGES: &str = "max_pages";

/// Article location as delivered by the article API.
///
/// Depending on the client the field arrives either as a nested object or as
/// that same object serialized into a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationField {
    Structured(Location),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(rename = "type")]
    kind: Option<String>,
    label: Option<Labels>,
    country: Option<Box<Location>>,
}

#[derive(Debug, Deserialize)]
struct Labels {
    eng: Option<String>,
}

impl Location {
    fn english_label(&self) -> Option<String> {
        self.label
            .as_ref()
            .and_then(|label| label.eng.as_deref())
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
    }

    /// Country a location belongs to: itself when it is a country, otherwise
    /// its parent country.
    fn country_name(&self) -> Option<String> {
        if self.kind.as_deref() == Some("country") {
            return self.english_label();
        }
        self.country.as_ref().and_then(|country| country.english_label())
    }
}

/// Resolve the English country name of an article `location` field.
///
/// Absent, null, or undecodable locations resolve to `None`.
pub fn location_country(value: Option<&Value>) -> Option<String> {
    let field = LocationField::deserialize(value?).ok()?;
    match field {
        LocationField::Structured(location) => location.country_name(),
        LocationField::Encoded(encoded) => serde_json::from_str::<Location>(&encoded)
            .ok()
            .and_then(|location| location.country_name()),
    }
}

/// Flattens article search results.
#[derive(Clone, Debug, Default)]
pub struct NewsNormalizer;

impl RecordNormalizer for NewsNormalizer {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn schema(&self) -> Schema {
        Schema {
            source: SOURCE_ID.to_string(),
            id_field: FIELD_URI.to_string(),
            time_field: FIELD_DATE.to_string(),
            columns: vec![
                Column::new(FIELD_URI, FieldKind::Text),
                Column::new(FIELD_DATE, FieldKind::Timestamp),
                Column::new(FIELD_TITLE, FieldKind::Text),
                Column::new(FIELD_URL, FieldKind::Link),
                Column::new(FIELD_LANG, FieldKind::Category),
                Column::new(FIELD_COUNTRY, FieldKind::Category),
                Column::new(FIELD_SENTIMENT, FieldKind::Number),
                Column::new(FIELD_RELEVANCE, FieldKind::Number),
                Column::new(FIELD_SIM, FieldKind::Number),
                Column::new(FIELD_IS_DUPLICATE, FieldKind::Bool),
            ],
        }
    }

    fn normalize(&self, raw: &Value, row_index: usize) -> Result<Record, ExplorerError> {
        if !raw.is_object() {
            return Err(malformed(
                SOURCE_ID,
                format!("article {row_index} is not a JSON object"),
            ));
        }
        let uri = json_identifier(raw.get("uri"))
            .ok_or_else(|| malformed(SOURCE_ID, format!("article {row_index} has no uri")))?;
        let date = match json_timestamp(raw.get("date")) {
            FieldValue::Null => json_timestamp(raw.get("dateTime")),
            date => date,
        };
        Ok(Record::new(uri.clone())
            .with(FIELD_URI, FieldValue::Text(uri))
            .with(FIELD_DATE, date)
            .with(FIELD_TITLE, json_text(raw.get("title")))
            .with(FIELD_URL, json_text(raw.get("url")))
            .with(FIELD_LANG, json_text(raw.get("lang")))
            .with(
                FIELD_COUNTRY,
                FieldValue::text_or_null(location_country(raw.get("location"))),
            )
            .with(FIELD_SENTIMENT, json_number(raw.get("sentiment")))
            .with(FIELD_RELEVANCE, json_number(raw.get("relevance")))
            .with(FIELD_SIM, json_number(raw.get("sim")))
            .with(FIELD_IS_DUPLICATE, json_bool(raw.get("isDuplicate"))))
    }
}

/// Keyword article search against the news API.
///
/// Requires an API key; without one every fetch fails with
/// `MissingConfiguration` before any request is made.
pub struct NewsSource {
    config: NewsConfig,
    retry: RetryPolicy,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
}

impl NewsSource {
    /// Build the source. A missing API key is reported on fetch, not here.
    pub fn new(
        config: NewsConfig,
        fetch: &FetchConfig,
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            retry: fetch.retry.clone(),
            credentials: credentials.clone(),
            transport,
        }
    }

    fn unavailable(&self, reason: String) -> ExplorerError {
        ExplorerError::SourceUnavailable {
            source_id: SOURCE_ID.to_string(),
            reason,
        }
    }

    fn request_body(
        &self,
        api_key: &str,
        keywords: &[String],
        lang: &str,
        page: usize,
        per_page: usize,
    ) -> Value {
        json!({
            "action": "getArticles",
            "keyword": keywords,
            "keywordOper": "and",
            "lang": lang,
            "articlesPage": page,
            "articlesCount": per_page,
            "articlesSortBy": "date",
            "articlesSortByAsc": false,
            "resultType": "articles",
            "dataType": ["news"],
            "includeArticleLocation": true,
            "apiKey": api_key,
        })
    }
}

impl DataSource for NewsSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn schema(&self) -> Schema {
        NewsNormalizer.schema()
    }

    fn default_query(&self) -> SourceQuery {
        // The API key is a credential, not part of the cache key.
        SourceQuery::new(SOURCE_ID)
            .with_param(PARAM_KEYWORDS, self.config.keywords.join(","))
            .with_param(PARAM_LANG, &self.config.lang)
            .with_param(PARAM_PER_PAGE, self.config.articles_per_page)
            .with_param(PARAM_MAX_PAGES, self.config.max_pages)
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Table, ExplorerError> {
        let api_key = self.credentials.require_event_registry_key()?;
        let keywords = query
            .param(PARAM_KEYWORDS)
            .map(split_list_arg)
            .unwrap_or_else(|| self.config.keywords.clone());
        let lang = query.param(PARAM_LANG).unwrap_or(&self.config.lang);
        let per_page = query
            .usize_param(PARAM_PER_PAGE)?
            .unwrap_or(self.config.articles_per_page)
            .clamp(1, MAX_ARTICLES_PER_PAGE);
        let max_pages = query
            .usize_param(PARAM_MAX_PAGES)?
            .unwrap_or(self.config.max_pages)
            .max(1);

        let mut articles: Vec<Value> = Vec::new();
        let mut page = 1usize;
        loop {
            let request = HttpRequest::post_json(
                &self.config.endpoint,
                self.request_body(api_key, &keywords, lang, page, per_page),
            );
            let payload =
                send_with_retry(self.transport.as_ref(), &request, &self.retry, SOURCE_ID)?;
            if let Some(error) = payload.get("error") {
                return Err(self.unavailable(format!("article API rejected the query: {error}")));
            }
            let results = match payload.get("articles").and_then(|a| a.get("results")) {
                Some(Value::Array(results)) => results.clone(),
                Some(other) => {
                    return Err(self.unavailable(format!(
                        "expected 'articles.results' to be an array, got {}",
                        json_kind(other)
                    )));
                }
                None => {
                    return Err(self.unavailable(
                        "response has no 'articles.results' field".to_string(),
                    ));
                }
            };
            let pages = payload
                .get("articles")
                .and_then(|a| a.get("pages"))
                .and_then(Value::as_u64)
                .map_or(1, |pages| pages as usize);
            debug!(
                "[hf_explorer:news] page {}/{} returned {} articles",
                page,
                pages,
                results.len()
            );
            let exhausted = results.is_empty();
            articles.extend(results);
            if exhausted || page >= pages || page >= max_pages {
                break;
            }
            page += 1;
        }

        let batch = normalize_batch(&NewsNormalizer, &articles, 0);
        info!(
            "[hf_explorer:news] fetched {} articles for {:?} ({} skipped)",
            batch.table.len(),
            keywords,
            batch.skipped
        );
        Ok(batch.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::http::{Method, ReplayTransport};

    fn source(transport: Arc<ReplayTransport>, key: Option<&str>) -> NewsSource {
        let credentials = Credentials {
            hf_token: None,
            event_registry_key: key.map(str::to_string),
        };
        NewsSource::new(NewsConfig::default(), &FetchConfig::default(), &credentials, transport)
    }

    fn article(uri: &str, location: Value) -> Value {
        json!({
            "uri": uri,
            "lang": "eng",
            "isDuplicate": false,
            "date": "2024-05-02",
            "dateTime": "2024-05-02T08:15:00Z",
            "sim": 0.0,
            "url": format!("https://news.example/{uri}"),
            "title": format!("Story {uri}"),
            "sentiment": 0.25,
            "relevance": 12,
            "location": location
        })
    }

    #[test]
    fn country_resolution_handles_all_location_shapes() {
        let country = json!({"type": "country", "label": {"eng": "France"}});
        let city = json!({
            "type": "place",
            "label": {"eng": "Lyon"},
            "country": {"type": "country", "label": {"eng": "France"}}
        });
        let encoded = Value::String(city.to_string());
        assert_eq!(location_country(Some(&country)), Some("France".into()));
        assert_eq!(location_country(Some(&city)), Some("France".into()));
        assert_eq!(location_country(Some(&encoded)), Some("France".into()));
        assert_eq!(location_country(Some(&json!("{'type': 'country'}"))), None);
        assert_eq!(location_country(Some(&Value::Null)), None);
        assert_eq!(location_country(Some(&json!({"type": "place"}))), None);
        assert_eq!(location_country(None), None);
    }

    #[test]
    fn normalizes_articles() {
        let record = NewsNormalizer
            .normalize(&article("a1", json!({"type": "country", "label": {"eng": "Japan"}})), 0)
            .unwrap();
        assert_eq!(record.id, "a1");
        assert_eq!(record.get(FIELD_COUNTRY), &FieldValue::Text("Japan".into()));
        assert_eq!(record.get(FIELD_IS_DUPLICATE), &FieldValue::Bool(false));
        assert_eq!(record.number(FIELD_RELEVANCE), Some(12.0));
        assert!(record.timestamp(FIELD_DATE).is_some());

        let missing_location = NewsNormalizer.normalize(&article("a2", Value::Null), 1).unwrap();
        assert!(missing_location.get(FIELD_COUNTRY).is_null());
        assert!(NewsNormalizer.normalize(&json!({"title": "no uri"}), 2).is_err());
    }

    #[test]
    fn missing_key_fails_without_network() {
        let transport = Arc::new(ReplayTransport::new());
        let src = source(transport.clone(), None);
        let err = src.fetch(&src.default_query()).unwrap_err();
        assert!(matches!(err, ExplorerError::MissingConfiguration(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn pages_until_reported_page_count() {
        let transport = Arc::new(
            ReplayTransport::new()
                .respond(json!({
                    "articles": {"results": [article("a", Value::Null)], "page": 1, "pages": 2}
                }))
                .respond(json!({
                    "articles": {"results": [article("b", Value::Null)], "page": 2, "pages": 2}
                })),
        );
        let src = source(transport.clone(), Some("secret"));
        let table = src.fetch(&src.default_query()).unwrap();
        assert_eq!(table.len(), 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        let body = requests[1].body.as_ref().unwrap();
        assert_eq!(body["articlesPage"], json!(2));
        assert_eq!(body["apiKey"], json!("secret"));
        assert_eq!(body["keyword"], json!(["LLM", "model"]));
        assert!(!src.default_query().to_string().contains("secret"));
    }

    #[test]
    fn api_error_payload_is_source_unavailable() {
        let transport =
            Arc::new(ReplayTransport::new().respond(json!({"error": "Invalid API key"})));
        let src = source(transport, Some("bad"));
        assert!(matches!(
            src.fetch(&src.default_query()),
            Err(ExplorerError::SourceUnavailable { .. })
        ));
    }
}
