use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{FetchConfig, RetryPolicy};
use crate::constants::fetch::RETRYABLE_STATUS;
use crate::errors::ExplorerError;

/// HTTP method used by a source request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Query-string request.
    Get,
    /// JSON-body request.
    Post,
}

/// Transport-agnostic description of one upstream JSON request.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Endpoint URL without query string.
    pub url: String,
    /// Query parameters in send order.
    pub query: Vec<(String, String)>,
    /// Optional bearer token sent as `Authorization`.
    pub bearer_token: Option<String>,
    /// JSON body for `POST` requests.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// `GET` request with no parameters.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
            body: None,
        }
    }

    /// `POST` request carrying `body` as JSON.
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
            body: Some(body),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a bearer token; `None` leaves the request anonymous.
    pub fn bearer(mut self, token: Option<&str>) -> Self {
        self.bearer_token = token.map(str::to_string);
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Failure of a single request attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-2xx status.
    Status(u16),
    /// Connection, DNS, timeout, or I/O failure.
    Network(String),
    /// Request could not be built or sent (bad URL, bad header, ...).
    Request(String),
    /// Response body could not be read or parsed as JSON.
    Body(String),
}

impl TransportError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Status(code) => *code >= 500 || RETRYABLE_STATUS.contains(code),
            TransportError::Network(_) => true,
            TransportError::Request(_) | TransportError::Body(_) => false,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(code) => write!(f, "upstream returned HTTP {code}"),
            TransportError::Network(reason) => write!(f, "network failure: {reason}"),
            TransportError::Request(reason) => write!(f, "invalid request: {reason}"),
            TransportError::Body(reason) => write!(f, "unreadable response body: {reason}"),
        }
    }
}

/// Sends one JSON request and returns the decoded JSON response.
pub trait HttpTransport: Send + Sync {
    /// One attempt; retries are layered on top by [`send_with_retry`].
    fn send(&self, request: &HttpRequest) -> Result<Value, TransportError>;
}

/// Blocking `ureq` transport.
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl UreqTransport {
    /// Build an agent with the configured global timeout and body limit.
    pub fn new(config: &FetchConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            .build()
            .into();
        Self {
            agent,
            max_body_bytes: config.max_body_bytes,
        }
    }

    fn map_error(err: ureq::Error) -> TransportError {
        match err {
            ureq::Error::StatusCode(code) => TransportError::Status(code),
            ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound => TransportError::Network(err.to_string()),
            other => TransportError::Request(other.to_string()),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<Value, TransportError> {
        let authorization = request
            .bearer_token
            .as_ref()
            .map(|token| format!("Bearer {token}"));
        let response = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(&request.url);
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                if let Some(header) = &authorization {
                    builder = builder.header("Authorization", header);
                }
                builder.call()
            }
            Method::Post => {
                let payload = request
                    .body
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default();
                let mut builder = self.agent.post(&request.url);
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                if let Some(header) = &authorization {
                    builder = builder.header("Authorization", header);
                }
                builder
                    .header("Content-Type", "application/json")
                    .send(payload.as_bytes())
            }
        }
        .map_err(Self::map_error)?;

        let body = response
            .into_body()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_string()
            .map_err(|err| TransportError::Body(err.to_string()))?;
        serde_json::from_str(&body).map_err(|err| TransportError::Body(err.to_string()))
    }
}

/// Send `request`, retrying transient failures per `policy`.
///
/// Exhausted or permanent failures surface as `SourceUnavailable`.
pub fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
    source_id: &str,
) -> Result<Value, ExplorerError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match transport.send(request) {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        "[hf_explorer:http] source '{}' recovered on attempt {}/{}",
                        source_id, attempt, max_attempts
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let backoff = policy.backoff_after(attempt);
                warn!(
                    "[hf_explorer:http] source '{}' attempt {}/{} failed ({}); retrying in {}ms",
                    source_id,
                    attempt,
                    max_attempts,
                    err,
                    backoff.as_millis()
                );
                if backoff > Duration::ZERO {
                    thread::sleep(backoff);
                }
                attempt += 1;
            }
            Err(err) => {
                return Err(ExplorerError::SourceUnavailable {
                    source_id: source_id.to_string(),
                    reason: format!(
                        "{} {} failed after {attempt} attempt(s): {err}",
                        method_label(request.method),
                        request.url
                    ),
                });
            }
        }
    }
}

fn method_label(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
    }
}

/// In-memory transport that replays queued responses in order.
///
/// Every request is recorded so tests can assert on paging and parameters.
/// When the queue is empty, further requests fail with HTTP 404.
#[derive(Default)]
pub struct ReplayTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ReplayTransport {
    /// Transport with an empty response queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful JSON response.
    pub fn respond(self, value: Value) -> Self {
        self.push(Ok(value));
        self
    }

    /// Queue a failed attempt.
    pub fn fail(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queue a response through a shared reference.
    pub fn push(&self, response: Result<Value, TransportError>) {
        self.responses
            .lock()
            .expect("replay transport poisoned")
            .push_back(response);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("replay transport poisoned")
            .clone()
    }
}

impl HttpTransport for ReplayTransport {
    fn send(&self, request: &HttpRequest) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .expect("replay transport poisoned")
            .push(request.clone());
        self.responses
            .lock()
            .expect("replay transport poisoned")
            .pop_front()
            .unwrap_or(Err(TransportError::Status(404)))
    }
}
