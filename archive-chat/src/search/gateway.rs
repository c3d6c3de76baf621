//! Search gateway
//!
//! Runs queries against the search engine and normalizes its hits into
//! [`ResultRow`]s.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::query::build_query;
use super::types::{PageState, ResultRow, SearchParams};
use crate::config::SearchConfig;
use crate::error::QueryError;

/// One page of normalized results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub rows: Vec<ResultRow>,
    pub total_hits: u64,
}

/// Executes a search for one page of results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, params: &SearchParams, page: u64) -> Result<SearchPage, QueryError>;
}

/// Gateway talking to an Elasticsearch-compatible `_search` endpoint
pub struct ElasticGateway {
    client: reqwest::Client,
    base_url: String,
    index: String,
    credentials: Option<(String, String)>,
    page_size: u64,
}

impl ElasticGateway {
    pub fn new(config: &SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        };

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            credentials,
            page_size: config.page_size,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

#[async_trait]
impl SearchGateway for ElasticGateway {
    async fn search(&self, params: &SearchParams, page: u64) -> Result<SearchPage, QueryError> {
        let body = build_query(params, page, self.page_size);
        let from = PageState::new(self.page_size).offset(page);

        debug!(
            "Searching {} page {} (from={}, size={})",
            self.index, page, from, self.page_size
        );

        let mut request = self
            .client
            .post(self.search_url())
            .query(&[("size", self.page_size), ("from", from)])
            .json(&body);

        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Search request failed with status {}", status);
            return Err(QueryError::status(status.as_u16(), status.canonical_reason()));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| QueryError::transport(format!("Invalid search response: {}", e)))?;

        let page = parse_response(&data);
        debug!("Search returned {} rows of {} hits", page.rows.len(), page.total_hits);
        Ok(page)
    }
}

/// Normalize a `_search` response body
pub fn parse_response(data: &Value) -> SearchPage {
    let hits = &data["hits"];

    let rows = hits["hits"]
        .as_array()
        .map(|hits| hits.iter().map(normalize_hit).collect())
        .unwrap_or_default();

    SearchPage {
        rows,
        total_hits: normalize_total(hits.get("total")),
    }
}

/// `hits.total` is either a bare count or `{ "value": n, "relation": ".." }`
pub fn normalize_total(total: Option<&Value>) -> u64 {
    match total {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}

/// Map one raw hit to a [`ResultRow`]; missing fields become `""`.
///
/// `sender` falls back to `from` and `date` to `timestamp` when the primary
/// field is absent or empty.
pub fn normalize_hit(hit: &Value) -> ResultRow {
    let source = &hit["_source"];

    ResultRow {
        id: text(&hit["_id"]),
        subject: text(&source["subject"]),
        body: text(&source["body"]),
        sender: first_text(source, &["sender", "from"]),
        to: text(&source["to"]),
        cc: text(&source["cc"]),
        date: first_text(source, &["date", "timestamp"]),
    }
}

fn first_text(source: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(&source[*key]))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => String::new(),
    }
}
