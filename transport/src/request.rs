//! Request descriptions.

use reqwest::Method;
use serde::Serialize;

use crate::error::Result;

/// A backend call, described independently of credentials and base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    invalidate: Vec<String>,
    fresh: bool,
}

impl ApiRequest {
    /// Create a request for `path` (relative to the API root, leading slash).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            invalidate: Vec::new(),
            fresh: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON body.
    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    /// Invalidate cached reads under `prefix` when this mutation succeeds.
    pub fn invalidating(mut self, prefix: impl Into<String>) -> Self {
        self.invalidate.push(prefix.into());
        self
    }

    /// Skip the cache lookup; the response still refreshes the cache.
    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Extra prefixes to invalidate on success.
    pub fn invalidations(&self) -> &[String] {
        &self.invalidate
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Whether this call reads through the cache.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    /// The exact request target (`/path?query`). Cached reads are keyed by it.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }

    /// Key under which identical concurrent calls are coalesced.
    pub(crate) fn dedupe_key(&self, token: Option<&str>) -> String {
        let body = self
            .body
            .as_ref()
            .map(serde_json::Value::to_string)
            .unwrap_or_default();
        format!(
            "{} {}\n{}\n{body}",
            self.method,
            self.target(),
            token.unwrap_or_default()
        )
    }
}
