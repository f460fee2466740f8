//! Response artifacts and the decode step at the transport boundary.

use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ApiError, Result};

/// A completed backend response.
///
/// The body is reference-counted, so every caller of a shared or cached call
/// holds its own consumable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Bytes,
}

impl ApiResponse {
    /// Create a response from a status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Decode a list body, accepting both a bare array and an `{items}` envelope.
    pub fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.json::<ListPayload<T>>().map(ListPayload::into_items)
    }

    /// Decode a list body, degrading to an empty list on malformed payloads.
    pub fn list_or_empty<T: DeserializeOwned>(&self) -> Vec<T> {
        self.list().unwrap_or_else(|e| {
            warn!("Discarding malformed list payload: {e}");
            Vec::new()
        })
    }
}

/// The two list shapes the backend produces.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    /// `[ ... ]`
    Bare(Vec<T>),

    /// `{ "items": [ ... ], ... }`
    Enveloped { items: Vec<T> },
}

impl<T> ListPayload<T> {
    /// The list items regardless of shape.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Enveloped { items } => items,
        }
    }
}

/// Human-readable message for a non-2xx response.
///
/// Understands `{message}`, `{detail: "..."}` and `{detail: {message}}`
/// bodies and falls back to the canonical status text.
pub(crate) fn server_message(status: u16, body: &[u8]) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_slice(body).ok();
    let from_body = parsed.as_ref().and_then(|value| {
        value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .or_else(|| value.get("detail").and_then(serde_json::Value::as_str))
            .or_else(|| {
                value
                    .get("detail")
                    .and_then(|detail| detail.get("message"))
                    .and_then(serde_json::Value::as_str)
            })
            .map(str::to_string)
    });

    from_body.unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map_or_else(|| format!("request failed with status {status}"), str::to_string)
    })
}
