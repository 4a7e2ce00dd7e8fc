//! REST command transport.
//!
//! Each operation is one HTTPS request authenticated with a bearer token.
//! Lookups use `GET {base}/get/{key}`; every other command is a `POST {base}`
//! whose JSON body is the command as an array of strings. Responses are an
//! envelope: `{"result": ...}` on success, `{"error": "..."}` on failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::trace;

use crate::error::StoreError;
use crate::traits::{KeyScan, KvStore};

/// Store reached through an HTTP REST command endpoint.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base: Url,
    token: String,
    timeout: Duration,
    scan_count: u32,
}

impl RestStore {
    /// Create a REST store for `base_url`.
    ///
    /// Every request is bounded by `timeout`; a timed-out request surfaces as
    /// [`StoreError::Timeout`].
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::transport)?;
        Self::with_client(client, base_url, token, timeout)
    }

    /// Create with a custom reqwest [`Client`] (for proxies, TLS roots, etc.).
    pub fn with_client(
        client: Client,
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base = Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(format!(
                "unsupported scheme `{}`",
                base.scheme()
            )));
        }
        Ok(Self {
            client,
            base,
            token: token.into(),
            timeout,
            scan_count: gate_core::DEFAULT_SCAN_COUNT,
        })
    }

    /// Page size requested per SCAN round trip.
    pub fn scan_count(mut self, count: u32) -> Self {
        self.scan_count = count.max(1);
        self
    }

    fn url_with(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Run one command POSTed as a JSON array.
    async fn command(&self, args: &[&str]) -> Result<Value, StoreError> {
        let req = self.client.post(self.base.clone()).json(args);
        self.execute(req).await
    }

    /// Send a request and unwrap the envelope's `result` field.
    async fn execute(&self, req: RequestBuilder) -> Result<Value, StoreError> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let body: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout)
            } else {
                StoreError::Envelope(e.to_string())
            }
        })?;
        unwrap_envelope(body)
    }

    fn map_reqwest(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::transport(err)
        }
    }
}

/// Extract `result` from a command envelope.
fn unwrap_envelope(body: Value) -> Result<Value, StoreError> {
    let Value::Object(mut map) = body else {
        return Err(StoreError::Envelope("response is not an object".into()));
    };
    if let Some(err) = map.remove("error")
        && !err.is_null()
    {
        let msg = match err {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(StoreError::Remote(msg));
    }
    map.remove("result")
        .ok_or_else(|| StoreError::Envelope("missing `result` field".into()))
}

/// Interpret a GET result: `null` is absent, a string is the stored value,
/// and structured payloads are re-serialized so callers can parse them the
/// same way as string-encoded ones.
fn result_to_value(result: Value) -> Option<String> {
    match result {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Interpret a SCAN result: `[cursor, [keys...]]`.
fn parse_scan(result: Value) -> Result<(String, Vec<String>), StoreError> {
    let Value::Array(mut parts) = result else {
        return Err(StoreError::Envelope("SCAN result is not an array".into()));
    };
    if parts.len() != 2 {
        return Err(StoreError::Envelope(format!(
            "SCAN result has {} elements",
            parts.len()
        )));
    }
    let keys = parts.pop().unwrap_or_default();
    let cursor = match parts.pop().unwrap_or_default() {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(StoreError::Envelope(format!(
                "SCAN cursor has unexpected type: {other}"
            )));
        }
    };
    let Value::Array(keys) = keys else {
        return Err(StoreError::Envelope("SCAN keys are not an array".into()));
    };
    let keys = keys
        .into_iter()
        .filter_map(|k| match k {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect();
    Ok((cursor, keys))
}

#[async_trait]
impl KvStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = self.url_with(&["get", key]);
        trace!(key, "rest get");
        let result = self.execute(self.client.get(url)).await?;
        Ok(result_to_value(result))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        trace!(key, "rest set");
        self.command(&["SET", key, value]).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyScan for RestStore {
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{prefix}*");
        let count = self.scan_count.to_string();
        let mut cursor = String::from("0");
        let mut keys = Vec::new();
        loop {
            let result = self
                .command(&["SCAN", &cursor, "MATCH", &pattern, "COUNT", &count])
                .await?;
            let (next, batch) = parse_scan(result)?;
            keys.extend(batch);
            if next == "0" {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}
