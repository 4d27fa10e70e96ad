//! Authenticated client for the upstream player-data API.

use crate::config::{Timeouts, UpstreamConfig};
use crate::errors::{GatewayError, UpstreamError};
use crate::resource::{Outcome, Resource};
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Opaque session credential sent to the upstream as a cookie.
#[derive(Clone)]
pub struct SessionToken(Arc<str>);

impl SessionToken {
    /// Returns `None` for an empty credential.
    pub fn new(value: String) -> Option<Self> {
        if value.trim().is_empty() {
            return None;
        }
        Some(Self(value.into()))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Fetches one resource for one subject.
///
/// This is the seam between the fan-out executor and the network.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource: Resource, subject_id: u64) -> Outcome;

    /// Whether a session credential is available for upstream calls.
    fn has_credentials(&self) -> bool;
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    cookie: Option<HeaderValue>,
}

impl UpstreamClient {
    pub fn new(
        config: &UpstreamConfig,
        credential: Option<SessionToken>,
        timeouts: &Timeouts,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(timeouts.http_timeout_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientError(e.to_string()))?;

        let cookie = match credential {
            Some(token) => {
                let raw = format!("{}={}", config.cookie_name, token.expose());
                let mut value = HeaderValue::from_str(&raw).map_err(|_| {
                    GatewayError::HttpClientError("credential is not a valid cookie value".into())
                })?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            cookie,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.cookie.is_some()
    }

    /// GETs `path` (joined onto the base url) with the session cookie and
    /// returns the JSON body of a 2xx response.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.clone());
        }

        let response = request.send().await?;
        read_json_response(response).await
    }
}

#[async_trait]
impl ResourceFetcher for UpstreamClient {
    async fn fetch(&self, resource: Resource, subject_id: u64) -> Outcome {
        self.get_json(&resource.path(subject_id), &[]).await
    }

    fn has_credentials(&self) -> bool {
        UpstreamClient::has_credentials(self)
    }
}

/// Classifies a response: non-2xx keeps its status and body, 2xx must be JSON.
/// An empty 2xx body decodes to `null`.
pub(crate) async fn read_json_response(response: reqwest::Response) -> Result<Value, UpstreamError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        return Err(UpstreamError::Status { status, body });
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}
