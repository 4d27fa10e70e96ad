use crate::api::Handler;
use crate::api::utils::{HandlerBody, deserialize_body, json_ok};
use crate::config::{Timeouts, WebhookConfig};
use crate::errors::{GatewayError, UpstreamError};
use crate::upstream::read_json_response;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Body of `POST /api/discord/webhook`.
///
/// Fields are kept loosely typed so that a wrong type is reported as an
/// invalid parameter rather than a malformed body.
#[derive(Deserialize)]
struct WebhookRequest {
    #[serde(rename = "webhookUrl", default)]
    webhook_url: Value,
    #[serde(default)]
    payload: Value,
}

/// Relays JSON payloads to Discord webhooks.
#[derive(Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    url_prefix: String,
}

impl WebhookForwarder {
    pub fn new(config: &WebhookConfig, timeouts: &Timeouts) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(timeouts.http_timeout_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientError(e.to_string()))?;

        Ok(Self {
            client,
            url_prefix: config.url_prefix.clone(),
        })
    }

    /// Only URLs under the configured prefix are accepted, and the payload
    /// must be a JSON object or array.
    fn validate<'a>(&self, request: &'a WebhookRequest) -> Result<(&'a str, &'a Value), GatewayError> {
        let url = request
            .webhook_url
            .as_str()
            .filter(|url| url.starts_with(&self.url_prefix))
            .ok_or_else(|| {
                GatewayError::BadRequest("Invalid or missing webhookUrl parameter".to_string())
            })?;

        if !matches!(request.payload, Value::Object(_) | Value::Array(_)) {
            return Err(GatewayError::BadRequest(
                "Invalid or missing payload parameter".to_string(),
            ));
        }

        Ok((url, &request.payload))
    }

    pub async fn forward(&self, url: &str, payload: &Value) -> Result<Value, UpstreamError> {
        let response = self.client.post(url).json(payload).send().await?;
        read_json_response(response).await
    }
}

pub struct WebhookHandler {
    forwarder: WebhookForwarder,
}

impl WebhookHandler {
    pub fn new(forwarder: WebhookForwarder) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl Handler for WebhookHandler {
    fn name(&self) -> &'static str {
        "WebhookHandler"
    }

    async fn handle(&self, request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError> {
        let body: WebhookRequest = deserialize_body(request.body())?;
        let (url, payload) = self.forwarder.validate(&body)?;

        let discord_response = self.forwarder.forward(url, payload).await.map_err(|e| {
            // The webhook url embeds its token; log only the failure.
            tracing::error!(error = %e, "Failed to send Discord webhook");
            GatewayError::upstream("Failed to send Discord webhook", e)
        })?;

        tracing::info!("Discord webhook sent");
        json_ok(&json!({
            "message": "Webhook sent successfully",
            "discordResponse": discord_response,
        }))
    }
}
