//! Request handlers behind the route table.

pub mod aggregate;
pub mod passthrough;
pub mod utils;
pub mod webhook;

use crate::aggregate::Aggregator;
use crate::config::HandlerAction;
use crate::errors::GatewayError;
use crate::upstream::UpstreamClient;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use utils::{HandlerBody, json_ok};
use webhook::{WebhookForwarder, WebhookHandler};

/// A handler receives the request with its body already collected.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError>;
}

pub type Handlers = HashMap<HandlerAction, Arc<dyn Handler>>;

/// Builds one handler per action.
pub fn build_handlers(
    aggregator: Arc<Aggregator>,
    client: UpstreamClient,
    forwarder: WebhookForwarder,
) -> Handlers {
    HandlerAction::ALL
        .into_iter()
        .map(|action| {
            let handler: Arc<dyn Handler> = match action {
                HandlerAction::Index => Arc::new(IndexHandler),
                HandlerAction::Aggregate => {
                    Arc::new(aggregate::AggregateHandler::new(aggregator.clone()))
                }
                HandlerAction::SearchUsers
                | HandlerAction::SearchGroups
                | HandlerAction::SearchGames
                | HandlerAction::Badges => {
                    Arc::new(passthrough::PassthroughHandler::new(action, client.clone()))
                }
                HandlerAction::Following | HandlerAction::Followers => {
                    Arc::new(passthrough::FollowListHandler::new(action, client.clone()))
                }
                HandlerAction::DiscordWebhook => Arc::new(WebhookHandler::new(forwarder.clone())),
            };
            (action, handler)
        })
        .collect()
}

/// `GET /`
pub struct IndexHandler;

#[async_trait]
impl Handler for IndexHandler {
    fn name(&self) -> &'static str {
        "IndexHandler"
    }

    async fn handle(&self, _request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError> {
        json_ok(&json!({
            "message": "Player data gateway is running. Use /aggregate?id={userId}&fields={fields}, \
                /api/search/{users,groups,games}?keyword={keyword}, /api/badges?id={userId}, \
                /api/user/{following,followers}?id={userId}&page={page}, \
                or POST /api/discord/webhook."
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    #[tokio::test]
    async fn test_index_banner() {
        let response = IndexHandler
            .handle(Request::new(Bytes::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["message"].as_str().unwrap().contains("/aggregate"));
    }
}
