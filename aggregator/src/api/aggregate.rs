use crate::aggregate::Aggregator;
use crate::api::Handler;
use crate::api::utils::{HandlerBody, QueryParams, json_ok};
use crate::errors::GatewayError;
use crate::planner::RequestedFields;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response};
use std::sync::Arc;

/// Handler for the aggregation endpoint.
///
/// `GET /aggregate?id=<subjectId>&fields=<comma-separated>`
///
/// Example response for `?id=261&fields=followers,following`:
/// ```json
/// {"followers": 5, "following": 2}
/// ```
pub struct AggregateHandler {
    aggregator: Arc<Aggregator>,
}

impl AggregateHandler {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl Handler for AggregateHandler {
    fn name(&self) -> &'static str {
        "AggregateHandler"
    }

    async fn handle(&self, request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError> {
        let params = QueryParams::from_uri(request.uri());
        let requested = RequestedFields::parse(params.get("fields"));

        tracing::debug!(id = ?params.get("id"), ?requested, "Aggregation request");
        let record = self.aggregator.aggregate(params.get("id"), &requested).await?;
        json_ok(&record)
    }
}
