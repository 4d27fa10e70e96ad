//! Endpoints that relay a single upstream call.

use crate::aggregate::parse_subject_id;
use crate::api::Handler;
use crate::api::utils::{HandlerBody, QueryParams, json_ok};
use crate::config::HandlerAction;
use crate::errors::GatewayError;
use crate::resource::Resource;
use crate::upstream::UpstreamClient;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde::Serialize;
use serde_json::Value;

/// Page size of the upstream follow lists.
const FOLLOW_PAGE_SIZE: u64 = 100;

fn require_credentials(client: &UpstreamClient) -> Result<(), GatewayError> {
    if client.has_credentials() {
        Ok(())
    } else {
        tracing::error!("Passthrough requested without a session credential");
        Err(GatewayError::MissingCredentials)
    }
}

fn require_subject_id(params: &QueryParams) -> Result<u64, GatewayError> {
    parse_subject_id(params.get("id"))
        .map_err(|_| GatewayError::BadRequest("Invalid or missing id parameter".to_string()))
}

/// Search and badge lookups: the upstream JSON is returned unchanged.
pub struct PassthroughHandler {
    action: HandlerAction,
    client: UpstreamClient,
}

impl PassthroughHandler {
    pub fn new(action: HandlerAction, client: UpstreamClient) -> Self {
        Self { action, client }
    }

    /// Upstream path, query and error context for this action.
    fn target(
        &self,
        params: &QueryParams,
    ) -> Result<(String, Vec<(&'static str, String)>, &'static str), GatewayError> {
        let search = |path: &str, context: &'static str| -> Result<_, GatewayError> {
            let keyword = params.required("keyword")?.to_string();
            Ok((
                path.to_string(),
                vec![
                    ("keyword", keyword),
                    ("maxRows", "12".to_string()),
                    ("startIndex", "0".to_string()),
                ],
                context,
            ))
        };

        match self.action {
            HandlerAction::SearchUsers => search(
                "/search/users/results",
                "Failed to fetch user search data",
            ),
            HandlerAction::SearchGroups => search(
                "/apisite/groups/v1/groups/search",
                "Failed to fetch group search data",
            ),
            HandlerAction::SearchGames => {
                let keyword = params.required("keyword")?.to_string();
                Ok((
                    "/apisite/games/v1/games/list".to_string(),
                    vec![
                        ("sortToken", String::new()),
                        ("maxRows", "100".to_string()),
                        ("genre", String::new()),
                        ("keyword", keyword),
                    ],
                    "Failed to fetch game search data",
                ))
            }
            HandlerAction::Badges => {
                let subject_id = require_subject_id(params)?;
                Ok((
                    Resource::Badges.path(subject_id),
                    Vec::new(),
                    "Failed to fetch badges",
                ))
            }
            other => Err(GatewayError::InternalError(format!(
                "{} is not a passthrough action",
                other.name()
            ))),
        }
    }
}

#[async_trait]
impl Handler for PassthroughHandler {
    fn name(&self) -> &'static str {
        self.action.name()
    }

    async fn handle(&self, request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError> {
        let params = QueryParams::from_uri(request.uri());
        let (path, query, context) = self.target(&params)?;
        require_credentials(&self.client)?;

        let body = self.client.get_json(&path, &query).await.map_err(|e| {
            tracing::error!(action = self.action.name(), error = %e, "Upstream request failed");
            GatewayError::upstream(context, e)
        })?;
        json_ok(&body)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FollowPage {
    user_id: u64,
    page: u64,
    next_page: Option<u64>,
    data: Value,
}

/// Paginated followings or followers of a user.
///
/// `GET /api/user/following?id=<userId>&page=<page>`
///
/// Pages hold 100 entries; `nextPage` is set only when the current page is full.
pub struct FollowListHandler {
    action: HandlerAction,
    client: UpstreamClient,
}

impl FollowListHandler {
    pub fn new(action: HandlerAction, client: UpstreamClient) -> Self {
        Self { action, client }
    }

    fn list_path(&self, subject_id: u64) -> String {
        let list = match self.action {
            HandlerAction::Followers => "followers",
            _ => "followings",
        };
        format!("/apisite/friends/v1/users/{subject_id}/{list}")
    }
}

/// Page number from the query; missing, malformed or < 1 means the first page.
fn parse_page(params: &QueryParams) -> u64 {
    params
        .get("page")
        .and_then(|page| page.trim().parse::<u64>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

#[async_trait]
impl Handler for FollowListHandler {
    fn name(&self) -> &'static str {
        self.action.name()
    }

    async fn handle(&self, request: Request<Bytes>) -> Result<Response<HandlerBody>, GatewayError> {
        let params = QueryParams::from_uri(request.uri());
        let subject_id = require_subject_id(&params)?;
        require_credentials(&self.client)?;

        let page = parse_page(&params);
        let cursor = (page - 1).saturating_mul(FOLLOW_PAGE_SIZE);
        let query = [
            ("cursor", cursor.to_string()),
            ("limit", FOLLOW_PAGE_SIZE.to_string()),
        ];

        let data = self
            .client
            .get_json(&self.list_path(subject_id), &query)
            .await
            .map_err(|e| {
                tracing::error!(subject_id, page, error = %e, "Failed to fetch follow list");
                GatewayError::upstream(format!("Failed to fetch {}", self.action.name()), e)
            })?;

        let full_page = data
            .get("data")
            .and_then(Value::as_array)
            .is_some_and(|entries| entries.len() as u64 == FOLLOW_PAGE_SIZE);

        json_ok(&FollowPage {
            user_id: subject_id,
            page,
            next_page: full_page.then(|| page + 1),
            data,
        })
    }
}
