use crate::upstream::SessionToken;
use hyper::Method;
use hyper::header::HeaderValue;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Upstream url must use http or https: {0}")]
    InvalidUpstreamScheme(String),

    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(&'static str),

    #[error("Credential environment variable name cannot be empty")]
    EmptyCredentialEnv,

    #[error("Timeouts must be non-zero and the task timeout must be >= the http timeout")]
    InvalidTimeouts,

    #[error("Route path must start with '/': {0}")]
    InvalidRoutePath(String),

    #[error("Duplicate route: {0} {1}")]
    DuplicateRoute(String, String),
}

/// HTTP methods supported for route matching
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

/// Handlers a route can dispatch to
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HandlerAction {
    Index,
    Aggregate,
    SearchUsers,
    SearchGroups,
    SearchGames,
    Badges,
    Following,
    Followers,
    DiscordWebhook,
}

impl HandlerAction {
    pub fn name(&self) -> &'static str {
        match self {
            HandlerAction::Index => "index",
            HandlerAction::Aggregate => "aggregate",
            HandlerAction::SearchUsers => "search_users",
            HandlerAction::SearchGroups => "search_groups",
            HandlerAction::SearchGames => "search_games",
            HandlerAction::Badges => "badges",
            HandlerAction::Following => "following",
            HandlerAction::Followers => "followers",
            HandlerAction::DiscordWebhook => "discord_webhook",
        }
    }

    pub const ALL: [HandlerAction; 9] = [
        HandlerAction::Index,
        HandlerAction::Aggregate,
        HandlerAction::SearchUsers,
        HandlerAction::SearchGroups,
        HandlerAction::SearchGames,
        HandlerAction::Badges,
        HandlerAction::Following,
        HandlerAction::Followers,
        HandlerAction::DiscordWebhook,
    ];
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// The upstream all player data is fetched from
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Request routing rules. Defaults to the full endpoint table.
    #[serde(default = "default_routes")]
    pub routes: Vec<Route>,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.timeouts.validate()?;
        self.webhook.validate()?;

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !route.r#match.path.starts_with('/') {
                return Err(ValidationError::InvalidRoutePath(route.r#match.path.clone()));
            }
            if !seen.insert((route.r#match.path.as_str(), route.r#match.method)) {
                return Err(ValidationError::DuplicateRoute(
                    format!("{:?}", route.r#match.method),
                    route.r#match.path.clone(),
                ));
            }
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream server configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL every resource path is joined onto
    ///
    /// Note: Uses the `url::Url` type so invalid URLs are rejected during
    /// config deserialization.
    pub base_url: Url,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Name of the session cookie carrying the credential
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Environment variable the session credential is read from at startup
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUpstreamScheme(
                self.base_url.to_string(),
            ));
        }
        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(ValidationError::InvalidHeaderValue("user_agent"));
        }
        if self.cookie_name.is_empty() || HeaderValue::from_str(&self.cookie_name).is_err() {
            return Err(ValidationError::InvalidHeaderValue("cookie_name"));
        }
        if self.credential_env.is_empty() {
            return Err(ValidationError::EmptyCredentialEnv);
        }
        Ok(())
    }

    /// Reads the session credential from the configured environment variable.
    ///
    /// Unset or empty yields `None`; credentialed endpoints then answer 500.
    pub fn load_credential(&self) -> Option<SessionToken> {
        std::env::var(&self.credential_env)
            .ok()
            .and_then(SessionToken::new)
    }
}

/// Timeouts for upstream calls
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Timeouts {
    /// Per upstream HTTP call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Deadline for a whole fan-out; calls still running are abandoned
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Timeouts {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 || self.task_timeout_secs < self.http_timeout_secs {
            return Err(ValidationError::InvalidTimeouts);
        }
        Ok(())
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

/// Discord webhook forwarding
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WebhookConfig {
    /// Only webhook URLs starting with this prefix are forwarded
    #[serde(default = "default_webhook_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_webhook_user_agent")]
    pub user_agent: String,
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(ValidationError::InvalidHeaderValue("webhook.user_agent"));
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url_prefix: default_webhook_url_prefix(),
            user_agent: default_webhook_user_agent(),
        }
    }
}

/// Routing rule configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Route {
    /// Conditions for matching incoming requests
    pub r#match: Match,
    /// Handler invoked when the match conditions are met
    pub action: HandlerAction,
}

/// Request matching criteria
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Match {
    /// Exact path to match (e.g., "/aggregate")
    pub path: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
}

fn default_user_agent() -> String {
    "Pekora/WinInet".into()
}

fn default_cookie_name() -> String {
    ".PEKOSECURITY".into()
}

fn default_credential_env() -> String {
    "PEKOSECURITY".into()
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_task_timeout_secs() -> u64 {
    20
}

fn default_webhook_url_prefix() -> String {
    "https://discord.com/api/webhooks/".into()
}

fn default_webhook_user_agent() -> String {
    "Pekora-Webhook-Proxy/1.0".into()
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

pub fn default_routes() -> Vec<Route> {
    let route = |path: &str, method: HttpMethod, action: HandlerAction| Route {
        r#match: Match {
            path: path.to_string(),
            method,
        },
        action,
    };

    vec![
        route("/", HttpMethod::Get, HandlerAction::Index),
        route("/aggregate", HttpMethod::Get, HandlerAction::Aggregate),
        route("/api/playerdata", HttpMethod::Get, HandlerAction::Aggregate),
        route("/api/search/users", HttpMethod::Get, HandlerAction::SearchUsers),
        route("/api/search/groups", HttpMethod::Get, HandlerAction::SearchGroups),
        route("/api/search/games", HttpMethod::Get, HandlerAction::SearchGames),
        route("/api/badges", HttpMethod::Get, HandlerAction::Badges),
        route("/api/user/following", HttpMethod::Get, HandlerAction::Following),
        route("/api/user/followers", HttpMethod::Get, HandlerAction::Followers),
        route(
            "/api/discord/webhook",
            HttpMethod::Post,
            HandlerAction::DiscordWebhook,
        ),
    ]
}
