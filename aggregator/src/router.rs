use crate::api::Handlers;
use crate::api::utils::HandlerBody;
use crate::config::{HandlerAction, Route};
use crate::errors::GatewayError;
use http_body_util::BodyExt;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, HeaderValue,
};
use hyper::{Method, Request, Response, StatusCode};
use shared::http::full_body;
use std::fmt::Display;
use std::sync::Arc;

/// Router that matches incoming requests against configured routes
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
    handlers: Arc<Handlers>,
}

impl Router {
    /// Creates a new router with the given routes and handlers
    pub fn new(routes: Vec<Route>, handlers: Handlers) -> Self {
        Self {
            routes: Arc::new(routes),
            handlers: Arc::new(handlers),
        }
    }

    /// Name of the action a request would be dispatched to, for metrics.
    pub fn route_name(&self, method: &Method, path: &str) -> &'static str {
        if method == Method::OPTIONS {
            return "preflight";
        }
        match self.find_matching_route(method, path) {
            Ok(action) => action.name(),
            Err(_) => "unmatched",
        }
    }

    /// Routes an incoming request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>) -> Result<Response<HandlerBody>, GatewayError>
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Display,
    {
        if req.method() == Method::OPTIONS {
            return Ok(preflight_response(&req));
        }

        let action = match self.find_matching_route(req.method(), req.uri().path()) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "No route matched"
                );
                return Err(e);
            }
        };

        let handler = self.handlers.get(&action).ok_or_else(|| {
            GatewayError::InternalError(format!("No handler registered for {}", action.name()))
        })?;
        tracing::debug!(handler = handler.name(), "Matched route");

        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| GatewayError::RequestBodyError(e.to_string()))?
            .to_bytes();

        handler.handle(Request::from_parts(parts, body)).await
    }

    /// Finds the first route matching path and method.
    ///
    /// A known path requested with another method is a 405 rather than a 404.
    fn find_matching_route(&self, method: &Method, path: &str) -> Result<HandlerAction, GatewayError> {
        let mut path_matched = false;
        for route in self.routes.iter().filter(|route| route.r#match.path == path) {
            if route.r#match.method.as_method() == method {
                return Ok(route.action);
            }
            path_matched = true;
        }

        if path_matched {
            Err(GatewayError::MethodNotAllowed)
        } else {
            Err(GatewayError::NoRouteMatched)
        }
    }
}

/// CORS preflight answer; any origin may call any route.
fn preflight_response<B>(req: &Request<B>) -> Response<HandlerBody> {
    let allow_headers = req
        .headers()
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("Content-Type"));

    let mut response = Response::new(full_body(""));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    response
}
