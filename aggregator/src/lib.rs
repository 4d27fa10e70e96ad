pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod executor;
pub mod metrics_defs;
pub mod planner;
pub mod projector;
pub mod resource;
pub mod router;
pub mod upstream;

#[cfg(test)]
mod testutils;

use crate::aggregate::Aggregator;
use crate::api::utils::HandlerBody;
use crate::api::webhook::WebhookForwarder;
use crate::errors::GatewayError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::router::Router;
use crate::upstream::{SessionToken, UpstreamClient};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Starts the gateway and admin listeners and serves until either fails.
pub async fn run(config: config::Config, credential: Option<SessionToken>) -> Result<(), GatewayError> {
    if credential.is_none() {
        tracing::warn!(
            env = %config.upstream.credential_env,
            "No session credential configured; credentialed endpoints will fail"
        );
    }

    let service = GatewayService::new(&config, credential)?;
    let ready = service.client.has_credentials();

    let gateway_task = run_http_service(&config.listener.host, config.listener.port, service);
    let admin_service: AdminService<_, GatewayError> = AdminService::new(move || ready);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

pub struct GatewayService {
    router: Router,
    client: UpstreamClient,
}

impl GatewayService {
    pub fn new(config: &config::Config, credential: Option<SessionToken>) -> Result<Self, GatewayError> {
        let client = UpstreamClient::new(&config.upstream, credential, &config.timeouts)?;
        let aggregator = Aggregator::new(
            Arc::new(client.clone()),
            Duration::from_secs(config.timeouts.task_timeout_secs),
        );
        let forwarder = WebhookForwarder::new(&config.webhook, &config.timeouts)?;

        let handlers = api::build_handlers(Arc::new(aggregator), client.clone(), forwarder);
        let router = Router::new(config.routes.clone(), handlers);

        Ok(Self { router, client })
    }
}

impl<B> Service<Request<B>> for GatewayService
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = Response<HandlerBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let router = self.router.clone();

        Box::pin(async move {
            let started = Instant::now();
            let route = router.route_name(req.method(), req.uri().path());
            let _inflight = InflightGuard::new();

            let response = match router.route(req).await {
                Ok(response) => response,
                Err(e) => {
                    if e.status().is_server_error() {
                        tracing::error!(route, error = %e, "Request failed");
                    } else {
                        tracing::debug!(route, error = %e, "Request rejected");
                    }
                    e.into_response()
                }
            };

            histogram!(
                REQUEST_DURATION,
                "route" => route,
                "status" => response.status().as_str().to_owned()
            )
            .record(started.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}

/// Holds `requests.inflight` up for as long as the request future lives,
/// including when the client disconnects and the future is dropped.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}
