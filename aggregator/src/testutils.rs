use crate::config::{Timeouts, UpstreamConfig};
use crate::resource::Resource;
use crate::upstream::{SessionToken, UpstreamClient};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use metrics::{
    Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Canned reply for one upstream path.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    pub fn status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A local HTTP server standing in for the upstream. Replies are matched on
/// the request path; unknown paths get a 404.
pub struct TestUpstream {
    pub url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestUpstream {
    pub async fn spawn(replies: HashMap<String, Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let replies = Arc::new(replies);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let replies = replies.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        handle(req, replies.clone(), recorded.clone())
                    });
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        Self {
            url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

async fn handle(
    req: Request<Incoming>,
    replies: Arc<HashMap<String, Reply>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let path = parts.uri.path().to_string();
    recorded.lock().unwrap().push(RecordedRequest {
        method: parts.method,
        path: path.clone(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    });

    let reply = replies.get(&path).cloned().unwrap_or_else(|| {
        Reply::status(
            StatusCode::NOT_FOUND,
            json!({"errors": [{"code": 0, "message": "NotFound"}]}),
        )
    });

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let response = Response::builder()
        .status(reply.status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(reply.body.to_string())))
        .unwrap();
    Ok(response)
}

/// Replies for every resource of a healthy player profile.
pub fn profile_replies(subject_id: u64) -> HashMap<String, Reply> {
    let payloads = [
        (
            Resource::UserProfile,
            json!({
                "id": subject_id,
                "name": "builderman",
                "displayName": "Builder",
                "description": "Hello",
                "created": "2006-02-27T21:06:40.3Z",
                "isBanned": false,
                "hasVerifiedBadge": true,
                "inventory_rap": 1500,
            }),
        ),
        (Resource::Status, json!({"status": "Online"})),
        (Resource::Membership, json!(true)),
        (
            Resource::Badges,
            json!([{"id": 1, "name": "Administrator"}, {"id": 3, "name": "Combat Initiation"}]),
        ),
        (Resource::FollowersCount, json!({"count": 5})),
        (Resource::FollowingCount, json!({"count": 2})),
        (
            Resource::Friends,
            json!({"data": [{"id": 2, "name": "friend_a"}, {"id": 3, "name": "friend_b"}]}),
        ),
        (
            Resource::UsernameHistory,
            json!({"data": [{"name": "old_builder"}]}),
        ),
        (
            Resource::GroupRoles,
            json!({"data": [{"group": {"id": 1}, "role": {"name": "Owner"}}]}),
        ),
    ];

    payloads
        .into_iter()
        .map(|(resource, body)| (resource.path(subject_id), Reply::json(body)))
        .collect()
}

/// An upstream client pointed at `upstream` with default headers.
pub fn client_for(upstream: &TestUpstream, credential: Option<&str>, timeouts: &Timeouts) -> UpstreamClient {
    let config = UpstreamConfig {
        base_url: upstream.url.clone(),
        user_agent: "Pekora/WinInet".to_string(),
        cookie_name: ".PEKOSECURITY".to_string(),
        credential_env: "PEKOSECURITY".to_string(),
    };
    UpstreamClient::new(
        &config,
        credential.and_then(|c| SessionToken::new(c.to_string())),
        timeouts,
    )
    .unwrap()
}

/// Recorder keeping the current value of every gauge; counters and
/// histograms are dropped.
#[derive(Default)]
pub struct GaugeRecorder {
    gauges: Mutex<HashMap<String, Arc<GaugeValue>>>,
}

#[derive(Default)]
pub struct GaugeValue(Mutex<f64>);

impl GaugeFn for GaugeValue {
    fn increment(&self, value: f64) {
        *self.0.lock().unwrap() += value;
    }

    fn decrement(&self, value: f64) {
        *self.0.lock().unwrap() -= value;
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap() = value;
    }
}

impl GaugeRecorder {
    pub fn gauge(&self, name: &str) -> Option<f64> {
        let gauges = self.gauges.lock().unwrap();
        gauges.get(name).map(|value| *value.0.lock().unwrap())
    }
}

impl Recorder for GaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        let mut gauges = self.gauges.lock().unwrap();
        let value = gauges.entry(key.name().to_string()).or_default().clone();
        Gauge::from_arc(value)
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
