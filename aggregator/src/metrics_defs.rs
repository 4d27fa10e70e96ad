use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream fetch in seconds. Tagged with resource.",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "upstream.failures",
    metric_type: MetricType::Counter,
    description: "Failed upstream fetches during aggregation. Tagged with resource, kind.",
};

pub const AGGREGATE_TOTAL_FAILURES: MetricDef = MetricDef {
    name: "aggregate.total_failures",
    metric_type: MetricType::Counter,
    description: "Aggregations where every planned upstream fetch failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    UPSTREAM_REQUEST_DURATION,
    UPSTREAM_FAILURES,
    AGGREGATE_TOTAL_FAILURES,
];
