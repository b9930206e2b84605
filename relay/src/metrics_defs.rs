use shared::metrics_defs::{MetricDef, MetricType};

pub const RELAY_DURATION: MetricDef = MetricDef {
    name: "relay.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch a token and submit one form response, in seconds",
};

pub const RELAY_OUTCOME: MetricDef = MetricDef {
    name: "relay.outcome",
    metric_type: MetricType::Counter,
    description: "Relay attempts. Tagged with outcome.",
};

pub const RELAYS_INFLIGHT: MetricDef = MetricDef {
    name: "relay.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of relay attempts currently waiting on upstream",
};

pub const ALL_METRICS: &[MetricDef] = &[RELAY_DURATION, RELAY_OUTCOME, RELAYS_INFLIGHT];
