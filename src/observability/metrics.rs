use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_loads_total: IntCounterVec,
    pub order_actions_total: IntCounterVec,
    pub action_latency_seconds: HistogramVec,
    pub sync_signals_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_loads_total = IntCounterVec::new(
            Opts::new("order_loads_total", "Order reloads by outcome"),
            &["outcome"],
        )
        .expect("valid order_loads_total metric");

        let order_actions_total = IntCounterVec::new(
            Opts::new(
                "order_actions_total",
                "Lifecycle actions by action and outcome",
            ),
            &["action", "outcome"],
        )
        .expect("valid order_actions_total metric");

        let action_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "action_latency_seconds",
                "Latency of backend lifecycle calls in seconds",
            ),
            &["action"],
        )
        .expect("valid action_latency_seconds metric");

        let sync_signals_total = IntCounterVec::new(
            Opts::new("sync_signals_total", "Reload triggers by signal source"),
            &["source"],
        )
        .expect("valid sync_signals_total metric");

        registry
            .register(Box::new(order_loads_total.clone()))
            .expect("register order_loads_total");
        registry
            .register(Box::new(order_actions_total.clone()))
            .expect("register order_actions_total");
        registry
            .register(Box::new(action_latency_seconds.clone()))
            .expect("register action_latency_seconds");
        registry
            .register(Box::new(sync_signals_total.clone()))
            .expect("register sync_signals_total");

        Self {
            registry,
            order_loads_total,
            order_actions_total,
            action_latency_seconds,
            sync_signals_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
