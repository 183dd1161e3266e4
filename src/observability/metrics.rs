use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub ride_transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub dispatch_offers_total: IntCounterVec,
    pub compensations_total: IntCounterVec,
    pub payments_total: IntCounterVec,
    pub online_drivers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ride_transitions_total = IntCounterVec::new(
            Opts::new(
                "ride_transitions_total",
                "Ride conditional transitions by name and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid ride_transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of ride conditional transitions in seconds",
            ),
            &["transition"],
        )
        .expect("valid transition_latency_seconds metric");

        let dispatch_offers_total = IntCounterVec::new(
            Opts::new("dispatch_offers_total", "Dispatch offers by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_offers_total metric");

        let compensations_total = IntCounterVec::new(
            Opts::new("compensations_total", "Compensating transitions by saga and outcome"),
            &["saga", "outcome"],
        )
        .expect("valid compensations_total metric");

        let payments_total = IntCounterVec::new(
            Opts::new("payments_total", "Payment settlement events by outcome"),
            &["outcome"],
        )
        .expect("valid payments_total metric");

        let online_drivers = IntGauge::new("online_drivers", "Drivers currently online")
            .expect("valid online_drivers metric");

        registry
            .register(Box::new(ride_transitions_total.clone()))
            .expect("register ride_transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(dispatch_offers_total.clone()))
            .expect("register dispatch_offers_total");
        registry
            .register(Box::new(compensations_total.clone()))
            .expect("register compensations_total");
        registry
            .register(Box::new(payments_total.clone()))
            .expect("register payments_total");
        registry
            .register(Box::new(online_drivers.clone()))
            .expect("register online_drivers");

        Self {
            registry,
            ride_transitions_total,
            transition_latency_seconds,
            dispatch_offers_total,
            compensations_total,
            payments_total,
            online_drivers,
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
