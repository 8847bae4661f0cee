// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics - Prometheus observability for the lifecycle engine
// ============================================================================
//
// Counts what the operators of a multi-tenant kitchen actually watch:
// orders created, transitions by target status, rejected transitions by
// reason, claim races lost, event fan-out outcomes, and pricing rejections.
// Scraped via the /metrics endpoint.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub transitions_total: IntCounterVec,
    pub transitions_denied: IntCounterVec,
    pub claim_conflicts: IntCounter,
    pub transition_duration: HistogramVec,

    pub events_published: IntCounter,
    pub events_publish_failed: IntCounter,

    pub pricing_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Successful status transitions"),
            &["target"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let transitions_denied = IntCounterVec::new(
            Opts::new("order_transitions_denied_total", "Rejected transitions"),
            &["reason"],
        )?;
        registry.register(Box::new(transitions_denied.clone()))?;

        let claim_conflicts = IntCounter::new(
            "order_claim_conflicts_total",
            "Claim attempts that lost the race",
        )?;
        registry.register(Box::new(claim_conflicts.clone()))?;

        let transition_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_transition_duration_seconds",
                "End-to-end transition handling duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["target"],
        )?;
        registry.register(Box::new(transition_duration.clone()))?;

        let events_published =
            IntCounter::new("order_events_published_total", "Events fanned out")?;
        registry.register(Box::new(events_published.clone()))?;

        let events_publish_failed = IntCounter::new(
            "order_events_publish_failed_total",
            "Events dropped after publish failure",
        )?;
        registry.register(Box::new(events_publish_failed.clone()))?;

        let pricing_failures = IntCounterVec::new(
            Opts::new("order_pricing_failures_total", "Order creation pricing rejections"),
            &["kind"],
        )?;
        registry.register(Box::new(pricing_failures.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            transitions_total,
            transitions_denied,
            claim_conflicts,
            transition_duration,
            events_published,
            events_publish_failed,
            pricing_failures,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, target: &str, duration_secs: f64) {
        self.transitions_total.with_label_values(&[target]).inc();
        self.transition_duration
            .with_label_values(&[target])
            .observe(duration_secs);
    }

    pub fn record_denial(&self, reason: &str) {
        self.transitions_denied.with_label_values(&[reason]).inc();
    }

    pub fn record_publish(&self, success: bool) {
        if success {
            self.events_published.inc();
        } else {
            self.events_publish_failed.inc();
        }
    }

    pub fn record_pricing_failure(&self, kind: &str) {
        self.pricing_failures.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("preparing", 0.02);
        metrics.record_transition("preparing", 0.01);

        let gathered = metrics.registry.gather();
        let transitions = gathered
            .iter()
            .find(|m| m.name() == "order_transitions_total")
            .unwrap();
        assert_eq!(transitions.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_record_denial_by_reason() {
        let metrics = Metrics::new().unwrap();
        metrics.record_denial("illegal_transition");
        metrics.record_denial("not_assignee");

        let gathered = metrics.registry.gather();
        let denied = gathered
            .iter()
            .find(|m| m.name() == "order_transitions_denied_total")
            .unwrap();
        assert_eq!(denied.metric.len(), 2);
    }

    #[test]
    fn test_record_publish_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish(true);
        metrics.record_publish(true);
        metrics.record_publish(false);

        let gathered = metrics.registry.gather();
        let published = gathered
            .iter()
            .find(|m| m.name() == "order_events_published_total")
            .unwrap();
        assert_eq!(published.metric[0].counter.value, Some(2.0));
        let failed = gathered
            .iter()
            .find(|m| m.name() == "order_events_publish_failed_total")
            .unwrap();
        assert_eq!(failed.metric[0].counter.value, Some(1.0));
    }
}
