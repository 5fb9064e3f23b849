//! Prometheus metrics for transform requests

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Buckets from 1ms to 10s
const DURATION_BUCKETS: [f64; 12] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Metrics owned by one server instance, on a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("daltek_transform_requests_total", "Transform requests by widget type and outcome"),
            &["widget", "outcome"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new("daltek_transform_duration_seconds", "Duration of transform requests in seconds")
                .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    pub fn record_transform(&self, widget: &str, success: bool, seconds: f64) {
        let outcome = if success { "success" } else { "error" };
        self.requests.with_label_values(&[widget, outcome]).inc();
        self.duration.observe(seconds);
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transform("echart", true, 0.02);
        metrics.record_transform("echart", true, 0.03);
        metrics.record_transform("table", false, 0.5);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"daltek_transform_requests_total{outcome="success",widget="echart"} 2"#));
        assert!(text.contains(r#"daltek_transform_requests_total{outcome="error",widget="table"} 1"#));
        assert!(text.contains("daltek_transform_duration_seconds_count 3"));
    }
}
