use std::sync::{Arc, OnceLock};

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Per-function evaluation metrics.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    batches_total: CounterVec,
    rows_total: CounterVec,
    eval_errors_total: CounterVec,
    eval_seconds: HistogramVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Record one evaluated batch for `function`.
    pub fn record_batch(&self, function: &str, rows: u64, secs: f64) {
        let labels = [function];
        self.inner
            .batches_total
            .with_label_values(&labels)
            .inc();
        self.inner
            .rows_total
            .with_label_values(&labels)
            .inc_by(rows as f64);
        self.inner
            .eval_seconds
            .with_label_values(&labels)
            .observe(secs.max(0.0));
    }

    /// Record one failed evaluation (batch aborted) for `function`.
    pub fn record_error(&self, function: &str) {
        self.inner
            .eval_errors_total
            .with_label_values(&[function])
            .inc();
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let batches_total = counter_vec(
            &registry,
            "udflare_function_batches_total",
            "Batches evaluated per function",
            &["function"],
        );
        let rows_total = counter_vec(
            &registry,
            "udflare_function_rows_total",
            "Rows evaluated per function",
            &["function"],
        );
        let eval_errors_total = counter_vec(
            &registry,
            "udflare_function_eval_errors_total",
            "Aborted batch evaluations per function",
            &["function"],
        );
        let eval_seconds = histogram_vec(
            &registry,
            "udflare_function_eval_seconds",
            "Wall time spent evaluating one batch",
            &["function"],
        );

        Self {
            registry,
            batches_total,
            rows_total,
            eval_errors_total,
            eval_seconds,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_renders_function_metrics() {
        let m = MetricsRegistry::new();
        m.record_batch("gcd", 1024, 0.01);
        m.record_batch("gcd", 512, 0.02);
        m.record_error("gcd");
        let text = m.render_prometheus();

        assert!(text.contains("udflare_function_batches_total"));
        assert!(text.contains("udflare_function_rows_total"));
        assert!(text.contains("udflare_function_eval_errors_total"));
        assert!(text.contains("udflare_function_eval_seconds"));
    }
}
