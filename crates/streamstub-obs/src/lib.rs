//! Observability utilities: stream counters and text exposition

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, TextEncoder};

static REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!("stub_requests_total", "Stream requests by route", &["route"]).unwrap()
});
static CHUNKS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("stub_chunks_emitted_total", "Content lines flushed").unwrap());
static BYTES: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("stub_bytes_emitted_total", "Body bytes flushed").unwrap());
static ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter!("stub_streams_aborted_total", "Streams cut short by a client disconnect").unwrap()
});

static ENCODER: Lazy<TextEncoder> = Lazy::new(TextEncoder::new);

/// Cheap handle over the process-wide counters.
#[derive(Clone)]
pub struct StreamMetrics {
    requests: IntCounterVec,
    chunks: IntCounter,
    bytes: IntCounter,
    aborted: IntCounter,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            requests: REQUESTS.clone(),
            chunks: CHUNKS.clone(),
            bytes: BYTES.clone(),
            aborted: ABORTED.clone(),
        }
    }

    pub fn request(&self, route: &str) { self.requests.with_label_values(&[route]).inc(); }
    pub fn chunk_flushed(&self) { self.chunks.inc(); }
    pub fn bytes_flushed(&self, n: usize) { self.bytes.inc_by(n as u64); }
    pub fn stream_aborted(&self) { self.aborted.inc(); }

    pub fn requests_for(&self, route: &str) -> u64 { self.requests.with_label_values(&[route]).get() }
    pub fn chunks_total(&self) -> u64 { self.chunks.get() }
    pub fn aborted_total(&self) -> u64 { self.aborted.get() }
}

impl Default for StreamMetrics {
    fn default() -> Self { Self::new() }
}

pub fn content_type() -> String {
    ENCODER.format_type().to_string()
}

/// Encodes every metric in the default registry.
pub fn render() -> prometheus::Result<Vec<u8>> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    ENCODER.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}
