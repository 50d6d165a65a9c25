//! Query-string parameters for the stream routes.
//!
//! Parsing is total: anything missing, malformed or out of range falls back
//! to a default instead of rejecting the request.

use std::time::Duration;

pub const DEFAULT_CHUNKS: usize = 50;
pub const DEFAULT_BYTES_PER_CHUNK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Content lines to emit, always >= 1.
    pub chunks: usize,
    /// Spaces in every `delta`, always >= 1.
    pub bytes_per_chunk: usize,
    /// Pause after each content line; <= 0 disables it.
    pub delay_ms: i64,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self { chunks: DEFAULT_CHUNKS, bytes_per_chunk: DEFAULT_BYTES_PER_CHUNK, delay_ms: 0 }
    }
}

impl StreamParams {
    /// Reads `chunks`, `bytes` and `delay_ms` from decoded query pairs.
    /// The first occurrence of a repeated key wins.
    pub fn parse<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Self {
        Self {
            chunks: positive_or(lookup(pairs, "chunks"), DEFAULT_CHUNKS),
            bytes_per_chunk: positive_or(lookup(pairs, "bytes"), DEFAULT_BYTES_PER_CHUNK),
            delay_ms: lookup(pairs, "delay_ms").and_then(parse_int).unwrap_or(0),
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms as u64))
    }
}

fn lookup<'a, K: AsRef<str>, V: AsRef<str>>(pairs: &'a [(K, V)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k.as_ref() == key).map(|(_, v)| v.as_ref())
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(parse_int)
        .filter(|v| *v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}
