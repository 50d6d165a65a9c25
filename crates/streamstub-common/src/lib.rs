pub type Result<T> = core::result::Result<T, StubError>;

#[derive(thiserror::Error, Debug)]
pub enum StubError {
    /// The response body was dropped before the stream finished.
    #[error("client disconnected before the stream completed")]
    ClientGone,
    #[error("failed to encode stream record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub mod config {
    use serde::Deserialize;
    use std::env;

    use crate::{Result, StubError};

    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8000;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    pub struct StubConfig {
        pub host: String,
        pub port: u16,
    }

    impl Default for StubConfig {
        fn default() -> Self {
            Self {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            }
        }
    }

    impl StubConfig {
        /// `STUB_CONFIG` (a YAML file) wins over `STUB_HOST` / `STUB_PORT`.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("STUB_CONFIG") {
                let text = std::fs::read_to_string(&path)?;
                return Self::from_yaml_str(&text);
            }
            let mut cfg = Self::default();
            if let Ok(host) = env::var("STUB_HOST") {
                cfg.host = host;
            }
            if let Some(v) = env::var("STUB_PORT").ok().and_then(|v| v.parse().ok()) { cfg.port = v; }
            Ok(cfg)
        }

        pub fn from_yaml_str(text: &str) -> Result<Self> {
            if text.trim().is_empty() {
                return Ok(Self::default());
            }
            serde_yaml::from_str(text).map_err(|e| StubError::Config(e.to_string()))
        }

        pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
            if let Some(host) = host { self.host = host; }
            if let Some(port) = port { self.port = port; }
            self
        }
    }
}
