//! Layered configuration: a YAML file merged with environment overrides.
//!
//! Everything has a default except the taxonomy; a missing file yields a
//! runnable (if empty) configuration so CLI overrides alone can drive a run.
//! Configuration is an explicit value threaded through the pipeline entry
//! point; there is no ambient global.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::{ChannelGroup, normalize_tvg_name};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub groups: Vec<ChannelGroup>,
}

/// Where playlists come from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    /// Remote playlist URLs, fetched with retry.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Optional directory searched recursively for local playlist files.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Target path; the extension selects the output grammar.
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

/// Probe thresholds and scheduling bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Latency ceiling for EPG URLs (and channels when `ping_channels` is
    /// set), in milliseconds.
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    /// Throughput floor a stream must reach, in kB/s.
    #[serde(default = "default_min_kbps")]
    pub min_kbps: f64,
    /// Additional attempts after a failed probe or fetch.
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    /// Worker pool size; the upper bound on concurrent probe tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-sample download cap in bytes.
    #[serde(default = "default_sample_byte_cap")]
    pub sample_byte_cap: u64,
    /// Latency pre-check for channels before throughput sampling.
    #[serde(default)]
    pub ping_channels: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Default User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Per-origin-host User-Agent overrides, keyed by `host[:port]`.
    #[serde(default)]
    pub host_user_agents: HashMap<String, String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total timeout for plain document fetches. Probe downloads are bounded
    /// by the sample byte cap instead.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("curated.m3u")
}
fn default_max_latency_ms() -> u64 {
    1000
}
fn default_min_kbps() -> f64 {
    512.0
}
fn default_retry_times() -> u32 {
    1
}
fn default_workers() -> usize {
    8
}
fn default_sample_byte_cap() -> u64 {
    10 * 1024 * 1024
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: default_max_latency_ms(),
            min_kbps: default_min_kbps(),
            retry_times: default_retry_times(),
            workers: default_workers(),
            sample_byte_cap: default_sample_byte_cap(),
            ping_channels: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            host_user_agents: HashMap::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file plus `M3U_CURATOR_*` environment
    /// overrides (nested keys split on `__`).
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(
                "Config file {} not found, using defaults and environment only",
                path.display()
            );
        }
        let figment = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("M3U_CURATOR_").split("__"));
        let mut config: Config = figment.extract().map_err(|e| AppError::Configuration {
            message: e.to_string(),
        })?;
        config.normalize_group_names();
        Ok(config)
    }

    /// Taxonomy names are compared against normalized channel names, so
    /// normalize them once at load time.
    fn normalize_group_names(&mut self) {
        for group in &mut self.groups {
            for tvg_name in &mut group.tvg_names {
                *tvg_name = normalize_tvg_name(tvg_name);
            }
        }
    }
}
