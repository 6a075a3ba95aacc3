//! Stream probing: latency pings, byte-capped throughput sampling, HLS
//! segment resolution, and the host-aware scheduler that drives them.
//!
//! The primitives sit behind the [`StreamProber`] trait so the scheduler can
//! be exercised without a network. All primitives observe the cancellation
//! token cooperatively and return [`ProbeError::Cancelled`] immediately when
//! it fires; cancellation never consumes a retry attempt.

pub mod hls;
pub mod pool;
pub mod scheduler;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::errors::{ProbeError, ProbeResult};
use crate::utils::HttpClient;

pub use pool::{PoolError, WorkerPool};
pub use scheduler::ProbeScheduler;

/// Probe primitives required by the scheduler.
#[async_trait]
pub trait StreamProber: Send + Sync {
    /// Round-trip latency of a lightweight request, in milliseconds.
    /// Success requires a 2xx status.
    async fn ping_latency(&self, url: &str, cancel: &CancellationToken) -> ProbeResult<u64>;

    /// Achieved download rate in kB/s, sampling up to the configured byte
    /// cap or stream end.
    async fn sample_throughput(&self, url: &str, cancel: &CancellationToken) -> ProbeResult<f64>;

    /// Resolve an HLS playlist to media segments and sample them. Returns
    /// the effective rate: the first segment rate meeting `floor_kbps`, or
    /// the mean across sampled segments otherwise.
    async fn sample_hls(
        &self,
        url: &str,
        floor_kbps: f64,
        cancel: &CancellationToken,
    ) -> ProbeResult<f64>;
}

/// [`StreamProber`] implementation backed by the shared HTTP client.
pub struct HttpProber {
    http: Arc<HttpClient>,
    byte_cap: u64,
}

impl HttpProber {
    pub fn new(http: Arc<HttpClient>, byte_cap: u64) -> Self {
        Self { http, byte_cap }
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Stream a response body until `byte_cap` bytes or end of stream,
    /// returning the achieved rate in kB/s. Chunk granularity may overshoot
    /// the cap slightly; the rate divides by the bytes actually read.
    async fn measure_download(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> ProbeResult<f64> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            response = self.http.probe_get(url).send() => response?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }

        let start = Instant::now();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                None => break,
                Some(Err(err)) => return Err(ProbeError::Request(err)),
                Some(Ok(bytes)) => {
                    downloaded += bytes.len() as u64;
                    if downloaded >= self.byte_cap {
                        break;
                    }
                }
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        if downloaded == 0 || elapsed <= 0.0 {
            return Err(ProbeError::EmptySample);
        }
        Ok(downloaded as f64 / elapsed / 1024.0)
    }
}

#[async_trait]
impl StreamProber for HttpProber {
    async fn ping_latency(&self, url: &str, cancel: &CancellationToken) -> ProbeResult<u64> {
        let start = Instant::now();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            response = self.http.probe_head(url).send() => response?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }
        Ok(start.elapsed().as_millis() as u64)
    }

    async fn sample_throughput(&self, url: &str, cancel: &CancellationToken) -> ProbeResult<f64> {
        self.measure_download(url, cancel).await
    }

    async fn sample_hls(
        &self,
        url: &str,
        floor_kbps: f64,
        cancel: &CancellationToken,
    ) -> ProbeResult<f64> {
        hls::sample_hls_playlist(self, url, floor_kbps, cancel).await
    }
}
