//! Host-aware probe scheduling.
//!
//! Many channels for one provider share an origin host, and providers
//! rate-limit aggressively. Channels are therefore bucketed by
//! `(origin host, tvg-name)` and each bucket is probed sequentially by a
//! single pool task; distinct buckets fan out across the bounded pool. The
//! first channel in a bucket that passes is kept and the rest of the bucket
//! is skipped, so each host contributes at most one URL per name while
//! separate hosts can still each contribute one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::models::{Channel, ChannelGroup, PlaylistSource};
use crate::probe::{StreamProber, WorkerPool};
use crate::utils::UrlUtils;

/// channels keyed by origin host, then by tvg-name
type HostBuckets = HashMap<String, HashMap<String, Vec<Channel>>>;

pub struct ProbeScheduler {
    prober: Arc<dyn StreamProber>,
    limits: ProbeConfig,
}

impl ProbeScheduler {
    pub fn new(prober: Arc<dyn StreamProber>, limits: ProbeConfig) -> Self {
        Self { prober, limits }
    }

    /// Probe every EPG URL and candidate channel of `source`, returning a
    /// fresh source containing only what passed. A cancelled run returns
    /// whatever had been accepted so far; the caller treats it as partial.
    pub async fn probe_source(
        &self,
        source: &PlaylistSource,
        groups: &[ChannelGroup],
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> PlaylistSource {
        let filtered = Arc::new(Mutex::new(PlaylistSource::skeleton(groups)));

        self.schedule_epg_checks(&source.epg_urls, &filtered, pool, cancel);
        self.schedule_channel_probes(source, groups, &filtered, pool, cancel);

        debug!(tasks = pool.pending(), "probe tasks scheduled, waiting for join");
        pool.join().await;

        match Arc::try_unwrap(filtered) {
            Ok(mutex) => mutex.into_inner(),
            Err(arc) => arc.lock().await.clone(),
        }
    }

    /// EPG URLs get a pure latency check, one independent pool task each.
    fn schedule_epg_checks(
        &self,
        epg_urls: &[String],
        filtered: &Arc<Mutex<PlaylistSource>>,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) {
        for epg_url in epg_urls {
            if epg_url.is_empty() {
                continue;
            }
            let url = epg_url.clone();
            let prober = self.prober.clone();
            let filtered = filtered.clone();
            let max_latency_ms = self.limits.max_latency_ms;
            let task_cancel = cancel.clone();
            let submitted = pool.submit(async move {
                match prober.ping_latency(&url, &task_cancel).await {
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => warn!(%url, "failed to ping EPG url, ignored: {err}"),
                    Ok(latency) if latency > max_latency_ms => {
                        info!(%url, latency, "EPG url latency too high, ignored");
                    }
                    Ok(latency) => {
                        info!(%url, latency, "EPG url latency ok");
                        filtered.lock().await.epg_urls.push(url);
                    }
                }
            });
            if let Err(err) = submitted {
                debug!("Failed to submit EPG check task: {err}");
                return;
            }
        }
    }

    fn schedule_channel_probes(
        &self,
        source: &PlaylistSource,
        groups: &[ChannelGroup],
        filtered: &Arc<Mutex<PlaylistSource>>,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) {
        let buckets = bucket_by_host(source, groups);
        for (host, by_name) in buckets {
            for (tvg_name, channels) in by_name {
                info!(
                    %host,
                    %tvg_name,
                    candidates = channels.len(),
                    "scheduling channel bucket"
                );
                let prober = self.prober.clone();
                let limits = self.limits.clone();
                let filtered = filtered.clone();
                let task_cancel = cancel.clone();
                let submitted = pool.submit(async move {
                    probe_bucket(prober, limits, tvg_name, channels, filtered, task_cancel)
                        .await;
                });
                if let Err(err) = submitted {
                    debug!("Failed to submit probe task: {err}");
                    return;
                }
            }
        }
    }
}

/// Partition candidate channels into `(origin host, tvg-name)` buckets,
/// iterating the taxonomy so only selected names are considered. Channels
/// with unparseable URLs are dropped here; audio-only endpoints are not
/// probed at all.
fn bucket_by_host(source: &PlaylistSource, groups: &[ChannelGroup]) -> HostBuckets {
    let mut buckets: HostBuckets = HashMap::new();
    for group in groups {
        for tvg_name in &group.tvg_names {
            let Some(channels) = source.channels_by_name.get(tvg_name) else {
                continue;
            };
            for channel in channels {
                if channel.url.contains("audio") {
                    continue;
                }
                let Some(host) = UrlUtils::origin_host(&channel.url) else {
                    warn!(
                        %tvg_name,
                        url = %channel.url,
                        "failed to parse channel url, ignored"
                    );
                    continue;
                };
                buckets
                    .entry(host)
                    .or_default()
                    .entry(tvg_name.clone())
                    .or_default()
                    .push(channel.clone());
            }
        }
    }
    buckets
}

/// Probe one bucket sequentially; the first passing channel is appended to
/// the shared result and the rest of the bucket is skipped.
async fn probe_bucket(
    prober: Arc<dyn StreamProber>,
    limits: ProbeConfig,
    tvg_name: String,
    channels: Vec<Channel>,
    filtered: Arc<Mutex<PlaylistSource>>,
    cancel: CancellationToken,
) {
    for channel in channels {
        if cancel.is_cancelled() {
            return;
        }
        info!(%tvg_name, url = %channel.url, "testing channel url");
        match probe_channel_with_retry(prober.as_ref(), &limits, &channel, &cancel).await {
            ProbeOutcome::Cancelled => return,
            ProbeOutcome::Rejected => continue,
            ProbeOutcome::Accepted => {
                info!(%tvg_name, url = %channel.url, "channel is ok");
                filtered
                    .lock()
                    .await
                    .channels_by_name
                    .entry(tvg_name.clone())
                    .or_default()
                    .push(channel);
                // One working URL per (host, name) is enough.
                return;
            }
        }
    }
}

enum ProbeOutcome {
    Accepted,
    Rejected,
    Cancelled,
}

/// Run the appropriate probe for one channel, retrying transient failures
/// (and under-floor measurements) up to the configured attempt count.
/// Cancellation is surfaced immediately without consuming an attempt.
async fn probe_channel_with_retry(
    prober: &dyn StreamProber,
    limits: &ProbeConfig,
    channel: &Channel,
    cancel: &CancellationToken,
) -> ProbeOutcome {
    let mut attempt = 0;
    loop {
        match probe_channel(prober, limits, channel, cancel).await {
            Err(err) if err.is_cancelled() => return ProbeOutcome::Cancelled,
            Err(err) => {
                warn!(url = %channel.url, attempt, "channel probe failed: {err}");
            }
            Ok(true) => return ProbeOutcome::Accepted,
            Ok(false) => {
                warn!(url = %channel.url, attempt, "channel below thresholds");
            }
        }
        if attempt >= limits.retry_times {
            return ProbeOutcome::Rejected;
        }
        attempt += 1;
        debug!(url = %channel.url, attempt, "retrying channel probe");
    }
}

async fn probe_channel(
    prober: &dyn StreamProber,
    limits: &ProbeConfig,
    channel: &Channel,
    cancel: &CancellationToken,
) -> crate::errors::ProbeResult<bool> {
    if limits.ping_channels {
        let latency = prober.ping_latency(&channel.url, cancel).await?;
        if latency > limits.max_latency_ms {
            debug!(url = %channel.url, latency, "channel latency over ceiling");
            return Ok(false);
        }
    }
    let kbps = if UrlUtils::is_hls_playlist(&channel.url) {
        prober
            .sample_hls(&channel.url, limits.min_kbps, cancel)
            .await?
    } else {
        prober.sample_throughput(&channel.url, cancel).await?
    };
    Ok(kbps >= limits.min_kbps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::errors::{ProbeError, ProbeResult};

    /// Prober scripted per URL: records every probe call and passes only
    /// the URLs it was told to.
    struct ScriptedProber {
        passing: HashSet<String>,
        latencies: HashMap<String, u64>,
        failures_before_pass: HashMap<String, AtomicUsize>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn passing<const N: usize>(urls: [&str; N]) -> Self {
            Self {
                passing: urls.iter().map(|u| u.to_string()).collect(),
                latencies: HashMap::new(),
                failures_before_pass: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl StreamProber for ScriptedProber {
        async fn ping_latency(&self, url: &str, _cancel: &CancellationToken) -> ProbeResult<u64> {
            self.calls.lock().await.push(format!("ping {url}"));
            Ok(self.latencies.get(url).copied().unwrap_or(10))
        }

        async fn sample_throughput(
            &self,
            url: &str,
            _cancel: &CancellationToken,
        ) -> ProbeResult<f64> {
            self.calls.lock().await.push(format!("sample {url}"));
            if let Some(remaining) = self.failures_before_pass.get(url) {
                if remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(ProbeError::EmptySample);
                }
            }
            if self.passing.contains(url) {
                Ok(4096.0)
            } else {
                Ok(16.0)
            }
        }

        async fn sample_hls(
            &self,
            url: &str,
            _floor_kbps: f64,
            _cancel: &CancellationToken,
        ) -> ProbeResult<f64> {
            self.calls.lock().await.push(format!("hls {url}"));
            if self.passing.contains(url) { Ok(4096.0) } else { Ok(16.0) }
        }
    }

    fn channel(name: &str, url: &str) -> Channel {
        Channel {
            tvg_name: name.to_string(),
            tvg_logo: String::new(),
            group: String::new(),
            title: name.to_string(),
            url: url.to_string(),
        }
    }

    fn source_of(channels: &[Channel]) -> PlaylistSource {
        let mut source = PlaylistSource::new();
        for ch in channels {
            source
                .channels_by_name
                .entry(ch.tvg_name.clone())
                .or_default()
                .push(ch.clone());
        }
        source
    }

    fn groups(names: &[&str]) -> Vec<ChannelGroup> {
        vec![ChannelGroup {
            label: "Test".to_string(),
            tvg_names: names.iter().map(|n| n.to_string()).collect(),
        }]
    }

    fn limits() -> ProbeConfig {
        ProbeConfig {
            max_latency_ms: 1000,
            min_kbps: 512.0,
            retry_times: 1,
            workers: 4,
            sample_byte_cap: 1024,
            ping_channels: false,
        }
    }

    async fn run_scheduler(
        prober: Arc<ScriptedProber>,
        source: &PlaylistSource,
        groups: &[ChannelGroup],
        limits: ProbeConfig,
    ) -> PlaylistSource {
        let cancel = CancellationToken::new();
        let mut pool = WorkerPool::new(limits.workers, cancel.clone());
        let scheduler = ProbeScheduler::new(prober, limits);
        scheduler.probe_source(source, groups, &mut pool, &cancel).await
    }

    #[tokio::test]
    async fn first_pass_short_circuits_the_bucket() {
        let prober = Arc::new(ScriptedProber::passing([
            "http://one.example.com/a.ts",
            "http://one.example.com/b.ts",
        ]));
        let source = source_of(&[
            channel("CCTV1", "http://one.example.com/a.ts"),
            channel("CCTV1", "http://one.example.com/b.ts"),
        ]);
        let filtered =
            run_scheduler(prober.clone(), &source, &groups(&["CCTV1"]), limits()).await;

        assert_eq!(filtered.channels_by_name["CCTV1"].len(), 1);
        assert_eq!(
            filtered.channels_by_name["CCTV1"][0].url,
            "http://one.example.com/a.ts"
        );
        // The second candidate in the bucket is never probed.
        assert_eq!(prober.calls().await, vec!["sample http://one.example.com/a.ts"]);
    }

    #[tokio::test]
    async fn distinct_hosts_each_contribute_one_url() {
        let prober = Arc::new(ScriptedProber::passing([
            "http://one.example.com/a.ts",
            "http://two.example.com/a.ts",
        ]));
        let source = source_of(&[
            channel("CCTV1", "http://one.example.com/a.ts"),
            channel("CCTV1", "http://two.example.com/a.ts"),
        ]);
        let filtered =
            run_scheduler(prober.clone(), &source, &groups(&["CCTV1"]), limits()).await;

        let urls: HashSet<_> = filtered.channels_by_name["CCTV1"]
            .iter()
            .map(|c| c.url.as_str())
            .collect();
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn failing_channels_are_retried_then_rejected() {
        let mut prober = ScriptedProber::passing([]);
        prober.failures_before_pass.insert(
            "http://one.example.com/a.ts".to_string(),
            AtomicUsize::new(usize::MAX),
        );
        let prober = Arc::new(prober);
        let source = source_of(&[channel("CCTV1", "http://one.example.com/a.ts")]);
        let filtered =
            run_scheduler(prober.clone(), &source, &groups(&["CCTV1"]), limits()).await;

        assert!(filtered.channels_by_name["CCTV1"].is_empty());
        // retry_times = 1 means one initial attempt plus one retry.
        assert_eq!(prober.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_passes_on_retry() {
        let mut prober = ScriptedProber::passing(["http://one.example.com/a.ts"]);
        prober.failures_before_pass.insert(
            "http://one.example.com/a.ts".to_string(),
            AtomicUsize::new(1),
        );
        let prober = Arc::new(prober);
        let source = source_of(&[channel("CCTV1", "http://one.example.com/a.ts")]);
        let filtered =
            run_scheduler(prober.clone(), &source, &groups(&["CCTV1"]), limits()).await;

        assert_eq!(filtered.channels_by_name["CCTV1"].len(), 1);
    }

    #[tokio::test]
    async fn audio_urls_are_never_probed() {
        let prober = Arc::new(ScriptedProber::passing([]));
        let source = source_of(&[channel("CCTV1", "http://one.example.com/audio/a.ts")]);
        let filtered =
            run_scheduler(prober.clone(), &source, &groups(&["CCTV1"]), limits()).await;

        assert!(filtered.channels_by_name["CCTV1"].is_empty());
        assert!(prober.calls().await.is_empty());
    }

    #[tokio::test]
    async fn epg_urls_are_filtered_by_latency() {
        let mut prober = ScriptedProber::passing([]);
        prober
            .latencies
            .insert("http://slow.example.com/epg.xml".to_string(), 5000);
        prober
            .latencies
            .insert("http://fast.example.com/epg.xml".to_string(), 40);
        let prober = Arc::new(prober);

        let mut source = PlaylistSource::new();
        source.epg_urls = vec![
            "http://slow.example.com/epg.xml".to_string(),
            "http://fast.example.com/epg.xml".to_string(),
        ];
        let filtered = run_scheduler(prober, &source, &groups(&[]), limits()).await;

        assert_eq!(filtered.epg_urls, vec!["http://fast.example.com/epg.xml"]);
    }

    #[tokio::test]
    async fn cancelled_run_probes_nothing_and_joins_promptly() {
        let prober = Arc::new(ScriptedProber::passing(["http://one.example.com/a.ts"]));
        let source = source_of(&[channel("CCTV1", "http://one.example.com/a.ts")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut pool = WorkerPool::new(2, cancel.clone());
        let scheduler = ProbeScheduler::new(prober.clone(), limits());

        let filtered = tokio::time::timeout(
            Duration::from_secs(1),
            scheduler.probe_source(&source, &groups(&["CCTV1"]), &mut pool, &cancel),
        )
        .await
        .expect("join must return promptly after cancellation");

        assert!(filtered.channels_by_name["CCTV1"].is_empty());
        assert!(prober.calls().await.is_empty());
    }
}
