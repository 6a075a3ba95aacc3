//! The linear curation pipeline.
//!
//! Stages run strictly in sequence (ingest, merge, probe, stamp, serialize)
//! with no cyclic or re-entrant state. Only ingestion and probing fan out
//! concurrently, and each is joined before the next stage starts. A
//! cancelled run still joins promptly and writes whatever partial result the
//! probe stage produced.

pub mod merge;
pub mod projector;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppResult;
use crate::output;
use crate::probe::{HttpProber, ProbeScheduler, WorkerPool};
use crate::sources::SourceIngestor;
use crate::utils::HttpClient;

/// Run the whole pipeline and return the path the curated playlist was
/// written to.
pub async fn run(config: &Config, cancel: &CancellationToken) -> AppResult<PathBuf> {
    let http = Arc::new(HttpClient::new(&config.http)?);

    // Ingest: every file and URL in parallel, each parsed and
    // taxonomy-filtered before it lands in the source list.
    let ingestor = SourceIngestor::new(http.clone(), config.probe.retry_times);
    let mut pool = WorkerPool::new(config.probe.workers, cancel.clone());
    let sources = ingestor
        .ingest_all(
            config.sources.local_path.as_deref(),
            &config.sources.urls,
            &config.groups,
            &mut pool,
            cancel,
        )
        .await;
    info!("Ingested {} playlist sources", sources.len());

    let merged = merge::merge_sources(&sources);
    info!(
        "Merged sources: {} channels across {} names, {} EPG urls",
        merged.channel_count(),
        merged.channels_by_name.len(),
        merged.epg_urls.len()
    );

    // Probe: the only stage with real concurrency.
    let prober = Arc::new(HttpProber::new(http, config.probe.sample_byte_cap));
    let scheduler = ProbeScheduler::new(prober, config.probe.clone());
    let mut pool = WorkerPool::new(config.probe.workers, cancel.clone());
    let mut filtered = scheduler
        .probe_source(&merged, &config.groups, &mut pool, cancel)
        .await;
    if cancel.is_cancelled() {
        warn!("Run cancelled; the filtered result is partial");
    } else {
        info!(
            "Probing complete: {} channels passed",
            filtered.channel_count()
        );
    }

    projector::stamp_groups(&mut filtered, &config.groups);

    output::write_playlist(&filtered, &config.groups, &config.output.file).await
}
