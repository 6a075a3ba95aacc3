//! Source ingestion: local playlist discovery, remote fetch with retry,
//! format detection, and per-source taxonomy filtering.
//!
//! Each input (file or URL) yields one [`PlaylistSource`]; sources that fail
//! to load or parse are dropped with a log and the run continues. Ingestion
//! fans out over the shared worker pool and is joined before merging.

pub mod m3u;
pub mod txt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::SourceResult;
use crate::models::{ChannelGroup, PlaylistSource};
use crate::pipeline::projector;
use crate::probe::WorkerPool;
use crate::utils::HttpClient;
use crate::utils::fs::find_files_by_extension;

pub use m3u::parse_m3u;
pub use txt::parse_txt;

/// File extensions recognized as playlist sources during local discovery.
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "txt"];

pub struct SourceIngestor {
    http: Arc<HttpClient>,
    retry_times: u32,
}

impl SourceIngestor {
    pub fn new(http: Arc<HttpClient>, retry_times: u32) -> Self {
        Self { http, retry_times }
    }

    /// Load, parse and taxonomy-filter every configured source, fanning out
    /// over the worker pool. The pool is joined before returning, so the
    /// result is complete (or as complete as a cancelled run allows).
    pub async fn ingest_all(
        &self,
        local_path: Option<&Path>,
        urls: &[String],
        groups: &[ChannelGroup],
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Vec<PlaylistSource> {
        let collected: Arc<Mutex<Vec<PlaylistSource>>> = Arc::new(Mutex::new(Vec::new()));

        if let Some(dir) = local_path {
            info!("Searching local playlist files under {}", dir.display());
            match find_files_by_extension(dir, PLAYLIST_EXTENSIONS) {
                Err(err) => error!("Failed to search local files, ignored: {err}"),
                Ok(files) => {
                    if !files.is_empty() {
                        info!("Found {} local playlist files", files.len());
                    }
                    for file in files {
                        let groups = groups.to_vec();
                        let collected = collected.clone();
                        let task_cancel = cancel.clone();
                        let submitted = pool.submit(async move {
                            if let Some(source) =
                                ingest_local_file(&file, &groups, &task_cancel).await
                            {
                                collected.lock().await.push(source);
                            }
                        });
                        if let Err(err) = submitted {
                            debug!("Failed to submit ingestion task: {err}");
                            break;
                        }
                    }
                }
            }
        }

        if !urls.is_empty() {
            info!("Loading {} remote playlist sources", urls.len());
        }
        for url in urls {
            let url = url.clone();
            let groups = groups.to_vec();
            let collected = collected.clone();
            let http = self.http.clone();
            let retry_times = self.retry_times;
            let task_cancel = cancel.clone();
            let submitted = pool.submit(async move {
                if let Some(source) =
                    ingest_remote_url(&http, &url, retry_times, &groups, &task_cancel).await
                {
                    collected.lock().await.push(source);
                }
            });
            if let Err(err) = submitted {
                debug!("Failed to submit ingestion task: {err}");
                break;
            }
        }

        pool.join().await;

        match Arc::try_unwrap(collected) {
            Ok(mutex) => mutex.into_inner(),
            Err(arc) => arc.lock().await.clone(),
        }
    }
}

async fn ingest_local_file(
    file: &PathBuf,
    groups: &[ChannelGroup],
    cancel: &CancellationToken,
) -> Option<PlaylistSource> {
    if cancel.is_cancelled() {
        return None;
    }
    info!("Processing local playlist file {}", file.display());
    let content = match tokio::fs::read_to_string(file).await {
        Ok(content) => content,
        Err(err) => {
            error!("Failed to read {}, ignored: {err}", file.display());
            return None;
        }
    };

    let is_txt = file
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    let parsed = if is_txt {
        Ok(parse_txt(&content))
    } else {
        parse_m3u(&content)
    };
    finish_source(parsed, &file.display().to_string(), groups)
}

async fn ingest_remote_url(
    http: &HttpClient,
    url: &str,
    retry_times: u32,
    groups: &[ChannelGroup],
    cancel: &CancellationToken,
) -> Option<PlaylistSource> {
    info!("Processing remote playlist source {url}");
    let content = match http.fetch_text_with_retry(url, retry_times, cancel).await {
        Ok(content) => content,
        Err(err) if err.is_cancelled() => return None,
        Err(err) => {
            error!("Failed to load {url}, ignored: {err}");
            return None;
        }
    };
    finish_source(parse_any(&content), url, groups)
}

/// Parse content in whichever grammar it is written in: extended playlists
/// always open with a `#` tag line, anything else is a simple list.
pub fn parse_any(content: &str) -> SourceResult<PlaylistSource> {
    if content.trim_start().starts_with('#') {
        parse_m3u(content)
    } else {
        Ok(parse_txt(content))
    }
}

fn finish_source(
    parsed: SourceResult<PlaylistSource>,
    origin: &str,
    groups: &[ChannelGroup],
) -> Option<PlaylistSource> {
    let mut source = match parsed {
        Ok(source) => source,
        Err(err) => {
            error!("Failed to parse {origin}, ignored: {err}");
            return None;
        }
    };
    if source.is_empty() {
        info!("No channels found in {origin}, ignored");
        return None;
    }
    projector::filter_by_groups(&mut source, groups);
    debug!(
        "Parsed {origin}: {} channels retained after taxonomy filter",
        source.channel_count()
    );
    Some(source)
}
