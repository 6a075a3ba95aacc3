//! HLS playlist resolution and segment sampling.
//!
//! A playlist either references media segments directly or indirects to a
//! variant playlist (an entry whose path itself ends in `.m3u8`). Variants
//! are followed recursively, rebasing relative resolution on the followed
//! URL; the indirection depth is bounded so a misbehaving origin cannot
//! chain playlists forever.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::errors::{ProbeError, ProbeResult};
use crate::probe::{HttpProber, StreamProber};

/// Maximum variant-playlist indirections before the probe fails.
pub const MAX_PLAYLIST_DEPTH: usize = 4;

/// What one scan of a playlist document found.
#[derive(Debug, PartialEq, Eq)]
enum PlaylistEntries {
    /// The playlist indirects to another playlist.
    Variant(Url),
    /// Absolute media segment URLs, in document order.
    Segments(Vec<Url>),
}

/// Scan playlist text for media entries. Relative URIs are resolved against
/// `base`; unparseable lines are skipped. The first entry that is itself a
/// playlist wins and switches the caller to variant-following.
fn scan_playlist(content: &str, base: &Url) -> PlaylistEntries {
    let mut segments = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let absolute = match base.join(line) {
            Ok(url) => url,
            Err(err) => {
                debug!(line, "skipping unresolvable playlist entry: {err}");
                continue;
            }
        };
        if absolute.path().ends_with(".m3u8") {
            return PlaylistEntries::Variant(absolute);
        }
        segments.push(absolute);
    }
    PlaylistEntries::Segments(segments)
}

/// Pick the segments worth sampling: the first, and the last when more than
/// one exists.
fn select_probe_segments(segments: Vec<Url>) -> Vec<Url> {
    match segments.len() {
        0 | 1 => segments,
        n => {
            let mut segments = segments;
            let last = segments.swap_remove(n - 1);
            segments.truncate(1);
            segments.push(last);
            segments
        }
    }
}

/// Resolve a playlist URL down to the media segments to sample.
async fn resolve_segments(
    prober: &HttpProber,
    url: &Url,
    depth: usize,
    cancel: &CancellationToken,
) -> ProbeResult<Vec<Url>> {
    if depth >= MAX_PLAYLIST_DEPTH {
        return Err(ProbeError::PlaylistTooDeep {
            max: MAX_PLAYLIST_DEPTH,
        });
    }
    let content = prober.http().fetch_text(url.as_str(), cancel).await?;
    match scan_playlist(&content, url) {
        PlaylistEntries::Variant(next) => {
            debug!(variant = %next, "following variant playlist");
            Box::pin(resolve_segments(prober, &next, depth + 1, cancel)).await
        }
        PlaylistEntries::Segments(segments) if segments.is_empty() => {
            Err(ProbeError::NoSegments {
                url: url.to_string(),
            })
        }
        PlaylistEntries::Segments(segments) => Ok(select_probe_segments(segments)),
    }
}

/// Sample the media behind an HLS playlist URL.
///
/// Accept fast: any single segment at or above `floor_kbps` ends sampling
/// and its rate is returned. Otherwise the arithmetic mean across the
/// selected segments is returned; segments that fail to sample contribute
/// nothing to the sum but still count toward the mean.
pub(super) async fn sample_hls_playlist(
    prober: &HttpProber,
    url: &str,
    floor_kbps: f64,
    cancel: &CancellationToken,
) -> ProbeResult<f64> {
    let playlist_url = Url::parse(url)?;
    let segments = resolve_segments(prober, &playlist_url, 0, cancel).await?;

    let selected = segments.len();
    let mut total_kbps = 0.0;
    for segment in &segments {
        match prober.sample_throughput(segment.as_str(), cancel).await {
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                warn!(segment = %segment, "failed to sample segment, skipped: {err}");
                continue;
            }
            Ok(kbps) => {
                total_kbps += kbps;
                if kbps >= floor_kbps {
                    return Ok(kbps);
                }
            }
        }
    }

    if selected > 1 {
        total_kbps /= selected as f64;
    }
    Ok(total_kbps)
}
