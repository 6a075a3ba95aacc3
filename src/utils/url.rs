//! URL utilities for consistent URL handling across the pipeline.

use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Extract the origin authority (`host` or `host:port`) of a URL.
    ///
    /// The probe scheduler buckets channels by this value so that one origin
    /// server is never hit by parallel probes.
    pub fn origin_host(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Whether a URL points at an HLS playlist rather than a direct media
    /// stream. Decided on the path component so query strings don't confuse
    /// the check; unparseable URLs fall back to a raw suffix test.
    pub fn is_hls_playlist(url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => parsed.path().ends_with(".m3u8"),
            Err(_) => url.ends_with(".m3u8"),
        }
    }

    /// Strip a trailing delivery directive (`$...`) from a stream URL.
    /// Some aggregated playlists append cache or quality hints after a `$`
    /// sentinel; everything from the sentinel onward is dropped before the
    /// URL is stored.
    pub fn truncate_at_directive(url: &str) -> &str {
        match url.find('$') {
            Some(idx) => &url[..idx],
            None => url,
        }
    }
}
