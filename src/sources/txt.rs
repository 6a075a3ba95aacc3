//! Simple-list playlist grammar (`Group,#genre#` / `Name,url` lines).
//!
//! A `#genre#` line switches the group context for every channel line that
//! follows it. Lines that don't split into exactly two fields are skipped;
//! nothing in this grammar is fatal.

use tracing::debug;

use crate::models::{Channel, PlaylistSource, normalize_tvg_name};
use crate::utils::UrlUtils;

const GENRE_MARKER: &str = "#genre#";

/// Parse a simple-list document into a [`PlaylistSource`].
///
/// Simple lists carry no EPG header and no display title; `title` is set to
/// the normalized name so simple-list channels validate cleanly in merges.
pub fn parse_txt(content: &str) -> PlaylistSource {
    let mut source = PlaylistSource::new();
    let mut current_group = String::new();

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let [first, second] = fields.as_slice() else {
            debug!(line_no = line_no + 1, line, "invalid line, skipped");
            continue;
        };

        if *second == GENRE_MARKER {
            current_group = first.to_string();
            continue;
        }

        let tvg_name = normalize_tvg_name(first);
        let url = UrlUtils::truncate_at_directive(second.trim()).to_string();
        source
            .channels_by_name
            .entry(tvg_name.clone())
            .or_default()
            .push(Channel {
                title: tvg_name.clone(),
                tvg_name,
                tvg_logo: String::new(),
                group: current_group.clone(),
                url,
            });
    }

    source
}
