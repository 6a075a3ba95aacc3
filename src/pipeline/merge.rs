//! Source merging with global URL de-duplication.
//!
//! Two merge shapes exist and are deliberately kept distinct: folding many
//! sources into a new one, and folding sources into an existing target whose
//! buckets were pre-declared. Both validate that a channel's name and title
//! agree (case- and hyphen-insensitively) and both de-duplicate URLs across
//! the whole merge, but only the target-style merge restricts which names
//! may appear.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{Channel, PlaylistSource, names_equivalent};

/// Fold every input source into a fresh merged source.
///
/// EPG URLs are unioned order-preservingly. A channel is accepted only when
/// its normalized name and title agree; on acceptance the title is rewritten
/// to the tvg-name so merged buckets are internally consistent. A URL seen
/// anywhere earlier in the merge is skipped, whichever bucket it came from.
pub fn merge_sources(sources: &[PlaylistSource]) -> PlaylistSource {
    let mut merged = PlaylistSource::new();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for source in sources {
        union_epg_urls(&mut merged.epg_urls, &source.epg_urls);
        for (tvg_name, channels) in &source.channels_by_name {
            let bucket = merged.channels_by_name.entry(tvg_name.clone()).or_default();
            for channel in channels {
                if let Some(accepted) = validate_channel(channel, &mut seen_urls) {
                    bucket.push(accepted);
                }
            }
        }
    }
    merged
}

/// Fold sources into an existing target skeleton.
///
/// Identical per-channel rules to [`merge_sources`], except that only
/// tvg-names already declared as buckets in the target are considered;
/// anything else is skipped with a warning.
pub fn merge_into_target(sources: &[PlaylistSource], target: &mut PlaylistSource) {
    let mut seen_urls: HashSet<String> = target
        .channels_by_name
        .values()
        .flatten()
        .map(|channel| channel.url.clone())
        .collect();

    for source in sources {
        union_epg_urls(&mut target.epg_urls, &source.epg_urls);
        for (tvg_name, channels) in &source.channels_by_name {
            let Some(bucket) = target.channels_by_name.get_mut(tvg_name) else {
                warn!(%tvg_name, "tvg name not declared in merge target, skipped");
                continue;
            };
            for channel in channels {
                if let Some(accepted) = validate_channel(channel, &mut seen_urls) {
                    bucket.push(accepted);
                }
            }
        }
    }
}

/// Order-preserving union: keep the first occurrence of each URL.
fn union_epg_urls(merged: &mut Vec<String>, incoming: &[String]) {
    for url in incoming {
        if !merged.contains(url) {
            merged.push(url.clone());
        }
    }
}

fn validate_channel(channel: &Channel, seen_urls: &mut HashSet<String>) -> Option<Channel> {
    if !names_equivalent(&channel.tvg_name, &channel.title) {
        debug!(
            tvg_name = %channel.tvg_name,
            title = %channel.title,
            "channel title does not match name, skipped"
        );
        return None;
    }
    if !seen_urls.insert(channel.url.clone()) {
        debug!(url = %channel.url, "channel url already merged, skipped");
        return None;
    }
    let mut accepted = channel.clone();
    accepted.title = accepted.tvg_name.clone();
    Some(accepted)
}
