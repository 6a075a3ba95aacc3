//! Core channel-list data model shared by every pipeline stage.

use std::collections::HashMap;

use serde::Deserialize;

/// A single candidate stream for a channel.
///
/// `tvg_name` is normalized at parse time (see [`normalize_tvg_name`]) and is
/// the join key for grouping and merging across sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub tvg_name: String,
    pub tvg_logo: String,
    pub group: String,
    pub title: String,
    pub url: String,
}

/// One parsed playlist: its EPG document URLs plus all channels bucketed by
/// normalized tvg-name.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSource {
    pub epg_urls: Vec<String>,
    pub channels_by_name: HashMap<String, Vec<Channel>>,
}

impl PlaylistSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an empty source with one pre-declared bucket per taxonomy name.
    /// Target-style merges and the probe stage only ever append into buckets
    /// declared here.
    pub fn skeleton(groups: &[ChannelGroup]) -> Self {
        let mut source = Self::new();
        for group in groups {
            for tvg_name in &group.tvg_names {
                source
                    .channels_by_name
                    .entry(tvg_name.clone())
                    .or_default();
            }
        }
        source
    }

    /// Total number of channels across all buckets.
    pub fn channel_count(&self) -> usize {
        self.channels_by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channel_count() == 0
    }
}

/// One entry of the operator-supplied taxonomy.
///
/// The order of groups, and of names within a group, is authoritative for
/// both channel selection and final output order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelGroup {
    pub label: String,
    pub tvg_names: Vec<String>,
}

/// Canonical tvg-name form: uppercased with hyphens and stray quotes
/// removed. Channels from either playlist grammar merge by this key.
pub fn normalize_tvg_name(raw: &str) -> String {
    raw.trim().to_uppercase().replace(['-', '"'], "")
}

/// Case- and hyphen-insensitive name comparison used by merge validation.
pub fn names_equivalent(a: &str, b: &str) -> bool {
    normalize_tvg_name(a) == normalize_tvg_name(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_uppercases_and_strips_hyphens() {
        assert_eq!(normalize_tvg_name("cctv-1"), "CCTV1");
        assert_eq!(normalize_tvg_name(" CCTV-5+ "), "CCTV5+");
        assert_eq!(normalize_tvg_name("\"BBC-One\""), "BBCONE");
    }

    #[test]
    fn name_equivalence_ignores_case_and_hyphens() {
        assert!(names_equivalent("CCTV1", "CCTV-1"));
        assert!(names_equivalent("cctv-1", "CCTV1"));
        assert!(!names_equivalent("CCTV1", "CCTV2"));
    }

    #[test]
    fn skeleton_declares_one_bucket_per_name() {
        let groups = vec![
            ChannelGroup {
                label: "News".into(),
                tvg_names: vec!["CCTV1".into(), "CCTV13".into()],
            },
            ChannelGroup {
                label: "Sports".into(),
                tvg_names: vec!["CCTV5".into()],
            },
        ];
        let source = PlaylistSource::skeleton(&groups);
        assert_eq!(source.channels_by_name.len(), 3);
        assert!(source.channels_by_name["CCTV5"].is_empty());
        assert!(source.is_empty());
    }
}
