//! Taxonomy projection: restrict a source to the configured channel set and
//! stamp authoritative group labels.

use std::collections::HashMap;

use crate::models::{ChannelGroup, PlaylistSource};

/// Drop every bucket whose tvg-name is not referenced by the taxonomy.
pub fn filter_by_groups(source: &mut PlaylistSource, groups: &[ChannelGroup]) {
    let mut retained = HashMap::new();
    for group in groups {
        for tvg_name in &group.tvg_names {
            if let Some(channels) = source.channels_by_name.remove(tvg_name) {
                retained.insert(tvg_name.clone(), channels);
            }
        }
    }
    source.channels_by_name = retained;
}

/// Overwrite the group of every retained channel with the label of the
/// taxonomy entry that selects its name. Upstream group metadata is never
/// trusted for final output; stamping twice is a no-op.
pub fn stamp_groups(source: &mut PlaylistSource, groups: &[ChannelGroup]) {
    for group in groups {
        for tvg_name in &group.tvg_names {
            let Some(channels) = source.channels_by_name.get_mut(tvg_name) else {
                continue;
            };
            for channel in channels {
                channel.group = group.label.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;

    fn channel(name: &str, group: &str) -> Channel {
        Channel {
            tvg_name: name.to_string(),
            tvg_logo: String::new(),
            group: group.to_string(),
            title: name.to_string(),
            url: format!("http://x/{name}.ts"),
        }
    }

    fn groups() -> Vec<ChannelGroup> {
        vec![ChannelGroup {
            label: "News".to_string(),
            tvg_names: vec!["CCTV1".to_string(), "CCTV13".to_string()],
        }]
    }

    #[test]
    fn unreferenced_buckets_are_dropped() {
        let mut source = PlaylistSource::new();
        for name in ["CCTV1", "CCTV13", "HBO"] {
            source
                .channels_by_name
                .insert(name.to_string(), vec![channel(name, "upstream")]);
        }
        filter_by_groups(&mut source, &groups());

        assert_eq!(source.channels_by_name.len(), 2);
        assert!(!source.channels_by_name.contains_key("HBO"));
    }

    #[test]
    fn stamping_overwrites_upstream_groups_and_is_idempotent() {
        let mut source = PlaylistSource::new();
        source
            .channels_by_name
            .insert("CCTV1".to_string(), vec![channel("CCTV1", "whatever upstream said")]);

        stamp_groups(&mut source, &groups());
        assert_eq!(source.channels_by_name["CCTV1"][0].group, "News");

        stamp_groups(&mut source, &groups());
        assert_eq!(source.channels_by_name["CCTV1"][0].group, "News");
    }
}
