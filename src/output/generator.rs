//! Final playlist rendering for both grammars.
//!
//! Output ordering is driven exclusively by the taxonomy: groups in declared
//! order, names in declared order within a group. The internal bucket map is
//! never iterated directly. A synthetic sequential tvg-id is assigned per
//! (group, name) position, and a last-updated marker entry always precedes
//! all channel entries.

use std::fmt::Write as _;

use chrono::Local;

use crate::models::{ChannelGroup, PlaylistSource};

const GENRE_MARKER: &str = "#genre#";
const UPDATED_LABEL: &str = "UPDATED";
const UPDATED_MARKER_URL: &str = "http://127.0.0.1/last-updated";

fn timestamp() -> String {
    Local::now().format("%Y%m%d %H:%M:%S").to_string()
}

/// Render the extended playlist grammar.
pub fn render_m3u(source: &PlaylistSource, groups: &[ChannelGroup]) -> String {
    let mut out = String::new();

    let quoted: Vec<String> = source.epg_urls.iter().map(|u| format!("\"{u}\"")).collect();
    let _ = writeln!(out, "#EXTM3U x-tvg-url={}", quoted.join(","));

    let _ = writeln!(
        out,
        "#EXTINF:-1 tvg-name=\"{UPDATED_LABEL}\" tvg-logo=\"\" group-title=\"{UPDATED_LABEL}\",{}",
        timestamp()
    );
    let _ = writeln!(out, "{UPDATED_MARKER_URL}");

    let mut tvg_id = 0;
    for group in groups {
        for tvg_name in &group.tvg_names {
            tvg_id += 1;
            let Some(channels) = source.channels_by_name.get(tvg_name) else {
                continue;
            };
            for channel in channels {
                let _ = writeln!(
                    out,
                    "#EXTINF:-1 tvg-id=\"{tvg_id}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{}",
                    channel.tvg_name, channel.tvg_logo, group.label, channel.title
                );
                let _ = writeln!(out, "{}", channel.url);
            }
        }
    }

    out
}

/// Render the simple-list grammar.
pub fn render_txt(source: &PlaylistSource, groups: &[ChannelGroup]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{UPDATED_LABEL},{GENRE_MARKER}");
    let _ = writeln!(out, "{},{UPDATED_MARKER_URL}", timestamp());
    out.push('\n');

    for group in groups {
        let _ = writeln!(out, "{},{GENRE_MARKER}", group.label);
        for tvg_name in &group.tvg_names {
            let Some(channels) = source.channels_by_name.get(tvg_name) else {
                continue;
            };
            for channel in channels {
                let _ = writeln!(out, "{},{}", channel.tvg_name, channel.url);
            }
        }
    }

    out
}
