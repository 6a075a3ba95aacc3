//! Extended playlist grammar (`#EXTM3U` / `#EXTINF`).
//!
//! The first non-empty line must carry the EPG attribute header; failing to
//! parse it is fatal for the whole source. After the header the scanner
//! consumes alternating pairs: an `#EXTINF` metadata line followed by a URL
//! line. Metadata lines that don't match are logged and skipped without
//! aborting the scan.

use tracing::warn;

use crate::errors::{SourceError, SourceResult};
use crate::models::{Channel, PlaylistSource, normalize_tvg_name};
use crate::utils::UrlUtils;

const TAG_EXTM3U: &str = "#EXTM3U";
const TAG_EXTINF: &str = "#EXTINF:";

/// Parse an extended playlist document into a [`PlaylistSource`].
pub fn parse_m3u(content: &str) -> SourceResult<PlaylistSource> {
    let lines: Vec<&str> = content.lines().collect();

    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    let header = lines.get(idx).map(|l| l.trim()).unwrap_or_default();
    let epg_urls = parse_epg_header(header)?;
    idx += 1;

    let mut source = PlaylistSource {
        epg_urls,
        ..PlaylistSource::new()
    };

    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.is_empty() {
            idx += 1;
            continue;
        }
        let Some(mut channel) = parse_extinf_line(line) else {
            warn!(line_no = idx + 1, line, "cannot read channel info from line, skipped");
            idx += 1;
            continue;
        };
        let Some(url_line) = lines.get(idx + 1) else {
            // Metadata with no URL at end of input: nothing to store.
            break;
        };
        channel.url = UrlUtils::truncate_at_directive(url_line.trim()).to_string();
        source
            .channels_by_name
            .entry(channel.tvg_name.clone())
            .or_default()
            .push(channel);
        idx += 2;
    }

    Ok(source)
}

/// Parse the `#EXTM3U x-tvg-url="u1","u2"` header line.
fn parse_epg_header(line: &str) -> SourceResult<Vec<String>> {
    let invalid = || SourceError::InvalidHeader {
        line: line.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    let [tag, attribute] = parts.as_slice() else {
        return Err(invalid());
    };
    if *tag != TAG_EXTM3U {
        return Err(invalid());
    }
    let (key, value) = attribute.split_once('=').ok_or_else(invalid)?;
    if !key.eq_ignore_ascii_case("x-tvg-url") {
        return Err(invalid());
    }
    Ok(value
        .replace('"', "")
        .split(',')
        .map(str::to_string)
        .collect())
}

/// Parse one `#EXTINF` metadata line, or `None` if the line doesn't match
/// the expected tag shape.
fn parse_extinf_line(line: &str) -> Option<Channel> {
    let rest = line.strip_prefix(TAG_EXTINF)?;
    // Attributes sit before the last comma; the display title follows it.
    let comma = rest.rfind(',')?;
    let (attributes_part, title) = (&rest[..comma], rest[comma + 1..].trim());

    let mut channel = Channel {
        tvg_name: String::new(),
        tvg_logo: String::new(),
        group: String::new(),
        title: title.to_uppercase(),
        url: String::new(),
    };

    for (key, value) in parse_attributes(attributes_part) {
        match key.as_str() {
            "tvg-name" => channel.tvg_name = normalize_tvg_name(&value),
            "tvg-logo" => channel.tvg_logo = value,
            "group-title" => channel.group = value,
            // tvg-id and any unknown attributes are ignored
            _ => {}
        }
    }

    Some(channel)
}

/// Scan a `key="value"` attribute list, honoring quoting so values may
/// contain spaces.
fn parse_attributes(attributes: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;

    let mut flush = |key: &mut String, value: &mut String, in_value: &mut bool| {
        if *in_value && !value.is_empty() {
            attrs.push((
                key.trim().to_string(),
                value.trim_matches('"').to_string(),
            ));
        }
        key.clear();
        value.clear();
        *in_value = false;
    };

    for ch in attributes.chars() {
        match ch {
            '"' if in_value => {
                in_quotes = !in_quotes;
                current_value.push(ch);
            }
            '=' if !in_quotes && !in_value => in_value = true,
            ' ' | '\t' if !in_quotes => {
                flush(&mut current_key, &mut current_value, &mut in_value)
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }
    flush(&mut current_key, &mut current_value, &mut in_value);

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#EXTM3U x-tvg-url="https://epg.example.com/epg.gz"
#EXTINF:-1 tvg-name="CCTV1" tvg-logo="https://logo.example.com/CCTV1.png" group-title="Update Time",2025-07-09 09:06:36
http://php.example.com/TVOD/iptv.php?id=rthk33
#EXTINF:-1 tvg-name="CCTV1" tvg-logo="https://logo.example.com/CCTV1.png" group-title="CCTV Channels",CCTV-1
http://live.example.edu.cn/hls/cctv1hd.m3u8
"#;

    #[test]
    fn parses_header_and_channel_pairs() {
        let source = parse_m3u(SAMPLE).expect("parses");
        assert_eq!(source.epg_urls, vec!["https://epg.example.com/epg.gz"]);
        let bucket = &source.channels_by_name["CCTV1"];
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].group, "Update Time");
        assert_eq!(bucket[1].title, "CCTV-1");
        assert_eq!(bucket[1].url, "http://live.example.edu.cn/hls/cctv1hd.m3u8");
    }

    #[test]
    fn header_lists_multiple_epg_urls() {
        let source =
            parse_m3u("#EXTM3U x-tvg-url=\"http://a/epg.xml\",\"http://b/epg.xml\"\n").expect("parses");
        assert_eq!(source.epg_urls, vec!["http://a/epg.xml", "http://b/epg.xml"]);
    }

    #[test]
    fn missing_header_is_fatal() {
        assert!(matches!(
            parse_m3u("#EXTINF:-1 tvg-name=\"A\",A\nhttp://x\n"),
            Err(SourceError::InvalidHeader { .. })
        ));
        assert!(matches!(
            parse_m3u(""),
            Err(SourceError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn header_after_blank_lines_is_accepted() {
        let source = parse_m3u("\n\n#EXTM3U x-tvg-url=\"http://a/epg.xml\"\n").expect("parses");
        assert_eq!(source.epg_urls, vec!["http://a/epg.xml"]);
    }

    #[test]
    fn delivery_directive_is_truncated() {
        let content = "#EXTM3U x-tvg-url=\"http://a/epg.xml\"\n\
                       #EXTINF:-1 tvg-name=\"CCTV1\" group-title=\"G\",CCTV1\n\
                       http://x/y.ts$cache=1\n";
        let source = parse_m3u(content).expect("parses");
        assert_eq!(source.channels_by_name["CCTV1"][0].url, "http://x/y.ts");
    }

    #[test]
    fn malformed_metadata_lines_are_skipped() {
        let content = "#EXTM3U x-tvg-url=\"http://a/epg.xml\"\n\
                       this is junk\n\
                       #EXTINF:-1 tvg-name=\"CCTV1\" group-title=\"G\",CCTV1\n\
                       http://x/y.ts\n";
        let source = parse_m3u(content).expect("parses");
        assert_eq!(source.channel_count(), 1);
    }

    #[test]
    fn tvg_names_are_normalized() {
        let content = "#EXTM3U x-tvg-url=\"http://a/epg.xml\"\n\
                       #EXTINF:-1 tvg-name=\"cctv-5\" group-title=\"G\",cctv-5\n\
                       http://x/5.ts\n";
        let source = parse_m3u(content).expect("parses");
        assert!(source.channels_by_name.contains_key("CCTV5"));
        let channel = &source.channels_by_name["CCTV5"][0];
        assert_eq!(channel.tvg_name, "CCTV5");
        assert!(!channel.tvg_name.contains('-'));
    }

    #[test]
    fn quoted_attribute_values_may_contain_spaces() {
        let attrs = parse_attributes(
            r#"-1 tvg-name="BBC One" tvg-logo="http://l/1.png" group-title="UK TV""#,
        );
        assert!(attrs.contains(&("tvg-name".to_string(), "BBC One".to_string())));
        assert!(attrs.contains(&("group-title".to_string(), "UK TV".to_string())));
    }
}
