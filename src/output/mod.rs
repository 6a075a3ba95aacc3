//! Output stage: grammar selection by file extension and the file sink.
//!
//! Write failure here is fatal to the whole run; every earlier stage
//! tolerates individual source failures, this one does not.

pub mod generator;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::{ChannelGroup, PlaylistSource};

pub use generator::{render_m3u, render_txt};

/// Output grammar, decided by the target file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    M3u,
    Txt,
}

impl OutputFormat {
    /// Choose the grammar for a path. Unknown extensions render the
    /// extended grammar and have `.m3u` appended to the file name.
    pub fn for_path(path: &Path) -> (Self, PathBuf) {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("txt") => (Self::Txt, path.to_path_buf()),
            Some("m3u") | Some("m3u8") => (Self::M3u, path.to_path_buf()),
            _ => {
                let mut name = path.as_os_str().to_os_string();
                name.push(".m3u");
                (Self::M3u, PathBuf::from(name))
            }
        }
    }
}

/// Render `source` in the grammar implied by `path` and write it, creating
/// parent directories as needed. Returns the path actually written.
pub async fn write_playlist(
    source: &PlaylistSource,
    groups: &[ChannelGroup],
    path: &Path,
) -> AppResult<PathBuf> {
    let (format, target) = OutputFormat::for_path(path);
    let content = match format {
        OutputFormat::M3u => render_m3u(source, groups),
        OutputFormat::Txt => render_txt(source, groups),
    };

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| AppError::OutputWrite {
                path: target.clone(),
                source,
            })?;
    }
    tokio::fs::write(&target, content.as_bytes())
        .await
        .map_err(|source| AppError::OutputWrite {
            path: target.clone(),
            source,
        })?;

    info!("Wrote curated playlist to {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_selects_grammar_and_unknowns_become_m3u() {
        let (format, path) = OutputFormat::for_path(Path::new("out/list.txt"));
        assert_eq!(format, OutputFormat::Txt);
        assert_eq!(path, Path::new("out/list.txt"));

        let (format, _) = OutputFormat::for_path(Path::new("out/list.m3u8"));
        assert_eq!(format, OutputFormat::M3u);

        let (format, path) = OutputFormat::for_path(Path::new("out/list"));
        assert_eq!(format, OutputFormat::M3u);
        assert_eq!(path, Path::new("out/list.m3u"));
    }

    #[tokio::test]
    async fn write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("deep/nested/out.m3u");

        let source = PlaylistSource::new();
        let written = write_playlist(&source, &[], &target)
            .await
            .expect("write succeeds");
        assert_eq!(written, target);

        let content = std::fs::read_to_string(&written).expect("readable");
        assert!(content.starts_with("#EXTM3U"));
    }

    #[tokio::test]
    async fn txt_target_renders_simple_list_grammar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("out.txt");

        let source = PlaylistSource::new();
        write_playlist(&source, &[], &target)
            .await
            .expect("write succeeds");

        let content = std::fs::read_to_string(&target).expect("readable");
        assert!(content.starts_with("UPDATED,#genre#"));
    }
}
