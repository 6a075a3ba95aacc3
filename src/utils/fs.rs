//! Filesystem helpers for source discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively collect files under `dir` whose extension matches one of
/// `extensions` (compared without the leading dot, case-insensitively).
/// Results are sorted so ingestion order is stable across runs.
pub fn find_files_by_extension(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
            });
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_only_matching_extensions_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join("a.m3u"), "#EXTM3U").expect("write");
        fs::write(nested.join("b.txt"), "x,y").expect("write");
        fs::write(nested.join("c.M3U8"), "#EXTM3U").expect("write");
        fs::write(nested.join("ignored.json"), "{}").expect("write");

        let files = find_files_by_extension(dir.path(), &["m3u", "m3u8", "txt"])
            .expect("walk succeeds");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.m3u", "b.txt", "c.M3U8"]);
    }
}
