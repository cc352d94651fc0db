//! Directory traversal for batch operations over the local mirror.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Directory names that are not descended into
    pub exclude_dirs: Vec<String>,

    /// Keep only files whose name ends with this suffix (case-insensitive)
    pub suffix: Option<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            exclude_dirs: vec![
                ".git".to_string(),
                "venv".to_string(),
                "node_modules".to_string(),
            ],
            suffix: None,
        }
    }
}

/// Walk a directory tree and collect every matching regular file, in a
/// stable (name-sorted) order.
///
/// # Example
/// ```no_run
/// use seer_sync::fs::walker::{walk_files, WalkOptions};
/// use std::path::Path;
///
/// let options = WalkOptions { suffix: Some(".json".into()), ..WalkOptions::default() };
/// let files = walk_files(Path::new("files"), &options).unwrap();
/// println!("Found {} JSON files", files.len());
/// ```
pub fn walk_files(root: &Path, options: &WalkOptions) -> std::io::Result<Vec<PathBuf>> {
    let suffix = options.suffix.as_ref().map(|s| s.to_lowercase());
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, &options.exclude_dirs));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if suffix.as_deref().map_or(true, |s| name.ends_with(s)) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn is_excluded_dir(entry: &DirEntry, exclude: &[String]) -> bool {
    // The root itself is always walked.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    exclude.iter().any(|ex| name == ex.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let files = walk_files(temp_dir.path(), &WalkOptions::default())?;
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::write(temp_dir.path().join("file1.json"), b"{}")?;
        fs::write(temp_dir.path().join("subdir/file2.json"), b"{}")?;

        let files = walk_files(temp_dir.path(), &WalkOptions::default())?;
        assert_eq!(files.len(), 2);

        Ok(())
    }

    #[test]
    fn test_suffix_filter_is_case_insensitive() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("a.json"), b"{}")?;
        fs::write(temp_dir.path().join("B.JSON"), b"{}")?;
        fs::write(temp_dir.path().join("c.xml"), b"<c/>")?;

        let options = WalkOptions {
            suffix: Some(".json".to_string()),
            ..WalkOptions::default()
        };
        let files = walk_files(temp_dir.path(), &options)?;
        assert_eq!(files.len(), 2);

        Ok(())
    }

    #[test]
    fn test_excluded_directories_are_pruned() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir_all(temp_dir.path().join("node_modules/pkg"))?;
        fs::create_dir(temp_dir.path().join("keep"))?;
        fs::write(temp_dir.path().join("node_modules/pkg/x.json"), b"{}")?;
        fs::write(temp_dir.path().join("keep/y.json"), b"{}")?;

        let files = walk_files(temp_dir.path(), &WalkOptions::default())?;
        assert_eq!(files, vec![temp_dir.path().join("keep/y.json")]);

        Ok(())
    }
}
