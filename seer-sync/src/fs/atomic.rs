//! Crash-safe file replacement.
//!
//! Content is written to a uniquely named temporary file in the destination's
//! directory, flushed to disk, optionally checked, and then renamed over the
//! destination. Readers see either the old file or the complete new one.

use crate::utils::errors::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replace `dest` with `bytes`.
pub fn replace_file(dest: &Path, bytes: &[u8]) -> Result<()> {
    replace_file_checked(dest, bytes, |_| Ok(()))
}

/// Atomically replace `dest` with `bytes`, running `verify` on the written
/// temporary file before it is renamed into place.
///
/// On any failure the temporary file is removed and `dest` is untouched.
pub fn replace_file_checked<F>(dest: &Path, bytes: &[u8], verify: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping `tmp` on an early return deletes it.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    verify(tmp.path())?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Create the parent directory of `path`, recursively.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::SyncError;
    use tempfile::TempDir;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_replace_creates_and_overwrites() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("a.json");

        replace_file(&dest, b"first")?;
        replace_file(&dest, b"second")?;

        assert_eq!(fs::read(&dest)?, b"second");
        assert_eq!(names(dir.path()), ["a.json"]);
        Ok(())
    }

    #[test]
    fn test_failed_verify_keeps_original() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("a.json");
        fs::write(&dest, b"original")?;

        let result = replace_file_checked(&dest, b"rejected", |tmp| {
            assert_eq!(fs::read(tmp)?, b"rejected");
            Err(SyncError::Format("nope".into()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&dest)?, b"original");
        assert_eq!(names(dir.path()), ["a.json"]);
        Ok(())
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("a.json");
        fs::create_dir(&dest)?;
        fs::write(dest.join("inner"), b"x")?;

        assert!(replace_file(&dest, b"new").is_err());
        assert!(dest.is_dir());
        assert_eq!(names(dir.path()), ["a.json"]);
        Ok(())
    }

    #[test]
    fn test_stale_temp_name_does_not_block_writes() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("a.json");
        fs::write(&dest, b"original")?;
        fs::create_dir(dir.path().join("a.json.tmp"))?;

        replace_file(&dest, b"new")?;

        assert_eq!(fs::read(&dest)?, b"new");
        Ok(())
    }

    #[test]
    fn test_ensure_parent_dir() -> Result<()> {
        let dir = TempDir::new()?;
        let nested = dir.path().join("x/y/z/file.json");

        ensure_parent_dir(&nested)?;
        assert!(dir.path().join("x/y/z").is_dir());
        ensure_parent_dir(Path::new("bare.json"))?;
        Ok(())
    }
}
