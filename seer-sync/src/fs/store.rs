//! Persisted version document.
//!
//! Holds the manifest snapshot of the last sync. Loading never fails: a
//! missing document is a first run, and a corrupt one falls back to the
//! backup copy and then to an empty manifest. A document that cannot be
//! read at all is left in place and treated as empty. Saving keeps a backup
//! of the previous good document and replaces the file atomically.
//!
//! There is no cross-process locking. Two concurrent runs against the same
//! document are not safe.

use crate::config::StoreConfig;
use crate::fs::atomic;
use crate::manifest::Manifest;
use crate::utils::errors::{Result, SyncError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub struct VersionStore {
    path: PathBuf,
    backup_path: PathBuf,
}

impl VersionStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.version_file.clone(),
            backup_path: config.backup_file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Load the last synced snapshot.
    pub fn load(&self) -> Manifest {
        if !self.path.exists() {
            info!("No local version file at {}, treating as first sync", self.path.display());
            return Manifest::empty();
        }

        match read_manifest(&self.path) {
            Ok(manifest) => return manifest,
            Err(e @ (SyncError::InvalidJson { .. } | SyncError::NotAMapping(_))) => {
                warn!("Local version file {} is corrupt: {}", self.path.display(), e)
            }
            Err(e) => {
                error!("Cannot read local version file {}: {}", self.path.display(), e);
                return Manifest::empty();
            }
        }

        match self.restore_backup() {
            Ok(()) => match read_manifest(&self.path) {
                Ok(manifest) => {
                    info!("Restored {} from backup", self.path.display());
                    return manifest;
                }
                Err(e) => warn!("Restored version file is still unusable: {}", e),
            },
            Err(e) => warn!("Could not restore from backup {}: {}", self.backup_path.display(), e),
        }

        warn!("Falling back to an empty local manifest; every file will be re-downloaded");
        Manifest::empty()
    }

    /// Persist `manifest` as the new snapshot.
    ///
    /// The root must be a mapping. On failure the previous document and its
    /// backup are left as they were.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if !manifest.is_node() {
            return Err(SyncError::NotAMapping(self.path.display().to_string()));
        }

        self.backup_current();

        if let Err(e) = atomic::ensure_parent_dir(&self.path) {
            error!("Cannot create directory for {}: {}", self.path.display(), e);
            return Err(e);
        }

        let bytes = serde_json::to_vec_pretty(manifest)?;
        atomic::replace_file_checked(&self.path, &bytes, |tmp| read_manifest(tmp).map(|_| ()))
            .inspect_err(|e| error!("Failed to save {}: {}", self.path.display(), e))?;

        debug!("Saved version file {} ({} leaves)", self.path.display(), manifest.leaf_count());
        Ok(())
    }

    /// Copy the current document to the backup slot, but only if it is
    /// itself valid so a good backup is never replaced by a corrupt file.
    fn backup_current(&self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = read_manifest(&self.path) {
            warn!("Not backing up invalid version file {}: {}", self.path.display(), e);
            return;
        }
        match fs::copy(&self.path, &self.backup_path) {
            Ok(_) => debug!("Backed up {} to {}", self.path.display(), self.backup_path.display()),
            Err(e) => warn!("Failed to back up {}: {}", self.path.display(), e),
        }
    }

    fn restore_backup(&self) -> Result<()> {
        let bytes = fs::read(&self.backup_path)?;
        atomic::replace_file(&self.path, &bytes)
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let bytes = fs::read(path)?;
    Manifest::from_slice(&bytes, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> VersionStore {
        VersionStore::new(&StoreConfig {
            version_file: dir.path().join("version.json"),
            backup_suffix: ".backup".to_string(),
        })
    }

    fn sample() -> Manifest {
        Manifest::from(json!({
            "files": {"resource": {"config": {"json": {"test.json": "hash123"}}}},
            "version": "1.0.0"
        }))
    }

    #[test]
    fn test_missing_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).load(), Manifest::empty());
    }

    #[test]
    fn test_save_then_load_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        store.save(&sample())?;
        assert_eq!(store.load(), sample());

        let text = fs::read_to_string(store.path())?;
        assert!(text.contains("\n  \"files\""), "document should be indented: {text}");
        Ok(())
    }

    #[test]
    fn test_save_rejects_non_mapping() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        store.save(&sample())?;
        let before = fs::read(store.path())?;

        let result = store.save(&Manifest::Leaf(json!("not a mapping")));

        assert!(matches!(result, Err(SyncError::NotAMapping(_))));
        assert_eq!(fs::read(store.path())?, before);
        Ok(())
    }

    #[test]
    fn test_save_backs_up_previous_document() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        let newer = Manifest::from(json!({"version": "2.0.0"}));

        store.save(&sample())?;
        store.save(&newer)?;

        let backup = Manifest::from_slice(&fs::read(store.backup_path())?, "backup")?;
        assert_eq!(backup, sample());
        assert_eq!(store.load(), newer);
        Ok(())
    }

    #[test]
    fn test_corrupt_document_restored_from_backup() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        store.save(&sample())?;
        store.save(&sample())?;

        fs::write(store.path(), b"corrupted data")?;

        assert_eq!(store.load(), sample());
        // The document itself was repaired.
        assert_eq!(read_manifest(store.path())?, sample());
        Ok(())
    }

    #[test]
    fn test_non_mapping_document_restored_from_backup() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        store.save(&sample())?;
        store.save(&sample())?;

        fs::write(store.path(), b"[1, 2, 3]")?;

        assert_eq!(store.load(), sample());
        Ok(())
    }

    #[test]
    fn test_corrupt_document_without_backup_loads_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        fs::write(store.path(), b"{ truncated")?;

        assert_eq!(store.load(), Manifest::empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_document_does_not_clobber_backup() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        store.save(&sample())?;
        store.save(&sample())?;
        fs::write(store.path(), b"garbage")?;

        store.save(&Manifest::from(json!({"version": "3"})))?;

        let backup = Manifest::from_slice(&fs::read(store.backup_path())?, "backup")?;
        assert_eq!(backup, sample());
        Ok(())
    }

    #[test]
    fn test_stale_temp_directory_does_not_block_save() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        store.save(&sample())?;
        fs::create_dir(dir.path().join("version.json.tmp"))?;

        let newer = Manifest::from(json!({"version": "9"}));
        store.save(&newer)?;

        assert_eq!(store.load(), newer);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_document_is_not_overwritten_by_backup() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        fs::write(store.backup_path(), serde_json::to_vec(&sample())?)?;
        // Reading through a link to a directory fails with an I/O error,
        // while a rename over the link itself would succeed.
        fs::create_dir(dir.path().join("elsewhere"))?;
        std::os::unix::fs::symlink(dir.path().join("elsewhere"), store.path())?;

        assert_eq!(store.load(), Manifest::empty());
        assert!(fs::symlink_metadata(store.path())?.file_type().is_symlink());
        Ok(())
    }

    mod properties {
        use super::*;
        use crate::manifest::strategy::arb_manifest;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn test_saved_mapping_loads_back_unchanged(first in arb_manifest(), second in arb_manifest()) {
                let dir = TempDir::new().unwrap();
                let store = store_in(&dir);

                store.save(&first).unwrap();
                prop_assert_eq!(store.load(), first.clone());

                store.save(&second).unwrap();
                prop_assert_eq!(store.load(), second);
                let backup = Manifest::from_slice(&fs::read(store.backup_path()).unwrap(), "backup").unwrap();
                prop_assert_eq!(backup, first);
            }
        }
    }
}
