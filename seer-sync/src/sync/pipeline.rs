//! Download-and-persist of changed files.
//!
//! Files are processed one at a time. Each download is retried on transient
//! errors, checked for content, written atomically and, for JSON, handed to
//! the formatter. A failure is recorded and the batch moves on.

use crate::config::RemoteConfig;
use crate::format::Formatter;
use crate::fs::atomic;
use crate::manifest::diff::ChangedFile;
use crate::manifest::{leaf_token, KeyPath};
use crate::sync::retry::RetryPolicy;
use crate::sync::transport::Transport;
use crate::utils::errors::{Result, SyncError};
use reqwest::Url;
use serde::de::IgnoredAny;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Suffix of files that are parsed before saving and formatted after.
const STRUCTURED_SUFFIX: &str = ".json";

/// A file that could not be synced, with the reason.
#[derive(Debug)]
pub struct FileFailure {
    pub file: ChangedFile,
    pub error: SyncError,
}

/// Result of one batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failures: Vec<FileFailure>,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct FetchPipeline<'a, T, F> {
    transport: &'a T,
    formatter: &'a F,
    retry: &'a RetryPolicy,
    remote: &'a RemoteConfig,
    mirror_dir: &'a Path,
}

impl<'a, T: Transport, F: Formatter> FetchPipeline<'a, T, F> {
    pub fn new(
        transport: &'a T,
        formatter: &'a F,
        retry: &'a RetryPolicy,
        remote: &'a RemoteConfig,
        mirror_dir: &'a Path,
    ) -> Self {
        Self {
            transport,
            formatter,
            retry,
            remote,
            mirror_dir,
        }
    }

    /// Sync every file in order. Never aborts early.
    pub async fn run(&self, changed: &[ChangedFile]) -> SyncReport {
        let mut report = SyncReport::default();
        let total = changed.len();

        for (idx, file) in changed.iter().enumerate() {
            let local = file.local_path();
            match self.sync_file(file).await {
                Ok(dest) => {
                    report.succeeded += 1;
                    info!("[{}/{}] Saved {}", idx + 1, total, dest.display());
                }
                Err(error) => {
                    warn!("[{}/{}] Skipping {}: {}", idx + 1, total, local, error);
                    report.failures.push(FileFailure {
                        file: file.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Download batch finished: {} succeeded, {} failed",
            report.succeeded,
            report.failed()
        );
        report
    }

    async fn sync_file(&self, file: &ChangedFile) -> Result<PathBuf> {
        if file.key.is_empty() || leaf_token(&file.value).is_empty() {
            return Err(SyncError::InvalidPath(format!(
                "empty key or value at {}",
                file.local_path()
            )));
        }

        let dest = self.mirror_dir.join(relative_fs_path(&file.local_path())?);
        let url = self.locator(&file.remote_path())?;

        atomic::ensure_parent_dir(&dest)?;

        info!("Downloading {}", url);
        let bytes = self
            .retry
            .run(&format!("Download of {url}"), || self.transport.fetch(&url))
            .await?;

        if bytes.is_empty() {
            return Err(SyncError::EmptyPayload(url.to_string()));
        }

        let structured = is_structured(&dest);
        if structured {
            serde_json::from_slice::<IgnoredAny>(&bytes).map_err(|source| SyncError::InvalidJson {
                path: url.to_string(),
                source,
            })?;
        }

        atomic::replace_file(&dest, &bytes)?;

        if structured {
            if let Err(e) = self.formatter.format(&dest) {
                warn!("Saved {} but formatting failed: {}", dest.display(), e);
            }
        }

        Ok(dest)
    }

    /// Absolute download URL for a manifest path. A leading root-prefix
    /// segment is dropped because the public server layout omits it.
    pub fn locator(&self, remote: &KeyPath) -> Result<Url> {
        let segments = remote.without_prefix(self.remote.root_prefix.as_deref());
        if segments.is_empty() {
            return Err(SyncError::InvalidPath(format!("nothing to fetch at {remote}")));
        }

        let raw = format!(
            "{}/{}",
            self.remote.base_url.trim_end_matches('/'),
            segments.join("/")
        );
        let url = Url::parse(&raw).map_err(|e| SyncError::InvalidUrl(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(SyncError::InvalidUrl(raw));
        }
        Ok(url)
    }
}

/// Mirror-relative filesystem path for a manifest path.
///
/// Keys may themselves contain `/`. Every resulting component must be a
/// plain name, so a manifest cannot address anything outside the mirror.
pub fn relative_fs_path(path: &KeyPath) -> Result<PathBuf> {
    let rel: PathBuf = path
        .segments()
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|c| !c.is_empty())
        .collect();

    let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
    if rel.as_os_str().is_empty() || !plain {
        return Err(SyncError::InvalidPath(path.to_string()));
    }
    Ok(rel)
}

fn is_structured(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(STRUCTURED_SUFFIX))
        .unwrap_or(false)
}
