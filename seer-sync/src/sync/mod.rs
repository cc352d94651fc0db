//! One sync cycle: load the local snapshot, fetch the remote manifest, diff,
//! download the changed files and persist the new snapshot.
//!
//! Everything runs sequentially. Failures of the manifest fetch or of the
//! version store abort the cycle without touching persisted state; per-file
//! failures are contained in the [`pipeline`].

pub mod pipeline;
pub mod retry;
pub mod transport;

use crate::config::Config;
use crate::format::Formatter;
use crate::fs::store::VersionStore;
use crate::manifest::diff::{ChangedFile, ManifestDiffer};
use crate::manifest::{KeyPath, Manifest};
use crate::utils::errors::{Result, SyncError};
use pipeline::{FetchPipeline, FileFailure, SyncReport};
use reqwest::Url;
use retry::RetryPolicy;
use tracing::{info, warn};
use transport::Transport;

/// What a cycle intends to do.
#[derive(Debug)]
pub struct SyncPlan {
    pub remote: Manifest,
    pub changed: Vec<ChangedFile>,
}

/// What a cycle did.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Files the diff reported
    pub changed: usize,
    pub report: SyncReport,
    /// Whether a new snapshot was written
    pub snapshot_saved: bool,
}

pub struct SyncEngine<T, F> {
    config: Config,
    transport: T,
    formatter: F,
    store: VersionStore,
    differ: ManifestDiffer,
    retry: RetryPolicy,
}

impl<T: Transport, F: Formatter> SyncEngine<T, F> {
    pub fn new(config: Config, transport: T, formatter: F) -> Self {
        let store = VersionStore::new(&config.store);
        let differ = ManifestDiffer::new(&config.sync.extensions);
        let retry = RetryPolicy::from(&config.retry);
        Self {
            config,
            transport,
            formatter,
            store,
            differ,
            retry,
        }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// URL of the remote manifest, with a cache-busting timestamp.
    pub fn manifest_url(&self) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.config.remote.base_url.trim_end_matches('/'),
            self.config.remote.manifest_path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| SyncError::InvalidUrl(format!("{raw}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("t", &chrono::Utc::now().timestamp().to_string());
        Ok(url)
    }

    /// Fetch and parse the remote manifest. Only the request is retried; a
    /// document that is not a JSON mapping fails immediately.
    pub async fn fetch_remote(&self) -> Result<Manifest> {
        let url = self.manifest_url()?;
        info!("Fetching version manifest: {}", url);

        let bytes = self
            .retry
            .run("Version manifest fetch", || self.transport.fetch(&url))
            .await?;

        Manifest::from_slice(&bytes, url.as_str())
    }

    /// Load the local snapshot, fetch the remote one and diff them.
    pub async fn plan(&self) -> Result<SyncPlan> {
        let local = self.store.load();
        let remote = self.fetch_remote().await?;

        let scopes: Vec<KeyPath> = self
            .config
            .sync
            .scopes
            .iter()
            .map(|s| s.iter().cloned().collect())
            .collect();
        let changed = self.differ.diff_scoped(&local, &remote, &scopes);

        Ok(SyncPlan { remote, changed })
    }

    /// Run one full cycle.
    pub async fn run(&self) -> Result<SyncOutcome> {
        let SyncPlan { remote, changed } = self.plan().await?;

        if changed.is_empty() {
            info!("No files need updating");
            return Ok(SyncOutcome {
                changed: 0,
                report: SyncReport::default(),
                snapshot_saved: false,
            });
        }

        info!("{} file(s) need updating", changed.len());
        for file in &changed {
            info!("  - {}", file.local_path());
        }

        let pipeline = FetchPipeline::new(
            &self.transport,
            &self.formatter,
            &self.retry,
            &self.config.remote,
            &self.config.sync.mirror_dir,
        );
        let report = pipeline.run(&changed).await;

        let snapshot = snapshot_after(remote, &report.failures);
        self.store.save(&snapshot)?;
        if report.is_complete() {
            info!("Updated local version file {}", self.store.path().display());
        } else {
            warn!(
                "Updated local version file {}; {} failed file(s) keep their previous entry and will be retried next run",
                self.store.path().display(),
                report.failed()
            );
        }

        Ok(SyncOutcome {
            changed: changed.len(),
            report,
            snapshot_saved: true,
        })
    }
}

/// The snapshot to persist after a batch: the remote manifest with every
/// failed leaf put back to its previous local value, or dropped if it had
/// none. Successful leaves are marked synced; failed ones are retried.
pub fn snapshot_after(mut remote: Manifest, failures: &[FileFailure]) -> Manifest {
    for failure in failures {
        let path = failure.file.local_path();
        match &failure.file.previous {
            Some(previous) => remote.set_path(path.segments(), previous.clone()),
            None => {
                remote.remove_path(path.segments());
            }
        }
    }
    remote
}
