//! JSON re-formatting of downloaded files.
//!
//! Server-side JSON is usually minified. After a file lands in the mirror it
//! is rewritten with stable indentation so local diffs stay readable. Key
//! order is preserved and non-ASCII text is written as-is.

use crate::fs::atomic;
use crate::fs::walker::{walk_files, WalkOptions};
use crate::utils::errors::{Result, SyncError};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Rewrites a file in canonical form.
pub trait Formatter {
    fn format(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFormatter {
    indent: usize,
}

impl JsonFormatter {
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }

    /// Render `value` with this formatter's indentation.
    pub fn render(&self, value: &Value) -> Result<Vec<u8>> {
        let indent = vec![b' '; self.indent];
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
        value.serialize(&mut ser)?;
        Ok(out)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|source| SyncError::InvalidJson {
            path: path.display().to_string(),
            source,
        })?;
        let rendered = self.render(&value)?;
        atomic::replace_file(path, &rendered)
    }
}

/// Outcome of a batch format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatSummary {
    pub found: usize,
    pub formatted: usize,
}

/// Format every `*.json` file under `root`, skipping `exclude_dirs`.
///
/// Individual failures are logged and counted, never fatal.
pub fn format_tree<F: Formatter>(formatter: &F, root: &Path, exclude_dirs: &[String]) -> Result<FormatSummary> {
    if !root.is_dir() {
        return Err(SyncError::InvalidPath(format!("{} is not a directory", root.display())));
    }

    let options = WalkOptions {
        exclude_dirs: exclude_dirs.to_vec(),
        suffix: Some(".json".to_string()),
        ..WalkOptions::default()
    };
    let files = walk_files(root, &options)?;

    let mut summary = FormatSummary {
        found: files.len(),
        formatted: 0,
    };
    for file in &files {
        match formatter.format(file) {
            Ok(()) => {
                summary.formatted += 1;
                info!("Formatted {}", file.display());
            }
            Err(e) => warn!("Failed to format {}: {}", file.display(), e),
        }
    }

    info!(
        "Format complete: {} JSON files found, {} formatted",
        summary.found, summary.formatted
    );
    Ok(summary)
}

/// Formatter double that records calls and can be told to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingFormatter {
    pub calls: std::sync::Mutex<Vec<std::path::PathBuf>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingFormatter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<std::path::PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Formatter for RecordingFormatter {
    fn format(&self, path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(SyncError::Format(format!("refused {}", path.display())));
        }
        Ok(())
    }
}
