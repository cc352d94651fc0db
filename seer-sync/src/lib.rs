//! Seer Sync Library
//!
//! Keeps a local mirror of a hash-named remote asset tree up to date. The
//! server publishes a version manifest mapping each file to its current
//! hash; only files whose hash changed since the last sync are downloaded.

pub mod config;
pub mod format;
pub mod fs;
pub mod manifest;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use format::{Formatter, JsonFormatter};
pub use manifest::{KeyPath, Manifest};
pub use sync::transport::{HttpTransport, Transport};
pub use sync::SyncEngine;
pub use utils::errors::{Result, SyncError};
