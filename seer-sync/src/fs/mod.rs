//! Filesystem helpers: atomic replacement, the version store and directory walking.

pub mod atomic;
pub mod store;
pub mod walker;
