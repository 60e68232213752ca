//! Result persistence
//!
//! This module provides SQLite-based storage of rip results so images
//! and their recovered files can be queried after the run.

pub mod database;

// Re-export main types
pub use database::{ImageSummary, RipDatabase};
