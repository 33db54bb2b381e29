// src/models/mod.rs

//! Domain models for the change-detection engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod item;
mod report;

// Re-export all public types
pub use config::{BatchConfig, CompareMode, Config, FetchConfig, LoggingConfig, StorageConfig};
pub use item::{Item, ItemId, Locale, dedup_ids, id_range, parse_batch};
pub use report::{
    BatchReport, DiffDetail, DiffRecord, DiffType, FailureKind, FetchResult, ItemFailure,
    Operation,
};
