// src/lib.rs

//! Announcement change-detection library.
//!
//! Fetches announcement pages at a bounded rate, compares each one with its
//! stored baseline and reports what changed.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
