//! Storage abstractions for per-item baselines.
//!
//! A baseline is the last observation of one item: either the raw page body
//! or its digest. Exactly one exists per item.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── 12345.html        # rich mode: previous body
//! ├── 12346.html
//! └── 12347.sha256      # digest mode: 32 raw bytes
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ItemId;

// Re-export for convenience
pub use local::LocalBaselineStore;

/// Trait for baseline storage backends.
///
/// Different IDs never share state; callers issue at most one operation per
/// ID at a time.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Read the baseline for `id`. `None` means the item was never observed.
    async fn read(&self, id: &ItemId) -> Result<Option<Vec<u8>>>;

    /// Replace the baseline for `id`.
    async fn write(&self, id: &ItemId, bytes: &[u8]) -> Result<()>;
}
