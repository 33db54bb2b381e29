//! Pipeline entry points for change detection.
//!
//! - `diff`: comparators deciding whether a page changed
//! - `batch`: concurrent fetch-and-compare over a set of items
//! - `commit`: publishing a batch report into git history
//! - `watch`: assembling the engine from configuration

pub mod batch;
pub mod commit;
pub mod diff;
pub mod watch;

pub use batch::{BatchOptions, BatchRunner, ItemOutcome, ProgressHook};
pub use commit::{GitIdentity, GitPublisher};
pub use diff::{Comparator, DigestComparator, RichDiffComparator, comparator_for};
pub use watch::Watcher;
