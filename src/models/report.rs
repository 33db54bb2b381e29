//! Fetch results, diff records and the batch report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Item, ItemId};

/// Outcome of fetching one page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub item: Item,
    /// Raw response body
    pub content: Vec<u8>,
    /// Text of the page `<title>`, empty when absent
    pub title: String,
}

/// Kind of change detected for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// First observation of the item
    Add,
    /// Content differs from the stored baseline
    Change,
}

/// Direction of a non-equal diff span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Insert,
    #[serde(rename = "-")]
    Delete,
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Insert => "+",
            Operation::Delete => "-",
        }
    }
}

/// One changed region of a page, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDetail {
    pub operation: Operation,
    pub text: String,
}

impl DiffDetail {
    pub fn insert(text: impl Into<String>) -> Self {
        Self {
            operation: Operation::Insert,
            text: text.into(),
        }
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            text: text.into(),
        }
    }
}

/// A detected change for one item. Unchanged items never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub id: ItemId,
    pub url: String,
    pub title: String,
    pub diff_type: DiffType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_details: Vec<DiffDetail>,
}

impl DiffRecord {
    /// Record for an item seen for the first time.
    pub fn added(fetched: &FetchResult) -> Self {
        Self::with_details(fetched, DiffType::Add, Vec::new())
    }

    /// Record for an item whose content moved away from its baseline.
    pub fn changed(fetched: &FetchResult, details: Vec<DiffDetail>) -> Self {
        Self::with_details(fetched, DiffType::Change, details)
    }

    fn with_details(fetched: &FetchResult, diff_type: DiffType, details: Vec<DiffDetail>) -> Self {
        Self {
            id: fetched.item.id.clone(),
            url: fetched.item.url.clone(),
            title: fetched.title.clone(),
            diff_type,
            diff_details: details,
        }
    }
}

impl fmt::Display for DiffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.title)
    }
}

/// Category of an item-local failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Request,
    HttpStatus,
    Parse,
    Storage,
    Cancelled,
    Other,
}

/// An item that could not be fetched or compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: ItemId,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Unique items dispatched
    pub total: usize,
    pub records: Vec<DiffRecord>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// Whether any item changed.
    pub fn has_changes(&self) -> bool {
        !self.records.is_empty()
    }

    /// Number of items that produced a record.
    pub fn change_count(&self) -> usize {
        self.records.len()
    }

    /// Items that finished without a record and without failing.
    pub fn unchanged_count(&self) -> usize {
        self.total
            .saturating_sub(self.records.len() + self.failures.len())
    }

    /// Look up the record for an item.
    pub fn record(&self, id: &str) -> Option<&DiffRecord> {
        self.records.iter().find(|r| r.id.as_str() == id)
    }

    /// Look up the failure for an item.
    pub fn failure(&self, id: &str) -> Option<&ItemFailure> {
        self.failures.iter().find(|f| f.id.as_str() == id)
    }

    /// One-line human summary, used as the commit title.
    pub fn summary_title(&self) -> String {
        format!("diff {} records", self.records.len())
    }
}
