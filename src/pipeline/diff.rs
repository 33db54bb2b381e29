//! Change detection between a fetched page and its baseline.
//!
//! Two comparators share the [`Comparator`] interface:
//!
//! - [`RichDiffComparator`] keeps the previous body and reports the inserted
//!   and deleted text regions.
//! - [`DigestComparator`] keeps only a SHA-256 digest and reports that the
//!   page changed, without details.
//!
//! Both write the new baseline only after classification is complete, and
//! never write when nothing changed.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use similar::{Algorithm, ChangeTag, TextDiff};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::{CompareMode, DiffDetail, DiffRecord, FetchResult, Operation};
use crate::storage::BaselineStore;

/// Kind of a span in an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Equal,
    Insert,
    Delete,
}

/// A run of consecutive tokens sharing one [`EditOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSpan {
    pub op: EditOp,
    pub text: String,
}

/// Compute the edit script turning `old` into `new`.
///
/// Text is split on Unicode word boundaries, so tags, words, punctuation and
/// whitespace runs are atomic. Adjacent tokens with the same operation are
/// merged into one span.
pub fn edit_script(old: &str, new: &str) -> Vec<EditSpan> {
    let old_tokens: Vec<&str> = old.split_word_bounds().collect();
    let new_tokens: Vec<&str> = new.split_word_bounds().collect();

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&old_tokens, &new_tokens);

    let mut script: Vec<EditSpan> = Vec::new();
    for change in diff.iter_all_changes() {
        let op = match change.tag() {
            ChangeTag::Equal => EditOp::Equal,
            ChangeTag::Insert => EditOp::Insert,
            ChangeTag::Delete => EditOp::Delete,
        };
        match script.last_mut() {
            Some(last) if last.op == op => last.text.push_str(change.value()),
            _ => script.push(EditSpan {
                op,
                text: change.value().to_string(),
            }),
        }
    }
    script
}

/// Whether a script describes identical inputs.
pub fn is_unchanged(script: &[EditSpan]) -> bool {
    script.iter().all(|span| span.op == EditOp::Equal)
}

/// Keep only the changed spans, in script order.
pub fn project_details(script: &[EditSpan]) -> Vec<DiffDetail> {
    script
        .iter()
        .filter_map(|span| {
            let operation = match span.op {
                EditOp::Equal => return None,
                EditOp::Insert => Operation::Insert,
                EditOp::Delete => Operation::Delete,
            };
            Some(DiffDetail {
                operation,
                text: span.text.clone(),
            })
        })
        .collect()
}

/// Replay a script against `old`.
///
/// Returns `None` when an equal or deleted span does not match `old` at the
/// current position, or when `old` is not fully consumed.
pub fn apply_script(old: &str, script: &[EditSpan]) -> Option<String> {
    let mut rest = old;
    let mut out = String::with_capacity(old.len());
    for span in script {
        match span.op {
            EditOp::Equal => {
                rest = rest.strip_prefix(span.text.as_str())?;
                out.push_str(&span.text);
            }
            EditOp::Delete => rest = rest.strip_prefix(span.text.as_str())?,
            EditOp::Insert => out.push_str(&span.text),
        }
    }
    rest.is_empty().then_some(out)
}

/// Convenience function to compute the changed spans between two texts.
pub fn diff_details(old: &str, new: &str) -> Vec<DiffDetail> {
    project_details(&edit_script(old, new))
}

/// SHA-256 digest of a page body.
pub fn sha256(content: &[u8]) -> Vec<u8> {
    Sha256::digest(content).to_vec()
}

/// Decides whether a fetched page differs from its baseline.
#[async_trait]
pub trait Comparator: Send + Sync {
    /// Compare against the stored baseline, updating it on change.
    ///
    /// Returns `None` for an unchanged page.
    async fn compare(&self, fetched: &FetchResult) -> Result<Option<DiffRecord>>;
}

/// Build the comparator for a storage mode.
pub fn comparator_for(mode: CompareMode, store: Arc<dyn BaselineStore>) -> Arc<dyn Comparator> {
    match mode {
        CompareMode::Rich => Arc::new(RichDiffComparator::new(store)),
        CompareMode::Digest => Arc::new(DigestComparator::new(store)),
    }
}

/// Diff two texts on the blocking pool.
///
/// Returns `None` when the texts are equal.
async fn text_changes(old: String, new: String) -> Result<Option<Vec<DiffDetail>>> {
    let changes = tokio::task::spawn_blocking(move || {
        let script = edit_script(&old, &new);
        (!is_unchanged(&script)).then(|| project_details(&script))
    })
    .await?;
    Ok(changes)
}

/// Comparator keeping the full previous body.
pub struct RichDiffComparator {
    store: Arc<dyn BaselineStore>,
}

impl RichDiffComparator {
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Comparator for RichDiffComparator {
    async fn compare(&self, fetched: &FetchResult) -> Result<Option<DiffRecord>> {
        let id = &fetched.item.id;

        let Some(previous) = self.store.read(id).await? else {
            log::debug!("No baseline for {}, recording as added", id);
            self.store.write(id, &fetched.content).await?;
            return Ok(Some(DiffRecord::added(fetched)));
        };

        let details = match (
            std::str::from_utf8(&previous),
            std::str::from_utf8(&fetched.content),
        ) {
            (Ok(old), Ok(new)) => match text_changes(old.to_owned(), new.to_owned()).await? {
                Some(details) => details,
                None => {
                    log::debug!("Content of {} is unchanged", id);
                    return Ok(None);
                }
            },
            _ => {
                // Not text: compare digests and report the change without details.
                let (old_digest, new_digest) = (sha256(&previous), sha256(&fetched.content));
                if old_digest == new_digest {
                    log::debug!("Binary content of {} is unchanged", id);
                    return Ok(None);
                }
                log::debug!(
                    "Binary content of {} changed ({} -> {})",
                    id,
                    hex::encode(&old_digest),
                    hex::encode(&new_digest)
                );
                Vec::new()
            }
        };

        self.store.write(id, &fetched.content).await?;
        Ok(Some(DiffRecord::changed(fetched, details)))
    }
}

/// Comparator keeping only a digest of the previous body.
pub struct DigestComparator {
    store: Arc<dyn BaselineStore>,
}

impl DigestComparator {
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Comparator for DigestComparator {
    async fn compare(&self, fetched: &FetchResult) -> Result<Option<DiffRecord>> {
        let id = &fetched.item.id;
        let digest = sha256(&fetched.content);

        let previous = self.store.read(id).await?;
        if previous.as_deref() == Some(digest.as_slice()) {
            log::debug!("Digests are equal for {} ({})", id, hex::encode(&digest));
            return Ok(None);
        }

        log::debug!(
            "Digests differ for {} ({} -> {}), updating",
            id,
            previous.as_deref().map(hex::encode).unwrap_or_default(),
            hex::encode(&digest)
        );
        self.store.write(id, &digest).await?;

        Ok(Some(match previous {
            None => DiffRecord::added(fetched),
            Some(_) => DiffRecord::changed(fetched, Vec::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiffType, Item, ItemId};
    use crate::storage::LocalBaselineStore;
    use tempfile::TempDir;

    const V1: &str = "<html><head><title>Hi</title></head><body>v1</body></html>";
    const V2: &str = "<html><head><title>Hi</title></head><body>v2</body></html>";

    fn fetched(id: &str, content: &[u8]) -> FetchResult {
        FetchResult {
            item: Item {
                id: ItemId::new(id).unwrap(),
                url: format!("https://example.com/{id}"),
            },
            content: content.to_vec(),
            title: "Hi".to_string(),
        }
    }

    async fn store(tmp: &TempDir, mode: CompareMode) -> Arc<LocalBaselineStore> {
        Arc::new(
            LocalBaselineStore::open(tmp.path(), mode.suffix())
                .await
                .unwrap(),
        )
    }

    #[test]
    fn test_no_changes() {
        let script = edit_script(V1, V1);
        assert!(is_unchanged(&script));
        assert_eq!(script.len(), 1);
        assert!(diff_details(V1, V1).is_empty());
    }

    #[test]
    fn test_empty_inputs_unchanged() {
        let script = edit_script("", "");
        assert!(script.is_empty());
        assert!(is_unchanged(&script));
    }

    #[test]
    fn test_replacement_is_delete_then_insert() {
        assert_eq!(
            diff_details(V1, V2),
            vec![DiffDetail::delete("v1"), DiffDetail::insert("v2")]
        );
    }

    #[test]
    fn test_additions() {
        let details = diff_details("alpha", "alpha beta");
        assert_eq!(details, vec![DiffDetail::insert(" beta")]);
    }

    #[test]
    fn test_removals() {
        // The removed whitespace may sit on either side of the word.
        let details = diff_details("one two three", "one three");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].operation, Operation::Delete);
        assert_eq!(details[0].text.trim(), "two");
    }

    #[test]
    fn test_details_in_document_order() {
        let details = diff_details("alpha beta gamma", "ALPHA beta GAMMA");
        let texts: Vec<(&str, &str)> = details
            .iter()
            .map(|d| (d.operation.symbol(), d.text.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![("-", "alpha"), ("+", "ALPHA"), ("-", "gamma"), ("+", "GAMMA")]
        );
    }

    #[test]
    fn test_script_round_trip() {
        let pairs = [
            ("", ""),
            ("", "fresh page"),
            ("gone", ""),
            (V1, V2),
            ("same", "same"),
            ("a b c d e", "e d c b a"),
            ("<ul><li>1</li></ul>", "<ul><li>1</li><li>2</li></ul>"),
            ("公告：比赛延期", "公告：比赛取消"),
            ("line one\nline two\n", "line one\nline 2\nline three\n"),
            ("  spaced   out ", "spaced out"),
        ];
        for (old, new) in pairs {
            let script = edit_script(old, new);
            assert_eq!(
                apply_script(old, &script).as_deref(),
                Some(new),
                "round trip failed for {old:?} -> {new:?}"
            );
        }
    }

    #[test]
    fn test_apply_rejects_foreign_script() {
        let script = edit_script("abc def", "abc xyz");
        assert!(apply_script("something else", &script).is_none());
    }

    #[tokio::test]
    async fn test_text_changes_on_large_input() {
        let old = "word ".repeat(20_000);
        let new = format!("{old}tail");

        assert_eq!(text_changes(old.clone(), old.clone()).await.unwrap(), None);
        assert_eq!(
            text_changes(old, new).await.unwrap(),
            Some(vec![DiffDetail::insert("tail")])
        );
    }

    #[test]
    fn test_sha256_width() {
        assert_eq!(sha256(b"").len(), 32);
        assert_ne!(sha256(b"a"), sha256(b"b"));
    }

    #[tokio::test]
    async fn test_rich_add_change_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, CompareMode::Rich).await;
        let comparator = RichDiffComparator::new(store.clone());
        let id = ItemId::new("12345").unwrap();

        let first = comparator
            .compare(&fetched("12345", V1.as_bytes()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.diff_type, DiffType::Add);
        assert_eq!(first.title, "Hi");
        assert!(first.diff_details.is_empty());
        assert_eq!(store.read(&id).await.unwrap().unwrap(), V1.as_bytes());

        let second = comparator
            .compare(&fetched("12345", V2.as_bytes()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.diff_type, DiffType::Change);
        assert_eq!(
            second.diff_details,
            vec![DiffDetail::delete("v1"), DiffDetail::insert("v2")]
        );
        assert_eq!(store.read(&id).await.unwrap().unwrap(), V2.as_bytes());

        let third = comparator
            .compare(&fetched("12345", V2.as_bytes()))
            .await
            .unwrap();
        assert!(third.is_none());
    }

    #[tokio::test]
    async fn test_rich_unchanged_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, CompareMode::Rich).await;
        let comparator = RichDiffComparator::new(store.clone());
        let page = fetched("9", V1.as_bytes());

        comparator.compare(&page).await.unwrap();
        let path = store.path(&page.item.id);
        let before = std::fs::read(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert!(comparator.compare(&page).await.unwrap().is_none());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(
            std::fs::metadata(&path).unwrap().modified().unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn test_rich_empty_baseline_is_not_absent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, CompareMode::Rich).await;
        let comparator = RichDiffComparator::new(store.clone());

        store.write(&ItemId::new("3").unwrap(), b"").await.unwrap();
        assert!(comparator.compare(&fetched("3", b"")).await.unwrap().is_none());

        let record = comparator
            .compare(&fetched("3", b"now"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.diff_type, DiffType::Change);
        assert_eq!(record.diff_details, vec![DiffDetail::insert("now")]);
    }

    #[tokio::test]
    async fn test_rich_binary_falls_back_to_digest() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, CompareMode::Rich).await;
        let comparator = RichDiffComparator::new(store.clone());
        let blob = [0xffu8, 0xfe, 0x00, 0x81];

        comparator.compare(&fetched("b", &blob)).await.unwrap();
        assert!(comparator.compare(&fetched("b", &blob)).await.unwrap().is_none());

        let record = comparator
            .compare(&fetched("b", &[0xffu8, 0x00]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.diff_type, DiffType::Change);
        assert!(record.diff_details.is_empty());
    }

    #[tokio::test]
    async fn test_digest_mode() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, CompareMode::Digest).await;
        let comparator = comparator_for(CompareMode::Digest, store.clone());
        let id = ItemId::new("77").unwrap();

        let first = comparator
            .compare(&fetched("77", V1.as_bytes()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.diff_type, DiffType::Add);
        assert_eq!(store.read(&id).await.unwrap().unwrap(), sha256(V1.as_bytes()));
        assert!(tmp.path().join("77.sha256").exists());

        assert!(
            comparator
                .compare(&fetched("77", V1.as_bytes()))
                .await
                .unwrap()
                .is_none()
        );

        let changed = comparator
            .compare(&fetched("77", V2.as_bytes()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(changed.diff_type, DiffType::Change);
        assert!(changed.diff_details.is_empty());
        assert_eq!(store.read(&id).await.unwrap().unwrap(), sha256(V2.as_bytes()));
    }
}
