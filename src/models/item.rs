//! Monitored item identifiers and selection helpers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Identifier of one announcement page.
///
/// Numeric IDs are kept in their decimal rendering. The value doubles as the
/// baseline file stem, so it must be a plain file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Validate and wrap a raw identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let id = raw.as_ref().trim();
        if id.is_empty() {
            return Err(AppError::validation("item id is empty"));
        }
        if id == "." || id == ".." || id.contains(['/', '\\']) || id.contains('\0') {
            return Err(AppError::validation(format!(
                "item id '{id}' is not a valid file name"
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl FromStr for ItemId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Site locale, selecting one of the two URL templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    /// Path segment used by the upstream site.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Locale::Zh => "zh-CN",
            Locale::En => "en-US",
        }
    }

    /// Interpret the `LANG` toggle: `EN` selects English, anything else the default.
    pub fn from_toggle(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("en") {
            Locale::En
        } else {
            Locale::Zh
        }
    }
}

impl FromStr for Locale {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "zh-cn" => Ok(Locale::Zh),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(AppError::validation(format!("unknown locale '{other}'"))),
        }
    }
}

/// A monitored remote page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub url: String,
}

/// Parse a comma-separated batch of IDs. Empty segments are skipped.
pub fn parse_batch(batch: &str) -> Result<Vec<ItemId>> {
    batch
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ItemId::new)
        .collect()
}

/// Build the inclusive numeric range `begin..=end`.
pub fn id_range(begin: u64, end: u64) -> Result<Vec<ItemId>> {
    if begin > end {
        return Err(AppError::validation(format!(
            "invalid range {begin}..={end}: begin must not exceed end"
        )));
    }
    Ok((begin..=end).map(ItemId::from).collect())
}

/// Drop repeated IDs, keeping the first occurrence of each.
pub fn dedup_ids(ids: impl IntoIterator<Item = ItemId>) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
