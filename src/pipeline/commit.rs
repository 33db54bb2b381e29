// src/pipeline/commit.rs

//! Publishes batch results into git history.
//!
//! Stages the baseline directory and commits it with a summary title and a
//! JSON dump of the diff records as the message body.

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::BatchReport;

/// Commit identity applied with `git config --global` before publishing.
#[derive(Debug, Clone, Default)]
pub struct GitIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl GitIdentity {
    /// Read `GIT_EMAIL` and `GIT_USER`.
    pub fn from_env() -> Self {
        Self {
            email: std::env::var("GIT_EMAIL").ok(),
            name: std::env::var("GIT_USER").ok(),
        }
    }
}

/// Runs `git add` / `git commit` for a finished batch.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    storage_root: PathBuf,
    dry_run: bool,
}

impl GitPublisher {
    pub fn new(storage_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            storage_root: storage_root.into(),
            dry_run,
        }
    }

    /// Fail unless a `git` executable can be run.
    pub async fn ensure_available() -> Result<()> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .await
            .map_err(|e| AppError::git("--version", format!("git not found: {e}")))?;
        if !output.status.success() {
            return Err(AppError::git("--version", "git not usable"));
        }
        Ok(())
    }

    /// Apply the commit identity, skipping unset parts.
    pub async fn configure_identity(&self, identity: &GitIdentity) -> Result<()> {
        if let Some(email) = &identity.email {
            self.git(&["config", "--global", "user.email", email]).await?;
        }
        if let Some(name) = &identity.name {
            self.git(&["config", "--global", "user.name", name]).await?;
        }
        Ok(())
    }

    /// Commit the storage directory if the batch found changes.
    ///
    /// Returns whether a commit was made (or would have been, in dry-run mode).
    pub async fn publish(&self, report: &BatchReport) -> Result<bool> {
        if !report.has_changes() {
            log::info!("No changes, skipping commit");
            return Ok(false);
        }

        let (title, body) = commit_message(report)?;
        let storage = self.storage_root.to_string_lossy();

        log::info!("Running git add");
        self.git(&["add", storage.as_ref()]).await?;

        log::info!("Running git commit: {}", title);
        self.git(&["commit", "-m", &title, "-m", &body]).await?;

        Ok(true)
    }

    async fn git(&self, args: &[&str]) -> Result<()> {
        let command = args.first().copied().unwrap_or_default();
        if self.dry_run {
            log::info!("[dry-run] git {}", args.join(" "));
            return Ok(());
        }

        log::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .output()
            .await
            .map_err(|e| AppError::git(command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("{}", stdout.trim_end());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::git(command, stderr.trim()));
        }
        Ok(())
    }
}

/// Title and body of the commit for a report.
pub fn commit_message(report: &BatchReport) -> Result<(String, String)> {
    let body = serde_json::to_string(&report.records)?;
    Ok((report.summary_title(), body))
}
