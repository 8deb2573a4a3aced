//! Core data types that flow through the correlation pipeline.
//!
//! Defects come from the work-item tracker, commits from the source-control
//! service. Both are immutable once fetched; scoring derives [`ScoredCommit`]
//! values from them without mutating either side.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A defect (bug work item) fetched from the tracker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
    pub id: u32,
    pub title: String,
    pub state: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    /// Semicolon-separated tag string as the tracker stores it.
    pub tags: Option<String>,
    /// Rich-text (HTML) description, unnormalized.
    pub description: Option<String>,
    /// Rich-text (HTML) reproduction steps, unnormalized.
    pub repro_steps: Option<String>,
    /// Canonical API URL for the work item.
    pub url: Option<String>,
    /// Human-facing URL for the work item.
    pub web_url: Option<String>,
}

/// One changed file within a commit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFile {
    pub filename: String,
    pub status: Option<String>,
}

/// A commit fetched from the source-control service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    pub html_url: Option<String>,
    /// Full commit message, possibly multi-line.
    pub message: String,
    pub author_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub files: Vec<CommitFile>,
}

impl Commit {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Changed filenames in commit order.
    pub fn filenames(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.filename.as_str()).collect()
    }
}

/// A commit augmented with its relevance score against one defect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCommit {
    #[serde(flatten)]
    pub commit: Commit,
    pub score: f64,
    /// Tokens shared by the defect text and the commit document, in defect
    /// token order, capped for display.
    pub matched_tokens: Vec<String>,
}
