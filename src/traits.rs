//! Collaborator seams for the correlation pipeline.
//!
//! The pipeline never talks to a network client directly; it consumes the
//! tracker, the source-control service, and the optional LLM analyzer through
//! these traits so tests can drive it with in-memory fakes. Implementations
//! own query construction, authentication, and any retry policy; the pipeline
//! treats their failures as fatal for the request (except analysis, which
//! degrades).

use anyhow::Result;
use async_trait::async_trait;

use crate::analysis::{AnalysisOutcome, AnalysisRequest};
use crate::models::{Commit, Defect};

/// Filter criteria for a defect sweep.
#[derive(Debug, Clone)]
pub struct DefectFilter {
    /// Only defects created within the last N days.
    pub created_in_last_days: u32,
    /// Maximum number of defects to return.
    pub top: usize,
    /// Work-item states to include; empty means any state.
    pub states: Vec<String>,
    /// Optional area-path filter (UNDER semantics).
    pub area_path: Option<String>,
}

/// Read-only view of the work-item tracker.
#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    /// Fetch open defects matching the filter, newest first.
    async fn fetch_defects(&self, filter: &DefectFilter) -> Result<Vec<Defect>>;

    /// Fetch a single defect, or `None` when the id does not exist.
    async fn fetch_defect_by_id(&self, id: u32) -> Result<Option<Defect>>;
}

/// Read-only view of the source-control service.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch the most recent commits in reverse-chronological order,
    /// including each commit's changed-file list.
    async fn fetch_recent_commits(&self, count: usize) -> Result<Vec<Commit>>;
}

/// Optional LLM-backed commit analyzer.
///
/// Responses are treated as unreliable: the outcome is tagged so callers can
/// degrade gracefully when the reply is not well-formed structured data.
#[async_trait]
pub trait CommitAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome>;
}
