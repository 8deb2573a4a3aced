//! Correlation pipeline: fetch, score, enrich.
//!
//! One triage request is one linear pass: defects and commits are fetched
//! concurrently, every (defect, commit) pair is scored, results are filtered
//! and capped, and — for a single-defect request with analysis enabled — the
//! LLM's view is merged in. The pipeline holds no state between requests and
//! consumes its collaborators through the seams in [`crate::traits`].

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analysis::{enrich_analysis, AnalysisReport, AnalysisRequest, CommitDigest};
use crate::models::{Commit, Defect, ScoredCommit};
use crate::rank::rank_commits;
use crate::text::{strip_markup, truncate};
use crate::traits::{CommitAnalyzer, DefectFilter, SourceControl, WorkItemTracker};

/// Display budget for the per-defect summary excerpt.
const SUMMARY_CHARS: usize = 600;

/// Everything one triage run needs beyond its collaborators. Built from
/// configuration by the callers; the pipeline never reads ambient state.
#[derive(Debug, Clone)]
pub struct TriageOptions {
    /// Analyze a single defect instead of sweeping for recent ones.
    pub defect_id: Option<u32>,
    pub filter: DefectFilter,
    /// How many recent commits to fetch and score.
    pub commit_count: usize,
    /// Commits scoring below this are dropped.
    pub min_score: f64,
    /// Ranked commits kept per defect.
    pub max_results: usize,
}

/// One defect with its ranked suspect commits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectReport {
    #[serde(flatten)]
    pub defect: Defect,
    /// Normalized, truncated excerpt of the repro steps or description.
    pub summary: Option<String>,
    pub suspect_commits: Vec<ScoredCommit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AnalysisReport>,
}

/// Result of one triage run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageOutcome {
    pub generated_at: DateTime<Utc>,
    pub reports: Vec<DefectReport>,
}

/// Compose the defect's comparison text: title, tags, and the normalized
/// rich-text fields, joined with blank lines.
pub fn compose_defect_text(defect: &Defect) -> String {
    let description = defect.description.as_deref().map(strip_markup);
    let repro = defect.repro_steps.as_deref().map(strip_markup);

    [
        Some(defect.title.clone()),
        defect.tags.clone(),
        description,
        repro,
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Short display excerpt for a defect: repro steps preferred over the
/// description, normalized and truncated.
pub fn defect_summary(defect: &Defect) -> Option<String> {
    let source = defect
        .repro_steps
        .as_deref()
        .map(strip_markup)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            defect
                .description
                .as_deref()
                .map(strip_markup)
                .filter(|s| !s.is_empty())
        })?;
    Some(truncate(&source, SUMMARY_CHARS))
}

/// Run one triage pass.
///
/// Defect and commit fetches run concurrently; both must complete before
/// scoring begins. Cancellation aborts the in-flight fetches and fails the
/// whole request — no partial ranking is ever returned. Collaborator errors
/// propagate; analysis errors degrade (logged, analysis omitted).
pub async fn run_triage(
    tracker: &dyn WorkItemTracker,
    source_control: &dyn SourceControl,
    analyzer: Option<&dyn CommitAnalyzer>,
    options: &TriageOptions,
    cancel: &CancellationToken,
) -> Result<TriageOutcome> {
    let fetches = async {
        tokio::try_join!(
            source_control.fetch_recent_commits(options.commit_count),
            fetch_defects(tracker, options),
        )
    };

    let (commits, defects) = tokio::select! {
        biased;
        _ = cancel.cancelled() => bail!("triage cancelled"),
        result = fetches => result?,
    };

    let mut reports: Vec<DefectReport> = defects
        .into_iter()
        .map(|defect| {
            let text = compose_defect_text(&defect);
            let mut ranked = rank_commits(&text, &commits, Some(defect.id), options.min_score);
            ranked.truncate(options.max_results);
            DefectReport {
                summary: defect_summary(&defect),
                defect,
                suspect_commits: ranked,
                ai_analysis: None,
            }
        })
        .collect();

    // The model pass is reserved for focused, single-defect requests.
    if let (Some(analyzer), [report]) = (analyzer, reports.as_mut_slice()) {
        let request = analysis_request(&report.defect, &commits);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => bail!("triage cancelled"),
            outcome = analyzer.analyze(&request) => outcome,
        };
        match outcome {
            Ok(outcome) => {
                report.ai_analysis = Some(enrich_analysis(outcome.into_analysis(), &commits));
            }
            Err(err) => {
                tracing::warn!(defect_id = report.defect.id, error = %err,
                    "commit analysis failed; returning heuristic ranking only");
            }
        }
    }

    Ok(TriageOutcome {
        generated_at: Utc::now(),
        reports,
    })
}

async fn fetch_defects(
    tracker: &dyn WorkItemTracker,
    options: &TriageOptions,
) -> Result<Vec<Defect>> {
    match options.defect_id {
        // An unknown id is an input error, not a failure: empty result.
        Some(id) => Ok(tracker.fetch_defect_by_id(id).await?.into_iter().collect()),
        None => tracker.fetch_defects(&options.filter).await,
    }
}

fn analysis_request(defect: &Defect, commits: &[Commit]) -> AnalysisRequest {
    AnalysisRequest {
        title: defect.title.clone(),
        description: defect
            .description
            .as_deref()
            .map(strip_markup)
            .filter(|s| !s.is_empty()),
        repro_steps: defect
            .repro_steps
            .as_deref()
            .map(strip_markup)
            .filter(|s| !s.is_empty()),
        commits: commits.iter().map(CommitDigest::from_commit).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_defect(id: u32, title: &str) -> Defect {
        Defect {
            id,
            title: title.to_string(),
            state: None,
            created_date: None,
            assigned_to: None,
            area_path: None,
            iteration_path: None,
            tags: None,
            description: None,
            repro_steps: None,
            url: None,
            web_url: None,
        }
    }

    #[test]
    fn test_compose_defect_text_joins_present_fields() {
        let mut defect = make_defect(1, "Crash on save");
        defect.tags = Some("payments; checkout".to_string());
        defect.description = Some("<p>Saving fails<br/>every time</p>".to_string());
        let text = compose_defect_text(&defect);
        assert_eq!(
            text,
            "Crash on save\n\npayments; checkout\n\nSaving fails\nevery time"
        );
    }

    #[test]
    fn test_compose_defect_text_title_only() {
        let defect = make_defect(1, "Crash on save");
        assert_eq!(compose_defect_text(&defect), "Crash on save");
    }

    #[test]
    fn test_defect_summary_prefers_repro_steps() {
        let mut defect = make_defect(1, "Crash");
        defect.description = Some("<p>described</p>".to_string());
        defect.repro_steps = Some("<p>steps to reproduce</p>".to_string());
        assert_eq!(defect_summary(&defect).as_deref(), Some("steps to reproduce"));
    }

    #[test]
    fn test_defect_summary_falls_back_to_description() {
        let mut defect = make_defect(1, "Crash");
        defect.description = Some("<p>described</p>".to_string());
        // Markup-only repro normalizes to empty and is skipped.
        defect.repro_steps = Some("<br/>".to_string());
        assert_eq!(defect_summary(&defect).as_deref(), Some("described"));
    }

    #[test]
    fn test_defect_summary_absent_fields() {
        let defect = make_defect(1, "Crash");
        assert!(defect_summary(&defect).is_none());
    }
}
