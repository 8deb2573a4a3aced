//! The `triage` command: run the pipeline and print a report.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::analysis::create_analyzer;
use crate::commits::GithubRepo;
use crate::config::Config;
use crate::pipeline::{run_triage, DefectReport, TriageOptions};
use crate::text::truncate;
use crate::tracker::AdoTracker;
use crate::traits::DefectFilter;

/// Run a triage pass against the configured tracker and repository and
/// print the ranked suspects for each defect.
///
/// Ctrl-C cancels the in-flight fetches; a cancelled run prints nothing.
pub async fn run_triage_command(
    config: &Config,
    bug_id: Option<u32>,
    min_score: Option<f64>,
) -> Result<()> {
    let tracker = AdoTracker::new(&config.tracker)?;
    let source_control = GithubRepo::new(&config.repo)?;
    let analyzer = create_analyzer(&config.analysis)?;

    let options = TriageOptions {
        defect_id: bug_id,
        filter: DefectFilter {
            created_in_last_days: config.tracker.days,
            top: config.tracker.top,
            states: config.tracker.states.clone(),
            area_path: config.tracker.area_path.clone(),
        },
        commit_count: config.repo.commit_count,
        min_score: min_score.unwrap_or(config.ranking.min_score),
        max_results: config.ranking.max_results,
    };

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let outcome = run_triage(
        &tracker,
        &source_control,
        analyzer.as_deref(),
        &options,
        &cancel,
    )
    .await?;

    if outcome.reports.is_empty() {
        println!("No bugs found for the given criteria.");
        return Ok(());
    }

    for report in &outcome.reports {
        print_report(report);
    }

    Ok(())
}

fn print_report(report: &DefectReport) {
    let defect = &report.defect;

    println!("{}", "=".repeat(88));
    println!(
        "Bug {} ({}) — {}",
        defect.id,
        defect.state.as_deref().unwrap_or("Unknown"),
        defect.title
    );
    if let Some(created) = &defect.created_date {
        println!("Created: {}", created.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(assigned) = &defect.assigned_to {
        println!("Assigned: {assigned}");
    }
    if let Some(area) = &defect.area_path {
        println!("Area: {area}");
    }
    if let Some(url) = &defect.web_url {
        println!("Link: {url}");
    }
    if let Some(tags) = &defect.tags {
        println!("Tags: {tags}");
    }
    if let Some(summary) = &report.summary {
        println!("Summary: {}", truncate(summary, 260));
    }

    println!("\nTop suspect commits (heuristic):");
    if report.suspect_commits.is_empty() {
        println!("(no strong matches)");
    } else {
        for scored in &report.suspect_commits {
            let commit = &scored.commit;
            let short: String = commit.sha.chars().take(8).collect();
            println!(
                "- {short}  score={:.3}  {}",
                scored.score,
                truncate(commit.subject(), 110)
            );
            if let Some(url) = &commit.html_url {
                println!("  {url}");
            }
            let files = format_files(&commit.filenames(), 3);
            if !files.is_empty() {
                println!("  files: {}", truncate(&files, 140));
            }
            if !scored.matched_tokens.is_empty() {
                println!("  matched: {}", scored.matched_tokens.join(", "));
            }
        }
    }

    if let Some(analysis) = &report.ai_analysis {
        println!("\nAI analysis:");
        println!("  {}", analysis.summary);
        if let Some(cause) = &analysis.likely_cause {
            println!("  Likely cause: {cause}");
        }
        for suspect in &analysis.suspect_commits {
            match &suspect.url {
                Some(url) => println!("  Suspect: {} ({url})", suspect.sha),
                None => println!("  Suspect: {}", suspect.sha),
            }
        }
        for rec in &analysis.recommendations {
            println!("  Recommendation: {rec}");
        }
    }
}

/// Compact changed-file list: first few names plus a remainder count.
fn format_files(files: &[&str], max_shown: usize) -> String {
    let shown = &files[..files.len().min(max_shown)];
    let remaining = files.len() - shown.len();
    let base = shown.join(", ");
    if remaining == 0 {
        base
    } else if base.is_empty() {
        format!("+{remaining} more")
    } else {
        format!("{base}, +{remaining} more")
    }
}
