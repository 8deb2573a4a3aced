//! GitHub source-control client.
//!
//! Lists recent commits for a repository and fetches each commit's
//! changed-file list. Order is preserved as returned by the API
//! (reverse-chronological), which the ranking relies on for tie-breaking.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::config::RepoConfig;
use crate::http::expect_json;
use crate::models::{Commit, CommitFile};
use crate::traits::SourceControl;

const API_BASE: &str = "https://api.github.com";
/// GitHub caps commit listings at 100 per page.
const MAX_PER_PAGE: usize = 100;

/// REST client for one GitHub repository.
pub struct GithubRepo {
    owner: String,
    repo: String,
    client: reqwest::Client,
}

impl GithubRepo {
    /// Build a client from configuration.
    ///
    /// The access token is read from `GITHUB_TOKEN`; it is a secret and
    /// never part of the config file.
    pub fn new(config: &RepoConfig) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| anyhow::anyhow!("GITHUB_TOKEN environment variable not set"))?;

        let (owner, repo) = parse_repo(&config.repository)?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            "application/vnd.github+json".parse()?,
        );

        let client = reqwest::Client::builder()
            .user_agent(concat!("bugtrail/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            owner,
            repo,
            client,
        })
    }
}

#[async_trait]
impl SourceControl for GithubRepo {
    async fn fetch_recent_commits(&self, count: usize) -> Result<Vec<Commit>> {
        let per_page = count.clamp(1, MAX_PER_PAGE);
        let list_url = format!(
            "{API_BASE}/repos/{}/{}/commits?per_page={per_page}",
            self.owner, self.repo
        );

        let listing: Vec<CommitListEntry> =
            expect_json(self.client.get(&list_url), "commit listing").await?;

        let mut commits = Vec::with_capacity(listing.len().min(count));
        for entry in listing.into_iter().take(count) {
            // The listing omits changed files; each commit needs its own read.
            let detail_url = format!(
                "{API_BASE}/repos/{}/{}/commits/{}",
                self.owner, self.repo, entry.sha
            );
            let detail: CommitDetail =
                expect_json(self.client.get(&detail_url), "commit detail").await?;

            commits.push(Commit {
                sha: entry.sha,
                html_url: detail.html_url,
                message: detail.commit.message,
                author_name: detail.commit.author.as_ref().and_then(|a| a.name.clone()),
                date: detail.commit.author.as_ref().and_then(|a| a.date),
                files: detail
                    .files
                    .into_iter()
                    .map(|f| CommitFile {
                        filename: f.filename,
                        status: f.status,
                    })
                    .collect(),
            });
        }

        Ok(commits)
    }
}

/// Split an `owner/repo` specifier.
pub fn parse_repo(repository: &str) -> Result<(String, String)> {
    let trimmed = repository.trim();
    match trimmed.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("Invalid repository. Expected 'owner/repo', got: {repository}"),
    }
}

// ============ Wire types ============

#[derive(Deserialize)]
struct CommitListEntry {
    sha: String,
}

#[derive(Deserialize)]
struct CommitDetail {
    html_url: Option<String>,
    commit: CommitBody,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Deserialize)]
struct CommitBody {
    #[serde(default)]
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct FileEntry {
    filename: String,
    status: Option<String>,
}
