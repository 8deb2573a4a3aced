//! Optional LLM-backed defect analysis.
//!
//! Providers mirror the configuration switch used elsewhere: `disabled`,
//! `anthropic` (API key from the environment), or `ollama` (local HTTP).
//! Model replies are treated as unreliable text: a JSON object is scraped
//! out when present, and anything else degrades to a plain-text summary
//! rather than an error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AnalysisConfig;
use crate::http::expect_json;
use crate::models::Commit;
use crate::traits::CommitAnalyzer;

/// At most this many commits are described to the model.
const COMMIT_DIGEST_CAP: usize = 30;
/// At most this many filenames per commit in the digest.
const DIGEST_FILE_CAP: usize = 5;
/// Suspect hash prefixes shorter than this are too ambiguous to keep.
const MIN_SUSPECT_PREFIX_LEN: usize = 7;
const ANTHROPIC_MAX_TOKENS: u32 = 2000;

/// Structured analysis as requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub summary: String,
    #[serde(default)]
    pub likely_cause: Option<String>,
    /// Commit hash prefixes the model suspects.
    #[serde(default)]
    pub suspect_commits: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Tagged result of a model call: either parsed structure or raw text.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Structured(Analysis),
    Unstructured(String),
}

impl AnalysisOutcome {
    /// Collapse into an [`Analysis`], treating raw text as the summary with
    /// no suspects and no recommendations.
    pub fn into_analysis(self) -> Analysis {
        match self {
            AnalysisOutcome::Structured(analysis) => analysis,
            AnalysisOutcome::Unstructured(raw) => Analysis {
                summary: raw,
                likely_cause: None,
                suspect_commits: Vec::new(),
                recommendations: Vec::new(),
            },
        }
    }
}

/// A suspect hash prefix resolved against the fetched commits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectCommit {
    pub sha: String,
    pub url: Option<String>,
}

/// Analysis merged with resolved suspect commits, ready for presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub summary: String,
    pub likely_cause: Option<String>,
    pub suspect_commits: Vec<SuspectCommit>,
    pub recommendations: Vec<String>,
}

/// What the analyzer is asked about: one defect and a commit digest.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub title: String,
    pub description: Option<String>,
    pub repro_steps: Option<String>,
    pub commits: Vec<CommitDigest>,
}

/// Compact commit view for the prompt.
#[derive(Debug, Clone)]
pub struct CommitDigest {
    pub sha: String,
    pub message: String,
    pub files: Vec<String>,
}

impl CommitDigest {
    pub fn from_commit(commit: &Commit) -> Self {
        Self {
            sha: commit.sha.clone(),
            message: commit.message.clone(),
            files: commit
                .files
                .iter()
                .map(|f| f.filename.clone())
                .collect(),
        }
    }
}

// ============ Prompt construction ============

/// Render the analysis prompt. Pure, so the exact prompt is testable.
pub fn build_prompt(request: &AnalysisRequest) -> String {
    let commits_text = request
        .commits
        .iter()
        .take(COMMIT_DIGEST_CAP)
        .map(|c| {
            let short: String = c.sha.chars().take(8).collect();
            let files = c
                .files
                .iter()
                .take(DIGEST_FILE_CAP)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            format!("{short}: {}\nFiles: {files}", c.message)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let description = match &request.description {
        Some(d) => format!("Description: {d}\n"),
        None => String::new(),
    };
    let repro = match &request.repro_steps {
        Some(r) => format!("Repro Steps: {r}\n"),
        None => String::new(),
    };

    format!(
        "You are a senior software engineer analyzing a bug report and recent code changes.\n\n\
         Bug Report:\n\
         Title: {title}\n\
         {description}{repro}\n\
         Recent Commits (last {cap}):\n\
         {commits_text}\n\n\
         Based on this information:\n\
         1. Provide a brief summary of what likely caused this bug\n\
         2. Identify the most suspect commits (by SHA prefix)\n\
         3. Give specific recommendations for investigation\n\n\
         Format your response as JSON:\n\
         {{\n\
         \x20 \"summary\": \"One paragraph analysis\",\n\
         \x20 \"likelyCause\": \"Most likely root cause\",\n\
         \x20 \"suspectCommits\": [\"sha1\", \"sha2\"],\n\
         \x20 \"recommendations\": [\"rec1\", \"rec2\"]\n\
         }}",
        title = request.title,
        cap = COMMIT_DIGEST_CAP,
    )
}

// ============ Response handling ============

/// The JSON-looking substring of a reply: first `{` through last `}`.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Interpret a raw model reply. Parse failures are not errors: the whole
/// reply becomes the summary instead.
pub fn parse_analysis(text: &str) -> AnalysisOutcome {
    if let Some(block) = extract_json_block(text) {
        if let Ok(analysis) = serde_json::from_str::<Analysis>(block) {
            return AnalysisOutcome::Structured(analysis);
        }
    }
    AnalysisOutcome::Unstructured(text.to_string())
}

/// Match suspect hash prefixes against the fetched commits to recover
/// display URLs. Prefixes shorter than seven characters are discarded.
pub fn resolve_suspects(prefixes: &[String], commits: &[Commit]) -> Vec<SuspectCommit> {
    prefixes
        .iter()
        .map(|p| p.trim())
        .filter(|p| p.len() >= MIN_SUSPECT_PREFIX_LEN)
        .map(|prefix| {
            let lower = prefix.to_lowercase();
            let commit = commits
                .iter()
                .find(|c| c.sha.to_lowercase().starts_with(&lower));
            SuspectCommit {
                sha: prefix.to_string(),
                url: commit.and_then(|c| c.html_url.clone()),
            }
        })
        .collect()
}

/// Merge a model analysis with the fetched commits.
pub fn enrich_analysis(analysis: Analysis, commits: &[Commit]) -> AnalysisReport {
    let suspect_commits = resolve_suspects(&analysis.suspect_commits, commits);
    AnalysisReport {
        summary: analysis.summary,
        likely_cause: analysis.likely_cause,
        suspect_commits,
        recommendations: analysis.recommendations,
    }
}

// ============ Provider selection ============

/// Instantiate the configured analyzer, or `None` when analysis is disabled.
pub fn create_analyzer(config: &AnalysisConfig) -> Result<Option<Box<dyn CommitAnalyzer>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "anthropic" => Ok(Some(Box::new(AnthropicAnalyzer::new(config)?))),
        "ollama" => Ok(Some(Box::new(OllamaAnalyzer::new(config)?))),
        other => bail!("Unknown analysis provider: {other}"),
    }
}

// ============ Anthropic provider ============

/// Analyzer backed by the Anthropic Messages API.
pub struct AnthropicAnalyzer {
    model: String,
    client: reqwest::Client,
}

impl AnthropicAnalyzer {
    /// The API key is read from `ANTHROPIC_API_KEY`.
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("analysis.model required for Anthropic provider"))?;
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", api_key.parse()?);
        headers.insert("anthropic-version", "2023-06-01".parse()?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { model, client })
    }
}

#[async_trait]
impl CommitAnalyzer for AnthropicAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let prompt = build_prompt(request);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response: AnthropicResponse = expect_json(
            self.client
                .post("https://api.anthropic.com/v1/messages")
                .json(&body),
            "Anthropic analysis",
        )
        .await?;

        let text = response
            .content
            .into_iter()
            .find_map(|block| match block {
                AnthropicContent::Text { text } => Some(text),
                AnthropicContent::Other => None,
            })
            .ok_or_else(|| anyhow::anyhow!("No text content in Anthropic response"))?;

        Ok(parse_analysis(&text))
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

// ============ Ollama provider ============

/// Analyzer backed by a local Ollama instance.
pub struct OllamaAnalyzer {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "llama3".to_string()),
            client,
        })
    }
}

#[async_trait]
impl CommitAnalyzer for OllamaAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let prompt = build_prompt(request);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response: OllamaResponse =
            expect_json(self.client.post(&url).json(&body), "Ollama analysis").await?;

        Ok(parse_analysis(&response.response.unwrap_or_default()))
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommitFile;

    fn make_commit(sha: &str, url: Option<&str>) -> Commit {
        Commit {
            sha: sha.to_string(),
            html_url: url.map(str::to_string),
            message: String::new(),
            author_name: None,
            date: None,
            files: vec![CommitFile {
                filename: "src/lib.rs".to_string(),
                status: None,
            }],
        }
    }

    #[test]
    fn test_parse_analysis_structured() {
        let reply = r#"{"summary": "Regression in retry logic", "likelyCause": "Timeout change", "suspectCommits": ["abc1234"], "recommendations": ["Revert"]}"#;
        match parse_analysis(reply) {
            AnalysisOutcome::Structured(a) => {
                assert_eq!(a.summary, "Regression in retry logic");
                assert_eq!(a.likely_cause.as_deref(), Some("Timeout change"));
                assert_eq!(a.suspect_commits, vec!["abc1234"]);
                assert_eq!(a.recommendations, vec!["Revert"]);
            }
            AnalysisOutcome::Unstructured(_) => panic!("expected structured outcome"),
        }
    }

    #[test]
    fn test_parse_analysis_scrapes_embedded_json() {
        let reply = "Here is my take:\n{\"summary\": \"Likely the cache change\"}\nHope that helps.";
        match parse_analysis(reply) {
            AnalysisOutcome::Structured(a) => {
                assert_eq!(a.summary, "Likely the cache change");
                assert!(a.suspect_commits.is_empty());
            }
            AnalysisOutcome::Unstructured(_) => panic!("expected structured outcome"),
        }
    }

    #[test]
    fn test_parse_analysis_falls_back_to_raw_text() {
        let reply = "I could not produce JSON, but the bug looks like a race.";
        match parse_analysis(reply) {
            AnalysisOutcome::Unstructured(raw) => assert_eq!(raw, reply),
            AnalysisOutcome::Structured(_) => panic!("expected unstructured outcome"),
        }
        let analysis = parse_analysis(reply).into_analysis();
        assert_eq!(analysis.summary, reply);
        assert!(analysis.suspect_commits.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_parse_analysis_malformed_json_falls_back() {
        let reply = "{not json at all}";
        assert!(matches!(
            parse_analysis(reply),
            AnalysisOutcome::Unstructured(_)
        ));
    }

    #[test]
    fn test_resolve_suspects_discards_short_prefixes() {
        let commits = vec![make_commit(
            "abcdef1234567890",
            Some("https://example.com/c/abcdef1"),
        )];
        let prefixes = vec!["abc".to_string(), "abcdef1".to_string()];
        let suspects = resolve_suspects(&prefixes, &commits);
        assert_eq!(suspects.len(), 1);
        assert_eq!(suspects[0].sha, "abcdef1");
        assert_eq!(
            suspects[0].url.as_deref(),
            Some("https://example.com/c/abcdef1")
        );
    }

    #[test]
    fn test_resolve_suspects_case_insensitive_prefix() {
        let commits = vec![make_commit("ABCDEF1234", Some("https://example.com/c"))];
        let suspects = resolve_suspects(&["abcdef12".to_string()], &commits);
        assert_eq!(suspects[0].url.as_deref(), Some("https://example.com/c"));
    }

    #[test]
    fn test_resolve_suspects_unknown_prefix_keeps_sha_without_url() {
        let commits = vec![make_commit("abcdef1234", None)];
        let suspects = resolve_suspects(&["9999999".to_string()], &commits);
        assert_eq!(suspects.len(), 1);
        assert!(suspects[0].url.is_none());
    }

    #[test]
    fn test_build_prompt_caps_commits_and_files() {
        let commits: Vec<CommitDigest> = (0..40)
            .map(|i| CommitDigest {
                sha: format!("{i:08x}deadbeef"),
                message: format!("commit {i}"),
                files: (0..10).map(|f| format!("file{f}.rs")).collect(),
            })
            .collect();
        let request = AnalysisRequest {
            title: "Crash on save".to_string(),
            description: Some("It crashes.".to_string()),
            repro_steps: None,
            commits,
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("commit 29"));
        assert!(!prompt.contains("commit 30"));
        assert!(prompt.contains("file4.rs"));
        assert!(!prompt.contains("file5.rs"));
        assert!(prompt.contains("Title: Crash on save"));
        assert!(prompt.contains("Description: It crashes."));
        assert!(!prompt.contains("Repro Steps"));
    }
}
