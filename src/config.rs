use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration loaded from a TOML file.
///
/// Secrets (the tracker PAT, the source-control token, the analysis API key)
/// are deliberately not part of the file; they are read from the environment
/// by the collaborator constructors.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub repo: RepoConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub server: ServerConfig,
}

/// Work-item tracker (Azure DevOps) settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Organization name, or a full collection URL for on-prem installs.
    pub organization: String,
    pub project: String,
    /// Only defects created within the last N days are fetched.
    #[serde(default = "default_days")]
    pub days: u32,
    /// Maximum number of defects per fetch.
    #[serde(default = "default_top")]
    pub top: usize,
    /// Work-item states to include.
    #[serde(default = "default_states")]
    pub states: Vec<String>,
    /// Optional area-path filter (matched with UNDER semantics).
    #[serde(default)]
    pub area_path: Option<String>,
}

fn default_days() -> u32 {
    7
}
fn default_top() -> usize {
    10
}
fn default_states() -> Vec<String> {
    vec!["New".to_string(), "Active".to_string()]
}

/// Source-control (GitHub) settings.
#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    /// Repository in `owner/repo` form.
    pub repository: String,
    /// Number of recent commits to fetch and score.
    #[serde(default = "default_commit_count")]
    pub commit_count: usize,
}

fn default_commit_count() -> usize {
    50
}

/// Scoring thresholds and display caps, passed explicitly into the pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    /// Commits scoring below this are dropped from the ranking.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Ranked commits shown per defect.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_results: default_max_results(),
        }
    }
}

fn default_min_score() -> f64 {
    0.08
}
fn default_max_results() -> usize {
    5
}

/// LLM enrichment settings.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// `disabled`, `anthropic`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// HTTP API server settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.tracker.organization.trim().is_empty() {
        anyhow::bail!("tracker.organization must not be empty");
    }
    if config.tracker.project.trim().is_empty() {
        anyhow::bail!("tracker.project must not be empty");
    }

    if !config.repo.repository.contains('/') {
        anyhow::bail!(
            "repo.repository must be in 'owner/repo' form, got '{}'",
            config.repo.repository
        );
    }
    if config.repo.commit_count == 0 {
        anyhow::bail!("repo.commit_count must be >= 1");
    }

    if !config.ranking.min_score.is_finite() || config.ranking.min_score < 0.0 {
        anyhow::bail!("ranking.min_score must be a non-negative number");
    }
    if config.ranking.max_results == 0 {
        anyhow::bail!("ranking.max_results must be >= 1");
    }

    match config.analysis.provider.as_str() {
        "disabled" | "anthropic" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown analysis provider: '{}'. Must be disabled, anthropic, or ollama.",
            other
        ),
    }
    if config.analysis.provider == "anthropic" && config.analysis.model.is_none() {
        anyhow::bail!("analysis.model must be specified when provider is 'anthropic'");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
[tracker]
organization = "contoso"
project = "Payments"

[repo]
repository = "contoso/payments-api"

[server]
bind = "127.0.0.1:4000"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tracker.days, 7);
        assert_eq!(config.tracker.top, 10);
        assert_eq!(config.tracker.states, vec!["New", "Active"]);
        assert_eq!(config.repo.commit_count, 50);
        assert!((config.ranking.min_score - 0.08).abs() < 1e-9);
        assert_eq!(config.ranking.max_results, 5);
        assert_eq!(config.analysis.provider, "disabled");
        assert!(!config.analysis.is_enabled());
    }

    #[test]
    fn test_rejects_malformed_repository() {
        let content = MINIMAL.replace("contoso/payments-api", "not-a-repo");
        let file = write_config(&content);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_analysis_provider() {
        let content = format!("{MINIMAL}\n[analysis]\nprovider = \"openai\"\n");
        let file = write_config(&content);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_anthropic_requires_model() {
        let content = format!("{MINIMAL}\n[analysis]\nprovider = \"anthropic\"\n");
        let file = write_config(&content);
        assert!(load_config(file.path()).is_err());

        let content = format!(
            "{MINIMAL}\n[analysis]\nprovider = \"anthropic\"\nmodel = \"claude-sonnet-4-5\"\n"
        );
        let file = write_config(&content);
        assert!(load_config(file.path()).unwrap().analysis.is_enabled());
    }

    #[test]
    fn test_rejects_negative_min_score() {
        let content = format!("{MINIMAL}\n[ranking]\nmin_score = -0.5\n");
        let file = write_config(&content);
        assert!(load_config(file.path()).is_err());
    }
}
