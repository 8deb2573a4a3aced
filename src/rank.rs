//! Heuristic relevance scoring between a defect's text and recent commits.
//!
//! The scorer is a pure function over immutable inputs: token overlap forms
//! the base score, filename matches and exact work-item references add
//! bonuses, and merge commits are penalized. The constants below are tuning
//! choices carried over unchanged; they are not derived from a model.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{Commit, ScoredCommit};

/// Tokens shorter than this are discarded.
const MIN_TOKEN_LEN: usize = 3;
/// Denominator floor for the base overlap score. Keeps a two-token defect
/// text from reaching 1.0 on a single shared token.
const QUERY_LEN_FLOOR: usize = 8;
/// Added per query token that matches a changed filename.
const FILENAME_MATCH_BONUS: f64 = 0.08;
/// Added when the commit message cites the defect's work-item id.
const REFERENCE_BONUS: f64 = 0.6;
/// Multiplier applied to merge commits.
const MERGE_PENALTY: f64 = 0.6;
/// Display cap for the matched-token list. Does not affect the score.
const MATCHED_TOKEN_CAP: usize = 25;

/// Common English function words excluded from tokenization.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will",
    "with",
];

static TOKEN_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_./-]+").unwrap());

/// Split free text into normalized tokens.
///
/// Lowercases, splits on any run of characters outside `[a-z0-9_./-]`, drops
/// pieces shorter than three characters and stopwords, and deduplicates
/// preserving first-seen order. Deterministic and total: any input, however
/// malformed, yields a (possibly empty) token list.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for piece in TOKEN_SEPARATORS.split(&lowered) {
        let piece = piece.trim();
        if piece.len() < MIN_TOKEN_LEN || STOPWORDS.contains(&piece) {
            continue;
        }
        if seen.insert(piece.to_string()) {
            tokens.push(piece.to_string());
        }
    }
    tokens
}

/// Base overlap: matched tokens in query order, scored against the query
/// size with a floor of [`QUERY_LEN_FLOOR`].
fn score_overlap(query_tokens: &[String], doc_tokens: &HashSet<&str>) -> (f64, Vec<String>) {
    let matched: Vec<String> = query_tokens
        .iter()
        .filter(|t| doc_tokens.contains(t.as_str()))
        .cloned()
        .collect();
    let score = matched.len() as f64 / QUERY_LEN_FLOOR.max(query_tokens.len()) as f64;
    (score, matched)
}

/// Whether the lowercased commit message cites the given work-item id,
/// either bare or behind one of the usual reference markers.
fn references_defect(message_lower: &str, defect_id: u32) -> bool {
    let id = defect_id.to_string();
    message_lower.contains(&id)
        || message_lower.contains(&format!("ab#{id}"))
        || message_lower.contains(&format!("ab #{id}"))
        || message_lower.contains(&format!("#{id}"))
}

/// Whether the trimmed message starts with the word "merge".
fn is_merge_commit(message: &str) -> bool {
    let lower = message.trim().to_lowercase();
    match lower.strip_prefix("merge") {
        Some(rest) => !matches!(rest.chars().next(), Some(c) if c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

/// The commit's comparison document: message plus each changed filename.
fn commit_document(commit: &Commit) -> String {
    let mut doc = commit.message.clone();
    for file in &commit.files {
        doc.push('\n');
        doc.push_str(&file.filename);
    }
    doc
}

/// Score one commit against an already-tokenized defect text.
///
/// Returns the final score and the base-overlap matched tokens (filename and
/// reference matches boost the score but are not listed).
pub fn score_commit(
    query_tokens: &[String],
    commit: &Commit,
    defect_id: Option<u32>,
) -> (f64, Vec<String>) {
    let doc = commit_document(commit);
    let doc_tokens_vec = tokenize(&doc);
    let doc_tokens: HashSet<&str> = doc_tokens_vec.iter().map(String::as_str).collect();

    let (base, matched) = score_overlap(query_tokens, &doc_tokens);

    // Small bias for tokens that hit a changed filename; a defect naming a
    // touched file is stronger signal than generic message overlap.
    let filename_doc = commit
        .files
        .iter()
        .map(|f| f.filename.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let filename_tokens_vec = tokenize(&filename_doc);
    let filename_tokens: HashSet<&str> =
        filename_tokens_vec.iter().map(String::as_str).collect();
    let filename_matches = query_tokens
        .iter()
        .filter(|t| filename_tokens.contains(t.as_str()))
        .count();

    let mut score = base + filename_matches as f64 * FILENAME_MATCH_BONUS;

    if let Some(id) = defect_id {
        if id > 0 && references_defect(&commit.message.to_lowercase(), id) {
            score += REFERENCE_BONUS;
        }
    }

    if is_merge_commit(&commit.message) {
        score *= MERGE_PENALTY;
    }

    let mut matched = matched;
    matched.truncate(MATCHED_TOKEN_CAP);
    (score, matched)
}

/// Rank commits against a defect's composed text.
///
/// Commits scoring below `min_score` are dropped; the rest are sorted by
/// descending score. The sort is stable, so equally scored commits keep
/// their fetch order (reverse-chronological, favoring recency).
pub fn rank_commits(
    defect_text: &str,
    commits: &[Commit],
    defect_id: Option<u32>,
    min_score: f64,
) -> Vec<ScoredCommit> {
    let query_tokens = tokenize(defect_text);

    let mut ranked: Vec<ScoredCommit> = commits
        .iter()
        .map(|commit| {
            let (score, matched_tokens) = score_commit(&query_tokens, commit, defect_id);
            ScoredCommit {
                commit: commit.clone(),
                score,
                matched_tokens,
            }
        })
        .filter(|sc| sc.score >= min_score)
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
