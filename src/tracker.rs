//! Azure DevOps work-item tracker client.
//!
//! Fetches Bug work items via WIQL plus a batch work-items read. Field
//! extraction is forgiving: missing or mistyped fields become `None` rather
//! than errors, so one malformed work item never fails a sweep.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::http::{basic_pat_auth_header, expect_json};
use crate::models::Defect;
use crate::traits::{DefectFilter, WorkItemTracker};

const API_VERSION: &str = "7.0";

/// REST client for an Azure DevOps organization.
pub struct AdoTracker {
    base_url: String,
    project: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AdoTracker {
    /// Build a client from configuration.
    ///
    /// The personal access token is read from `AZURE_DEVOPS_PAT`; it is a
    /// secret and never part of the config file.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let pat = std::env::var("AZURE_DEVOPS_PAT")
            .map_err(|_| anyhow::anyhow!("AZURE_DEVOPS_PAT environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: org_to_base_url(&config.organization),
            project: config.project.clone(),
            auth_header: basic_pat_auth_header(&pat),
            client,
        })
    }

    async fn fetch_work_items(&self, ids: &[u32]) -> Result<Vec<Defect>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/_apis/wit/workitems?ids={}&$expand=fields&api-version={}",
            self.base_url, joined, API_VERSION
        );

        let response: WorkItemsResponse = expect_json(
            self.client
                .get(&url)
                .header(reqwest::header::AUTHORIZATION, self.auth_header.as_str()),
            "tracker work items",
        )
        .await?;

        Ok(response
            .value
            .into_iter()
            .map(|item| self.to_defect(item))
            .collect())
    }

    fn to_defect(&self, item: WorkItem) -> Defect {
        let fields = item.fields.unwrap_or(Value::Null);
        let web_url = format!(
            "{}/{}/_workitems/edit/{}",
            self.base_url,
            urlencode(&self.project),
            item.id
        );

        Defect {
            id: item.id,
            title: pick_string(&fields, "System.Title")
                .unwrap_or_else(|| format!("(Bug {})", item.id)),
            state: pick_string(&fields, "System.State"),
            created_date: pick_string(&fields, "System.CreatedDate")
                .and_then(|s| parse_timestamp(&s)),
            assigned_to: pick_identity(&fields, "System.AssignedTo"),
            area_path: pick_string(&fields, "System.AreaPath"),
            iteration_path: pick_string(&fields, "System.IterationPath"),
            tags: pick_string(&fields, "System.Tags"),
            description: pick_string(&fields, "System.Description"),
            repro_steps: pick_string(&fields, "Microsoft.VSTS.TCM.ReproSteps")
                .or_else(|| pick_string(&fields, "Microsoft.VSTS.TCM.SystemInfo")),
            url: item.url,
            web_url: Some(web_url),
        }
    }
}

#[async_trait]
impl WorkItemTracker for AdoTracker {
    async fn fetch_defects(&self, filter: &DefectFilter) -> Result<Vec<Defect>> {
        let wiql = build_wiql(
            filter.created_in_last_days,
            &filter.states,
            filter.area_path.as_deref(),
        );
        let url = format!(
            "{}/{}/_apis/wit/wiql?api-version={}",
            self.base_url,
            urlencode(&self.project),
            API_VERSION
        );

        let response: WiqlResponse = expect_json(
            self.client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, self.auth_header.as_str())
                .json(&serde_json::json!({ "query": wiql })),
            "tracker WIQL query",
        )
        .await
        .context("WIQL query for recent defects failed")?;

        let ids: Vec<u32> = response
            .work_items
            .into_iter()
            .take(filter.top)
            .map(|item| item.id)
            .collect();

        self.fetch_work_items(&ids).await
    }

    async fn fetch_defect_by_id(&self, id: u32) -> Result<Option<Defect>> {
        let defects = self.fetch_work_items(&[id]).await?;
        Ok(defects.into_iter().next())
    }
}

// ============ WIQL construction ============

/// Build the WIQL query for recent Bug work items. Kept simple and broadly
/// compatible across ADO versions.
fn build_wiql(created_in_last_days: u32, states: &[String], area_path: Option<&str>) -> String {
    let states_clause = if states.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = states
            .iter()
            .map(|s| format!("'{}'", escape_wiql(s)))
            .collect();
        format!("AND [System.State] IN ({})", quoted.join(", "))
    };

    let area_clause = match area_path {
        Some(path) => format!("AND [System.AreaPath] UNDER '{}'", escape_wiql(path)),
        None => String::new(),
    };

    format!(
        "SELECT [System.Id]\n\
         FROM WorkItems\n\
         WHERE\n\
         [System.TeamProject] = @project\n\
         AND [System.WorkItemType] = 'Bug'\n\
         AND [System.CreatedDate] >= @Today - {created_in_last_days}\n\
         {states_clause}\n\
         {area_clause}\n\
         ORDER BY [System.CreatedDate] DESC"
    )
}

/// WIQL string literals escape single quotes by doubling them.
fn escape_wiql(value: &str) -> String {
    value.replace('\'', "''")
}

/// Accept either a bare organization name or a full collection URL.
fn org_to_base_url(organization: &str) -> String {
    let trimmed = organization.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("https://dev.azure.com/{trimmed}")
    }
}

/// Minimal percent-encoding for a URL path segment.
fn urlencode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ============ Field extraction ============

fn pick_string(fields: &Value, key: &str) -> Option<String> {
    fields.get(key)?.as_str().map(str::to_string)
}

/// Identity fields are objects; only the display name is useful here.
fn pick_identity(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)?
        .get("displayName")?
        .as_str()
        .map(str::to_string)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============ Wire types ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WiqlRef>,
}

#[derive(Deserialize)]
struct WiqlRef {
    id: u32,
}

#[derive(Deserialize)]
struct WorkItemsResponse {
    #[serde(default)]
    value: Vec<WorkItem>,
}

#[derive(Deserialize)]
struct WorkItem {
    id: u32,
    url: Option<String>,
    fields: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_to_base_url() {
        assert_eq!(org_to_base_url("contoso"), "https://dev.azure.com/contoso");
        assert_eq!(
            org_to_base_url("https://ado.internal.example/tfs/Collection/"),
            "https://ado.internal.example/tfs/Collection"
        );
    }

    #[test]
    fn test_build_wiql_clauses() {
        let wiql = build_wiql(
            14,
            &["New".to_string(), "Active".to_string()],
            Some("Payments\\Checkout"),
        );
        assert!(wiql.contains("@Today - 14"));
        assert!(wiql.contains("[System.State] IN ('New', 'Active')"));
        assert!(wiql.contains("UNDER 'Payments\\Checkout'"));
        assert!(wiql.contains("ORDER BY [System.CreatedDate] DESC"));
    }

    #[test]
    fn test_build_wiql_escapes_quotes() {
        let wiql = build_wiql(7, &["Ain't Done".to_string()], None);
        assert!(wiql.contains("'Ain''t Done'"));
    }

    #[test]
    fn test_pick_fields_tolerate_bad_shapes() {
        let fields = serde_json::json!({
            "System.Title": "Crash on save",
            "System.State": 42,
            "System.AssignedTo": { "displayName": "Sam Doe" },
            "System.AreaPath": null,
        });
        assert_eq!(
            pick_string(&fields, "System.Title").as_deref(),
            Some("Crash on save")
        );
        assert_eq!(pick_string(&fields, "System.State"), None);
        assert_eq!(
            pick_identity(&fields, "System.AssignedTo").as_deref(),
            Some("Sam Doe")
        );
        assert_eq!(pick_string(&fields, "System.AreaPath"), None);
        assert_eq!(pick_identity(&fields, "System.Missing"), None);
    }

    #[test]
    fn test_urlencode_path_segment() {
        assert_eq!(urlencode("My Project"), "My%20Project");
        assert_eq!(urlencode("plain-1.2"), "plain-1.2");
    }
}
