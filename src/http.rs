//! Small JSON-over-HTTP helpers shared by the collaborator clients.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;

/// How much of an error response body to carry into the error message.
const ERROR_BODY_EXCERPT: usize = 2000;

/// Send a request and decode the JSON body, turning any non-2xx status into
/// an error that carries a body excerpt for diagnosis.
pub async fn expect_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .with_context(|| format!("Request failed: {what}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!(
            "HTTP {} for {}: {}",
            status,
            what,
            crate::text::truncate(&body, ERROR_BODY_EXCERPT)
        );
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to decode response: {what}"))
}

/// Basic auth header for Azure DevOps: blank username, PAT as password.
pub fn basic_pat_auth_header(pat: &str) -> String {
    let token = STANDARD.encode(format!(":{pat}"));
    format!("Basic {token}")
}
