// src/fetch/mod.rs

use anyhow::{bail, Context, Result};
use reqwest::Client;

/// Download the raw export text. The body is handed to the pipeline as-is;
/// a whitespace-only body fails here so the load surfaces one clear error
/// instead of "no recognizable header" downstream.
pub async fn fetch_export(client: &Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?
        .text()
        .await
        .with_context(|| format!("reading body from {url}"))?;

    if text.trim().is_empty() {
        bail!("export at {url} is empty");
    }
    Ok(text)
}
