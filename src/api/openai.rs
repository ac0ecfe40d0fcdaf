use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// DALL-E 3 image generation: one request returning a hosted URL, then a
/// plain download.
pub async fn generate_image(
    client: &Client,
    api_key: &str,
    prompt: &str,
    out_path: &Path,
) -> Result<()> {
    let body = json!({
        "model": "dall-e-3",
        "prompt": prompt,
        "size": "1792x1024",
        "quality": "standard",
        "n": 1,
    });

    let resp = client
        .post("https://api.openai.com/v1/images/generations")
        .bearer_auth(api_key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(300))
        .send()
        .await
        .context("OpenAI image request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        warn!("OpenAI image HTTP {}", status.as_u16());
        if !raw.is_empty() {
            let snippet = raw.chars().take(500).collect::<String>();
            warn!("OpenAI raw body: {}", snippet);
        }
        anyhow::bail!("OpenAI image HTTP {}", status.as_u16());
    }

    let root: serde_json::Value = serde_json::from_str(&raw)?;
    let image_url = root
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|a| a.first())
        .and_then(|e| e.get("url"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("No image URL in OpenAI response"))?;

    let bytes = client
        .get(image_url)
        .timeout(std::time::Duration::from_secs(120))
        .send()
        .await
        .context("image download failed")?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).await.ok();
    }
    fs::write(out_path, &bytes)
        .await
        .with_context(|| format!("write image: {}", out_path.display()))?;

    Ok(())
}
