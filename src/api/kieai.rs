use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

const CREATE_TASK_ENDPOINT: &str = "/api/v1/jobs/createTask";
const QUERY_TASK_ENDPOINT: &str = "/api/v1/jobs/recordInfo";

const NANOBANANA_MODEL: &str = "google/nano-banana";
const NANOBANANA_PRO_MODEL: &str = "google/nano-banana-pro";

/// KieAI image-generation client: create a task, poll until it settles,
/// download the hosted result.
#[derive(Debug, Clone)]
pub struct KieAiClient {
    api_key: String,
    api_base: String,
    client: Client,
}

impl KieAiClient {
    pub fn new(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn request_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<serde_json::Value> {
        const MAX_RETRIES: u32 = 2;
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            let result = async {
                let resp = build()
                    .bearer_auth(&self.api_key)
                    .timeout(Duration::from_secs(60))
                    .send()
                    .await?;
                let resp = resp.error_for_status()?;
                resp.json::<serde_json::Value>()
                    .await
                    .map_err(anyhow::Error::from)
            }
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    last_err = Some(err);
                    if attempt < MAX_RETRIES {
                        let wait = 2 + attempt as u64 * 2;
                        warn!("KieAI attempt {} failed, waiting {}s...", attempt + 1, wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("KieAI request failed")))
    }

    async fn create_task(&self, model: &str, input: serde_json::Value) -> Result<String> {
        let url = format!("{}{}", self.api_base, CREATE_TASK_ENDPOINT);
        let payload = json!({
            "model": model,
            "callBackUrl": "http://localhost:8000/callback",
            "input": input,
        });

        let data = self
            .request_with_retry(|| self.client.post(&url).json(&payload))
            .await?;

        if data.get("code").and_then(|v| v.as_i64()) != Some(200) {
            anyhow::bail!("KieAI task creation error: {}", data);
        }
        data.get("data")
            .and_then(|d| d.get("taskId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("No taskId in response: {}", data))
    }

    /// Poll the task until success or failure, bounded by `max_wait`.
    async fn poll_task(&self, task_id: &str, max_wait: Duration) -> Result<String> {
        let url = format!("{}{}", self.api_base, QUERY_TASK_ENDPOINT);
        let started = std::time::Instant::now();
        let poll_interval = Duration::from_secs(10);

        while started.elapsed() < max_wait {
            let data = self
                .request_with_retry(|| self.client.get(&url).query(&[("taskId", task_id)]))
                .await?;

            if data.get("code").and_then(|v| v.as_i64()) != Some(200) {
                anyhow::bail!("KieAI query error: {}", data);
            }

            let state = data
                .get("data")
                .and_then(|d| d.get("state"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            info!("[KieAI] task {} status: {}", task_id, state);

            match state {
                "success" => {
                    let result_json = data
                        .get("data")
                        .and_then(|d| d.get("resultJson"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("{}");
                    let parsed: serde_json::Value =
                        serde_json::from_str(result_json).unwrap_or_default();
                    if let Some(url) = parsed
                        .get("resultUrls")
                        .and_then(|v| v.as_array())
                        .and_then(|a| a.first())
                        .and_then(|v| v.as_str())
                    {
                        return Ok(url.to_string());
                    }
                    anyhow::bail!("No image URL in completed task: {}", data);
                }
                "FAILED" | "ERROR" | "failed" | "error" => {
                    anyhow::bail!("KieAI task failed: {}", data);
                }
                _ => tokio::time::sleep(poll_interval).await,
            }
        }

        anyhow::bail!("KieAI task {} timed out after {:?}", task_id, max_wait)
    }

    async fn download(&self, url: &str, out_path: &Path) -> Result<()> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("image download failed")?
            .error_for_status()?;
        let bytes = resp.bytes().await?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }
        fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("write image: {}", out_path.display()))?;
        Ok(())
    }

    /// Nanobanana standard tier: fast, ~1MP, 2 credits per image.
    pub async fn generate_and_download(
        &self,
        prompt: &str,
        out_path: &Path,
        aspect_ratio: &str,
    ) -> Result<()> {
        let task_id = self
            .create_task(
                NANOBANANA_MODEL,
                json!({
                    "prompt": prompt,
                    "image_size": aspect_ratio,
                    "output_format": "png",
                }),
            )
            .await?;
        let url = self.poll_task(&task_id, Duration::from_secs(600)).await?;
        self.download(&url, out_path).await
    }

    /// Nanobanana Pro tier: slower and pricier, used for thumbnails.
    pub async fn generate_pro_and_download(
        &self,
        prompt: &str,
        out_path: &Path,
        aspect_ratio: &str,
        resolution: &str,
    ) -> Result<()> {
        let task_id = self
            .create_task(
                NANOBANANA_PRO_MODEL,
                json!({
                    "prompt": prompt,
                    "image_size": aspect_ratio,
                    "resolution": resolution,
                    "output_format": "png",
                }),
            )
            .await?;
        let url = self.poll_task(&task_id, Duration::from_secs(600)).await?;
        self.download(&url, out_path).await
    }
}
