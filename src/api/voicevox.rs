use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Client for a locally running VOICEVOX engine. Synthesis is the engine's
/// two-step contract: `audio_query` builds the query JSON, `synthesis`
/// renders it to WAV bytes.
#[derive(Debug, Clone)]
pub struct VoicevoxClient {
    base_url: String,
    client: Client,
}

impl VoicevoxClient {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// True when the engine answers its version endpoint.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/version", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(version) = resp.text().await {
                    tracing::info!("VOICEVOX engine version: {}", version.trim());
                }
                true
            }
            _ => false,
        }
    }

    pub async fn synthesize(&self, text: &str, speaker_id: u32, out_path: &Path) -> Result<()> {
        let speaker = speaker_id.to_string();
        let query_url = format!("{}/audio_query", self.base_url);
        let query_resp = self
            .client
            .post(&query_url)
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .context("audio_query request failed")?;

        if !query_resp.status().is_success() {
            anyhow::bail!("audio_query failed: HTTP {}", query_resp.status().as_u16());
        }
        let query_json: serde_json::Value = query_resp.json().await?;

        let synth_url = format!("{}/synthesis", self.base_url);
        let synth_resp = self
            .client
            .post(&synth_url)
            .query(&[("speaker", speaker.as_str())])
            .json(&query_json)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("synthesis request failed")?;

        if !synth_resp.status().is_success() {
            anyhow::bail!("synthesis failed: HTTP {}", synth_resp.status().as_u16());
        }

        let bytes = synth_resp.bytes().await?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }
        fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("write voice wav: {}", out_path.display()))?;

        Ok(())
    }
}
