use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::Mutex;

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Deserialize)]
struct StoredToken {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

/// OAuth2 refresh-token flow against Google. The stored token file carries
/// the client pair and a long-lived refresh token; short-lived access
/// tokens are fetched on demand and cached until close to expiry.
pub struct GoogleAuth {
    stored: StoredToken,
    client: Client,
    cached: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl GoogleAuth {
    pub async fn load(token_file: &Path, client: Client) -> Result<Self> {
        let content = tokio::fs::read_to_string(token_file)
            .await
            .with_context(|| format!("Failed to read token file: {}", token_file.display()))?;
        let stored: StoredToken =
            serde_json::from_str(&content).context("Failed to parse google token file")?;

        if stored.refresh_token.is_empty() {
            anyhow::bail!("{}: refresh_token missing", token_file.display());
        }

        Ok(Self {
            stored,
            client,
            cached: Mutex::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((token, expiry)) = cached.as_ref() {
            if *expiry > Utc::now() + Duration::seconds(60) {
                return Ok(token.clone());
            }
        }

        let resp = self
            .client
            .post(TOKEN_URI)
            .form(&[
                ("client_id", self.stored.client_id.as_str()),
                ("client_secret", self.stored.client_secret.as_str()),
                ("refresh_token", self.stored.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("token refresh request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("token refresh failed: HTTP {} {}", status.as_u16(), body);
        }

        let value: serde_json::Value = resp.json().await?;
        let token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("no access_token in refresh response"))?
            .to_string();
        let expires_in = value
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .unwrap_or(3600);

        *cached = Some((token.clone(), Utc::now() + Duration::seconds(expires_in)));
        Ok(token)
    }
}
