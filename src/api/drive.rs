use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

use crate::api::google_auth::GoogleAuth;

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";

pub struct DriveClient {
    auth: Arc<GoogleAuth>,
    folder_id: String,
    client: Client,
}

#[derive(Debug, Clone)]
pub struct DriveFile {
    pub id: String,
    pub url: String,
}

impl DriveClient {
    pub fn new(auth: Arc<GoogleAuth>, folder_id: &str, client: Client) -> Self {
        Self {
            auth,
            folder_id: folder_id.to_string(),
            client,
        }
    }

    /// Multipart upload of one file into the configured folder.
    pub async fn upload_file(&self, path: &Path) -> Result<DriveFile> {
        let token = self.auth.access_token().await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [self.folder_id],
        });

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read upload file: {}", path.display()))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json; charset=UTF-8")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).mime_str("application/octet-stream")?,
            );

        let resp = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .multipart(form)
            .timeout(std::time::Duration::from_secs(1800))
            .send()
            .await
            .context("drive upload failed")?
            .error_for_status()?;

        let root: serde_json::Value = resp.json().await?;
        let id = root
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("no file id in drive response"))?
            .to_string();

        let url = format!("https://drive.google.com/file/d/{}/view", id);
        Ok(DriveFile { id, url })
    }
}
