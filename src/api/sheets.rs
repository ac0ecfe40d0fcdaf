use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

use crate::api::google_auth::GoogleAuth;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Thin Sheets v4 REST client: value reads, row appends, and batched cell
/// updates against one spreadsheet.
pub struct SheetsClient {
    auth: Arc<GoogleAuth>,
    spreadsheet_id: String,
    client: Client,
}

impl SheetsClient {
    pub fn new(auth: Arc<GoogleAuth>, spreadsheet_id: &str, client: Client) -> Self {
        Self {
            auth,
            spreadsheet_id: spreadsheet_id.to_string(),
            client,
        }
    }

    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_BASE,
            self.spreadsheet_id,
            urlencode(range)
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("sheets values.get failed")?
            .error_for_status()?;

        let root: serde_json::Value = resp.json().await?;
        let rows = root
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| match c {
                                        serde_json::Value::String(s) => s.clone(),
                                        other => other.to_string(),
                                    })
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    pub async fn append_row(&self, sheet_name: &str, values: &[String]) -> Result<()> {
        let token = self.auth.access_token().await?;
        let range = format!("{}!A:Z", sheet_name);
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW",
            SHEETS_BASE,
            self.spreadsheet_id,
            urlencode(&range)
        );
        self.client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({"values": [values]}))
            .send()
            .await
            .context("sheets append failed")?
            .error_for_status()?;
        Ok(())
    }

    /// Batch of single-cell updates: `(range, value)` pairs.
    pub async fn batch_update(&self, updates: &[(String, String)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/{}/values:batchUpdate",
            SHEETS_BASE, self.spreadsheet_id
        );
        let data: Vec<serde_json::Value> = updates
            .iter()
            .map(|(range, value)| json!({"range": range, "values": [[value]]}))
            .collect();
        self.client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({"valueInputOption": "RAW", "data": data}))
            .send()
            .await
            .context("sheets batchUpdate failed")?
            .error_for_status()?;
        Ok(())
    }

    /// Create the sheet with a header row when it does not exist yet.
    pub async fn ensure_sheet(&self, sheet_name: &str, headers: &[&str]) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/{}?fields=sheets.properties.title",
            SHEETS_BASE, self.spreadsheet_id
        );
        let root: serde_json::Value = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("sheets metadata failed")?
            .error_for_status()?
            .json()
            .await?;

        let existing: Vec<&str> = root
            .get("sheets")
            .and_then(|v| v.as_array())
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| {
                        s.get("properties")
                            .and_then(|p| p.get("title"))
                            .and_then(|t| t.as_str())
                    })
                    .collect()
            })
            .unwrap_or_default();

        if existing.contains(&sheet_name) {
            return Ok(());
        }

        tracing::info!("Creating sheet '{}'", sheet_name);
        let url = format!("{}/{}:batchUpdate", SHEETS_BASE, self.spreadsheet_id);
        self.client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({
                "requests": [
                    {"addSheet": {"properties": {"title": sheet_name}}}
                ]
            }))
            .send()
            .await
            .context("addSheet failed")?
            .error_for_status()?;

        let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        self.append_row(sheet_name, &header_row).await
    }
}

fn urlencode(input: &str) -> String {
    let mut out = String::new();
    for b in input.as_bytes() {
        let c = *b as char;
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '!' | ':') {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}
