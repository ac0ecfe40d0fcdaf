use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tracing::warn;

const GEMINI_MODEL: &str = "gemini-2.0-flash";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Default)]
pub struct GeminiReply {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

fn extract_reply(raw: &str) -> Option<GeminiReply> {
    let root: serde_json::Value = serde_json::from_str(raw).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            warn!("Gemini error message: {}", msg);
        }
        return None;
    }

    let text = root
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("text").and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return None;
    }

    let usage = root.get("usageMetadata");
    let prompt_tokens = usage
        .and_then(|u| u.get("promptTokenCount"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let completion_tokens = usage
        .and_then(|u| u.get("candidatesTokenCount"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    Some(GeminiReply {
        text,
        prompt_tokens,
        completion_tokens,
    })
}

/// Single text-generation round trip. The JSON-shaped prompt contract is
/// enforced only by prompt instructions; callers own the parsing.
pub async fn generate_text(
    client: &Client,
    api_key: &str,
    prompt: &str,
    temperature: f64,
    max_output_tokens: u32,
) -> Result<GeminiReply> {
    let url = format!(
        "{}/{}:generateContent?key={}",
        GEMINI_BASE, GEMINI_MODEL, api_key
    );

    let body = json!({
        "contents": [
            {"role": "user", "parts": [{"text": prompt}]},
        ],
        "generationConfig": {
            "temperature": temperature,
            "maxOutputTokens": max_output_tokens,
        },
    });

    let resp = client
        .post(&url)
        .json(&body)
        .timeout(std::time::Duration::from_secs(300))
        .send()
        .await
        .context("Gemini request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        warn!("Gemini HTTP {}", status.as_u16());
        if !raw.is_empty() {
            let snippet = raw.chars().take(500).collect::<String>();
            warn!("Gemini raw body: {}", snippet);
        }
        anyhow::bail!("Gemini HTTP {}", status.as_u16());
    }

    extract_reply(&raw).ok_or_else(|| {
        if !raw.is_empty() {
            let snippet = raw.chars().take(500).collect::<String>();
            warn!("Gemini raw body: {}", snippet);
        }
        anyhow::anyhow!("Gemini response parse failed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_usage() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "hello "}, {"text": "world"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 34}
        }"#;
        let reply = extract_reply(raw).unwrap();
        assert_eq!(reply.text, "hello world");
        assert_eq!(reply.prompt_tokens, 12);
        assert_eq!(reply.completion_tokens, 34);
    }

    #[test]
    fn error_body_yields_none() {
        assert!(extract_reply(r#"{"error": {"message": "quota"}}"#).is_none());
        assert!(extract_reply("not json").is_none());
        assert!(extract_reply(r#"{"candidates": []}"#).is_none());
    }
}
