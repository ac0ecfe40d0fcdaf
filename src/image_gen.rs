//! Per-turn scene image generation. Each turn carrying an `image_prompt`
//! resolves to `generated/images/{idx:03}_{role}.png`; existing files are
//! reused, everything else goes through the prompt cache and the selected
//! backend. A failed turn is logged and dropped, never fatal.

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::{kieai::KieAiClient, openai};
use crate::config::Config;
use crate::image_cache::{irasutoya_style, ImageCache};
use crate::report::{BatchReport, ItemError, ItemOutcome};
use crate::script::Turn;

pub type ImageMap = BTreeMap<usize, PathBuf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageMethod {
    /// KieAI Nanobanana, irasutoya-styled (default).
    Kieai,
    /// OpenAI DALL-E 3.
    Openai,
}

#[async_trait]
trait ImageBackend {
    fn styled_prompt(&self, prompt: &str) -> String;
    async fn generate(&self, prompt: &str, out_path: &Path) -> Result<()>;
}

struct KieaiBackend {
    client: KieAiClient,
}

#[async_trait]
impl ImageBackend for KieaiBackend {
    fn styled_prompt(&self, prompt: &str) -> String {
        irasutoya_style(prompt)
    }

    async fn generate(&self, prompt: &str, out_path: &Path) -> Result<()> {
        self.client
            .generate_and_download(prompt, out_path, "16:9")
            .await
    }
}

struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl ImageBackend for OpenAiBackend {
    fn styled_prompt(&self, prompt: &str) -> String {
        prompt.to_string()
    }

    async fn generate(&self, prompt: &str, out_path: &Path) -> Result<()> {
        openai::generate_image(&self.client, &self.api_key, prompt, out_path).await
    }
}

fn backend_for(
    method: ImageMethod,
    cfg: &Config,
    client: &reqwest::Client,
) -> Result<Box<dyn ImageBackend + Send + Sync>> {
    match method {
        ImageMethod::Kieai => {
            if cfg.kieai_key.is_empty() {
                anyhow::bail!("config.json: kieai_api_key missing");
            }
            Ok(Box::new(KieaiBackend {
                client: KieAiClient::new(&cfg.kieai_key, &cfg.kieai_base, client.clone()),
            }))
        }
        ImageMethod::Openai => {
            if cfg.openai_key.is_empty() {
                anyhow::bail!("config.json: openai_api_key missing");
            }
            Ok(Box::new(OpenAiBackend {
                client: client.clone(),
                api_key: cfg.openai_key.clone(),
            }))
        }
    }
}

pub fn image_output_path(images_dir: &Path, index: usize, role: &str) -> PathBuf {
    images_dir.join(format!("{:03}_{}.png", index, role))
}

/// Generate every scene image for the script and persist the image map.
/// Returns whatever subset succeeded.
pub async fn generate_images(
    cfg: &Config,
    client: &reqwest::Client,
    turns: &[Turn],
    method: ImageMethod,
    images_dir: &Path,
) -> Result<(ImageMap, BatchReport)> {
    let backend = backend_for(method, cfg, client)?;
    let backend: &(dyn ImageBackend + Send + Sync) = backend.as_ref();
    let cache = ImageCache::default();
    let mut image_map = ImageMap::new();
    let mut report = BatchReport::new();

    info!("Image backend: {:?}", method);

    for (i, turn) in turns.iter().enumerate() {
        let Some(prompt) = turn.image_prompt.as_deref() else {
            continue;
        };

        let output_path = image_output_path(images_dir, i, &turn.role);

        if output_path.exists() {
            info!("[{:03}] skip (exists): {}", i, output_path.display());
            image_map.insert(i, output_path);
            report.record(i, ItemOutcome::Skipped);
            continue;
        }

        info!("[{:03}] generating: {}...", i, prompt.chars().take(50).collect::<String>());
        let styled = backend.styled_prompt(prompt);
        let result = cache
            .get_or_generate(&styled, &output_path, |p, out| async move {
                backend.generate(&p, &out).await
            })
            .await;

        match result {
            Ok(()) => {
                image_map.insert(i, output_path);
                report.record(i, ItemOutcome::Done);
            }
            Err(err) => {
                tracing::error!("[{:03}] image generation failed: {}", i, err);
                report.record(i, ItemOutcome::Failed(ItemError::Generation(err.to_string())));
            }
        }
    }

    report.log_summary("image generation");

    let map_path = images_dir.join("image_map.json");
    let serializable: BTreeMap<String, String> = image_map
        .iter()
        .map(|(k, v)| (k.to_string(), v.display().to_string()))
        .collect();
    tokio::fs::write(&map_path, serde_json::to_string_pretty(&serializable)?).await?;
    info!("Image map saved: {}", map_path.display());

    Ok((image_map, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_is_indexed_and_role_tagged() {
        let path = image_output_path(Path::new("generated/images"), 7, "icchi");
        assert_eq!(path, PathBuf::from("generated/images/007_icchi.png"));
    }
}
