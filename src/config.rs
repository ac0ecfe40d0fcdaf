use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Video canvas and timing defaults shared by the assembly stages.
pub const VIDEO_WIDTH: u32 = 1280;
pub const VIDEO_HEIGHT: u32 = 720;
pub const VIDEO_FPS: u32 = 24;
pub const BGM_VOLUME: f64 = 0.1;

pub const MAX_VISIBLE_SUBTITLES: usize = 4;
pub const SUBTITLE_STACK_MARGIN: u32 = 18;
pub const SUBTITLE_LEFT_MARGIN: u32 = 25;
pub const SUBTITLE_TOP_MARGIN: u32 = 144;
pub const SUBTITLE_MAX_CHARS_PER_LINE: usize = 25;
pub const SUBTITLE_FONT_SIZE: f32 = 28.0;
pub const SHOW_SPEAKER_NAME: bool = false;

pub const INTRO_DURATION: f64 = 25.0;
pub const INTRO_THEME_FONT_SIZE: f32 = 54.0;

pub const ICON_SIZE: u32 = 150;
pub const ICON_LEFT_MARGIN: u32 = 20;
pub const ICON_BOTTOM_MARGIN: u32 = 20;

pub const CHARACTER_RIGHT_MARGIN: u32 = 30;
pub const CHARACTER_BOTTOM_MARGIN: u32 = 30;
pub const CHARACTER_HEIGHT_RATIO: f64 = 0.38;

pub const BACKGROUND_OVERLAY_ALPHA: f64 = 0.7;

/// Style prefix prepended to every generated-image prompt.
pub const IRASUTOYA_STYLE_PREFIX: &str = "Irasutoya illustration style, simple flat design, \
cute Japanese illustration, pastel colors, white background, no outlines, soft rounded \
shapes, kawaii characters, minimal details, deformed style with big head and small body";

pub const YOUTUBE_CATEGORY_ID: &str = "22";
pub const YOUTUBE_DEFAULT_TAGS: &[&str] = &["2ch", "2chまとめ", "5ch", "ゆっくり", "名スレ"];
/// Allowed JST publish hours for scheduled uploads.
pub const PUBLISH_HOURS_JST: &[u32] = &[6, 18];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "gemini_api_key")]
    pub gemini_key: String,
    #[serde(rename = "kieai_api_key")]
    #[serde(default)]
    pub kieai_key: String,
    #[serde(rename = "kieai_api_base")]
    #[serde(default = "default_kieai_base")]
    pub kieai_base: String,
    #[serde(rename = "openai_api_key")]
    #[serde(default)]
    pub openai_key: String,
    #[serde(rename = "voicevox_url")]
    #[serde(default = "default_voicevox_url")]
    pub voicevox_url: String,
    #[serde(rename = "youtube_api_key")]
    #[serde(default)]
    pub youtube_key: String,
    #[serde(rename = "google_sheets_id")]
    #[serde(default)]
    pub sheets_id: String,
    #[serde(rename = "google_drive_folder_id")]
    #[serde(default)]
    pub drive_folder_id: String,
    #[serde(rename = "google_token_file")]
    #[serde(default = "default_token_file")]
    pub google_token_file: String,
}

fn default_kieai_base() -> String {
    "https://api.kieai.net".to_string()
}

fn default_voicevox_url() -> String {
    "http://localhost:50021".to_string()
}

fn default_token_file() -> String {
    "google_token.json".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)?;

        if config.gemini_key.is_empty() {
            anyhow::bail!("config.json: gemini_api_key missing");
        }

        Ok(config)
    }
}
