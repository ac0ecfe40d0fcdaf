use anyhow::Result;
use std::path::Path;
use tokio::fs;

pub const SCRIPTS_DIR: &str = "generated/scripts";
pub const VOICES_DIR: &str = "generated/voices";
pub const IMAGES_DIR: &str = "generated/images";
pub const IMAGE_CACHE_DIR: &str = "generated/cache/images";
pub const VIDEOS_DIR: &str = "generated/videos";
pub const THUMBNAIL_DIR: &str = "generated/thumbnail";
pub const INTRO_IMAGES_DIR: &str = "generated/intro_images";
pub const BGM_DIR: &str = "assets/bgm";
pub const ASSET_IMAGES_DIR: &str = "assets/images";
pub const CHARACTER_IMAGES_DIR: &str = "assets/images/characters";
pub const BACKGROUND_IMAGES_DIR: &str = "assets/images/backgrounds";
pub const ICON_DIR: &str = "assets/images/icon";
pub const FONTS_DIR: &str = "assets/fonts";

const REQUIRED_DIRS: &[&str] = &[
    SCRIPTS_DIR,
    VOICES_DIR,
    IMAGES_DIR,
    IMAGE_CACHE_DIR,
    VIDEOS_DIR,
    THUMBNAIL_DIR,
    INTRO_IMAGES_DIR,
    BGM_DIR,
    CHARACTER_IMAGES_DIR,
    BACKGROUND_IMAGES_DIR,
    ICON_DIR,
    FONTS_DIR,
];

pub async fn ensure_directories() -> Result<()> {
    for dir in REQUIRED_DIRS {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir).await?;
            tracing::info!("Created directory: {}", dir);
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
