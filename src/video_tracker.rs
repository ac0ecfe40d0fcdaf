//! Spreadsheet bookkeeping: one row per produced video at publish time,
//! with view/like/comment columns backfilled later by re-querying the
//! video IDs parsed out of the stored YouTube URLs.

use anyhow::Result;
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::drive::DriveClient;
use crate::api::google_auth::GoogleAuth;
use crate::api::sheets::SheetsClient;
use crate::api::youtube::YouTubeDataClient;
use crate::config::Config;

pub const SHEET_NAME: &str = "生成ログ";

pub const TIMESTAMP_COLUMN: usize = 0;
pub const THEME_COLUMN: usize = 1;
pub const YOUTUBE_URL_COLUMN: usize = 5;
pub const VIEWS_COLUMN: usize = 6;
pub const LIKES_COLUMN: usize = 7;
pub const COMMENTS_COLUMN: usize = 8;

const SHEET_HEADERS: &[&str] = &[
    "生成日時", "テーマ", "動画尺", "総生成時間",
    "ファイル", "YouTube", "再生数", "いいね", "コメント", "Drive",
    "Gemini tokens", "Gemini ¥", "KieAI cr",
    "シーン数", "画像数", "台本(s)", "画像(s)", "音声(s)",
];

/// Everything a tracking row records about one produced video.
#[derive(Debug, Clone, Default)]
pub struct VideoRecord {
    pub theme: String,
    pub video_path: String,
    pub video_duration: f64,
    pub generation_time: f64,
    pub youtube_url: Option<String>,
    pub gemini_tokens: u64,
    pub gemini_cost_jpy: f64,
    pub kieai_credits: u32,
    pub scene_count: usize,
    pub image_count: usize,
    pub script_secs: f64,
    pub image_secs: f64,
    pub voice_secs: f64,
}

fn format_min_sec(seconds: f64) -> String {
    let s = seconds.max(0.0) as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

/// Video ID out of a stored YouTube URL, both `watch?v=` and `youtu.be/`
/// forms.
pub fn extract_video_id(url: &str) -> Option<String> {
    if !url.contains("youtube.com") && !url.contains("youtu.be") {
        return None;
    }
    if let Some(pos) = url.find("v=") {
        let id: String = url[pos + 2..]
            .chars()
            .take_while(|c| *c != '&' && *c != '#')
            .collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    if let Some(pos) = url.find("youtu.be/") {
        let id: String = url[pos + 9..]
            .chars()
            .take_while(|c| *c != '?' && *c != '&')
            .collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    None
}

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

pub struct VideoTracker<'a> {
    cfg: &'a Config,
    client: reqwest::Client,
}

#[derive(Debug, Default)]
pub struct PerformanceReport {
    pub total_videos: usize,
    pub total_duration_seconds: u64,
    pub total_views: u64,
    pub videos_with_stats: usize,
    pub avg_views_per_video: f64,
}

impl<'a> VideoTracker<'a> {
    pub fn new(cfg: &'a Config, client: reqwest::Client) -> Self {
        Self { cfg, client }
    }

    async fn sheets(&self) -> Result<SheetsClient> {
        if self.cfg.sheets_id.is_empty() {
            anyhow::bail!("config.json: google_sheets_id missing");
        }
        let auth = Arc::new(
            GoogleAuth::load(Path::new(&self.cfg.google_token_file), self.client.clone()).await?,
        );
        Ok(SheetsClient::new(auth, &self.cfg.sheets_id, self.client.clone()))
    }

    /// Append one tracking row; the Drive upload is best-effort and its
    /// link lands in the same row.
    pub async fn record_video(&self, record: &VideoRecord, upload_to_drive: bool) -> Result<()> {
        let sheets = self.sheets().await?;
        sheets.ensure_sheet(SHEET_NAME, SHEET_HEADERS).await?;

        let mut drive_url = String::new();
        if upload_to_drive && !self.cfg.drive_folder_id.is_empty() {
            let auth = Arc::new(
                GoogleAuth::load(Path::new(&self.cfg.google_token_file), self.client.clone())
                    .await?,
            );
            let drive = DriveClient::new(auth, &self.cfg.drive_folder_id, self.client.clone());
            match drive.upload_file(Path::new(&record.video_path)).await {
                Ok(file) => {
                    info!("Drive upload done: {}", file.url);
                    drive_url = file.url;
                }
                Err(err) => warn!("Drive upload failed: {}", err),
            }
        }

        let non_zero = |v: f64| if v > 0.0 { format!("{:.0}", v) } else { String::new() };
        let row = vec![
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            record.theme.clone(),
            format_min_sec(record.video_duration),
            format_min_sec(record.generation_time),
            record.video_path.clone(),
            record.youtube_url.clone().unwrap_or_default(),
            String::new(), // views, backfilled later
            String::new(), // likes
            String::new(), // comments
            drive_url,
            if record.gemini_tokens > 0 {
                record.gemini_tokens.to_string()
            } else {
                String::new()
            },
            if record.gemini_cost_jpy > 0.0 {
                format!("{:.2}", record.gemini_cost_jpy)
            } else {
                String::new()
            },
            if record.kieai_credits > 0 {
                record.kieai_credits.to_string()
            } else {
                String::new()
            },
            if record.scene_count > 0 {
                record.scene_count.to_string()
            } else {
                String::new()
            },
            if record.image_count > 0 {
                record.image_count.to_string()
            } else {
                String::new()
            },
            non_zero(record.script_secs),
            non_zero(record.image_secs),
            non_zero(record.voice_secs),
        ];

        sheets.append_row(SHEET_NAME, &row).await?;
        info!("Tracking row recorded");
        Ok(())
    }

    /// Re-query statistics for every row carrying a YouTube URL and batch
    /// the updates back into the stats columns only.
    pub async fn update_video_stats(&self) -> Result<usize> {
        if self.cfg.youtube_key.is_empty() {
            warn!("youtube_api_key not set; cannot update stats");
            return Ok(0);
        }

        let sheets = self.sheets().await?;
        let youtube = YouTubeDataClient::new(&self.cfg.youtube_key, self.client.clone());

        let rows = sheets.get_values(&format!("{}!A:R", SHEET_NAME)).await?;
        if rows.len() <= 1 {
            info!("No videos to update");
            return Ok(0);
        }

        let mut updates = Vec::new();
        let mut updated = 0usize;

        for (row_idx, row) in rows.iter().enumerate().skip(1) {
            let sheet_row = row_idx + 1;
            let Some(url) = row.get(YOUTUBE_URL_COLUMN) else {
                continue;
            };
            let Some(video_id) = extract_video_id(url) else {
                continue;
            };

            match youtube.videos_by_ids(&[video_id.clone()]).await {
                Ok(videos) if !videos.is_empty() => {
                    let video = &videos[0];
                    updates.push((
                        format!("{}!{}{}", SHEET_NAME, column_letter(VIEWS_COLUMN), sheet_row),
                        video.view_count.to_string(),
                    ));
                    updates.push((
                        format!("{}!{}{}", SHEET_NAME, column_letter(LIKES_COLUMN), sheet_row),
                        video.like_count.to_string(),
                    ));
                    updates.push((
                        format!("{}!{}{}", SHEET_NAME, column_letter(COMMENTS_COLUMN), sheet_row),
                        video.comment_count.to_string(),
                    ));
                    updated += 1;
                    info!(
                        "  {}... views: {}",
                        video.title.chars().take(30).collect::<String>(),
                        video.view_count
                    );
                }
                Ok(_) => {}
                Err(err) => warn!("stats fetch failed for {}: {}", video_id, err),
            }
        }

        sheets.batch_update(&updates).await?;
        info!("Stats updated: {} videos", updated);
        Ok(updated)
    }

    pub async fn performance_report(&self) -> Result<PerformanceReport> {
        let sheets = self.sheets().await?;
        let rows = sheets.get_values(&format!("{}!A:R", SHEET_NAME)).await?;
        if rows.len() <= 1 {
            return Ok(PerformanceReport::default());
        }

        let mut report = PerformanceReport {
            total_videos: rows.len() - 1,
            ..Default::default()
        };

        for row in rows.iter().skip(1) {
            if let Some(duration) = row.get(2) {
                let mut parts = duration.split(':');
                if let (Some(m), Some(s)) = (parts.next(), parts.next()) {
                    if let (Ok(m), Ok(s)) = (m.parse::<u64>(), s.parse::<u64>()) {
                        report.total_duration_seconds += m * 60 + s;
                    }
                }
            }
            if let Some(views) = row.get(VIEWS_COLUMN).and_then(|v| v.parse::<u64>().ok()) {
                report.total_views += views;
                report.videos_with_stats += 1;
            }
        }

        if report.videos_with_stats > 0 {
            report.avg_views_per_video =
                report.total_views as f64 / report.videos_with_stats as f64;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=abc123XYZ&t=10"),
            Some("abc123XYZ".to_string())
        );
    }

    #[test]
    fn video_id_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/qwe789?si=share"),
            Some("qwe789".to_string())
        );
    }

    #[test]
    fn non_youtube_urls_yield_none() {
        assert_eq!(extract_video_id("https://example.com/watch?v=x"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn duration_formats_as_min_sec() {
        assert_eq!(format_min_sec(754.0), "12:34");
        assert_eq!(format_min_sec(59.9), "0:59");
        assert_eq!(format_min_sec(-3.0), "0:00");
    }

    #[test]
    fn stats_columns_map_to_letters() {
        assert_eq!(column_letter(VIEWS_COLUMN), 'G');
        assert_eq!(column_letter(LIKES_COLUMN), 'H');
        assert_eq!(column_letter(COMMENTS_COLUMN), 'I');
    }
}
