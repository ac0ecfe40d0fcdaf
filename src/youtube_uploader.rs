//! YouTube publishing: metadata derived from the theme, JST slot
//! scheduling, and the resumable upload driver in `api::youtube`.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::api::google_auth::GoogleAuth;
use crate::api::youtube::{UploadResult, YouTubeUploadClient};
use crate::config::{Config, PUBLISH_HOURS_JST, YOUTUBE_CATEGORY_ID, YOUTUBE_DEFAULT_TAGS};

fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("JST offset")
}

pub fn generate_video_title(theme: &str) -> String {
    let title = format!("【2ch】{}【ゆっくり】", theme);
    if title.chars().count() > 100 {
        let head: String = title.chars().take(97).collect();
        format!("{}...", head)
    } else {
        title
    }
}

pub fn generate_video_description(theme: &str) -> String {
    [
        &format!("▼ テーマ: {}", theme),
        "",
        "2ch/5chの名スレをまとめた動画です。",
        "面白いと思ったらチャンネル登録・高評価お願いします！",
        "",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "#2ch #2chまとめ #5ch #ゆっくり #名スレ",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "※この動画は2ch/5chのスレッドを元に再構成したものです。",
        "※登場人物は架空であり、実在の人物・団体とは関係ありません。",
    ]
    .join("\n")
}

pub fn generate_tags(theme: &str) -> Vec<String> {
    let mut tags: Vec<String> = YOUTUBE_DEFAULT_TAGS.iter().map(|t| t.to_string()).collect();
    if !theme.is_empty() {
        tags.push(theme.to_string());
    }
    tags
}

/// Next valid publish slot: the earliest allowed JST hour at least 15
/// minutes away, rolling into the next day when today's slots are spent.
pub fn next_publish_time(
    now_jst: DateTime<FixedOffset>,
    allowed_hours: &[u32],
    preferred_hour: Option<u32>,
) -> DateTime<Utc> {
    let hours: Vec<u32> = match preferred_hour {
        Some(h) if allowed_hours.contains(&h) => vec![h],
        _ => {
            let mut hs = allowed_hours.to_vec();
            hs.sort_unstable();
            hs
        }
    };

    let cutoff = now_jst + Duration::minutes(15);
    for day_offset in 0..=1 {
        let date = now_jst.date_naive() + Duration::days(day_offset);
        for &hour in &hours {
            if let Some(slot) = date
                .and_hms_opt(hour, 0, 0)
                .and_then(|naive| jst().from_local_datetime(&naive).single())
            {
                if slot > cutoff {
                    return slot.with_timezone(&Utc);
                }
            }
        }
    }

    // Unreachable with a non-empty hour set, but stay total.
    (now_jst + Duration::days(1)).with_timezone(&Utc)
}

/// Upload the finished video, scheduled or immediate.
pub async fn upload_to_youtube(
    cfg: &Config,
    client: &reqwest::Client,
    video_path: &Path,
    theme: &str,
    scheduled: bool,
    publish_hour: Option<u32>,
    thumbnail_path: Option<&Path>,
) -> Result<UploadResult> {
    let title = generate_video_title(theme);
    let description = generate_video_description(theme);
    let tags = generate_tags(theme);

    info!("Title: {}", title);
    info!("Tags: {}...", tags.iter().take(5).cloned().collect::<Vec<_>>().join(", "));

    let publish_at = if scheduled {
        let now_jst = Utc::now().with_timezone(&jst());
        let at = next_publish_time(now_jst, PUBLISH_HOURS_JST, publish_hour);
        info!(
            "Scheduled publish: {} JST",
            at.with_timezone(&jst()).format("%Y/%m/%d %H:%M")
        );
        Some(at)
    } else {
        None
    };

    let auth = Arc::new(
        GoogleAuth::load(Path::new(&cfg.google_token_file), client.clone()).await?,
    );
    let uploader = YouTubeUploadClient::new(auth, client.clone());

    let result = uploader
        .upload_video(
            video_path,
            &title,
            &description,
            &tags,
            YOUTUBE_CATEGORY_ID,
            publish_at,
            thumbnail_path,
        )
        .await?;

    info!("YouTube URL: {}", result.url);
    info!("Status: {}", result.status);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst_time(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        jst()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn morning_run_schedules_same_day_evening() {
        let now = jst_time(2026, 8, 7, 10, 0);
        let at = next_publish_time(now, &[6, 18], None).with_timezone(&jst());
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2026-08-07 18:00");
    }

    #[test]
    fn late_night_rolls_to_next_morning() {
        let now = jst_time(2026, 8, 7, 21, 0);
        let at = next_publish_time(now, &[6, 18], None).with_timezone(&jst());
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2026-08-08 06:00");
    }

    #[test]
    fn slots_within_fifteen_minutes_are_skipped() {
        let now = jst_time(2026, 8, 7, 17, 50);
        let at = next_publish_time(now, &[6, 18], None).with_timezone(&jst());
        // 18:00 is only 10 minutes out, so the next 6:00 wins.
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2026-08-08 06:00");
    }

    #[test]
    fn preferred_hour_is_honored() {
        let now = jst_time(2026, 8, 7, 3, 0);
        let at = next_publish_time(now, &[6, 18], Some(18)).with_timezone(&jst());
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2026-08-07 18:00");
    }

    #[test]
    fn title_is_wrapped_and_capped() {
        let title = generate_video_title("貯金の話");
        assert_eq!(title, "【2ch】貯金の話【ゆっくり】");

        let long_theme = "あ".repeat(120);
        let long_title = generate_video_title(&long_theme);
        assert_eq!(long_title.chars().count(), 100);
        assert!(long_title.ends_with("..."));
    }

    #[test]
    fn tags_include_defaults_and_theme() {
        let tags = generate_tags("株で大損した話");
        assert!(tags.contains(&"2ch".to_string()));
        assert_eq!(tags.last().unwrap(), "株で大損した話");
    }
}
