use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::google_auth::GoogleAuth;

const DATA_BASE: &str = "https://www.googleapis.com/youtube/v3";
const RESUMABLE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const THUMBNAIL_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/thumbnails/set?uploadType=media";

// 8 MiB, a multiple of the 256 KiB granularity the resumable protocol wants.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;
const UPLOAD_MAX_RETRIES: u32 = 5;
const UPLOAD_BACKOFF_SECS: u64 = 3;

#[derive(Debug, Clone, Default)]
pub struct VideoStats {
    pub id: String,
    pub title: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompetitorReport {
    pub top_videos: Vec<VideoStats>,
    pub common_tags: Vec<(String, usize)>,
}

/// API-key-only YouTube Data client for search and statistics reads.
pub struct YouTubeDataClient {
    api_key: String,
    client: Client,
}

impl YouTubeDataClient {
    pub fn new(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            client,
        }
    }

    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let max_results = max_results.to_string();
        let resp = self
            .client
            .get(format!("{}/search", DATA_BASE))
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("order", "viewCount"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("youtube search failed")?
            .error_for_status()?;

        let root: serde_json::Value = resp.json().await?;
        let hits = root
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let video_id = item.get("id")?.get("videoId")?.as_str()?.to_string();
                        let snippet = item.get("snippet")?;
                        Some(SearchHit {
                            video_id,
                            title: snippet.get("title")?.as_str()?.to_string(),
                            channel_id: snippet
                                .get("channelId")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    pub async fn videos_by_ids(&self, ids: &[String]) -> Result<Vec<VideoStats>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let resp = self
            .client
            .get(format!("{}/videos", DATA_BASE))
            .query(&[
                ("part", "snippet,statistics"),
                ("id", joined.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("youtube videos.list failed")?
            .error_for_status()?;

        let root: serde_json::Value = resp.json().await?;
        let videos = root
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let stats = item.get("statistics")?;
                        let snippet = item.get("snippet")?;
                        let count = |key: &str| {
                            stats
                                .get(key)
                                .and_then(|v| v.as_str())
                                .and_then(|s| s.parse::<u64>().ok())
                                .unwrap_or(0)
                        };
                        Some(VideoStats {
                            id: item.get("id")?.as_str()?.to_string(),
                            title: snippet
                                .get("title")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            view_count: count("viewCount"),
                            like_count: count("likeCount"),
                            comment_count: count("commentCount"),
                            tags: snippet
                                .get("tags")
                                .and_then(|v| v.as_array())
                                .map(|tags| {
                                    tags.iter()
                                        .filter_map(|t| t.as_str().map(|s| s.to_string()))
                                        .collect()
                                })
                                .unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(videos)
    }

    /// Top uploads of each competitor channel, merged and tag-counted.
    pub async fn analyze_competitors(&self, channel_ids: &[String]) -> Result<CompetitorReport> {
        let mut all_videos = Vec::new();

        for channel_id in channel_ids {
            let result = async {
                let resp = self
                    .client
                    .get(format!("{}/search", DATA_BASE))
                    .query(&[
                        ("part", "snippet"),
                        ("channelId", channel_id.as_str()),
                        ("type", "video"),
                        ("order", "viewCount"),
                        ("maxResults", "10"),
                        ("key", self.api_key.as_str()),
                    ])
                    .send()
                    .await?
                    .error_for_status()?;
                let root: serde_json::Value = resp.json().await?;
                let ids: Vec<String> = root
                    .get("items")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|i| {
                                i.get("id")?.get("videoId")?.as_str().map(|s| s.to_string())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.videos_by_ids(&ids).await
            }
            .await;

            match result {
                Ok(videos) => all_videos.extend(videos),
                Err(err) => warn!("competitor channel {} skipped: {}", channel_id, err),
            }
        }

        all_videos.sort_by(|a, b| b.view_count.cmp(&a.view_count));

        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        for video in &all_videos {
            for tag in &video.tags {
                *tag_counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut common_tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
        common_tags.sort_by(|a, b| b.1.cmp(&a.1));
        common_tags.truncate(15);

        Ok(CompetitorReport {
            top_videos: all_videos,
            common_tags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub video_id: String,
    pub url: String,
    pub status: String,
}

/// OAuth-backed upload client implementing the resumable protocol: one
/// session-start request, then sequential `Content-Range` chunk PUTs with
/// bounded fixed-backoff retries.
pub struct YouTubeUploadClient {
    auth: Arc<GoogleAuth>,
    client: Client,
}

impl YouTubeUploadClient {
    pub fn new(auth: Arc<GoogleAuth>, client: Client) -> Self {
        Self { auth, client }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upload_video(
        &self,
        video_path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
        category_id: &str,
        publish_at: Option<DateTime<Utc>>,
        thumbnail_path: Option<&Path>,
    ) -> Result<UploadResult> {
        let bytes = tokio::fs::read(video_path)
            .await
            .with_context(|| format!("read video: {}", video_path.display()))?;
        let total = bytes.len();
        info!("Upload start: '{}' ({} bytes)", title, total);

        let status = match publish_at {
            Some(at) => json!({
                "privacyStatus": "private",
                "publishAt": at.to_rfc3339_opts(SecondsFormat::Secs, true),
                "selfDeclaredMadeForKids": false,
            }),
            None => json!({
                "privacyStatus": "public",
                "selfDeclaredMadeForKids": false,
            }),
        };

        let body = json!({
            "snippet": {
                "title": title,
                "description": description,
                "tags": tags,
                "categoryId": category_id,
            },
            "status": status,
        });

        let token = self.auth.access_token().await?;
        let session = self
            .client
            .post(RESUMABLE_UPLOAD_URL)
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", total.to_string())
            .json(&body)
            .send()
            .await
            .context("resumable session start failed")?
            .error_for_status()?;

        let upload_url = session
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow::anyhow!("no resumable upload location"))?
            .to_string();

        let mut offset = 0usize;
        let mut video_id = None;

        while offset < total {
            let end = (offset + UPLOAD_CHUNK_SIZE).min(total);
            let chunk = bytes[offset..end].to_vec();
            let content_range = format!("bytes {}-{}/{}", offset, end - 1, total);

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let token = self.auth.access_token().await?;
                let resp = self
                    .client
                    .put(&upload_url)
                    .bearer_auth(&token)
                    .header("Content-Range", content_range.clone())
                    .header("Content-Length", chunk.len().to_string())
                    .body(chunk.clone())
                    .timeout(Duration::from_secs(600))
                    .send()
                    .await;

                match resp {
                    Ok(resp) if resp.status().as_u16() == 308 => {
                        break; // chunk accepted, more expected
                    }
                    Ok(resp) if resp.status().is_success() => {
                        let root: serde_json::Value = resp.json().await?;
                        video_id = root
                            .get("id")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string());
                        break;
                    }
                    Ok(resp) => {
                        let status = resp.status();
                        if attempt > UPLOAD_MAX_RETRIES {
                            anyhow::bail!("chunk upload failed: HTTP {}", status.as_u16());
                        }
                        warn!(
                            "chunk upload HTTP {} (attempt {}/{}), retrying...",
                            status.as_u16(),
                            attempt,
                            UPLOAD_MAX_RETRIES
                        );
                    }
                    Err(err) => {
                        if attempt > UPLOAD_MAX_RETRIES {
                            return Err(err).context("chunk upload failed");
                        }
                        warn!(
                            "chunk upload error (attempt {}/{}): {}",
                            attempt, UPLOAD_MAX_RETRIES, err
                        );
                    }
                }
                tokio::time::sleep(Duration::from_secs(UPLOAD_BACKOFF_SECS)).await;
            }

            offset = end;
            info!("Uploaded {}/{} bytes", offset, total);
        }

        let video_id = video_id.ok_or_else(|| anyhow::anyhow!("upload finished without video id"))?;

        if let Some(thumb) = thumbnail_path {
            if let Err(err) = self.set_thumbnail(&video_id, thumb).await {
                warn!("thumbnail set failed (continuing): {}", err);
            }
        }

        let status = if publish_at.is_some() {
            "scheduled"
        } else {
            "public"
        };
        Ok(UploadResult {
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            video_id,
            status: status.to_string(),
        })
    }

    async fn set_thumbnail(&self, video_id: &str, thumbnail_path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(thumbnail_path).await?;
        let token = self.auth.access_token().await?;
        self.client
            .post(format!("{}&videoId={}", THUMBNAIL_UPLOAD_URL, video_id))
            .bearer_auth(&token)
            .header("Content-Type", "image/jpeg")
            .body(bytes)
            .send()
            .await
            .context("thumbnail upload failed")?
            .error_for_status()?;
        Ok(())
    }
}
