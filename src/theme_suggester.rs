//! Theme suggestion: competitor search, trending queries and own-channel
//! history feed one Gemini request, and candidates too close to anything
//! published in the last 30 days are filtered out.

use anyhow::Result;
use chrono::{Duration, NaiveDateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::gemini;
use crate::api::google_auth::GoogleAuth;
use crate::api::sheets::SheetsClient;
use crate::api::youtube::YouTubeDataClient;
use crate::config::Config;
use crate::video_tracker::{SHEET_NAME, THEME_COLUMN, TIMESTAMP_COLUMN, VIEWS_COLUMN};

/// Competitor channels to mine for headline patterns.
const COMPETITOR_CHANNELS: &[&str] = &[];

const SEARCH_VARIATIONS: &[&str] = &[
    "貯金", "投資", "FIRE", "年収", "副業", "借金", "資産形成", "節約", "老後", "住宅ローン",
];

const DUPLICATE_THRESHOLD: f64 = 0.5;
const RECENT_WINDOW_DAYS: i64 = 30;

fn bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Character-bigram overlap coefficient: 1.0 for identical strings, 0.0
/// for strings sharing no adjacent pair.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    if ba.is_empty() || bb.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let shared = ba.intersection(&bb).count();
    shared as f64 / ba.len().min(bb.len()) as f64
}

pub fn is_near_duplicate(candidate: &str, recent: &[String]) -> bool {
    recent
        .iter()
        .any(|r| bigram_similarity(candidate, r) >= DUPLICATE_THRESHOLD)
}

pub struct ThemeSuggester<'a> {
    cfg: &'a Config,
    client: reqwest::Client,
}

impl<'a> ThemeSuggester<'a> {
    pub fn new(cfg: &'a Config, client: reqwest::Client) -> Self {
        Self { cfg, client }
    }

    /// Themes recorded to the tracking sheet within the trailing window,
    /// newest first, plus the best performers for the "own channel" signal.
    async fn sheet_history(&self) -> (Vec<String>, Vec<(String, u64)>) {
        if self.cfg.sheets_id.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let auth = match GoogleAuth::load(
            std::path::Path::new(&self.cfg.google_token_file),
            self.client.clone(),
        )
        .await
        {
            Ok(auth) => Arc::new(auth),
            Err(err) => {
                warn!("sheet history unavailable: {}", err);
                return (Vec::new(), Vec::new());
            }
        };
        let sheets = SheetsClient::new(auth, &self.cfg.sheets_id, self.client.clone());

        let rows = match sheets.get_values(&format!("{}!A:R", SHEET_NAME)).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("sheet read failed: {}", err);
                return (Vec::new(), Vec::new());
            }
        };

        let cutoff = Utc::now().naive_utc() - Duration::days(RECENT_WINDOW_DAYS);
        let mut recent = Vec::new();
        let mut performers = Vec::new();

        for row in rows.iter().skip(1) {
            let theme = row.get(THEME_COLUMN).cloned().unwrap_or_default();
            if theme.is_empty() {
                continue;
            }
            if let Some(ts) = row.get(TIMESTAMP_COLUMN) {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
                    if parsed >= cutoff {
                        recent.push(theme.clone());
                    }
                }
            }
            if let Some(views) = row.get(VIEWS_COLUMN).and_then(|v| v.parse::<u64>().ok()) {
                performers.push((theme, views));
            }
        }

        performers.sort_by(|a, b| b.1.cmp(&a.1));
        performers.truncate(5);
        (recent, performers)
    }

    pub async fn suggest_themes(&self, count: usize) -> Result<Vec<String>> {
        let mut context_parts = Vec::new();

        if !self.cfg.youtube_key.is_empty() {
            let youtube = YouTubeDataClient::new(&self.cfg.youtube_key, self.client.clone());

            if !COMPETITOR_CHANNELS.is_empty() {
                let channels: Vec<String> =
                    COMPETITOR_CHANNELS.iter().map(|s| s.to_string()).collect();
                match youtube.analyze_competitors(&channels).await {
                    Ok(report) => {
                        let titles: Vec<String> = report
                            .top_videos
                            .iter()
                            .take(10)
                            .map(|v| v.title.clone())
                            .collect();
                        if !titles.is_empty() {
                            context_parts
                                .push(format!("【競合の人気動画タイトル】\n{}", titles.join("\n")));
                        }
                        let tags: Vec<String> = report
                            .common_tags
                            .iter()
                            .take(10)
                            .map(|(t, _)| t.clone())
                            .collect();
                        if !tags.is_empty() {
                            context_parts.push(format!("【よく使われるタグ】\n{}", tags.join(", ")));
                        }
                    }
                    Err(err) => warn!("competitor analysis skipped: {}", err),
                }
            }

            let mut trend_lines = Vec::new();
            for variation in SEARCH_VARIATIONS.iter().take(5) {
                let query = format!("2ch まとめ {}", variation);
                match youtube.search(&query, 3).await {
                    Ok(hits) if !hits.is_empty() => {
                        trend_lines.push(format!("- {}: {}", variation, hits[0].title));
                    }
                    Ok(_) => {}
                    Err(err) => warn!("trending search '{}' skipped: {}", query, err),
                }
            }
            if !trend_lines.is_empty() {
                context_parts.push(format!("【トレンド検索結果】\n{}", trend_lines.join("\n")));
            }
        }

        let (recent, performers) = self.sheet_history().await;
        if !performers.is_empty() {
            let lines: Vec<String> = performers
                .iter()
                .map(|(theme, views)| format!("- {} ({}回再生)", theme, views))
                .collect();
            context_parts.push(format!("【自チャンネルの人気動画】\n{}", lines.join("\n")));
        }
        if !recent.is_empty() {
            context_parts.push(format!(
                "【最近30日に投稿済みのテーマ（これらと似たテーマは禁止）】\n{}",
                recent.join("\n")
            ));
        }

        let context = if context_parts.is_empty() {
            "データなし".to_string()
        } else {
            context_parts.join("\n\n")
        };

        let prompt = format!(
            r#"あなたは2ch/5chまとめ系YouTubeチャンネルの企画担当です。
以下のデータを参考に、「お金・資産形成」に関する動画テーマを{count}個提案してください。

{context}

# 条件
- 視聴者が思わずクリックしたくなるようなテーマ
- 2chスレ風のタイトル（「〜した結果www」「〜なんだが」等）
- 極端で感情を揺さぶる内容（大成功/大失敗、金持ち/貧乏）
- 30代〜40代のサラリーマンが共感できるテーマ
- 投稿済みテーマと似た内容は出さないこと

# 出力形式
テーマを1行1個で出力してください。番号や記号は不要です。"#
        );

        info!("Requesting themes from Gemini...");
        let reply =
            gemini::generate_text(&self.client, &self.cfg.gemini_key, &prompt, 0.9, 1000).await?;

        let themes: Vec<String> = reply
            .text
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '・', '*']).trim().to_string())
            .filter(|l| !l.is_empty())
            .filter(|l| {
                let keep = !is_near_duplicate(l, &recent);
                if !keep {
                    info!("dropping near-duplicate theme: {}", l);
                }
                keep
            })
            .take(count)
            .collect();

        info!("Themes suggested: {}", themes.len());
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_themes_are_fully_similar() {
        assert!((bigram_similarity("貯金1000万の話", "貯金1000万の話") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn near_identical_themes_are_flagged() {
        let recent = vec!["30代で貯金1000万貯めた話".to_string()];
        assert!(is_near_duplicate("30代で貯金1000万を貯めた話www", &recent));
    }

    #[test]
    fn unrelated_themes_pass() {
        let recent = vec!["30代で貯金1000万貯めた話".to_string()];
        assert!(!is_near_duplicate("株で全財産溶かした俺の末路", &recent));
    }

    #[test]
    fn empty_strings_do_not_panic() {
        assert_eq!(bigram_similarity("", ""), 1.0);
        assert_eq!(bigram_similarity("あ", "い"), 0.0);
    }
}
