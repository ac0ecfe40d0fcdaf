//! Voice synthesis over the whole script, and the subtitle timeline that
//! falls out of the measured clip durations. Timing is measured, never
//! estimated: every clip is written to disk first, then its real duration
//! extends the running timeline.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::api::{gemini, voicevox::VoicevoxClient};
use crate::audio;
use crate::config::Config;
use crate::reading;
use crate::report::{BatchReport, ItemError, ItemOutcome};
use crate::script::Turn;
use crate::speaker::{profile_for, TARGET_DBFS};
use crate::subtitles::{SubtitleTimeline, TimelineBuilder, INTER_TURN_GAP, TITLE_CARD_SECS};

pub type VoiceMap = BTreeMap<usize, PathBuf>;

pub fn voice_output_path(voices_dir: &Path, index: usize, role: &str) -> PathBuf {
    voices_dir.join(format!("{:03}_{}.wav", index, role))
}

/// One batched reading-correction request for every text that still needs
/// synthesis. Numbered list in, numbered list out; any parse trouble falls
/// back to the dictionary-only conversion.
async fn batch_fix_readings(
    client: &reqwest::Client,
    cfg: &Config,
    texts: &[String],
) -> Vec<String> {
    if texts.is_empty() {
        return Vec::new();
    }

    let numbered = texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("[{}] {}", i, t))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        r#"以下のテキストを音声合成ソフト（VOICEVOX）で正しく読めるように修正してください。

修正ルール：
1. 英語の単語・ブランド名は必ずカタカナに変換（例: UberEats→ウーバーイーツ, Netflix→ネットフリックス, iPhone→アイフォン）
2. 英語の略語はカタカナで読みを書く（例: NISA→ニーサ, ETF→イーティーエフ, SNS→エスエヌエス）
3. 誤読されそうな漢字はひらがなに変換（例: 借金→しゃっきん, 何人→なんにん）
4. 大きな数字は読み仮名に変換（例: 5000万→ごせんまん, 3億→さんおく）
5. 正しく読める部分はそのまま残す（過剰にひらがな化しない）
6. 意味・語順を変えない。句読点や記号はそのまま
7. 各行の番号[N]は維持

入力：
{numbered}

出力形式：番号付きで修正後テキストのみを出力。説明不要。"#
    );

    match gemini::generate_text(client, &cfg.gemini_key, &prompt, 0.2, 8_000).await {
        Ok(reply) => parse_numbered_list(&reply.text, texts),
        Err(err) => {
            warn!("AI reading fix failed, using dictionary output: {}", err);
            texts.to_vec()
        }
    }
}

/// Parse `[N] text` lines back into positional order; positions the model
/// skipped keep their original text.
fn parse_numbered_list(response: &str, originals: &[String]) -> Vec<String> {
    let mut fixed: Vec<String> = originals.to_vec();
    for line in response.lines() {
        let line = line.trim();
        if !line.starts_with('[') {
            continue;
        }
        let Some(close) = line.find(']') else {
            continue;
        };
        let Ok(idx) = line[1..close].parse::<usize>() else {
            continue;
        };
        if idx < fixed.len() {
            let content = line[close + 1..].trim();
            if !content.is_empty() {
                fixed[idx] = content.to_string();
            }
        }
    }
    fixed
}

pub struct VoiceGenOutput {
    pub voice_map: VoiceMap,
    pub timeline: SubtitleTimeline,
    pub report: BatchReport,
}

/// Generate one WAV per speakable turn and write `voice_map.json` plus
/// `subtitles.json` under `voices_dir`.
pub async fn generate_voices(
    cfg: &Config,
    client: &reqwest::Client,
    turns: &[Turn],
    voices_dir: &Path,
    use_ai_fix: bool,
) -> Result<VoiceGenOutput> {
    let tts = VoicevoxClient::new(&cfg.voicevox_url, client.clone());
    if !tts.check_connection().await {
        anyhow::bail!(
            "VOICEVOX engine is not reachable at {}; start it and retry",
            cfg.voicevox_url
        );
    }

    info!("Script: {} turns", turns.len());

    // Pre-pass: convert and AI-correct every text that needs synthesis.
    let mut ai_fixed: BTreeMap<usize, String> = BTreeMap::new();
    if use_ai_fix {
        let mut texts = Vec::new();
        let mut indices = Vec::new();
        for (i, turn) in turns.iter().enumerate() {
            if turn.is_title_card() || turn.text.is_empty() {
                continue;
            }
            if voice_output_path(voices_dir, i, &turn.role).exists() {
                continue;
            }
            let converted = reading::convert_for_voice(&turn.text);
            if !converted.is_empty() {
                texts.push(converted);
                indices.push(i);
            }
        }
        if !texts.is_empty() {
            info!("AI reading check over {} texts...", texts.len());
            let fixed = batch_fix_readings(client, cfg, &texts).await;
            for (pos, idx) in indices.iter().enumerate() {
                if fixed[pos] != texts[pos] {
                    info!(
                        "[{:03}] AI fix: {}... -> {}...",
                        idx,
                        texts[pos].chars().take(20).collect::<String>(),
                        fixed[pos].chars().take(20).collect::<String>()
                    );
                }
                ai_fixed.insert(*idx, fixed[pos].clone());
            }
        }
    }

    let mut voice_map = VoiceMap::new();
    let mut timeline = TimelineBuilder::new();
    let mut report = BatchReport::new();

    for (i, turn) in turns.iter().enumerate() {
        // Title cards hold the screen without audio.
        if turn.is_title_card() {
            info!("[{:03}] skip (title card)", i);
            timeline.push(i, &turn.role, &turn.name, &turn.text, TITLE_CARD_SECS + INTER_TURN_GAP);
            continue;
        }

        if turn.text.is_empty() {
            info!("[{:03}] skip (no text)", i);
            continue;
        }

        let voice_path = voice_output_path(voices_dir, i, &turn.role);

        if voice_path.exists() {
            let duration = audio::wav_duration_seconds(&voice_path)?;
            info!("[{:03}] skip (exists): {} ({:.2}s)", i, voice_path.display(), duration);
            voice_map.insert(i, voice_path);
            timeline.push(i, &turn.role, &turn.name, &turn.text, duration + INTER_TURN_GAP);
            report.record(i, ItemOutcome::Skipped);
            continue;
        }

        let voice_text = match ai_fixed.get(&i) {
            Some(fixed) => fixed.clone(),
            None => reading::convert_for_voice(&turn.text),
        };

        if voice_text.is_empty() {
            info!("[{:03}] skip (empty after conversion)", i);
            timeline.push(i, &turn.role, &turn.name, &turn.text, TITLE_CARD_SECS + INTER_TURN_GAP);
            continue;
        }

        info!("[{:03}] synthesizing: {}...", i, voice_text.chars().take(30).collect::<String>());

        let profile = profile_for(&turn.role);
        let result: Result<f64> = async {
            tts.synthesize(&voice_text, profile.speaker_id, &voice_path).await?;
            if (profile.speed - 1.0).abs() > f64::EPSILON {
                audio::adjust_speed(&voice_path, profile.speed)?;
                info!("  speed x{}", profile.speed);
            }
            audio::normalize_volume(&voice_path, TARGET_DBFS + profile.volume_boost)?;
            audio::wav_duration_seconds(&voice_path)
        }
        .await;

        match result {
            Ok(duration) => {
                info!("  saved: {} ({:.2}s)", voice_path.display(), duration);
                voice_map.insert(i, voice_path);
                timeline.push(i, &turn.role, &turn.name, &turn.text, duration + INTER_TURN_GAP);
                report.record(i, ItemOutcome::Done);
            }
            Err(err) => {
                error!("  synthesis failed: {}", err);
                report.record(i, ItemOutcome::Failed(ItemError::Generation(err.to_string())));
            }
        }
    }

    let timeline = timeline.finish();
    info!("Voices ready: {} clips", voice_map.len());
    info!("Total duration: {:.2}s", timeline.total_duration);
    report.log_summary("voice generation");

    let map_path = voices_dir.join("voice_map.json");
    let serializable: BTreeMap<String, String> = voice_map
        .iter()
        .map(|(k, v)| (k.to_string(), v.display().to_string()))
        .collect();
    tokio::fs::write(&map_path, serde_json::to_string_pretty(&serializable)?).await?;

    let subtitles_path = voices_dir.join("subtitles.json");
    timeline.save(&subtitles_path).await?;
    info!("Subtitle timeline saved: {}", subtitles_path.display());

    Ok(VoiceGenOutput {
        voice_map,
        timeline,
        report,
    })
}

/// Read a previously written voice map.
pub async fn load_voice_map(voices_dir: &Path) -> VoiceMap {
    let map_path = voices_dir.join("voice_map.json");
    let Ok(content) = tokio::fs::read_to_string(&map_path).await else {
        return VoiceMap::new();
    };
    let Ok(raw) = serde_json::from_str::<BTreeMap<String, String>>(&content) else {
        return VoiceMap::new();
    };
    raw.into_iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, PathBuf::from(v))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_list_parses_in_positional_order() {
        let originals = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let response = "[0] エー\nコメント行\n[2] シー";
        let fixed = parse_numbered_list(response, &originals);
        assert_eq!(fixed, vec!["エー", "b", "シー"]);
    }

    #[test]
    fn malformed_lines_keep_originals() {
        let originals = vec!["x".to_string()];
        assert_eq!(parse_numbered_list("garbage", &originals), vec!["x"]);
        assert_eq!(parse_numbered_list("[9] out of range", &originals), vec!["x"]);
        assert_eq!(parse_numbered_list("[0]", &originals), vec!["x"]);
    }

    #[test]
    fn voice_path_is_indexed_and_role_tagged() {
        let path = voice_output_path(Path::new("generated/voices"), 12, "res_B");
        assert_eq!(path, PathBuf::from("generated/voices/012_res_B.wav"));
    }
}
