//! Two-pass script generation. Long-form threads do not fit one model
//! response reliably, so the script is requested as a front half and a back
//! half, with the front half's tail fed back as continuation context.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use std::path::Path;
use tracing::{error, info, warn};

use crate::api::gemini;
use crate::config::Config;
use crate::script::{save_script, Turn};

const MAX_ATTEMPTS: u32 = 3;
const GEN_TEMPERATURE: f64 = 0.9;
const GEN_MAX_TOKENS: u32 = 16_000;

const REFERENCE_TRANSCRIPTS_PATH: &str = "reference_data/transcripts.jsonl";

const COMMON_RULES: &str = r#"# キャラクター設定（10人のスレ民を満遍なく使うこと）
- "icchi"（イッチ）：スレ主。1回のセリフは長め（40〜100文字）。具体的な数字を多用。
- "res_A"：質問役（「どうやったん？」「具体的に教えて」）+ 有益情報も提供
- "res_B"：共感・応援役（「わかるわ」「ようやっとる」）+ 自分の経験談も語る
- "res_C"：批判・煽り役（「嘘つけ」「金持ち自慢乙」）+ 具体的な反論や別視点を提示
- "res_D"：専門知識役（具体的な数字や制度・知識を提供「○○の場合は〜」「法律的には〜」）
- "res_E"：自分語り（「ワイも同じ経験ある」「ワイの場合は〜」詳しい体験談を語る）
- "res_F"：ツッコミ（「草」「それはないやろ」）+ 他のスレ民に対してもツッコむ
- "res_G"：真面目な議論（「理論的には正しいけど…」具体的な数字で議論）
- "res_H"：初心者目線（「よくわからんのやけど」他のスレ民が教える流れを作る）
- "res_I"：まとめ役（「結局○○が大事ってことやな」話の整理・補足情報追加）
- "res_J"：ユーモア（「ワイには無理で草」）+ たまに有益な雑学も
※同じキャラが3回以上連続で出ないこと。res_A〜res_Jを均等に使うこと。

# 【最重要】スレ民の会話ルール（必ず守ること）
- 【禁止】スレ民がイッチに対して一言だけ反応するパターンの連続は絶対禁止
- 【必須】スレ民同士で会話・議論・情報提供すること（イッチ抜きの連続セリフを必ず入れる）
- 【必須】スレ民が有益な情報を提供すること（具体的な数字、制度の説明、体験談、豆知識）
- スレ民のセリフで「>>〇〇」のようなアンカー記法は使わないこと
- 5〜6セリフに1回は必ずスレ民同士のやり取り（イッチ抜きで2〜4連続セリフ）を入れること

# セリフの長さ目安
- イッチ：40〜100文字 / スレ民（反応）：15〜40文字 / スレ民（情報提供・議論）：40〜80文字 / ナレーター：30〜60文字

# 制約条件
- イッチのセリフには具体的な数字を多く含めること（年収○万、貯金○万、家賃○万、投資額○万等）
- スレ民も具体的な数字を出すこと（「○○の平均は〜」「○%の人が〜」等）
- 時系列で語ること（○歳の時、社会人○年目等）
- 失敗談・挫折のエピソードを必ず含めること
- 口調は2chスラング（「〜やで」「〜ンゴ」「ｗ」「草」「ようやっとる」「マジレス」）を自然に使用
- "image_prompt"は重要なシーン（4〜6個）のみ。シンプルな英語で記述
- JSONのみを出力（マークダウンのコードブロック不要）
- 【禁止】スレ本編の途中で視聴者へのメタ的な呼びかけを入れないこと（エンディングのnarrator以外）

# 出力形式
JSON配列。各要素は以下の形式：
{"role": "icchi", "name": "イッチ", "text": "セリフ", "image_prompt": "(任意)"}
{"role": "res_A", "name": "名無しさん", "text": "セリフ"}
{"role": "narrator", "text": "ナレーション"}
{"role": "title_card", "text": "タイトル", "image_prompt": "..."}
"#;

fn build_part1_prompt(theme: &str, reference_section: &str) -> String {
    format!(
        r#"# 命令
あなたは「2ちゃんねる（5ちゃんねる）」の傑作スレッドを作成する放送作家です。
以下のテーマに基づいて、動画台本の【前半部分】をJSON形式で作成してください。
JSONのみを出力し、他の説明文は不要です。
{reference_section}
# テーマ
{theme}

# 前半の構成（【必ず85〜100個】のセリフを出力すること）

## 第1幕：導入（narrator×4 + title_card = 5個）
- narrator: スレッドの紹介「今回ご紹介するスレッドはこちら。「タイトル」」
- narrator: 内容の説明 / 見どころ紹介 / 本編への導線
- title_card: タイトル表示

## 第2幕：背景・自己紹介（約30セリフ）
- イッチが詳しい自己紹介（年齢、職業、年収、住居など具体的数字）
- スレ民のリアクションとスレ民同士の会話

## 第3幕前半：メインストーリー開始（約55セリフ）
- narrator: 場面転換を1〜2回挟む
- 時系列の具体的エピソード、失敗談、スレ民同士の議論

【重要】この前半パートでは物語を完結させないでください。
ストーリーの途中で終わり、narrator「ここからイッチの状況が大きく変わります」等の場面転換で締めること。

{COMMON_RULES}

# 出力数の確認
【最重要】必ず85〜100個のJSON要素を出力すること。70個以下は絶対に不可。"#
    )
}

fn build_part2_prompt(theme: &str, story_summary: &str, last_entries: &str) -> String {
    format!(
        r#"# 命令
あなたは「2ちゃんねる（5ちゃんねる）」の傑作スレッドを作成する放送作家です。
以下の台本の【後半部分】をJSON形式で作成してください。
JSONのみを出力し、他の説明文は不要です。

# テーマ
{theme}

# ここまでのストーリー概要
{story_summary}

# 直前の5つのセリフ（このすぐ後から続けること）
{last_entries}

# 後半の構成（【必ず85〜100個】のセリフを出力すること）

## 第3幕後半：メインストーリー続き（約45セリフ）
- 転機・大きな変化のエピソード、スレ民同士の議論、意外な展開

## 第4幕：教訓・まとめ（約35セリフ）
- イッチが学んだ教訓（3〜5個）とスレ民の補足・議論

## 第5幕：エンディング（約7セリフ）
- イッチの最後の一言、スレ民の最終反応2〜3個
- narrator: 「今回のスレッドはいかがでしたでしょうか？」
- narrator: テーマに沿ったコメント誘導
- narrator: 「いいねとチャンネル登録もよろしくお願いします。次回もお楽しみに！」

{COMMON_RULES}

# 出力数の確認
【最重要】必ず85〜100個のJSON要素を出力すること。70個以下は絶対に不可。"#
    )
}

static TRAILING_COMMA_ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());
static TRAILING_COMMA_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());

fn strip_markdown_fences(content: &str) -> String {
    let content = content.trim();
    if !content.starts_with("```") {
        return content.to_string();
    }
    let mut inner = content
        .split("```")
        .nth(1)
        .unwrap_or(content)
        .trim()
        .to_string();
    if inner.starts_with("json") {
        inner = inner[4..].trim().to_string();
    }
    inner
}

/// Best-effort repair of a malformed array response: drop trailing commas,
/// then truncate to the last complete object and close the array.
fn repair_json(content: &str) -> String {
    let mut content = TRAILING_COMMA_ARRAY_RE.replace_all(content, "]").into_owned();
    content = TRAILING_COMMA_OBJECT_RE.replace_all(&content, "}").into_owned();

    if content.starts_with('[') && !content.trim_end().ends_with(']') {
        if let Some(last_brace) = content.rfind('}') {
            content = format!("{}\n]", &content[..last_brace + 1]);
        }
    }

    if serde_json::from_str::<serde_json::Value>(&content).is_ok() {
        return content;
    }

    // Still broken: cut back to the last `},` boundary and close there.
    if let Some(last_complete) = content.rfind("},") {
        let candidate = format!("{}\n]", &content[..last_complete + 1]);
        if serde_json::from_str::<serde_json::Value>(&candidate).is_ok() {
            return candidate;
        }
    }

    content
}

fn extract_turns(content: &str) -> Result<Vec<Turn>> {
    let stripped = strip_markdown_fences(content);

    if let Ok(turns) = serde_json::from_str::<Vec<Turn>>(&stripped) {
        return Ok(turns);
    }

    let repaired = repair_json(&stripped);
    serde_json::from_str::<Vec<Turn>>(&repaired).context("script JSON unrecoverable")
}

fn summarize_story(turns: &[Turn]) -> String {
    let mut parts = Vec::new();
    for turn in turns {
        if turn.role == "icchi" {
            parts.push(format!("イッチ: {}", turn.text));
        } else if turn.is_narrator() && !turn.text.is_empty() {
            parts.push(format!("（ナレーション: {}）", turn.text));
        }
    }
    let mut summary = parts.join("\n");
    if summary.chars().count() > 2000 {
        summary = summary.chars().take(2000).collect::<String>() + "...";
    }
    summary
}

/// Gemini 2.0 Flash list price: $0.10/1M input, $0.40/1M output.
fn estimate_cost_jpy(prompt_tokens: u64, completion_tokens: u64) -> f64 {
    const USD_TO_JPY: f64 = 150.0;
    let input_cost = prompt_tokens as f64 * 0.10 / 1_000_000.0;
    let output_cost = completion_tokens as f64 * 0.40 / 1_000_000.0;
    ((input_cost + output_cost) * USD_TO_JPY * 100.0).round() / 100.0
}

fn load_reference_transcripts(max_samples: usize) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(REFERENCE_TRANSCRIPTS_PATH) else {
        info!("No reference transcripts ({})", REFERENCE_TRANSCRIPTS_PATH);
        return Vec::new();
    };

    let mut transcripts = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if let Some(full_text) = value.get("full_text").and_then(|v| v.as_str()) {
            if full_text.chars().count() > 500 {
                transcripts.push(full_text.chars().take(3000).collect::<String>());
            }
        }
    }

    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    transcripts.shuffle(&mut rng);
    transcripts.truncate(max_samples);
    if !transcripts.is_empty() {
        info!("Loaded {} reference transcripts", transcripts.len());
    }
    transcripts
}

fn build_reference_section(reference_texts: &[String]) -> String {
    if reference_texts.is_empty() {
        return String::new();
    }
    let mut sections = Vec::new();
    for (i, text) in reference_texts.iter().enumerate() {
        sections.push(format!("【参考台本{}】\n{}\n", i + 1, text));
    }
    format!(
        "\n# 参考台本（人気チャンネルのスタイルを学習）\n以下は人気2chまとめチャンネルの実際の台本です。\nこのスタイル・構成・口調を参考にしつつ、内容はコピーせずテーマに沿ったオリジナルの台本を作成すること。\n\n{}\n---\n",
        sections.join("\n")
    )
}

#[derive(Debug, Clone)]
pub struct ScriptGenResult {
    pub turns: Vec<Turn>,
    pub gemini_tokens: u64,
    pub cost_jpy: f64,
}

async fn generate_part(
    client: &reqwest::Client,
    cfg: &Config,
    prompt: &str,
    label: &str,
    prompt_tokens: &mut u64,
    completion_tokens: &mut u64,
) -> Result<Vec<Turn>> {
    for attempt in 1..=MAX_ATTEMPTS {
        let reply = gemini::generate_text(
            client,
            &cfg.gemini_key,
            prompt,
            GEN_TEMPERATURE,
            GEN_MAX_TOKENS,
        )
        .await?;
        *prompt_tokens += reply.prompt_tokens;
        *completion_tokens += reply.completion_tokens;

        match extract_turns(&reply.text) {
            Ok(turns) if !turns.is_empty() => {
                info!(
                    "{} done: {} turns ({} tokens)",
                    label,
                    turns.len(),
                    reply.prompt_tokens + reply.completion_tokens
                );
                return Ok(turns);
            }
            Ok(_) => warn!("{} returned an empty array (attempt {}/{})", label, attempt, MAX_ATTEMPTS),
            Err(err) => {
                warn!("{} JSON parse error (attempt {}/{}): {}", label, attempt, MAX_ATTEMPTS, err);
                if attempt == MAX_ATTEMPTS {
                    let snippet = reply.text.chars().take(500).collect::<String>();
                    error!("response head:\n{}", snippet);
                }
            }
        }

        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        }
    }

    anyhow::bail!("{}: script generation failed after {} attempts", label, MAX_ATTEMPTS)
}

/// Generate the full script for a theme and persist it to `output_path`.
pub async fn generate_script(
    client: &reqwest::Client,
    cfg: &Config,
    theme: &str,
    output_path: &Path,
    use_reference: bool,
) -> Result<ScriptGenResult> {
    let mut prompt_tokens = 0u64;
    let mut completion_tokens = 0u64;

    let reference_section = if use_reference {
        build_reference_section(&load_reference_transcripts(2))
    } else {
        String::new()
    };

    info!("Generating script for theme '{}' (part 1/2)...", theme);
    let prompt1 = build_part1_prompt(theme, &reference_section);
    let part1 = generate_part(
        client,
        cfg,
        &prompt1,
        "part 1",
        &mut prompt_tokens,
        &mut completion_tokens,
    )
    .await?;

    info!("Generating script (part 2/2)...");
    let story_summary = summarize_story(&part1);
    let tail_start = part1.len().saturating_sub(5);
    let last_entries = serde_json::to_string_pretty(&part1[tail_start..])?;
    let prompt2 = build_part2_prompt(theme, &story_summary, &last_entries);
    let part2 = generate_part(
        client,
        cfg,
        &prompt2,
        "part 2",
        &mut prompt_tokens,
        &mut completion_tokens,
    )
    .await?;

    let mut turns = part1;
    let part1_len = turns.len();
    turns.extend(part2);

    save_script(output_path, &turns).await?;

    let gemini_tokens = prompt_tokens + completion_tokens;
    let cost_jpy = estimate_cost_jpy(prompt_tokens, completion_tokens);

    info!("Script saved: {}", output_path.display());
    info!(
        "Total turns: {} (front {} + back {})",
        turns.len(),
        part1_len,
        turns.len() - part1_len
    );
    info!("Gemini tokens: {} (≈ ¥{})", gemini_tokens, cost_jpy);

    Ok(ScriptGenResult {
        turns,
        gemini_tokens,
        cost_jpy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"[
        {"role": "narrator", "text": "紹介"},
        {"role": "title_card", "text": "タイトル", "image_prompt": "money"},
        {"role": "icchi", "name": "イッチ", "text": "ワイの話や"}
    ]"#;

    #[test]
    fn well_formed_json_parses_directly() {
        let turns = extract_turns(WELL_FORMED).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, "icchi");
    }

    #[test]
    fn markdown_fences_are_stripped() {
        let fenced = format!("```json\n{}\n```", WELL_FORMED);
        assert_eq!(extract_turns(&fenced).unwrap().len(), 3);
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let broken = r#"[
            {"role": "narrator", "text": "a",},
            {"role": "icchi", "text": "b"},
        ]"#;
        let turns = extract_turns(broken).unwrap();
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn truncation_recovers_a_strict_prefix() {
        // Chop the well-formed response mid-object.
        let full = extract_turns(WELL_FORMED).unwrap();
        let cut = WELL_FORMED.find(r#""name": "イッチ""#).unwrap();
        let truncated = &WELL_FORMED[..cut + 5];

        let repaired = extract_turns(truncated).unwrap();
        assert!(!repaired.is_empty());
        assert!(repaired.len() < full.len());
        for (a, b) in repaired.iter().zip(full.iter()) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(extract_turns("total nonsense").is_err());
    }

    #[test]
    fn story_summary_keeps_icchi_and_narrator() {
        let turns = extract_turns(WELL_FORMED).unwrap();
        let summary = summarize_story(&turns);
        assert!(summary.contains("イッチ: ワイの話や"));
        assert!(summary.contains("ナレーション: 紹介"));
        assert!(!summary.contains("タイトル"));
    }

    #[test]
    fn cost_estimate_uses_flash_pricing() {
        // 1M input + 1M output = $0.50 = ¥75.
        assert!((estimate_cost_jpy(1_000_000, 1_000_000) - 75.0).abs() < 1e-9);
        assert_eq!(estimate_cost_jpy(0, 0), 0.0);
    }
}
