//! Thumbnail generation: an AI illustration pass over a deterministic
//! style guide, falling back to a fully drawn composition when the image
//! API is absent or fails.

use anyhow::{Context, Result};
use image::{imageops, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::{gemini, kieai::KieAiClient};
use crate::config::Config;
use crate::init::{CHARACTER_IMAGES_DIR, THUMBNAIL_DIR};
use crate::layout;
use crate::render;
use crate::script::Turn;

pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

const TITLE_FONT_SIZE: f32 = 86.0;
const TITLE_OUTLINE_WIDTH: i32 = 6;
const TITLE_MAX_CHARS_PER_LINE: usize = 12;
const BUBBLE_COUNT: usize = 5;

const GRADIENT_PATTERNS: &[((u8, u8, u8), (u8, u8, u8))] = &[
    ((255, 50, 50), (180, 0, 0)),
    ((50, 120, 255), (0, 50, 180)),
    ((255, 180, 0), (220, 120, 0)),
    ((0, 180, 100), (0, 120, 60)),
    ((180, 50, 255), (100, 0, 180)),
    ((255, 80, 120), (200, 30, 80)),
];

const THEME_PROMPT_MAP: &[(&str, &str)] = &[
    ("貯金", "piggy bank overflowing with gold coins, yen money, saving concept"),
    ("投資", "stock market chart going up, businessman celebrating, gold coins"),
    ("資産", "pile of gold coins and money bags, wealth concept, treasure"),
    ("節約", "wallet with yen bills, frugal lifestyle, money saving tips"),
    ("給料", "salary envelope with yen, office worker, payday concept"),
    ("借金", "empty wallet, debt concept, worried person with bills"),
    ("副業", "laptop with money, side business, working from home concept"),
    ("株", "stock market candlestick chart, bull market, investment success"),
    ("不動産", "house with yen sign, real estate investment, property"),
    ("FIRE", "person relaxing on beach, financial freedom, retirement celebration"),
    ("老後", "elderly couple smiling, retirement savings, pension concept"),
    ("結婚", "wedding couple, money planning, family finance"),
    ("転職", "businessman with briefcase, career change, new job"),
    ("年収", "salary chart going up, income growth, money stacks"),
    ("NISA", "investment growth chart, NISA logo concept, coins growing"),
    ("配当", "dividend income, money tree, passive income concept"),
    ("1000万", "million yen pile, wealth milestone, golden coins stacked high"),
    ("100万", "yen bills stack, savings goal achieved, celebration"),
];

const DEFAULT_SUBJECT: &str =
    "Japanese yen money coins and bills, finance concept, colorful illustration";

// Words that make a dialogue line thumbnail-worthy.
const MONEY_KEYWORDS: &[&str] = &[
    "万", "円", "年収", "貯金", "投資", "ローン", "金利", "副業", "節約", "%", "割",
];

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"【[^】]*】").unwrap());

/// Split a theme into a short punchy title and a hook line without the
/// model: strip decorations, cut at the first strong separator.
pub fn split_theme_heuristic(theme: &str) -> (String, String) {
    let cleaned = BRACKET_RE.replace_all(theme, "").trim().to_string();
    let chars: Vec<char> = cleaned.chars().collect();

    for (i, ch) in chars.iter().enumerate() {
        if "、。…ｗw？！".contains(*ch) && i >= 6 {
            let title: String = chars[..i].iter().collect();
            let hook: String = chars[i + 1..].iter().collect::<String>().trim().to_string();
            if !hook.is_empty() {
                return (title, hook);
            }
        }
    }

    if chars.len() > 16 {
        let title: String = chars[..14].iter().collect();
        let hook: String = chars[14..].iter().collect();
        return (title, hook);
    }
    (cleaned, String::new())
}

/// Title/hook pair, with a Gemini shortening pass when available.
async fn split_theme(client: &reqwest::Client, cfg: &Config, theme: &str) -> (String, String) {
    let prompt = format!(
        "次の動画テーマを、サムネイル用の「タイトル（14文字以内のインパクト重視）」と「フック（続きが気になる一言、20文字以内）」に分割してください。\n\
         テーマ: {theme}\n\n出力形式（この2行のみ）:\nタイトル: ...\nフック: ..."
    );

    match gemini::generate_text(client, &cfg.gemini_key, &prompt, 0.7, 500).await {
        Ok(reply) => {
            let mut title = None;
            let mut hook = None;
            for line in reply.text.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("タイトル:") {
                    title = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("フック:") {
                    hook = Some(rest.trim().to_string());
                }
            }
            match (title, hook) {
                (Some(t), Some(h)) if !t.is_empty() => (t, h),
                _ => split_theme_heuristic(theme),
            }
        }
        Err(err) => {
            warn!("theme split via LLM failed, heuristic fallback: {}", err);
            split_theme_heuristic(theme)
        }
    }
}

fn bubble_score(text: &str) -> usize {
    let digit_count = text.chars().filter(|c| c.is_ascii_digit()).count();
    let keyword_count = MONEY_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count();
    digit_count * 2 + keyword_count * 3
}

/// Pick the most numeric/financial dialogue lines as thumbnail bubbles, in
/// script order.
pub fn select_bubble_texts(turns: &[Turn], count: usize) -> Vec<String> {
    let mut scored: Vec<(usize, usize, String)> = turns
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_special())
        .filter(|(_, t)| {
            let len = t.text.chars().count();
            (6..=30).contains(&len)
        })
        .map(|(i, t)| (bubble_score(&t.text), i, t.text.clone()))
        .filter(|(score, _, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(count);
    scored.sort_by_key(|(_, i, _)| *i);
    scored.into_iter().map(|(_, _, text)| text).collect()
}

/// Mask the digits of every other bubble with 〇 to bait curiosity.
pub fn mask_bubble_texts(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            if i % 2 == 1 {
                text.chars()
                    .map(|c| if c.is_ascii_digit() { '〇' } else { c })
                    .collect()
            } else {
                text.clone()
            }
        })
        .collect()
}

fn character_appearance(theme: &str) -> &'static str {
    if theme.contains("借金") || theme.contains("失敗") || theme.contains("悲報") {
        "a worried young Japanese man in a hoodie, anxious expression"
    } else if theme.contains("主婦") || theme.contains("嫁") {
        "a cheerful Japanese housewife holding a wallet"
    } else if theme.contains("FIRE") || theme.contains("老後") {
        "a relaxed middle-aged Japanese man smiling with arms crossed"
    } else {
        "a confident young Japanese salaryman pointing forward, excited expression"
    }
}

fn build_thumbnail_prompt(title: &str, hook: &str, bubbles: &[String], theme: &str) -> String {
    let subject = THEME_PROMPT_MAP
        .iter()
        .find(|(kw, _)| theme.contains(kw))
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_SUBJECT);

    let bubble_lines = bubbles
        .iter()
        .map(|b| format!("「{}」", b))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "YouTube thumbnail illustration, 16:9. Main subject: {subject}. \
         Character: {appearance}. \
         Large bold Japanese headline text: 「{title}」 in yellow with thick black outline at the top. \
         Secondary hook text: 「{hook}」 in white at the bottom. \
         Small speech-bubble captions: {bubble_lines}. \
         {style}, bright colorful background, high contrast, eye-catching design, \
         clean composition, professional thumbnail style",
        appearance = character_appearance(theme),
        style = crate::config::IRASUTOYA_STYLE_PREFIX,
    )
}

fn draw_fallback(
    title: &str,
    hook: &str,
    bubbles: &[String],
    out_path: &Path,
) -> Result<()> {
    let fs = render::font();
    let mut rng = rand::rngs::StdRng::seed_from_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    );

    let (top, bottom) = GRADIENT_PATTERNS[rng.gen_range(0..GRADIENT_PATTERNS.len())];
    let mut canvas = render::vertical_gradient(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, top, bottom);

    // Character artwork on the right, when any exists.
    if let Some(entry) = std::fs::read_dir(CHARACTER_IMAGES_DIR)
        .ok()
        .and_then(|mut entries| entries.next())
        .and_then(|e| e.ok())
    {
        if let Ok(img) = image::open(entry.path()) {
            let char_img = render::resize_to_height(&img.to_rgba8(), THUMBNAIL_HEIGHT * 3 / 5);
            let x = THUMBNAIL_WIDTH as i64 - char_img.width() as i64 - 40;
            let y = THUMBNAIL_HEIGHT as i64 - char_img.height() as i64 - 20;
            imageops::overlay(&mut canvas, &char_img, x, y);
        }
    }

    // Darken for text contrast.
    for pixel in canvas.pixels_mut() {
        pixel.0[0] = (pixel.0[0] as f32 * 0.72) as u8;
        pixel.0[1] = (pixel.0[1] as f32 * 0.72) as u8;
        pixel.0[2] = (pixel.0[2] as f32 * 0.72) as u8;
    }

    // Title lines, first in yellow, rest white.
    let lines = layout::smart_text_wrap(title, TITLE_MAX_CHARS_PER_LINE);
    let line_height = fs.line_height(TITLE_FONT_SIZE);
    let mut y = (THUMBNAIL_HEIGHT as f32 * 0.08) as i32;
    for (i, line) in lines.iter().take(3).enumerate() {
        let line_w = fs.text_width(line, TITLE_FONT_SIZE);
        let x = ((THUMBNAIL_WIDTH.saturating_sub(line_w)) / 2) as i32;
        let fill = if i == 0 { (255, 215, 0) } else { (255, 255, 255) };
        fs.draw_text_outlined(
            &mut canvas,
            x,
            y,
            line,
            TITLE_FONT_SIZE,
            fill,
            (0, 0, 0),
            TITLE_OUTLINE_WIDTH,
        );
        y += (line_height + 16) as i32;
    }

    // Bubble captions down the left edge.
    let bubble_font = 34.0;
    let mut by = y + 24;
    for bubble in bubbles.iter().take(BUBBLE_COUNT) {
        let text_w = fs.text_width(bubble, bubble_font);
        let mut banner = RgbaImage::new(text_w + 36, fs.line_height(bubble_font) + 20);
        render::draw_rounded_rect(&mut banner, (255, 255, 255, 235), Some(((30, 30, 30), 3)));
        fs.draw_text(&mut banner, 18, 10, bubble, bubble_font, (30, 30, 30));
        imageops::overlay(&mut canvas, &banner, 36, by as i64);
        by += banner.height() as i32 + 14;
    }

    // Hook banner along the bottom.
    if !hook.is_empty() {
        let hook_font = 44.0;
        let text_w = fs.text_width(hook, hook_font);
        let banner_h = fs.line_height(hook_font) + 24;
        let mut banner = RgbaImage::from_pixel(
            THUMBNAIL_WIDTH,
            banner_h,
            Rgba([20, 20, 20, 220]),
        );
        let x = ((THUMBNAIL_WIDTH.saturating_sub(text_w)) / 2) as i32;
        fs.draw_text(&mut banner, x, 12, hook, hook_font, (255, 215, 0));
        imageops::overlay(
            &mut canvas,
            &banner,
            0,
            (THUMBNAIL_HEIGHT - banner_h) as i64,
        );
    }

    let rgb = image::DynamicImage::ImageRgba8(canvas).to_rgb8();
    rgb.save(out_path)
        .with_context(|| format!("write thumbnail: {}", out_path.display()))?;
    Ok(())
}

pub struct ThumbnailResult {
    pub path: PathBuf,
    pub kieai_credits: u32,
}

/// Produce `generated/thumbnail/thumbnail.jpg` for a theme.
pub async fn generate_thumbnail(
    cfg: &Config,
    client: &reqwest::Client,
    theme: &str,
    turns: &[Turn],
) -> Result<ThumbnailResult> {
    let out_path = Path::new(THUMBNAIL_DIR).join("thumbnail.jpg");
    tokio::fs::create_dir_all(THUMBNAIL_DIR).await.ok();

    let (title, hook) = split_theme(client, cfg, theme).await;
    let bubbles = mask_bubble_texts(&select_bubble_texts(turns, BUBBLE_COUNT));
    info!("Thumbnail title: {} / hook: {}", title, hook);
    info!("Thumbnail bubbles: {:?}", bubbles);

    let mut credits = 0;

    if !cfg.kieai_key.is_empty() {
        let kieai = KieAiClient::new(&cfg.kieai_key, &cfg.kieai_base, client.clone());
        let prompt = build_thumbnail_prompt(&title, &hook, &bubbles, theme);
        let ai_tmp = Path::new(THUMBNAIL_DIR).join("illustration_tmp.png");

        match kieai
            .generate_pro_and_download(&prompt, &ai_tmp, "16:9", "2K")
            .await
        {
            Ok(()) => {
                credits = 16;
                let result = (|| -> Result<()> {
                    let img = image::open(&ai_tmp).context("open AI thumbnail")?;
                    let resized = imageops::resize(
                        &img.to_rgb8(),
                        THUMBNAIL_WIDTH,
                        THUMBNAIL_HEIGHT,
                        imageops::FilterType::Lanczos3,
                    );
                    resized.save(&out_path)?;
                    Ok(())
                })();
                let _ = tokio::fs::remove_file(&ai_tmp).await;
                match result {
                    Ok(()) => {
                        info!("Thumbnail ready (AI): {}", out_path.display());
                        return Ok(ThumbnailResult {
                            path: out_path,
                            kieai_credits: credits,
                        });
                    }
                    Err(err) => warn!("AI thumbnail unreadable, drawing fallback: {}", err),
                }
            }
            Err(err) => warn!("AI thumbnail generation failed, drawing fallback: {}", err),
        }
    } else {
        info!("KieAI key not set; drawing thumbnail locally");
    }

    draw_fallback(&title, &hook, &bubbles, &out_path)?;
    info!("Thumbnail ready (drawn): {}", out_path.display());
    Ok(ThumbnailResult {
        path: out_path,
        kieai_credits: credits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, text: &str) -> Turn {
        Turn {
            role: role.into(),
            name: String::new(),
            text: text.into(),
            image_prompt: None,
        }
    }

    #[test]
    fn heuristic_split_cuts_at_separator() {
        let (title, hook) = split_theme_heuristic("【悲報】年収700万の俺、住宅ローンで詰んだｗこれマジ？");
        assert!(!title.is_empty());
        assert!(!hook.is_empty());
        assert!(!title.contains("【悲報】"));
    }

    #[test]
    fn heuristic_split_short_theme_has_no_hook() {
        let (title, hook) = split_theme_heuristic("貯金の話");
        assert_eq!(title, "貯金の話");
        assert!(hook.is_empty());
    }

    #[test]
    fn bubbles_prefer_numeric_financial_lines() {
        let turns = vec![
            turn("icchi", "頭金500万貯めたで"),
            turn("res_A", "まじか"),
            turn("res_B", "固定資産税は年30万やぞ"),
            turn("narrator", "ここで場面が変わります"),
            turn("res_C", "ふーん"),
        ];
        let bubbles = select_bubble_texts(&turns, 3);
        assert_eq!(bubbles.len(), 2);
        assert!(bubbles[0].contains("500万"));
        assert!(bubbles[1].contains("30万"));
    }

    #[test]
    fn masking_replaces_digits_on_alternate_lines() {
        let texts = vec!["頭金500万".to_string(), "返済月16万".to_string()];
        let masked = mask_bubble_texts(&texts);
        assert_eq!(masked[0], "頭金500万");
        assert_eq!(masked[1], "返済月〇〇万");
    }

    #[test]
    fn prompt_embeds_theme_subject_and_texts() {
        let prompt = build_thumbnail_prompt("貯金1000万", "方法教えるわ", &["月5万積立".to_string()], "30代で貯金1000万貯めた話");
        assert!(prompt.contains("piggy bank"));
        assert!(prompt.contains("貯金1000万"));
        assert!(prompt.contains("月5万積立"));
        assert!(prompt.contains("Irasutoya"));
    }
}
