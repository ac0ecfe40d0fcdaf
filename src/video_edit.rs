//! Video assembly: pre-rendered subtitle bitmaps, stack grouping, phase
//! dispatch (intro / mid-story narrator / ending / main), and per-frame
//! composition piped straight into the encoder.

use anyhow::{Context, Result};
use image::{imageops, Rgba, RgbaImage};
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::audio;
use crate::config::{
    BACKGROUND_OVERLAY_ALPHA, BGM_VOLUME, CHARACTER_BOTTOM_MARGIN, CHARACTER_HEIGHT_RATIO,
    CHARACTER_RIGHT_MARGIN, ICON_BOTTOM_MARGIN, ICON_LEFT_MARGIN, ICON_SIZE, INTRO_DURATION,
    INTRO_THEME_FONT_SIZE, MAX_VISIBLE_SUBTITLES, SHOW_SPEAKER_NAME, SUBTITLE_FONT_SIZE,
    SUBTITLE_LEFT_MARGIN, SUBTITLE_MAX_CHARS_PER_LINE, SUBTITLE_STACK_MARGIN,
    SUBTITLE_TOP_MARGIN, VIDEO_FPS, VIDEO_HEIGHT, VIDEO_WIDTH,
};
use crate::ffmpeg::{self, BackgroundStream, FrameEncoder};
use crate::init::{
    ASSET_IMAGES_DIR, BACKGROUND_IMAGES_DIR, BGM_DIR, CHARACTER_IMAGES_DIR, ICON_DIR,
    IMAGES_DIR, INTRO_IMAGES_DIR, VIDEOS_DIR, VOICES_DIR,
};
use crate::layout::{self, StackItem};
use crate::render;
use crate::script::{theme_from_script, Turn};
use crate::speaker::style_for;
use crate::subtitles::{SubtitleEntry, SubtitleTimeline, TimelineBuilder};
use crate::voice_gen::VoiceMap;

const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi", "webm"];
const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp"];

fn now_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn collect_files(dirs: &[&str], exts: &[&str]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for dir in dirs {
        for entry in WalkDir::new(dir).into_iter().flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if exts.iter().any(|e| ext.eq_ignore_ascii_case(e)) {
                    out.push(path.to_path_buf());
                }
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

fn load_rgba(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgba8()),
        Err(err) => {
            warn!("image load failed ({}): {}", path.display(), err);
            None
        }
    }
}

struct PreparedSubtitle {
    image: RgbaImage,
    role: String,
    text: String,
    start_time: f64,
    duration: f64,
}

impl PreparedSubtitle {
    fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

struct CharacterSprite {
    image: RgbaImage,
    position: (i64, i64),
}

struct StackGroupView {
    members: Vec<usize>,
    start_time: f64,
    end_time: f64,
    character: Option<CharacterSprite>,
}

struct BackgroundScene {
    start: f64,
    end: f64,
    video: PathBuf,
}

/// When voice generation never ran, every turn gets a flat 3-second slot so
/// the assembler can still produce something watchable.
pub fn fallback_timeline(turns: &[Turn]) -> SubtitleTimeline {
    let mut builder = TimelineBuilder::new();
    for (i, turn) in turns.iter().enumerate() {
        builder.push(i, &turn.role, &turn.name, &turn.text, 3.0);
    }
    builder.finish()
}

fn blend_white_overlay(frame: &mut RgbaImage, alpha: f64) {
    let keep = 1.0 - alpha;
    let add = 255.0 * alpha;
    for pixel in frame.pixels_mut() {
        pixel.0[0] = (pixel.0[0] as f64 * keep + add) as u8;
        pixel.0[1] = (pixel.0[1] as f64 * keep + add) as u8;
        pixel.0[2] = (pixel.0[2] as f64 * keep + add) as u8;
    }
}

fn rgba_to_rgb_bytes(frame: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::with_capacity((frame.width() * frame.height() * 3) as usize);
    for pixel in frame.pixels() {
        out.extend_from_slice(&pixel.0[..3]);
    }
    out
}

fn frame_from_rgb_bytes(raw: &[u8], width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for (i, pixel) in img.pixels_mut().enumerate() {
        let base = i * 3;
        *pixel = Rgba([raw[base], raw[base + 1], raw[base + 2], 255]);
    }
    img
}

fn bob_offset(t: f64) -> i64 {
    ((t * 2.0 * std::f64::consts::PI / 3.0).sin() * 8.0) as i64
}

struct RenderContext {
    width: u32,
    height: u32,
    specials: Vec<PreparedSubtitle>,
    stack: Vec<PreparedSubtitle>,
    groups: Vec<StackGroupView>,
    intro_end: f64,
    ending_index: Option<usize>,
    mid_indices: Vec<usize>,
    theme_badge: Option<RgbaImage>,
    intro_theme: Option<(RgbaImage, i64, i64)>,
    intro_images: Vec<(RgbaImage, i64, i64)>,
    icon: Option<RgbaImage>,
    ending_icon: Option<RgbaImage>,
    static_background: RgbaImage,
    default_character: Option<CharacterSprite>,
}

impl RenderContext {
    fn compose(&self, t: f64, background: Option<&RgbaImage>) -> RgbaImage {
        let fs = render::font();
        let mut frame = match background {
            Some(bg) => {
                let mut f = bg.clone();
                blend_white_overlay(&mut f, BACKGROUND_OVERLAY_ALPHA);
                f
            }
            None => self.static_background.clone(),
        };

        // Ending phase: oversized bobbing icon plus the narrator bubble.
        if let Some(idx) = self.ending_index {
            let ending = &self.specials[idx];
            if ending.start_time <= t && t < ending.end_time() {
                if let Some(ending_icon) = &self.ending_icon {
                    let target_h = (self.height as f64 * 0.75) as u32;
                    let large = render::resize_to_height(ending_icon, target_h);
                    let x = (self.width as i64 - large.width() as i64) / 2;
                    let y = (self.height as f64 * 0.15) as i64 + bob_offset(t);
                    imageops::overlay(&mut frame, &large, x, y);
                }
                if let Some(icon) = &self.icon {
                    let bubble =
                        render::icon_bubble(fs, &ending.text, Some(icon), ICON_SIZE, SUBTITLE_FONT_SIZE);
                    let y = self.height as i64 - bubble.height() as i64 - ICON_BOTTOM_MARGIN as i64;
                    imageops::overlay(&mut frame, &bubble, ICON_LEFT_MARGIN as i64, y);
                }
                return frame;
            }
        }

        // Intro phase: big theme banner, artwork row, narrator bubble.
        if t < self.intro_end {
            if let Some((img, x, y)) = &self.intro_theme {
                imageops::overlay(&mut frame, img, *x, *y);
            }
            for (img, x, y) in &self.intro_images {
                imageops::overlay(&mut frame, img, *x, *y);
            }
            for sub in &self.specials {
                if sub.role != "title_card" && sub.start_time <= t && t < sub.end_time() {
                    if !sub.text.is_empty() {
                        if let Some(icon) = &self.icon {
                            let bubble = render::icon_bubble(
                                fs,
                                &sub.text,
                                Some(icon),
                                ICON_SIZE,
                                SUBTITLE_FONT_SIZE,
                            );
                            let y = self.height as i64
                                - bubble.height() as i64
                                - ICON_BOTTOM_MARGIN as i64;
                            imageops::overlay(&mut frame, &bubble, ICON_LEFT_MARGIN as i64, y);
                        }
                    }
                    break;
                }
            }
            return frame;
        }

        // Mid-story narrator override.
        for &idx in &self.mid_indices {
            let sub = &self.specials[idx];
            if sub.start_time <= t && t < sub.end_time() {
                if let Some(badge) = &self.theme_badge {
                    let x = self.width as i64 - badge.width() as i64 - 15;
                    imageops::overlay(&mut frame, badge, x, 12);
                }
                if let Some(icon) = &self.icon {
                    let bubble =
                        render::icon_bubble(fs, &sub.text, Some(icon), ICON_SIZE, SUBTITLE_FONT_SIZE);
                    let y = self.height as i64 - bubble.height() as i64 - ICON_BOTTOM_MARGIN as i64;
                    imageops::overlay(&mut frame, &bubble, ICON_LEFT_MARGIN as i64, y);
                }
                return frame;
            }
        }

        // Main phase.
        let current_group = self
            .groups
            .iter()
            .find(|g| g.start_time <= t && t < g.end_time);

        let character = current_group
            .and_then(|g| g.character.as_ref())
            .or(self.default_character.as_ref());
        if let Some(sprite) = character {
            let (x, y) = sprite.position;
            imageops::overlay(&mut frame, &sprite.image, x, y + bob_offset(t));
        }

        if let Some(badge) = &self.theme_badge {
            let x = self.width as i64 - badge.width() as i64 - 15;
            imageops::overlay(&mut frame, badge, x, 12);
        }

        if let Some(group) = current_group {
            let mut current_y = SUBTITLE_TOP_MARGIN as i64;
            let max_y = self.height as i64 - 30;
            for &member in &group.members {
                let sub = &self.stack[member];
                if sub.start_time > t {
                    continue;
                }
                if current_y + sub.image.height() as i64 > max_y {
                    break;
                }
                imageops::overlay(&mut frame, &sub.image, SUBTITLE_LEFT_MARGIN as i64, current_y);
                current_y += sub.image.height() as i64 + SUBTITLE_STACK_MARGIN as i64;
            }
        }

        frame
    }
}

fn build_context(timeline: &SubtitleTimeline, theme: &str) -> RenderContext {
    let fs = render::font();
    let (width, height) = (VIDEO_WIDTH, VIDEO_HEIGHT);
    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());

    let mut specials = Vec::new();
    let mut stack = Vec::new();
    for entry in &timeline.subtitles {
        let style = style_for(&entry.role);
        let image = if entry.role == "narrator" || entry.role == "title_card" {
            render::subtitle_image(fs, &entry.text, &style, SUBTITLE_MAX_CHARS_PER_LINE, SUBTITLE_FONT_SIZE)
        } else {
            render::subtitle_with_label(
                fs,
                &entry.text,
                &style,
                &entry.name,
                SHOW_SPEAKER_NAME,
                SUBTITLE_MAX_CHARS_PER_LINE,
                SUBTITLE_FONT_SIZE,
            )
        };
        let prepared = PreparedSubtitle {
            image,
            role: entry.role.clone(),
            text: entry.text.clone(),
            start_time: entry.start_time,
            duration: entry.duration,
        };
        if entry.role == "narrator" || entry.role == "title_card" {
            specials.push(prepared);
        } else {
            stack.push(prepared);
        }
    }

    // Intro runs until the thread itself starts talking.
    let intro_end = timeline
        .subtitles
        .iter()
        .find(|e| e.role != "narrator" && e.role != "title_card")
        .map(|e| e.start_time)
        .unwrap_or(INTRO_DURATION);
    info!("Intro section: 0 - {:.2}s", intro_end);

    let ending_index = specials
        .len()
        .checked_sub(1)
        .filter(|&i| specials[i].role == "narrator");
    if let Some(idx) = ending_index {
        info!("Ending narrator from {:.2}s", specials[idx].start_time);
    }

    let mid_indices: Vec<usize> = specials
        .iter()
        .enumerate()
        .filter(|(i, s)| {
            s.role == "narrator" && s.start_time >= intro_end && Some(*i) != ending_index
        })
        .map(|(i, _)| i)
        .collect();
    if !mid_indices.is_empty() {
        info!("Mid-story narrators: {}", mid_indices.len());
    }

    // Character sprites, grouped to the subtitle stacks they accompany.
    let char_height = (height as f64 * CHARACTER_HEIGHT_RATIO) as u32;
    let character_files = collect_files(&[CHARACTER_IMAGES_DIR], IMAGE_EXTS);
    let mut characters: Vec<(RgbaImage, Vec<String>)> = Vec::new();
    for path in &character_files {
        if let Some(img) = load_rgba(path) {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            characters.push((
                render::resize_to_height(&img, char_height),
                layout::tags_from_stem(stem),
            ));
        }
    }
    info!("Character images: {}", characters.len());

    let default_character = characters.first().map(|(img, _)| CharacterSprite {
        position: (
            width as i64 - img.width() as i64 - CHARACTER_RIGHT_MARGIN as i64,
            height as i64 - img.height() as i64 - CHARACTER_BOTTOM_MARGIN as i64,
        ),
        image: img.clone(),
    });

    let items: Vec<StackItem> = stack
        .iter()
        .map(|s| StackItem {
            height: s.image.height(),
            start_time: s.start_time,
            duration: s.duration,
        })
        .collect();
    let budget = height - SUBTITLE_TOP_MARGIN - 30;
    let raw_groups = layout::group_stacks(&items, budget, SUBTITLE_STACK_MARGIN, MAX_VISIBLE_SUBTITLES);

    let tag_sets: Vec<Vec<String>> = characters.iter().map(|(_, tags)| tags.clone()).collect();
    let mut used_chars: HashSet<usize> = HashSet::new();
    let mut groups = Vec::new();
    for raw in raw_groups {
        let keywords =
            layout::extract_keywords(raw.members.iter().map(|&m| stack[m].text.as_str()));
        let character = layout::select_character(&tag_sets, &keywords, &used_chars).map(|idx| {
            used_chars.insert(idx);
            let (img, _) = &characters[idx];
            let x = width as i64 - img.width() as i64 - CHARACTER_RIGHT_MARGIN as i64;
            let y_slots = [
                (height as f64 * 0.18) as i64,
                (height as f64 * 0.30) as i64,
                (height as f64 * 0.42) as i64,
                (height as f64 * 0.55) as i64,
                height as i64 - img.height() as i64 - CHARACTER_BOTTOM_MARGIN as i64,
            ];
            let mut y = y_slots[rng.gen_range(0..y_slots.len())];
            y = y.min(height as i64 - img.height() as i64 - 10).max(10);
            CharacterSprite {
                image: img.clone(),
                position: (x, y),
            }
        });
        if used_chars.len() >= characters.len() {
            used_chars.clear();
        }
        groups.push(StackGroupView {
            members: raw.members,
            start_time: raw.start_time,
            end_time: raw.end_time,
            character,
        });
    }
    info!("Subtitle groups: {}", groups.len());

    // Theme banners.
    let theme_badge = (!theme.is_empty()).then(|| render::theme_badge(fs, theme, width));
    let intro_theme = (!theme.is_empty()).then(|| {
        let img = render::intro_theme_image(fs, theme, INTRO_THEME_FONT_SIZE);
        let x = (width as i64 - img.width() as i64) / 2;
        let y = ((height as f64 * 0.05) as i64).max(20);
        (img, x, y)
    });

    // Channel icon and the ending pose set.
    let mut icon = None;
    for ext in IMAGE_EXTS {
        let path = Path::new(ICON_DIR).join(format!("icon.{}", ext));
        if path.exists() {
            icon = load_rgba(&path);
            break;
        }
    }
    let ending_pool: Vec<PathBuf> = collect_files(&[ICON_DIR], IMAGE_EXTS)
        .into_iter()
        .filter(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| !s.eq_ignore_ascii_case("icon"))
                .unwrap_or(true)
        })
        .collect();
    let ending_icon = (!ending_pool.is_empty())
        .then(|| load_rgba(&ending_pool[rng.gen_range(0..ending_pool.len())]))
        .flatten();

    // Intro artwork row, centered below the theme banner. Dedicated intro
    // images win; otherwise the generated scene images stand in.
    let mut intro_files: Vec<PathBuf> = collect_files(&[INTRO_IMAGES_DIR], IMAGE_EXTS)
        .into_iter()
        .filter(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with("intro_") || s.starts_with("nb_"))
                .unwrap_or(false)
        })
        .collect();
    if intro_files.is_empty() {
        intro_files = collect_files(&[IMAGES_DIR], &["png"]);
    }
    let mut intro_loaded = Vec::new();
    for path in intro_files.iter().take(3) {
        if let Some(img) = load_rgba(path) {
            intro_loaded.push(render::resize_to_height(&img, (512.0 * 0.6) as u32));
        }
    }
    let mut intro_images = Vec::new();
    if !intro_loaded.is_empty() {
        let spacing = 30i64;
        let total_w: i64 = intro_loaded.iter().map(|i| i.width() as i64).sum::<i64>()
            + spacing * (intro_loaded.len() as i64 - 1);
        let mut x = (width as i64 - total_w) / 2;
        let y = (height as f64 * 0.45) as i64;
        for img in intro_loaded {
            let w = img.width() as i64;
            intro_images.push((img, x, y));
            x += w + spacing;
        }
        info!("Intro images: {}", intro_images.len());
    }

    // Static fallback background.
    let static_background = {
        let path = Path::new(ASSET_IMAGES_DIR).join("background.png");
        match load_rgba(&path) {
            Some(img) => imageops::resize(&img, width, height, imageops::FilterType::Lanczos3),
            None => {
                warn!("No background image found; using dark gray fill");
                RgbaImage::from_pixel(width, height, Rgba([40, 45, 55, 255]))
            }
        }
    };

    RenderContext {
        width,
        height,
        specials,
        stack,
        groups,
        intro_end,
        ending_index,
        mid_indices,
        theme_badge,
        intro_theme,
        intro_images,
        icon,
        ending_icon,
        static_background,
        default_character,
    }
}

fn build_background_scenes(ctx: &RenderContext, total_duration: f64) -> Vec<BackgroundScene> {
    let mut videos = collect_files(&[BACKGROUND_IMAGES_DIR, ASSET_IMAGES_DIR], VIDEO_EXTS);
    if videos.is_empty() {
        return Vec::new();
    }
    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    use rand::seq::SliceRandom;
    videos.shuffle(&mut rng);

    let mut scene_times = vec![0.0, ctx.intro_end];
    for &idx in ctx.mid_indices.iter().take(3) {
        scene_times.push(ctx.specials[idx].start_time);
    }
    scene_times.sort_by(|a, b| a.partial_cmp(b).unwrap());
    scene_times.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    scene_times.retain(|&t| t < total_duration);

    let mut scenes = Vec::new();
    for (i, &start) in scene_times.iter().enumerate() {
        let end = scene_times.get(i + 1).copied().unwrap_or(total_duration);
        let video = videos[i % videos.len()].clone();
        info!(
            "Background scene {}: {} ({:.1}s - {:.1}s)",
            i + 1,
            video.display(),
            start,
            end
        );
        scenes.push(BackgroundScene { start, end, video });
    }
    scenes
}

fn render_frames(
    ctx: &RenderContext,
    scenes: &[BackgroundScene],
    total_duration: f64,
    master_wav: &Path,
    out_path: &Path,
) -> Result<()> {
    let total_frames = (total_duration * VIDEO_FPS as f64).ceil() as u64;
    let mut encoder = FrameEncoder::spawn(ctx.width, ctx.height, VIDEO_FPS, master_wav, out_path)?;

    let mut scene_idx = 0usize;
    let mut stream: Option<BackgroundStream> = None;

    for frame_no in 0..total_frames {
        let t = frame_no as f64 / VIDEO_FPS as f64;

        let background = if scenes.is_empty() {
            None
        } else {
            while scene_idx + 1 < scenes.len() && t >= scenes[scene_idx].end {
                scene_idx += 1;
                stream = None;
            }
            if stream.is_none() {
                match BackgroundStream::spawn(
                    &scenes[scene_idx].video,
                    ctx.width,
                    ctx.height,
                    VIDEO_FPS,
                ) {
                    Ok(s) => stream = Some(s),
                    Err(err) => warn!("background decoder failed: {}", err),
                }
            }
            stream
                .as_mut()
                .and_then(|s| s.next_frame())
                .map(|raw| frame_from_rgb_bytes(&raw, ctx.width, ctx.height))
        };

        let frame = ctx.compose(t, background.as_ref());
        encoder.write_frame(&rgba_to_rgb_bytes(&frame))?;

        if frame_no % (VIDEO_FPS as u64 * 30) == 0 {
            info!("Rendered {:.0}s / {:.0}s", t, total_duration);
        }
    }

    encoder.finish()
}

/// Assemble the final video from script, timeline, voices and assets.
pub async fn create_video_from_script(
    script_path: &Path,
    turns: &[Turn],
    timeline: SubtitleTimeline,
    voice_map: VoiceMap,
    output_filename: &str,
    use_bgm: bool,
) -> Result<PathBuf> {
    info!("Script loaded: {}", script_path.display());
    let theme = theme_from_script(turns);

    let total_duration = timeline
        .subtitles
        .iter()
        .map(SubtitleEntry::end_time)
        .fold(5.0f64, f64::max);
    info!("Total duration: {:.2}s", total_duration);

    // Voice clips land at their measured start offsets in one master track.
    let clips: Vec<(PathBuf, f64)> = timeline
        .subtitles
        .iter()
        .filter_map(|e| voice_map.get(&e.index).map(|p| (p.clone(), e.start_time)))
        .collect();
    info!("Voice clips in mix: {}", clips.len());

    let master_wav = Path::new(VOICES_DIR).join("master_mix.wav");
    let tmp_out = Path::new(VIDEOS_DIR).join(format!("{}_tmp.mp4", output_filename));
    let final_out = Path::new(VIDEOS_DIR).join(output_filename);

    {
        let timeline = timeline.clone();
        let theme = theme.clone();
        let master_wav = master_wav.clone();
        let tmp_out = tmp_out.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            audio::mix_voice_tracks(&clips, total_duration, &master_wav)?;
            let ctx = build_context(&timeline, &theme);
            let scenes = build_background_scenes(&ctx, total_duration);
            render_frames(&ctx, &scenes, total_duration, &master_wav, &tmp_out)
        })
        .await
        .context("render task panicked")??;
    }

    // BGM under the narration, when available.
    let mut finished = false;
    if use_bgm {
        let bgm_files = collect_files(&[BGM_DIR], &["mp3", "m4a", "wav"]);
        if bgm_files.is_empty() {
            info!("No BGM files found; output is narration-only.");
        } else {
            let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
            let bgm = &bgm_files[rng.gen_range(0..bgm_files.len())];
            info!("Adding BGM: {}", bgm.display());
            match ffmpeg::mix_bgm(&tmp_out, bgm, BGM_VOLUME, &final_out).await {
                Ok(true) => {
                    let _ = tokio::fs::remove_file(&tmp_out).await;
                    finished = true;
                }
                _ => warn!("BGM mix failed; output narration-only."),
            }
        }
    }
    if !finished {
        tokio::fs::rename(&tmp_out, &final_out)
            .await
            .context("failed to move rendered video")?;
    }

    if let Ok(real) = ffmpeg::ffprobe_duration_seconds(&final_out).await {
        info!(
            "Output duration: {:.2}s (timeline {:.2}s)",
            real, total_duration
        );
    }

    info!("Video ready: {}", final_out.display());
    Ok(final_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Turn;

    fn turn(role: &str, text: &str) -> Turn {
        Turn {
            role: role.into(),
            name: String::new(),
            text: text.into(),
            image_prompt: None,
        }
    }

    #[test]
    fn fallback_timeline_is_three_seconds_per_turn() {
        let turns = vec![turn("narrator", "a"), turn("icchi", "b"), turn("res_A", "c")];
        let timeline = fallback_timeline(&turns);
        assert_eq!(timeline.subtitles.len(), 3);
        assert!((timeline.total_duration - 9.0).abs() < 1e-9);
        assert!((timeline.subtitles[2].start_time - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rgb_byte_roundtrip() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        img.put_pixel(1, 1, Rgba([9, 8, 7, 255]));
        let bytes = rgba_to_rgb_bytes(&img);
        assert_eq!(bytes.len(), 12);
        let back = frame_from_rgb_bytes(&bytes, 2, 2);
        assert_eq!(back.get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(back.get_pixel(1, 1).0, [9, 8, 7, 255]);
    }

    #[test]
    fn white_overlay_brightens() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        blend_white_overlay(&mut img, 0.7);
        let px = img.get_pixel(0, 0).0;
        assert!(px[0] >= 177 && px[0] <= 179);
    }

    #[test]
    fn bob_offset_stays_within_amplitude() {
        for i in 0..100 {
            let t = i as f64 * 0.1;
            assert!(bob_offset(t).abs() <= 8);
        }
    }
}
