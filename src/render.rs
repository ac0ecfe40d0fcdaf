//! Bitmap rendering for subtitles, banners and bubbles. Everything here
//! produces RGBA buffers that the compositor pastes onto video frames.

use image::{imageops, Pixel, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use rusttype::{point, Font, Scale};
use std::path::{Path, PathBuf};

use crate::init::FONTS_DIR;
use crate::speaker::{Rgb, SpeakerStyle};

#[cfg(target_os = "windows")]
const PLATFORM_FONT_CANDIDATES: &[&str] = &[
    "C:/Windows/Fonts/meiryob.ttc",
    "C:/Windows/Fonts/YuGothB.ttc",
    "C:/Windows/Fonts/msgothic.ttc",
    "C:/Windows/Fonts/meiryo.ttc",
];

#[cfg(target_os = "macos")]
const PLATFORM_FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/ヒラギノ角ゴシック W6.ttc",
    "/System/Library/Fonts/ヒラギノ角ゴシック W4.ttc",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PLATFORM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
];

/// A Japanese-capable font resolved through the platform fallback chain.
/// When no candidate loads, text is simply not drawn (boxes stay blank) —
/// a missing font must never kill a render.
pub struct FontStore {
    font: Option<Font<'static>>,
}

static FONT: Lazy<FontStore> = Lazy::new(FontStore::load);

pub fn font() -> &'static FontStore {
    &FONT
}

impl FontStore {
    fn load() -> Self {
        let mut candidates: Vec<PathBuf> =
            PLATFORM_FONT_CANDIDATES.iter().map(PathBuf::from).collect();
        candidates.push(Path::new(FONTS_DIR).join("NotoSansJP-Bold.ttf"));
        if let Ok(entries) = std::fs::read_dir(FONTS_DIR) {
            for entry in entries.flatten() {
                candidates.push(entry.path());
            }
        }

        for candidate in candidates {
            if let Ok(bytes) = std::fs::read(&candidate) {
                if let Some(font) = Font::try_from_vec(bytes) {
                    tracing::info!("Loaded font: {}", candidate.display());
                    return Self { font: Some(font) };
                }
            }
        }

        tracing::warn!("No usable Japanese font found; subtitles render as blank boxes");
        Self { font: None }
    }

    pub fn text_width(&self, text: &str, size: f32) -> u32 {
        match &self.font {
            Some(font) => {
                let scale = Scale::uniform(size);
                font.layout(text, scale, point(0.0, 0.0))
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .fold(0.0f32, f32::max)
                    .ceil() as u32
            }
            // Rough CJK estimate keeps box layout sane without a font.
            None => (text.chars().count() as f32 * size).ceil() as u32,
        }
    }

    pub fn line_height(&self, size: f32) -> u32 {
        match &self.font {
            Some(font) => {
                let vm = font.v_metrics(Scale::uniform(size));
                (vm.ascent - vm.descent + vm.line_gap).ceil() as u32
            }
            None => size.ceil() as u32,
        }
    }

    /// Draw one line with `(x, y)` as the top-left of the line box.
    pub fn draw_text(&self, img: &mut RgbaImage, x: i32, y: i32, text: &str, size: f32, color: Rgb) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = Scale::uniform(size);
        let ascent = font.v_metrics(scale).ascent;

        for glyph in font.layout(text, scale, point(x as f32, y as f32 + ascent)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    let px = bb.min.x + gx as i32;
                    let py = bb.min.y + gy as i32;
                    if v > 0.0
                        && px >= 0
                        && py >= 0
                        && (px as u32) < img.width()
                        && (py as u32) < img.height()
                    {
                        let alpha = (v * 255.0) as u8;
                        img.get_pixel_mut(px as u32, py as u32)
                            .blend(&Rgba([color.0, color.1, color.2, alpha]));
                    }
                });
            }
        }
    }

    /// Outlined text for thumbnails: a thick dark rim, then the fill.
    pub fn draw_text_outlined(
        &self,
        img: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        size: f32,
        fill: Rgb,
        outline: Rgb,
        outline_width: i32,
    ) {
        for dx in -outline_width..=outline_width {
            for dy in -outline_width..=outline_width {
                if dx * dx + dy * dy <= outline_width * outline_width {
                    self.draw_text(img, x + dx, y + dy, text, size, outline);
                }
            }
        }
        self.draw_text(img, x, y, text, size, fill);
    }
}

/// Filled rounded rectangle over the whole image, with an optional border
/// drawn inside the fill edge.
pub fn draw_rounded_rect(
    img: &mut RgbaImage,
    fill: (u8, u8, u8, u8),
    border: Option<(Rgb, u32)>,
) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let radius = 15i32.min(w / 2).min(h / 2);

    let inside_rounded = |x: i32, y: i32, inset: i32| -> bool {
        let x0 = inset;
        let y0 = inset;
        let x1 = w - 1 - inset;
        let y1 = h - 1 - inset;
        if x < x0 || x > x1 || y < y0 || y > y1 {
            return false;
        }
        let r = (radius - inset).max(0);
        let cx = if x < x0 + r {
            Some(x0 + r)
        } else if x > x1 - r {
            Some(x1 - r)
        } else {
            None
        };
        let cy = if y < y0 + r {
            Some(y0 + r)
        } else if y > y1 - r {
            Some(y1 - r)
        } else {
            None
        };
        match (cx, cy) {
            (Some(cx), Some(cy)) => {
                let dx = x - cx;
                let dy = y - cy;
                dx * dx + dy * dy <= r * r
            }
            _ => true,
        }
    };

    let border_width = border.map(|(_, bw)| bw as i32).unwrap_or(0);
    for y in 0..h {
        for x in 0..w {
            if !inside_rounded(x, y, 0) {
                continue;
            }
            let pixel = if border_width > 0 && !inside_rounded(x, y, border_width) {
                let (color, _) = border.unwrap();
                Rgba([color.0, color.1, color.2, 255])
            } else {
                Rgba([fill.0, fill.1, fill.2, fill.3])
            };
            img.put_pixel(x as u32, y as u32, pixel);
        }
    }
}

/// Vertical two-color gradient (thumbnail background).
pub fn vertical_gradient(width: u32, height: u32, top: Rgb, bottom: Rgb) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for y in 0..height {
        let ratio = y as f64 / height as f64;
        let r = (top.0 as f64 + (bottom.0 as f64 - top.0 as f64) * ratio) as u8;
        let g = (top.1 as f64 + (bottom.1 as f64 - top.1 as f64) * ratio) as u8;
        let b = (top.2 as f64 + (bottom.2 as f64 - top.2 as f64) * ratio) as u8;
        for x in 0..width {
            img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }
    img
}

pub fn resize_to_height(img: &RgbaImage, height: u32) -> RgbaImage {
    let aspect = img.width() as f64 / img.height() as f64;
    let width = ((height as f64 * aspect) as u32).max(1);
    imageops::resize(img, width, height, imageops::FilterType::Lanczos3)
}

/// 2ch-style subtitle box: rounded rect in the speaker's colors, wrapped
/// text inside.
pub fn subtitle_image(
    fs: &FontStore,
    text: &str,
    style: &SpeakerStyle,
    max_chars_per_line: usize,
    font_size: f32,
) -> RgbaImage {
    let border_width = 4u32;
    let padding = 20u32;
    let line_spacing = 10u32;

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(crate::layout::smart_text_wrap(paragraph, max_chars_per_line));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    let line_height = fs.line_height(font_size);
    let max_line_width = lines
        .iter()
        .map(|l| fs.text_width(if l.is_empty() { " " } else { l }, font_size))
        .max()
        .unwrap_or(1);
    let total_text_height =
        line_height * lines.len() as u32 + line_spacing * (lines.len() as u32 - 1);

    let img_width = max_line_width + padding * 2 + border_width * 2;
    let img_height = total_text_height + padding * 2 + border_width * 2;

    let mut img = RgbaImage::new(img_width, img_height);
    draw_rounded_rect(&mut img, style.bg_color, Some((style.border_color, border_width)));

    let mut y = (padding + border_width) as i32;
    for line in &lines {
        fs.draw_text(&mut img, (padding + border_width) as i32, y, line, font_size, style.text_color);
        y += (line_height + line_spacing) as i32;
    }

    img
}

/// Small name tag pasted over the subtitle's top-left corner.
pub fn speaker_label(fs: &FontStore, name: &str, style: &SpeakerStyle) -> Option<RgbaImage> {
    if name.is_empty() {
        return None;
    }
    let font_size = 28.0;
    let padding_x = 12u32;
    let padding_y = 6u32;

    let text_w = fs.text_width(name, font_size);
    let text_h = fs.line_height(font_size);
    let mut img = RgbaImage::from_pixel(
        text_w + padding_x * 2,
        text_h + padding_y * 2,
        Rgba([style.name_bg_color.0, style.name_bg_color.1, style.name_bg_color.2, 255]),
    );
    fs.draw_text(
        &mut img,
        padding_x as i32,
        padding_y as i32 - 2,
        name,
        font_size,
        style.name_text_color,
    );
    Some(img)
}

/// Subtitle box with the name label overhanging its top edge.
pub fn subtitle_with_label(
    fs: &FontStore,
    text: &str,
    style: &SpeakerStyle,
    name: &str,
    show_name: bool,
    max_chars_per_line: usize,
    font_size: f32,
) -> RgbaImage {
    let subtitle = subtitle_image(fs, text, style, max_chars_per_line, font_size);
    if !show_name {
        return subtitle;
    }
    let Some(label) = speaker_label(fs, name, style) else {
        return subtitle;
    };

    let label_offset_x = 15u32;
    let label_overhang = label.height() / 2;

    let total_width = subtitle.width().max(label_offset_x + label.width());
    let total_height = subtitle.height() + label_overhang;

    let mut combined = RgbaImage::new(total_width, total_height);
    imageops::overlay(&mut combined, &subtitle, 0, label_overhang as i64);
    imageops::overlay(&mut combined, &label, label_offset_x as i64, 0);
    combined
}

/// Compact theme badge shown top-right during the main phase.
pub fn theme_badge(fs: &FontStore, theme: &str, video_width: u32) -> RgbaImage {
    let font_size = 22.0;
    let max_width = (video_width as f32 * 0.5) as usize;
    let max_chars = (max_width as f32 / (font_size * 0.6)).max(18.0) as usize;

    let lines = crate::layout::smart_text_wrap(theme, max_chars);
    let line_spacing = 4u32;
    let line_height = fs.line_height(font_size);
    let max_line_width = lines
        .iter()
        .map(|l| fs.text_width(l, font_size))
        .max()
        .unwrap_or(1);

    let padding_h = 18u32;
    let padding_v = 14u32;
    let total_height = line_height * lines.len() as u32 + line_spacing * (lines.len() as u32 - 1);
    let img_width = max_line_width + padding_h * 2;
    let img_height = total_height + padding_v * 2;

    let mut img = RgbaImage::new(img_width, img_height);
    draw_rounded_rect(&mut img, (35, 35, 45, 235), Some(((80, 80, 100), 2)));

    // Accent line along the top edge.
    for x in 12..img_width.saturating_sub(12) {
        for dy in 2..4u32 {
            img.put_pixel(x, dy, Rgba([100, 150, 220, 255]));
        }
    }

    let mut y = padding_v as i32;
    for line in &lines {
        let line_w = fs.text_width(line, font_size);
        let x = (img_width.saturating_sub(line_w) / 2) as i32;
        fs.draw_text(&mut img, x + 1, y + 1, line, font_size, (0, 0, 0));
        fs.draw_text(&mut img, x, y, line, font_size, (255, 255, 255));
        y += (line_height + line_spacing) as i32;
    }

    img
}

/// Large centered theme banner for the intro phase.
pub fn intro_theme_image(fs: &FontStore, theme: &str, font_size: f32) -> RgbaImage {
    let lines = crate::layout::intro_theme_wrap(theme, 18);
    let line_spacing = 12u32;
    let padding = 30u32;
    let line_height = fs.line_height(font_size);
    let max_line_width = lines
        .iter()
        .map(|l| fs.text_width(l, font_size))
        .max()
        .unwrap_or(1);

    let total_height = line_height * lines.len() as u32 + line_spacing * (lines.len() as u32 - 1);
    let img_width = max_line_width + padding * 2;
    let img_height = total_height + padding * 2;

    let mut img = RgbaImage::new(img_width, img_height);
    draw_rounded_rect(&mut img, (50, 100, 180, 230), None);

    let mut y = padding as i32;
    for line in &lines {
        let line_w = fs.text_width(line, font_size);
        let x = (img_width.saturating_sub(line_w) / 2) as i32;
        fs.draw_text(&mut img, x, y, line, font_size, (255, 255, 255));
        y += (line_height + line_spacing) as i32;
    }

    img
}

/// Channel icon plus a speech bubble pointing at it; used for narrator
/// lines in the intro, mid-story and ending phases.
pub fn icon_bubble(
    fs: &FontStore,
    text: &str,
    icon: Option<&RgbaImage>,
    icon_size: u32,
    font_size: f32,
) -> RgbaImage {
    let lines = crate::layout::smart_text_wrap(text, 35);
    let line_spacing = 6u32;
    let padding = 15u32;
    let line_height = fs.line_height(font_size);
    let max_line_width = lines
        .iter()
        .map(|l| fs.text_width(l, font_size))
        .max()
        .unwrap_or(1);

    let icon_scaled = icon.map(|i| resize_to_height(i, icon_size));
    let icon_w = icon_scaled.as_ref().map(|i| i.width()).unwrap_or(0);

    let total_text_height =
        line_height * lines.len() as u32 + line_spacing * (lines.len() as u32 - 1);
    let bubble_width = max_line_width + padding * 2 + 20;
    let bubble_height = (total_text_height + padding * 2).max(icon_size);

    let gap = 15u32;
    let total_width = icon_w + gap + bubble_width;
    let total_height = icon_size.max(bubble_height) + 5;

    let mut img = RgbaImage::new(total_width, total_height);

    if let Some(icon_img) = &icon_scaled {
        let icon_y = (total_height - icon_size) / 2;
        imageops::overlay(&mut img, icon_img, 0, icon_y as i64);
    }

    let bubble_x = icon_w + gap;
    let bubble_y = (total_height - bubble_height) / 2;
    let mut bubble = RgbaImage::new(bubble_width, bubble_height);
    draw_rounded_rect(&mut bubble, (40, 40, 50, 230), Some(((100, 100, 120), 2)));
    imageops::overlay(&mut img, &bubble, bubble_x as i64, bubble_y as i64);

    // Pointer triangle toward the icon.
    let tri_y = (bubble_y + bubble_height / 2) as i32;
    for dx in 0..10i32 {
        let half = 8 - (dx * 8 / 10);
        for dy in -half..=half {
            let px = bubble_x as i32 - 10 + dx;
            let py = tri_y + dy;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, Rgba([40, 40, 50, 230]));
            }
        }
    }

    let text_x = (bubble_x + padding + 10) as i32;
    let mut text_y = (bubble_y + (bubble_height.saturating_sub(total_text_height)) / 2) as i32;
    for line in &lines {
        fs.draw_text(&mut img, text_x, text_y, line, font_size, (255, 255, 255));
        text_y += (line_height + line_spacing) as i32;
    }

    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::style_for;

    #[test]
    fn rounded_rect_fills_center_and_clears_corners() {
        let mut img = RgbaImage::new(100, 60);
        draw_rounded_rect(&mut img, (200, 10, 10, 255), Some(((1, 2, 3), 3)));
        // Center is fill color, absolute corner stays transparent.
        assert_eq!(img.get_pixel(50, 30).0, [200, 10, 10, 255]);
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        // Edge midpoint is border color.
        assert_eq!(img.get_pixel(50, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn gradient_ends_match_requested_colors() {
        let img = vertical_gradient(4, 100, (255, 0, 0), (0, 0, 255));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        let bottom = img.get_pixel(0, 99).0;
        assert!(bottom[2] > 240 && bottom[0] < 16);
    }

    #[test]
    fn subtitle_image_has_reasonable_bounds() {
        let fs = FontStore { font: None };
        let style = style_for("res_A");
        let img = subtitle_image(&fs, "これはテストの字幕です", &style, 25, 28.0);
        assert!(img.width() > 40);
        assert!(img.height() > 40);
        // Interior carries the speaker background color.
        let px = img.get_pixel(img.width() / 2, img.height() / 2).0;
        assert_eq!(px[3], style.bg_color.3);
    }

    #[test]
    fn label_is_skipped_for_empty_name() {
        let fs = FontStore { font: None };
        assert!(speaker_label(&fs, "", &style_for("narrator")).is_none());
        assert!(speaker_label(&fs, "イッチ", &style_for("icchi")).is_some());
    }

    #[test]
    fn bubble_is_wider_than_icon() {
        let fs = FontStore { font: None };
        let icon = RgbaImage::from_pixel(64, 64, Rgba([9, 9, 9, 255]));
        let img = icon_bubble(&fs, "ナレーションです", Some(&icon), 100, 28.0);
        assert!(img.width() > 120);
        assert!(img.height() >= 100);
    }
}
