//! Per-role voice and subtitle styling tables, kept as immutable data
//! instead of mutable module globals.

pub type Rgb = (u8, u8, u8);
pub type Rgba = (u8, u8, u8, u8);

/// VOICEVOX synthesis parameters for one speaker role.
#[derive(Debug, Clone, Copy)]
pub struct SpeakerProfile {
    pub speaker_id: u32,
    /// Playback speed multiplier, applied by rescaling the WAV frame rate.
    pub speed: f64,
    /// dB offset on top of the shared loudness target; compensates voices
    /// the engine renders noticeably quiet or loud.
    pub volume_boost: f64,
}

pub const DEFAULT_SPEAKER_ID: u32 = 3; // ずんだもん（ノーマル）
pub const TARGET_DBFS: f64 = -20.0;

const SPEAKER_TABLE: &[(&str, u32, f64, f64)] = &[
    // role, speaker_id, speed, volume_boost
    ("narrator", 3, 1.0, 0.0),
    ("icchi", 2, 1.0, 0.0),
    ("res_A", 3, 1.15, 0.0),
    ("res_B", 8, 1.2, 0.0),
    ("res_C", 13, 1.0, 4.0),
    ("res_D", 12, 1.0, 0.0),
    ("res_E", 46, 1.15, 3.0),
    ("res_F", 3, 1.15, 3.0),
    ("res_G", 3, 1.1, 0.0),
    ("res_H", 14, 1.0, 4.0),
    ("res_I", 3, 1.1, 0.0),
    ("res_J", 8, 1.2, 0.0),
    ("res_K", 3, 1.15, 0.0),
    ("res_L", 12, 1.0, 0.0),
    ("res_M", 46, 1.1, 0.0),
];

pub fn profile_for(role: &str) -> SpeakerProfile {
    for (name, speaker_id, speed, volume_boost) in SPEAKER_TABLE {
        if *name == role {
            return SpeakerProfile {
                speaker_id: *speaker_id,
                speed: *speed,
                volume_boost: *volume_boost,
            };
        }
    }
    SpeakerProfile {
        speaker_id: DEFAULT_SPEAKER_ID,
        speed: 1.0,
        volume_boost: 0.0,
    }
}

/// Visual style of one speaker's subtitle box.
#[derive(Debug, Clone)]
pub struct SpeakerStyle {
    pub name: &'static str,
    pub border_color: Rgb,
    pub bg_color: Rgba,
    pub name_bg_color: Rgb,
    pub name_text_color: Rgb,
    pub text_color: Rgb,
}

// res_X roles cycle through this palette by letter.
const RES_COLORS: &[(Rgb, Rgba)] = &[
    ((130, 80, 160), (250, 245, 255, 240)), // 紫
    ((80, 130, 80), (245, 255, 245, 240)),  // 緑
    ((80, 80, 80), (250, 250, 250, 240)),   // グレー
    ((80, 130, 180), (245, 250, 255, 240)), // 青
    ((180, 130, 80), (255, 250, 245, 240)), // オレンジ
];

pub fn style_for(role: &str) -> SpeakerStyle {
    match role {
        "icchi" => SpeakerStyle {
            name: "イッチ",
            border_color: (220, 50, 50),
            bg_color: (255, 250, 250, 240),
            name_bg_color: (220, 50, 50),
            name_text_color: (255, 255, 255),
            text_color: (30, 30, 30),
        },
        "narrator" | "title_card" => SpeakerStyle {
            name: "",
            border_color: (100, 100, 120),
            bg_color: (240, 240, 245, 235),
            name_bg_color: (100, 100, 120),
            name_text_color: (255, 255, 255),
            text_color: (30, 30, 40),
        },
        role if role.starts_with("res_") => {
            let letter = role.trim_start_matches("res_");
            let idx = letter
                .chars()
                .next()
                .filter(|c| c.is_ascii_alphabetic())
                .map(|c| (c.to_ascii_uppercase() as usize - 'A' as usize))
                .unwrap_or(0);
            let (border, bg) = RES_COLORS[idx % RES_COLORS.len()];
            SpeakerStyle {
                name: "名無しさん",
                border_color: border,
                bg_color: bg,
                name_bg_color: border,
                name_text_color: (255, 255, 255),
                text_color: (30, 30, 30),
            }
        }
        _ => SpeakerStyle {
            name: "",
            border_color: (80, 80, 80),
            bg_color: (250, 250, 250, 240),
            name_bg_color: (80, 80, 80),
            name_text_color: (255, 255, 255),
            text_color: (30, 30, 30),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_match_table() {
        assert_eq!(profile_for("narrator").speaker_id, 3);
        assert_eq!(profile_for("icchi").speaker_id, 2);
        assert_eq!(profile_for("res_B").speed, 1.2);
        assert_eq!(profile_for("res_C").volume_boost, 4.0);
        // Unknown roles fall back to the default voice.
        let unknown = profile_for("res_Z");
        assert_eq!(unknown.speaker_id, DEFAULT_SPEAKER_ID);
        assert_eq!(unknown.speed, 1.0);
    }

    #[test]
    fn res_styles_cycle_through_palette() {
        let a = style_for("res_A");
        let f = style_for("res_F");
        // A and F are 5 apart; the palette has 5 entries, so they share one.
        assert_eq!(a.border_color, f.border_color);
        assert_ne!(style_for("res_A").border_color, style_for("res_B").border_color);
        assert_eq!(style_for("res_A").name, "名無しさん");
        assert_eq!(style_for("icchi").name, "イッチ");
    }
}
