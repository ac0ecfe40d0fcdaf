use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Natural pause inserted after every turn, seconds.
pub const INTER_TURN_GAP: f64 = 0.4;
/// On-screen hold for a title card, which has no audio.
pub const TITLE_CARD_SECS: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: usize,
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    pub start_time: f64,
    pub duration: f64,
}

impl SubtitleEntry {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleTimeline {
    pub total_duration: f64,
    pub subtitles: Vec<SubtitleEntry>,
}

impl SubtitleTimeline {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read subtitles: {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write subtitles: {}", path.display()))?;
        Ok(())
    }
}

/// Accumulates timeline entries back to back. `start_time` of each entry is
/// the running total at push time; the stored duration already includes the
/// caller's gap, so entries stay contiguous by construction.
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    entries: Vec<SubtitleEntry>,
    current_time: f64,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize, role: &str, name: &str, text: &str, duration: f64) {
        self.entries.push(SubtitleEntry {
            index,
            role: role.to_string(),
            name: name.to_string(),
            text: text.to_string(),
            start_time: self.current_time,
            duration,
        });
        self.current_time += duration;
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn finish(self) -> SubtitleTimeline {
        SubtitleTimeline {
            total_duration: self.current_time,
            subtitles: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_is_contiguous() {
        let mut b = TimelineBuilder::new();
        b.push(0, "narrator", "", "a", 2.0 + INTER_TURN_GAP);
        b.push(1, "title_card", "", "b", TITLE_CARD_SECS + INTER_TURN_GAP);
        b.push(2, "icchi", "イッチ", "c", 5.5 + INTER_TURN_GAP);
        let timeline = b.finish();

        for pair in timeline.subtitles.windows(2) {
            let diff = (pair[1].start_time - pair[0].end_time()).abs();
            assert!(diff < 1e-9, "entries not contiguous: {:?}", pair);
        }

        let last = timeline.subtitles.last().unwrap();
        assert!((timeline.total_duration - last.end_time()).abs() < 1e-9);
    }

    #[test]
    fn start_times_are_non_decreasing() {
        let mut b = TimelineBuilder::new();
        for i in 0..10 {
            b.push(i, "res_A", "名無しさん", "x", 0.5 + INTER_TURN_GAP);
        }
        let timeline = b.finish();
        for pair in timeline.subtitles.windows(2) {
            assert!(pair[1].start_time >= pair[0].start_time);
        }
        assert_eq!(timeline.subtitles.len(), 10);
    }

    #[test]
    fn serde_shape_matches_artifact() {
        let mut b = TimelineBuilder::new();
        b.push(0, "narrator", "", "こんにちは", 1.0);
        let json = serde_json::to_string(&b.finish()).unwrap();
        assert!(json.contains("total_duration"));
        assert!(json.contains("start_time"));

        let back: SubtitleTimeline = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subtitles.len(), 1);
        assert_eq!(back.subtitles[0].index, 0);
    }
}
