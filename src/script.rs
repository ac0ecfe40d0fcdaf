use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// One dialogue turn of the generated script. The position of a turn in the
/// script array is its identity: voice clips, images and subtitle entries
/// all join back to the script by that index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

pub const ROLE_NARRATOR: &str = "narrator";
pub const ROLE_TITLE_CARD: &str = "title_card";
pub const ROLE_ICCHI: &str = "icchi";

impl Turn {
    pub fn is_title_card(&self) -> bool {
        self.role == ROLE_TITLE_CARD
    }

    pub fn is_narrator(&self) -> bool {
        self.role == ROLE_NARRATOR
    }

    /// Narrator and title-card turns get special visual treatment and never
    /// join the subtitle stack.
    pub fn is_special(&self) -> bool {
        self.is_narrator() || self.is_title_card()
    }
}

pub async fn load_script(path: &Path) -> Result<Vec<Turn>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let turns: Vec<Turn> =
        serde_json::from_str(&content).with_context(|| "Failed to parse script JSON")?;
    Ok(turns)
}

pub async fn save_script(path: &Path, turns: &[Turn]) -> Result<()> {
    let json = serde_json::to_string_pretty(turns)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write script: {}", path.display()))?;
    Ok(())
}

/// The video theme is carried by the first title-card turn.
pub fn theme_from_script(turns: &[Turn]) -> String {
    turns
        .iter()
        .find(|t| t.is_title_card())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_role_helpers() {
        let t = Turn {
            role: "title_card".into(),
            name: String::new(),
            text: "貯金の話".into(),
            image_prompt: None,
        };
        assert!(t.is_title_card());
        assert!(t.is_special());
        assert!(!t.is_narrator());

        let r = Turn {
            role: "res_B".into(),
            name: "名無しさん".into(),
            text: "ようやっとる".into(),
            image_prompt: None,
        };
        assert!(!r.is_special());
    }

    #[test]
    fn turn_serde_roundtrip_skips_missing_prompt() {
        let json = r#"{"role":"icchi","name":"イッチ","text":"ワイや"}"#;
        let t: Turn = serde_json::from_str(json).unwrap();
        assert_eq!(t.role, "icchi");
        assert!(t.image_prompt.is_none());

        let out = serde_json::to_string(&t).unwrap();
        assert!(!out.contains("image_prompt"));
    }

    #[test]
    fn theme_comes_from_first_title_card() {
        let turns = vec![
            Turn {
                role: "narrator".into(),
                name: String::new(),
                text: "今回のスレはこちら".into(),
                image_prompt: None,
            },
            Turn {
                role: "title_card".into(),
                name: String::new(),
                text: "30代で貯金1000万貯めた話".into(),
                image_prompt: Some("piggy bank".into()),
            },
        ];
        assert_eq!(theme_from_script(&turns), "30代で貯金1000万貯めた話");
        assert_eq!(theme_from_script(&[]), "");
    }
}
