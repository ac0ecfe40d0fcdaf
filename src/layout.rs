//! Pure layout decisions for the video assembler: Japanese line breaking,
//! subtitle stack grouping, and character-illustration selection.

use std::collections::HashSet;

// 行頭禁則: these must not start a line.
const NO_START: &str = "。、．，！？」』）】〉》・：；ー～…‥っゃゅょぁぃぅぇぉァィゥェォッャュョ";
// 行末禁則: these must not end a line.
const NO_END: &str = "「『（【〈《";
// Preferred break points, after punctuation.
const BREAK_AFTER: &str = "。！？、」』）】〉》…";

/// Word-wrap Japanese text at `max_chars` per line, honoring kinsoku rules:
/// a line never starts with closing punctuation or small kana, never ends
/// with an opening bracket, and prefers to break just after sentence
/// punctuation.
pub fn smart_text_wrap(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let no_start: HashSet<char> = NO_START.chars().collect();
    let no_end: HashSet<char> = NO_END.chars().collect();
    let break_after: HashSet<char> = BREAK_AFTER.chars().collect();

    let mut lines = Vec::new();
    let mut current: Vec<char> = Vec::new();

    for &ch in &chars {
        current.push(ch);

        if current.len() >= max_chars {
            // Search backwards for a break position that satisfies kinsoku.
            let mut best_break: Option<usize> = None;
            let lower = current.len().saturating_sub(10);

            for j in (lower.max(1)..current.len()).rev() {
                if j + 1 < current.len() {
                    let next_char = current[j + 1];
                    let curr_char = current[j];

                    if no_start.contains(&next_char) {
                        continue;
                    }
                    if no_end.contains(&curr_char) {
                        continue;
                    }

                    if break_after.contains(&curr_char) {
                        best_break = Some(j + 1);
                        break;
                    }

                    if best_break.is_none() {
                        best_break = Some(j + 1);
                    }
                }
            }

            match best_break {
                Some(b) if b < current.len() => {
                    lines.push(current[..b].iter().collect());
                    current.drain(..b);
                }
                _ => {
                    lines.push(current.iter().collect());
                    current.clear();
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(current.iter().collect());
    }

    lines
}

/// Line breaking for the big intro theme banner. Prefers breaking after
/// particles and phrase boundaries over hitting an exact width.
pub fn intro_theme_wrap(text: &str, target_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= target_chars + 3 {
        return vec![text.to_string()];
    }

    const TWO_CHAR_BREAKS: &[&str] = &[
        "から", "まで", "けど", "ので", "のに", "って", "した", "する", "った",
    ];

    let mut candidates: Vec<usize> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if i + 1 < chars.len() {
            let two: String = chars[i..i + 2].iter().collect();
            if TWO_CHAR_BREAKS.contains(&two.as_str()) {
                candidates.push(i + 2);
                i += 2;
                continue;
            }
        }

        let ch = chars[i];
        if "がはをにでともへ".contains(ch) && i >= 2 && i < chars.len() - 1 {
            candidates.push(i + 1);
        }
        if "、。！？」）…ｗw".contains(ch) {
            candidates.push(i + 1);
        }
        i += 1;
    }

    if candidates.is_empty() {
        return smart_text_wrap(text, target_chars);
    }

    // が/は mark clause boundaries and get a scoring bonus.
    let clause_breaks: HashSet<usize> = candidates
        .iter()
        .copied()
        .filter(|&c| c > 0 && "がは".contains(chars[c - 1]))
        .collect();

    let mut lines = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= target_chars + 3 {
            lines.push(chars[start..].iter().collect());
            break;
        }

        let mut best: Option<usize> = None;
        let mut best_dist = usize::MAX;

        for &c in &candidates {
            if c <= start {
                continue;
            }
            let line_len = c - start;
            if (line_len as f64) < target_chars as f64 * 0.45 {
                continue;
            }
            if (line_len as f64) > target_chars as f64 * 1.4 {
                break;
            }
            let mut dist = line_len.abs_diff(target_chars);
            if clause_breaks.contains(&c) {
                dist = dist.saturating_sub(3);
            }
            if dist < best_dist {
                best_dist = dist;
                best = Some(c);
            }
        }

        match best {
            Some(b) if b > start => {
                lines.push(chars[start..b].iter().collect());
                start = b;
            }
            _ => {
                lines.extend(smart_text_wrap(
                    &chars[start..].iter().collect::<String>(),
                    target_chars,
                ));
                break;
            }
        }
    }

    lines
}

/// What the grouping pass needs to know about one stacked subtitle.
#[derive(Debug, Clone, Copy)]
pub struct StackItem {
    pub height: u32,
    pub start_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct StackGroup {
    /// Indices into the input slice, in original order.
    pub members: Vec<usize>,
    pub start_time: f64,
    pub end_time: f64,
}

/// Partition consecutive subtitles into on-screen stacks. A group grows
/// until adding the next subtitle would overflow the vertical budget
/// (margins included) or exceed `max_visible` entries; then a new group
/// starts. Every item lands in exactly one group.
pub fn group_stacks(
    items: &[StackItem],
    budget: u32,
    margin: u32,
    max_visible: usize,
) -> Vec<StackGroup> {
    let mut groups = Vec::new();
    let mut i = 0;

    while i < items.len() {
        let mut members = Vec::new();
        let mut total_height: u32 = 0;

        while i < items.len() && members.len() < max_visible {
            let item = items[i];
            let added = item.height + if members.is_empty() { 0 } else { margin };
            if total_height + added > budget && !members.is_empty() {
                break;
            }
            members.push(i);
            total_height += added;
            i += 1;
        }

        if members.is_empty() {
            // A single oversized subtitle still gets its own group.
            members.push(i);
            i += 1;
        }

        let first = items[members[0]];
        let last = items[*members.last().unwrap()];
        groups.push(StackGroup {
            start_time: first.start_time,
            end_time: last.start_time + last.duration,
            members,
        });
    }

    groups
}

// Japanese keyword → character-image tag hints. Tags come from asset file
// names (e.g. salaryman_money_happy.png).
const KEYWORD_MAP: &[(&str, &[&str])] = &[
    ("歳", &["salaryman", "man", "woman", "businessman"]),
    ("年齢", &["man", "woman"]),
    ("職業", &["salaryman", "kaisya", "computer", "man"]),
    ("独身", &["man", "woman"]),
    ("既婚", &["family", "relax"]),
    ("会社員", &["salaryman", "kaisya", "computer", "man", "businessman"]),
    ("エンジニア", &["salaryman", "kaisya", "computer", "man"]),
    ("家族", &["family", "relax", "jitaku"]),
    ("貯金", &["money", "salaryman", "happy"]),
    ("投資", &["money", "salaryman", "megakuramu"]),
    ("借金", &["kariru", "money", "boroboro", "wana"]),
    ("節約", &["saifu", "money"]),
    ("給料", &["salaryman", "money", "kaisya"]),
    ("収入", &["salaryman", "money"]),
    ("支出", &["saifu", "kara", "money", "fly"]),
    ("年収", &["salaryman", "money", "man"]),
    ("万円", &["money", "salaryman"]),
    ("ローン", &["kariru", "money", "boroboro"]),
    ("税金", &["zeikin", "money"]),
    ("嬉しい", &["happy", "tereru", "dance", "ukareru"]),
    ("悲しい", &["pien", "uruuru", "boroboro"]),
    ("怒り", &["angry", "fukureru"]),
    ("驚き", &["ukkari", "panic"]),
    ("困る", &["koshi", "nukeru", "kowai", "panic"]),
    ("笑", &["happy", "warau", "tereru"]),
    ("泣", &["pien", "uruuru"]),
    ("怖い", &["kowai", "panic", "koshi"]),
    ("楽しい", &["happy", "dance", "ukareru"]),
    ("焦る", &["panic", "sick"]),
    ("照れ", &["tereru", "happy", "smartphone"]),
    ("成功", &["seikou", "syukufuku", "happy"]),
    ("失敗", &["boroboro", "wana", "kara"]),
    ("勝ち", &["seikou", "syukufuku"]),
    ("負け", &["boroboro", "pien"]),
    ("やった", &["seikou", "happy", "dance"]),
    ("ダメ", &["boroboro", "pien", "kara"]),
    ("仕事", &["kaisya", "computer", "salaryman"]),
    ("転職", &["kaisya", "salaryman"]),
    ("結婚", &["family", "nakayoshi"]),
    ("恋愛", &["nakayoshi", "happy"]),
    ("パソコン", &["computer", "kaisya"]),
    ("リラックス", &["relax", "jitaku"]),
    ("ゲーム", &["game", "kakin"]),
    ("課金", &["kakin", "game", "megakuramu"]),
    ("教えて", &["advice", "friend"]),
    ("アドバイス", &["advice", "friend", "hagemasu"]),
    ("相談", &["advice", "friend"]),
    ("応援", &["hagemasu", "ouuen", "friends"]),
    ("頑張れ", &["hagemasu", "ouuen", "friends"]),
    ("励まし", &["hagemasu", "friends", "businessman"]),
    ("ありがとう", &["hagemasu", "syukufuku"]),
    ("うっかり", &["ukkari", "pose"]),
    ("ミス", &["ukkari", "panic"]),
    ("草", &["warau", "happy"]),
    ("ワロタ", &["warau", "happy"]),
];

/// Collect illustration tags hinted at by the group's subtitle texts.
pub fn extract_keywords<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keywords = HashSet::new();
    for text in texts {
        for (jp_word, tags) in KEYWORD_MAP {
            if text.contains(jp_word) {
                for tag in *tags {
                    keywords.insert(tag.to_string());
                }
            }
        }
    }
    let mut out: Vec<String> = keywords.into_iter().collect();
    out.sort();
    out
}

/// Pick a character image for a group: unused images first, best keyword
/// overlap against filename-derived tags wins; index 0 of the available set
/// when nothing matches.
pub fn select_character(
    image_tags: &[Vec<String>],
    keywords: &[String],
    used: &HashSet<usize>,
) -> Option<usize> {
    if image_tags.is_empty() {
        return None;
    }

    let available: Vec<usize> = {
        let unused: Vec<usize> = (0..image_tags.len()).filter(|i| !used.contains(i)).collect();
        if unused.is_empty() {
            (0..image_tags.len()).collect()
        } else {
            unused
        }
    };

    let mut best_idx = available[0];
    let mut best_score = 0usize;
    for &idx in &available {
        let score = keywords
            .iter()
            .filter(|kw| image_tags[idx].iter().any(|tag| tag.contains(kw.as_str())))
            .count();
        if score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }

    Some(best_idx)
}

/// Tags from an asset file stem: `money_kariru_friend-man` → 4 tags.
pub fn tags_from_stem(stem: &str) -> Vec<String> {
    stem.to_lowercase()
        .replace('-', "_")
        .split('_')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_line() {
        assert_eq!(smart_text_wrap("短い", 25), vec!["短い".to_string()]);
    }

    #[test]
    fn wrapped_lines_never_start_with_forbidden_chars() {
        let text = "ワイが貯金を始めたのは、社会人二年目の春やった。最初は月三万円、そこから少しずつ増やしていったんや。";
        let lines = smart_text_wrap(text, 12);
        assert!(lines.len() > 1);
        let no_start: HashSet<char> = NO_START.chars().collect();
        for line in &lines {
            let first = line.chars().next().unwrap();
            assert!(!no_start.contains(&first), "line starts with {first}: {line}");
        }
        // Nothing gets lost in the wrap.
        let rejoined: String = lines.concat();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn intro_wrap_prefers_particle_boundaries() {
        let lines = intro_theme_wrap("30代で貯金1000万貯めた話を聞いてほしい", 12);
        assert!(lines.len() >= 2);
        let rejoined: String = lines.concat();
        assert_eq!(rejoined, "30代で貯金1000万貯めた話を聞いてほしい");
    }

    #[test]
    fn groups_respect_budget_and_cover_all_items() {
        let items: Vec<StackItem> = [60, 120, 80, 200, 40, 90, 150, 70]
            .iter()
            .enumerate()
            .map(|(i, &h)| StackItem {
                height: h,
                start_time: i as f64,
                duration: 1.0,
            })
            .collect();
        let budget = 300;
        let margin = 18;
        let groups = group_stacks(&items, budget, margin, 4);

        let mut seen = Vec::new();
        for group in &groups {
            let mut height = 0;
            for (pos, &idx) in group.members.iter().enumerate() {
                height += items[idx].height + if pos == 0 { 0 } else { margin };
                seen.push(idx);
            }
            assert!(
                height <= budget || group.members.len() == 1,
                "group overflows budget: {height}"
            );
            assert!(group.members.len() <= 4);
        }
        assert_eq!(seen, (0..items.len()).collect::<Vec<_>>());
    }

    #[test]
    fn group_times_span_members() {
        let items = vec![
            StackItem { height: 50, start_time: 0.0, duration: 2.0 },
            StackItem { height: 50, start_time: 2.0, duration: 3.0 },
        ];
        let groups = group_stacks(&items, 500, 18, 4);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].start_time, 0.0);
        assert_eq!(groups[0].end_time, 5.0);
    }

    #[test]
    fn keywords_match_subtitle_text() {
        let kws = extract_keywords(["貯金が増えた", "仕事やめたい"]);
        assert!(kws.contains(&"money".to_string()));
        assert!(kws.contains(&"kaisya".to_string()));
        assert!(extract_keywords(["こんにちは"]).is_empty());
    }

    #[test]
    fn character_selection_prefers_tag_overlap_then_round_robin() {
        let tags = vec![
            tags_from_stem("relax_jitaku"),
            tags_from_stem("salaryman_money_happy"),
            tags_from_stem("pien_boroboro"),
        ];
        let kws = vec!["money".to_string(), "salaryman".to_string()];

        let mut used = HashSet::new();
        assert_eq!(select_character(&tags, &kws, &used), Some(1));
        used.insert(1);

        // Best match used up: falls back to the first unused image.
        assert_eq!(select_character(&tags, &kws, &used), Some(0));
        used.insert(0);
        used.insert(2);

        // All used: the set resets and matching wins again.
        assert_eq!(select_character(&tags, &kws, &used), Some(1));
        assert_eq!(select_character(&[], &kws, &used), None);
    }
}
