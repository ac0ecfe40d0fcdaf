//! Text-to-reading conversion for the TTS stage.
//!
//! VOICEVOX mispronounces raw 2ch text in predictable ways: western digits,
//! loanwords, kanji with several readings, and the topic particle 「は」.
//! Every turn is pushed through the same fixed pipeline before synthesis:
//! digit normalization, large-number expansion, the reading dictionary
//! (longest key first), then the particle rewrite.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Fixed spelling → reading substitutions. Applied longest-key-first so a
/// short key ("金") can never corrupt a compound already covered by a
/// longer one ("金持ち").
const READING_DICT: &[(&str, &str)] = &[
    // 数字・金額
    ("1000万", "いっせんまん"),
    ("100万", "ひゃくまん"),
    ("10万", "じゅうまん"),
    ("1万", "いちまん"),
    ("0円", "ぜろえん"),
    ("1/3", "さんぶんのいち"),
    ("1/2", "にぶんのいち"),
    ("10%", "じゅっぱーせんと"),
    // 単位
    ("500g", "ごひゃくグラム"),
    ("100g", "ひゃくグラム"),
    ("1kg", "いちキロ"),
    ("10kg", "じゅっキロ"),
    // 「何」の読み
    ("何なのか", "なんなのか"),
    ("何で", "なんで"),
    ("何が", "なにが"),
    ("何を", "なにを"),
    ("何も", "なにも"),
    ("何か", "なにか"),
    ("何人", "なんにん"),
    ("何歳", "なんさい"),
    ("何年", "なんねん"),
    ("何万", "なんまん"),
    ("何円", "なんえん"),
    // 英語・ブランド名
    ("UberEats", "ウーバーイーツ"),
    ("Uber Eats", "ウーバーイーツ"),
    ("Uber", "ウーバー"),
    ("PayPay", "ペイペイ"),
    ("Spotify", "スポティファイ"),
    ("TikTok", "ティックトック"),
    ("Instagram", "インスタグラム"),
    ("iPhone", "アイフォン"),
    ("Apple", "アップル"),
    ("ChatGPT", "チャットジーピーティー"),
    ("Wi-Fi", "ワイファイ"),
    ("WiFi", "ワイファイ"),
    ("Bitcoin", "ビットコイン"),
    ("Suica", "スイカ"),
    ("PASMO", "パスモ"),
    ("PayPal", "ペイパル"),
    ("Tesla", "テスラ"),
    ("Costco", "コストコ"),
    ("IKEA", "イケア"),
    ("Starbucks", "スターバックス"),
    ("McDonald's", "マクドナルド"),
    ("McDonalds", "マクドナルド"),
    ("AirPods", "エアーポッズ"),
    ("Switch", "スイッチ"),
    ("PS5", "ピーエスファイブ"),
    ("Zoom", "ズーム"),
    ("Slack", "スラック"),
    ("UNIQLO", "ユニクロ"),
    ("GU", "ジーユー"),
    ("ZARA", "ザラ"),
    ("楽天", "らくてん"),
    // 英語・略語
    ("SIM", "しむ"),
    ("S&P500", "えすあんどぴーごひゃく"),
    ("S&P", "えすあんどぴー"),
    ("FX", "えふえっくす"),
    ("PC", "ぱそこん"),
    ("API", "えーぴーあい"),
    ("URL", "ゆーあーるえる"),
    ("SNS", "えすえぬえす"),
    ("YouTube", "ゆーちゅーぶ"),
    ("Twitter", "ついったー"),
    ("LINE", "らいん"),
    ("NISA", "にーさ"),
    ("iDeCo", "いでこ"),
    ("Netflix", "ねっとふりっくす"),
    ("Amazon", "あまぞん"),
    ("Google", "ぐーぐる"),
    ("REIT", "リート"),
    ("J-REIT", "ジェイリート"),
    ("ETF", "イーティーエフ"),
    ("FIRE", "ファイア"),
    ("TOPIX", "トピックス"),
    ("DIY", "ディーアイワイ"),
    ("SEO", "エスイーオー"),
    ("Web", "ウェブ"),
    ("Progate", "プロゲート"),
    ("Codecademy", "コードアカデミー"),
    ("mineo", "マイネオ"),
    ("GDP", "ジーディーピー"),
    // 「金」の読み分け（かね/きん）
    ("親の金", "おやのかね"),
    ("金持ち", "かねもち"),
    ("お金", "おかね"),
    ("金がない", "かねがない"),
    ("金が", "かねが"),
    ("金を", "かねを"),
    ("金は", "かねは"),
    ("金も", "かねも"),
    ("金の", "かねの"),
    ("金で", "かねで"),
    ("頭金", "あたまきん"),
    // ネットスラング・俗語
    ("ｗｗｗ", ""),
    ("ｗｗ", ""),
    ("ｗ", ""),
    ("www", ""),
    ("ww", ""),
    ("w", ""),
    ("草", "くさ"),
    ("orz", "おーあーるぜっと"),
    ("陰キャ", "いんきゃ"),
    ("陽キャ", "ようきゃ"),
    ("リア充", "りあじゅう"),
    ("ガチ", "がち"),
    ("マジ", "まじ"),
    ("ワイ", "わい"),
    ("彼女", "かのじょ"),
    // その他
    ("一択", "いったく"),
    ("30代", "さんじゅうだい"),
    ("20代", "にじゅうだい"),
    ("40代", "よんじゅうだい"),
    ("50代", "ごじゅうだい"),
    ("1K", "わんけー"),
    ("2LDK", "にーえるでぃーけー"),
    ("飲み代", "のみだい"),
    ("食費代", "しょくひだい"),
    ("交際費", "こうさいひ"),
    // 「辛」の読み分け（つらい/からい）
    ("辛かった", "つらかった"),
    ("辛い思い", "つらいおもい"),
    ("辛いこと", "つらいこと"),
    ("辛い時", "つらいとき"),
    ("辛い日々", "つらいひび"),
    ("辛くて", "つらくて"),
    ("辛さ", "つらさ"),
    ("辛抱", "しんぼう"),
    // 「行」の読み分け
    ("行った", "いった"),
    ("行って", "いって"),
    ("行く", "いく"),
    ("行ける", "いける"),
    ("行こう", "いこう"),
    // 「上」の読み分け
    ("上がった", "あがった"),
    ("上がる", "あがる"),
    ("上げた", "あげた"),
    ("上げる", "あげる"),
    ("上手", "じょうず"),
    ("以上", "いじょう"),
    ("年上", "としうえ"),
    // 「下」の読み分け
    ("下がった", "さがった"),
    ("下がる", "さがる"),
    ("下げた", "さげた"),
    ("下げる", "さげる"),
    ("以下", "いか"),
    ("年下", "としした"),
    // 「生」の読み分け
    ("生活", "せいかつ"),
    ("生まれ", "うまれ"),
    ("生きる", "いきる"),
    ("生涯", "しょうがい"),
    ("人生", "じんせい"),
    // 「重」の読み分け
    ("重い", "おもい"),
    ("重く", "おもく"),
    ("重要", "じゅうよう"),
    ("体重", "たいじゅう"),
    // 「分」の読み分け
    ("自分", "じぶん"),
    ("半分", "はんぶん"),
    ("十分", "じゅうぶん"),
    ("気分", "きぶん"),
    ("分かる", "わかる"),
    ("分ける", "わける"),
    // 「今」の読み分け
    ("今日", "きょう"),
    ("今年", "ことし"),
    ("今月", "こんげつ"),
    ("今週", "こんしゅう"),
    ("今回", "こんかい"),
    ("今後", "こんご"),
    ("今更", "いまさら"),
    // 「間」の読み分け
    ("時間", "じかん"),
    ("期間", "きかん"),
    ("人間", "にんげん"),
    ("仲間", "なかま"),
    ("間に合う", "まにあう"),
    // 「代」の読み分け
    ("世代", "せだい"),
    ("時代", "じだい"),
    ("代わり", "かわり"),
    ("交代", "こうたい"),
    // 「入」の読み分け
    ("入れる", "いれる"),
    ("入った", "はいった"),
    ("入る", "はいる"),
    ("収入", "しゅうにゅう"),
    ("入金", "にゅうきん"),
    // 「出」の読み分け
    ("出る", "でる"),
    ("出した", "だした"),
    ("出す", "だす"),
    ("支出", "ししゅつ"),
    ("出金", "しゅっきん"),
    // 食べ物
    ("鶏むね肉", "とりむねにく"),
    ("鶏もも肉", "とりももにく"),
    ("鶏肉", "とりにく"),
    ("牛肉", "ぎゅうにく"),
    ("豚肉", "ぶたにく"),
    // よく誤読される単語
    ("借金", "しゃっきん"),
    ("貯金", "ちょきん"),
    ("貸金", "かしきん"),
    ("元金", "がんきん"),
    ("現金", "げんきん"),
    ("預金", "よきん"),
    ("定期預金", "ていきよきん"),
    ("出資", "しゅっし"),
    ("融資", "ゆうし"),
    ("返済", "へんさい"),
    ("完済", "かんさい"),
    ("滞納", "たいのう"),
    ("延滞", "えんたい"),
    ("破産", "はさん"),
    ("自己破産", "じこはさん"),
    ("債務", "さいむ"),
    ("債権", "さいけん"),
    ("負債", "ふさい"),
    ("担保", "たんぽ"),
    ("抵当", "ていとう"),
    ("利息", "りそく"),
    ("利子", "りし"),
    ("金利", "きんり"),
    ("年利", "ねんり"),
    ("複利", "ふくり"),
    ("単利", "たんり"),
];

/// Topic-particle 「は」→「わ」rewrites. These only fire on an exact
/// preceding-noun match, never as a grammatical rule.
const PARTICLE_HA_PATTERNS: &[(&str, &str)] = &[
    // 金融関連
    ("給料は", "きゅうりょうわ"),
    ("収入は", "しゅうにゅうわ"),
    ("年収は", "ねんしゅうわ"),
    ("貯金は", "ちょきんわ"),
    ("投資は", "とうしわ"),
    ("資産は", "しさんわ"),
    ("借金は", "しゃっきんわ"),
    ("ローンは", "ローンわ"),
    ("税金は", "ぜいきんわ"),
    ("家賃は", "やちんわ"),
    ("金額は", "きんがくわ"),
    ("残高は", "ざんだかわ"),
    ("利益は", "りえきわ"),
    ("損失は", "そんしつわ"),
    // 数量・割合関連
    ("1割は", "1割わ"),
    ("2割は", "2割わ"),
    ("3割は", "3割わ"),
    ("4割は", "4割わ"),
    ("5割は", "5割わ"),
    ("6割は", "6割わ"),
    ("7割は", "7割わ"),
    ("8割は", "8割わ"),
    ("9割は", "9割わ"),
    ("半分は", "はんぶんわ"),
    ("大半は", "たいはんわ"),
    ("残りは", "のこりわ"),
    ("平均は", "へいきんわ"),
    // 人物関連
    ("俺は", "おれわ"),
    ("私は", "わたしわ"),
    ("僕は", "ぼくわ"),
    ("ワイは", "わいわ"),
    ("嫁は", "よめわ"),
    ("妻は", "つまわ"),
    ("夫は", "おっとわ"),
    ("親は", "おやわ"),
    ("会社は", "かいしゃわ"),
    ("仕事は", "しごとわ"),
    // 一般
    ("それは", "それわ"),
    ("これは", "これわ"),
    ("あれは", "あれわ"),
    ("今は", "いまわ"),
    ("後は", "あとわ"),
    ("他は", "ほかわ"),
    ("結果は", "けっかわ"),
    ("理由は", "りゆうわ"),
    ("問題は", "もんだいわ"),
    ("正解は", "せいかいわ"),
];

// Positional readings for a 4-digit group in front of 万/億/兆. The
// thousands column carries the euphonic irregulars (いっせん, さんぜん,
// はっせん), hundreds the b/p shifts (さんびゃく, ろっぴゃく, はっぴゃく).
const DIGIT_SEN: [&str; 10] = [
    "", "いっせん", "にせん", "さんぜん", "よんせん", "ごせん", "ろくせん", "ななせん",
    "はっせん", "きゅうせん",
];
const DIGIT_HYAKU: [&str; 10] = [
    "", "ひゃく", "にひゃく", "さんびゃく", "よんひゃく", "ごひゃく", "ろっぴゃく",
    "ななひゃく", "はっぴゃく", "きゅうひゃく",
];
const DIGIT_JUU: [&str; 10] = [
    "", "じゅう", "にじゅう", "さんじゅう", "よんじゅう", "ごじゅう", "ろくじゅう",
    "ななじゅう", "はちじゅう", "きゅうじゅう",
];
const DIGIT_ICHI: [&str; 10] = [
    "", "いち", "に", "さん", "よん", "ご", "ろく", "なな", "はち", "きゅう",
];

/// Full-width digits → ASCII digits, ahead of any numeric handling.
pub fn normalize_fullwidth_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}

fn digit_index(b: u8) -> usize {
    (b - b'0') as usize
}

/// Reading of a 1-4 digit group followed by a unit reading. The units
/// column is only read when non-zero; zero-padding to four digits keeps
/// every column aligned with its table.
fn number_to_reading(num: &str, unit: &str) -> String {
    let stripped = num.trim_start_matches('0');
    if stripped.is_empty() {
        return String::new();
    }

    let padded = format!("{:0>4}", stripped);
    let bytes = padded.as_bytes();

    let mut reading = String::new();
    reading.push_str(DIGIT_SEN[digit_index(bytes[0])]);
    reading.push_str(DIGIT_HYAKU[digit_index(bytes[1])]);
    reading.push_str(DIGIT_JUU[digit_index(bytes[2])]);
    if bytes[3] != b'0' {
        reading.push_str(DIGIT_ICHI[digit_index(bytes[3])]);
    }

    if reading.is_empty() {
        String::new()
    } else {
        reading + unit
    }
}

static LARGE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,4})(億|万|兆)").expect("large number regex"));

/// Expand 万/億/兆 amounts into kana: `5000万` → ごせんまん, `3億` →
/// さんおく. A bare number with no unit suffix is left untouched.
pub fn convert_large_numbers(text: &str) -> String {
    LARGE_NUMBER_RE
        .replace_all(text, |caps: &Captures| {
            let unit = match &caps[2] {
                "億" => "おく",
                "万" => "まん",
                "兆" => "ちょう",
                other => other,
            };
            let reading = number_to_reading(&caps[1], unit);
            if reading.is_empty() {
                caps[0].to_string()
            } else {
                reading
            }
        })
        .into_owned()
}

fn has_kana(s: &str) -> bool {
    s.chars().any(|c| ('\u{3040}'..='\u{30ff}').contains(&c))
}

// Dictionary order for application: longest key first so short keys never
// shadow compounds; kanji-only keys win length ties.
static SORTED_DICT: Lazy<Vec<&'static (&'static str, &'static str)>> = Lazy::new(|| {
    let mut entries: Vec<_> = READING_DICT.iter().collect();
    entries.sort_by_key(|(key, _)| (std::cmp::Reverse(key.chars().count()), has_kana(key)));
    entries
});

pub fn apply_reading_dict(text: &str) -> String {
    let mut result = text.to_string();
    for (key, reading) in SORTED_DICT.iter() {
        if result.contains(key) {
            result = result.replace(key, reading);
        }
    }
    result
}

pub fn convert_particle_ha(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in PARTICLE_HA_PATTERNS {
        if result.contains(pattern) {
            result = result.replace(pattern, replacement);
        }
    }
    result
}

/// The full conversion pipeline in its fixed order.
pub fn convert_for_voice(text: &str) -> String {
    let t = normalize_fullwidth_digits(text);
    let t = convert_large_numbers(&t);
    let t = apply_reading_dict(&t);
    let t = convert_particle_ha(&t);
    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullwidth_digits_become_ascii() {
        assert_eq!(normalize_fullwidth_digits("１０００万円"), "1000万円");
        assert_eq!(normalize_fullwidth_digits("abc"), "abc");
    }

    #[test]
    fn large_numbers_expand_with_euphonics() {
        assert_eq!(convert_large_numbers("5000万"), "ごせんまん");
        assert_eq!(convert_large_numbers("3億"), "さんおく");
        assert_eq!(convert_large_numbers("1000万"), "いっせんまん");
        assert_eq!(convert_large_numbers("300万"), "さんびゃくまん");
        assert_eq!(convert_large_numbers("8000万"), "はっせんまん");
        assert_eq!(convert_large_numbers("21万"), "にじゅういちまん");
        assert_eq!(convert_large_numbers("1兆"), "いちちょう");
    }

    #[test]
    fn bare_numbers_are_untouched() {
        assert_eq!(convert_large_numbers("10"), "10");
        assert_eq!(convert_large_numbers("貯金は300です"), "貯金は300です");
    }

    #[test]
    fn dict_is_longest_match_first() {
        // "1000万" and "100万" overlap; the longer key must win in place.
        let out = apply_reading_dict("1000万と100万");
        assert_eq!(out, "いっせんまんとひゃくまん");
    }

    #[test]
    fn short_key_does_not_corrupt_compounds() {
        // "金" only appears inside longer dictionary keys; 金持ち must not
        // decay into 金 + もち.
        assert_eq!(apply_reading_dict("金持ちの親の金"), "かねもちのおやのかね");
    }

    #[test]
    fn slang_w_is_stripped() {
        assert_eq!(apply_reading_dict("無理やろwww"), "無理やろ");
    }

    #[test]
    fn particle_rewrite_requires_exact_noun() {
        assert_eq!(convert_particle_ha("貯金は増えた"), "ちょきんわ増えた");
        // 「犬は」 is not in the table; no generic rule may fire.
        assert_eq!(convert_particle_ha("犬は寝てる"), "犬は寝てる");
    }

    #[test]
    fn full_pipeline_order() {
        // Full-width digits must normalize before expansion, and the
        // expansion must run before the dictionary.
        assert_eq!(convert_for_voice("５０００万"), "ごせんまん");
        assert_eq!(convert_for_voice("俺は貯金した"), "おれわちょきんした");
    }
}
