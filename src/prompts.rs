//! 台本生成用のプロンプトと、API失敗時の固定テキスト

use crate::types::{Language, PhraseLevel, SegmentName};

const ENGLISH_SYSTEM: &str = "You are a professional K-pop radio show script writer.";
const MIXED_SYSTEM: &str =
    "You are a Korean-American K-pop radio script writer who naturally mixes Korean and English.";

/// 1セグメント分のプロンプト
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub system: &'static str,
    pub user: String,
    pub max_tokens: u32,
}

/// 言語ごとの台本スタイル
///
/// korean と mixed は同じ韓国語・英語ミックスの台本を使う。
fn is_mixed(language: Language) -> bool {
    matches!(language, Language::Korean | Language::Mixed)
}

/// 頻度レベルごとの韓国語フレーズ（ローマ字）
pub fn korean_phrases(level: PhraseLevel) -> &'static [&'static str] {
    match level {
        PhraseLevel::Low => &["annyeonghaseyo", "gomawo", "saranghae"],
        PhraseLevel::Medium => &[
            "annyeonghaseyo",
            "gomawo",
            "saranghae",
            "jinjja",
            "daebak",
            "yeoreobun",
            "jjang",
        ],
        PhraseLevel::High => &[
            "annyeonghaseyo",
            "gomawo",
            "saranghae",
            "jinjja",
            "daebak",
            "yeoreobun",
            "jjang",
            "neo-mu joha",
            "choegoui",
            "jeongmal",
            "gamsahamnida",
            "chingu",
            "omo",
            "wah",
        ],
    }
}

fn segment_brief(segment: SegmentName, mixed: bool) -> (&'static str, &'static str, u32) {
    // (内容, 長さの目安, max_tokens)
    match (segment, mixed) {
        (SegmentName::Intro, false) => (
            "You are a cheerful K-pop radio show host. Generate a warm, energetic greeting and show introduction.\n\
             Include:\n\
             - Enthusiastic welcome to listeners\n\
             - Introduction of yourself as the host\n\
             - Brief mention of what's coming up on today's show",
            "Keep it upbeat, authentic to K-pop culture, and about 20-25 seconds when read aloud (50-65 words).",
            150,
        ),
        (SegmentName::Intro, true) => (
            "You are a Korean-American K-pop radio host. Generate a warm, energetic greeting and show introduction that naturally mixes Korean and English.\n\
             Include:\n\
             - Start with \"Annyeonghaseyo!\" (Hello in Korean)\n\
             - Mix Korean expressions naturally with English\n\
             - Introduce yourself with a Korean name\n\
             - Mention what's coming up on today's show",
            "Keep it authentic, upbeat, and about 20-25 seconds when read aloud (50-65 words).",
            150,
        ),
        (SegmentName::TopSongs, false) => (
            "You are a K-pop radio host presenting today's top 3 songs.\n\
             Include:\n\
             - Exciting introduction to the top songs segment\n\
             - 3 realistic K-pop song titles with artist names (make them up but sound authentic)\n\
             - Brief enthusiastic comments about each song\n\
             - Transition to playing the first song",
            "Keep it energetic and about 30-35 seconds when read aloud (75-90 words).",
            200,
        ),
        (SegmentName::TopSongs, true) => (
            "You are a Korean-American K-pop radio host presenting today's top 3 songs with natural Korean-English mixing.\n\
             Include:\n\
             - 3 realistic K-pop song titles with artist names (make them authentic sounding)\n\
             - Korean exclamations like \"wah!\", \"omo!\", \"jjang!\" (the best)\n\
             - Mix Korean and English naturally when describing the songs\n\
             - End with excitement about playing music",
            "Keep it energetic and about 30-35 seconds when read aloud (75-90 words).",
            200,
        ),
        (SegmentName::FanMail, false) => (
            "You are a K-pop radio host reading fan mail.\n\
             Include:\n\
             - Warm introduction to the fan mail segment\n\
             - 1-2 fictional fan messages with names and locations\n\
             - Heartfelt responses to the fans\n\
             - Encouragement for more listeners to send messages",
            "Keep it warm, personal, and about 25-30 seconds when read aloud (65-80 words).",
            180,
        ),
        (SegmentName::FanMail, true) => (
            "You are a Korean-American K-pop radio host reading fan mail with natural Korean-English mixing.\n\
             Include:\n\
             - Korean endearments like \"saranghae\" (I love you), \"gomawo\" (thank you), \"chingu\" (friend)\n\
             - 1-2 fictional fan messages with Korean and English names\n\
             - Heartfelt responses mixing both languages\n\
             - Encourage more messages using Korean terms",
            "Keep it warm, personal, and about 25-30 seconds when read aloud (65-80 words).",
            180,
        ),
        (SegmentName::Outro, false) => (
            "You are a K-pop radio host closing today's show.\n\
             Include:\n\
             - Thanks to the listeners\n\
             - A quick recap of the show\n\
             - A cheerful sign-off and invitation to tune in next time",
            "Keep it warm and about 15-20 seconds when read aloud (40-55 words).",
            130,
        ),
        (SegmentName::Outro, true) => (
            "You are a Korean-American K-pop radio host closing today's show, mixing Korean and English naturally.\n\
             Include:\n\
             - Thanks to the listeners using Korean expressions\n\
             - A quick recap of the show\n\
             - A cheerful Korean-English sign-off",
            "Keep it warm and about 15-20 seconds when read aloud (40-55 words).",
            130,
        ),
        (SegmentName::News, false) => (
            "You are a K-pop radio announcer reading short entertainment news.\n\
             Include:\n\
             - Two brief fictional K-pop news items (comebacks, tours, awards)\n\
             - A professional, clear delivery",
            "Keep it concise, about 20-25 seconds when read aloud (50-65 words).",
            150,
        ),
        (SegmentName::News, true) => (
            "You are a Korean-American K-pop radio announcer reading short entertainment news with light Korean-English mixing.\n\
             Include:\n\
             - Two brief fictional K-pop news items (comebacks, tours, awards)\n\
             - A professional, clear delivery with a few Korean expressions",
            "Keep it concise, about 20-25 seconds when read aloud (50-65 words).",
            150,
        ),
    }
}

/// セグメントのプロンプトを組み立てる
///
/// `phrases` が指定された場合（korean/mixed のみ）、使うべき韓国語フレーズを列挙する。
pub fn build_prompt(
    segment: SegmentName,
    language: Language,
    phrases: Option<PhraseLevel>,
) -> PromptSpec {
    let mixed = is_mixed(language);
    let (body, length, max_tokens) = segment_brief(segment, mixed);

    let mut user = format!("{}\n\n{}\n", body, length);
    if mixed {
        user.push_str("Write Korean words in romanized form that English speakers can pronounce.\n");
        if let Some(level) = phrases {
            user.push_str(&format!(
                "Use some of these Korean expressions: {}.\n",
                korean_phrases(level).join(", ")
            ));
        }
    }
    user.push_str("Format as clean script without stage directions.");

    PromptSpec {
        system: if mixed { MIXED_SYSTEM } else { ENGLISH_SYSTEM },
        user,
        max_tokens,
    }
}

/// API失敗時に使う固定テキスト
///
/// 同じ (セグメント, 言語) に対して常に同じ文字列を返す。
pub fn fallback_text(segment: SegmentName, language: Language) -> &'static str {
    match (segment, is_mixed(language)) {
        (SegmentName::Intro, false) => {
            "Hello beautiful listeners! Welcome back to K-pop Vibes Radio! I'm your host Luna, and I'm so excited to be here with you today! We've got an amazing show lined up with the hottest tracks and your lovely messages!"
        }
        (SegmentName::Intro, true) => {
            "Annyeonghaseyo, yeoreobun! Hello beautiful listeners! I'm your host Minji, and welcome to K-pop Vibes Radio! Jinjja excited to be here with you today! We've got some daebak music and your lovely messages coming up!"
        }
        (SegmentName::TopSongs, false) => {
            "Now it's time for today's hottest tracks! Our top three songs are climbing the charts right now. At number three, we have 'Starlight Dreams' by Luna Eclipse - this track is absolutely magical! Number two goes to 'Electric Heart' by Neon Pulse, and our number one hit today is 'Midnight Dance' by Crystal Wave! Let's start with our chart-topper!"
        }
        (SegmentName::TopSongs, true) => {
            "Jigeum! Now it's time for today's choegoui hits! Wah, these songs are jinjja daebak! At number three, we have 'Neon Dreams' by STELLAR - omo, this track is neo-mu joha! Number two is 'Heartbeat Seoul' by NOVA, and our number one hit today is 'Moonlight Dance' by AURORA! Jjang! Let's listen together!"
        }
        (SegmentName::FanMail, false) => {
            "Time for our fan mail of the day! Sarah from Seoul writes: 'Your show brightens my day and helps me discover amazing new music!' Thank you so much, Sarah! And Minho from Busan says: 'Keep spreading the K-pop love!' Your messages mean the world to us! Keep them coming, beautiful listeners!"
        }
        (SegmentName::FanMail, true) => {
            "Fan mail time! Soo-jin from LA writes: 'Saranghae your show! It helps me connect with my Korean roots!' Jeongmal gomawo, Soo-jin! And Tyler from New York says: 'Your music choices are jjang!' Gamsahamnida, chingu! Your messages make my heart so full. Keep sending them, yeoreobun!"
        }
        (SegmentName::Outro, false) => {
            "That's all for today's show! Thank you so much for spending time with us on K-pop Vibes Radio. Keep streaming your favorite songs, keep sending your messages, and we'll see you next time!"
        }
        (SegmentName::Outro, true) => {
            "Wah, time flies, yeoreobun! Jeongmal gomawo for listening to K-pop Vibes Radio today. Keep the music playing and keep sending your love. Saranghae, and annyeong until next time!"
        }
        (SegmentName::News, false) => {
            "Here's your K-pop news update! Crystal Wave just announced a world tour starting next spring, and Neon Pulse took home their first music show win this week. Congratulations to both groups!"
        }
        (SegmentName::News, true) => {
            "K-pop news time, yeoreobun! Crystal Wave just announced a world tour starting next spring, daebak! And Neon Pulse took home their first music show win this week. Chukahae to both groups!"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_prompt_has_no_korean_hint() {
        let prompt = build_prompt(SegmentName::Intro, Language::English, Some(PhraseLevel::High));
        assert_eq!(prompt.system, ENGLISH_SYSTEM);
        assert!(!prompt.user.contains("romanized"));
        assert!(prompt.user.contains("50-65 words"));
        assert_eq!(prompt.max_tokens, 150);
    }

    #[test]
    fn test_mixed_prompt_lists_phrases() {
        let prompt = build_prompt(SegmentName::FanMail, Language::Mixed, Some(PhraseLevel::Low));
        assert_eq!(prompt.system, MIXED_SYSTEM);
        assert!(prompt.user.contains("annyeonghaseyo, gomawo, saranghae"));
        assert!(!prompt.user.contains("gamsahamnida,"));
    }

    #[test]
    fn test_korean_and_mixed_share_fallbacks() {
        for segment in SegmentName::ALL {
            assert_eq!(
                fallback_text(segment, Language::Korean),
                fallback_text(segment, Language::Mixed)
            );
            assert_ne!(
                fallback_text(segment, Language::English),
                fallback_text(segment, Language::Mixed)
            );
        }
    }

    #[test]
    fn test_phrase_levels_grow() {
        assert!(korean_phrases(PhraseLevel::Low).len() < korean_phrases(PhraseLevel::Medium).len());
        assert!(korean_phrases(PhraseLevel::Medium).len() < korean_phrases(PhraseLevel::High).len());
    }
}
