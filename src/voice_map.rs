use crate::config::{Config, VoicesConfig};
use crate::types::{Language, PhraseLevel, SegmentName};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// どの設定にも音声IDがない場合の最終的なデフォルト (Charlotte)
pub const DEFAULT_VOICE_ID: &str = "XB0fDUnXU5powFXDhCwa";

/// 番組内の話者の役割
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// メインDJ・司会
    Dj,
    /// ファンメール読み上げ
    Fan,
    /// ゲスト・元気なコーナー
    Guest,
    /// アナウンス
    Announcer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Dj, Role::Fan, Role::Guest, Role::Announcer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Dj => "dj",
            Role::Fan => "fan",
            Role::Guest => "guest",
            Role::Announcer => "announcer",
        }
    }

    /// セグメントの標準の役割
    pub fn default_for(segment: SegmentName) -> Role {
        match segment {
            SegmentName::Intro | SegmentName::Outro => Role::Dj,
            SegmentName::TopSongs => Role::Guest,
            SegmentName::FanMail => Role::Fan,
            SegmentName::News => Role::Announcer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("不明な役割: {}", s))
    }
}

/// セグメント名 → 音声ID の対応表
///
/// 1回の番組生成中は変更されない値として各コンポーネントに渡す。
///
/// # Examples
///
/// ```
/// # use radio_show::voice_map::{Role, VoiceMap};
/// # use radio_show::types::SegmentName;
/// let map = VoiceMap::builtin().with_override(Role::Fan, "my-fan-voice");
/// assert_eq!(map.voice_for(SegmentName::FanMail), "my-fan-voice");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceMap {
    roles: BTreeMap<Role, String>,
    segments: BTreeMap<SegmentName, Role>,
    default_voice: String,
}

impl VoiceMap {
    /// 組み込みの割り当て
    pub fn builtin() -> Self {
        Self::from_config(&VoicesConfig::default())
    }

    /// 設定ファイルから構築
    ///
    /// 不明な役割名・セグメント名、空の音声IDは警告を出して無視する。
    pub fn from_config(config: &VoicesConfig) -> Self {
        let mut roles = BTreeMap::new();
        for (key, voice_id) in &config.roles {
            match key.parse::<Role>() {
                Ok(role) if !voice_id.trim().is_empty() => {
                    roles.insert(role, voice_id.trim().to_string());
                }
                Ok(role) => log::warn!("役割 {} の音声IDが空です。無視します", role),
                Err(e) => log::warn!("{}", e),
            }
        }

        let mut segments: BTreeMap<SegmentName, Role> = SegmentName::ALL
            .iter()
            .map(|&segment| (segment, Role::default_for(segment)))
            .collect();
        for (key, role) in &config.segments {
            match (key.parse::<SegmentName>(), role.parse::<Role>()) {
                (Ok(segment), Ok(role)) => {
                    segments.insert(segment, role);
                }
                (Err(e), _) | (_, Err(e)) => log::warn!("音声割り当ての設定を無視: {}", e),
            }
        }

        let default_voice = roles
            .get(&Role::Dj)
            .cloned()
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

        Self {
            roles,
            segments,
            default_voice,
        }
    }

    /// 役割の音声IDを上書き（空文字列は無視）
    pub fn with_override(mut self, role: Role, voice_id: &str) -> Self {
        self.set_role(role, voice_id);
        self
    }

    fn set_role(&mut self, role: Role, voice_id: &str) {
        let voice_id = voice_id.trim();
        if voice_id.is_empty() {
            log::warn!("役割 {} の上書き音声IDが空です。無視します", role);
            return;
        }
        log::info!("役割 {} の音声を {} に変更", role, voice_id);
        self.roles.insert(role, voice_id.to_string());
        if role == Role::Dj {
            self.default_voice = voice_id.to_string();
        }
    }

    /// 役割の音声ID（未設定ならデフォルト）
    pub fn voice_for_role(&self, role: Role) -> &str {
        self.roles
            .get(&role)
            .map(String::as_str)
            .unwrap_or(&self.default_voice)
    }

    /// セグメントの音声ID
    ///
    /// 空文字列を返すことはない。
    pub fn voice_for(&self, segment: SegmentName) -> &str {
        let role = self
            .segments
            .get(&segment)
            .copied()
            .unwrap_or(Role::Dj);
        self.voice_for_role(role)
    }

    /// セグメント名の文字列から音声IDを引く（不明な名前はデフォルト）
    pub fn voice_for_name(&self, name: &str) -> &str {
        match name.parse::<SegmentName>() {
            Ok(segment) => self.voice_for(segment),
            Err(_) => &self.default_voice,
        }
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }
}

/// 名前付きプリセット
///
/// 言語・フレーズ設定・音声割り当て・効果音の組み合わせ。
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Preset {
    KoreanFocus,
    EnglishFocus,
    FullProduction,
    MinimalProduction,
}

/// プリセットの中身
#[derive(Clone, Debug, Default)]
pub struct PresetBundle {
    pub language: Option<Language>,
    pub korean_phrases: Option<bool>,
    pub korean_frequency: Option<PhraseLevel>,
    /// 指定された場合、対応表全体を置き換える
    pub voices: Option<BTreeMap<Role, String>>,
    /// (jingle, applause, background_music)
    pub effects: Option<(bool, bool, bool)>,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::KoreanFocus,
        Preset::EnglishFocus,
        Preset::FullProduction,
        Preset::MinimalProduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::KoreanFocus => "korean_focus",
            Preset::EnglishFocus => "english_focus",
            Preset::FullProduction => "full_production",
            Preset::MinimalProduction => "minimal_production",
        }
    }

    pub fn bundle(&self) -> PresetBundle {
        let voices = |dj: &str| {
            let mut map = BTreeMap::new();
            map.insert(Role::Dj, dj.to_string());
            map.insert(Role::Fan, "cgSgspJ2msm6clMCkdW9".to_string()); // Jessica
            map.insert(Role::Guest, "EXAVITQu4vr4xnSDxMaL".to_string()); // Sarah
            map.insert(Role::Announcer, "FGY2WhTYpPnrIDTdsKH5".to_string()); // Laura
            map
        };

        match self {
            Preset::KoreanFocus => PresetBundle {
                language: Some(Language::Mixed),
                korean_phrases: Some(true),
                korean_frequency: Some(PhraseLevel::High),
                voices: Some(voices("XB0fDUnXU5powFXDhCwa")), // Charlotte
                effects: None,
            },
            Preset::EnglishFocus => PresetBundle {
                language: Some(Language::English),
                korean_phrases: Some(false),
                korean_frequency: Some(PhraseLevel::Low),
                voices: Some(voices("FGY2WhTYpPnrIDTdsKH5")), // Laura
                effects: None,
            },
            Preset::FullProduction => PresetBundle {
                effects: Some((true, true, true)),
                ..PresetBundle::default()
            },
            Preset::MinimalProduction => PresetBundle {
                effects: Some((false, false, false)),
                ..PresetBundle::default()
            },
        }
    }

    /// プリセットを設定と音声対応表に適用
    pub fn apply(&self, config: &mut Config, voices: VoiceMap) -> VoiceMap {
        log::info!("プリセットを適用: {}", self.as_str());
        let bundle = self.bundle();

        if let Some(language) = bundle.language {
            config.language.default_language = language;
        }
        if let Some(enabled) = bundle.korean_phrases {
            config.language.include_korean_phrases = enabled;
        }
        if let Some(level) = bundle.korean_frequency {
            config.language.korean_phrase_frequency = level;
        }
        if let Some((jingle, applause, background)) = bundle.effects {
            config.effects.set_toggles(jingle, applause, background);
        }

        match bundle.voices {
            Some(roles) => {
                let default_voice = roles
                    .get(&Role::Dj)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());
                VoiceMap {
                    roles,
                    segments: voices.segments,
                    default_voice,
                }
            }
            None => voices,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// コマンドラインからの音声上書き
#[derive(Clone, Debug, Default)]
pub struct VoiceOverrides {
    pub dj: Option<String>,
    pub fan: Option<String>,
    pub guest: Option<String>,
    pub announcer: Option<String>,
}

impl VoiceOverrides {
    /// 上書きを適用（プリセットより優先される）
    pub fn apply(&self, mut voices: VoiceMap) -> VoiceMap {
        let pairs = [
            (Role::Dj, &self.dj),
            (Role::Fan, &self.fan),
            (Role::Guest, &self.guest),
            (Role::Announcer, &self.announcer),
        ];
        for (role, voice_id) in pairs {
            if let Some(voice_id) = voice_id {
                voices.set_role(role, voice_id);
            }
        }
        voices
    }
}

/// 設定・プリセット・コマンドライン上書きから1回分の音声対応表を組み立てる
///
/// 優先順位: コマンドライン > プリセット > 設定ファイル
pub fn resolve_voice_map(
    config: &mut Config,
    preset: Option<Preset>,
    overrides: &VoiceOverrides,
) -> VoiceMap {
    let mut voices = VoiceMap::from_config(&config.voices);
    if let Some(preset) = preset {
        voices = preset.apply(config, voices);
    }
    overrides.apply(voices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let map = VoiceMap::builtin();
        assert_eq!(map.voice_for(SegmentName::Intro), "XB0fDUnXU5powFXDhCwa");
        assert_eq!(map.voice_for(SegmentName::TopSongs), "EXAVITQu4vr4xnSDxMaL");
        assert_eq!(map.voice_for(SegmentName::FanMail), "cgSgspJ2msm6clMCkdW9");
        assert_eq!(map.voice_for(SegmentName::News), "FGY2WhTYpPnrIDTdsKH5");
    }

    #[test]
    fn test_unknown_name_returns_default() {
        let map = VoiceMap::builtin();
        assert_eq!(map.voice_for_name("weather"), DEFAULT_VOICE_ID);
        assert_eq!(map.voice_for_name("fan_mail"), "cgSgspJ2msm6clMCkdW9");
    }

    #[test]
    fn test_lookup_never_empty() {
        // 役割が一切設定されていなくても空文字列にはならない
        let config = VoicesConfig {
            roles: BTreeMap::from([("dj".to_string(), "   ".to_string())]),
            segments: BTreeMap::new(),
        };
        let map = VoiceMap::from_config(&config);
        for segment in SegmentName::ALL {
            assert!(!map.voice_for(segment).is_empty());
        }
        assert_eq!(map.default_voice(), DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_segment_role_remap() {
        let mut config = VoicesConfig::default();
        config
            .segments
            .insert("top_songs".to_string(), "announcer".to_string());
        config.segments.insert("bogus".to_string(), "dj".to_string());
        let map = VoiceMap::from_config(&config);
        assert_eq!(map.voice_for(SegmentName::TopSongs), "FGY2WhTYpPnrIDTdsKH5");
    }

    #[test]
    fn test_empty_override_ignored() {
        let map = VoiceMap::builtin().with_override(Role::Guest, "");
        assert_eq!(map.voice_for(SegmentName::TopSongs), "EXAVITQu4vr4xnSDxMaL");
    }

    #[test]
    fn test_preset_replaces_whole_map() {
        let mut config = Config::default();
        let custom = VoiceMap::builtin().with_override(Role::Fan, "custom-fan");
        let map = Preset::EnglishFocus.apply(&mut config, custom);

        assert_eq!(map.voice_for(SegmentName::Intro), "FGY2WhTYpPnrIDTdsKH5");
        // プリセットが対応表全体を置き換えるので custom-fan は残らない
        assert_eq!(map.voice_for(SegmentName::FanMail), "cgSgspJ2msm6clMCkdW9");
        assert_eq!(config.language.default_language, Language::English);
        assert!(!config.language.include_korean_phrases);
    }

    #[test]
    fn test_effects_preset_keeps_voices() {
        let mut config = Config::default();
        let map = Preset::MinimalProduction.apply(&mut config, VoiceMap::builtin());
        assert_eq!(map, VoiceMap::builtin());
        assert!(!config.effects.any_enabled());

        let _ = Preset::FullProduction.apply(&mut config, map);
        assert!(config.effects.background_music);
    }

    #[test]
    fn test_cli_overrides_beat_preset() {
        let mut config = Config::default();
        let overrides = VoiceOverrides {
            dj: Some("cli-dj".to_string()),
            ..VoiceOverrides::default()
        };
        let map = resolve_voice_map(&mut config, Some(Preset::KoreanFocus), &overrides);

        assert_eq!(map.voice_for(SegmentName::Intro), "cli-dj");
        assert_eq!(map.voice_for_name("unknown"), "cli-dj");
        assert_eq!(map.voice_for(SegmentName::TopSongs), "EXAVITQu4vr4xnSDxMaL");
        assert_eq!(config.language.korean_phrase_frequency, PhraseLevel::High);
    }
}
