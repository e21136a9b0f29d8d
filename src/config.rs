use crate::types::{Intensity, Language, MusicStyle, PhraseLevel, Placement, SegmentName};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub show: ShowConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub effects: EffectsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// 番組構成
///
/// `segments` の順に台本・音声を生成し、結合する。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShowConfig {
    #[serde(default = "default_segments")]
    pub segments: Vec<SegmentName>,
}

/// 台本生成 (OpenAI Chat Completions API) 設定
///
/// # デフォルト値
///
/// - `base_url`: "https://api.openai.com/v1"
/// - `model`: "gpt-3.5-turbo"
/// - `temperature`: 0.8
/// - `timeout_seconds`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 音声合成 (ElevenLabs API) 設定
///
/// # デフォルト値
///
/// - `base_url`: "https://api.elevenlabs.io/v1"
/// - `model_id`: "eleven_monolingual_v1"
/// - `output_format`: "pcm_44100" (WAVとして保存、結合可能)
/// - `stability`: 0.5
/// - `similarity_boost`: 0.8
/// - `style`: 0.2
/// - `use_speaker_boost`: true
/// - `timeout_seconds`: 30 秒
///
/// # 出力形式
///
/// - `pcm_44100`: 16bit モノラル PCM。WAVファイルとして保存する
/// - `mp3_44100_128`: MP3のまま保存する（結合できないためプレイリスト出力になる）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default = "default_tts_model_id")]
    pub model_id: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_style")]
    pub style: f32,
    #[serde(default = "default_true")]
    pub use_speaker_boost: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 言語設定
///
/// # デフォルト値
///
/// - `default_language`: mixed
/// - `include_korean_phrases`: true
/// - `korean_phrase_frequency`: medium
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanguageConfig {
    #[serde(default = "default_language")]
    pub default_language: Language,
    #[serde(default = "default_true")]
    pub include_korean_phrases: bool,
    #[serde(default = "default_phrase_level")]
    pub korean_phrase_frequency: PhraseLevel,
}

/// 音声割り当て設定
///
/// `roles` は役割 → 音声ID、`segments` はセグメント → 役割。
/// キーは文字列で記述し、読み込み時に検証する。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoicesConfig {
    #[serde(default = "default_role_voices")]
    pub roles: BTreeMap<String, String>,
    #[serde(default = "default_segment_roles")]
    pub segments: BTreeMap<String, String>,
}

/// オーディオ設定
///
/// # デフォルト値
///
/// - `sample_rate`: 44100 Hz
/// - `silence_ms`: 500 ms (セグメント間の無音)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,
}

/// 効果音設定
///
/// # デフォルト値
///
/// - `enabled`: true
/// - `jingle`: true (前後に配置、-10 dB)
/// - `applause`: true (末尾に配置、medium、-15 dB)
/// - `background_music`: false (upbeat、-25 dB)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub jingle: bool,
    #[serde(default = "default_true")]
    pub applause: bool,
    #[serde(default)]
    pub background_music: bool,
    #[serde(default = "default_jingle_position")]
    pub jingle_position: Placement,
    #[serde(default = "default_applause_position")]
    pub applause_position: Placement,
    #[serde(default = "default_intensity")]
    pub applause_intensity: Intensity,
    #[serde(default = "default_music_style")]
    pub background_style: MusicStyle,
    #[serde(default = "default_jingle_duration_ms")]
    pub jingle_duration_ms: u64,
    #[serde(default = "default_applause_duration_ms")]
    pub applause_duration_ms: u64,
    #[serde(default = "default_jingle_volume_db")]
    pub jingle_volume_db: f32,
    #[serde(default = "default_applause_volume_db")]
    pub applause_volume_db: f32,
    #[serde(default = "default_background_volume_db")]
    pub background_volume_db: f32,
    /// ノイズ生成の乱数シード（省略時はランダム）
    pub seed: Option<u64>,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `audio_dir`: "assets/audio"
/// - `sfx_dir`: "assets/sfx"
/// - `final_filename`: "idol_radio_show_with_sfx.wav"
/// - `include_timestamp`: true
/// - `show_name`: "K-pop Vibes Radio"
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
    #[serde(default = "default_sfx_dir")]
    pub sfx_dir: String,
    #[serde(default = "default_final_filename")]
    pub final_filename: String,
    #[serde(default = "default_true")]
    pub include_timestamp: bool,
    #[serde(default = "default_show_name")]
    pub show_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// 外部API共通の再試行設定
///
/// # デフォルト値
///
/// - `max_attempts`: 2 (一時的エラーのみ1回再試行)
/// - `backoff_ms`: 500 ms
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

// Default functions
fn default_segments() -> Vec<SegmentName> {
    SegmentName::SHOW_ORDER.to_vec()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_tts_model_id() -> String {
    "eleven_monolingual_v1".to_string()
}

fn default_output_format() -> String {
    "pcm_44100".to_string()
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity_boost() -> f32 {
    0.8
}

fn default_style() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_language() -> Language {
    Language::Mixed
}

fn default_phrase_level() -> PhraseLevel {
    PhraseLevel::Medium
}

fn default_role_voices() -> BTreeMap<String, String> {
    [
        ("dj", "XB0fDUnXU5powFXDhCwa"),        // Charlotte
        ("fan", "cgSgspJ2msm6clMCkdW9"),       // Jessica
        ("guest", "EXAVITQu4vr4xnSDxMaL"),     // Sarah
        ("announcer", "FGY2WhTYpPnrIDTdsKH5"), // Laura
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_segment_roles() -> BTreeMap<String, String> {
    [
        ("intro", "dj"),
        ("top_songs", "guest"),
        ("fan_mail", "fan"),
        ("outro", "dj"),
        ("news", "announcer"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_sample_rate() -> u32 {
    44100 // ElevenLabs pcm_44100 と一致させる
}

fn default_silence_ms() -> u64 {
    500
}

fn default_jingle_position() -> Placement {
    Placement::Both
}

fn default_applause_position() -> Placement {
    Placement::End
}

fn default_intensity() -> Intensity {
    Intensity::Medium
}

fn default_music_style() -> MusicStyle {
    MusicStyle::Upbeat
}

fn default_jingle_duration_ms() -> u64 {
    3000
}

fn default_applause_duration_ms() -> u64 {
    5000
}

fn default_jingle_volume_db() -> f32 {
    -10.0
}

fn default_applause_volume_db() -> f32 {
    -15.0
}

fn default_background_volume_db() -> f32 {
    -25.0
}

fn default_audio_dir() -> String {
    "assets/audio".to_string()
}

fn default_sfx_dir() -> String {
    "assets/sfx".to_string()
}

fn default_final_filename() -> String {
    "idol_radio_show_with_sfx.wav".to_string()
}

fn default_show_name() -> String {
    "K-pop Vibes Radio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show: ShowConfig::default(),
            script: ScriptConfig::default(),
            tts: TtsConfig::default(),
            language: LanguageConfig::default(),
            voices: VoicesConfig::default(),
            audio: AudioConfig::default(),
            effects: EffectsConfig::default(),
            output: OutputConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            segments: default_segments(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_elevenlabs_base_url(),
            model_id: default_tts_model_id(),
            output_format: default_output_format(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            style: default_style(),
            use_speaker_boost: true,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            include_korean_phrases: true,
            korean_phrase_frequency: default_phrase_level(),
        }
    }
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            roles: default_role_voices(),
            segments: default_segment_roles(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            silence_ms: default_silence_ms(),
        }
    }
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jingle: true,
            applause: true,
            background_music: false,
            jingle_position: default_jingle_position(),
            applause_position: default_applause_position(),
            applause_intensity: default_intensity(),
            background_style: default_music_style(),
            jingle_duration_ms: default_jingle_duration_ms(),
            applause_duration_ms: default_applause_duration_ms(),
            jingle_volume_db: default_jingle_volume_db(),
            applause_volume_db: default_applause_volume_db(),
            background_volume_db: default_background_volume_db(),
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            sfx_dir: default_sfx_dir(),
            final_filename: default_final_filename(),
            include_timestamp: true,
            show_name: default_show_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl EffectsConfig {
    /// 有効な効果音が1つでもあるか
    pub fn any_enabled(&self) -> bool {
        self.enabled && (self.jingle || self.applause || self.background_music)
    }

    /// すべての効果音を個別に切り替え
    pub fn set_toggles(&mut self, jingle: bool, applause: bool, background_music: bool) {
        self.jingle = jingle;
        self.applause = applause;
        self.background_music = background_music;
    }
}

impl OutputConfig {
    /// 最終出力ファイルのパス
    ///
    /// `include_timestamp` が有効な場合は `<stem>_<YYYYmmdd_HHMMSS>.wav` になる。
    /// パス区切りを含むファイル名はそのまま使う。
    pub fn final_output_path(&self, timestamp: &str) -> PathBuf {
        let requested = Path::new(&self.final_filename);
        let stem = requested
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "radio_show".to_string());
        let filename = if self.include_timestamp {
            format!("{}_{}.wav", stem, timestamp)
        } else {
            format!("{}.wav", stem)
        };

        match requested.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(filename),
            _ => Path::new(&self.audio_dir).join(filename),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use radio_show::config::Config;
    /// Config::write_default("radio_show.toml").unwrap();
    /// ```
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }

    /// 出力ディレクトリを作成
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.output.audio_dir, &self.output.sfx_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", dir))?;
            log::debug!("ディレクトリ確認: {}", dir);
        }
        Ok(())
    }
}
