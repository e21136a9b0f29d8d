use crate::assembler::{Assembler, AudioCodec, WavCodec};
use crate::config::{Config, EffectsConfig, OutputConfig};
use crate::effects::{self, EffectSource, ProceduralEffects};
use crate::retry::RetryPolicy;
use crate::script_source::{OpenAiBackend, ScriptBackend, ScriptSource};
use crate::types::{AudioClip, Outcome, SegmentName, ShowOutput};
use crate::voice_catalog;
use crate::voice_map::VoiceMap;
use crate::voice_source::{ClipFormat, ElevenLabsBackend, VoiceBackend, VoiceSource};
use crate::wav_io;
use anyhow::Result;
use std::path::PathBuf;

/// API の認証情報
#[derive(Debug, Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub eleven_api_key: String,
}

const OPENAI_PLACEHOLDER: &str = "your_openai_api_key_here";
const ELEVEN_PLACEHOLDER: &str = "your_elevenlabs_api_key_here";

/// 空・サンプル値のままのキーは未設定として扱う
fn usable_key(value: Option<String>, placeholder: &str) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != placeholder)
}

impl Credentials {
    /// 環境変数から読み込み
    ///
    /// 未設定・空・サンプル値のままのキーはエラー。
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("ELEVEN_API_KEY").ok(),
        )
    }

    /// 音声一覧の取得用に ElevenLabs のキーだけ読み込む
    pub fn eleven_from_env() -> Result<String> {
        usable_key(std::env::var("ELEVEN_API_KEY").ok(), ELEVEN_PLACEHOLDER)
            .ok_or_else(|| anyhow::anyhow!("APIキーが設定されていません: ELEVEN_API_KEY"))
    }

    pub fn from_values(openai: Option<String>, eleven: Option<String>) -> Result<Self> {
        let openai_api_key = usable_key(openai, OPENAI_PLACEHOLDER);
        let eleven_api_key = usable_key(eleven, ELEVEN_PLACEHOLDER);

        match (openai_api_key, eleven_api_key) {
            (Some(openai_api_key), Some(eleven_api_key)) => Ok(Self {
                openai_api_key,
                eleven_api_key,
            }),
            (openai, eleven) => {
                let missing: Vec<&str> = [
                    openai.is_none().then_some("OPENAI_API_KEY"),
                    eleven.is_none().then_some("ELEVEN_API_KEY"),
                ]
                .into_iter()
                .flatten()
                .collect();
                anyhow::bail!(
                    "APIキーが設定されていません: {} (.env ファイルまたは環境変数で設定してください)",
                    missing.join(", ")
                )
            }
        }
    }
}

/// 各ステップの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Fallback(String),
    Failed(String),
}

impl<T> From<&Outcome<T>> for StepStatus {
    fn from(outcome: &Outcome<T>) -> Self {
        match outcome {
            Outcome::Success(_) => StepStatus::Success,
            Outcome::Fallback { reason, .. } => StepStatus::Fallback(reason.clone()),
            Outcome::Fatal(reason) => StepStatus::Failed(reason.clone()),
        }
    }
}

impl StepStatus {
    fn label(&self) -> &'static str {
        match self {
            StepStatus::Success => "OK",
            StepStatus::Fallback(_) => "代替",
            StepStatus::Failed(_) => "失敗",
        }
    }
}

/// セグメントごとの結果
#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub name: SegmentName,
    pub voice_id: String,
    pub script: StepStatus,
    /// 読み上げた台本（代替テキストを含む）
    pub text: Option<String>,
    pub voice: StepStatus,
}

/// 1回の番組生成の結果
#[derive(Debug)]
pub struct RunReport {
    pub timestamp: String,
    pub segments: Vec<SegmentReport>,
    /// 結合に使ったクリップ（番組順）
    pub clips: Vec<AudioClip>,
    /// 効果音を適用しようとした場合のみ `Some`
    pub effects: Option<StepStatus>,
    pub output: Outcome<ShowOutput>,
}

impl RunReport {
    /// 結果の概要を標準出力に表示
    pub fn print_summary(&self) {
        println!("\n=== 番組生成結果 ({}) ===", self.timestamp);
        for segment in &self.segments {
            let voice_name = voice_catalog::known_voice_name(&segment.voice_id).unwrap_or("custom");
            println!(
                "{:<10} 台本: {:<4} 音声: {:<4} ({} / {})",
                segment.name.as_str(),
                segment.script.label(),
                segment.voice.label(),
                voice_name,
                segment.voice_id
            );
            if let Some(text) = &segment.text {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    println!("    {}", line.trim());
                }
            }
        }
        if let Some(effects) = &self.effects {
            println!("効果音: {}", effects.label());
        }

        match &self.output {
            Outcome::Success(ShowOutput::Combined { path, duration_ms }) => {
                println!("出力: {} ({:.1}秒)", path.display(), *duration_ms as f64 / 1000.0);
            }
            Outcome::Success(ShowOutput::Playlist { path, .. }) => {
                println!("出力: {}", path.display());
            }
            Outcome::Fallback { value, reason } => {
                println!("出力 (プレイリスト): {}", value.path().display());
                println!("   理由: {}", reason);
            }
            Outcome::Fatal(reason) => {
                println!("番組を出力できませんでした: {}", reason);
            }
        }
    }
}

/// 台本生成 → 音声合成 → 結合 → 効果音 の一連の処理
pub struct ShowPipeline {
    scripts: ScriptSource,
    voices: VoiceSource,
    voice_map: VoiceMap,
    assembler: Assembler,
    effect_source: Option<Box<dyn EffectSource>>,
    effects: EffectsConfig,
    segments: Vec<SegmentName>,
    audio_dir: PathBuf,
    sfx_dir: PathBuf,
    output: OutputConfig,
}

impl ShowPipeline {
    /// 任意のバックエンドで組み立てる
    ///
    /// `effect_source` が `None` の場合は効果音を適用しない。
    pub fn new(
        config: &Config,
        voice_map: VoiceMap,
        script_backend: Box<dyn ScriptBackend>,
        voice_backend: Box<dyn VoiceBackend>,
        codec: Box<dyn AudioCodec>,
        effect_source: Option<Box<dyn EffectSource>>,
    ) -> Result<Self> {
        let retry = RetryPolicy::new(&config.retry);
        let format = ClipFormat::from_output_format(&config.tts.output_format)?;
        match format {
            ClipFormat::Mp3 => {
                log::warn!("MP3 出力は結合できないため、プレイリストで出力されます");
            }
            ClipFormat::Pcm { sample_rate } if sample_rate != config.audio.sample_rate => {
                log::warn!(
                    "output_format のサンプリングレート ({} Hz) が audio.sample_rate ({} Hz) と異なるため、結合できずプレイリストで出力されます",
                    sample_rate,
                    config.audio.sample_rate
                );
            }
            ClipFormat::Pcm { .. } => {}
        }

        Ok(Self {
            scripts: ScriptSource::new(script_backend, &config.language, retry),
            voices: VoiceSource::new(voice_backend, &config.output.audio_dir, format, retry),
            voice_map,
            assembler: Assembler::new(
                codec,
                config.audio.sample_rate,
                config.audio.silence_ms,
                &config.output.show_name,
            ),
            effect_source,
            effects: config.effects.clone(),
            segments: config.show.segments.clone(),
            audio_dir: PathBuf::from(&config.output.audio_dir),
            sfx_dir: PathBuf::from(&config.output.sfx_dir),
            output: config.output.clone(),
        })
    }

    /// OpenAI / ElevenLabs / WAV / 合成効果音 で組み立てる
    pub fn from_config(config: &Config, voice_map: VoiceMap, credentials: &Credentials) -> Result<Self> {
        let script_backend =
            OpenAiBackend::new(config.script.clone(), credentials.openai_api_key.clone())?;
        let voice_backend =
            ElevenLabsBackend::new(config.tts.clone(), credentials.eleven_api_key.clone())?;
        let effect_source: Option<Box<dyn EffectSource>> = if config.effects.any_enabled() {
            Some(Box::new(ProceduralEffects::new(config.effects.seed)))
        } else {
            None
        };

        Self::new(
            config,
            voice_map,
            Box::new(script_backend),
            Box::new(voice_backend),
            Box::new(WavCodec),
            effect_source,
        )
    }

    /// 最終出力ファイルのパス
    pub fn output_path(&self, timestamp: &str) -> PathBuf {
        self.output.final_output_path(timestamp)
    }

    /// 結合できない場合のプレイリストのパス
    pub fn playlist_path(&self, timestamp: &str) -> PathBuf {
        wav_io::timestamped_path(&self.audio_dir, "radio_show", timestamp, "m3u")
    }

    /// 番組を1本生成する
    ///
    /// 台本・音声・効果音の失敗はすべて代替または省略で処理を継続する。
    pub async fn run(&self, timestamp: &str) -> RunReport {
        log::info!(
            "番組生成を開始: {} (言語: {}, セグメント: {})",
            self.output.show_name,
            self.scripts.language(),
            self.segments
                .iter()
                .map(SegmentName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut reports = Vec::with_capacity(self.segments.len());
        let mut clips = Vec::with_capacity(self.segments.len());

        for &name in &self.segments {
            let script = self.scripts.generate(name).await;
            let script_status = StepStatus::from(&script);
            let voice_id = self.voice_map.voice_for(name).to_string();

            let Some(segment) = script.into_value() else {
                reports.push(SegmentReport {
                    name,
                    voice_id,
                    script: script_status,
                    text: None,
                    voice: StepStatus::Failed("台本がありません".to_string()),
                });
                continue;
            };

            log::info!("[{}] {}", name.title(), segment.text);

            let voice = self.voices.voice(&segment, &voice_id, timestamp).await;
            reports.push(SegmentReport {
                name,
                voice_id,
                script: script_status,
                text: Some(segment.text),
                voice: StepStatus::from(&voice),
            });
            if let Some(clip) = voice.into_value() {
                clips.push(clip);
            }
        }

        clips.sort_by_key(|clip| self.position(clip.segment));
        let output = self.assemble(&clips, timestamp);

        RunReport {
            timestamp: timestamp.to_string(),
            segments: reports,
            clips,
            effects: output.1,
            output: output.0,
        }
    }

    fn position(&self, name: SegmentName) -> usize {
        self.segments
            .iter()
            .position(|&s| s == name)
            .unwrap_or(usize::MAX)
    }

    fn assemble(&self, clips: &[AudioClip], timestamp: &str) -> (Outcome<ShowOutput>, Option<StepStatus>) {
        let output_path = self.output_path(timestamp);
        let playlist_path = self.playlist_path(timestamp);
        let mut effects_status = None;

        let output = match self.effect_source.as_deref() {
            Some(source) if self.effects.any_enabled() => {
                self.assembler
                    .assemble_with(clips, &output_path, &playlist_path, |show| {
                        let outcome = effects::apply_effects(
                            &show,
                            &self.effects,
                            source,
                            &self.sfx_dir,
                            timestamp,
                        );
                        effects_status = Some(StepStatus::from(&outcome));
                        outcome.into_value().unwrap_or(show)
                    })
            }
            _ => self.assembler.assemble(clips, &output_path, &playlist_path),
        };

        (output, effects_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::prompts::PromptSpec;
    use crate::types::ms_to_samples;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoScript;

    /// 常に 429 を返すLLM
    struct RateLimited;

    #[async_trait]
    impl ScriptBackend for RateLimited {
        async fn complete(&self, _prompt: &PromptSpec) -> Result<String, ApiError> {
            Err(ApiError::Status {
                status: 429,
                body: "rate limited".to_string(),
            })
        }
    }

    #[async_trait]
    impl ScriptBackend for EchoScript {
        async fn complete(&self, prompt: &PromptSpec) -> Result<String, ApiError> {
            Ok(format!("script ({})", prompt.max_tokens))
        }
    }

    /// 2秒の無音を返し、使われた音声IDを記録する
    #[derive(Default)]
    struct RecordingVoice {
        used: Mutex<Vec<String>>,
        fail_voice: Option<String>,
    }

    #[async_trait]
    impl VoiceBackend for std::sync::Arc<RecordingVoice> {
        async fn synthesize(&self, _text: &str, voice_id: &str) -> Result<Vec<u8>, ApiError> {
            self.used.lock().unwrap().push(voice_id.to_string());
            if self.fail_voice.as_deref() == Some(voice_id) {
                return Err(ApiError::InvalidVoice {
                    voice_id: voice_id.to_string(),
                });
            }
            Ok(vec![0u8; ms_to_samples(2000, 8000) * 2])
        }
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.tts.output_format = "pcm_8000".to_string();
        config.audio.sample_rate = 8000;
        config.output.audio_dir = dir.join("audio").to_string_lossy().into_owned();
        config.output.sfx_dir = dir.join("sfx").to_string_lossy().into_owned();
        config.retry.backoff_ms = 0;
        config.effects.enabled = false;
        config
    }

    #[test]
    fn test_credentials() {
        assert!(Credentials::from_values(Some("sk-1".into()), Some("el-1".into())).is_ok());

        let err = Credentials::from_values(Some(OPENAI_PLACEHOLDER.into()), Some("el".into()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("OPENAI_API_KEY"));
        assert!(!err.contains("ELEVEN_API_KEY"));

        let err = Credentials::from_values(None, Some("  ".into()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("OPENAI_API_KEY, ELEVEN_API_KEY"));
    }

    #[tokio::test]
    async fn test_run_combines_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        let voice = std::sync::Arc::new(RecordingVoice::default());

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::from_config(&config.voices),
            Box::new(EchoScript),
            Box::new(voice.clone()),
            Box::new(WavCodec),
            None,
        )
        .unwrap();

        let report = pipeline.run("20250101_120000").await;
        match &report.output {
            Outcome::Success(ShowOutput::Combined { path, duration_ms }) => {
                assert_eq!(*duration_ms, 7000);
                assert_eq!(*path, pipeline.output_path("20250101_120000"));
            }
            other => panic!("combined output expected, got {:?}", other),
        }

        let order: Vec<SegmentName> = report.clips.iter().map(|c| c.segment).collect();
        assert_eq!(order, SegmentName::SHOW_ORDER.to_vec());
        assert_eq!(
            *voice.used.lock().unwrap(),
            vec![
                "XB0fDUnXU5powFXDhCwa".to_string(),
                "EXAVITQu4vr4xnSDxMaL".to_string(),
                "cgSgspJ2msm6clMCkdW9".to_string(),
            ]
        );
        assert!(report.effects.is_none());
    }

    #[tokio::test]
    async fn test_report_keeps_script_text() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(EchoScript),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            None,
        )
        .unwrap();
        let report = pipeline.run("20250101_120000").await;
        assert!(report
            .segments
            .iter()
            .all(|s| s.text.as_deref().is_some_and(|t| t.starts_with("script ("))));

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(RateLimited),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            None,
        )
        .unwrap();
        let report = pipeline.run("20250101_130000").await;
        for segment in &report.segments {
            assert!(matches!(segment.script, StepStatus::Fallback(_)));
            assert_eq!(
                segment.text.as_deref(),
                Some(crate::prompts::fallback_text(segment.name, config.language.default_language))
            );
        }
    }

    #[tokio::test]
    async fn test_output_name_matching_a_clip_keeps_the_clip() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.output.final_filename = "intro.wav".to_string();

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(EchoScript),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            None,
        )
        .unwrap();
        let report = pipeline.run("20250101_120000").await;

        let intro = &report.clips[0];
        assert_eq!(intro.path, pipeline.output_path("20250101_120000"));
        assert_eq!(wav_io::read_wav(&intro.path).unwrap().duration_ms(), 2000);
        match &report.output {
            Outcome::Success(ShowOutput::Combined { path, duration_ms }) => {
                assert_ne!(*path, intro.path);
                assert_eq!(*duration_ms, 7000);
            }
            other => panic!("combined output expected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_voice_omits_only_that_segment() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        let voice = std::sync::Arc::new(RecordingVoice {
            fail_voice: Some("EXAVITQu4vr4xnSDxMaL".to_string()),
            ..RecordingVoice::default()
        });

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::from_config(&config.voices),
            Box::new(EchoScript),
            Box::new(voice.clone()),
            Box::new(WavCodec),
            None,
        )
        .unwrap();

        let report = pipeline.run("20250101_120000").await;
        assert!(matches!(report.segments[1].voice, StepStatus::Failed(_)));
        assert_eq!(report.clips.len(), 2);
        match report.output {
            Outcome::Success(ShowOutput::Combined { duration_ms, .. }) => {
                assert_eq!(duration_ms, 2000 + 500 + 2000)
            }
            other => panic!("combined output expected, got {:?}", other),
        }
        // 恒久的エラーは再試行しない
        assert_eq!(voice.used.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_effects_are_applied_before_export() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.effects.enabled = true;
        config.effects.set_toggles(true, false, false);
        config.effects.jingle_position = crate::types::Placement::Start;
        config.effects.jingle_duration_ms = 1000;

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(EchoScript),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            Some(Box::new(ProceduralEffects::default())),
        )
        .unwrap();

        let report = pipeline.run("20250101_120000").await;
        assert_eq!(report.effects, Some(StepStatus::Success));
        let written = wav_io::read_wav(report.output.value().unwrap().path()).unwrap();
        assert_eq!(written.duration_ms(), 1000 + 7000);
        assert!(Path::new(&config.output.sfx_dir)
            .join("jingle_20250101_120000.wav")
            .exists());
    }

    #[tokio::test]
    async fn test_mp3_output_uses_playlist() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.tts.output_format = "mp3_44100_128".to_string();

        let pipeline = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(EchoScript),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            None,
        )
        .unwrap();

        let report = pipeline.run("20250101_120000").await;
        match report.output {
            Outcome::Fallback {
                value: ShowOutput::Playlist { path, entries },
                ..
            } => {
                assert_eq!(path, pipeline.playlist_path("20250101_120000"));
                assert_eq!(entries.len(), 3);
            }
            other => panic!("playlist expected, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_output_format_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.tts.output_format = "ulaw_8000".to_string();

        let result = ShowPipeline::new(
            &config,
            VoiceMap::builtin(),
            Box::new(EchoScript),
            Box::new(std::sync::Arc::new(RecordingVoice::default())),
            Box::new(WavCodec),
            None,
        );
        assert!(result.is_err());
    }
}
