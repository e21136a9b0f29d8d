//! モックのバックエンドで番組生成全体を通すテスト

use async_trait::async_trait;
use radio_show::assembler::WavCodec;
use radio_show::config::Config;
use radio_show::error::ApiError;
use radio_show::pipeline::{ShowPipeline, StepStatus};
use radio_show::prompts::PromptSpec;
use radio_show::script_source::ScriptBackend;
use radio_show::types::{ms_to_samples, Outcome, SegmentName, ShowOutput};
use radio_show::voice_map::{self, Role, VoiceOverrides};
use radio_show::voice_source::VoiceBackend;
use radio_show::wav_io;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 44100;

struct CannedScript;

#[async_trait]
impl ScriptBackend for CannedScript {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, ApiError> {
        Ok(format!("{} / {}", prompt.system, prompt.max_tokens))
    }
}

/// 失敗し続けるLLM
struct QuotaExceeded;

#[async_trait]
impl ScriptBackend for QuotaExceeded {
    async fn complete(&self, _prompt: &PromptSpec) -> Result<String, ApiError> {
        Err(ApiError::Status {
            status: 429,
            body: "insufficient_quota".to_string(),
        })
    }
}

/// 2秒の無音PCMを返し、(テキスト, 音声ID) を記録する
#[derive(Clone, Default)]
struct SilentVoice {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl VoiceBackend for SilentVoice {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        Ok(vec![0u8; ms_to_samples(2000, SAMPLE_RATE) * 2])
    }
}

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.audio_dir = dir.path().join("audio").to_string_lossy().into_owned();
    config.output.sfx_dir = dir.path().join("sfx").to_string_lossy().into_owned();
    config.effects.enabled = false;
    config.retry.backoff_ms = 0;
    config
}

#[tokio::test]
async fn three_segments_make_a_seven_second_show() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_in(&temp_dir);
    config.ensure_directories().unwrap();

    let overrides = VoiceOverrides {
        dj: Some("voice-dj".to_string()),
        fan: Some("voice-fan".to_string()),
        guest: Some("voice-guest".to_string()),
        announcer: None,
    };
    let voices = voice_map::resolve_voice_map(&mut config, None, &overrides);
    assert_eq!(voices.voice_for_role(Role::Dj), "voice-dj");

    let backend = SilentVoice::default();
    let pipeline = ShowPipeline::new(
        &config,
        voices,
        Box::new(CannedScript),
        Box::new(backend.clone()),
        Box::new(WavCodec),
        None,
    )
    .unwrap();

    let report = pipeline.run("20250101_120000").await;

    let path = match &report.output {
        Outcome::Success(ShowOutput::Combined { path, duration_ms }) => {
            assert_eq!(*duration_ms, 3 * 2000 + 2 * 500);
            path.clone()
        }
        other => panic!("combined output expected, got {:?}", other),
    };
    assert_eq!(wav_io::read_wav(&path).unwrap().duration_ms(), 7000);
    assert!(path
        .to_string_lossy()
        .ends_with("idol_radio_show_with_sfx_20250101_120000.wav"));

    // 各セグメントに別々の音声が使われる
    let calls = backend.calls.lock().unwrap();
    let used: Vec<&str> = calls.iter().map(|(_, voice)| voice.as_str()).collect();
    assert_eq!(used, vec!["voice-dj", "voice-guest", "voice-fan"]);
    assert_eq!(used.iter().collect::<HashSet<_>>().len(), 3);

    for segment in SegmentName::SHOW_ORDER {
        let clip = wav_io::timestamped_path(&config.output.audio_dir, segment.as_str(), "20250101_120000", "wav");
        assert!(clip.exists(), "{:?} missing", clip);
    }
    assert!(report
        .segments
        .iter()
        .all(|s| s.script == StepStatus::Success && s.voice == StepStatus::Success));
}

#[tokio::test]
async fn script_failures_still_produce_a_show() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);
    let backend = SilentVoice::default();

    let pipeline = ShowPipeline::new(
        &config,
        voice_map::VoiceMap::builtin(),
        Box::new(QuotaExceeded),
        Box::new(backend.clone()),
        Box::new(WavCodec),
        None,
    )
    .unwrap();

    let report = pipeline.run("20250101_120000").await;
    assert!(report
        .segments
        .iter()
        .all(|s| matches!(s.script, StepStatus::Fallback(_))));
    assert!(report.output.is_success());

    // 代替テキストがそのまま読み上げられる
    let calls = backend.calls.lock().unwrap();
    assert_eq!(
        calls[0].0,
        radio_show::prompts::fallback_text(SegmentName::Intro, config.language.default_language)
    );
}

#[tokio::test]
async fn voice_failure_reuses_previous_run() {
    struct Offline;

    #[async_trait]
    impl VoiceBackend for Offline {
        async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<Vec<u8>, ApiError> {
            Err(ApiError::Network("connection refused".to_string()))
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);

    // 1回目: 正常に生成
    let first = ShowPipeline::new(
        &config,
        voice_map::VoiceMap::builtin(),
        Box::new(CannedScript),
        Box::new(SilentVoice::default()),
        Box::new(WavCodec),
        None,
    )
    .unwrap();
    assert!(first.run("20250101_120000").await.output.is_success());

    // 2回目: 音声合成がすべて失敗しても前回の音声で番組ができる
    let second = ShowPipeline::new(
        &config,
        voice_map::VoiceMap::builtin(),
        Box::new(CannedScript),
        Box::new(Offline),
        Box::new(WavCodec),
        None,
    )
    .unwrap();
    let report = second.run("20250102_090000").await;
    assert!(report
        .segments
        .iter()
        .all(|s| matches!(s.voice, StepStatus::Fallback(_))));
    match report.output {
        Outcome::Success(ShowOutput::Combined { duration_ms, .. }) => assert_eq!(duration_ms, 7000),
        other => panic!("combined output expected, got {:?}", other),
    }
}
