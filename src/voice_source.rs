use crate::config::TtsConfig;
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::types::{AudioClip, Outcome, PcmBuffer, Segment, SegmentName};
use crate::voice_catalog;
use crate::wav_io;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 音声合成バックエンドの共通トレイト
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// テキストを音声バイト列に変換
    ///
    /// 返すバイト列の形式は [`ClipFormat`] に従う。
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ApiError>;
}

/// 保存する音声ファイルの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// 生PCM (16bit LE モノラル)。WAVにして保存する
    Pcm { sample_rate: u32 },
    /// MP3。そのまま保存する
    Mp3,
}

impl ClipFormat {
    /// ElevenLabs の `output_format` 文字列から判定
    ///
    /// # Examples
    ///
    /// ```
    /// # use radio_show::voice_source::ClipFormat;
    /// assert_eq!(
    ///     ClipFormat::from_output_format("pcm_44100").unwrap(),
    ///     ClipFormat::Pcm { sample_rate: 44100 }
    /// );
    /// assert_eq!(ClipFormat::from_output_format("mp3_44100_128").unwrap(), ClipFormat::Mp3);
    /// assert!(ClipFormat::from_output_format("ulaw_8000").is_err());
    /// ```
    pub fn from_output_format(output_format: &str) -> Result<Self> {
        if let Some(rate) = output_format.strip_prefix("pcm_") {
            let sample_rate = rate
                .parse::<u32>()
                .with_context(|| format!("不正な output_format: {}", output_format))?;
            Ok(ClipFormat::Pcm { sample_rate })
        } else if output_format.starts_with("mp3_") {
            Ok(ClipFormat::Mp3)
        } else {
            anyhow::bail!("未対応の output_format: {}", output_format)
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Pcm { .. } => "wav",
            ClipFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs Text-to-Speech API バックエンド
pub struct ElevenLabsBackend {
    config: TtsConfig,
    api_key: String,
    client: reqwest::Client,
}

impl ElevenLabsBackend {
    pub fn new(config: TtsConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("ElevenLabs API HTTPクライアント作成失敗")?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

/// エラーレスポンスが音声IDの誤りを示しているか
fn is_invalid_voice(status: u16, body: &str) -> bool {
    status == 404 || (matches!(status, 400 | 422) && body.to_lowercase().contains("voice"))
}

#[async_trait]
impl VoiceBackend for ElevenLabsBackend {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ApiError> {
        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
                style: self.config.style,
                use_speaker_boost: self.config.use_speaker_boost,
            },
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.config.base_url, voice_id))
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            if is_invalid_voice(status, &body) {
                return Err(ApiError::InvalidVoice {
                    voice_id: voice_id.to_string(),
                });
            }
            return Err(ApiError::Status { status, body });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ApiError::InvalidResponse("音声データが空です".to_string()));
        }
        Ok(audio.to_vec())
    }
}

/// Voice Source
///
/// セグメントごとに音声を合成し、`<audio_dir>/<segment>_<timestamp>.<ext>` に保存する。
/// 失敗した場合は以前の実行で生成した同じセグメントの音声で代替し、
/// それもなければそのセグメントは省略する（[`Outcome::Fatal`]）。
pub struct VoiceSource {
    backend: Box<dyn VoiceBackend>,
    audio_dir: PathBuf,
    format: ClipFormat,
    retry: RetryPolicy,
}

impl VoiceSource {
    pub fn new<P: AsRef<Path>>(
        backend: Box<dyn VoiceBackend>,
        audio_dir: P,
        format: ClipFormat,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            audio_dir: audio_dir.as_ref().to_path_buf(),
            format,
            retry,
        }
    }

    /// セグメントを音声化してファイルに保存
    pub async fn voice(&self, segment: &Segment, voice_id: &str, timestamp: &str) -> Outcome<AudioClip> {
        let label = format!("音声合成 {} (voice {})", segment.name, voice_id);
        log::info!("{} を開始", label);

        let result = self
            .retry
            .run(&label, || self.backend.synthesize(&segment.text, voice_id))
            .await;

        let reason = match result {
            Ok(bytes) => match self.persist(segment.name, &bytes, timestamp) {
                Ok(clip) => {
                    log::info!("音声ファイル保存: {:?} ({} バイト)", clip.path, clip.byte_len);
                    return Outcome::Success(clip);
                }
                Err(e) => format!("音声ファイルの保存に失敗: {:#}", e),
            },
            Err(ApiError::InvalidVoice { voice_id }) => {
                log::error!(
                    "不正な音声ID '{}' ({})。利用可能な音声: {}",
                    voice_id,
                    segment.name,
                    voice_catalog::known_voice_list()
                );
                format!("不正な音声ID: {}", voice_id)
            }
            Err(e) => e.to_string(),
        };

        log::error!("{} に失敗: {}", label, reason);
        match self.find_cached_clip(segment.name, timestamp) {
            Some(clip) => {
                log::warn!("以前に生成した音声で代替します: {:?}", clip.path);
                Outcome::Fallback {
                    value: clip,
                    reason,
                }
            }
            None => {
                log::warn!("セグメント {} を省略します", segment.name);
                Outcome::Fatal(reason)
            }
        }
    }

    fn persist(&self, name: SegmentName, bytes: &[u8], timestamp: &str) -> Result<AudioClip> {
        fs::create_dir_all(&self.audio_dir)
            .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", self.audio_dir))?;
        let path =
            wav_io::timestamped_path(&self.audio_dir, name.as_str(), timestamp, self.format.extension());

        match self.format {
            ClipFormat::Pcm { sample_rate } => {
                let pcm = PcmBuffer {
                    samples: wav_io::pcm_bytes_to_samples(bytes),
                    sample_rate,
                };
                wav_io::write_wav(&path, &pcm)?;
            }
            ClipFormat::Mp3 => {
                fs::write(&path, bytes)
                    .with_context(|| format!("音声ファイルの書き込みに失敗: {:?}", path))?;
            }
        }

        let byte_len = fs::metadata(&path)
            .with_context(|| format!("音声ファイルの情報取得に失敗: {:?}", path))?
            .len();
        Ok(AudioClip {
            segment: name,
            path,
            byte_len,
        })
    }

    /// 以前の実行で生成された同じセグメントの最新ファイルを探す
    ///
    /// 今回のタイムスタンプのファイルは対象外。
    pub fn find_cached_clip(&self, name: SegmentName, current_timestamp: &str) -> Option<AudioClip> {
        let prefix = format!("{}_", name.as_str());
        let suffix = format!(".{}", self.format.extension());

        let entries = fs::read_dir(&self.audio_dir).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let stamp = file_name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
                if !is_timestamp(stamp) || stamp == current_timestamp {
                    return None;
                }
                let byte_len = entry.metadata().ok()?.len();
                if byte_len == 0 {
                    return None;
                }
                Some((stamp.to_string(), entry.path(), byte_len))
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, path, byte_len)| AudioClip {
                segment: name,
                path,
                byte_len,
            })
    }
}

/// `YYYYmmdd_HHMMSS` 形式か
fn is_timestamp(s: &str) -> bool {
    s.len() == 15
        && s.char_indices().all(|(i, c)| {
            if i == 8 {
                c == '_'
            } else {
                c.is_ascii_digit()
            }
        })
}
