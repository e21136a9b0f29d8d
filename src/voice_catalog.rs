use crate::error::ApiError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// 組み込みの音声カタログのエントリ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownVoice {
    pub voice_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub best_for: &'static str,
}

/// 動作確認済みの音声
pub const KNOWN_VOICES: [KnownVoice; 6] = [
    KnownVoice {
        voice_id: "XB0fDUnXU5powFXDhCwa",
        name: "Charlotte",
        description: "Clear, warm female voice",
        best_for: "Intro segments, clear pronunciation of Korean words",
    },
    KnownVoice {
        voice_id: "EXAVITQu4vr4xnSDxMaL",
        name: "Sarah",
        description: "Young, energetic female voice",
        best_for: "Top songs, energetic segments",
    },
    KnownVoice {
        voice_id: "cgSgspJ2msm6clMCkdW9",
        name: "Jessica",
        description: "Personal, heartfelt female voice",
        best_for: "Fan mail, emotional content",
    },
    KnownVoice {
        voice_id: "FGY2WhTYpPnrIDTdsKH5",
        name: "Laura",
        description: "Professional female voice",
        best_for: "News, announcements",
    },
    KnownVoice {
        voice_id: "Xb7hH8MSUJpSbSDYk0k2",
        name: "Alice",
        description: "Friendly female voice",
        best_for: "Casual conversation",
    },
    KnownVoice {
        voice_id: "pFZP5JQG7iQjIQuC4Bku",
        name: "Lily",
        description: "Sweet female voice",
        best_for: "Gentle segments",
    },
];

/// 音声IDから名前を引く
pub fn known_voice_name(voice_id: &str) -> Option<&'static str> {
    KNOWN_VOICES
        .iter()
        .find(|voice| voice.voice_id == voice_id)
        .map(|voice| voice.name)
}

/// 不正な音声IDを指定されたときに表示する候補一覧
pub fn known_voice_list() -> String {
    KNOWN_VOICES
        .iter()
        .map(|voice| format!("{} ({})", voice.voice_id, voice.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ElevenLabs の音声情報
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceInfo>,
}

/// カテゴリ別に整理する（premade / cloned / professional / generated）
///
/// 不明なカテゴリは generated に入れる。
pub fn group_by_category(voices: Vec<VoiceInfo>) -> BTreeMap<String, Vec<VoiceInfo>> {
    let mut grouped: BTreeMap<String, Vec<VoiceInfo>> = BTreeMap::new();
    for voice in voices {
        let category = match voice.category.as_deref().map(str::to_lowercase) {
            Some(c) if matches!(c.as_str(), "premade" | "cloned" | "professional") => c,
            _ => "generated".to_string(),
        };
        grouped.entry(category).or_default().push(voice);
    }
    grouped
}

/// ElevenLabs の音声一覧APIクライアント
pub struct VoiceCatalog {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl VoiceCatalog {
    pub fn new(base_url: &str, api_key: String, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("ElevenLabs API HTTPクライアント作成失敗")?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key,
            client,
        })
    }

    /// アカウントで利用可能な音声を取得
    pub async fn fetch(&self) -> Result<Vec<VoiceInfo>, ApiError> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let voices: VoicesResponse = response.json().await?;
        Ok(voices.voices)
    }
}

/// 音声一覧を標準出力に表示
///
/// APIから取得できなかった場合も組み込みカタログは表示する。
pub fn print_voices(fetched: Result<Vec<VoiceInfo>>) {
    if let Err(e) = &fetched {
        log::error!("音声一覧の取得に失敗: {:#}", e);
    }
    print!("{}", render_voices(fetched.ok()));
}

/// 一覧の表示内容を組み立てる
///
/// `fetched` が `None` の場合は組み込みの推奨音声だけになる。
pub fn render_voices(fetched: Option<Vec<VoiceInfo>>) -> String {
    let mut out = String::new();
    if let Some(voices) = fetched {
        let total = voices.len();
        for (category, voices) in group_by_category(voices) {
            out.push_str(&format!("\n{} VOICES ({}):\n", category.to_uppercase(), voices.len()));
            out.push_str(&format!("{}\n", "-".repeat(40)));
            for voice in voices {
                out.push_str(&format!("{}\n   ID: {}\n", voice.name, voice.voice_id));
                if let Some(description) = voice.description.filter(|d| !d.is_empty()) {
                    out.push_str(&format!("   Description: {}\n", description));
                }
            }
        }
        out.push_str(&format!("\n合計 {} 音声\n", total));
    }

    out.push_str("\n=== K-pop ラジオ推奨音声 ===\n");
    for voice in KNOWN_VOICES {
        out.push_str(&format!("{} ({})\n", voice.name, voice.voice_id));
        out.push_str(&format!("   {} - {}\n", voice.description, voice.best_for));
    }
    out
}
