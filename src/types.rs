use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 番組を構成するセグメント名
///
/// 固定の小さな集合。設定ファイルやファイル名では snake_case で表記する。
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SegmentName {
    /// オープニング挨拶
    Intro,
    /// 今日のトップ3ソング
    TopSongs,
    /// ファンメール紹介
    FanMail,
    /// エンディング
    Outro,
    /// ニュース・お知らせ
    News,
}

impl SegmentName {
    /// 標準の番組構成（この順序で結合される）
    pub const SHOW_ORDER: [SegmentName; 3] =
        [SegmentName::Intro, SegmentName::TopSongs, SegmentName::FanMail];

    pub const ALL: [SegmentName; 5] = [
        SegmentName::Intro,
        SegmentName::TopSongs,
        SegmentName::FanMail,
        SegmentName::Outro,
        SegmentName::News,
    ];

    /// ファイル名・設定キーとして使う文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentName::Intro => "intro",
            SegmentName::TopSongs => "top_songs",
            SegmentName::FanMail => "fan_mail",
            SegmentName::Outro => "outro",
            SegmentName::News => "news",
        }
    }

    /// プレイリスト表示用のタイトル ("top_songs" → "Top Songs")
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("不明なセグメント名: {}", s))
    }
}

/// 番組台本の1セグメント
///
/// Script Source が生成し、以降は変更されない。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub name: SegmentName,
    pub text: String,
}

/// 台本の言語
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// 英語のみ
    English,
    /// 韓国語中心（ローマ字表記）
    Korean,
    /// 韓国語と英語のミックス
    Mixed,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::English => "english",
            Language::Korean => "korean",
            Language::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// 台本に混ぜる韓国語フレーズの頻度
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhraseLevel {
    Low,
    Medium,
    High,
}

/// 拍手の強さ
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Light,
    Medium,
    Heavy,
}

impl Intensity {
    /// 強さごとの音量補正 (dB)
    pub fn gain_db(&self) -> f32 {
        match self {
            Intensity::Light => -30.0,
            Intensity::Medium => -20.0,
            Intensity::Heavy => -10.0,
        }
    }
}

/// BGMのスタイル
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MusicStyle {
    Upbeat,
    Chill,
    Emotional,
}

/// 効果音の配置位置
///
/// `Start`/`End`/`Both` は番組の前後に連結し、`At` は指定オフセットに重ねる。
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Start,
    End,
    Both,
    /// 番組先頭からのオフセット (ミリ秒)
    At(u64),
}

/// モノラル16bit PCMバッファ
///
/// # Examples
///
/// ```
/// # use radio_show::types::PcmBuffer;
/// let silence = PcmBuffer::silence(500, 44100);
/// assert_eq!(silence.samples.len(), 22050);
/// assert_eq!(silence.duration_ms(), 500);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcmBuffer {
    /// PCM音声サンプルの配列
    pub samples: Vec<SampleI16>,

    /// サンプリングレート (Hz)
    pub sample_rate: u32,
}

impl PcmBuffer {
    /// 指定時間の無音を生成
    pub fn silence(duration_ms: u64, sample_rate: u32) -> Self {
        Self {
            samples: vec![0; ms_to_samples(duration_ms, sample_rate)],
            sample_rate,
        }
    }

    /// 長さ（ミリ秒）
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// 後ろに連結
    pub fn append(&mut self, other: &PcmBuffer) {
        self.samples.extend_from_slice(&other.samples);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// ミリ秒をサンプル数に変換
pub fn ms_to_samples(duration_ms: u64, sample_rate: u32) -> usize {
    (duration_ms * sample_rate as u64 / 1000) as usize
}

/// セグメント毎の音声ファイル
///
/// Voice Source が1セグメントにつき1つ生成し、Assembler が消費する。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioClip {
    pub segment: SegmentName,
    pub path: PathBuf,
    pub byte_len: u64,
}

/// 最終出力
///
/// 結合済み音声ファイル、または結合できなかった場合のプレイリスト。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShowOutput {
    /// 結合済みWAVファイル
    Combined { path: PathBuf, duration_ms: u64 },

    /// セグメントを順番に並べたM3Uプレイリスト
    Playlist { path: PathBuf, entries: Vec<PathBuf> },
}

impl ShowOutput {
    pub fn path(&self) -> &PathBuf {
        match self {
            ShowOutput::Combined { path, .. } => path,
            ShowOutput::Playlist { path, .. } => path,
        }
    }
}

/// 処理結果
///
/// 成功・代替・致命的失敗のどの経路を通ったかを呼び出し側で判定できる。
///
/// # Examples
///
/// ```
/// # use radio_show::types::Outcome;
/// let outcome: Outcome<String> = Outcome::Fallback {
///     value: "固定テキスト".to_string(),
///     reason: "API エラー".to_string(),
/// };
/// assert!(outcome.is_fallback());
/// assert_eq!(outcome.into_value(), Some("固定テキスト".to_string()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// 正常に生成できた
    Success(T),

    /// 失敗したが代替値で回復した
    Fallback { value: T, reason: String },

    /// 回復できない失敗
    Fatal(String),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) | Outcome::Fallback { value, .. } => Some(value),
            Outcome::Fatal(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Success(value) | Outcome::Fallback { value, .. } => Some(value),
            Outcome::Fatal(_) => None,
        }
    }
}
