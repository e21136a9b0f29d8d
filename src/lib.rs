//! radio-show - K-pop ラジオ番組の自動生成ツール
//!
//! このクレートは、LLM API で番組台本を生成し、音声合成 API で読み上げ音声を作成して、
//! 1本の番組音声ファイルに結合するシステムを提供します。
//!
//! # 主な機能
//!
//! - **台本生成**: OpenAI Chat Completions API でセグメントごとの台本を生成（失敗時は固定テキスト）
//! - **音声合成**: ElevenLabs API でセグメントを読み上げ（失敗時は以前の音声で代替、なければ省略）
//! - **音声割り当て**: 役割（DJ・ファン・ゲスト・アナウンサー）ごとの音声をプリセットとコマンドラインで切り替え
//! - **結合**: セグメント間に無音を挟んで WAV に結合（結合できない場合は M3U プレイリスト）
//! - **効果音**: ジングル・拍手・BGM を合成して番組に追加（オプション）
//!
//! # アーキテクチャ
//!
//! ```text
//! [ScriptSource] → [VoiceSource (×セグメント)] → [Assembler] → [Effects] → [WAV File]
//!       │                  │    ↑                     │
//!       ↓                  │ [VoiceMap]               ↓
//!  [固定テキスト]           ↓                       [M3U Playlist]
//!                    [以前の音声 / 省略]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use radio_show::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("radio_show.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("radio_show.toml").unwrap();
//! ```

pub mod assembler;
pub mod config;
pub mod effects;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod script_source;
pub mod types;
pub mod voice_catalog;
pub mod voice_map;
pub mod voice_source;
pub mod wav_io;
