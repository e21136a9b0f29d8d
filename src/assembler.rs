use crate::error::CodecError;
use crate::types::{AudioClip, Outcome, PcmBuffer, ShowOutput};
use crate::wav_io;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 音声ファイルの読み書きを行うコーデック
pub trait AudioCodec: Send + Sync {
    /// ファイルを読み込んでPCMに展開
    fn decode(&self, path: &Path) -> Result<PcmBuffer, CodecError>;

    /// PCMをファイルに書き出し
    fn encode(&self, path: &Path, pcm: &PcmBuffer) -> Result<(), CodecError>;
}

/// 16bit モノラル WAV 専用のコーデック
///
/// `.wav` 以外の拡張子は [`CodecError::Unavailable`] を返す。
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

fn is_wav(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

impl AudioCodec for WavCodec {
    fn decode(&self, path: &Path) -> Result<PcmBuffer, CodecError> {
        if !is_wav(path) {
            return Err(CodecError::Unavailable(format!("{:?}", path)));
        }
        wav_io::read_wav(path)
    }

    fn encode(&self, path: &Path, pcm: &PcmBuffer) -> Result<(), CodecError> {
        if !is_wav(path) {
            return Err(CodecError::Unavailable(format!("{:?}", path)));
        }
        wav_io::write_wav(path, pcm).map_err(|e| CodecError::Unavailable(format!("{:#}", e)))
    }
}

/// Assembler
///
/// セグメントの音声を無音を挟んで1本に結合する。
/// 結合できない場合は M3U プレイリストで代替する。
pub struct Assembler {
    codec: Box<dyn AudioCodec>,
    sample_rate: u32,
    silence_ms: u64,
    show_name: String,
}

impl Assembler {
    pub fn new(codec: Box<dyn AudioCodec>, sample_rate: u32, silence_ms: u64, show_name: &str) -> Self {
        Self {
            codec,
            sample_rate,
            silence_ms,
            show_name: show_name.to_string(),
        }
    }

    /// クリップを順番に読み込み、間に無音を挟んで連結
    ///
    /// 先頭の前と末尾の後ろには無音を入れない。
    /// サンプリングレートが `sample_rate` と異なるクリップがあれば [`CodecError::Mismatch`]。
    pub fn assemble_pcm(&self, clips: &[AudioClip]) -> Result<PcmBuffer, CodecError> {
        let mut combined: Option<PcmBuffer> = None;

        for clip in clips {
            let pcm = self.codec.decode(&clip.path)?;
            log::debug!("{} 読み込み: {} ms", clip.segment, pcm.duration_ms());

            if pcm.sample_rate != self.sample_rate {
                return Err(CodecError::Mismatch(format!(
                    "{:?}: {} Hz (期待値 {} Hz)",
                    clip.path, pcm.sample_rate, self.sample_rate
                )));
            }

            if let Some(show) = combined.as_mut() {
                show.append(&PcmBuffer::silence(self.silence_ms, show.sample_rate));
                show.append(&pcm);
            } else {
                combined = Some(pcm);
            }
        }

        combined.ok_or_else(|| CodecError::Unavailable("結合するクリップがありません".to_string()))
    }

    /// 結合して書き出す
    pub fn assemble(&self, clips: &[AudioClip], output_path: &Path, playlist_path: &Path) -> Outcome<ShowOutput> {
        self.assemble_with(clips, output_path, playlist_path, |pcm| pcm)
    }

    /// 結合後、書き出す前に `finish` を適用する
    ///
    /// 結合または書き出しができない場合はプレイリストを書き出して
    /// [`Outcome::Fallback`] を返す。プレイリストも書けなければ [`Outcome::Fatal`]。
    pub fn assemble_with<F>(
        &self,
        clips: &[AudioClip],
        output_path: &Path,
        playlist_path: &Path,
        finish: F,
    ) -> Outcome<ShowOutput>
    where
        F: FnOnce(PcmBuffer) -> PcmBuffer,
    {
        if clips.is_empty() {
            return Outcome::Fatal("音声セグメントが1つもありません".to_string());
        }

        let output_path = avoid_clip_paths(output_path, clips);
        let output_path = output_path.as_path();
        let combined = self.assemble_pcm(clips).and_then(|pcm| {
            let show = finish(pcm);
            self.codec.encode(output_path, &show)?;
            Ok(show)
        });

        let reason = match combined {
            Ok(show) => {
                log::info!(
                    "番組を書き出しました: {:?} ({:.1}秒)",
                    output_path,
                    show.duration_ms() as f64 / 1000.0
                );
                return Outcome::Success(ShowOutput::Combined {
                    path: output_path.to_path_buf(),
                    duration_ms: show.duration_ms(),
                });
            }
            Err(e) => e.to_string(),
        };

        log::warn!("音声を結合できません ({})。プレイリストで代替します", reason);
        match self.write_playlist(clips, playlist_path) {
            Ok(output) => Outcome::Fallback {
                value: output,
                reason,
            },
            Err(e) => {
                log::error!("プレイリストの書き出しに失敗: {:#}", e);
                Outcome::Fatal(format!("{}; {:#}", reason, e))
            }
        }
    }

    /// 各クリップを1回ずつ順番に並べた M3U プレイリストを書き出し
    pub fn write_playlist(&self, clips: &[AudioClip], playlist_path: &Path) -> Result<ShowOutput> {
        let base_dir = playlist_path.parent().unwrap_or_else(|| Path::new(""));
        if !base_dir.as_os_str().is_empty() {
            fs::create_dir_all(base_dir)
                .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", base_dir))?;
        }

        let mut content = format!("#EXTM3U\n#PLAYLIST:{}\n\n", self.show_name);
        let mut entries = Vec::with_capacity(clips.len());
        for clip in clips {
            let entry = relative_to(&clip.path, base_dir);
            content.push_str(&format!(
                "#EXTINF:-1,{} Segment\n{}\n\n",
                clip.segment.title(),
                entry.display()
            ));
            entries.push(clip.path.clone());
        }

        fs::write(playlist_path, content)
            .with_context(|| format!("プレイリストの書き込みに失敗: {:?}", playlist_path))?;
        log::info!("プレイリストを書き出しました: {:?} ({} 件)", playlist_path, entries.len());

        Ok(ShowOutput::Playlist {
            path: playlist_path.to_path_buf(),
            entries,
        })
    }
}

/// 出力先がクリップ自身のパスと重なる場合は `_show` を付けた名前にする
///
/// クリップを上書きすると、次回以降の代替音声として番組全体が使われてしまう。
fn avoid_clip_paths(output_path: &Path, clips: &[AudioClip]) -> PathBuf {
    let mut candidate = output_path.to_path_buf();
    while clips.iter().any(|clip| clip.path == candidate) {
        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = match candidate.extension() {
            Some(ext) => format!("{}_show.{}", stem, ext.to_string_lossy()),
            None => format!("{}_show", stem),
        };
        candidate.set_file_name(filename);
    }
    if candidate.as_path() != output_path {
        log::warn!(
            "出力先 {:?} がセグメント音声と同じため {:?} に書き出します",
            output_path,
            candidate
        );
    }
    candidate
}

/// プレイリストのディレクトリからの相対パス（できなければそのまま）
fn relative_to(path: &Path, base_dir: &Path) -> PathBuf {
    if base_dir.as_os_str().is_empty() {
        return path.to_path_buf();
    }
    path.strip_prefix(base_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
