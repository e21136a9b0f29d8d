use crate::error::CodecError;
use crate::types::{PcmBuffer, SampleI16};
use anyhow::{Context, Result};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// ファイル名に使うタイムスタンプ (YYYYmmdd_HHMMSS)
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<name>_<timestamp>.<ext>` を作る
pub fn timestamped_path<P: AsRef<Path>>(dir: P, name: &str, timestamp: &str, ext: &str) -> PathBuf {
    dir.as_ref().join(format!("{}_{}.{}", name, timestamp, ext))
}

fn mono_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// リトルエンディアン16bit PCMのバイト列をサンプル列に変換
///
/// 末尾の半端な1バイトは捨てる。
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<SampleI16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// PCMデータをWAVフォーマットに変換
pub fn pcm_to_wav(pcm: &PcmBuffer) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, mono_spec(pcm.sample_rate))
            .context("WAVライター作成失敗")?;

        for &sample in &pcm.samples {
            writer.write_sample(sample).context("WAV書き込み失敗")?;
        }

        writer.finalize().context("WAV finalize失敗")?;
    }

    Ok(cursor.into_inner())
}

/// PCMバッファをWAVファイルとして書き出し
///
/// 親ディレクトリが存在しない場合は作成する。
pub fn write_wav<P: AsRef<Path>>(path: P, pcm: &PcmBuffer) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", parent))?;
        }
    }

    let mut writer = hound::WavWriter::create(path, mono_spec(pcm.sample_rate))
        .with_context(|| format!("WAVファイルの作成に失敗: {:?}", path))?;
    for &sample in &pcm.samples {
        writer
            .write_sample(sample)
            .with_context(|| "WAVファイルへのサンプル書き込みに失敗")?;
    }
    writer
        .finalize()
        .with_context(|| "WAVファイルのファイナライズに失敗")?;

    log::debug!(
        "WAVファイル書き込み完了: {:?}, {}サンプル ({:.2}秒)",
        path,
        pcm.samples.len(),
        pcm.samples.len() as f64 / pcm.sample_rate as f64
    );
    Ok(())
}

/// WAVファイルを読み込み
///
/// 16bit整数のモノラルPCMのみ対応。それ以外の形式は
/// [`CodecError::Unavailable`] を返す。
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<PcmBuffer, CodecError> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(CodecError::Unavailable(format!(
            "{:?}: {}ch {}bit {:?} (16bit モノラルのみ対応)",
            path, spec.channels, spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(PcmBuffer {
        samples,
        sample_rate: spec.sample_rate,
    })
}
