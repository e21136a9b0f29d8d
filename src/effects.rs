//! 効果音（ジングル・拍手・BGM）の生成と番組への配置

use crate::config::EffectsConfig;
use crate::types::{ms_to_samples, Intensity, MusicStyle, Outcome, PcmBuffer, Placement};
use crate::wav_io;
use anyhow::Result;
use std::f32::consts::PI;
use std::fmt;
use std::path::Path;

/// 正規化後のピーク余裕 (dB)
const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// ジングルのコード進行 C - Am - F - G
const JINGLE_CHORDS: [[f32; 3]; 4] = [
    [523.0, 659.0, 784.0],
    [440.0, 523.0, 659.0],
    [349.0, 440.0, 523.0],
    [392.0, 494.0, 587.0],
];

const SPARKLE_FREQ: f32 = 1047.0; // C6
const SPARKLE_POSITIONS_MS: [u64; 3] = [500, 1500, 2500];

const BACKGROUND_LOOP_MS: u64 = 8000;

/// 効果音の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Jingle,
    Applause,
    Background,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Jingle => "jingle",
            Effect::Applause => "applause",
            Effect::Background => "background",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 効果音の生成元
pub trait EffectSource: Send + Sync {
    fn jingle(&self, duration_ms: u64, sample_rate: u32) -> Result<PcmBuffer>;

    fn applause(&self, duration_ms: u64, intensity: Intensity, sample_rate: u32) -> Result<PcmBuffer>;

    fn background(&self, duration_ms: u64, style: MusicStyle, sample_rate: u32) -> Result<PcmBuffer>;
}

/// 正弦波とノイズから効果音を合成する
#[derive(Debug, Clone, Default)]
pub struct ProceduralEffects {
    seed: Option<u64>,
}

impl ProceduralEffects {
    /// `seed` を指定すると拍手のノイズが再現可能になる
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}

impl EffectSource for ProceduralEffects {
    fn jingle(&self, duration_ms: u64, sample_rate: u32) -> Result<PcmBuffer> {
        check_request(duration_ms, sample_rate)?;
        let chord_ms = duration_ms / JINGLE_CHORDS.len() as u64;

        let mut jingle = Vec::new();
        for freqs in &JINGLE_CHORDS {
            let mut chord = chord_tones(freqs, chord_ms, sample_rate, -20.0);
            fade_in(&mut chord, ms_to_samples(100, sample_rate));
            fade_out(&mut chord, ms_to_samples(100, sample_rate));
            jingle.extend(chord);
        }

        let sparkle = sine(SPARKLE_FREQ, 200, sample_rate, -25.0);
        for position_ms in SPARKLE_POSITIONS_MS {
            let offset = ms_to_samples(position_ms, sample_rate);
            if offset < jingle.len() {
                mix_into(&mut jingle, &sparkle, offset);
            }
        }

        normalize(&mut jingle);
        Ok(to_pcm(&jingle, sample_rate))
    }

    fn applause(&self, duration_ms: u64, intensity: Intensity, sample_rate: u32) -> Result<PcmBuffer> {
        check_request(duration_ms, sample_rate)?;
        let mut rng = self.rng();
        let len = ms_to_samples(duration_ms, sample_rate);

        let mut noise: Vec<f32> = (0..len).map(|_| rng.f32() * 2.0 - 1.0).collect();
        low_pass(&mut noise, 8000.0, sample_rate);
        high_pass(&mut noise, 200.0, sample_rate);
        apply_gain(&mut noise, intensity.gain_db());

        // 観客のざわめき: 10ブロックごとに -8..+3 dB の揺らぎ
        let block = (len / 10).max(1);
        for chunk in noise.chunks_mut(block) {
            let variation = rng.i32(-8..=3) as f32;
            apply_gain(chunk, variation);
        }

        let fade = ms_to_samples(1000.min(duration_ms / 4), sample_rate);
        fade_in(&mut noise, fade);
        fade_out(&mut noise, fade);
        normalize(&mut noise);
        Ok(to_pcm(&noise, sample_rate))
    }

    fn background(&self, duration_ms: u64, style: MusicStyle, sample_rate: u32) -> Result<PcmBuffer> {
        check_request(duration_ms, sample_rate)?;
        let chords = background_chords(style);
        let chord_ms = BACKGROUND_LOOP_MS / chords.len() as u64;

        let mut one_loop = Vec::new();
        for freqs in chords {
            let mut chord = chord_tones(freqs, chord_ms, sample_rate, -30.0);
            fade_in(&mut chord, ms_to_samples(200, sample_rate));
            fade_out(&mut chord, ms_to_samples(200, sample_rate));
            one_loop.extend(chord);
        }

        let len = ms_to_samples(duration_ms, sample_rate);
        let mut music: Vec<f32> = one_loop.iter().copied().cycle().take(len).collect();

        let fade = ms_to_samples(2000.min(duration_ms / 10), sample_rate);
        fade_in(&mut music, fade);
        fade_out(&mut music, fade);
        normalize(&mut music);
        Ok(to_pcm(&music, sample_rate))
    }
}

fn check_request(duration_ms: u64, sample_rate: u32) -> Result<()> {
    if duration_ms == 0 || sample_rate == 0 {
        anyhow::bail!(
            "効果音の長さまたはサンプリングレートが0です ({} ms, {} Hz)",
            duration_ms,
            sample_rate
        );
    }
    Ok(())
}

fn background_chords(style: MusicStyle) -> &'static [[f32; 3]; 4] {
    match style {
        MusicStyle::Upbeat => &[
            [523.0, 659.0, 784.0],
            [440.0, 554.0, 659.0],
            [349.0, 440.0, 523.0],
            [392.0, 494.0, 587.0],
        ],
        MusicStyle::Chill => &[
            [440.0, 523.0, 659.0],
            [349.0, 440.0, 523.0],
            [523.0, 659.0, 784.0],
            [392.0, 494.0, 587.0],
        ],
        MusicStyle::Emotional => &[
            [440.0, 523.0, 659.0],
            [349.0, 415.0, 523.0],
            [523.0, 622.0, 784.0],
            [392.0, 466.0, 587.0],
        ],
    }
}

fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn sine(freq: f32, duration_ms: u64, sample_rate: u32, gain_db: f32) -> Vec<f32> {
    let amplitude = db_to_amplitude(gain_db);
    (0..ms_to_samples(duration_ms, sample_rate))
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn chord_tones(freqs: &[f32], duration_ms: u64, sample_rate: u32, gain_db: f32) -> Vec<f32> {
    let mut chord = vec![0.0; ms_to_samples(duration_ms, sample_rate)];
    for &freq in freqs {
        mix_into(&mut chord, &sine(freq, duration_ms, sample_rate, gain_db), 0);
    }
    chord
}

/// `dst` の `offset` 以降に `src` を加算（`dst` の長さは変えない）
fn mix_into(dst: &mut [f32], src: &[f32], offset: usize) {
    if offset >= dst.len() {
        return;
    }
    for (d, s) in dst[offset..].iter_mut().zip(src) {
        *d += s;
    }
}

fn apply_gain(samples: &mut [f32], db: f32) {
    let amplitude = db_to_amplitude(db);
    for s in samples.iter_mut() {
        *s *= amplitude;
    }
}

fn fade_in(samples: &mut [f32], len: usize) {
    let len = len.min(samples.len());
    for (i, s) in samples[..len].iter_mut().enumerate() {
        *s *= i as f32 / len as f32;
    }
}

fn fade_out(samples: &mut [f32], len: usize) {
    let total = samples.len();
    let len = len.min(total);
    for (i, s) in samples[total - len..].iter_mut().enumerate() {
        *s *= (len - i) as f32 / len as f32;
    }
}

/// ピークを -0.1 dBFS に揃える。無音はそのまま
fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let scale = db_to_amplitude(-NORMALIZE_HEADROOM_DB) / peak;
    for s in samples.iter_mut() {
        *s *= scale;
    }
}

/// 1次ローパスフィルタ
fn low_pass(samples: &mut [f32], cutoff_hz: f32, sample_rate: u32) {
    let dt = 1.0 / sample_rate as f32;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let alpha = dt / (rc + dt);
    let mut prev = 0.0;
    for s in samples.iter_mut() {
        prev += alpha * (*s - prev);
        *s = prev;
    }
}

/// 1次ハイパスフィルタ
fn high_pass(samples: &mut [f32], cutoff_hz: f32, sample_rate: u32) {
    let dt = 1.0 / sample_rate as f32;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let alpha = rc / (rc + dt);
    let mut prev_in = 0.0;
    let mut prev_out = 0.0;
    for s in samples.iter_mut() {
        let input = *s;
        prev_out = alpha * (prev_out + input - prev_in);
        prev_in = input;
        *s = prev_out;
    }
}

fn to_f32(pcm: &PcmBuffer) -> Vec<f32> {
    pcm.samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// f32 → i16（範囲外は飽和させる）
fn to_pcm(samples: &[f32], sample_rate: u32) -> PcmBuffer {
    PcmBuffer {
        samples: samples
            .iter()
            .map(|&s| (s * 32767.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect(),
        sample_rate,
    }
}

/// 効果音を配置する
///
/// `Start`/`End`/`Both` は連結、`At` は番組内の位置に重ねる。
fn place(show: Vec<f32>, effect: &[f32], placement: Placement, sample_rate: u32) -> Vec<f32> {
    match placement {
        Placement::Start => [effect, show.as_slice()].concat(),
        Placement::End => [show.as_slice(), effect].concat(),
        Placement::Both => [effect, show.as_slice(), effect].concat(),
        Placement::At(offset_ms) => {
            let mut show = show;
            let offset = ms_to_samples(offset_ms, sample_rate);
            if offset >= show.len() {
                log::warn!(
                    "効果音の位置 {} ms が番組の長さを超えています。配置しません",
                    offset_ms
                );
            }
            mix_into(&mut show, effect, offset);
            show
        }
    }
}

/// 有効な効果音を生成して番組に適用する
///
/// 生成に失敗した効果音は省略し、理由を [`Outcome::Fallback`] で返す。
/// すべて失敗した場合は `base` と同一のバッファを返す（正規化もしない）。
/// 生成した効果音は `<sfx_dir>/<effect>_<timestamp>.wav` に保存するが、
/// 保存の失敗はログに残すだけ。
pub fn apply_effects(
    base: &PcmBuffer,
    config: &EffectsConfig,
    source: &dyn EffectSource,
    sfx_dir: &Path,
    timestamp: &str,
) -> Outcome<PcmBuffer> {
    if !config.any_enabled() {
        return Outcome::Success(base.clone());
    }

    let rate = base.sample_rate;
    let mut requested = Vec::new();
    if config.background_music {
        requested.push((
            Effect::Background,
            source.background(base.duration_ms(), config.background_style, rate),
        ));
    }
    if config.jingle {
        requested.push((Effect::Jingle, source.jingle(config.jingle_duration_ms, rate)));
    }
    if config.applause {
        requested.push((
            Effect::Applause,
            source.applause(config.applause_duration_ms, config.applause_intensity, rate),
        ));
    }

    let mut generated = Vec::new();
    let mut failures = Vec::new();
    for (effect, result) in requested {
        match result {
            Ok(pcm) if pcm.sample_rate != rate => {
                failures.push(format!(
                    "{}: サンプリングレート不一致 ({} Hz / {} Hz)",
                    effect, pcm.sample_rate, rate
                ));
            }
            Ok(pcm) if pcm.is_empty() => {
                failures.push(format!("{}: 空の音声", effect));
            }
            Ok(pcm) => {
                let path = wav_io::timestamped_path(sfx_dir, effect.as_str(), timestamp, "wav");
                match wav_io::write_wav(&path, &pcm) {
                    Ok(()) => log::info!("効果音を保存しました: {:?}", path),
                    Err(e) => log::warn!("効果音の保存に失敗 ({}): {:#}", effect, e),
                }
                generated.push((effect, pcm));
            }
            Err(e) => failures.push(format!("{}: {:#}", effect, e)),
        }
    }

    for failure in &failures {
        log::warn!("効果音を省略します: {}", failure);
    }

    if generated.is_empty() {
        return Outcome::Fallback {
            value: base.clone(),
            reason: failures.join("; "),
        };
    }

    let mut show = to_f32(base);
    normalize(&mut show);

    for (effect, pcm) in generated {
        let mut layer = to_f32(&pcm);
        show = match effect {
            Effect::Background => {
                apply_gain(&mut layer, config.background_volume_db);
                mix_into(&mut show, &layer, 0);
                show
            }
            Effect::Jingle => {
                apply_gain(&mut layer, config.jingle_volume_db);
                place(show, &layer, config.jingle_position, rate)
            }
            Effect::Applause => {
                apply_gain(&mut layer, config.applause_volume_db);
                place(show, &layer, config.applause_position, rate)
            }
        };
        log::info!("効果音を追加しました: {}", effect);
    }

    let value = to_pcm(&show, rate);
    if failures.is_empty() {
        Outcome::Success(value)
    } else {
        Outcome::Fallback {
            value,
            reason: failures.join("; "),
        }
    }
}
