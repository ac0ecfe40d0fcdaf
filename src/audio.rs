//! WAV-level audio helpers for the voice stage: duration measurement,
//! speed/loudness adjustment of synthesized clips, and mixing all clips
//! into the master narration track.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample rate of the mixed master track.
pub const MIX_SAMPLE_RATE: u32 = 44_100;

pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open wav: {}", path.display()))?;
    let spec = reader.spec();
    let frames = reader.len() as f64 / spec.channels as f64;
    Ok(frames / spec.sample_rate as f64)
}

fn read_samples(path: &Path) -> Result<(WavSpec, Vec<i16>)> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("Failed to open wav: {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "unsupported wav format in {}: {:?}/{} bits",
            path.display(),
            spec.sample_format,
            spec.bits_per_sample
        );
    }
    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    Ok((spec, samples))
}

fn write_samples(path: &Path, spec: WavSpec, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create wav: {}", path.display()))?;
    for s in samples {
        writer.write_sample(*s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Speed up a clip by rescaling its frame rate. The samples are untouched,
/// so pitch rises with the speed factor — accepted tradeoff.
pub fn adjust_speed(path: &Path, speed: f64) -> Result<()> {
    if (speed - 1.0).abs() < f64::EPSILON {
        return Ok(());
    }
    let (mut spec, samples) = read_samples(path)?;
    spec.sample_rate = (spec.sample_rate as f64 * speed).round() as u32;
    write_samples(path, spec, &samples)
}

fn dbfs(samples: &[i16]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return None;
    }
    Some(20.0 * (rms / i16::MAX as f64).log10())
}

/// Normalize a clip to the target loudness (dBFS). Silent clips are left
/// alone.
pub fn normalize_volume(path: &Path, target_dbfs: f64) -> Result<()> {
    let (spec, samples) = read_samples(path)?;
    let Some(current) = dbfs(&samples) else {
        return Ok(());
    };
    let gain = 10f64.powf((target_dbfs - current) / 20.0);
    let adjusted: Vec<i16> = samples
        .iter()
        .map(|&s| ((s as f64 * gain).round()).clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect();
    write_samples(path, spec, &adjusted)
}

/// Mono samples at `MIX_SAMPLE_RATE`, linearly interpolated from whatever
/// rate the clip carries (speed-adjusted clips have odd rates).
fn resample_mono(spec: WavSpec, samples: &[i16], target_rate: u32) -> Vec<f64> {
    let channels = spec.channels as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let mono: Vec<f64> = (0..frames)
        .map(|f| {
            let mut acc = 0.0;
            for c in 0..channels {
                acc += samples[f * channels + c] as f64;
            }
            acc / channels as f64
        })
        .collect();

    if spec.sample_rate == target_rate {
        return mono;
    }

    let ratio = spec.sample_rate as f64 / target_rate as f64;
    let out_len = (frames as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let base = pos.floor() as usize;
            let frac = pos - base as f64;
            let a = mono[base.min(frames - 1)];
            let b = mono[(base + 1).min(frames - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Mix every voice clip at its start offset into one mono master WAV of
/// exactly `total_duration` seconds. A missing or unreadable clip leaves a
/// silent gap instead of failing the mix.
pub fn mix_voice_tracks(
    clips: &[(std::path::PathBuf, f64)],
    total_duration: f64,
    out_path: &Path,
) -> Result<()> {
    let total_frames = (total_duration * MIX_SAMPLE_RATE as f64).ceil() as usize;
    let mut buffer = vec![0f64; total_frames];

    for (clip_path, start_time) in clips {
        let (spec, samples) = match read_samples(clip_path) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("Skipping clip in mix ({}): {}", clip_path.display(), err);
                continue;
            }
        };
        let mono = resample_mono(spec, &samples, MIX_SAMPLE_RATE);
        let offset = (start_time * MIX_SAMPLE_RATE as f64).round() as usize;
        for (i, v) in mono.iter().enumerate() {
            if let Some(slot) = buffer.get_mut(offset + i) {
                *slot += v;
            }
        }
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: MIX_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mixed: Vec<i16> = buffer
        .iter()
        .map(|&v| v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect();
    write_samples(out_path, spec, &mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_tone(path: &Path, rate: u32, secs: f64, amplitude: i16) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let frames = (rate as f64 * secs) as usize;
        for i in 0..frames {
            let t = i as f64 / rate as f64;
            let v = (t * 440.0 * 2.0 * std::f64::consts::PI).sin() * amplitude as f64;
            writer.write_sample(v as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn duration_matches_written_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 24_000, 1.5, 8000);
        let dur = wav_duration_seconds(&path).unwrap();
        assert!((dur - 1.5).abs() < 0.01, "duration was {dur}");
    }

    #[test]
    fn speed_adjust_shortens_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 24_000, 2.0, 8000);
        adjust_speed(&path, 1.25).unwrap();
        let dur = wav_duration_seconds(&path).unwrap();
        assert!((dur - 2.0 / 1.25).abs() < 0.01, "duration was {dur}");
    }

    #[test]
    fn normalize_hits_target_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 24_000, 0.5, 2000);
        normalize_volume(&path, -20.0).unwrap();
        let (_, samples) = read_samples(&path).unwrap();
        let level = dbfs(&samples).unwrap();
        assert!((level - -20.0).abs() < 0.5, "level was {level}");
    }

    #[test]
    fn mix_places_clip_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        let master = dir.path().join("master.wav");
        write_tone(&clip, 24_000, 0.5, 8000);

        mix_voice_tracks(&[(PathBuf::from(&clip), 1.0)], 2.0, &master).unwrap();

        let (spec, samples) = read_samples(&master).unwrap();
        assert_eq!(spec.sample_rate, MIX_SAMPLE_RATE);
        let total = samples.len() as f64 / MIX_SAMPLE_RATE as f64;
        assert!((total - 2.0).abs() < 0.01);

        // First second is silence, sound starts at the 1.0s offset.
        let first = &samples[..MIX_SAMPLE_RATE as usize / 2];
        let shifted = &samples[MIX_SAMPLE_RATE as usize..MIX_SAMPLE_RATE as usize * 3 / 2];
        assert!(first.iter().all(|&s| s == 0));
        assert!(shifted.iter().any(|&s| s.abs() > 1000));
    }

    #[test]
    fn missing_clip_leaves_silent_gap() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.wav");
        mix_voice_tracks(&[(PathBuf::from("no_such.wav"), 0.0)], 1.0, &master).unwrap();
        let (_, samples) = read_samples(&master).unwrap();
        assert!(samples.iter().all(|&s| s == 0));
    }
}
