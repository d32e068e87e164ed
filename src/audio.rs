use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::clip::Clip;
use crate::config::AudioFormat;
use crate::services::{DurationProber, SilenceGenerator};

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("cannot read WAV header of {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        anyhow::bail!("{} declares an empty sample layout", path.display());
    }
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Writes `duration` seconds of digital silence as 16-bit PCM.
pub fn write_silence(path: &Path, duration: f64, format: AudioFormat) -> anyhow::Result<()> {
    if !duration.is_finite() || duration < 0.0 {
        anyhow::bail!("cannot generate {} seconds of silence", duration);
    }
    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let frames = (duration * format.sample_rate as f64).round() as u64;
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("cannot create {}", path.display()))?;
    for _ in 0..frames * format.channels as u64 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Reads clip durations from WAV headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavProber;

#[async_trait]
impl DurationProber for WavProber {
    async fn probe(&self, clip: &Clip) -> anyhow::Result<f64> {
        wav_duration_seconds(&clip.path)
    }
}

/// Generates silence in-process, matching the run's PCM layout.
#[derive(Debug, Clone, Copy)]
pub struct WavSilence {
    format: AudioFormat,
}

impl WavSilence {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl SilenceGenerator for WavSilence {
    async fn silence(&self, duration: f64, dest: &Clip) -> anyhow::Result<()> {
        let path = dest.path.clone();
        let format = self.format;
        tokio::task::spawn_blocking(move || write_silence(&path, duration, format)).await?
    }
}
