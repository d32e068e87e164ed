use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{
    AudioFormat, MAX_SPEED_PERCENT, MIN_SPEED_PERCENT, ProbePolicy, RateConfig, SyncConfig,
    SyncMode,
};
use crate::error::{DubError, DubResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Local Piper model; `--voice` is the model path.
    Piper,
    /// Microsoft Edge voices via the `edge-tts` command.
    EdgeTts,
    /// HTTP service at `--tts-url`.
    Http,
}

/// Turn an SRT subtitle file into one audio track that follows its timing.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Subtitle file to speak.
    #[clap(long, short)]
    pub input: PathBuf,

    /// Output audio; `.wav` stays PCM, anything else is MP3.
    #[clap(long, short, default_value = "output.mp3")]
    pub out: PathBuf,

    #[clap(long, value_enum, default_value_t = SyncMode::AutoSync)]
    pub mode: SyncMode,

    #[clap(long, value_enum, default_value_t = Backend::EdgeTts)]
    pub backend: Backend,

    #[clap(long, default_value = "vi-VN-HoaiMyNeural")]
    pub voice: String,

    /// Speaking rate change in percent.
    #[clap(
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(MIN_SPEED_PERCENT as i64..=MAX_SPEED_PERCENT as i64)
    )]
    pub speed: i32,

    /// Endpoint for the HTTP backend.
    #[clap(long, required_if_eq("backend", "http"))]
    pub tts_url: Option<String>,

    /// Seconds before an HTTP synthesis request is abandoned.
    #[clap(long, default_value_t = 60)]
    pub tts_timeout: u64,

    /// Treat clips whose duration cannot be read as silent instead of failing.
    #[clap(long)]
    pub lenient_probe: bool,

    #[clap(long, default_value_t = 24_000)]
    pub sample_rate: u32,

    /// Also write the segment list and run report as JSON.
    #[clap(long)]
    pub manifest: Option<PathBuf>,
}

impl Args {
    pub fn sync_config(&self) -> DubResult<SyncConfig> {
        let rate = RateConfig::new(self.voice.clone(), self.speed)?;
        let policy = if self.lenient_probe {
            ProbePolicy::Lenient
        } else {
            ProbePolicy::Strict
        };
        Ok(SyncConfig::new(self.mode, rate).with_probe_policy(policy))
    }

    pub fn tts_timeout(&self) -> DubResult<Duration> {
        if self.tts_timeout == 0 {
            return Err(DubError::Config("--tts-timeout must be at least 1 second".into()));
        }
        Ok(Duration::from_secs(self.tts_timeout))
    }

    pub fn audio_format(&self) -> DubResult<AudioFormat> {
        if self.sample_rate < 8_000 {
            return Err(DubError::Config(format!(
                "sample rate {} Hz is too low",
                self.sample_rate
            )));
        }
        Ok(AudioFormat {
            sample_rate: self.sample_rate,
            channels: 1,
        })
    }
}
