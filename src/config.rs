use clap::ValueEnum;
use serde::Serialize;

use crate::error::{DubError, DubResult};

/// Minimum gap worth filling with silence in basic mode.
pub const BASIC_GAP_THRESHOLD: f64 = 0.05;
/// Minimum gap worth filling with silence in auto-sync mode.
pub const AUTO_SYNC_GAP_THRESHOLD: f64 = 0.02;
/// Overshoot tolerated before a clip is compressed, so trailing phonemes survive.
pub const FIT_SLACK: f64 = 0.1;
/// Hard ceiling on the requested speed factor.
pub const MAX_SPEED_FACTOR: f64 = 1.7;
/// Largest factor a single time-fit stage accepts.
pub const MAX_FITTER_FACTOR: f64 = 2.0;

pub const MIN_SPEED_PERCENT: i32 = -50;
pub const MAX_SPEED_PERCENT: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Place each clip at its cue start; never stretch.
    Basic,
    /// Also compress clips that overrun their cue slot.
    AutoSync,
}

impl SyncMode {
    pub fn gap_threshold(self) -> f64 {
        match self {
            SyncMode::Basic => BASIC_GAP_THRESHOLD,
            SyncMode::AutoSync => AUTO_SYNC_GAP_THRESHOLD,
        }
    }

    pub fn fits_clips(self) -> bool {
        matches!(self, SyncMode::AutoSync)
    }
}

/// Voice and speaking rate shared by every cue of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateConfig {
    voice: String,
    speed_percent: i32,
}

impl RateConfig {
    pub fn new(voice: impl Into<String>, speed_percent: i32) -> DubResult<Self> {
        let voice = voice.into();
        if voice.trim().is_empty() {
            return Err(DubError::Config("voice must not be empty".into()));
        }
        if !(MIN_SPEED_PERCENT..=MAX_SPEED_PERCENT).contains(&speed_percent) {
            return Err(DubError::Config(format!(
                "speed {}% is outside [{}%, {}%]",
                speed_percent, MIN_SPEED_PERCENT, MAX_SPEED_PERCENT
            )));
        }
        Ok(Self {
            voice,
            speed_percent,
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn speed_percent(&self) -> i32 {
        self.speed_percent
    }

    /// Signed percentage as TTS backends expect it, e.g. `+10%`, `-50%`, `+0%`.
    pub fn rate_string(&self) -> String {
        format!("{:+}%", self.speed_percent)
    }

    /// Piper's `length_scale`: values below 1 speak faster.
    pub fn length_scale(&self) -> f64 {
        1.0 / (1.0 + self.speed_percent as f64 / 100.0)
    }
}

/// What to do when a clip's duration cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbePolicy {
    /// Abort the run.
    #[default]
    Strict,
    /// Warn and treat the clip as zero-length.
    Lenient,
}

/// PCM layout shared by every intermediate clip so the final join needs no resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncConfig {
    pub mode: SyncMode,
    pub rate: RateConfig,
    pub probe_policy: ProbePolicy,
}

impl SyncConfig {
    pub fn new(mode: SyncMode, rate: RateConfig) -> Self {
        Self {
            mode,
            rate,
            probe_policy: ProbePolicy::Strict,
        }
    }

    pub fn with_probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.probe_policy = policy;
        self
    }
}
