//! Boundaries to the external audio services the synchronizer drives.
//!
//! Each call is awaited to completion before the synchronizer moves on, so
//! these are the only suspension points of a run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::clip::Clip;
use crate::config::RateConfig;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speaks `text` into `dest`.
    async fn synthesize(&self, text: &str, rate: &RateConfig, dest: &Clip) -> anyhow::Result<()>;
}

#[async_trait]
pub trait DurationProber: Send + Sync {
    /// Duration of `clip` in seconds. Must fail rather than guess.
    async fn probe(&self, clip: &Clip) -> anyhow::Result<f64>;
}

#[async_trait]
pub trait TimeFitter: Send + Sync {
    /// Re-times `src` into `dest`, playing `factor` times faster. `factor` is in (0, 2.0].
    async fn fit(&self, src: &Clip, factor: f64, dest: &Clip) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SilenceGenerator: Send + Sync {
    async fn silence(&self, duration: f64, dest: &Clip) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Concatenator: Send + Sync {
    /// Joins `inputs` in order and returns the encoded result.
    async fn concat(&self, inputs: &[PathBuf], work_dir: &Path) -> anyhow::Result<Vec<u8>>;
}

/// The per-cue services, borrowed for the length of one run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub synthesizer: &'a dyn SpeechSynthesizer,
    pub prober: &'a dyn DurationProber,
    pub fitter: &'a dyn TimeFitter,
    pub silence: &'a dyn SilenceGenerator,
}
