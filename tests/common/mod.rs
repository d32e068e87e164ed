#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use subvoice::clip::{Clip, ClipId};
use subvoice::config::RateConfig;
use subvoice::progress::ProgressObserver;
use subvoice::services::{
    Concatenator, DurationProber, Services, SilenceGenerator, SpeechSynthesizer, TimeFitter,
};

/// Deterministic stand-in for every audio service.
///
/// Synthesized clips get the duration the script assigns to their text; a
/// fitted clip lasts `source / factor + fit_error`, like a real stretcher that
/// cannot hit the ratio exactly. Nothing touches the disk.
#[derive(Default)]
pub struct StubAudio {
    speech: HashMap<String, f64>,
    default_speech: f64,
    fail_synthesis_on: Option<String>,
    unreadable: Option<String>,
    fail_fit_on: Option<String>,
    fail_silence: bool,
    fit_error: f64,
    durations: Mutex<HashMap<ClipId, f64>>,
    texts: Mutex<HashMap<ClipId, String>>,
    pub fit_requests: Mutex<Vec<f64>>,
    pub silence_requests: Mutex<Vec<f64>>,
    pub synthesized: Mutex<Vec<(String, String)>>,
}

impl StubAudio {
    pub fn speaking(default_speech: f64) -> Self {
        Self {
            default_speech,
            ..Self::default()
        }
    }

    pub fn with_clip(mut self, text: &str, seconds: f64) -> Self {
        self.speech.insert(text.to_string(), seconds);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_synthesis_on = Some(text.to_string());
        self
    }

    pub fn with_fit_error(mut self, seconds: f64) -> Self {
        self.fit_error = seconds;
        self
    }

    pub fn failing_fit_on(mut self, text: &str) -> Self {
        self.fail_fit_on = Some(text.to_string());
        self
    }

    pub fn failing_silence(mut self) -> Self {
        self.fail_silence = true;
        self
    }

    pub fn unreadable(mut self, text: &str) -> Self {
        self.unreadable = Some(text.to_string());
        self
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            synthesizer: self,
            prober: self,
            fitter: self,
            silence: self,
        }
    }

    pub fn fits(&self) -> Vec<f64> {
        self.fit_requests.lock().unwrap().clone()
    }

    pub fn silences(&self) -> Vec<f64> {
        self.silence_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for StubAudio {
    async fn synthesize(&self, text: &str, rate: &RateConfig, dest: &Clip) -> anyhow::Result<()> {
        if self.fail_synthesis_on.as_deref() == Some(text) {
            anyhow::bail!("voice backend rejected the text");
        }
        let seconds = self.speech.get(text).copied().unwrap_or(self.default_speech);
        self.durations.lock().unwrap().insert(dest.id, seconds);
        self.texts.lock().unwrap().insert(dest.id, text.to_string());
        self.synthesized
            .lock()
            .unwrap()
            .push((text.to_string(), rate.rate_string()));
        Ok(())
    }
}

#[async_trait]
impl DurationProber for StubAudio {
    async fn probe(&self, clip: &Clip) -> anyhow::Result<f64> {
        let text = self.texts.lock().unwrap().get(&clip.id).cloned();
        if text.is_some() && text == self.unreadable {
            anyhow::bail!("unreadable header");
        }
        self.durations
            .lock()
            .unwrap()
            .get(&clip.id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no such clip {:?}", clip.id))
    }
}

#[async_trait]
impl TimeFitter for StubAudio {
    async fn fit(&self, src: &Clip, factor: f64, dest: &Clip) -> anyhow::Result<()> {
        self.fit_requests.lock().unwrap().push(factor);
        let text = self.texts.lock().unwrap().get(&src.id).cloned();
        if text.is_some() && text == self.fail_fit_on {
            anyhow::bail!("atempo filter crashed");
        }
        let source = self
            .durations
            .lock()
            .unwrap()
            .get(&src.id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no such clip {:?}", src.id))?;
        self.durations.lock().unwrap().insert(dest.id, source / factor + self.fit_error);
        Ok(())
    }
}

#[async_trait]
impl SilenceGenerator for StubAudio {
    async fn silence(&self, duration: f64, dest: &Clip) -> anyhow::Result<()> {
        self.silence_requests.lock().unwrap().push(duration);
        if self.fail_silence {
            anyhow::bail!("disk full");
        }
        self.durations.lock().unwrap().insert(dest.id, duration);
        Ok(())
    }
}

/// Records the clip paths it was asked to join.
#[derive(Default)]
pub struct StubConcat {
    pub inputs: Mutex<Vec<PathBuf>>,
    pub work_dir: Mutex<Option<PathBuf>>,
}

#[async_trait]
impl Concatenator for StubConcat {
    async fn concat(&self, inputs: &[PathBuf], work_dir: &Path) -> anyhow::Result<Vec<u8>> {
        if inputs.is_empty() {
            anyhow::bail!("nothing to concatenate");
        }
        *self.inputs.lock().unwrap() = inputs.to_vec();
        *self.work_dir.lock().unwrap() = Some(work_dir.to_path_buf());
        Ok(b"ID3-stub".to_vec())
    }
}

#[derive(Default)]
pub struct Recorder {
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub statuses: Mutex<Vec<String>>,
}

impl ProgressObserver for Recorder {
    fn progress(&self, processed: usize, total: usize) {
        self.progress.lock().unwrap().push((processed, total));
    }

    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }
}
