use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::clip::Clip;
use crate::config::{AudioFormat, RateConfig};
use crate::ffmpeg::transcode_to_wav;
use crate::services::SpeechSynthesizer;

/// Path the backend writes to before the clip is normalised into `dest`.
fn raw_path(dest: &Clip, ext: &str) -> PathBuf {
    dest.path.with_extension(format!("raw.{}", ext))
}

async fn normalise(raw: &Path, dest: &Clip, format: AudioFormat) -> anyhow::Result<()> {
    transcode_to_wav(raw, &dest.path, format).await?;
    if let Err(e) = tokio::fs::remove_file(raw).await {
        debug!("Could not remove {}: {}", raw.display(), e);
    }
    Ok(())
}

/// Piper, a local neural TTS. The voice is the path of an `.onnx` model.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    format: AudioFormat,
}

impl PiperSynthesizer {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSynthesizer {
    async fn synthesize(&self, text: &str, rate: &RateConfig, dest: &Clip) -> anyhow::Result<()> {
        let raw = raw_path(dest, "wav");
        let mut child = Command::new("piper")
            .args(["--model", rate.voice(), "--output_file"])
            .arg(&raw)
            .arg("--length_scale")
            .arg(format!("{:.3}", rate.length_scale()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn piper")?;

        {
            let mut stdin = child.stdin.take().context("failed to open piper stdin")?;
            stdin.write_all(text.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            error!("Piper TTS command failed for {}", raw.display());
            anyhow::bail!(
                "piper returned {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        normalise(&raw, dest, self.format).await
    }
}

/// Microsoft Edge online voices through the `edge-tts` command.
#[derive(Debug, Clone)]
pub struct EdgeTtsSynthesizer {
    format: AudioFormat,
}

impl EdgeTtsSynthesizer {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(&self, text: &str, rate: &RateConfig, dest: &Clip) -> anyhow::Result<()> {
        let raw = raw_path(dest, "mp3");
        let output = Command::new("edge-tts")
            .args(["--voice", rate.voice()])
            .arg(format!("--rate={}", rate.rate_string()))
            .arg(format!("--text={}", text))
            .arg("--write-media")
            .arg(&raw)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to spawn edge-tts")?;
        if !output.status.success() {
            anyhow::bail!(
                "edge-tts returned {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        normalise(&raw, dest, self.format).await
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: String,
}

/// Any HTTP service that answers `POST {text, voice, rate}` with an audio body.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    url: String,
    format: AudioFormat,
}

impl HttpSynthesizer {
    /// `timeout` bounds each request, from connect to the last body byte.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        format: AudioFormat,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("cannot build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            format,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, rate: &RateConfig, dest: &Clip) -> anyhow::Result<()> {
        let request = SpeechRequest {
            text,
            voice: rate.voice(),
            rate: rate.rate_string(),
        };
        let audio = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if audio.is_empty() {
            anyhow::bail!("{} returned an empty body", self.url);
        }
        let raw = raw_path(dest, "bin");
        tokio::fs::write(&raw, &audio)
            .await
            .with_context(|| format!("cannot write {}", raw.display()))?;
        normalise(&raw, dest, self.format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_files_sit_next_to_the_clip() {
        let mut store = crate::clip::ClipStore::new().unwrap();
        let clip = store.allocate("tts");
        let raw = raw_path(&clip, "mp3");
        assert_eq!(raw.parent(), clip.path.parent());
        assert!(raw.to_string_lossy().ends_with("_tts.raw.mp3"));
    }

    #[test]
    fn request_body_carries_signed_rate() {
        let rate = RateConfig::new("vi-VN-NamMinhNeural", -20).unwrap();
        let body = serde_json::to_value(SpeechRequest {
            text: "xin chào",
            voice: rate.voice(),
            rate: rate.rate_string(),
        })
        .unwrap();
        assert_eq!(body["rate"], "-20%");
        assert_eq!(body["voice"], "vi-VN-NamMinhNeural");
    }

    #[tokio::test]
    async fn hung_backend_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let synth = HttpSynthesizer::new(
            format!("http://{}/speak", addr),
            Duration::from_millis(200),
            AudioFormat::default(),
        )
        .unwrap();
        let mut store = crate::clip::ClipStore::new().unwrap();
        let clip = store.allocate("tts");
        let rate = RateConfig::new("v", 0).unwrap();

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            synth.synthesize("hello", &rate, &clip),
        )
        .await
        .expect("request should give up on its own");
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
