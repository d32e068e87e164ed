use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::clip::Clip;
use crate::config::{AudioFormat, MAX_FITTER_FACTOR};
use crate::services::{Concatenator, TimeFitter};

/// Runs ffmpeg with `args`, failing with the tail of its stderr.
pub async fn run_ffmpeg(args: &[String]) -> anyhow::Result<()> {
    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-nostdin", "-y"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to spawn ffmpeg")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        anyhow::bail!(
            "ffmpeg exited with {}: {}",
            output.status,
            tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
        );
    }
    Ok(())
}

fn pcm_args(format: AudioFormat) -> Vec<String> {
    vec![
        "-ar".into(),
        format.sample_rate.to_string(),
        "-ac".into(),
        format.channels.to_string(),
        "-c:a".into(),
        "pcm_s16le".into(),
    ]
}

/// Converts any audio file ffmpeg can read into the run's WAV layout.
pub async fn transcode_to_wav(src: &Path, dest: &Path, format: AudioFormat) -> anyhow::Result<()> {
    let mut args = vec!["-i".to_string(), src.display().to_string()];
    args.extend(pcm_args(format));
    args.push(dest.display().to_string());
    run_ffmpeg(&args).await
}

/// Time-stretches clips with ffmpeg's pitch-preserving `atempo` filter.
#[derive(Debug, Clone, Copy)]
pub struct FfmpegFitter {
    format: AudioFormat,
}

impl FfmpegFitter {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

pub fn check_factor(factor: f64) -> anyhow::Result<()> {
    if !(factor > 0.0 && factor <= MAX_FITTER_FACTOR) {
        anyhow::bail!(
            "speed factor {} is outside the single-stage range (0, {}]",
            factor,
            MAX_FITTER_FACTOR
        );
    }
    Ok(())
}

#[async_trait]
impl TimeFitter for FfmpegFitter {
    async fn fit(&self, src: &Clip, factor: f64, dest: &Clip) -> anyhow::Result<()> {
        check_factor(factor)?;
        let mut args = vec![
            "-i".to_string(),
            src.path.display().to_string(),
            "-filter:a".into(),
            format!("atempo={:.4}", factor),
        ];
        args.extend(pcm_args(self.format));
        args.push(dest.path.display().to_string());
        run_ffmpeg(&args).await
    }
}

/// Container of the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCodec {
    Mp3,
    Wav,
}

impl OutputCodec {
    /// `.wav` outputs stay PCM; everything else is MP3.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wav") => OutputCodec::Wav,
            _ => OutputCodec::Mp3,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            OutputCodec::Mp3 => "combined.mp3",
            OutputCodec::Wav => "combined.wav",
        }
    }
}

/// One line of an ffmpeg concat-demuxer list.
pub fn concat_list_line(path: &Path) -> String {
    let p = path.display().to_string().replace('\\', "/");
    format!("file '{}'", p.replace('\'', r"'\''"))
}

fn concat_args(list: &Path, out: &Path, codec: &[&str]) -> Vec<String> {
    let mut args: Vec<String> = ["-f", "concat", "-safe", "0", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(list.display().to_string());
    args.extend(codec.iter().map(|s| s.to_string()));
    args.push(out.display().to_string());
    args
}

/// Joins clips with the ffmpeg concat demuxer.
#[derive(Debug, Clone, Copy)]
pub struct FfmpegConcatenator {
    codec: OutputCodec,
}

impl FfmpegConcatenator {
    pub fn new(codec: OutputCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concat(&self, inputs: &[PathBuf], work_dir: &Path) -> anyhow::Result<Vec<u8>> {
        if inputs.is_empty() {
            anyhow::bail!("nothing to concatenate");
        }

        let list_path = work_dir.join("files.txt");
        let list: String = inputs
            .iter()
            .map(|p| concat_list_line(p) + "\n")
            .collect();
        tokio::fs::write(&list_path, list)
            .await
            .with_context(|| format!("cannot write {}", list_path.display()))?;

        let out_path = work_dir.join(self.codec.file_name());
        let args = |codec: &[&str]| concat_args(&list_path, &out_path, codec);
        match self.codec {
            OutputCodec::Mp3 => {
                run_ffmpeg(&args(&["-c:a", "libmp3lame", "-q:a", "2"])).await?;
            }
            OutputCodec::Wav => {
                if let Err(e) = run_ffmpeg(&args(&["-c", "copy"])).await {
                    warn!("ffmpeg concat with copy failed ({}); retrying with re-encode", e);
                    run_ffmpeg(&args(&["-c:a", "pcm_s16le"])).await?;
                }
            }
        }

        tokio::fs::read(&out_path)
            .await
            .with_context(|| format!("cannot read {}", out_path.display()))
    }
}
