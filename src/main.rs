use std::fs;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use subvoice::args::{Args, Backend};
use subvoice::audio::{WavProber, WavSilence};
use subvoice::ffmpeg::{FfmpegConcatenator, FfmpegFitter, OutputCodec};
use subvoice::progress::LogProgress;
use subvoice::services::{Services, SpeechSynthesizer};
use subvoice::subtitle::{decode_srt, parse_srt};
use subvoice::tts::{EdgeTtsSynthesizer, HttpSynthesizer, PiperSynthesizer};
use subvoice::{Backends, SyncConfig, SyncReport, dub};

#[derive(Serialize)]
struct Manifest<'a> {
    input: String,
    output: String,
    config: &'a SyncConfig,
    report: &'a SyncReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.sync_config()?;
    let format = args.audio_format()?;

    let raw = fs::read(&args.input)
        .with_context(|| format!("cannot read subtitle file {}", args.input.display()))?;
    let cues = parse_srt(&decode_srt(&raw))?;
    info!("Loaded {} cues from {}", cues.len(), args.input.display());

    let synthesizer: Box<dyn SpeechSynthesizer> = match args.backend {
        Backend::Piper => Box::new(PiperSynthesizer::new(format)),
        Backend::EdgeTts => Box::new(EdgeTtsSynthesizer::new(format)),
        Backend::Http => {
            let url = args
                .tts_url
                .clone()
                .context("--tts-url is required for the http backend")?;
            Box::new(HttpSynthesizer::new(url, args.tts_timeout()?, format)?)
        }
    };
    let prober = WavProber;
    let silence = WavSilence::new(format);
    let fitter = FfmpegFitter::new(format);
    let concatenator = FfmpegConcatenator::new(OutputCodec::for_path(&args.out));
    let backends = Backends {
        services: Services {
            synthesizer: synthesizer.as_ref(),
            prober: &prober,
            fitter: &fitter,
            silence: &silence,
        },
        concatenator: &concatenator,
    };

    let output = match dub(&cues, &config, backends, &LogProgress).await {
        Ok(output) => output,
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    fs::write(&args.out, &output.audio)
        .with_context(|| format!("cannot write {}", args.out.display()))?;
    info!(
        "Wrote {} ({:.2}s, {} fitted, {} overruns)",
        args.out.display(),
        output.report.cursor,
        output.report.stats.fitted,
        output.report.stats.overruns
    );

    if let Some(path) = &args.manifest {
        let manifest = Manifest {
            input: args.input.display().to_string(),
            output: args.out.display().to_string(),
            config: &config,
            report: &output.report,
        };
        fs::write(path, serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!("Manifest written to {}", path.display());
    }

    info!("Process complete.");
    Ok(())
}
