//! Speak a subtitle track as one audio file that follows the subtitle timing.

pub mod args;
pub mod audio;
pub mod clip;
pub mod config;
pub mod cue;
pub mod error;
pub mod ffmpeg;
pub mod pipeline;
pub mod progress;
pub mod services;
pub mod subtitle;
pub mod sync;
pub mod tts;

pub use clip::{ClipId, ClipStore, Segment, SegmentKind};
pub use config::{ProbePolicy, RateConfig, SyncConfig, SyncMode};
pub use cue::Cue;
pub use error::{DubError, DubResult};
pub use pipeline::{Backends, DubOutput, DubRun, dub};
pub use sync::{SyncReport, Synchronizer};
