//! Timeline synchronization: turns cues plus freshly synthesized clips into an
//! ordered list of silence and speech segments that follows the cue timeline.
//!
//! Cues are handled strictly in order. Each one may add a silence (when the
//! cursor is behind the cue start), then exactly one speech segment. The
//! cursor only ever moves forward, by the duration of the segment just
//! appended, so it always equals the sum of the emitted durations.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clip::{Clip, ClipStore, Segment, SegmentKind};
use crate::config::{FIT_SLACK, MAX_SPEED_FACTOR, ProbePolicy, SyncConfig};
use crate::cue::Cue;
use crate::error::{DubError, DubResult};
use crate::progress::ProgressObserver;
use crate::services::Services;
use crate::subtitle::format_srt_time;

/// How a synthesized clip should be placed in its slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitDecision {
    Accept,
    Compress {
        /// Factor actually requested, never above [`MAX_SPEED_FACTOR`].
        factor: f64,
        /// Factor that would have been needed to fit the slot exactly.
        required: f64,
    },
}

/// Decides whether a clip of `raw` seconds must be compressed into `slot`.
///
/// A missing or non-positive slot cannot be shrunk into, so the clip is kept.
pub fn plan_fit(raw: f64, slot: Option<f64>) -> FitDecision {
    let Some(allowed) = slot else {
        return FitDecision::Accept;
    };
    if allowed.is_nan() || allowed <= 0.0 || raw <= allowed + FIT_SLACK {
        return FitDecision::Accept;
    }
    let required = raw / allowed;
    FitDecision::Compress {
        factor: required.min(MAX_SPEED_FACTOR),
        required,
    }
}

/// Silence needed to bring `cursor` up to `target_start`, if worth inserting.
pub fn gap_to_fill(target_start: f64, cursor: f64, threshold: f64) -> Option<f64> {
    let gap = target_start - cursor;
    (gap > threshold).then_some(gap)
}

/// Append-only segment list plus the cursor it implies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    cursor: f64,
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn push(&mut self, segment: Segment) {
        debug_assert!(segment.duration >= 0.0);
        self.cursor += segment.duration;
        self.segments.push(segment);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub spoken: usize,
    pub skipped: usize,
    pub fitted: usize,
    pub overruns: usize,
    pub probe_fallbacks: usize,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub segments: Vec<Segment>,
    /// Final cursor, i.e. the total duration of the output.
    pub cursor: f64,
    pub stats: SyncStats,
}

/// Drives one run over a cue sequence. Not reusable across runs.
pub struct Synchronizer<'a> {
    config: &'a SyncConfig,
    services: Services<'a>,
    store: &'a mut ClipStore,
    timeline: Timeline,
    stats: SyncStats,
}

impl<'a> Synchronizer<'a> {
    pub fn new(config: &'a SyncConfig, services: Services<'a>, store: &'a mut ClipStore) -> Self {
        Self {
            config,
            services,
            store,
            timeline: Timeline::new(),
            stats: SyncStats::default(),
        }
    }

    pub async fn run(
        mut self,
        cues: &[Cue],
        observer: &dyn ProgressObserver,
    ) -> DubResult<SyncReport> {
        let total = cues.len();
        info!(
            "Synchronizing {} cues ({:?} mode, voice {}, rate {})",
            total,
            self.config.mode,
            self.config.rate.voice(),
            self.config.rate.rate_string()
        );

        for (position, cue) in cues.iter().enumerate() {
            observer.progress(position + 1, total);
            self.process_cue(cue, observer).await?;
        }

        info!(
            "Timeline complete: {} segments, {:.3}s, {} spoken, {} skipped, {} fitted, {} overruns",
            self.timeline.segments.len(),
            self.timeline.cursor,
            self.stats.spoken,
            self.stats.skipped,
            self.stats.fitted,
            self.stats.overruns
        );
        Ok(SyncReport {
            cursor: self.timeline.cursor,
            segments: self.timeline.segments,
            stats: self.stats,
        })
    }

    async fn process_cue(&mut self, cue: &Cue, observer: &dyn ProgressObserver) -> DubResult<()> {
        if cue.is_blank() {
            debug!("Cue #{} has no speakable text; skipping", cue.index() + 1);
            self.stats.skipped += 1;
            return Ok(());
        }

        self.fill_gap(cue).await?;

        let raw = self.store.allocate("tts");
        debug!("Cue #{} text: {}", cue.index() + 1, cue.text());
        self.services
            .synthesizer
            .synthesize(cue.text(), &self.config.rate, &raw)
            .await
            .map_err(|source| DubError::Synthesis {
                index: cue.index() + 1,
                text: cue.text().to_string(),
                source,
            })?;
        let raw_duration = self.measure(cue, &raw, observer).await?;

        let (clip, duration) = if self.config.mode.fits_clips() {
            self.fit(cue, raw, raw_duration, observer).await?
        } else {
            (raw, raw_duration)
        };

        debug!(
            "Cue #{} speech {:.3}s at {}",
            cue.index() + 1,
            duration,
            format_srt_time(self.timeline.cursor)
        );
        self.timeline.push(Segment {
            kind: SegmentKind::Speech,
            clip: clip.id,
            duration,
            cue: cue.index(),
        });
        self.stats.spoken += 1;
        Ok(())
    }

    async fn fill_gap(&mut self, cue: &Cue) -> DubResult<()> {
        let threshold = self.config.mode.gap_threshold();
        let Some(gap) = gap_to_fill(cue.start(), self.timeline.cursor, threshold) else {
            let drift = self.timeline.cursor - cue.start();
            if drift > 0.0 {
                debug!("Cue #{} starts {:.3}s late", cue.index() + 1, drift);
            }
            return Ok(());
        };

        let clip = self.store.allocate("sil");
        self.services
            .silence
            .silence(gap, &clip)
            .await
            .map_err(|source| DubError::Silence {
                index: cue.index() + 1,
                source,
            })?;
        debug!("Inserted {:.3}s of silence before cue #{}", gap, cue.index() + 1);
        self.timeline.push(Segment {
            kind: SegmentKind::Silence,
            clip: clip.id,
            duration: gap,
            cue: cue.index(),
        });
        Ok(())
    }

    async fn fit(
        &mut self,
        cue: &Cue,
        raw: Clip,
        raw_duration: f64,
        observer: &dyn ProgressObserver,
    ) -> DubResult<(Clip, f64)> {
        let (clip, duration) = match plan_fit(raw_duration, cue.slot()) {
            FitDecision::Accept => (raw, raw_duration),
            FitDecision::Compress { factor, required } => {
                debug!(
                    "Cue #{} runs {:.3}s; compressing at {:.3}x (needs {:.3}x)",
                    cue.index() + 1,
                    raw_duration,
                    factor,
                    required
                );
                let fitted = self.store.allocate("fit");
                self.services
                    .fitter
                    .fit(&raw, factor, &fitted)
                    .await
                    .map_err(|source| DubError::Fit {
                        index: cue.index() + 1,
                        text: cue.text().to_string(),
                        source,
                    })?;
                self.stats.fitted += 1;
                let duration = self.measure(cue, &fitted, observer).await?;
                (fitted, duration)
            }
        };

        if let Some(allowed) = cue.slot().filter(|s| *s > 0.0) {
            if duration > allowed + FIT_SLACK {
                self.stats.overruns += 1;
                let message = format!(
                    "Cue #{} overruns its {:.2}s slot by {:.2}s",
                    cue.index() + 1,
                    allowed,
                    duration - allowed
                );
                warn!("{}", message);
                observer.status(&message);
            }
        }
        Ok((clip, duration))
    }

    async fn measure(
        &mut self,
        cue: &Cue,
        clip: &Clip,
        observer: &dyn ProgressObserver,
    ) -> DubResult<f64> {
        let probed = self.services.prober.probe(clip).await.and_then(|d| {
            if d.is_finite() && d >= 0.0 {
                Ok(d)
            } else {
                Err(anyhow::anyhow!("prober returned invalid duration {}", d))
            }
        });
        match probed {
            Ok(duration) => Ok(duration),
            Err(source) if self.config.probe_policy == ProbePolicy::Lenient => {
                self.stats.probe_fallbacks += 1;
                let message = format!(
                    "Could not measure cue #{} ({}); counting it as 0s",
                    cue.index() + 1,
                    source
                );
                warn!("{}", message);
                observer.status(&message);
                Ok(0.0)
            }
            Err(source) => Err(DubError::Probe {
                index: cue.index() + 1,
                text: cue.text().to_string(),
                source,
            }),
        }
    }
}
