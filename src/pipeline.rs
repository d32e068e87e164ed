use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::clip::ClipStore;
use crate::config::SyncConfig;
use crate::cue::Cue;
use crate::error::{DubError, DubResult};
use crate::progress::ProgressObserver;
use crate::services::{Concatenator, Services};
use crate::sync::{SyncReport, Synchronizer};

/// Every external service one run needs.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub services: Services<'a>,
    pub concatenator: &'a dyn Concatenator,
}

#[derive(Debug)]
pub struct DubOutput {
    /// The encoded output stream.
    pub audio: Vec<u8>,
    pub report: SyncReport,
}

/// A single run with its own scratch directory.
///
/// The directory and every clip in it are removed when the run finishes,
/// fails, or is dropped before it starts.
pub struct DubRun {
    store: ClipStore,
}

impl DubRun {
    pub fn new() -> DubResult<Self> {
        Ok(Self {
            store: ClipStore::new()?,
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.store.dir()
    }

    pub async fn execute(
        mut self,
        cues: &[Cue],
        config: &SyncConfig,
        backends: Backends<'_>,
        observer: &dyn ProgressObserver,
    ) -> DubResult<DubOutput> {
        let report = Synchronizer::new(config, backends.services, &mut self.store)
            .run(cues, observer)
            .await?;

        observer.status("Joining segments");
        let inputs = report
            .segments
            .iter()
            .map(|segment| {
                self.store
                    .get(segment.clip)
                    .map(|clip| clip.path)
                    .ok_or_else(|| {
                        DubError::Concat(anyhow::anyhow!(
                            "segment for cue #{} refers to an unknown clip",
                            segment.cue + 1
                        ))
                    })
            })
            .collect::<DubResult<Vec<PathBuf>>>()?;
        let audio = backends
            .concatenator
            .concat(&inputs, self.store.dir())
            .await
            .map_err(DubError::Concat)?;

        info!(
            "Output ready: {} bytes, {:.2}s from {} segments",
            audio.len(),
            report.cursor,
            report.segments.len()
        );
        if let Err(e) = self.store.close() {
            warn!("Could not remove the scratch directory: {}", e);
        }
        observer.status("Done");
        Ok(DubOutput { audio, report })
    }
}

/// Runs the whole pipeline in a fresh scratch directory.
pub async fn dub(
    cues: &[Cue],
    config: &SyncConfig,
    backends: Backends<'_>,
    observer: &dyn ProgressObserver,
) -> DubResult<DubOutput> {
    DubRun::new()?.execute(cues, config, backends, observer).await
}
