use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;

/// Opaque handle to an audio clip owned by a [`ClipStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClipId(usize);

impl ClipId {
    pub fn get(self) -> usize {
        self.0
    }
}

/// A clip slot: its handle plus the file backing it.
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    pub path: PathBuf,
}

/// Run-scoped table of temporary audio clips.
///
/// Every clip of a run lives under one temporary directory that is removed
/// when the store is dropped, whichever way the run ends.
pub struct ClipStore {
    dir: TempDir,
    clips: Vec<PathBuf>,
}

impl ClipStore {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("subvoice-").tempdir()?;
        debug!("Created clip store at {}", dir.path().display());
        Ok(Self {
            dir,
            clips: Vec::new(),
        })
    }

    /// Reserves a new WAV clip slot. Nothing is written to disk yet.
    pub fn allocate(&mut self, label: &str) -> Clip {
        let id = ClipId(self.clips.len());
        let path = self.dir.path().join(format!("{:05}_{}.wav", id.0, label));
        self.clips.push(path.clone());
        Clip { id, path }
    }

    pub fn get(&self, id: ClipId) -> Option<Clip> {
        self.clips.get(id.0).map(|path| Clip {
            id,
            path: path.clone(),
        })
    }

    /// A path inside the store for intermediate files that are not clips.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Removes the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Silence,
    Speech,
}

/// One entry of the output timeline, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub clip: ClipId,
    pub duration: f64,
    /// Cue the segment belongs to; silences carry the cue they lead into.
    pub cue: usize,
}
