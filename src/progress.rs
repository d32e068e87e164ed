use tracing::info;

/// Receives run progress. Purely observational.
pub trait ProgressObserver: Send + Sync {
    fn progress(&self, processed: usize, total: usize);
    fn status(&self, message: &str);
}

/// Reports progress through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn progress(&self, processed: usize, total: usize) {
        info!("Processing cue {}/{}", processed, total);
    }

    fn status(&self, message: &str) {
        info!("{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn progress(&self, _processed: usize, _total: usize) {}
    fn status(&self, _message: &str) {}
}
