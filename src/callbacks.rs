//! Implementation of different callback functions.
use crate::run::RunSummary;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trait for callbacks invoked once a run has ended and its outputs are written.
pub trait Callback {
    /// This method is called with the summary of every successfully finished run and may print
    /// information about it.
    fn print(&self, summary: &RunSummary);
}

/// A callback function that does nothing
pub struct SinkCallback {}

impl Callback for SinkCallback {
    fn print(&self, _: &RunSummary) {}
}

/// A callback function that logs the summary of the run
pub struct SimpleCallback {}

impl Callback for SimpleCallback {
    fn print(&self, summary: &RunSummary) {
        info!(
            "run finished: {} events on {} workers, {} steps scored, {} steps dropped",
            summary.event_count, summary.workers, summary.scored_steps, summary.skipped_steps
        );
        info!("species: {}", summary.species.join(" "));

        for file in &summary.files {
            info!("output written to {}", file.display());
        }
    }
}

/// Callback that writes the summary of the run as JSON to a file.
pub struct FileWriterCallback {
    path: PathBuf,
}

impl FileWriterCallback {
    /// Create a callback writing to `path`; an existing file is overwritten.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Callback for FileWriterCallback {
    fn print(&self, summary: &RunSummary) {
        // a failing summary file does not fail the run
        if let Err(error) = write_summary(&self.path, summary) {
            warn!(
                "could not write the run summary to {}: {}",
                self.path.display(),
                error
            );
        }
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()
}
