//! Error types.
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while scoring a run.
#[derive(Error, Debug)]
pub enum ScoreError {
    /// The storage for a newly discovered species could not be allocated. The step that
    /// discovered it is dropped and the registry is left unchanged.
    #[error("out of memory allocating {voxels} voxels for species {species}")]
    OutOfMemory {
        /// Display name of the species.
        species: String,
        /// Number of voxels requested.
        voxels: usize,
    },

    /// The grid definition is unusable.
    #[error("invalid voxel grid: {0}")]
    InvalidGrid(String),

    /// Scorers set up for different grids cannot be reduced into one.
    #[error("cannot merge scores of a {found} grid into a {expected} grid")]
    GridMismatch {
        /// Description of the grid merged into.
        expected: String,
        /// Description of the offending grid.
        found: String,
    },

    /// A worker thread panicked, the run is aborted.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The run configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ScoreError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, ScoreError>;
