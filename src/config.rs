//! Run configuration.
use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Default seed of the per-event random number generators.
pub const DEFAULT_SEED: u64 = 0xcafe_f00d_d15e_a5e5;

/// Settings of a scoring run. Every field has a default, so a configuration file only needs to
/// list the settings it changes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory the output tables are written to.
    pub output_dir: PathBuf,
    /// Whether the tables contain one column per species or only the total.
    pub species_columns: bool,
    /// Whether the track-weighted LET per species is written to `LetTrack.out`.
    pub track_let: bool,
    /// Whether the LET of all species combined is written to `LetTotal.out`.
    pub total_let: bool,
    /// Number of worker threads.
    pub workers: usize,
    /// Seed of the random number generators of synthetic runs.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            species_columns: true,
            track_let: true,
            total_let: true,
            workers: thread::available_parallelism().map_or(1, usize::from),
            seed: DEFAULT_SEED,
        }
    }
}

impl RunConfig {
    /// Parse a configuration from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Read a JSON configuration from the file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;
        Self::from_json(&json)
    }

    // at least one worker is needed to score anything
    fn sanitized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();

        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert!(config.species_columns);
        assert!(config.track_let);
        assert!(config.total_let);
        assert!(config.workers >= 1);
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_partial_json() {
        let config = RunConfig::from_json(r#"{ "species_columns": false, "workers": 0 }"#).unwrap();

        assert!(!config.species_columns);
        assert_eq!(config.workers, 1);
        assert_eq!(config.output_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = RunConfig::from_json(r#"{ "secondaries": true }"#);

        assert!(matches!(result, Err(ScoreError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "output_dir": "results", "seed": 7 }}"#).unwrap();

        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert_eq!(config.seed, 7);

        assert!(matches!(
            RunConfig::from_file("/nonexistent/config.json"),
            Err(ScoreError::Io { .. })
        ));
    }
}
