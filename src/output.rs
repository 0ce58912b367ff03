//! Tab-separated output tables.
//!
//! Every table has one header line and one row per voxel, in row-major `(i, j, k)` order. The
//! `Total` column holds the sum over all species columns; voxels where this sum vanishes are not
//! written at all.
use crate::accumulators::LetValues;
use crate::config::RunConfig;
use crate::core::Real;
use crate::error::{Result, ScoreError};
use crate::grid::VoxelGrid;
use crate::scorer::FinalScores;
use crate::species::SpeciesRegistry;
use crate::units;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Name of the energy deposit table.
pub const EDEP_FILE: &str = "Edep.out";
/// Name of the dose-weighted LET table.
pub const LET_FILE: &str = "Let.out";
/// Name of the track-weighted LET table.
pub const LET_TRACK_FILE: &str = "LetTrack.out";
/// Name of the table with the LET of all species combined.
pub const LET_TOTAL_FILE: &str = "LetTotal.out";
/// Name of the fluence table.
pub const FLUENCE_FILE: &str = "Fluence.out";

/// Writes one value per voxel and species as a table, every value `v` being written as
/// `v * scale / unit`.
#[derive(Clone, Copy, Debug)]
pub struct TableWriter<T> {
    unit: T,
    scale: T,
    species_columns: bool,
}

impl<T: Real> TableWriter<T> {
    /// A writer printing values in `unit`, without scaling and with one column per species.
    pub fn new(unit: T) -> Self {
        Self {
            unit,
            scale: T::one(),
            species_columns: true,
        }
    }

    /// Multiply every value by `scale` before writing.
    pub fn scale(mut self, scale: T) -> Self {
        self.scale = scale;
        self
    }

    /// Whether a column per species is written after the total.
    pub fn species_columns(mut self, species_columns: bool) -> Self {
        self.species_columns = species_columns;
        self
    }

    /// Write the table of `registry` to `writer`. `column` selects the per-voxel values out of
    /// the storage of each species.
    pub fn write<C, F, W>(
        &self,
        mut writer: W,
        grid: &VoxelGrid<T>,
        registry: &SpeciesRegistry<C>,
        column: F,
    ) -> io::Result<()>
    where
        F: Fn(&C) -> &[T],
        W: Write,
    {
        write!(writer, "i\tj\tk\tTotal")?;
        if self.species_columns {
            for species in registry.species() {
                write!(writer, "\t{}", species.column_name())?;
            }
        }
        writeln!(writer)?;

        let columns = registry
            .entries()
            .iter()
            .map(|entry| column(entry.cells()))
            .collect::<Vec<_>>();

        for voxel in grid.voxels() {
            let n = grid.index(voxel);
            let total = columns.iter().fold(T::zero(), |acc, values| acc + values[n]);

            if total == T::zero() {
                continue;
            }

            write!(
                writer,
                "{}\t{}\t{}\t{}",
                voxel.i,
                voxel.j,
                voxel.k,
                self.convert(total)
            )?;
            if self.species_columns {
                for values in &columns {
                    write!(writer, "\t{}", self.convert(values[n]))?;
                }
            }
            writeln!(writer)?;
        }

        writer.flush()
    }

    /// Write the table of `registry` to a new file at `path`.
    pub fn write_file<C, F>(
        &self,
        path: &Path,
        grid: &VoxelGrid<T>,
        registry: &SpeciesRegistry<C>,
        column: F,
    ) -> Result<()>
    where
        F: Fn(&C) -> &[T],
    {
        let file = File::create(path).map_err(|e| ScoreError::io(path, e))?;
        self.write(BufWriter::new(file), grid, registry, column)
            .map_err(|e| ScoreError::io(path, e))
    }

    fn convert(&self, value: T) -> T {
        value * self.scale / self.unit
    }
}

/// Write the dose- and track-weighted LET of all species combined, as columns `LDT` and `LTT`.
/// Voxels where both vanish are skipped.
pub fn write_total_let<T, W>(
    mut writer: W,
    grid: &VoxelGrid<T>,
    total: &LetValues<T>,
) -> io::Result<()>
where
    T: Real,
    W: Write,
{
    let unit = unit::<T>(units::KEV_PER_UM);

    writeln!(writer, "i\tj\tk\tLDT\tLTT")?;

    for voxel in grid.voxels() {
        let n = grid.index(voxel);
        let dose_weighted = total.dose_weighted[n];
        let track_weighted = total.track_weighted[n];

        if dose_weighted == T::zero() && track_weighted == T::zero() {
            continue;
        }

        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            voxel.i,
            voxel.j,
            voxel.k,
            dose_weighted / unit,
            track_weighted / unit
        )?;
    }

    writer.flush()
}

/// Write all output tables of a run with `event_count` primaries into the output directory of
/// `config`, creating it if needed, and return the paths of the written files.
///
/// Energy deposits are written in MeV per primary, LETs in keV/µm and fluences in cm⁻².
pub fn write_outputs<T: Real>(
    scores: &FinalScores<T>,
    event_count: usize,
    config: &RunConfig,
) -> Result<Vec<PathBuf>> {
    let dir = &config.output_dir;
    fs::create_dir_all(dir).map_err(|e| ScoreError::io(dir, e))?;

    let grid = scores.grid();
    let let_scores = scores.let_scores();
    let mut files = Vec::new();

    // an empty run has no rows to scale
    let per_event = T::from_usize(event_count.max(1)).map_or_else(T::one, T::recip);

    let path = dir.join(EDEP_FILE);
    TableWriter::new(unit(units::MEV))
        .scale(per_event)
        .species_columns(config.species_columns)
        .write_file(&path, grid, scores.dose().registry(), Vec::as_slice)?;
    files.push(path);

    let let_writer =
        TableWriter::new(unit(units::KEV_PER_UM)).species_columns(config.species_columns);

    let path = dir.join(LET_FILE);
    let_writer.write_file(&path, grid, let_scores.registry(), |values| {
        values.dose_weighted.as_slice()
    })?;
    files.push(path);

    if config.track_let {
        let path = dir.join(LET_TRACK_FILE);
        let_writer.write_file(&path, grid, let_scores.registry(), |values| {
            values.track_weighted.as_slice()
        })?;
        files.push(path);
    }

    if config.total_let {
        let path = dir.join(LET_TOTAL_FILE);
        let file = File::create(&path).map_err(|e| ScoreError::io(&path, e))?;
        write_total_let(BufWriter::new(file), grid, let_scores.total())
            .map_err(|e| ScoreError::io(&path, e))?;
        files.push(path);
    }

    let path = dir.join(FLUENCE_FILE);
    TableWriter::new(unit(units::PER_CM2))
        .species_columns(config.species_columns)
        .write_file(&path, grid, scores.fluence().registry(), Vec::as_slice)?;
    files.push(path);

    for file in &files {
        debug!("wrote {}", file.display());
    }

    Ok(files)
}

fn unit<T: Real>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::one)
}
