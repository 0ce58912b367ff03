//! Per-voxel, per-species accumulators.
pub mod dose;
pub mod fluence;
pub mod let_transfer;

pub use dose::DoseAccumulator;
pub use fluence::FluenceAccumulator;
pub use let_transfer::{LetAccumulator, LetCells, LetScores, LetValues};

use crate::core::{Particle, Real};
use crate::error::{Result, ScoreError};
use crate::grid::{Voxel, VoxelGrid};
use crate::species::{SpeciesKey, SpeciesRegistry};
use serde::{Deserialize, Serialize};

/// One scalar per voxel and species, the storage shared by the dose and fluence accumulators.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpeciesMatrix<T> {
    grid: VoxelGrid<T>,
    registry: SpeciesRegistry<Vec<T>>,
}

impl<T: Real> SpeciesMatrix<T> {
    /// Create an empty matrix over `grid`.
    pub fn new(grid: VoxelGrid<T>) -> Self {
        let registry = SpeciesRegistry::new(grid.len());
        Self { grid, registry }
    }

    /// Add `value` to the cell of `voxel` of the species `key`, registering it for `particle` if
    /// necessary.
    pub fn add(
        &mut self,
        voxel: Voxel,
        key: SpeciesKey,
        particle: &Particle,
        value: T,
    ) -> Result<()> {
        let n = self.grid.index(voxel);
        self.registry.lookup(key, particle)?[n] += value;
        Ok(())
    }

    /// Returns the grid of this matrix.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Returns the species and their cells.
    pub fn registry(&self) -> &SpeciesRegistry<Vec<T>> {
        &self.registry
    }

    /// Sort the species by atomic and mass number.
    pub fn sort_by_nuclide(&mut self) {
        self.registry.sort_by_nuclide();
    }

    /// Add the contents of `other`, which must be defined on the same grid.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        check_same_grid(&self.grid, &other.grid)?;
        self.registry.merge(other.registry);
        Ok(())
    }
}

pub(crate) fn check_same_grid<T: Real>(
    expected: &VoxelGrid<T>,
    found: &VoxelGrid<T>,
) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ScoreError::GridMismatch {
            expected: describe(expected),
            found: describe(found),
        })
    }
}

fn describe<T: Real>(grid: &VoxelGrid<T>) -> String {
    let (nx, ny, nz) = grid.dimensions();
    format!("{} x {} x {} (voxel mass {})", nx, ny, nz, grid.voxel_mass())
}
