//! Deposited energy per voxel and species.
use super::SpeciesMatrix;
use crate::core::{Particle, Real};
use crate::error::Result;
use crate::grid::{Voxel, VoxelGrid};
use crate::species::{SpeciesKey, SpeciesRegistry};
use serde::{Deserialize, Serialize};

/// Sums the energy deposited in every voxel, separately for every species.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DoseAccumulator<T> {
    matrix: SpeciesMatrix<T>,
}

impl<T: Real> DoseAccumulator<T> {
    /// Create an empty accumulator over `grid`.
    pub fn new(grid: VoxelGrid<T>) -> Self {
        Self {
            matrix: SpeciesMatrix::new(grid),
        }
    }

    /// Add `energy_deposit` to `voxel` of species `key`.
    ///
    /// Fails with [`crate::ScoreError::OutOfMemory`] if `key` is new and its storage cannot be
    /// allocated; the deposit is lost in that case.
    pub fn fill_edep(
        &mut self,
        voxel: Voxel,
        energy_deposit: T,
        key: SpeciesKey,
        particle: &Particle,
    ) -> Result<()> {
        self.matrix.add(voxel, key, particle, energy_deposit)
    }

    /// Returns the deposited energies per species.
    pub fn registry(&self) -> &SpeciesRegistry<Vec<T>> {
        self.matrix.registry()
    }

    /// Returns the grid the energies are scored on.
    pub fn grid(&self) -> &VoxelGrid<T> {
        self.matrix.grid()
    }

    /// Sort the species by atomic and mass number.
    pub fn sort_by_nuclide(&mut self) {
        self.matrix.sort_by_nuclide();
    }

    /// Add the deposits scored by `other`.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        self.matrix.merge(other.matrix)
    }
}
