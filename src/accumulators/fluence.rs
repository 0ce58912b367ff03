//! Particle fluence per voxel and species.
use super::SpeciesMatrix;
use crate::core::{Particle, Real};
use crate::error::Result;
use crate::grid::{Voxel, VoxelGrid};
use crate::species::{SpeciesKey, SpeciesRegistry};
use serde::{Deserialize, Serialize};

/// Estimates the fluence in every voxel as the summed path length per unit volume.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FluenceAccumulator<T> {
    matrix: SpeciesMatrix<T>,
}

impl<T: Real> FluenceAccumulator<T> {
    /// Create an empty accumulator over `grid`.
    pub fn new(grid: VoxelGrid<T>) -> Self {
        Self {
            matrix: SpeciesMatrix::new(grid),
        }
    }

    /// Add the contribution `step_length / voxel_volume` of one step to `voxel` of species `key`.
    pub fn fill_fluence(
        &mut self,
        voxel: Voxel,
        step_length: T,
        voxel_volume: T,
        key: SpeciesKey,
        particle: &Particle,
    ) -> Result<()> {
        debug_assert!(voxel_volume > T::zero());
        self.matrix
            .add(voxel, key, particle, step_length / voxel_volume)
    }

    /// Returns the fluences per species.
    pub fn registry(&self) -> &SpeciesRegistry<Vec<T>> {
        self.matrix.registry()
    }

    /// Returns the grid the fluence is scored on.
    pub fn grid(&self) -> &VoxelGrid<T> {
        self.matrix.grid()
    }

    /// Sort the species by atomic and mass number.
    pub fn sort_by_nuclide(&mut self) {
        self.matrix.sort_by_nuclide();
    }

    /// Add the fluence scored by `other`.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        self.matrix.merge(other.matrix)
    }
}
