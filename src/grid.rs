//! This module contains everything related to the voxel grid.
use crate::error::{Result, ScoreError};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;

/// Coordinates `(i, j, k)` of one voxel.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Voxel {
    /// Index along x.
    pub i: usize,
    /// Index along y.
    pub j: usize,
    /// Index along z.
    pub k: usize,
}

impl Voxel {
    /// Constructor.
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

/// Regular three-dimensional grid over which all quantities are scored.
///
/// The grid is immutable for the lifetime of a run. Its cells are stored in flattened form, with
/// the linear index of voxel `(i, j, k)` being `(i * ny + j) * nz + k`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VoxelGrid<T> {
    nx: usize,
    ny: usize,
    nz: usize,
    voxel_mass: T,
}

impl<T: Float> VoxelGrid<T> {
    /// Construct a grid of `nx * ny * nz` voxels, each with mass `voxel_mass`. With `ny == nz == 1`
    /// the grid reduces to slices orthogonal to the x axis.
    pub fn new(nx: usize, ny: usize, nz: usize, voxel_mass: T) -> Result<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ScoreError::InvalidGrid(format!(
                "dimensions must be positive, got {} x {} x {}",
                nx, ny, nz
            )));
        }

        if nx.checked_mul(ny).and_then(|n| n.checked_mul(nz)).is_none() {
            return Err(ScoreError::InvalidGrid(format!(
                "{} x {} x {} voxels overflow the address space",
                nx, ny, nz
            )));
        }

        if !voxel_mass.is_finite() || voxel_mass <= T::zero() {
            return Err(ScoreError::InvalidGrid(
                "voxel mass must be positive and finite".to_string(),
            ));
        }

        Ok(Self {
            nx,
            ny,
            nz,
            voxel_mass,
        })
    }

    /// Returns the mass of a single voxel.
    pub fn voxel_mass(&self) -> T {
        self.voxel_mass
    }
}

impl<T> VoxelGrid<T> {
    /// Returns the number of voxels along each axis.
    pub const fn dimensions(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Returns the total number of voxels.
    pub const fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// A grid always has at least one voxel.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns whether `voxel` lies inside the grid.
    pub const fn contains(&self, voxel: Voxel) -> bool {
        voxel.i < self.nx && voxel.j < self.ny && voxel.k < self.nz
    }

    /// Compute the linear index of `voxel`.
    ///
    /// Passing a voxel outside of the grid is a logic error of the caller.
    pub fn index(&self, voxel: Voxel) -> usize {
        debug_assert!(
            self.contains(voxel),
            "voxel {:?} outside of {} x {} x {} grid",
            voxel,
            self.nx,
            self.ny,
            self.nz
        );
        (voxel.i * self.ny + voxel.j) * self.nz + voxel.k
    }

    /// Iterate over all voxels in row-major `(i, j, k)` order, which is also the order of their
    /// linear indices.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        (0..self.nx).flat_map(move |i| {
            (0..self.ny).flat_map(move |j| (0..self.nz).map(move |k| Voxel::new(i, j, k)))
        })
    }
}

/// Allocate `len` cells set to `value`, reporting allocation failure instead of aborting.
pub(crate) fn try_filled<C: Clone>(
    len: usize,
    value: C,
) -> std::result::Result<Vec<C>, TryReserveError> {
    let mut cells = Vec::new();
    cells.try_reserve_exact(len)?;
    cells.resize(len, value);
    Ok(cells)
}
