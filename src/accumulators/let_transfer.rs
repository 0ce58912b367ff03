//! Dose- and track-weighted linear energy transfer.
//!
//! For every step the stopping power $S$ supplied by the caller is weighted once with the energy
//! deposit $\epsilon$ and once with the step length $l$:
//!
//! $$ \bar{L}_D = \frac{\sum \epsilon S}{\sum \epsilon}, \qquad
//!    \bar{L}_T = \frac{\sum l S}{\sum l} $$
//!
//! Numerators and denominators are kept apart until [`LetAccumulator::finalize`], so that partial
//! results of several workers can be merged exactly.
use super::check_same_grid;
use crate::core::ratio::RatioSum;
use crate::core::{Particle, Real};
use crate::error::{Result, ScoreError};
use crate::grid::{try_filled, Voxel, VoxelGrid};
use crate::species::{SpeciesKey, SpeciesRegistry, Tally};
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;

/// Numerator/denominator pairs of the dose- and track-weighted LET for every voxel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LetCells<T> {
    dose: Vec<RatioSum<T>>,
    track: Vec<RatioSum<T>>,
}

impl<T: Real> LetCells<T> {
    fn add(&mut self, n: usize, energy_deposit: T, step_length: T, stopping_power: T) {
        self.dose[n].add_weighted(stopping_power, energy_deposit);
        self.track[n].add_weighted(stopping_power, step_length);
    }

    /// Returns the dose-weighted sums per voxel.
    pub fn dose(&self) -> &[RatioSum<T>] {
        &self.dose
    }

    /// Returns the track-weighted sums per voxel.
    pub fn track(&self) -> &[RatioSum<T>] {
        &self.track
    }

    /// Divide every numerator by its denominator; voxels without any weight get zero.
    pub fn into_values(self) -> LetValues<T> {
        LetValues {
            dose_weighted: self.dose.iter().map(RatioSum::ratio).collect(),
            track_weighted: self.track.iter().map(RatioSum::ratio).collect(),
        }
    }
}

impl<T: Real> Tally for LetCells<T> {
    fn zeroed(voxels: usize) -> std::result::Result<Self, TryReserveError> {
        Ok(Self {
            dose: try_filled(voxels, RatioSum::zero())?,
            track: try_filled(voxels, RatioSum::zero())?,
        })
    }

    fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.dose.len(), other.dose.len());
        self.dose
            .iter_mut()
            .zip(other.dose)
            .for_each(|(a, b)| *a += b);
        self.track
            .iter_mut()
            .zip(other.track)
            .for_each(|(a, b)| *a += b);
    }
}

/// Finalised LET of every voxel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LetValues<T> {
    /// Dose-weighted LET per voxel.
    pub dose_weighted: Vec<T>,
    /// Track-weighted LET per voxel.
    pub track_weighted: Vec<T>,
}

/// Accumulates the LET per voxel, for every species and for all species combined.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LetAccumulator<T> {
    grid: VoxelGrid<T>,
    registry: SpeciesRegistry<LetCells<T>>,
    total: LetCells<T>,
}

impl<T: Real> LetAccumulator<T> {
    /// Create an empty accumulator over `grid`.
    pub fn new(grid: VoxelGrid<T>) -> Result<Self> {
        let total = LetCells::zeroed(grid.len()).map_err(|_| ScoreError::OutOfMemory {
            species: "total".to_string(),
            voxels: grid.len(),
        })?;

        Ok(Self {
            registry: SpeciesRegistry::new(grid.len()),
            grid,
            total,
        })
    }

    /// Score one step of species `key` with the electronic `stopping_power` evaluated at the mean
    /// kinetic energy of the step.
    ///
    /// The caller is responsible for only passing steps of charged hadrons and ions with positive
    /// `energy_deposit` and `step_length`; this is not checked here. If the storage for a new
    /// species cannot be allocated the step is dropped completely, including its contribution to
    /// the totals.
    pub fn fill_let(
        &mut self,
        voxel: Voxel,
        energy_deposit: T,
        step_length: T,
        key: SpeciesKey,
        particle: &Particle,
        stopping_power: T,
    ) -> Result<()> {
        let n = self.grid.index(voxel);
        self.registry
            .lookup(key, particle)?
            .add(n, energy_deposit, step_length, stopping_power);
        self.total
            .add(n, energy_deposit, step_length, stopping_power);
        Ok(())
    }

    /// Returns the per-species sums.
    pub fn registry(&self) -> &SpeciesRegistry<LetCells<T>> {
        &self.registry
    }

    /// Returns the sums over all species.
    pub fn total(&self) -> &LetCells<T> {
        &self.total
    }

    /// Returns the grid the LET is scored on.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Add the sums scored by `other`.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        check_same_grid(&self.grid, &other.grid)?;
        self.registry.merge(other.registry);
        self.total.merge(other.total);
        Ok(())
    }

    /// Convert all numerator/denominator pairs into LET values and sort the species by atomic and
    /// mass number.
    ///
    /// This consumes the accumulator, so no step can be scored after finalisation.
    pub fn finalize(self) -> LetScores<T> {
        let mut registry = self.registry.map_cells(LetCells::into_values);
        registry.sort_by_nuclide();

        LetScores {
            grid: self.grid,
            registry,
            total: self.total.into_values(),
        }
    }
}

/// The LET values of a finished run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LetScores<T> {
    grid: VoxelGrid<T>,
    registry: SpeciesRegistry<LetValues<T>>,
    total: LetValues<T>,
}

impl<T> LetScores<T> {
    /// Returns the grid the LET was scored on.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Returns the LET per species, sorted by atomic and mass number.
    pub fn registry(&self) -> &SpeciesRegistry<LetValues<T>> {
        &self.registry
    }

    /// Returns the LET of all species combined.
    pub fn total(&self) -> &LetValues<T> {
        &self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_fill_let_single_step() {
        let grid = VoxelGrid::new(1, 1, 1, 1.0).unwrap();
        let mut let_acc = LetAccumulator::<f64>::new(grid).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), true);

        let_acc
            .fill_let(Voxel::new(0, 0, 0), 2.0, 1.0, key, &proton, 3.0)
            .unwrap();

        assert_eq!(let_acc.registry().len(), 1);
        let cells = let_acc.registry().get(key).unwrap();
        assert_eq!(cells.dose()[0], RatioSum::new(6.0, 2.0));
        assert_eq!(cells.track()[0], RatioSum::new(3.0, 1.0));
        assert_eq!(let_acc.total().dose()[0], RatioSum::new(6.0, 2.0));
        assert_eq!(let_acc.total().track()[0], RatioSum::new(3.0, 1.0));

        let scores = let_acc.finalize();
        let values = scores.registry().get(key).unwrap();
        assert_eq!(values.dose_weighted, vec![3.0]);
        assert_eq!(values.track_weighted, vec![3.0]);
        assert_eq!(scores.total().dose_weighted, vec![3.0]);
    }

    #[test]
    fn test_dose_and_track_weighting_differ() {
        let grid = VoxelGrid::new(1, 1, 2, 1.0).unwrap();
        let mut let_acc = LetAccumulator::<f64>::new(grid).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), false);
        let voxel = Voxel::new(0, 0, 1);

        // (deposit, length, stopping power)
        let_acc.fill_let(voxel, 1.0, 2.0, key, &proton, 1.0).unwrap();
        let_acc.fill_let(voxel, 3.0, 1.0, key, &proton, 5.0).unwrap();

        let scores = let_acc.finalize();
        let values = scores.registry().get(key).unwrap();

        // dose weighted: (1*1 + 3*5) / 4, track weighted: (2*1 + 1*5) / 3
        assert_approx_eq!(values.dose_weighted[1], 4.0, 1e-15);
        assert_approx_eq!(values.track_weighted[1], 7.0 / 3.0, 1e-15);

        // the untouched voxel has no weight and reports zero
        assert_eq!(values.dose_weighted[0], 0.0);
        assert_eq!(values.track_weighted[0], 0.0);
    }

    #[test]
    fn test_totals_combine_species() {
        let grid = VoxelGrid::new(1, 1, 1, 1.0).unwrap();
        let mut let_acc = LetAccumulator::<f64>::new(grid).unwrap();
        let proton = Particle::proton();
        let alpha = Particle::nucleus(2, 4, "alpha");
        let voxel = Voxel::new(0, 0, 0);

        let_acc
            .fill_let(voxel, 1.0, 1.0, SpeciesKey::new(proton.grouped_code(), true), &proton, 2.0)
            .unwrap();
        let_acc
            .fill_let(voxel, 1.0, 1.0, SpeciesKey::new(alpha.grouped_code(), false), &alpha, 10.0)
            .unwrap();

        let scores = let_acc.finalize();
        assert_eq!(scores.registry().len(), 2);
        assert_approx_eq!(scores.total().dose_weighted[0], 6.0, 1e-15);
        assert_approx_eq!(scores.total().track_weighted[0], 6.0, 1e-15);
    }

    #[test]
    fn test_finalize_sorts_species() {
        let grid = VoxelGrid::new(1, 1, 1, 1.0).unwrap();
        let mut let_acc = LetAccumulator::<f64>::new(grid).unwrap();
        let voxel = Voxel::new(0, 0, 0);

        for particle in &[
            Particle::nucleus(6, 13, "C13"),
            Particle::nucleus(6, 12, "C12"),
            Particle::proton(),
        ] {
            let key = SpeciesKey::new(particle.grouped_code(), false);
            let_acc.fill_let(voxel, 1.0, 1.0, key, particle, 1.0).unwrap();
        }

        let names = let_acc
            .finalize()
            .registry()
            .species()
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["proton", "C12", "C13"]);
    }

    #[test]
    fn test_merge_equals_single_accumulator() {
        let grid = VoxelGrid::new(2, 1, 1, 1.0).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), true);
        let steps = [(0, 1.0, 0.5, 4.0), (1, 2.0, 1.0, 3.0), (0, 0.5, 0.25, 8.0)];

        let mut single = LetAccumulator::<f64>::new(grid.clone()).unwrap();
        for &(i, de, dx, s) in &steps {
            single.fill_let(Voxel::new(i, 0, 0), de, dx, key, &proton, s).unwrap();
        }

        let mut first = LetAccumulator::<f64>::new(grid.clone()).unwrap();
        let mut second = LetAccumulator::<f64>::new(grid).unwrap();
        for &(i, de, dx, s) in &steps[..1] {
            first.fill_let(Voxel::new(i, 0, 0), de, dx, key, &proton, s).unwrap();
        }
        for &(i, de, dx, s) in &steps[1..] {
            second.fill_let(Voxel::new(i, 0, 0), de, dx, key, &proton, s).unwrap();
        }
        first.merge(second).unwrap();

        assert_eq!(first.registry().get(key), single.registry().get(key));
        assert_eq!(first.total(), single.total());
    }
}
