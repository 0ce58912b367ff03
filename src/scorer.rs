//! The per-worker set of accumulators and the routing of transport steps into them.
use crate::accumulators::{DoseAccumulator, FluenceAccumulator, LetAccumulator, LetScores};
use crate::core::{Real, Step, StoppingPower};
use crate::error::{Result, ScoreError};
use crate::grid::VoxelGrid;
use log::warn;
use serde::{Deserialize, Serialize};

/// Scores the steps of one worker.
///
/// A `Scorer` is never shared between threads while steps are scored. At the end of a run the
/// scorers of all workers are merged with [`Scorer::merge`] and finalised once.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Scorer<T> {
    grid: VoxelGrid<T>,
    dose: DoseAccumulator<T>,
    let_transfer: LetAccumulator<T>,
    fluence: FluenceAccumulator<T>,
    scored_steps: usize,
    skipped_steps: usize,
    #[serde(skip)]
    oom_reported: bool,
}

impl<T: Real> Scorer<T> {
    /// Create an empty scorer over `grid`.
    pub fn new(grid: VoxelGrid<T>) -> Result<Self> {
        Ok(Self {
            dose: DoseAccumulator::new(grid.clone()),
            let_transfer: LetAccumulator::new(grid.clone())?,
            fluence: FluenceAccumulator::new(grid.clone()),
            grid,
            scored_steps: 0,
            skipped_steps: 0,
            oom_reported: false,
        })
    }

    /// Score a single transport step.
    ///
    /// Electron steps and steps that deposit no energy are ignored. Every other step adds its
    /// energy deposit, including the energy of the secondary electrons it produced, to the dose
    /// and its path length to the fluence. Steps of protons and ions with positive deposit and
    /// length also contribute to the LET; only for those `stopping_power` is evaluated.
    ///
    /// If the storage for a species seen for the first time cannot be allocated, the affected
    /// contribution is dropped and counted in [`Scorer::skipped_steps`]; the first such failure
    /// is logged.
    pub fn score_step<M>(
        &mut self,
        step: &Step<'_, T, M>,
        stopping_power: &impl StoppingPower<T, M>,
    ) {
        let particle = step.particle;

        if particle.is_electron() {
            return;
        }

        let deposit = step.total_deposit();

        if deposit == T::zero() {
            return;
        }

        let key = step.species_key();
        let mut result = self.dose.fill_edep(step.voxel, deposit, key, particle);

        let has_length = step.step_length > T::zero();

        if particle.is_let_relevant() && deposit > T::zero() && has_length {
            let dedx =
                stopping_power.electronic_dedx(step.mean_kinetic_energy, particle, step.material);
            result = result.and(self.let_transfer.fill_let(
                step.voxel,
                deposit,
                step.step_length,
                key,
                particle,
                dedx,
            ));
        }

        if has_length {
            result = result.and(self.fluence.fill_fluence(
                step.voxel,
                step.step_length,
                step.voxel_volume,
                key,
                particle,
            ));
        }

        match result {
            Ok(()) => self.scored_steps += 1,
            Err(error) => self.skip(&error),
        }
    }

    fn skip(&mut self, error: &ScoreError) {
        self.skipped_steps += 1;

        if !self.oom_reported {
            self.oom_reported = true;
            warn!("{}; dropping the step, further failures are only counted", error);
        }
    }

    /// Returns the grid this scorer scores on.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Returns the accumulated energy deposits.
    pub fn dose(&self) -> &DoseAccumulator<T> {
        &self.dose
    }

    /// Returns the accumulated LET sums.
    pub fn let_transfer(&self) -> &LetAccumulator<T> {
        &self.let_transfer
    }

    /// Returns the accumulated fluence.
    pub fn fluence(&self) -> &FluenceAccumulator<T> {
        &self.fluence
    }

    /// Returns the number of steps scored completely.
    pub fn scored_steps(&self) -> usize {
        self.scored_steps
    }

    /// Returns the number of steps that were, at least partially, dropped because memory for a
    /// new species could not be allocated.
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }

    /// Add everything scored by `other`.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        self.dose.merge(other.dose)?;
        self.let_transfer.merge(other.let_transfer)?;
        self.fluence.merge(other.fluence)?;
        self.scored_steps += other.scored_steps;
        self.skipped_steps += other.skipped_steps;
        Ok(())
    }

    /// Turn the LET sums into LET values and put the species of every product into their output
    /// order.
    pub fn finalize(self) -> FinalScores<T> {
        let mut dose = self.dose;
        let mut fluence = self.fluence;
        dose.sort_by_nuclide();
        fluence.sort_by_nuclide();

        FinalScores {
            grid: self.grid,
            dose,
            let_scores: self.let_transfer.finalize(),
            fluence,
            scored_steps: self.scored_steps,
            skipped_steps: self.skipped_steps,
        }
    }
}

/// Scores of a finished run, ready to be written.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FinalScores<T> {
    grid: VoxelGrid<T>,
    dose: DoseAccumulator<T>,
    let_scores: LetScores<T>,
    fluence: FluenceAccumulator<T>,
    scored_steps: usize,
    skipped_steps: usize,
}

impl<T: Real> FinalScores<T> {
    /// Returns the scoring grid.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Returns the energy deposits.
    pub fn dose(&self) -> &DoseAccumulator<T> {
        &self.dose
    }

    /// Returns the LET values.
    pub fn let_scores(&self) -> &LetScores<T> {
        &self.let_scores
    }

    /// Returns the fluences.
    pub fn fluence(&self) -> &FluenceAccumulator<T> {
        &self.fluence
    }

    /// Returns the number of completely scored steps.
    pub fn scored_steps(&self) -> usize {
        self.scored_steps
    }

    /// Returns the number of steps dropped for lack of memory.
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }

    /// Returns the column names of every species that deposited energy, in output order.
    pub fn species_names(&self) -> Vec<String> {
        self.dose
            .registry()
            .species()
            .map(|species| species.column_name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Particle;
    use crate::grid::Voxel;
    use crate::species::SpeciesKey;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Water;

    fn step<'a>(
        particle: &'a Particle,
        voxel: Voxel,
        energy_deposit: f64,
        step_length: f64,
        track_id: u32,
    ) -> Step<'a, f64, Water> {
        Step {
            voxel,
            energy_deposit,
            secondary_electron_energy: 0.0,
            step_length,
            mean_kinetic_energy: 100.0,
            track_id,
            particle,
            material: &Water,
            voxel_volume: 2.0,
        }
    }

    fn constant_dedx(_: f64, _: &Particle, _: &Water) -> f64 {
        4.0
    }

    #[test]
    fn test_score_primary_proton() {
        let mut scorer = Scorer::new(VoxelGrid::new(2, 1, 1, 1.0).unwrap()).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), true);

        scorer.score_step(&step(&proton, Voxel::new(1, 0, 0), 0.5, 1.0, 1), &constant_dedx);

        assert_eq!(scorer.scored_steps(), 1);
        assert_eq!(scorer.dose().registry().get(key).unwrap(), &vec![0.0, 0.5]);
        assert_eq!(scorer.fluence().registry().get(key).unwrap(), &vec![0.0, 0.5]);

        let scores = scorer.finalize();
        let values = scores.let_scores().registry().get(key).unwrap();
        assert_approx_eq!(values.dose_weighted[1], 4.0, 1e-15);
        assert_approx_eq!(values.track_weighted[1], 4.0, 1e-15);
        assert_eq!(scores.species_names(), vec!["proton_1"]);
    }

    #[test]
    fn test_secondary_electron_energy_is_deposited() {
        let mut scorer = Scorer::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), false);
        let mut proton_step = step(&proton, Voxel::new(0, 0, 0), 1.0, 1.0, 2);
        proton_step.secondary_electron_energy = 0.25;

        scorer.score_step(&proton_step, &constant_dedx);

        assert_eq!(scorer.dose().registry().get(key).unwrap(), &vec![1.25]);
        assert_eq!(
            scorer.let_transfer().registry().get(key).unwrap().dose()[0].denominator(),
            1.25
        );
    }

    #[test]
    fn test_electrons_and_empty_steps_are_ignored() {
        let mut scorer = Scorer::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        let electron = Particle::electron();
        let proton = Particle::proton();

        scorer.score_step(&step(&electron, Voxel::new(0, 0, 0), 1.0, 1.0, 3), &constant_dedx);
        scorer.score_step(&step(&proton, Voxel::new(0, 0, 0), 0.0, 1.0, 1), &constant_dedx);

        assert_eq!(scorer.scored_steps(), 0);
        assert!(scorer.dose().registry().is_empty());
        assert!(scorer.let_transfer().registry().is_empty());
        assert!(scorer.fluence().registry().is_empty());
    }

    #[test]
    fn test_stopping_power_only_for_let_relevant_steps() {
        let mut scorer = Scorer::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        let calls = AtomicUsize::new(0);
        let counting_dedx = |_: f64, _: &Particle, _: &Water| {
            calls.fetch_add(1, Ordering::Relaxed);
            1.0
        };
        let photon = Particle::photon();
        let neutron = Particle::neutron();
        let alpha = Particle::nucleus(2, 4, "alpha");
        let voxel = Voxel::new(0, 0, 0);

        scorer.score_step(&step(&photon, voxel, 0.1, 1.0, 4), &counting_dedx);
        scorer.score_step(&step(&neutron, voxel, 0.1, 1.0, 5), &counting_dedx);
        // zero length: dose only
        scorer.score_step(&step(&alpha, voxel, 0.1, 0.0, 6), &counting_dedx);
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        scorer.score_step(&step(&alpha, voxel, 0.1, 1.0, 6), &counting_dedx);
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        assert_eq!(scorer.dose().registry().len(), 3);
        assert_eq!(scorer.let_transfer().registry().len(), 1);
        // photon, neutron and the second alpha step
        assert_eq!(scorer.fluence().registry().len(), 3);
        let alpha_key = SpeciesKey::new(alpha.grouped_code(), false);
        assert_eq!(scorer.fluence().registry().get(alpha_key).unwrap(), &vec![0.5]);
    }

    #[test]
    fn test_merge_sums_counters() {
        let grid = VoxelGrid::new(1, 1, 1, 1.0).unwrap();
        let proton = Particle::proton();
        let voxel = Voxel::new(0, 0, 0);

        let mut scorer_1 = Scorer::new(grid.clone()).unwrap();
        scorer_1.score_step(&step(&proton, voxel, 1.0, 1.0, 1), &constant_dedx);
        let mut scorer_2 = Scorer::new(grid).unwrap();
        scorer_2.score_step(&step(&proton, voxel, 2.0, 1.0, 1), &constant_dedx);
        scorer_2.score_step(&step(&proton, voxel, 3.0, 1.0, 2), &constant_dedx);

        scorer_1.merge(scorer_2).unwrap();

        assert_eq!(scorer_1.scored_steps(), 3);
        assert_eq!(scorer_1.dose().registry().len(), 2);
        assert_eq!(
            scorer_1
                .dose()
                .registry()
                .get(SpeciesKey::new(proton.grouped_code(), true))
                .unwrap(),
            &vec![3.0]
        );
    }

    #[test]
    fn test_merge_rejects_different_grids() {
        let mut scorer_1 = Scorer::<f64>::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        let scorer_2 = Scorer::<f64>::new(VoxelGrid::new(1, 1, 2, 1.0).unwrap()).unwrap();

        assert!(matches!(
            scorer_1.merge(scorer_2),
            Err(ScoreError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_allocation_drops_only_the_failing_contribution() {
        let scorer = Scorer::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        // dose storage of a new species can no longer be allocated
        let mut json = serde_json::to_value(&scorer).unwrap();
        json["dose"]["matrix"]["registry"]["voxels"] = serde_json::json!(usize::MAX / 2);
        let mut scorer: Scorer<f64> = serde_json::from_value(json).unwrap();
        let proton = Particle::proton();
        let key = SpeciesKey::new(proton.grouped_code(), true);

        for _ in 0..3 {
            scorer.score_step(&step(&proton, Voxel::new(0, 0, 0), 1.0, 1.0, 1), &constant_dedx);
        }

        assert_eq!(scorer.scored_steps(), 0);
        assert_eq!(scorer.skipped_steps(), 3);
        assert!(scorer.oom_reported);
        assert!(scorer.dose().registry().is_empty());

        // LET and fluence of the same steps are still scored
        assert_eq!(scorer.let_transfer().registry().len(), 1);
        assert_eq!(scorer.fluence().registry().get(key).unwrap(), &vec![1.5]);
        let cells = scorer.let_transfer().registry().get(key).unwrap();
        assert_approx_eq!(cells.dose()[0].denominator(), 3.0, 1e-15);

        let scores = scorer.finalize();
        assert_eq!(scores.skipped_steps(), 3);
        assert!(scores.species_names().is_empty());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut scorer = Scorer::new(VoxelGrid::new(1, 1, 1, 1.0).unwrap()).unwrap();
        let proton = Particle::proton();
        scorer.score_step(&step(&proton, Voxel::new(0, 0, 0), 1.0, 1.0, 1), &constant_dedx);

        let json = serde_json::to_string(&scorer).unwrap();
        let mut restored: Scorer<f64> = serde_json::from_str(&json).unwrap();
        restored.score_step(&step(&proton, Voxel::new(0, 0, 0), 1.0, 1.0, 1), &constant_dedx);

        let key = SpeciesKey::new(proton.grouped_code(), true);
        assert_eq!(restored.scored_steps(), 2);
        assert_eq!(restored.dose().registry().get(key).unwrap(), &vec![2.0]);
    }
}
