//! A synthetic transport engine: a proton pencil beam slowing down in a homogeneous medium.
//!
//! The beam is not meant to be accurate, it produces realistic looking input for the scorer. Energy
//! loss follows the Bragg-Kleeman rule, which relates the continuous slowing down range $R$ of a
//! proton to its kinetic energy $E$ by
//!
//! $$ R(E) = \alpha E^p $$
//!
//! and is extended to ions of charge $z$ and mass number $A$ by scaling the range with $A/z^2$ at
//! equal energy per nucleon.
use crate::core::{EventSource, Particle, Real, Step, StoppingPower};
use crate::error::{Result, ScoreError};
use crate::grid::{Voxel, VoxelGrid};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Homogeneous material of the synthetic source.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Medium<T> {
    name: String,
    relative_stopping_power: T,
}

impl<T: Real> Medium<T> {
    /// A medium whose stopping power is `relative_stopping_power` times that of water.
    pub fn new(name: &str, relative_stopping_power: T) -> Self {
        Self {
            name: name.to_string(),
            relative_stopping_power,
        }
    }

    /// Liquid water.
    pub fn water() -> Self {
        Self::new("G4_WATER", T::one())
    }

    /// Returns the name of the medium.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stopping power relative to water.
    pub fn relative_stopping_power(&self) -> T {
        self.relative_stopping_power
    }
}

/// Bragg-Kleeman range-energy relation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BraggKleeman<T> {
    alpha: T,
    p: T,
}

impl<T: Real> BraggKleeman<T> {
    /// Constructor. With energies in MeV and lengths in mm, `alpha` is in mm MeV⁻ᵖ.
    pub fn new(alpha: T, p: T) -> Self {
        Self { alpha, p }
    }

    /// The parameters for protons in water, $\alpha = 0.022$ mm MeV⁻ᵖ and $p = 1.77$.
    pub fn water() -> Self {
        Self::new(real(0.022), real(1.77))
    }

    /// Returns the range of `particle` with `kinetic_energy` in `medium`. Neutral particles have
    /// an infinite range.
    pub fn range(&self, kinetic_energy: T, particle: &Particle, medium: &Medium<T>) -> T {
        match Self::ion_scaling(particle) {
            Some((charge_squared, nucleons)) => {
                let per_nucleon = kinetic_energy / nucleons;
                nucleons / charge_squared * self.alpha * per_nucleon.powf(self.p)
                    / medium.relative_stopping_power
            }
            None => T::infinity(),
        }
    }

    /// Returns the kinetic energy of `particle` after travelling `length` with `kinetic_energy`
    /// through `medium`.
    pub fn energy_after(
        &self,
        kinetic_energy: T,
        length: T,
        particle: &Particle,
        medium: &Medium<T>,
    ) -> T {
        match Self::ion_scaling(particle) {
            Some((charge_squared, nucleons)) => {
                let residual = self.range(kinetic_energy, particle, medium) - length;

                if residual <= T::zero() {
                    return T::zero();
                }

                let per_nucleon = (residual * medium.relative_stopping_power * charge_squared
                    / (nucleons * self.alpha))
                    .powf(self.p.recip());
                nucleons * per_nucleon
            }
            None => kinetic_energy,
        }
    }

    fn ion_scaling(particle: &Particle) -> Option<(T, T)> {
        if particle.atomic_number() == 0 || particle.mass_number() == 0 {
            return None;
        }

        let charge = real::<T>(f64::from(particle.atomic_number()));
        Some((charge * charge, real(f64::from(particle.mass_number()))))
    }
}

impl<T: Real> StoppingPower<T, Medium<T>> for BraggKleeman<T> {
    fn electronic_dedx(&self, kinetic_energy: T, particle: &Particle, material: &Medium<T>) -> T {
        match Self::ion_scaling(particle) {
            // S = z^2 * S_p(E / A), S_p(e) = e^(1 - p) / (alpha * p)
            Some((charge_squared, nucleons)) if kinetic_energy > T::zero() => {
                let per_nucleon = kinetic_energy / nucleons;
                charge_squared * per_nucleon.powf(T::one() - self.p) / (self.alpha * self.p)
                    * material.relative_stopping_power
            }
            _ => T::zero(),
        }
    }
}

/// A pencil beam of protons entering the grid in the centre of its `k = 0` face and travelling
/// along `k`.
///
/// Along its path the primary sets electrons in motion and, with a fixed probability per unit
/// length, undergoes a nuclear interaction that emits one fragment travelling along `i`.
#[derive(Clone, Debug)]
pub struct PencilBeam<T> {
    dimensions: (usize, usize, usize),
    voxel_size: T,
    energy: T,
    cutoff: T,
    medium: Medium<T>,
    stopping_power: BraggKleeman<T>,
    nuclear_probability: f64,
    primary: Particle,
    electron: Particle,
    fragments: Vec<Particle>,
}

impl<T: Real> PencilBeam<T> {
    /// A beam of protons with kinetic `energy` in water, on `grid` with cubic voxels of
    /// `voxel_size`.
    pub fn new(grid: &VoxelGrid<T>, voxel_size: T, energy: T) -> Result<Self> {
        if !voxel_size.is_finite() || voxel_size <= T::zero() {
            return Err(ScoreError::InvalidGrid(
                "voxel size must be positive and finite".to_string(),
            ));
        }

        Ok(Self {
            dimensions: grid.dimensions(),
            voxel_size,
            energy,
            cutoff: real(0.01),
            medium: Medium::water(),
            stopping_power: BraggKleeman::water(),
            nuclear_probability: 0.01,
            primary: Particle::proton(),
            electron: Particle::electron(),
            fragments: vec![
                Particle::proton(),
                Particle::nucleus(1, 2, "deuteron"),
                Particle::nucleus(2, 4, "alpha"),
                Particle::new(1_000_060_121, 6, 12, "C12[4438.9]"),
                Particle::nucleus(6, 11, "C11"),
                Particle::neutron(),
            ],
        })
    }

    /// Use `medium` instead of water.
    pub fn with_medium(mut self, medium: Medium<T>) -> Self {
        self.medium = medium;
        self
    }

    /// Set the probability per mm of a nuclear interaction of the primary.
    pub fn with_nuclear_probability(mut self, probability: f64) -> Self {
        self.nuclear_probability = probability;
        self
    }

    /// Returns the medium the beam travels through.
    pub fn medium(&self) -> &Medium<T> {
        &self.medium
    }

    /// Returns the stopping power used to slow the particles down; scoring with the same one
    /// gives consistent LETs.
    pub fn stopping_power(&self) -> &BraggKleeman<T> {
        &self.stopping_power
    }

    fn voxel_volume(&self) -> T {
        self.voxel_size * self.voxel_size * self.voxel_size
    }

    /// Move `particle` from `voxel` along `i`, or along `k` for the primary, until it stops or
    /// leaves the grid.
    fn track<R: Rng>(
        &self,
        rng: &mut R,
        particle: &Particle,
        track_id: u32,
        start: Voxel,
        energy: T,
        on_step: &mut dyn FnMut(&Step<'_, T, Medium<T>>),
    ) {
        let (nx, _, nz) = self.dimensions;
        let along_k = track_id == 1;
        let backwards = !along_k && rng.gen::<bool>();
        let mut voxel = start;
        let mut energy = energy;

        while energy > self.cutoff {
            // neutrons only leave a small recoil deposit where they were created
            if particle.is_neutron() {
                let after = energy * real(0.99);
                let energies = (energy, after);
                self.step(rng, particle, track_id, voxel, energies, self.voxel_size, on_step);
                break;
            }

            let range = self.stopping_power.range(energy, particle, &self.medium);
            let length = self.voxel_size.min(range);
            let after = self
                .stopping_power
                .energy_after(energy, length, particle, &self.medium);

            self.step(rng, particle, track_id, voxel, (energy, after), length, on_step);
            energy = after;

            if along_k && rng.gen::<f64>() < self.nuclear_probability * to_f64(length) {
                let fragment = &self.fragments[rng.gen_range(0, self.fragments.len())];
                let share = energy * real(rng.gen_range(0.05, 0.3));
                energy = energy - share;
                self.track(rng, fragment, track_id + 1, voxel, share, on_step);
            }

            let next = if along_k {
                (voxel.k + 1 < nz).then(|| Voxel::new(voxel.i, voxel.j, voxel.k + 1))
            } else if backwards {
                voxel.i.checked_sub(1).map(|i| Voxel::new(i, voxel.j, voxel.k))
            } else {
                (voxel.i + 1 < nx).then(|| Voxel::new(voxel.i + 1, voxel.j, voxel.k))
            };

            match next {
                Some(v) => voxel = v,
                None => break,
            }
        }
    }

    /// Report a step slowing `particle` down from `before` to `after`, followed by the step of the
    /// electrons it set in motion.
    #[allow(clippy::too_many_arguments)]
    fn step<R: Rng>(
        &self,
        rng: &mut R,
        particle: &Particle,
        track_id: u32,
        voxel: Voxel,
        (before, after): (T, T),
        step_length: T,
        on_step: &mut dyn FnMut(&Step<'_, T, Medium<T>>),
    ) {
        let lost = before - after;
        let electrons = lost * real(rng.gen_range(0.0, 0.1));
        let step = Step {
            voxel,
            energy_deposit: lost - electrons,
            secondary_electron_energy: electrons,
            step_length,
            mean_kinetic_energy: (before + after) * real(0.5),
            track_id,
            particle,
            material: &self.medium,
            voxel_volume: self.voxel_volume(),
        };

        on_step(&step);

        // the electrons are reported as well, although their energy is already part of `step`
        if electrons > T::zero() {
            on_step(&Step {
                energy_deposit: electrons,
                secondary_electron_energy: T::zero(),
                step_length: self.voxel_size * real(1e-3),
                mean_kinetic_energy: electrons,
                track_id: track_id + 1,
                particle: &self.electron,
                ..step
            });
        }
    }
}

impl<T: Real> EventSource<T> for PencilBeam<T> {
    type Material = Medium<T>;

    fn transport<R: Rng>(&self, rng: &mut R, on_step: &mut dyn FnMut(&Step<'_, T, Medium<T>>)) {
        let (nx, ny, _) = self.dimensions;
        let entry = Voxel::new(nx / 2, ny / 2, 0);

        self.track(rng, &self.primary, 1, entry, self.energy, on_step);
    }
}

fn real<T: Real>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::zero)
}

fn to_f64<T: Real>(value: T) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
