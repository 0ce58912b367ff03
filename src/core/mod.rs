//! The core module
pub mod ratio;

use crate::grid::Voxel;
use crate::species::SpeciesKey;
use num_traits::{Float, FromPrimitive};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::ops::{AddAssign, Range};

/// Numeric type the accumulators are generic over.
///
/// This trait is implemented for every type with the required bounds, in particular `f32` and
/// `f64`.
pub trait Real: Float + FromPrimitive + AddAssign + Display + Debug + Send + Sync + 'static {}

impl<T> Real for T where
    T: Float + FromPrimitive + AddAssign + Display + Debug + Send + Sync + 'static
{
}

/// Particle data group code of the electron.
pub const ELECTRON_CODE: i32 = 11;

/// Particle data group code of the photon.
pub const PHOTON_CODE: i32 = 22;

/// Identity of a particle as reported by the transport engine.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Particle {
    code: i32,
    atomic_number: u32,
    mass_number: u32,
    name: String,
}

impl Particle {
    /// Constructor. `code` is the particle data group encoding, for nuclei of the form
    /// `100ZZZAAAI` where the last digit `I` is the isomer level.
    pub fn new(code: i32, atomic_number: u32, mass_number: u32, name: &str) -> Self {
        Self {
            code,
            atomic_number,
            mass_number,
            name: name.to_string(),
        }
    }

    /// A nucleus with `atomic_number` protons and `mass_number` nucleons in its ground state.
    pub fn nucleus(atomic_number: u32, mass_number: u32, name: &str) -> Self {
        let code = 1_000_000_000 + 10_000 * atomic_number as i32 + 10 * mass_number as i32;
        Self::new(code, atomic_number, mass_number, name)
    }

    /// The proton.
    pub fn proton() -> Self {
        Self::new(2212, 1, 1, "proton")
    }

    /// The neutron.
    pub fn neutron() -> Self {
        Self::new(2112, 0, 1, "neutron")
    }

    /// The photon.
    pub fn photon() -> Self {
        Self::new(PHOTON_CODE, 0, 0, "gamma")
    }

    /// The electron.
    pub fn electron() -> Self {
        Self::new(ELECTRON_CODE, 0, 0, "e-")
    }

    /// Returns the full particle data group code.
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Returns the code with its least significant digit removed, so that nuclides differing
    /// only in their excitation level share the same value.
    pub const fn grouped_code(&self) -> i32 {
        self.code - self.code % 10
    }

    /// Returns the atomic number $Z$.
    pub const fn atomic_number(&self) -> u32 {
        self.atomic_number
    }

    /// Returns the mass number $A$.
    pub const fn mass_number(&self) -> u32 {
        self.mass_number
    }

    /// Returns the full name, possibly including the excitation energy, e.g. `C12[4438.9]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name without the excitation energy suffix, e.g. `C12`.
    pub fn display_name(&self) -> &str {
        self.name.split('[').next().unwrap_or(&self.name)
    }

    /// Returns whether this is an electron.
    pub const fn is_electron(&self) -> bool {
        self.code == ELECTRON_CODE
    }

    /// Returns whether this is a neutron-like particle without charge and a single nucleon.
    pub const fn is_neutron(&self) -> bool {
        self.atomic_number == 0 && self.mass_number == 1
    }

    /// Returns whether steps of this particle contribute to the LET: protons and heavier ions.
    pub const fn is_let_relevant(&self) -> bool {
        self.atomic_number >= 1
            && !self.is_neutron()
            && self.code != PHOTON_CODE
            && self.code != ELECTRON_CODE
    }
}

/// A single transport step inside the scoring grid.
///
/// `M` is the material handle of the transport engine; the scorer never looks into it, it only
/// passes it on to the [`StoppingPower`] collaborator.
#[derive(Clone, Copy, Debug)]
pub struct Step<'a, T, M> {
    /// Voxel the step starts in.
    pub voxel: Voxel,
    /// Energy deposited along the step.
    pub energy_deposit: T,
    /// Kinetic energy of the electrons set in motion during the step.
    pub secondary_electron_energy: T,
    /// Length of the step.
    pub step_length: T,
    /// Mean of the kinetic energies before and after the step.
    pub mean_kinetic_energy: T,
    /// Track number, `1` denotes the primary particle.
    pub track_id: u32,
    /// The particle taking the step.
    pub particle: &'a Particle,
    /// The material the step is taken in.
    pub material: &'a M,
    /// Volume of the voxel the step is taken in.
    pub voxel_volume: T,
}

impl<'a, T: Real, M> Step<'a, T, M> {
    /// Returns whether the step belongs to the primary particle.
    pub fn is_primary(&self) -> bool {
        self.track_id == 1
    }

    /// Returns the key of the species this step is scored under.
    pub fn species_key(&self) -> SpeciesKey {
        SpeciesKey::new(self.particle.grouped_code(), self.is_primary())
    }

    /// Returns the energy deposited along the step including its secondary electrons.
    pub fn total_deposit(&self) -> T {
        self.energy_deposit + self.secondary_electron_energy
    }
}

/// Electronic stopping power collaborator.
///
/// The scorer never computes physics itself; for every step that contributes to the LET it asks
/// an implementer of this trait for $\mathrm{d}E/\mathrm{d}x$.
pub trait StoppingPower<T, M>: Sync {
    /// Returns the electronic stopping power of `particle` with `kinetic_energy` in `material`.
    fn electronic_dedx(&self, kinetic_energy: T, particle: &Particle, material: &M) -> T;
}

impl<T, M, F> StoppingPower<T, M> for F
where
    F: Fn(T, &Particle, &M) -> T + Sync,
{
    fn electronic_dedx(&self, kinetic_energy: T, particle: &Particle, material: &M) -> T {
        self(kinetic_energy, particle, material)
    }
}

/// Trait every event generator driven by [`crate::run::execute`] must implement.
pub trait EventSource<T>: Sync {
    /// Material handle attached to the steps of this source.
    type Material: Sync;

    /// Transports a single primary particle, handing every step inside the grid to `on_step`.
    fn transport<R: Rng>(&self, rng: &mut R, on_step: &mut dyn FnMut(&Step<'_, T, Self::Material>));
}

/// Compute the range of event indices processed by `worker` (zero-based), given the total number
/// of workers `n_workers` and the total number of events `total_events` to process combined on all
/// workers.
pub(crate) fn events_for_worker(
    worker: usize,
    n_workers: usize,
    total_events: usize,
) -> Range<usize> {
    debug_assert!(worker < n_workers);
    let events_per_worker = (total_events + n_workers - 1) / n_workers;

    // the trailing workers may get fewer events, or none at all
    let start = (worker * events_per_worker).min(total_events);
    let end = (start + events_per_worker).min(total_events);

    start..end
}
