#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `voxscore` accumulates, per voxel of a regular grid and per particle species, the
//! energy deposited, the [linear energy transfer] (LET) and the particle [fluence] produced by a
//! particle transport simulation, and writes the results as tab-separated tables at the end of a
//! run.
//!
//! # Features
//!
//! - **Generic numeric type**. Like the transport codes feeding it, the scorer is not tied to a
//! fixed floating point type: every accumulator is generic over a type implementing the `Float`
//! trait from the `num-traits` crate.
//! - **Dynamic species discovery**. Particle species are registered the first time a step of them
//! is scored. Nuclides differing only in their excitation level share one species, while the
//! primary particle and secondaries of the same nuclide are kept apart.
//! - **Lock-free parallel scoring**. Every worker thread owns a private [`Scorer`]; after all
//! workers finished, the partial results are reduced into one. No lock is taken while steps are
//! scored.
//! - **Reproducibility**. Synthetic runs seed a random number generator per event, so that the
//! scored quantities do not depend on the number of workers the run was started with.
//! - **Graceful degradation**. If the storage for a newly discovered species cannot be allocated,
//! the step is dropped and counted instead of aborting a simulation that may have been running for
//! hours.
//!
//! # What is ...?
//!
//! - the *dose-weighted LET* in a voxel is
//!
//! $$ \bar{L}_D = \frac{\sum_s \epsilon_s S_s}{\sum_s \epsilon_s} $$
//!
//! where the sums run over all steps $s$ in the voxel, $\epsilon_s$ is the energy deposited and
//! $S_s$ the electronic stopping power at the mean kinetic energy of the step,
//! - the *track-weighted LET* replaces the deposited energy by the step length $l_s$ as weight,
//! - the *fluence* is estimated as the summed path length per unit volume, $\sum_s l_s / V$.
//!
//! [linear energy transfer]: https://en.wikipedia.org/wiki/Linear_energy_transfer
//! [fluence]: https://en.wikipedia.org/wiki/Fluence

pub mod accumulators;
pub mod callbacks;
pub mod config;
pub mod core;
pub mod error;
pub mod grid;
pub mod output;
pub mod run;
pub mod scorer;
pub mod source;
pub mod species;
pub mod units;

pub use crate::config::RunConfig;
pub use crate::core::*;
pub use crate::error::{Result, ScoreError};
pub use crate::grid::{Voxel, VoxelGrid};
pub use crate::run::{Run, RunSummary};
pub use crate::scorer::{FinalScores, Scorer};
pub use crate::species::{SpeciesInfo, SpeciesKey, SpeciesRegistry};
