//! Run lifecycle: setting up the workers, executing events in parallel, reducing the partial
//! results and writing the outputs.
use crate::callbacks::Callback;
use crate::config::RunConfig;
use crate::core::{events_for_worker, EventSource, Real, StoppingPower};
use crate::error::{Result, ScoreError};
use crate::grid::VoxelGrid;
use crate::output;
use crate::scorer::{FinalScores, Scorer};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::path::PathBuf;

use crossbeam as cb;

/// What happened during a run, handed to the [`Callback`] at its end.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of primary events.
    pub event_count: usize,
    /// Number of workers whose results were reduced.
    pub workers: usize,
    /// Number of steps scored.
    pub scored_steps: usize,
    /// Number of steps dropped because storage for a new species could not be allocated.
    pub skipped_steps: usize,
    /// Column names of the species that deposited energy.
    pub species: Vec<String>,
    /// Column names of the species with a LET.
    pub let_species: Vec<String>,
    /// Output files written.
    pub files: Vec<PathBuf>,
}

/// A scoring run over a fixed grid.
///
/// The run hands out one [`Scorer`] per worker with [`Run::worker`]. Once the external run
/// controller signals that all events are done, [`Run::end`] reduces the workers, finalises and
/// writes the outputs; if the run is cancelled instead, [`Run::abort`] discards everything.
#[derive(Clone, Debug)]
pub struct Run<T> {
    grid: VoxelGrid<T>,
    config: RunConfig,
}

impl<T: Real> Run<T> {
    /// Start a run scoring on `grid`.
    pub fn start(grid: VoxelGrid<T>, config: RunConfig) -> Self {
        let (nx, ny, nz) = grid.dimensions();
        info!(
            "starting run on a {} x {} x {} grid with voxel mass {} and {} worker(s)",
            nx,
            ny,
            nz,
            grid.voxel_mass(),
            config.workers
        );

        Self { grid, config }
    }

    /// Returns the grid of this run.
    pub fn grid(&self) -> &VoxelGrid<T> {
        &self.grid
    }

    /// Returns the configuration of this run.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns whether this run uses more than one worker.
    pub fn is_multithreaded(&self) -> bool {
        self.config.workers > 1
    }

    /// Create the scorer of a new worker.
    pub fn worker(&self) -> Result<Scorer<T>> {
        Scorer::new(self.grid.clone())
    }

    /// Merge the scorers of all `workers` into one. Without any worker the result is empty.
    pub fn reduce(&self, workers: Vec<Scorer<T>>) -> Result<Scorer<T>> {
        let mut workers = workers.into_iter();

        let mut reduced = match workers.next() {
            Some(first) => first,
            None => self.worker()?,
        };

        for scorer in workers {
            reduced.merge(scorer)?;
        }

        Ok(reduced)
    }

    /// Reduce and finalise the scorers of all `workers` without writing anything.
    pub fn finish(&self, workers: Vec<Scorer<T>>) -> Result<FinalScores<T>> {
        Ok(self.reduce(workers)?.finalize())
    }

    /// End the run after `event_count` primary events: reduce the `workers`, finalise, write the
    /// output tables and report to `callback`.
    pub fn end(
        self,
        workers: Vec<Scorer<T>>,
        event_count: usize,
        callback: &impl Callback,
    ) -> Result<RunSummary> {
        let n_workers = workers.len();
        let scores = self.finish(workers)?;
        let species = scores.species_names();

        info!(
            "run ended after {} events, {} species: {}",
            event_count,
            species.len(),
            species.join(" ")
        );

        if scores.skipped_steps() > 0 {
            warn!(
                "{} steps were dropped for lack of memory, the results are incomplete",
                scores.skipped_steps()
            );
        }

        let files = output::write_outputs(&scores, event_count, &self.config)?;

        let summary = RunSummary {
            event_count,
            workers: n_workers,
            scored_steps: scores.scored_steps(),
            skipped_steps: scores.skipped_steps(),
            species,
            let_species: scores
                .let_scores()
                .registry()
                .species()
                .map(|species| species.column_name())
                .collect(),
            files,
        };

        callback.print(&summary);

        Ok(summary)
    }

    /// Cancel the run. The partial results of all `workers` are discarded and nothing is written.
    pub fn abort(self, workers: Vec<Scorer<T>>) {
        let steps: usize = workers.iter().map(Scorer::scored_steps).sum();
        warn!(
            "run aborted, discarding {} scored steps of {} worker(s)",
            steps,
            workers.len()
        );
    }
}

/// Score `events` primaries of `source` on the workers of `run`, with `stopping_power` supplying
/// the stopping powers for the LET.
///
/// The events are split into contiguous blocks, one per worker, and each worker scores into its
/// own [`Scorer`]. Event `n` draws its random numbers from a generator seeded with the seed of
/// the run plus `n`, so the scored physics does not depend on the number of workers. If a worker
/// panics, [`ScoreError::WorkerPanicked`] is returned and all partial results are lost.
pub fn execute<T, S, P>(
    run: &Run<T>,
    source: &S,
    stopping_power: &P,
    events: usize,
) -> Result<Vec<Scorer<T>>>
where
    T: Real,
    S: EventSource<T>,
    P: StoppingPower<T, S::Material>,
{
    let n_workers = run.config().workers.max(1);
    let seed = run.config().seed;

    // allocate up front, so that failures are reported before any thread is started
    let scorers = (0..n_workers)
        .map(|_| run.worker())
        .collect::<Result<Vec<_>>>()?;

    cb::thread::scope(|s| {
        let handles = scorers
            .into_iter()
            .enumerate()
            .map(|(worker, mut scorer)| {
                s.spawn(move |_| {
                    let range = events_for_worker(worker, n_workers, events);
                    debug!("worker {} processes events {:?}", worker, range);

                    for event in range {
                        let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(event as u64));
                        source.transport(&mut rng, &mut |step| {
                            scorer.score_step(step, stopping_power);
                        });
                    }

                    scorer
                })
            })
            .collect::<Vec<_>>();

        // wait for the threads to finish
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| handle.join().map_err(|_| ScoreError::WorkerPanicked(worker)))
            .collect::<Result<Vec<_>>>()
    })
    .unwrap_or_else(|_| Err(ScoreError::WorkerPanicked(n_workers)))
}
