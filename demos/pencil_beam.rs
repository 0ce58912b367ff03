use voxscore::callbacks::SimpleCallback;
use voxscore::run::{execute, Run};
use voxscore::source::PencilBeam;
use voxscore::{RunConfig, VoxelGrid};

use std::env;

/// Scores a 150 MeV proton pencil beam in a water phantom of 1 mm voxels. An optional first
/// argument names a JSON run configuration.
fn main() -> voxscore::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    // 1 mm^3 of water weighs 1 mg
    let grid = VoxelGrid::new(41, 41, 200, 1e-6)?;
    let beam = PencilBeam::new(&grid, 1.0, 150.0)?;
    let events = 10_000;

    let run = Run::start(grid, config);
    let workers = execute(&run, &beam, beam.stopping_power(), events)?;
    let summary = run.end(workers, events, &SimpleCallback {})?;

    println!(
        "\n{} species in {} files",
        summary.species.len(),
        summary.files.len()
    );

    Ok(())
}
