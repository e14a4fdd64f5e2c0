use lbm_flow::{Config, Simulation, SnapshotReader, VTKWriter};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::env;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!("  config.json - JSON file containing simulation parameters");
        std::process::exit(1);
    }

    let config_path = &args[1];
    info!("Loading configuration from: {}", config_path);
    let config = Config::from_file(config_path)
        .with_context(|| format!("reading {config_path}"))?;

    info!("Simulation parameters:");
    info!("  Domain: {}x{}x{}", config.domain.nx, config.domain.ny, config.domain.nz);
    info!("  Boundary: {:?}", config.boundary);
    info!("  Inlet velocity: {:?}", config.physics.inlet_velocity);
    info!("  Max iterations: {}", config.simulation.max_iterations);
    info!("  Output frequency: {}", config.output.output_frequency);

    let sim = Simulation::new(config.clone())?;
    info!("  Tau (relaxation time): {}", sim.tau());

    std::fs::create_dir_all(&config.output.output_directory)?;
    let mut writer = VTKWriter::new(config.dimensions()?, config.domain.dx);
    let geometry_filename = format!("{}/geometry.vtk", config.output.output_directory);
    writer.write_geometry(&geometry_filename, sim.get_geometry())?;
    info!("Wrote geometry file: {}", geometry_filename);

    let reader = sim.reader();
    let geometry = sim.get_geometry().clone();
    let (done_tx, done_rx) = watch::channel(false);

    let solver = tokio::task::spawn_blocking(move || run_solver(sim, done_tx));
    let exporter = tokio::spawn(async move {
        export_frames(reader, &mut writer, &geometry, &config, done_rx).await?;
        let collection = format!("{}/frames.pvd", config.output.output_directory);
        writer.write_collection(&collection)?;
        info!("Wrote {} frame files and {}", writer.get_file_count(), collection);
        anyhow::Ok(())
    });

    let frames = solver.await??;
    exporter.await??;

    info!("Simulation completed {} frames", frames);
    Ok(())
}

fn run_solver(mut sim: Simulation, done: watch::Sender<bool>) -> Result<u64> {
    let iterations = sim.get_config().simulation.max_iterations as u64;
    let progress = ProgressBar::new(iterations);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({per_sec}, eta {eta})")?,
    );

    let result = (0..iterations).try_for_each(|_| {
        sim.advance()?;
        progress.inc(1);
        anyhow::Ok(())
    });
    progress.finish();
    let _ = done.send(true);

    result.map(|_| sim.frame())
}

/// Polls the latest published frame and writes one file per output period.
async fn export_frames(
    reader: SnapshotReader,
    writer: &mut VTKWriter,
    geometry: &lbm_flow::Geometry,
    config: &Config,
    mut done: watch::Receiver<bool>,
) -> Result<()> {
    let frequency = config.output.output_frequency as u64;
    let mut last_period = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(20));

    loop {
        let finished = tokio::select! {
            _ = ticker.tick() => false,
            changed = done.changed() => changed.is_err() || *done.borrow(),
        };

        let snapshot = reader.snapshot();
        let period = snapshot.frame() / frequency;
        if last_period != Some(period) || finished {
            last_period = Some(period);
            let filename = format!("{}/output_{:06}.vtk", config.output.output_directory, snapshot.frame());
            tokio::task::block_in_place(|| writer.write(&filename, &snapshot, geometry))?;
            info!(
                "Frame {}: mass {:.4}, max speed {:.4}",
                snapshot.frame(),
                snapshot.total_density(),
                snapshot.max_speed()
            );
            if !snapshot.total_density().is_finite() {
                warn!("Non-finite density in frame {}", snapshot.frame());
            }
        }

        if finished {
            return Ok(());
        }
    }
}
