use std::sync::Arc;
use std::time::Instant;
use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use crate::{
    Float,
    collision::{self, CollisionParams},
    config::Config,
    distribution::DistributionField,
    error::{LbmError, Result},
    geometry::Geometry,
    grid::Dimensions,
    lattice::D3Q27,
    macroscopic::{self, MacroscopicField},
    publisher::{DensitySnapshot, FramePublisher, FrameSnapshot, SnapshotReader, VelocitySnapshot},
    streaming,
};

/// Velocity magnitude tolerated above the sound speed by [`Simulation::validate`].
const SPEED_TOLERANCE: Float = 1e-4;

pub struct Simulation {
    config: Config,
    dims: Dimensions,
    geometry: Geometry,
    params: CollisionParams,
    populations: DistributionField,
    field: MacroscopicField,
    publisher: FramePublisher,
    reader: SnapshotReader,
    pool: Option<rayon::ThreadPool>,
    frame: u64,
    halted: bool,
}

impl Simulation {
    /// Builds the node classification from `config.boundary`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let dims = config.dimensions()?;
        let geometry = Geometry::from_preset(&config.boundary, dims, config.domain.dx)?;
        Self::with_geometry(config, geometry)
    }

    /// Uses a node classification built by the caller.
    pub fn with_geometry(config: Config, geometry: Geometry) -> Result<Self> {
        config.validate()?;
        let dims = config.dimensions()?;
        if geometry.dimensions() != dims {
            return Err(LbmError::GeometryMismatch {
                expected: dims.node_count(),
                actual: geometry.dimensions().node_count(),
            });
        }

        let tau = config.calculate_tau()?;
        info!(
            "Initializing LBM simulation with domain size: {}x{}x{}, tau = {:.4}",
            dims.nx, dims.ny, dims.nz, tau
        );

        let pool = match config.simulation.threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };

        let mut populations = DistributionField::new(&dims)?;
        if config.simulation.perturbation > 0.0 {
            perturb(
                populations.current_mut(),
                config.simulation.perturbation,
                config.simulation.seed,
            );
        }

        let mut field = MacroscopicField::new(&dims)?;
        let mut publisher = FramePublisher::new(dims.node_count())?;
        let reader = publisher.reader();

        field.compute(populations.current());
        publisher.publish(0, &field.density, &field.velocity)?;

        let params = CollisionParams {
            tau,
            inflow_velocity: config.physics.inlet_velocity,
        };

        Ok(Self {
            config,
            dims,
            geometry,
            params,
            populations,
            field,
            publisher,
            reader,
            pool,
            frame: 0,
            halted: false,
        })
    }

    /// Computes one frame: stream, macroscopic moments, collide, publish.
    ///
    /// A frame that fails validation is not published and halts the
    /// simulation; every later call returns [`LbmError::Halted`].
    pub fn advance(&mut self) -> Result<()> {
        if self.halted {
            return Err(LbmError::Halted);
        }
        let start_time = Instant::now();

        let result = match self.pool.take() {
            Some(pool) => {
                let result = pool.install(|| self.step());
                self.pool = Some(pool);
                result
            }
            None => self.step(),
        };
        if let Err(e) = result {
            self.halted = true;
            return Err(e);
        }

        self.frame += 1;
        if let Err(e) = self
            .publisher
            .publish(self.frame, &self.field.density, &self.field.velocity)
        {
            self.halted = true;
            return Err(e);
        }

        let elapsed = start_time.elapsed();
        if elapsed.as_millis() > 10 {
            debug!("Frame {} took: {:.2}ms", self.frame, elapsed.as_secs_f64() * 1000.0);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let (current, next) = self.populations.split();
        streaming::stream(&self.dims, current, next);
        self.populations.swap();

        self.field.compute(self.populations.current());

        if self.config.simulation.validate {
            self.check(self.frame + 1)?;
        }

        let (streamed, collided) = self.populations.split();
        collision::collide(
            &self.params,
            self.geometry.node_types(),
            &self.field,
            streamed,
            collided,
        );
        self.populations.swap();
        Ok(())
    }

    /// Scans the current populations and the last macroscopic field for
    /// non-finite values, and the populations for velocities beyond the
    /// sound speed before clamping.
    pub fn validate(&self) -> Result<()> {
        self.check(self.frame)
    }

    fn check(&self, frame: u64) -> Result<()> {
        let instability = |node, reason| LbmError::NumericalInstability { frame, node, reason };

        let populations = self.populations.current();
        if let Some(k) = populations.iter().position(|f| !f.is_finite()) {
            return Err(instability(k / D3Q27::Q, "non-finite population"));
        }
        for (node, (rho, u)) in self.field.density.iter().zip(&self.field.velocity).enumerate() {
            if !rho.is_finite() || u.iter().any(|c| !c.is_finite()) {
                return Err(instability(node, "non-finite macroscopic value"));
            }
        }
        for (node, f) in populations.chunks_exact(D3Q27::Q).enumerate() {
            let (_, u) = macroscopic::raw_moments(f);
            let speed = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
            if speed > D3Q27::CS + SPEED_TOLERANCE {
                return Err(instability(node, "velocity above sound speed"));
            }
        }
        Ok(())
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.dims.as_tuple()
    }

    pub fn node_count(&self) -> usize {
        self.dims.node_count()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn tau(&self) -> Float {
        self.params.tau
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn current_velocity_snapshot(&self) -> VelocitySnapshot {
        self.reader.current_velocity_snapshot()
    }

    pub fn current_density_snapshot(&self) -> DensitySnapshot {
        self.reader.current_density_snapshot()
    }

    pub fn current_snapshot(&self) -> Arc<FrameSnapshot> {
        self.reader.snapshot()
    }

    /// A handle other threads can poll while this simulation advances.
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn population(&self, x: usize, y: usize, z: usize, direction: usize) -> Result<Float> {
        let slot = self.population_slot(x, y, z, direction)?;
        Ok(self.populations.current()[slot])
    }

    /// Overwrites one population of the current generation. Takes effect at
    /// the next `advance`; the published snapshot is not touched.
    pub fn set_population(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        direction: usize,
        value: Float,
    ) -> Result<()> {
        let slot = self.population_slot(x, y, z, direction)?;
        self.populations.current_mut()[slot] = value;
        Ok(())
    }

    fn population_slot(&self, x: usize, y: usize, z: usize, direction: usize) -> Result<usize> {
        if !self.dims.contains(x, y, z) || direction >= D3Q27::Q {
            return Err(LbmError::OutOfBounds { x, y, z, direction });
        }
        Ok(Dimensions::population_index(self.dims.linear_index(x, y, z), direction))
    }

    /// Sets every population of the current generation to `value`.
    pub fn fill_populations(&mut self, value: Float) {
        self.populations.current_mut().fill(value);
    }

    /// Σ|f| over the current generation.
    pub fn total_mass(&self) -> f64 {
        self.populations.total_mass()
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_geometry(&self) -> &Geometry {
        &self.geometry
    }
}

/// Scales every population by `1 + amplitude·U(-1, 1)`.
fn perturb(populations: &mut [Float], amplitude: Float, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for f in populations.iter_mut() {
        *f *= 1.0 + amplitude * rng.gen_range(-1.0..1.0);
    }
}
