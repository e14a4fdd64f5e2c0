use log::warn;
use serde::{Deserialize, Serialize};
use crate::{
    Float,
    error::{LbmError, Result},
    geometry::BoundaryPreset,
    grid::Dimensions,
    lattice::D3Q27,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub domain: DomainConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub boundary: BoundaryPreset,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Node spacing in metres
    #[serde(default = "default_dx")]
    pub dx: Float,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self { nx: 64, ny: 1, nz: 32, dx: default_dx() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Physical density in kg/m³
    pub density: Float,
    /// Dynamic viscosity in Pa·s
    pub viscosity: Option<Float>,
    /// Physical speed of sound in m/s
    pub speed_of_sound: Float,
    pub reynolds_number: Option<Float>,
    /// Lattice-unit velocity imposed on in/out-flow nodes
    pub inlet_velocity: [Float; 3],
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            density: 1.225,
            viscosity: None,
            speed_of_sound: 343.0,
            reynolds_number: Some(100.0),
            inlet_velocity: [0.05, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_iterations: usize,
    pub tau: Option<Float>, // relaxation time, wins over any derived value
    /// Worker threads for the solver; `None` uses the global rayon pool
    pub threads: Option<usize>,
    /// Amplitude of the random factor applied to the initial populations
    pub perturbation: Float,
    pub seed: u64,
    /// Check every frame for non-finite populations and runaway velocity
    pub validate: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tau: None,
            threads: None,
            perturbation: 0.0,
            seed: 0,
            validate: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_directory: String,
    pub output_frequency: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_directory: "output".to_string(),
            output_frequency: 100,
        }
    }
}

fn default_dx() -> Float {
    0.01
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn dimensions(&self) -> Result<Dimensions> {
        Dimensions::new(self.domain.nx, self.domain.ny, self.domain.nz)
    }

    /// Relaxation time: the explicit `simulation.tau` if set, otherwise
    /// derived from the physical viscosity, otherwise from the Reynolds number.
    pub fn calculate_tau(&self) -> Result<Float> {
        let tau = if let Some(tau) = self.simulation.tau {
            tau
        } else if let Some(mu) = self.physics.viscosity {
            // dt follows from matching the lattice and physical sound speeds
            let dx = self.domain.dx;
            let kinematic = mu / self.physics.density;
            let dt = dx * D3Q27::CS / self.physics.speed_of_sound;
            let nu_lattice = kinematic * dt / (dx * dx);
            0.5 + nu_lattice / D3Q27::CS2
        } else if let Some(re) = self.physics.reynolds_number {
            let u = self.physics.inlet_velocity;
            let speed = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
            let characteristic_length = self.domain.ny.max(self.domain.nz) as Float;
            let nu_lattice = speed * characteristic_length / re;
            0.5 + nu_lattice / D3Q27::CS2
        } else {
            return Err(LbmError::MissingViscosity);
        };

        if !tau.is_finite() || tau <= 0.5 {
            return Err(LbmError::UnstableTau(tau));
        }
        if tau < 0.51 {
            warn!("tau = {tau:.6} is very close to 0.5, expect instability");
        }
        Ok(tau)
    }

    pub fn validate(&self) -> Result<()> {
        self.dimensions()?;
        self.calculate_tau()?;

        if !(self.domain.dx > 0.0) {
            return Err(LbmError::InvalidConfig(format!("dx must be positive, got {}", self.domain.dx)));
        }
        if self.physics.viscosity.is_some()
            && (!(self.physics.density > 0.0) || !(self.physics.speed_of_sound > 0.0))
        {
            return Err(LbmError::InvalidConfig(
                "density and speed_of_sound must be positive to derive tau from viscosity".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.simulation.perturbation) {
            return Err(LbmError::InvalidConfig(format!(
                "perturbation must lie in [0, 1), got {}",
                self.simulation.perturbation
            )));
        }
        if self.simulation.threads == Some(0) {
            return Err(LbmError::InvalidConfig("threads must be at least 1".to_string()));
        }
        if self.output.output_frequency == 0 {
            return Err(LbmError::InvalidConfig("output_frequency must be at least 1".to_string()));
        }

        let u = self.physics.inlet_velocity;
        let speed = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
        if speed >= D3Q27::CS {
            warn!("inlet speed {speed:.4} reaches the lattice sound speed and will be clamped downstream");
        }
        Ok(())
    }
}
