use rayon::prelude::*;
use crate::{
    Float,
    error::{Result, try_alloc},
    grid::Dimensions,
    lattice::D3Q27,
};

/// Density below which a node is treated as empty and its velocity as zero.
pub const DENSITY_FLOOR: Float = 1e-10;

/// Per-node density and velocity derived from one population generation.
pub struct MacroscopicField {
    pub density: Vec<Float>,
    pub velocity: Vec<[Float; 3]>,
}

impl MacroscopicField {
    pub fn new(dims: &Dimensions) -> Result<Self> {
        Ok(Self {
            density: try_alloc(dims.node_count(), "density field")?,
            velocity: try_alloc(dims.node_count(), "velocity field")?,
        })
    }

    /// Recomputes every node from `populations` (27 per node).
    pub fn compute(&mut self, populations: &[Float]) {
        self.density
            .par_iter_mut()
            .zip(self.velocity.par_iter_mut())
            .zip(populations.par_chunks_exact(D3Q27::Q))
            .for_each(|((density, velocity), f)| {
                let (rho, u) = node_moments(f);
                *density = rho;
                *velocity = u;
            });
    }

    pub fn len(&self) -> usize {
        self.density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density.is_empty()
    }
}

/// Density `Σ|f_i|` and the clamped velocity `Σ f_i·c_i / ρ` of one node.
#[inline]
pub fn node_moments(f: &[Float]) -> (Float, [Float; 3]) {
    let (density, velocity) = raw_moments(f);
    (density, clamp_to_sound_speed(velocity))
}

/// Like [`node_moments`] without the sound-speed clamp.
#[inline]
pub fn raw_moments(f: &[Float]) -> (Float, [Float; 3]) {
    let mut density = 0.0;
    let mut momentum = [0.0; 3];
    for (i, &fi) in f.iter().enumerate() {
        let c = D3Q27::velocity(i);
        density += fi.abs();
        momentum[0] += fi * c[0];
        momentum[1] += fi * c[1];
        momentum[2] += fi * c[2];
    }

    if density <= DENSITY_FLOOR {
        return (density, [0.0; 3]);
    }
    (density, [momentum[0] / density, momentum[1] / density, momentum[2] / density])
}

/// Rescales `u` onto the sound-speed sphere when it lies outside it.
#[inline]
pub fn clamp_to_sound_speed(u: [Float; 3]) -> [Float; 3] {
    let speed = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
    if speed > D3Q27::CS {
        let scale = D3Q27::CS / speed;
        [u[0] * scale, u[1] * scale, u[2] * scale]
    } else {
        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(u: [Float; 3]) -> Float {
        (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt()
    }

    #[test]
    fn rest_equilibrium_has_unit_density_and_no_velocity() {
        let (rho, u) = node_moments(&D3Q27::WEIGHTS);
        assert!((rho - 1.0).abs() < 1e-6);
        assert!(speed(u) < 1e-6);
    }

    #[test]
    fn recovers_equilibrium_velocity() {
        let f = D3Q27::equilibrium_set(1.2, [0.1, 0.0, -0.05]);
        let (rho, u) = node_moments(&f);
        assert!((rho - 1.2).abs() < 1e-5);
        assert!((u[0] - 0.1).abs() < 1e-5);
        assert!(u[1].abs() < 1e-5);
        assert!((u[2] + 0.05).abs() < 1e-5);
    }

    #[test]
    fn runaway_velocity_is_clamped_to_sound_speed() {
        // all mass moving along +x, +y: |u| = sqrt(2) before clamping
        let mut f = [0.0; 27];
        f[7] = 2.0;
        let (rho, u) = node_moments(&f);
        assert!((rho - 2.0).abs() < 1e-6);
        assert!((speed(u) - D3Q27::CS).abs() < 1e-5);
        assert!((u[0] - u[1]).abs() < 1e-6);
        assert!(u[0] > 0.0);
        assert_eq!(u[2], 0.0);
    }

    #[test]
    fn clamp_preserves_direction() {
        let raw = [3.0, -4.0, 12.0];
        let clamped = clamp_to_sound_speed(raw);
        assert!((speed(clamped) - D3Q27::CS).abs() < 1e-5);
        let scale = clamped[0] / raw[0];
        assert!((clamped[1] - raw[1] * scale).abs() < 1e-6);
        assert!((clamped[2] - raw[2] * scale).abs() < 1e-6);

        let slow = [0.1, 0.0, 0.0];
        assert_eq!(clamp_to_sound_speed(slow), slow);
    }

    #[test]
    fn density_uses_absolute_populations() {
        let mut f = D3Q27::WEIGHTS;
        f[1] = -0.1;
        let (rho, _) = node_moments(&f);
        let expected: Float = D3Q27::WEIGHTS.iter().sum::<Float>() - D3Q27::WEIGHTS[1] + 0.1;
        assert!((rho - expected).abs() < 1e-6);
    }

    #[test]
    fn empty_node_has_zero_velocity() {
        let (rho, u) = node_moments(&[0.0; 27]);
        assert_eq!(rho, 0.0);
        assert_eq!(u, [0.0; 3]);
    }

    #[test]
    fn field_covers_every_node() {
        let dims = Dimensions::new(2, 2, 1).unwrap();
        let mut populations = vec![0.0; dims.population_count()];
        for (node, chunk) in populations.chunks_exact_mut(27).enumerate() {
            chunk.copy_from_slice(&D3Q27::equilibrium_set(1.0 + node as Float, [0.0; 3]));
        }
        let mut field = MacroscopicField::new(&dims).unwrap();
        field.compute(&populations);
        for node in 0..4 {
            assert!((field.density[node] - (1.0 + node as Float)).abs() < 1e-5);
        }
    }
}
