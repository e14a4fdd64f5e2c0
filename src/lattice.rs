use crate::Float;

/// D3Q27 Lattice-Boltzmann model constants
pub struct D3Q27;

impl D3Q27 {
    /// Number of discrete velocities
    pub const Q: usize = 27;

    /// Discrete velocities (27 directions in 3D)
    pub const VELOCITIES: [[i32; 3]; 27] = [
        // Center
        [0, 0, 0],
        // Face neighbors (6)
        [1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1],
        // Edge neighbors (12)
        [1, 1, 0], [1, -1, 0], [-1, 1, 0], [-1, -1, 0],
        [1, 0, 1], [1, 0, -1], [-1, 0, 1], [-1, 0, -1],
        [0, 1, 1], [0, 1, -1], [0, -1, 1], [0, -1, -1],
        // Corner neighbors (8)
        [1, 1, 1], [1, 1, -1], [1, -1, 1], [1, -1, -1],
        [-1, 1, 1], [-1, 1, -1], [-1, -1, 1], [-1, -1, -1],
    ];

    /// Weights for each direction
    pub const WEIGHTS: [Float; 27] = [
        // Center
        8.0/27.0,
        // Face neighbors (6)
        2.0/27.0, 2.0/27.0, 2.0/27.0, 2.0/27.0, 2.0/27.0, 2.0/27.0,
        // Edge neighbors (12)
        1.0/54.0, 1.0/54.0, 1.0/54.0, 1.0/54.0,
        1.0/54.0, 1.0/54.0, 1.0/54.0, 1.0/54.0,
        1.0/54.0, 1.0/54.0, 1.0/54.0, 1.0/54.0,
        // Corner neighbors (8)
        1.0/216.0, 1.0/216.0, 1.0/216.0, 1.0/216.0,
        1.0/216.0, 1.0/216.0, 1.0/216.0, 1.0/216.0,
    ];

    /// Opposite directions for bounce-back boundary conditions
    pub const OPPOSITE: [usize; 27] = [
        0,  // Center stays the same
        2, 1, 4, 3, 6, 5,  // Face opposites
        10, 9, 8, 7, 14, 13, 12, 11, 18, 17, 16, 15,  // Edge opposites
        26, 25, 24, 23, 22, 21, 20, 19,  // Corner opposites
    ];

    /// Speed of sound squared
    pub const CS2: Float = 1.0 / 3.0;

    /// Speed of sound, the upper bound on macroscopic speed
    pub const CS: Float = 0.577_350_26;

    /// Lattice velocity of direction `i` as floats
    #[inline]
    pub fn velocity(i: usize) -> [Float; 3] {
        let c = Self::VELOCITIES[i];
        [c[0] as Float, c[1] as Float, c[2] as Float]
    }

    /// Equilibrium distribution for direction `i`
    #[inline]
    pub fn equilibrium(direction: usize, density: Float, velocity: [Float; 3]) -> Float {
        let weight = Self::WEIGHTS[direction];
        let c = Self::velocity(direction);

        let cu = c[0] * velocity[0] + c[1] * velocity[1] + c[2] * velocity[2];
        let u2 = velocity[0] * velocity[0] + velocity[1] * velocity[1] + velocity[2] * velocity[2];

        weight * density * (1.0 + 3.0 * cu + 4.5 * cu * cu - 1.5 * u2)
    }

    /// Full equilibrium population set for one node
    pub fn equilibrium_set(density: Float, velocity: [Float; 3]) -> [Float; 27] {
        let mut f = [0.0; 27];
        for (i, slot) in f.iter_mut().enumerate() {
            *slot = Self::equilibrium(i, density, velocity);
        }
        f
    }
}
