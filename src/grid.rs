use serde::{Deserialize, Serialize};
use crate::{
    error::{LbmError, Result},
    lattice::D3Q27,
};

/// Fixed extent of the simulated box, in nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Dimensions {
    /// Checked constructor: every axis must hold at least one node and the
    /// population count must fit in `usize`.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self> {
        let dims = Self { nx, ny, nz };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = LbmError::InvalidDimensions { nx: self.nx, ny: self.ny, nz: self.nz };
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(invalid);
        }
        self.nx
            .checked_mul(self.ny)
            .and_then(|n| n.checked_mul(self.nz))
            .and_then(|n| n.checked_mul(D3Q27::Q))
            .map(|_| ())
            .ok_or(invalid)
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn population_count(&self) -> usize {
        self.node_count() * D3Q27::Q
    }

    #[inline]
    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.nx && y < self.ny && z < self.nz);
        x + y * self.nx + z * self.nx * self.ny
    }

    #[inline]
    pub fn coordinates(&self, index: usize) -> (usize, usize, usize) {
        debug_assert!(index < self.node_count());
        let plane = self.nx * self.ny;
        (index % self.nx, (index % plane) / self.nx, index / plane)
    }

    #[inline]
    pub fn population_index(node: usize, direction: usize) -> usize {
        node * D3Q27::Q + direction
    }

    /// Node a population travelling along `direction` left from to reach
    /// (x, y, z). Out-of-range coordinates wrap toroidally on every axis.
    #[inline]
    pub fn source_index(&self, x: usize, y: usize, z: usize, direction: usize) -> usize {
        let c = D3Q27::VELOCITIES[direction];
        let sx = wrap(x, c[0], self.nx);
        let sy = wrap(y, c[1], self.ny);
        let sz = wrap(z, c[2], self.nz);
        self.linear_index(sx, sy, sz)
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.nx && y < self.ny && z < self.nz
    }
}

/// `position - step` folded back into `[0, extent)`. `step` is in {-1, 0, 1}.
#[inline]
fn wrap(position: usize, step: i32, extent: usize) -> usize {
    match step {
        1 if position == 0 => extent - 1,
        1 => position - 1,
        -1 if position + 1 == extent => 0,
        -1 => position + 1,
        _ => position,
    }
}
