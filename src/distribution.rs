use crate::{
    Float,
    error::{Result, try_alloc},
    grid::Dimensions,
    lattice::D3Q27,
};

/// Two same-shaped population arrays and a selector naming the current one.
///
/// Stages read the current generation and write the other, then flip the
/// selector, so no array is ever stencil-read while it is being written.
pub struct DistributionField {
    generations: [Vec<Float>; 2],
    current: usize,
}

impl DistributionField {
    /// Allocates both generations and fills the current one with the lattice
    /// weights (rest equilibrium at unit density).
    pub fn new(dims: &Dimensions) -> Result<Self> {
        let len = dims.population_count();
        let mut current = try_alloc::<Float>(len, "distribution generation A")?;
        let next = try_alloc::<Float>(len, "distribution generation B")?;

        for node in current.chunks_exact_mut(D3Q27::Q) {
            node.copy_from_slice(&D3Q27::WEIGHTS);
        }

        Ok(Self {
            generations: [current, next],
            current: 0,
        })
    }

    pub fn current(&self) -> &[Float] {
        &self.generations[self.current]
    }

    pub fn current_mut(&mut self) -> &mut [Float] {
        &mut self.generations[self.current]
    }

    /// The current generation as read source and the other as write target.
    pub fn split(&mut self) -> (&[Float], &mut [Float]) {
        let [a, b] = &mut self.generations;
        if self.current == 0 {
            (a.as_slice(), b.as_mut_slice())
        } else {
            (b.as_slice(), a.as_mut_slice())
        }
    }

    /// Makes the last written generation current.
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    pub fn node(&self, node: usize) -> &[Float] {
        let start = Dimensions::population_index(node, 0);
        &self.current()[start..start + D3Q27::Q]
    }

    pub fn total_mass(&self) -> f64 {
        self.current().iter().map(|&f| f.abs() as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_rest_equilibrium() {
        let dims = Dimensions::new(2, 2, 2).unwrap();
        let field = DistributionField::new(&dims).unwrap();
        assert_eq!(field.current().len(), 8 * 27);
        for node in 0..8 {
            assert_eq!(field.node(node), &D3Q27::WEIGHTS[..]);
        }
        assert!((field.total_mass() - 8.0).abs() < 1e-5);
    }

    #[test]
    fn split_targets_the_other_generation() {
        let dims = Dimensions::new(1, 1, 1).unwrap();
        let mut field = DistributionField::new(&dims).unwrap();

        let (source, target) = field.split();
        assert_eq!(source[0], D3Q27::WEIGHTS[0]);
        target.fill(2.0);
        assert_eq!(field.current()[0], D3Q27::WEIGHTS[0]);

        field.swap();
        assert!(field.current().iter().all(|&f| f == 2.0));

        let (source, _) = field.split();
        assert_eq!(source[3], 2.0);
    }
}
