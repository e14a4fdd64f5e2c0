use rayon::prelude::*;
use crate::{Float, grid::Dimensions, lattice::D3Q27};

/// Pull-streams `source` into `target`: slot `i` of every node receives the
/// population that left the node at `position - c_i` along `i`.
///
/// `source` is only read. Every slot of `target` is written before this
/// returns.
pub fn stream(dims: &Dimensions, source: &[Float], target: &mut [Float]) {
    debug_assert_eq!(source.len(), dims.population_count());
    debug_assert_eq!(target.len(), dims.population_count());

    target
        .par_chunks_exact_mut(D3Q27::Q)
        .enumerate()
        .for_each(|(node, out)| {
            let (x, y, z) = dims.coordinates(node);
            out[0] = source[Dimensions::population_index(node, 0)];
            for i in 1..D3Q27::Q {
                let from = dims.source_index(x, y, z, i);
                out[i] = source[Dimensions::population_index(from, i)];
            }
        });
}
