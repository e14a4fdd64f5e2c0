use rayon::prelude::*;
use crate::{
    Float,
    geometry::NodeType,
    lattice::D3Q27,
    macroscopic::MacroscopicField,
};

/// Per-run constants of the collision step.
#[derive(Debug, Clone, Copy)]
pub struct CollisionParams {
    pub tau: Float,
    /// Velocity imposed on `InOutFlow` nodes
    pub inflow_velocity: [Float; 3],
}

/// Writes the post-collision generation for every node into `target`.
///
/// `source` is the streamed generation and `field` its macroscopic moments.
pub fn collide(
    params: &CollisionParams,
    node_types: &[NodeType],
    field: &MacroscopicField,
    source: &[Float],
    target: &mut [Float],
) {
    // The inflow equilibrium is the same for every InOutFlow node
    let inflow = D3Q27::equilibrium_set(1.0, params.inflow_velocity);
    let omega = 1.0 / params.tau;

    target
        .par_chunks_exact_mut(D3Q27::Q)
        .zip(source.par_chunks_exact(D3Q27::Q))
        .zip(node_types.par_iter())
        .enumerate()
        .for_each(|(node, ((out, f), node_type))| match node_type {
            NodeType::Fluid => {
                let density = field.density[node];
                let velocity = field.velocity[node];
                for i in 0..D3Q27::Q {
                    let f_eq = D3Q27::equilibrium(i, density, velocity);
                    out[i] = f[i] - omega * (f[i] - f_eq);
                }
            }
            NodeType::Reflective => {
                for i in 0..D3Q27::Q {
                    out[D3Q27::OPPOSITE[i]] = f[i];
                }
            }
            NodeType::InOutFlow => out.copy_from_slice(&inflow),
            NodeType::Sink => out.copy_from_slice(&D3Q27::WEIGHTS),
        });
}
