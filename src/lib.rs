//! D3Q27 lattice Boltzmann solver for incompressible flow on a fixed 3D grid.
//!
//! Each [`Simulation::advance`] runs streaming, macroscopic moments and the
//! boundary-aware collision as full-grid data-parallel passes, then publishes
//! the frame's density and velocity through a lock-free double buffer that
//! any number of [`SnapshotReader`]s can poll from other threads.

pub mod collision;
pub mod config;
pub mod distribution;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod lattice;
pub mod macroscopic;
pub mod output;
pub mod publisher;
pub mod solver;
pub mod streaming;

pub use config::Config;
pub use error::{LbmError, Result};
pub use geometry::{BoundaryPreset, Geometry, NodeType};
pub use grid::Dimensions;
pub use lattice::D3Q27;
pub use output::VTKWriter;
pub use publisher::{DensitySnapshot, FramePublisher, FrameSnapshot, SnapshotReader, VelocitySnapshot};
pub use solver::Simulation;

pub type Float = f32;
