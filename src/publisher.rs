//! Lock-free hand-off of the latest macroscopic frame to any number of readers.
//!
//! The published frame lives in an `ArcSwap`. The single writer fills a back
//! buffer and swaps it in, taking the previous frame back as the next back
//! buffer, so a reader always resolves a complete frame. Once resolved, a
//! snapshot is immutable and later frames never touch it.

use std::ops::Deref;
use std::sync::Arc;
use arc_swap::ArcSwap;
use crate::{
    Float,
    error::{LbmError, Result, try_alloc},
};

/// Macroscopic fields of one completed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    frame: u64,
    velocity: Vec<[Float; 3]>,
    density: Vec<Float>,
}

impl FrameSnapshot {
    fn zeroed(node_count: usize) -> Result<Self> {
        Ok(Self {
            frame: 0,
            velocity: try_alloc(node_count, "velocity snapshot")?,
            density: try_alloc(node_count, "density snapshot")?,
        })
    }

    fn overwrite(&mut self, frame: u64, density: &[Float], velocity: &[[Float; 3]]) {
        self.frame = frame;
        self.density.copy_from_slice(density);
        self.velocity.copy_from_slice(velocity);
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn velocity(&self) -> &[[Float; 3]] {
        &self.velocity
    }

    pub fn density(&self) -> &[Float] {
        &self.density
    }

    pub fn len(&self) -> usize {
        self.density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density.is_empty()
    }

    /// Raw native-endian bytes of the velocity array, three floats per node.
    pub fn velocity_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.velocity)
    }

    /// Raw native-endian bytes of the density array.
    pub fn density_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.density)
    }

    pub fn total_density(&self) -> f64 {
        self.density.iter().map(|&rho| rho as f64).sum()
    }

    pub fn max_speed(&self) -> Float {
        self.velocity
            .iter()
            .map(|u| (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt())
            .fold(0.0, Float::max)
    }
}

/// Writing half. Owned by the solver; `publish` takes `&mut self`, so there is
/// exactly one writer.
pub struct FramePublisher {
    published: Arc<ArcSwap<FrameSnapshot>>,
    back: Arc<FrameSnapshot>,
    node_count: usize,
}

impl FramePublisher {
    /// Preallocates both buffers for `node_count` nodes.
    pub fn new(node_count: usize) -> Result<Self> {
        let front = Arc::new(FrameSnapshot::zeroed(node_count)?);
        let back = Arc::new(FrameSnapshot::zeroed(node_count)?);
        Ok(Self {
            published: Arc::new(ArcSwap::new(front)),
            back,
            node_count,
        })
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            published: Arc::clone(&self.published),
        }
    }

    /// Copies one frame into the back buffer and makes it current.
    ///
    /// Never waits on readers: a back buffer that a reader still holds is
    /// left to that reader and replaced by a new allocation.
    pub fn publish(&mut self, frame: u64, density: &[Float], velocity: &[[Float; 3]]) -> Result<()> {
        if density.len() != self.node_count || velocity.len() != self.node_count {
            return Err(LbmError::GeometryMismatch {
                expected: self.node_count,
                actual: density.len().min(velocity.len()),
            });
        }

        match Arc::get_mut(&mut self.back) {
            Some(buffer) => buffer.overwrite(frame, density, velocity),
            None => {
                let mut fresh = FrameSnapshot::zeroed(self.node_count)?;
                fresh.overwrite(frame, density, velocity);
                self.back = Arc::new(fresh);
            }
        }

        self.back = self.published.swap(Arc::clone(&self.back));
        Ok(())
    }
}

/// Read half. Cheap to clone and safe to move to other threads.
#[derive(Clone)]
pub struct SnapshotReader {
    published: Arc<ArcSwap<FrameSnapshot>>,
}

impl SnapshotReader {
    /// Both fields of the latest published frame.
    pub fn snapshot(&self) -> Arc<FrameSnapshot> {
        self.published.load_full()
    }

    pub fn current_velocity_snapshot(&self) -> VelocitySnapshot {
        VelocitySnapshot(self.snapshot())
    }

    pub fn current_density_snapshot(&self) -> DensitySnapshot {
        DensitySnapshot(self.snapshot())
    }

    pub fn frame(&self) -> u64 {
        self.snapshot().frame()
    }
}

/// Read-only velocity array of one frame.
#[derive(Debug, Clone)]
pub struct VelocitySnapshot(Arc<FrameSnapshot>);

impl VelocitySnapshot {
    pub fn frame(&self) -> u64 {
        self.0.frame()
    }
}

impl Deref for VelocitySnapshot {
    type Target = [[Float; 3]];

    fn deref(&self) -> &Self::Target {
        self.0.velocity()
    }
}

/// Read-only density array of one frame.
#[derive(Debug, Clone)]
pub struct DensitySnapshot(Arc<FrameSnapshot>);

impl DensitySnapshot {
    pub fn frame(&self) -> u64 {
        self.0.frame()
    }
}

impl Deref for DensitySnapshot {
    type Target = [Float];

    fn deref(&self) -> &Self::Target {
        self.0.density()
    }
}
