use crate::Float;

/// Errors raised while configuring or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum LbmError {
    #[error("grid dimensions must be positive, got {nx}x{ny}x{nz}")]
    InvalidDimensions { nx: usize, ny: usize, nz: usize },

    #[error("relaxation time tau = {0} must be finite and greater than 0.5")]
    UnstableTau(Float),

    #[error("no tau, viscosity or reynolds number supplied to derive the relaxation time")]
    MissingViscosity,

    #[error("unrecognized node type code {code} at node {node}")]
    UnknownNodeType { code: u32, node: usize },

    #[error("geometry has {actual} nodes but the grid has {expected}")]
    GeometryMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("numerical instability at frame {frame}, node {node}: {reason}")]
    NumericalInstability {
        frame: u64,
        node: usize,
        reason: &'static str,
    },

    #[error("node ({x}, {y}, {z}) direction {direction} is outside the grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        z: usize,
        direction: usize,
    },

    #[error("simulation halted after a failed frame")]
    Halted,

    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, LbmError>;

/// Allocates a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let bytes = len.saturating_mul(std::mem::size_of::<T>());
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| LbmError::Allocation { what, bytes })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}
