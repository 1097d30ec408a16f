//! Binary coordinate streams.
//!
//! - DCD: CHARMM/NAMD binary trajectory format (reader and writer)
//! - restart: flat single-frame coordinate dump used to resume a run
//!
//! Writers sit behind the [`TrajectoryCodec`] / [`FrameSink`] pair so output
//! code can be driven by any trajectory backend, or by an in-memory one in
//! tests.

pub mod dcd;
pub mod restart;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid DCD data: {0}")]
    InvalidDcd(String),

    #[error("invalid restart data: {0}")]
    InvalidRestart(String),

    #[error("frame {frame} out of range ({n_frames} frames)")]
    FrameOutOfRange { frame: usize, n_frames: usize },

    #[error("got {found} atoms but {expected} were expected")]
    AtomCountMismatch { expected: usize, found: usize },
}

impl TrajectoryError {
    pub(crate) fn open(path: &Path, source: std::io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An open, append-only trajectory stream for a fixed number of atoms.
pub trait FrameSink {
    /// Append one frame. The coordinate slices must all have `n_atoms()`
    /// entries; `unit_cell` is the record produced by
    /// [`Lattice::unit_cell`](crate::lattice::Lattice::unit_cell).
    fn write_frame(
        &mut self,
        step: u64,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        unit_cell: &[f64; 6],
    ) -> Result<(), TrajectoryError>;

    fn n_atoms(&self) -> usize;

    /// Flush and release the stream.
    fn close(self) -> Result<(), TrajectoryError>
    where
        Self: Sized;
}

/// Factory for trajectory streams.
pub trait TrajectoryCodec {
    type Sink: FrameSink;

    /// Create (truncating) a stream at `path` for frames of `n_atoms` atoms.
    fn open(&self, path: &Path, n_atoms: usize) -> Result<Self::Sink, TrajectoryError>;
}
