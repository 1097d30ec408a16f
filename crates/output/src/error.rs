use crate::schedule::StreamKind;
use rmc_core::residents::ResidentError;
use rmc_core::system::BoxIndex;
use rmc_core::trajectory::TrajectoryError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop an output event. All variants are fatal for the
/// run; callers are expected to report them and abort.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("invalid output configuration: {0}")]
    Config(String),

    #[error("failed to parse output configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("box {box_index} has no lattice at step {step}")]
    MissingLattice { box_index: BoxIndex, step: u64 },

    #[error("box {box_index} has {kind} output enabled but no resident atoms at step {step}")]
    EmptyBox {
        box_index: BoxIndex,
        kind: StreamKind,
        step: u64,
    },

    #[error("box {box_index}: cannot open {kind} file '{path}': {source}")]
    Open {
        box_index: BoxIndex,
        kind: StreamKind,
        path: PathBuf,
        #[source]
        source: TrajectoryError,
    },

    #[error("box {box_index}: writing {kind} file '{path}' at step {step} failed: {source}")]
    Codec {
        box_index: BoxIndex,
        kind: StreamKind,
        step: u64,
        path: PathBuf,
        #[source]
        source: TrajectoryError,
    },

    #[error("box {box_index}: closing {kind} file '{path}' failed: {source}")]
    Close {
        box_index: BoxIndex,
        kind: StreamKind,
        path: PathBuf,
        #[source]
        source: TrajectoryError,
    },

    #[error("box {box_index} at step {step}: {source}")]
    Residents {
        box_index: BoxIndex,
        step: u64,
        #[source]
        source: ResidentError,
    },
}
