//! Output settings.
//!
//! The engine's input parser hands over an [`OutputConfig`]; it can also be
//! read from TOML:
//!
//! ```toml
//! unique_name = "methane_gemc"
//! replica_dir = "replica_3"
//!
//! [[boxes]]
//! state = { enable = true, frequency = 1000 }
//! restart = { enable = true, frequency = 10000 }
//!
//! [[boxes]]
//! state = { enable = true, frequency = 1000 }
//! state_file = "vapor.dcd"
//! ```

use crate::error::OutputError;
use crate::schedule::StreamKind;
use rmc_core::system::BoxIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Enable flag and cadence for one output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventSettings {
    pub enable: bool,
    pub frequency: u64,
}

impl EventSettings {
    pub fn every(frequency: u64) -> Self {
        Self {
            enable: true,
            frequency,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// True when this stream should be written at `step`.
    pub fn fires(&self, step: u64) -> bool {
        self.enable && self.frequency > 0 && step % self.frequency == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoxOutputConfig {
    /// DCD trajectory stream.
    pub state: EventSettings,
    /// Binary restart coordinates.
    pub restart: EventSettings,
    pub state_file: Option<PathBuf>,
    pub restart_file: Option<PathBuf>,
}

impl BoxOutputConfig {
    pub fn settings(&self, kind: StreamKind) -> EventSettings {
        match kind {
            StreamKind::State => self.state,
            StreamKind::Restart => self.restart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// One entry per simulation box, indexed by box number.
    pub boxes: Vec<BoxOutputConfig>,
    /// Stem for default file names.
    pub unique_name: String,
    /// Prefix applied to every output path, for multi-replica runs.
    pub replica_dir: Option<PathBuf>,
    /// Written into the DCD header.
    pub timestep: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            boxes: Vec::new(),
            unique_name: "output".to_string(),
            replica_dir: None,
            timestep: 1.0,
        }
    }
}

impl OutputConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OutputError> {
        Ok(toml::from_str(text)?)
    }

    /// Check the settings against a system of `box_total` boxes.
    ///
    /// Runs before any file is opened, so a bad configuration never leaves
    /// half-created outputs behind.
    pub fn validate(&self, box_total: usize) -> Result<(), OutputError> {
        if self.boxes.len() < box_total {
            return Err(OutputError::Config(format!(
                "{} boxes in the system but only {} output entries",
                box_total,
                self.boxes.len()
            )));
        }
        if !self.timestep.is_finite() {
            return Err(OutputError::Config(format!(
                "timestep must be finite, got {}",
                self.timestep
            )));
        }

        let mut seen: HashMap<PathBuf, (BoxIndex, StreamKind)> = HashMap::new();
        for box_index in 0..box_total {
            for kind in StreamKind::ALL {
                let settings = self.boxes[box_index].settings(kind);
                if !settings.enable {
                    continue;
                }
                if settings.frequency == 0 {
                    return Err(OutputError::Config(format!(
                        "box {} has {} output enabled with frequency 0",
                        box_index, kind
                    )));
                }
                let path = self.path(box_index, kind);
                if path.as_os_str().is_empty() || path.file_name().is_none() {
                    return Err(OutputError::Config(format!(
                        "box {} {} output has no usable file name",
                        box_index, kind
                    )));
                }
                if let Some((other_box, other_kind)) = seen.insert(path.clone(), (box_index, kind)) {
                    return Err(OutputError::Config(format!(
                        "box {} {} output and box {} {} output both write '{}'",
                        other_box,
                        other_kind,
                        box_index,
                        kind,
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Trajectory path for a box.
    pub fn state_path(&self, box_index: BoxIndex) -> PathBuf {
        self.path(box_index, StreamKind::State)
    }

    /// Restart path for a box.
    pub fn restart_path(&self, box_index: BoxIndex) -> PathBuf {
        self.path(box_index, StreamKind::Restart)
    }

    pub fn path(&self, box_index: BoxIndex, kind: StreamKind) -> PathBuf {
        let explicit = self.boxes.get(box_index).and_then(|b| match kind {
            StreamKind::State => b.state_file.clone(),
            StreamKind::Restart => b.restart_file.clone(),
        });
        let file = explicit.unwrap_or_else(|| match kind {
            StreamKind::State => format!("{}_BOX_{}.dcd", self.unique_name, box_index).into(),
            StreamKind::Restart => {
                format!("{}_BOX_{}_restart.coor", self.unique_name, box_index).into()
            }
        });
        match &self.replica_dir {
            Some(dir) => dir.join(file),
            None => file,
        }
    }
}
