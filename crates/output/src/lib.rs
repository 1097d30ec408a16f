//! Trajectory and restart output for Monte Carlo simulations.
//!
//! Writes per-box DCD trajectories and binary restart coordinates with
//! whole-molecule periodic wrapping, for any number of boxes with
//! independent output cadences. The engine state is read through the
//! `rmc_core::system` traits; trajectory files go through a
//! `rmc_core::trajectory::TrajectoryCodec`.

pub mod config;
pub mod error;
pub mod frame;
pub mod manager;
pub mod restart;
pub mod schedule;
pub mod view;

#[cfg(test)]
mod testing;

pub use config::{BoxOutputConfig, EventSettings, OutputConfig};
pub use error::OutputError;
pub use manager::{OutputManager, OutputReport};
pub use view::SimulationView;
