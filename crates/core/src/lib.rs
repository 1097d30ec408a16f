//! Core library for rmc output.
//!
//! Pure Rust building blocks for writing Monte Carlo box coordinates:
//! lattice geometry, whole-molecule periodic wrapping, per-box resident
//! selection, the collaborator traits a simulation engine implements, and
//! the DCD and restart binary codecs.

pub mod lattice;
pub mod residents;
pub mod system;
pub mod trajectory;
pub mod util;
pub mod wrapping;
