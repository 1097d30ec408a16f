//! Per-box DCD trajectory output.
//!
//! A DCD file fixes its atom count in the header, while a Monte Carlo box
//! gains and loses molecules. Every frame therefore covers all atoms of the
//! system in molecule order: atoms of molecules resident in the box carry
//! their wrapped positions, all others sit at the origin.

use crate::config::OutputConfig;
use crate::error::OutputError;
use crate::schedule::StreamKind;
use crate::view::SimulationView;
use rmc_core::system::BoxIndex;
use rmc_core::trajectory::{FrameSink, TrajectoryCodec};
use rmc_core::wrapping::wrap_residents;
use std::path::{Path, PathBuf};

/// One trajectory frame, built fresh for each output event.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub step: u64,
    pub box_index: BoxIndex,
    /// `[a, cos γ, b, cos β, cos α, c]`
    pub unit_cell: [f64; 6],
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl Frame {
    pub fn n_atoms(&self) -> usize {
        self.x.len()
    }
}

/// Build the frame for `box_index` at `step` from the current engine state.
///
/// Reads only; two calls on unchanged state return identical frames.
pub fn assemble_frame(
    view: &SimulationView<'_>,
    box_index: BoxIndex,
    step: u64,
) -> Result<Frame, OutputError> {
    let lattice = view.lattice(box_index, step)?;
    let residents = view.residents(box_index, step)?;
    if residents.is_empty() {
        return Err(OutputError::EmptyBox {
            box_index,
            kind: StreamKind::State,
            step,
        });
    }

    let mut wrapped = Vec::with_capacity(residents.atom_count());
    wrap_residents(lattice, &residents, view.topology, view.coordinates, &mut wrapped);

    let n_atoms = view.topology.total_atoms();
    let mut x = vec![0.0f32; n_atoms];
    let mut y = vec![0.0f32; n_atoms];
    let mut z = vec![0.0f32; n_atoms];
    for (atom, p) in residents.atoms(view.topology).zip(&wrapped) {
        x[atom] = p[0] as f32;
        y[atom] = p[1] as f32;
        z[atom] = p[2] as f32;
    }

    Ok(Frame {
        step,
        box_index,
        unit_cell: lattice.unit_cell(),
        x,
        y,
        z,
    })
}

/// Lifecycle of one per-box output stream.
#[derive(Debug)]
pub enum StreamState<S> {
    /// Output is switched off for this box; nothing was opened.
    Disabled,
    Ready(S),
    Closed,
}

impl<S> StreamState<S> {
    pub fn is_ready(&self) -> bool {
        matches!(self, StreamState::Ready(_))
    }

    /// The open stream. Panics if the stream was closed or never enabled.
    pub(crate) fn ready_mut(&mut self, box_index: BoxIndex, kind: StreamKind) -> &mut S {
        match self {
            StreamState::Ready(stream) => stream,
            StreamState::Disabled => {
                panic!("{} output for box {} is disabled", kind, box_index)
            }
            StreamState::Closed => {
                panic!("{} output for box {} written after close", kind, box_index)
            }
        }
    }

    /// Move to `Closed`, handing back the stream if one was open.
    pub(crate) fn take(&mut self) -> Option<S> {
        match std::mem::replace(self, StreamState::Closed) {
            StreamState::Ready(stream) => Some(stream),
            StreamState::Disabled | StreamState::Closed => None,
        }
    }
}

/// DCD streams for every box with state output enabled.
pub struct TrajectoryWriter<S: FrameSink> {
    streams: Vec<StreamState<S>>,
    paths: Vec<PathBuf>,
    frames_written: Vec<usize>,
}

impl<S: FrameSink> TrajectoryWriter<S> {
    /// Open one stream per enabled box, each sized for `n_atoms`.
    pub fn open<C>(
        codec: &C,
        config: &OutputConfig,
        box_total: usize,
        n_atoms: usize,
    ) -> Result<Self, OutputError>
    where
        C: TrajectoryCodec<Sink = S>,
    {
        let mut streams = Vec::with_capacity(box_total);
        let mut paths = Vec::with_capacity(box_total);
        for box_index in 0..box_total {
            let path = config.state_path(box_index);
            let enabled = config
                .boxes
                .get(box_index)
                .is_some_and(|b| b.state.enable);
            if enabled {
                let sink = codec.open(&path, n_atoms).map_err(|source| OutputError::Open {
                    box_index,
                    kind: StreamKind::State,
                    path: path.clone(),
                    source,
                })?;
                log::info!(
                    "Box {}: trajectory '{}' opened for {} atoms",
                    box_index,
                    path.display(),
                    n_atoms
                );
                streams.push(StreamState::Ready(sink));
            } else {
                streams.push(StreamState::Disabled);
            }
            paths.push(path);
        }

        Ok(Self {
            streams,
            paths,
            frames_written: vec![0; box_total],
        })
    }

    pub fn is_ready(&self, box_index: BoxIndex) -> bool {
        self.streams.get(box_index).is_some_and(StreamState::is_ready)
    }

    pub fn is_closed(&self) -> bool {
        self.streams
            .iter()
            .all(|s| matches!(s, StreamState::Closed))
    }

    pub fn path(&self, box_index: BoxIndex) -> &Path {
        &self.paths[box_index]
    }

    pub fn frames_written(&self, box_index: BoxIndex) -> usize {
        self.frames_written[box_index]
    }

    /// Append `frame` to its box's stream.
    ///
    /// # Panics
    ///
    /// If the box's stream is disabled or already closed.
    pub fn write(&mut self, frame: &Frame) -> Result<(), OutputError> {
        let box_index = frame.box_index;
        let sink = self.streams[box_index].ready_mut(box_index, StreamKind::State);
        sink.write_frame(frame.step, &frame.x, &frame.y, &frame.z, &frame.unit_cell)
            .map_err(|source| OutputError::Codec {
                box_index,
                kind: StreamKind::State,
                step: frame.step,
                path: self.paths[box_index].clone(),
                source,
            })?;
        self.frames_written[box_index] += 1;
        log::debug!(
            "Box {}: trajectory frame {} at step {}",
            box_index,
            self.frames_written[box_index],
            frame.step
        );
        Ok(())
    }

    /// Close every open stream. Safe to call more than once; later calls do
    /// nothing. Every stream is closed even if one fails, and the first
    /// failure is returned.
    pub fn close(&mut self) -> Result<(), OutputError> {
        let mut first_error = None;
        for (box_index, state) in self.streams.iter_mut().enumerate() {
            let Some(sink) = state.take() else {
                continue;
            };
            match sink.close() {
                Ok(()) => log::info!(
                    "Box {}: trajectory '{}' closed after {} frames",
                    box_index,
                    self.paths[box_index].display(),
                    self.frames_written[box_index]
                ),
                Err(source) => {
                    first_error.get_or_insert(OutputError::Close {
                        box_index,
                        kind: StreamKind::State,
                        path: self.paths[box_index].clone(),
                        source,
                    });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<S: FrameSink> Drop for TrajectoryWriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }
    }
}
