//! Shared fixtures for the unit tests: a small two-box system and a codec
//! that records frames in memory.

use crate::view::SimulationView;
use rmc_core::lattice::Lattice;
use rmc_core::system::{BoxDimensions, Coordinates, MoleculeKind, MoleculeLookup, MoleculeTable};
use rmc_core::trajectory::{FrameSink, TrajectoryCodec, TrajectoryError};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Two boxes: box 0 holds an argon atom and a water straddling +x,
/// box 1 holds two waters. Molecule 4 (argon) starts unplaced.
pub struct Fixture {
    pub table: MoleculeTable,
    pub lookup: MoleculeLookup,
    pub coords: Coordinates,
    pub dims: BoxDimensions,
}

impl Fixture {
    pub fn two_box() -> Self {
        let mut table = MoleculeTable::new();
        let water = table.add_kind(MoleculeKind::new("TIP3", vec![15.999, 1.008, 1.008]));
        let argon = table.add_kind(MoleculeKind::new("AR", vec![39.948]));
        for kind in [argon, water, water, water, argon] {
            table.push_molecule(kind);
        }

        let positions = vec![
            // 0: argon in box 0
            [3.0, 4.0, 5.0],
            // 1: water in box 0, center of mass beyond x = 20
            [21.0, 5.0, 5.0],
            [21.8, 5.6, 5.0],
            [20.2, 5.6, 5.0],
            // 2: water in box 1
            [-2.0, 10.0, 10.0],
            [-1.2, 10.6, 10.0],
            [-2.8, 10.6, 10.0],
            // 3: water in box 1
            [12.0, 12.0, 31.0],
            [12.8, 12.6, 31.0],
            [11.2, 12.6, 31.0],
            // 4: unplaced argon
            [7.0, 7.0, 7.0],
        ];
        let coords = Coordinates::new(positions, &table);

        let mut lookup = MoleculeLookup::new(&table, 2);
        for (mol, b) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            lookup.insert(mol, b).expect("fixture placement");
        }

        let mut dims = BoxDimensions::new(2);
        dims.set_lattice(0, Lattice::orthogonal([20.0, 20.0, 20.0]).expect("box 0"));
        dims.set_lattice(
            1,
            Lattice::from_lengths_angles([25.0, 25.0, 25.0], [90.0, 90.0, 120.0]).expect("box 1"),
        );

        Self {
            table,
            lookup,
            coords,
            dims,
        }
    }

    pub fn view(&self) -> SimulationView<'_> {
        SimulationView::new(&self.table, &self.lookup, &self.coords, &self.dims)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub path: PathBuf,
    pub step: u64,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub unit_cell: [f64; 6],
}

#[derive(Debug, Default)]
pub struct Recording {
    pub opened: Vec<(PathBuf, usize)>,
    pub frames: Vec<RecordedFrame>,
    pub closed: Vec<PathBuf>,
}

/// Codec whose sinks append to a shared [`Recording`].
#[derive(Clone, Default)]
pub struct MemoryCodec {
    pub recording: Rc<RefCell<Recording>>,
    /// Paths whose sinks fail on every write.
    pub failing: Vec<PathBuf>,
}

pub struct MemorySink {
    path: PathBuf,
    n_atoms: usize,
    fail: bool,
    recording: Rc<RefCell<Recording>>,
}

impl TrajectoryCodec for MemoryCodec {
    type Sink = MemorySink;

    fn open(&self, path: &Path, n_atoms: usize) -> Result<MemorySink, TrajectoryError> {
        self.recording
            .borrow_mut()
            .opened
            .push((path.to_path_buf(), n_atoms));
        Ok(MemorySink {
            path: path.to_path_buf(),
            n_atoms,
            fail: self.failing.iter().any(|p| p == path),
            recording: Rc::clone(&self.recording),
        })
    }
}

impl FrameSink for MemorySink {
    fn write_frame(
        &mut self,
        step: u64,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        unit_cell: &[f64; 6],
    ) -> Result<(), TrajectoryError> {
        if self.fail {
            return Err(TrajectoryError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        assert_eq!(x.len(), self.n_atoms);
        self.recording.borrow_mut().frames.push(RecordedFrame {
            path: self.path.clone(),
            step,
            x: x.to_vec(),
            y: y.to_vec(),
            z: z.to_vec(),
            unit_cell: *unit_cell,
        });
        Ok(())
    }

    fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn close(self) -> Result<(), TrajectoryError> {
        self.recording.borrow_mut().closed.push(self.path);
        Ok(())
    }
}
