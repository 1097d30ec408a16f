//! Read-only views of the simulation state consumed by the output code.
//!
//! The move engine owns molecule topology, box membership, coordinates and
//! box geometry. The output code only reads them through the traits below.
//! Simple in-memory implementations are provided for engines that do not
//! have their own, and for tests.

use crate::lattice::Lattice;
use crate::residents::ResidentError;
use crate::util::center_of_mass;
use std::ops::Range;

/// Index of a simulation box.
pub type BoxIndex = usize;

/// Per-molecule atom layout.
pub trait MoleculeTopology {
    fn molecule_count(&self) -> usize;

    /// Contiguous atom index range of a molecule. Fixed for its lifetime.
    fn atom_range(&self, molecule: usize) -> Range<usize>;

    fn atom_count(&self, molecule: usize) -> usize {
        self.atom_range(molecule).len()
    }

    /// Number of atoms across every molecule, resident or not.
    fn total_atoms(&self) -> usize {
        (0..self.molecule_count()).map(|m| self.atom_count(m)).sum()
    }
}

/// Which box each molecule currently occupies.
pub trait MoleculeLocations {
    /// `None` for molecules not present in any box (e.g. deleted in GCMC).
    fn box_of(&self, molecule: usize) -> Option<BoxIndex>;

    /// Atom count the engine tracks for a box, if it tracks one. Compared
    /// against the recomputed count to catch bookkeeping drift.
    fn cached_atom_count(&self, _box_index: BoxIndex) -> Option<usize> {
        None
    }
}

/// Live coordinates.
pub trait CoordinateSource {
    /// Unwrapped positions of a contiguous atom range.
    fn positions(&self, atoms: Range<usize>) -> &[[f64; 3]];

    fn center_of_mass(&self, molecule: usize) -> [f64; 3];
}

/// Per-box cell geometry.
pub trait BoxGeometry {
    fn box_total(&self) -> usize;

    /// `None` while the lattice of a box has not been defined yet.
    fn lattice(&self, box_index: BoxIndex) -> Option<&Lattice>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// A molecule type: its name and per-atom masses.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeKind {
    pub name: String,
    pub masses: Vec<f64>,
}

impl MoleculeKind {
    pub fn new(name: impl Into<String>, masses: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            masses,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.masses.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct MoleculeRecord {
    kind: usize,
    first_atom: usize,
}

/// Molecule instances laid out back to back in atom index space.
#[derive(Debug, Clone, Default)]
pub struct MoleculeTable {
    kinds: Vec<MoleculeKind>,
    molecules: Vec<MoleculeRecord>,
    n_atoms: usize,
}

impl MoleculeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a molecule kind and return its index.
    pub fn add_kind(&mut self, kind: MoleculeKind) -> usize {
        self.kinds.push(kind);
        self.kinds.len() - 1
    }

    /// Append one molecule of `kind`, returning its id. Atom indices are
    /// allocated contiguously after the previous molecule.
    pub fn push_molecule(&mut self, kind: usize) -> usize {
        let n = self.kinds[kind].atom_count();
        self.molecules.push(MoleculeRecord {
            kind,
            first_atom: self.n_atoms,
        });
        self.n_atoms += n;
        self.molecules.len() - 1
    }

    pub fn kind_of(&self, molecule: usize) -> &MoleculeKind {
        &self.kinds[self.molecules[molecule].kind]
    }
}

impl MoleculeTopology for MoleculeTable {
    fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    fn atom_range(&self, molecule: usize) -> Range<usize> {
        let record = self.molecules[molecule];
        let n = self.kinds[record.kind].atom_count();
        record.first_atom..record.first_atom + n
    }

    fn total_atoms(&self) -> usize {
        self.n_atoms
    }
}

/// Box membership with incrementally maintained per-box atom counts.
#[derive(Debug, Clone)]
pub struct MoleculeLookup {
    assignment: Vec<Option<BoxIndex>>,
    molecule_atoms: Vec<usize>,
    box_atoms: Vec<usize>,
}

impl MoleculeLookup {
    /// Every molecule starts outside all boxes.
    pub fn new<T: MoleculeTopology + ?Sized>(topology: &T, box_total: usize) -> Self {
        let n = topology.molecule_count();
        Self {
            assignment: vec![None; n],
            molecule_atoms: (0..n).map(|m| topology.atom_count(m)).collect(),
            box_atoms: vec![0; box_total],
        }
    }

    pub fn box_total(&self) -> usize {
        self.box_atoms.len()
    }

    /// Place a molecule that is currently in no box.
    pub fn insert(&mut self, molecule: usize, box_index: BoxIndex) -> Result<(), ResidentError> {
        self.check(molecule, box_index)?;
        if let Some(current) = self.assignment[molecule] {
            return Err(ResidentError::AlreadyPlaced {
                molecule,
                box_index: current,
            });
        }
        self.assignment[molecule] = Some(box_index);
        self.box_atoms[box_index] += self.molecule_atoms[molecule];
        Ok(())
    }

    /// Take a molecule out of its box. Returns the box it was in.
    pub fn remove(&mut self, molecule: usize) -> Result<BoxIndex, ResidentError> {
        let current = self
            .assignment
            .get_mut(molecule)
            .ok_or(ResidentError::UnknownMolecule(molecule))?
            .take()
            .ok_or(ResidentError::NotPlaced(molecule))?;
        self.box_atoms[current] -= self.molecule_atoms[molecule];
        Ok(current)
    }

    /// Move a placed molecule to another box (GEMC-style swap).
    pub fn transfer(&mut self, molecule: usize, to: BoxIndex) -> Result<(), ResidentError> {
        self.check(molecule, to)?;
        self.remove(molecule)?;
        self.insert(molecule, to)
    }

    fn check(&self, molecule: usize, box_index: BoxIndex) -> Result<(), ResidentError> {
        if molecule >= self.assignment.len() {
            return Err(ResidentError::UnknownMolecule(molecule));
        }
        if box_index >= self.box_atoms.len() {
            return Err(ResidentError::UnknownBox {
                box_index,
                box_total: self.box_atoms.len(),
            });
        }
        Ok(())
    }
}

impl MoleculeLocations for MoleculeLookup {
    fn box_of(&self, molecule: usize) -> Option<BoxIndex> {
        self.assignment.get(molecule).copied().flatten()
    }

    fn cached_atom_count(&self, box_index: BoxIndex) -> Option<usize> {
        self.box_atoms.get(box_index).copied()
    }
}

/// Flat coordinate store with one cached center of mass per molecule.
#[derive(Debug, Clone, Default)]
pub struct Coordinates {
    positions: Vec<[f64; 3]>,
    centers: Vec<[f64; 3]>,
}

impl Coordinates {
    /// Take ownership of `positions` and compute every center of mass.
    pub fn new(positions: Vec<[f64; 3]>, table: &MoleculeTable) -> Self {
        let mut coords = Self {
            positions,
            centers: Vec::new(),
        };
        coords.refresh_centers(table);
        coords
    }

    pub fn positions_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.positions
    }

    /// Recompute mass-weighted centers from the current positions.
    pub fn refresh_centers(&mut self, table: &MoleculeTable) {
        self.centers = (0..table.molecule_count())
            .map(|m| {
                center_of_mass(
                    &self.positions[table.atom_range(m)],
                    &table.kind_of(m).masses,
                )
            })
            .collect();
    }
}

impl CoordinateSource for Coordinates {
    fn positions(&self, atoms: Range<usize>) -> &[[f64; 3]] {
        &self.positions[atoms]
    }

    fn center_of_mass(&self, molecule: usize) -> [f64; 3] {
        self.centers[molecule]
    }
}

/// Lattices for every box, possibly not yet defined.
#[derive(Debug, Clone, Default)]
pub struct BoxDimensions {
    lattices: Vec<Option<Lattice>>,
}

impl BoxDimensions {
    pub fn new(box_total: usize) -> Self {
        Self {
            lattices: vec![None; box_total],
        }
    }

    /// Replace the lattice of a box, e.g. after a volume move.
    pub fn set_lattice(&mut self, box_index: BoxIndex, lattice: Lattice) {
        self.lattices[box_index] = Some(lattice);
    }
}

impl BoxGeometry for BoxDimensions {
    fn box_total(&self) -> usize {
        self.lattices.len()
    }

    fn lattice(&self, box_index: BoxIndex) -> Option<&Lattice> {
        self.lattices.get(box_index).and_then(Option::as_ref)
    }
}
