//! Per-box resident enumeration.
//!
//! Output buffers are sized from the molecules currently in a box, so this
//! module recomputes that population from the location index on every call
//! rather than trusting any cached figure.

use crate::system::{BoxIndex, MoleculeLocations, MoleculeTopology};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResidentError {
    #[error("molecule {0} does not exist")]
    UnknownMolecule(usize),

    #[error("box {box_index} does not exist ({box_total} boxes)")]
    UnknownBox { box_index: BoxIndex, box_total: usize },

    #[error("molecule {molecule} is already in box {box_index}")]
    AlreadyPlaced { molecule: usize, box_index: BoxIndex },

    #[error("molecule {0} is not in any box")]
    NotPlaced(usize),

    #[error("box {box_index} holds {computed} atoms but the location index reports {cached}")]
    CountMismatch {
        box_index: BoxIndex,
        computed: usize,
        cached: usize,
    },
}

/// Molecules resident in one box, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxResidents {
    box_index: BoxIndex,
    molecules: Vec<usize>,
    atom_count: usize,
}

impl BoxResidents {
    pub fn box_index(&self) -> BoxIndex {
        self.box_index
    }

    pub fn molecules(&self) -> &[usize] {
        &self.molecules
    }

    /// Sum of the atom counts of every resident molecule.
    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    pub fn is_empty(&self) -> bool {
        self.atom_count == 0
    }

    /// Atom indices in resident order, grouped by molecule.
    pub fn atoms<'a, T>(&'a self, topology: &'a T) -> impl Iterator<Item = usize> + 'a
    where
        T: MoleculeTopology + ?Sized,
    {
        self.molecules
            .iter()
            .flat_map(move |&mol| topology.atom_range(mol))
    }

    /// Compare the computed count with the count the engine caches, if any.
    pub fn verify_cached<L>(&self, locations: &L) -> Result<(), ResidentError>
    where
        L: MoleculeLocations + ?Sized,
    {
        match locations.cached_atom_count(self.box_index) {
            Some(cached) if cached != self.atom_count => Err(ResidentError::CountMismatch {
                box_index: self.box_index,
                computed: self.atom_count,
                cached,
            }),
            _ => Ok(()),
        }
    }
}

/// Enumerate the molecules of `box_index` and total their atoms.
///
/// Molecules are visited by ascending id, so the same location state always
/// yields the same order. Restart files depend on that.
pub fn select_residents<T, L>(topology: &T, locations: &L, box_index: BoxIndex) -> BoxResidents
where
    T: MoleculeTopology + ?Sized,
    L: MoleculeLocations + ?Sized,
{
    let mut molecules = Vec::new();
    let mut atom_count = 0;
    for mol in 0..topology.molecule_count() {
        if locations.box_of(mol) == Some(box_index) {
            molecules.push(mol);
            atom_count += topology.atom_count(mol);
        }
    }
    BoxResidents {
        box_index,
        molecules,
        atom_count,
    }
}
