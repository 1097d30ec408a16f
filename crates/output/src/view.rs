//! Read-only borrow of engine state for one output event.

use crate::error::OutputError;
use rmc_core::lattice::Lattice;
use rmc_core::residents::{select_residents, BoxResidents};
use rmc_core::system::{BoxGeometry, BoxIndex, CoordinateSource, MoleculeLocations, MoleculeTopology};

/// Read-only borrow of the engine state for the duration of one output
/// event.
#[derive(Clone, Copy)]
pub struct SimulationView<'a> {
    pub topology: &'a dyn MoleculeTopology,
    pub locations: &'a dyn MoleculeLocations,
    pub coordinates: &'a dyn CoordinateSource,
    pub geometry: &'a dyn BoxGeometry,
}

impl<'a> SimulationView<'a> {
    pub fn new(
        topology: &'a dyn MoleculeTopology,
        locations: &'a dyn MoleculeLocations,
        coordinates: &'a dyn CoordinateSource,
        geometry: &'a dyn BoxGeometry,
    ) -> Self {
        Self {
            topology,
            locations,
            coordinates,
            geometry,
        }
    }

    pub fn lattice(&self, box_index: BoxIndex, step: u64) -> Result<&'a Lattice, OutputError> {
        self.geometry
            .lattice(box_index)
            .ok_or(OutputError::MissingLattice { box_index, step })
    }

    /// Residents of a box, cross-checked against the engine's cached count.
    pub fn residents(&self, box_index: BoxIndex, step: u64) -> Result<BoxResidents, OutputError> {
        let residents = select_residents(self.topology, self.locations, box_index);
        residents
            .verify_cached(self.locations)
            .map_err(|source| OutputError::Residents {
                box_index,
                step,
                source,
            })?;
        Ok(residents)
    }
}
