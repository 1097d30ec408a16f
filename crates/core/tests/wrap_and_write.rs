//! Wrap a box population through the public API and write it to disk.

use rmc_core::lattice::Lattice;
use rmc_core::residents::select_residents;
use rmc_core::system::{
    CoordinateSource, Coordinates, MoleculeKind, MoleculeLookup, MoleculeTable, MoleculeTopology,
};
use rmc_core::trajectory::dcd::{DcdCodec, DcdReader};
use rmc_core::trajectory::restart::{read_restart, RestartFile};
use rmc_core::trajectory::{FrameSink, TrajectoryCodec};
use rmc_core::util::center_of_mass;
use rmc_core::wrapping::wrap_residents;

/// Ten propane-like chains drifting across a triclinic cell.
fn chains() -> (MoleculeTable, Coordinates) {
    let mut table = MoleculeTable::new();
    let propane = table.add_kind(MoleculeKind::new("PRO", vec![15.035, 14.027, 15.035]));
    let mut positions = Vec::new();
    for i in 0..10 {
        table.push_molecule(propane);
        let start = [i as f64 * 9.7 - 30.0, 55.0 - i as f64 * 13.1, i as f64 * 4.4 - 12.0];
        for k in 0..3 {
            positions.push([start[0] + 1.54 * k as f64, start[1], start[2] + 0.5 * k as f64]);
        }
    }
    let coords = Coordinates::new(positions, &table);
    (table, coords)
}

#[test]
fn wrapped_population_survives_dcd_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (table, coords) = chains();
    let mut lookup = MoleculeLookup::new(&table, 2);
    for mol in 0..10 {
        lookup.insert(mol, if mol % 3 == 0 { 1 } else { 0 }).unwrap();
    }
    let lattice = Lattice::from_lengths_angles([24.0, 26.0, 28.0], [85.0, 95.0, 105.0]).unwrap();

    let residents = select_residents(&table, &lookup, 0);
    assert_eq!(residents.molecules(), &[1, 2, 4, 5, 7, 8]);
    let mut wrapped = Vec::new();
    wrap_residents(&lattice, &residents, &table, &coords, &mut wrapped);
    assert_eq!(wrapped.len(), 18);

    for (i, &mol) in residents.molecules().iter().enumerate() {
        let chain = &wrapped[3 * i..3 * i + 3];
        let com = center_of_mass(chain, &[15.035, 14.027, 15.035]);
        let frac = lattice.to_fractional(&com);
        assert!(frac.iter().all(|s| *s >= -1e-12 && *s < 1.0), "molecule {}: {:?}", mol, frac);

        let original = coords.positions(table.atom_range(mol));
        for k in 1..3 {
            for axis in 0..3 {
                let before = original[k][axis] - original[0][axis];
                let after = chain[k][axis] - chain[0][axis];
                assert!((before - after).abs() < 1e-9);
            }
        }
    }

    // full-system frame: residents at their wrapped positions, the rest at the origin
    let n_atoms = table.total_atoms();
    let (mut x, mut y, mut z) = (vec![0.0f32; n_atoms], vec![0.0f32; n_atoms], vec![0.0f32; n_atoms]);
    for (atom, p) in residents.atoms(&table).zip(&wrapped) {
        x[atom] = p[0] as f32;
        y[atom] = p[1] as f32;
        z[atom] = p[2] as f32;
    }
    let dcd_path = dir.path().join("chains.dcd");
    let mut sink = DcdCodec { timestep: 0.5 }.open(&dcd_path, n_atoms).unwrap();
    sink.write_frame(1000, &x, &y, &z, &lattice.unit_cell()).unwrap();
    sink.close().unwrap();

    let mut reader = DcdReader::open(&dcd_path).unwrap();
    assert_eq!(reader.header().timestep, 0.5);
    let frame = reader.read_frame().unwrap().unwrap();
    let cell = frame.unit_cell.unwrap();
    for (got, want) in cell.iter().zip([24.0, 26.0, 28.0, 85.0, 95.0, 105.0]) {
        assert!((got - want).abs() < 1e-9);
    }
    assert_eq!(frame.positions[0], [0.0, 0.0, 0.0]);
    assert!((frame.positions[3][0] - wrapped[0][0]).abs() < 1e-4);

    let restart_path = dir.path().join("chains_restart.coor");
    let mut restart = RestartFile::create(&restart_path).unwrap();
    restart.write(&wrapped).unwrap();
    restart.close().unwrap();

    let restored = read_restart(&restart_path)
        .unwrap()
        .scatter(&residents, &table)
        .unwrap();
    assert_eq!(restored.len(), 18);
    assert_eq!(restored[0].0, 3);
    for ((_, got), want) in restored.iter().zip(&wrapped) {
        for axis in 0..3 {
            assert!((got[axis] - want[axis]).abs() < 1e-4);
        }
    }
}
