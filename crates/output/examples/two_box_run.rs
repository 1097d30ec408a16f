//! Two-box Gibbs-ensemble style output run.
//!
//! Drives the output manager with a toy move loop: argon atoms drift and
//! hop between a liquid box and a vapor box, while the liquid box is
//! periodically rescaled. Writes one DCD per box plus a restart file for
//! the liquid box, then reads both back.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --example two_box_run -- [output_dir] [steps]
//! ```

use rmc_core::lattice::Lattice;
use rmc_core::residents::select_residents;
use rmc_core::system::{
    BoxDimensions, Coordinates, MoleculeKind, MoleculeLocations, MoleculeLookup, MoleculeTable,
};
use rmc_core::trajectory::dcd::{DcdCodec, DcdReader};
use rmc_core::trajectory::restart::read_restart;
use rmc_output::{OutputConfig, OutputManager, SimulationView};
use std::path::PathBuf;

const CONFIG: &str = r#"
unique_name = "argon_gemc"

[[boxes]]
state = { enable = true, frequency = 100 }
restart = { enable = true, frequency = 500 }

[[boxes]]
state = { enable = true, frequency = 250 }
state_file = "argon_vapor.dcd"
"#;

const N_ATOMS: usize = 64;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let out_dir = args.get(1).map(PathBuf::from).unwrap_or_else(std::env::temp_dir);
    let steps: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2000);

    if let Err(e) = run(out_dir, steps) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(out_dir: PathBuf, steps: u64) -> Result<(), Box<dyn std::error::Error>> {
    // -------------------------------------------------------------------------
    // 1. Build the system
    // -------------------------------------------------------------------------
    let mut table = MoleculeTable::new();
    let argon = table.add_kind(MoleculeKind::new("AR", vec![39.948]));
    let positions: Vec<[f64; 3]> = (0..N_ATOMS)
        .map(|i| {
            [
                (i % 4) as f64 * 4.0 + 1.0,
                ((i / 4) % 4) as f64 * 4.0 + 1.0,
                (i / 16) as f64 * 4.0 + 1.0,
            ]
        })
        .collect();
    for _ in 0..N_ATOMS {
        table.push_molecule(argon);
    }
    let mut coords = Coordinates::new(positions, &table);

    let mut lookup = MoleculeLookup::new(&table, 2);
    for mol in 0..N_ATOMS {
        lookup.insert(mol, if mol < 48 { 0 } else { 1 })?;
    }

    let mut dims = BoxDimensions::new(2);
    let mut liquid_edge = 16.0;
    dims.set_lattice(0, Lattice::orthogonal([liquid_edge; 3])?);
    dims.set_lattice(1, Lattice::from_lengths_angles([40.0, 40.0, 40.0], [90.0, 90.0, 60.0])?);

    // -------------------------------------------------------------------------
    // 2. Open outputs
    // -------------------------------------------------------------------------
    let mut config = OutputConfig::from_toml_str(CONFIG)?;
    config.replica_dir = Some(out_dir.clone());
    let dcd_path = config.state_path(0);
    let restart_path = config.restart_path(0);

    let view = SimulationView::new(&table, &lookup, &coords, &dims);
    let mut manager = OutputManager::new(config, &DcdCodec::default(), &view)?;

    // -------------------------------------------------------------------------
    // 3. Move loop
    // -------------------------------------------------------------------------
    let mut rng: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        rng ^= rng << 13;
        rng ^= rng >> 7;
        rng ^= rng << 17;
        rng
    };

    for step in 1..=steps {
        let r = next();
        let mol = (r % N_ATOMS as u64) as usize;
        match (r >> 32) % 10 {
            // swap between boxes, keeping at least one atom in each
            0 => {
                if let Some(from) = lookup.box_of(mol) {
                    if lookup.cached_atom_count(from) > Some(1) {
                        lookup.transfer(mol, 1 - from)?;
                    }
                }
            }
            // volume move on the liquid box
            1 => {
                liquid_edge = (liquid_edge + ((r >> 40) % 3) as f64 - 1.0).clamp(12.0, 24.0);
                dims.set_lattice(0, Lattice::orthogonal([liquid_edge; 3])?);
            }
            // displacement
            _ => {
                let delta = ((r >> 20) % 1000) as f64 / 500.0 - 1.0;
                let axis = ((r >> 50) % 3) as usize;
                coords.positions_mut()[mol][axis] += delta;
            }
        }
        coords.refresh_centers(&table);

        let view = SimulationView::new(&table, &lookup, &coords, &dims);
        manager.do_output(step, &view)?;
    }
    manager.close()?;

    // -------------------------------------------------------------------------
    // 4. Read back
    // -------------------------------------------------------------------------
    let mut reader = DcdReader::open(&dcd_path)?;
    println!(
        "{}: {} frames of {} atoms, steps {}..{} every {}",
        dcd_path.display(),
        reader.n_frames(),
        reader.n_atoms(),
        reader.header().start_timestep,
        reader.header().last_timestep,
        reader.header().timestep_interval
    );
    if let Some(frame) = reader.read_all_frames()?.last() {
        if let Some(cell) = frame.unit_cell {
            println!("Last liquid cell: {:.1} x {:.1} x {:.1}", cell[0], cell[1], cell[2]);
        }
    }

    let residents = select_residents(&table, &lookup, 0);
    match read_restart(&restart_path) {
        Ok(restart) => println!(
            "{}: {} atoms (liquid box now holds {})",
            restart_path.display(),
            restart.n_atoms(),
            residents.atom_count()
        ),
        Err(e) => println!("No restart coordinates yet: {}", e),
    }
    Ok(())
}
