//! Whole-molecule periodic wrapping.
//!
//! A molecule is moved as a rigid unit: one lattice translation is chosen
//! from its center of mass and applied to every atom, so bonded geometry is
//! never torn across a boundary the way per-atom wrapping would tear it.

use crate::lattice::Lattice;
use crate::residents::BoxResidents;
use crate::system::{CoordinateSource, MoleculeTopology};
use crate::util::add;

/// Translation that brings `com` into the primary cell `[0, 1)` in
/// fractional coordinates.
///
/// Orthogonal cells are handled axis by axis, which keeps the arithmetic
/// exact whenever the inputs are representable. Triclinic cells go through
/// fractional space: the integer cell offset is `floor(s)` for each
/// fractional component `s`, mapped back to Cartesian space.
///
/// A center a hair below zero can round onto the upper face once shifted
/// (`-1e-15 + 20.0 == 20.0`). Such an axis takes one cell fewer, leaving the
/// center within rounding of the lower face instead.
pub fn wrap_translation(lattice: &Lattice, com: &[f64; 3]) -> [f64; 3] {
    if lattice.is_orthogonal() {
        let lengths = lattice.lengths();
        let mut shift = [0.0; 3];
        for k in 0..3 {
            let cells = (com[k] / lengths[k]).floor();
            if cells != 0.0 {
                shift[k] = -cells * lengths[k];
            }
            if com[k] + shift[k] >= lengths[k] {
                shift[k] -= lengths[k];
            }
        }
        return shift;
    }

    let frac = lattice.to_fractional(com);
    let mut offset = frac.map(|s| {
        let cells = s.floor();
        if cells != 0.0 {
            -cells
        } else {
            0.0
        }
    });
    if offset == [0.0; 3] {
        return offset;
    }
    let landed = lattice.to_fractional(&add(com, &lattice.to_cartesian(&offset)));
    for k in 0..3 {
        if landed[k] >= 1.0 {
            offset[k] -= 1.0;
        }
    }
    lattice.to_cartesian(&offset)
}

/// Wrap one molecule, writing translated atom positions into `out`.
///
/// `out` must have the same length as `atoms`.
pub fn wrap_molecule_into(
    lattice: &Lattice,
    com: &[f64; 3],
    atoms: &[[f64; 3]],
    out: &mut [[f64; 3]],
) {
    assert_eq!(
        atoms.len(),
        out.len(),
        "output slice must match the molecule's atom count"
    );
    let shift = wrap_translation(lattice, com);
    for (dst, src) in out.iter_mut().zip(atoms) {
        *dst = add(src, &shift);
    }
}

/// Wrap one molecule into a freshly allocated vector.
pub fn wrap_molecule(lattice: &Lattice, com: &[f64; 3], atoms: &[[f64; 3]]) -> Vec<[f64; 3]> {
    let shift = wrap_translation(lattice, com);
    atoms.iter().map(|p| add(p, &shift)).collect()
}

/// Wrap every resident molecule of a box into `out`, in resident order.
///
/// `out` is resized to `residents.atom_count()` first, so its allocation is
/// reused across calls and only grows or shrinks when the population does.
pub fn wrap_residents<T, C>(
    lattice: &Lattice,
    residents: &BoxResidents,
    topology: &T,
    coords: &C,
    out: &mut Vec<[f64; 3]>,
) where
    T: MoleculeTopology + ?Sized,
    C: CoordinateSource + ?Sized,
{
    out.resize(residents.atom_count(), [0.0; 3]);

    let mut offset = 0;
    for &mol in residents.molecules() {
        let range = topology.atom_range(mol);
        let n = range.len();
        let atoms = coords.positions(range);
        let com = coords.center_of_mass(mol);
        wrap_molecule_into(lattice, &com, atoms, &mut out[offset..offset + n]);
        offset += n;
    }
    debug_assert_eq!(offset, out.len());
}
