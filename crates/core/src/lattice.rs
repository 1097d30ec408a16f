//! Periodic cell geometry.
//!
//! A [`Lattice`] holds the three cell vectors of a simulation box as the
//! columns of a basis matrix `H`, together with `H⁻¹` so Cartesian and
//! fractional coordinates can be converted cheaply. It also produces the
//! six-value unit-cell record stored in every DCD frame.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

/// Cosines smaller than this are snapped to exactly zero, so a 90° angle
/// given in degrees yields an exactly orthogonal basis.
const RIGHT_ANGLE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatticeError {
    #[error("cell length {axis} must be positive and finite, got {value}")]
    InvalidLength { axis: usize, value: f64 },

    #[error("cell angle {axis} must lie strictly between 0 and 180 degrees, got {value}")]
    InvalidAngle { axis: usize, value: f64 },

    #[error("cell vectors are degenerate (volume {volume})")]
    Degenerate { volume: f64 },
}

/// Geometry of one periodic box.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    lengths: [f64; 3],
    /// cos α (b·c), cos β (a·c), cos γ (a·b)
    cos_angles: [f64; 3],
    basis: Matrix3<f64>,
    inverse: Matrix3<f64>,
    orthogonal: bool,
}

impl Lattice {
    /// Rectangular box with the given axis lengths.
    pub fn orthogonal(lengths: [f64; 3]) -> Result<Self, LatticeError> {
        Self::from_lengths_angles(lengths, [90.0, 90.0, 90.0])
    }

    /// Build a cell from axis lengths and the angles `[α, β, γ]` in degrees.
    ///
    /// The first vector lies along x and the second in the xy plane, which is
    /// the orientation DCD readers assume when they rebuild the cell.
    pub fn from_lengths_angles(lengths: [f64; 3], angles: [f64; 3]) -> Result<Self, LatticeError> {
        check_lengths(&lengths)?;
        for (axis, &value) in angles.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 || value >= 180.0 {
                return Err(LatticeError::InvalidAngle { axis, value });
            }
        }

        let cos_angles = angles.map(|deg| snap_cosine(deg.to_radians().cos()));
        let [cos_a, cos_b, cos_g] = cos_angles;
        let sin_g = if cos_g == 0.0 {
            1.0
        } else {
            (1.0 - cos_g * cos_g).sqrt()
        };

        let [a, b, c] = lengths;
        let cy = (cos_a - cos_b * cos_g) / sin_g;
        let cz_sq = 1.0 - cos_b * cos_b - cy * cy;
        if cz_sq <= 0.0 {
            return Err(LatticeError::Degenerate { volume: 0.0 });
        }

        let basis = Matrix3::from_columns(&[
            Vector3::new(a, 0.0, 0.0),
            Vector3::new(b * cos_g, b * sin_g, 0.0),
            Vector3::new(c * cos_b, c * cy, c * cz_sq.sqrt()),
        ]);
        Self::with_basis(lengths, cos_angles, basis)
    }

    /// Build a cell from its three vectors, used as given (no reorientation).
    pub fn from_cell_basis(vectors: [[f64; 3]; 3]) -> Result<Self, LatticeError> {
        let cols = vectors.map(|v| Vector3::new(v[0], v[1], v[2]));
        let lengths = [cols[0].norm(), cols[1].norm(), cols[2].norm()];
        check_lengths(&lengths)?;

        let cosine = |i: usize, j: usize| snap_cosine(cols[i].dot(&cols[j]) / (lengths[i] * lengths[j]));
        let cos_angles = [cosine(1, 2), cosine(0, 2), cosine(0, 1)];

        Self::with_basis(lengths, cos_angles, Matrix3::from_columns(&cols))
    }

    fn with_basis(
        lengths: [f64; 3],
        cos_angles: [f64; 3],
        basis: Matrix3<f64>,
    ) -> Result<Self, LatticeError> {
        let volume = basis.determinant();
        if !volume.is_finite() || volume.abs() < f64::EPSILON * lengths.iter().product::<f64>() {
            return Err(LatticeError::Degenerate { volume });
        }
        let inverse = basis
            .try_inverse()
            .ok_or(LatticeError::Degenerate { volume })?;

        let orthogonal = (0..3).all(|i| (0..3).all(|j| i == j || basis[(i, j)] == 0.0));

        Ok(Self {
            lengths,
            cos_angles,
            basis,
            inverse,
            orthogonal,
        })
    }

    /// Axis lengths `[a, b, c]`.
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    /// Angles `[α, β, γ]` in degrees.
    pub fn angles(&self) -> [f64; 3] {
        self.cos_angles.map(|c| c.acos().to_degrees())
    }

    /// True when the cell vectors are aligned with the Cartesian axes.
    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    pub fn volume(&self) -> f64 {
        self.basis.determinant().abs()
    }

    /// Cell vectors as rows `[a, b, c]`.
    pub fn cell_vectors(&self) -> [[f64; 3]; 3] {
        let col = |j: usize| [self.basis[(0, j)], self.basis[(1, j)], self.basis[(2, j)]];
        [col(0), col(1), col(2)]
    }

    pub fn to_fractional(&self, point: &[f64; 3]) -> [f64; 3] {
        let s = self.inverse * Vector3::new(point[0], point[1], point[2]);
        [s.x, s.y, s.z]
    }

    pub fn to_cartesian(&self, fractional: &[f64; 3]) -> [f64; 3] {
        let r = self.basis * Vector3::new(fractional[0], fractional[1], fractional[2]);
        [r.x, r.y, r.z]
    }

    /// The unit-cell record written with each DCD frame:
    /// `[a, cos γ, b, cos β, cos α, c]`.
    ///
    /// The interleaved order is fixed by the DCD format. Angles are stored
    /// as cosines (the NAMD convention), which VMD and MDAnalysis detect by
    /// their magnitude; an orthogonal box therefore writes zeros.
    pub fn unit_cell(&self) -> [f64; 6] {
        let [a, b, c] = self.lengths;
        let [cos_a, cos_b, cos_g] = self.cos_angles;
        [a, cos_g, b, cos_b, cos_a, c]
    }
}

fn check_lengths(lengths: &[f64; 3]) -> Result<(), LatticeError> {
    for (axis, &value) in lengths.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(LatticeError::InvalidLength { axis, value });
        }
    }
    Ok(())
}

#[inline]
fn snap_cosine(c: f64) -> f64 {
    if c.abs() < RIGHT_ANGLE_TOLERANCE {
        0.0
    } else {
        c
    }
}
