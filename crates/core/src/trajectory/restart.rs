//! Binary restart coordinates.
//!
//! A restart file is a single frame in a flat little-endian layout:
//!
//! ```text
//! i32 count
//! f32 x[count]
//! f32 y[count]
//! f32 z[count]
//! ```
//!
//! It is rewritten in place on every restart event, so it always holds the
//! most recent coordinates of one box and nothing else.

use super::TrajectoryError;
use crate::residents::BoxResidents;
use crate::system::MoleculeTopology;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Encode positions into the restart layout.
pub fn encode_restart(positions: &[[f64; 3]]) -> Result<Vec<u8>, TrajectoryError> {
    let count = i32::try_from(positions.len()).map_err(|_| {
        TrajectoryError::InvalidRestart(format!(
            "{} atoms do not fit the restart count field",
            positions.len()
        ))
    })?;

    let mut bytes = Vec::with_capacity(4 + positions.len() * 12);
    bytes.extend_from_slice(&count.to_le_bytes());
    for axis in 0..3 {
        for p in positions {
            bytes.extend_from_slice(&(p[axis] as f32).to_le_bytes());
        }
    }
    Ok(bytes)
}

/// Decode a restart buffer. The count must be non-negative and the payload
/// must hold exactly `3 * count` floats.
pub fn decode_restart(bytes: &[u8]) -> Result<RestartFrame, TrajectoryError> {
    let head: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            TrajectoryError::InvalidRestart(format!(
                "{} bytes is too short for the atom count",
                bytes.len()
            ))
        })?;
    let count = i32::from_le_bytes(head);
    if count < 0 {
        return Err(TrajectoryError::InvalidRestart(format!(
            "negative atom count {}",
            count
        )));
    }
    let n = count as usize;
    let payload = &bytes[4..];
    if payload.len() != n * 12 {
        return Err(TrajectoryError::InvalidRestart(format!(
            "{} atoms need {} payload bytes, found {}",
            n,
            n * 12,
            payload.len()
        )));
    }

    let floats: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(RestartFrame {
        x: floats[..n].to_vec(),
        y: floats[n..2 * n].to_vec(),
        z: floats[2 * n..].to_vec(),
    })
}

/// Read a restart file from disk.
pub fn read_restart<P: AsRef<Path>>(path: P) -> Result<RestartFrame, TrajectoryError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| TrajectoryError::open(path, e))?;
    decode_restart(&bytes)
}

/// Coordinates recovered from a restart file.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartFrame {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl RestartFrame {
    pub fn n_atoms(&self) -> usize {
        self.x.len()
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        (0..self.n_atoms())
            .map(|i| [self.x[i] as f64, self.y[i] as f64, self.z[i] as f64])
            .collect()
    }

    /// Pair every stored position with the atom index it belongs to.
    ///
    /// Restart files are written in resident order, so the same box
    /// population maps them back one to one. A different population is
    /// reported as [`TrajectoryError::AtomCountMismatch`].
    pub fn scatter<T>(
        &self,
        residents: &BoxResidents,
        topology: &T,
    ) -> Result<Vec<(usize, [f64; 3])>, TrajectoryError>
    where
        T: MoleculeTopology + ?Sized,
    {
        if residents.atom_count() != self.n_atoms() {
            return Err(TrajectoryError::AtomCountMismatch {
                expected: residents.atom_count(),
                found: self.n_atoms(),
            });
        }
        Ok(residents
            .atoms(topology)
            .zip(self.positions())
            .collect())
    }
}

/// Restart file for one box, truncated and rewritten on every write.
pub struct RestartFile {
    writer: BufWriter<File>,
    path: PathBuf,
    frames_written: usize,
}

impl RestartFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TrajectoryError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| TrajectoryError::open(path, e))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file has been rewritten.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Replace the file's contents with `positions`.
    pub fn write(&mut self, positions: &[[f64; 3]]) -> Result<(), TrajectoryError> {
        let bytes = encode_restart(positions)?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.get_ref().set_len(0)?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn close(mut self) -> Result<(), TrajectoryError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residents::select_residents;
    use crate::system::{MoleculeKind, MoleculeLookup, MoleculeTable};

    fn synthetic(n: usize) -> Vec<[f64; 3]> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                [t * 0.25, -t * 0.5 + 3.0, (t * 0.125) % 17.0]
            })
            .collect()
    }

    #[test]
    fn test_layout() {
        let bytes = encode_restart(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(bytes.len(), 4 + 2 * 12);
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
        let floats: Vec<f32> = bytes[4..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_roundtrip_from_empty_to_large() {
        for n in [0, 1, 7, 1000, 250_000] {
            let positions = synthetic(n);
            let frame = decode_restart(&encode_restart(&positions).unwrap()).unwrap();
            assert_eq!(frame.n_atoms(), n);
            for (a, b) in positions.iter().zip(frame.positions()) {
                for k in 0..3 {
                    assert_eq!(a[k] as f32 as f64, b[k]);
                }
            }
        }
    }

    #[test]
    fn test_rejects_malformed_buffers() {
        assert!(matches!(
            decode_restart(&[1, 0]),
            Err(TrajectoryError::InvalidRestart(_))
        ));
        assert!(matches!(
            decode_restart(&(-3i32).to_le_bytes()),
            Err(TrajectoryError::InvalidRestart(_))
        ));

        let mut bytes = encode_restart(&synthetic(3)).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_restart(&bytes),
            Err(TrajectoryError::InvalidRestart(_))
        ));
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(
            decode_restart(&bytes),
            Err(TrajectoryError::InvalidRestart(_))
        ));
    }

    #[test]
    fn test_file_keeps_only_latest_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box1_restart.coor");
        let mut file = RestartFile::create(&path).unwrap();

        file.write(&synthetic(100)).unwrap();
        file.write(&synthetic(3)).unwrap();
        assert_eq!(file.frames_written(), 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 + 3 * 12);

        let frame = read_restart(&path).unwrap();
        assert_eq!(frame.n_atoms(), 3);
        assert_eq!(frame.positions(), synthetic(3));

        file.write(&[]).unwrap();
        file.close().unwrap();
        assert_eq!(read_restart(&path).unwrap().n_atoms(), 0);
    }

    #[test]
    fn test_scatter_restores_atom_indices() {
        let mut table = MoleculeTable::new();
        let water = table.add_kind(MoleculeKind::new("TIP3", vec![15.999, 1.008, 1.008]));
        let argon = table.add_kind(MoleculeKind::new("AR", vec![39.948]));
        for kind in [water, argon, water, argon] {
            table.push_molecule(kind);
        }
        let mut lookup = MoleculeLookup::new(&table, 2);
        lookup.insert(0, 1).unwrap();
        lookup.insert(1, 0).unwrap();
        lookup.insert(2, 1).unwrap();
        lookup.insert(3, 1).unwrap();

        let residents = select_residents(&table, &lookup, 1);
        let positions = synthetic(residents.atom_count());
        let frame = decode_restart(&encode_restart(&positions).unwrap()).unwrap();

        let restored = frame.scatter(&residents, &table).unwrap();
        let indices: Vec<usize> = restored.iter().map(|(i, _)| *i).collect();
        // molecule 0 -> 0..3, molecule 2 -> 4..7, molecule 3 -> 7
        assert_eq!(indices, vec![0, 1, 2, 4, 5, 6, 7]);
        assert_eq!(restored[3].1, positions[3]);

        lookup.transfer(3, 0).unwrap();
        let shrunk = select_residents(&table, &lookup, 1);
        assert!(matches!(
            frame.scatter(&shrunk, &table),
            Err(TrajectoryError::AtomCountMismatch {
                expected: 6,
                found: 7
            })
        ));
    }
}
