//! DCD trajectory files.
//!
//! Reads and writes the CHARMM/NAMD binary trajectory format understood by
//! VMD, MDAnalysis and CPPTRAJ. Every frame carries a unit-cell record
//! followed by separate X, Y and Z single-precision blocks, each wrapped in
//! Fortran record markers. Coordinates are kept in Angstrom.
//!
//! Header layout written by [`DcdWriter`] (little-endian):
//!
//! | offset | content |
//! |---|---|
//! | 0 | `84`, `"CORD"` |
//! | 8 | NSET (frames), ISTART, NSAVC, NSTEP |
//! | 24 | five zero words |
//! | 44 | DELTA (`f32`), unit-cell flag |
//! | 52 | eight zero words, CHARMM version `24`, `84` |
//! | 92 | title block (`164`, 2 × 80-byte lines, `164`) |
//! | 264 | atom block (`4`, N, `4`) |
//!
//! NSET, ISTART, NSAVC and NSTEP are rewritten after every frame, so a file
//! cut short by a crashed run still reports the frames it actually holds.

use super::{FrameSink, TrajectoryCodec, TrajectoryError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_BLOCK_SIZE: i32 = 84;
const TITLE_LINE_LEN: usize = 80;
const CHARMM_VERSION: i32 = 24;
/// Byte offset of NSET in the first header block.
const NSET_OFFSET: u64 = 8;
const UNIT_CELL_BLOCK_SIZE: i32 = 48;
/// Larger atom counts are treated as a corrupt header.
const MAX_ATOMS: usize = 100_000_000;

// ============================================================================
// Data Structures
// ============================================================================

/// DCD file header information.
#[derive(Debug, Clone)]
pub struct DcdHeader {
    /// Number of frames in trajectory
    pub n_frames: usize,
    /// Number of atoms
    pub n_atoms: usize,
    /// Step of the first frame
    pub start_timestep: i32,
    /// Steps between frames
    pub timestep_interval: i32,
    /// Step of the last frame
    pub last_timestep: i32,
    /// Integration timestep as stored in the header
    pub timestep: f32,
    /// Whether unit cell information is present
    pub has_unit_cell: bool,
    /// Whether this is a CHARMM format DCD
    pub is_charmm: bool,
    /// Whether the file is big-endian
    pub is_big_endian: bool,
    /// Title strings from header
    pub titles: Vec<String>,
    /// File byte offset where frame data begins
    pub first_frame_offset: u64,
    /// Size in bytes of each frame (for seeking)
    pub frame_size: usize,
}

/// One frame as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DcdFrame {
    /// Atom positions in Angstrom.
    pub positions: Vec<[f64; 3]>,
    /// `[a, b, c, α, β, γ]`, lengths in Angstrom and angles in degrees.
    pub unit_cell: Option<[f64; 6]>,
}

/// DCD trajectory reader with streaming capability.
pub struct DcdReader {
    reader: BufReader<File>,
    header: DcdHeader,
    current_frame: usize,
}

impl DcdReader {
    /// Open a DCD file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrajectoryError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TrajectoryError::open(path, e))?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader)?;

        Ok(Self {
            reader,
            header,
            current_frame: 0,
        })
    }

    pub fn header(&self) -> &DcdHeader {
        &self.header
    }

    pub fn n_frames(&self) -> usize {
        self.header.n_frames
    }

    pub fn n_atoms(&self) -> usize {
        self.header.n_atoms
    }

    /// Read the next frame. Returns None if at end of trajectory.
    pub fn read_frame(&mut self) -> Result<Option<DcdFrame>, TrajectoryError> {
        if self.current_frame >= self.header.n_frames {
            return Ok(None);
        }

        let frame = read_frame_internal(&mut self.reader, &self.header)?;
        self.current_frame += 1;
        Ok(Some(frame))
    }

    /// Seek to a specific frame.
    pub fn seek_frame(&mut self, frame: usize) -> Result<(), TrajectoryError> {
        if frame >= self.header.n_frames {
            return Err(TrajectoryError::FrameOutOfRange {
                frame,
                n_frames: self.header.n_frames,
            });
        }

        let offset =
            self.header.first_frame_offset + (frame as u64) * (self.header.frame_size as u64);
        self.reader.seek(SeekFrom::Start(offset))?;
        self.current_frame = frame;
        Ok(())
    }

    /// Read all frames into memory.
    pub fn read_all_frames(&mut self) -> Result<Vec<DcdFrame>, TrajectoryError> {
        let mut frames = Vec::with_capacity(self.header.n_frames);
        if self.header.n_frames == 0 {
            return Ok(frames);
        }
        self.seek_frame(0)?;
        while let Some(frame) = self.read_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Streaming DCD writer for a fixed atom count.
///
/// ISTART is taken from the first frame written and NSAVC from the gap
/// between the first two, so callers only pass the step of each frame.
/// Those header words are `i32`; steps past `i32::MAX` saturate there while
/// the frames themselves are still written.
pub struct DcdWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    n_atoms: usize,
    n_frames: i32,
    first_step: i32,
    interval: i32,
    step_overflow_warned: bool,
}

impl DcdWriter {
    /// Create (truncating) a DCD file and write its header.
    pub fn create<P: AsRef<Path>>(
        path: P,
        n_atoms: usize,
        timestep: f32,
    ) -> Result<Self, TrajectoryError> {
        let path = path.as_ref();
        if n_atoms > MAX_ATOMS {
            return Err(TrajectoryError::InvalidDcd(format!(
                "atom count {} exceeds maximum supported ({})",
                n_atoms, MAX_ATOMS
            )));
        }
        let file = File::create(path).map_err(|e| TrajectoryError::open(path, e))?;

        let mut dcd = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            n_atoms,
            n_frames: 0,
            first_step: 0,
            interval: 1,
            step_overflow_warned: false,
        };
        dcd.write_header(timestep)?;
        Ok(dcd)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames as usize
    }

    fn write_header(&mut self, timestep: f32) -> Result<(), TrajectoryError> {
        let w = &mut self.writer;

        write_i32(w, HEADER_BLOCK_SIZE)?;
        w.write_all(b"CORD")?;
        write_i32(w, 0)?; // NSET
        write_i32(w, 0)?; // ISTART
        write_i32(w, 1)?; // NSAVC
        write_i32(w, 0)?; // NSTEP
        for _ in 0..5 {
            write_i32(w, 0)?;
        }
        w.write_all(&timestep.to_le_bytes())?;
        write_i32(w, 1)?; // unit cell present
        for _ in 0..8 {
            write_i32(w, 0)?;
        }
        write_i32(w, CHARMM_VERSION)?;
        write_i32(w, HEADER_BLOCK_SIZE)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let titles = [
            format!("REMARKS FILENAME={} CREATED BY RMC-OUTPUT", file_name),
            "REMARKS MONTE CARLO BOX TRAJECTORY".to_string(),
        ];
        let title_block = (4 + TITLE_LINE_LEN * titles.len()) as i32;
        write_i32(w, title_block)?;
        write_i32(w, titles.len() as i32)?;
        for title in &titles {
            w.write_all(&title_line(title))?;
        }
        write_i32(w, title_block)?;

        write_i32(w, 4)?;
        write_i32(w, self.n_atoms as i32)?;
        write_i32(w, 4)?;
        Ok(())
    }

    fn write_coordinate_block(&mut self, values: &[f32]) -> Result<(), TrajectoryError> {
        let block = (values.len() * 4) as i32;
        write_i32(&mut self.writer, block)?;
        for v in values {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        write_i32(&mut self.writer, block)?;
        Ok(())
    }

    /// Rewrite NSET/ISTART/NSAVC/NSTEP after a frame at `step`.
    fn update_header(&mut self, step: i32) -> Result<(), TrajectoryError> {
        match self.n_frames {
            1 => self.first_step = step,
            2 => self.interval = step.saturating_sub(self.first_step),
            _ => {}
        }
        self.writer.seek(SeekFrom::Start(NSET_OFFSET))?;
        for word in [self.n_frames, self.first_step, self.interval, step] {
            write_i32(&mut self.writer, word)?;
        }
        self.writer.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

impl FrameSink for DcdWriter {
    fn write_frame(
        &mut self,
        step: u64,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        unit_cell: &[f64; 6],
    ) -> Result<(), TrajectoryError> {
        for axis in [x, y, z] {
            if axis.len() != self.n_atoms {
                return Err(TrajectoryError::AtomCountMismatch {
                    expected: self.n_atoms,
                    found: axis.len(),
                });
            }
        }

        write_i32(&mut self.writer, UNIT_CELL_BLOCK_SIZE)?;
        for v in unit_cell {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        write_i32(&mut self.writer, UNIT_CELL_BLOCK_SIZE)?;

        self.write_coordinate_block(x)?;
        self.write_coordinate_block(y)?;
        self.write_coordinate_block(z)?;

        self.n_frames += 1;
        let header_step = i32::try_from(step).unwrap_or_else(|_| {
            if !self.step_overflow_warned {
                log::warn!(
                    "{}: step {} exceeds the DCD header range, recording {} from here on",
                    self.path.display(),
                    step,
                    i32::MAX
                );
                self.step_overflow_warned = true;
            }
            i32::MAX
        });
        self.update_header(header_step)?;
        log::trace!("{}: frame {} at step {}", self.path.display(), self.n_frames, step);
        Ok(())
    }

    fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn close(mut self) -> Result<(), TrajectoryError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// [`TrajectoryCodec`] producing [`DcdWriter`] streams.
#[derive(Debug, Clone, Copy)]
pub struct DcdCodec {
    /// Stored in the header's DELTA field. Monte Carlo runs conventionally
    /// use 1.0, one move per step.
    pub timestep: f32,
}

impl Default for DcdCodec {
    fn default() -> Self {
        Self { timestep: 1.0 }
    }
}

impl TrajectoryCodec for DcdCodec {
    type Sink = DcdWriter;

    fn open(&self, path: &Path, n_atoms: usize) -> Result<DcdWriter, TrajectoryError> {
        DcdWriter::create(path, n_atoms, self.timestep)
    }
}

// ============================================================================
// Internal Implementation
// ============================================================================

fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<(), TrajectoryError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn title_line(text: &str) -> [u8; TITLE_LINE_LEN] {
    let mut line = [b' '; TITLE_LINE_LEN];
    let bytes = text.as_bytes();
    let n = bytes.len().min(TITLE_LINE_LEN);
    line[..n].copy_from_slice(&bytes[..n]);
    line
}

/// Byte order of a file being read.
#[derive(Debug, Clone, Copy)]
struct Endian {
    big: bool,
}

impl Endian {
    fn read_i32<R: Read>(self, reader: &mut R) -> Result<i32, TrajectoryError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(if self.big {
            i32::from_be_bytes(buf)
        } else {
            i32::from_le_bytes(buf)
        })
    }

    fn read_f32<R: Read>(self, reader: &mut R) -> Result<f32, TrajectoryError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(if self.big {
            f32::from_be_bytes(buf)
        } else {
            f32::from_le_bytes(buf)
        })
    }

    fn read_f64<R: Read>(self, reader: &mut R) -> Result<f64, TrajectoryError> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(if self.big {
            f64::from_be_bytes(buf)
        } else {
            f64::from_le_bytes(buf)
        })
    }

    /// Read a Fortran record marker and check it against the expected size.
    fn expect_marker<R: Read>(
        self,
        reader: &mut R,
        expected: i32,
        what: &str,
    ) -> Result<(), TrajectoryError> {
        let found = self.read_i32(reader)?;
        if found != expected {
            return Err(TrajectoryError::InvalidDcd(format!(
                "{} record marker is {}, expected {}",
                what, found, expected
            )));
        }
        Ok(())
    }
}

/// Detect endianness by checking the first block size (should be 84).
fn detect_endianness<R: Read + Seek>(reader: &mut R) -> Result<Endian, TrajectoryError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    reader.seek(SeekFrom::Current(-4))?;

    let le_val = i32::from_le_bytes(buf);
    let be_val = i32::from_be_bytes(buf);
    if le_val == HEADER_BLOCK_SIZE {
        Ok(Endian { big: false })
    } else if be_val == HEADER_BLOCK_SIZE {
        Ok(Endian { big: true })
    } else {
        Err(TrajectoryError::InvalidDcd(format!(
            "first block size is {} (LE) or {} (BE), expected 84",
            le_val, be_val
        )))
    }
}

fn read_header<R: Read + Seek>(reader: &mut R) -> Result<DcdHeader, TrajectoryError> {
    let endian = detect_endianness(reader)?;

    endian.expect_marker(reader, HEADER_BLOCK_SIZE, "header")?;
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != b"CORD" {
        return Err(TrajectoryError::InvalidDcd(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(&magic)
        )));
    }

    let n_frames = endian.read_i32(reader)?;
    if n_frames < 0 {
        return Err(TrajectoryError::InvalidDcd(format!(
            "negative frame count {}",
            n_frames
        )));
    }
    let start_timestep = endian.read_i32(reader)?;
    let timestep_interval = endian.read_i32(reader)?;
    let last_timestep = endian.read_i32(reader)?;
    for _ in 0..5 {
        endian.read_i32(reader)?;
    }
    let timestep = endian.read_f32(reader)?;
    let has_unit_cell = endian.read_i32(reader)? != 0;
    for _ in 0..8 {
        endian.read_i32(reader)?;
    }
    let is_charmm = endian.read_i32(reader)? != 0;
    endian.expect_marker(reader, HEADER_BLOCK_SIZE, "header end")?;

    // Title block
    let title_block = endian.read_i32(reader)?;
    if title_block < 4 {
        return Err(TrajectoryError::InvalidDcd(format!(
            "title block size {}",
            title_block
        )));
    }
    let n_titles = endian.read_i32(reader)?;
    if n_titles < 0 || 4 + n_titles as i64 * TITLE_LINE_LEN as i64 > title_block as i64 {
        return Err(TrajectoryError::InvalidDcd(format!(
            "{} titles do not fit a {}-byte title block",
            n_titles, title_block
        )));
    }
    let mut titles = Vec::with_capacity(n_titles as usize);
    for _ in 0..n_titles {
        let mut line = [0u8; TITLE_LINE_LEN];
        reader.read_exact(&mut line)?;
        titles.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    let remaining = title_block as i64 - 4 - n_titles as i64 * TITLE_LINE_LEN as i64;
    if remaining > 0 {
        reader.seek(SeekFrom::Current(remaining))?;
    }
    endian.expect_marker(reader, title_block, "title end")?;

    // Atom count block
    endian.expect_marker(reader, 4, "atom count")?;
    let n_atoms = endian.read_i32(reader)?;
    if n_atoms < 0 || n_atoms as usize > MAX_ATOMS {
        return Err(TrajectoryError::InvalidDcd(format!(
            "atom count {} outside 0..={}",
            n_atoms, MAX_ATOMS
        )));
    }
    let n_atoms = n_atoms as usize;
    endian.expect_marker(reader, 4, "atom count end")?;

    let first_frame_offset = reader.stream_position()?;
    let unit_cell_size = if has_unit_cell { 4 + 48 + 4 } else { 0 };
    let frame_size = (n_atoms * 4 + 8) * 3 + unit_cell_size;

    Ok(DcdHeader {
        n_frames: n_frames as usize,
        n_atoms,
        start_timestep,
        timestep_interval,
        last_timestep,
        timestep,
        has_unit_cell,
        is_charmm,
        is_big_endian: endian.big,
        titles,
        first_frame_offset,
        frame_size,
    })
}

/// Convert a stored `[a, γ, b, β, α, c]` record to `[a, b, c, α, β, γ]`.
///
/// Writers that follow the NAMD convention store cosines; older CHARMM files
/// store degrees. Values all within `[-1, 1]` are taken as cosines.
fn decode_unit_cell(raw: [f64; 6]) -> [f64; 6] {
    let [a, gamma, b, beta, alpha, c] = raw;
    let angles = [alpha, beta, gamma];
    let angles = if angles.iter().all(|v| v.abs() <= 1.0) {
        angles.map(|cos| 90.0 - cos.asin().to_degrees())
    } else {
        angles
    };
    [a, b, c, angles[0], angles[1], angles[2]]
}

fn read_axis<R: Read>(
    reader: &mut R,
    endian: Endian,
    n_atoms: usize,
    axis: &str,
) -> Result<Vec<f32>, TrajectoryError> {
    let block = (n_atoms * 4) as i32;
    endian.expect_marker(reader, block, axis)?;
    let values = (0..n_atoms)
        .map(|_| endian.read_f32(reader))
        .collect::<Result<Vec<_>, _>>()?;
    endian.expect_marker(reader, block, axis)?;
    Ok(values)
}

fn read_frame_internal<R: Read>(
    reader: &mut R,
    header: &DcdHeader,
) -> Result<DcdFrame, TrajectoryError> {
    let endian = Endian {
        big: header.is_big_endian,
    };

    let unit_cell = if header.has_unit_cell {
        endian.expect_marker(reader, UNIT_CELL_BLOCK_SIZE, "unit cell")?;
        let mut raw = [0.0; 6];
        for v in raw.iter_mut() {
            *v = endian.read_f64(reader)?;
        }
        endian.expect_marker(reader, UNIT_CELL_BLOCK_SIZE, "unit cell end")?;
        Some(decode_unit_cell(raw))
    } else {
        None
    };

    let x = read_axis(reader, endian, header.n_atoms, "X")?;
    let y = read_axis(reader, endian, header.n_atoms, "Y")?;
    let z = read_axis(reader, endian, header.n_atoms, "Z")?;

    let positions = (0..header.n_atoms)
        .map(|i| [x[i] as f64, y[i] as f64, z[i] as f64])
        .collect();

    Ok(DcdFrame {
        positions,
        unit_cell,
    })
}

// ============================================================================
// Public API
// ============================================================================

/// Read the header from a DCD file.
pub fn read_dcd_header<P: AsRef<Path>>(path: P) -> Result<DcdHeader, TrajectoryError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| TrajectoryError::open(path, e))?;
    let mut reader = BufReader::new(file);
    read_header(&mut reader)
}

/// Read a specific frame from a DCD file.
pub fn read_dcd_frame<P: AsRef<Path>>(path: P, frame: usize) -> Result<DcdFrame, TrajectoryError> {
    let mut reader = DcdReader::open(path)?;
    reader.seek_frame(frame)?;
    reader.read_frame()?.ok_or(TrajectoryError::FrameOutOfRange {
        frame,
        n_frames: reader.n_frames(),
    })
}
