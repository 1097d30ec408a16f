//! Per-box restart coordinate output.
//!
//! Unlike trajectory frames, restart files hold only the atoms resident in
//! the box, in resident order, so they can be mapped straight back onto the
//! molecules when a run resumes. Each box keeps a coordinate buffer that is
//! resized whenever its population changes.

use crate::config::OutputConfig;
use crate::error::OutputError;
use crate::frame::StreamState;
use crate::schedule::StreamKind;
use crate::view::SimulationView;
use rmc_core::system::BoxIndex;
use rmc_core::trajectory::restart::RestartFile;
use rmc_core::wrapping::wrap_residents;
use std::path::{Path, PathBuf};

pub struct RestartWriter {
    files: Vec<StreamState<RestartFile>>,
    paths: Vec<PathBuf>,
    buffers: Vec<Vec<[f64; 3]>>,
}

impl RestartWriter {
    /// Create one restart file per box with restart output enabled. Boxes
    /// with it disabled never touch the filesystem.
    pub fn open(config: &OutputConfig, box_total: usize) -> Result<Self, OutputError> {
        let mut files = Vec::with_capacity(box_total);
        let mut paths = Vec::with_capacity(box_total);
        for box_index in 0..box_total {
            let path = config.restart_path(box_index);
            let enabled = config
                .boxes
                .get(box_index)
                .is_some_and(|b| b.restart.enable);
            if enabled {
                let file = RestartFile::create(&path).map_err(|source| OutputError::Open {
                    box_index,
                    kind: StreamKind::Restart,
                    path: path.clone(),
                    source,
                })?;
                log::info!("Box {}: restart file '{}' opened", box_index, path.display());
                files.push(StreamState::Ready(file));
            } else {
                files.push(StreamState::Disabled);
            }
            paths.push(path);
        }

        Ok(Self {
            files,
            paths,
            buffers: vec![Vec::new(); box_total],
        })
    }

    pub fn is_ready(&self, box_index: BoxIndex) -> bool {
        self.files.get(box_index).is_some_and(StreamState::is_ready)
    }

    pub fn path(&self, box_index: BoxIndex) -> &Path {
        &self.paths[box_index]
    }

    /// Most recently written coordinates of a box.
    pub fn buffer(&self, box_index: BoxIndex) -> &[[f64; 3]] {
        &self.buffers[box_index]
    }

    /// Wrap the residents of `box_index` into its buffer and rewrite its
    /// restart file. Returns the number of atoms written.
    ///
    /// # Panics
    ///
    /// If the box's restart stream is disabled or already closed.
    pub fn write_box(
        &mut self,
        view: &SimulationView<'_>,
        box_index: BoxIndex,
        step: u64,
    ) -> Result<usize, OutputError> {
        let lattice = view.lattice(box_index, step)?;
        let residents = view.residents(box_index, step)?;
        if residents.is_empty() {
            return Err(OutputError::EmptyBox {
                box_index,
                kind: StreamKind::Restart,
                step,
            });
        }

        let buffer = &mut self.buffers[box_index];
        if buffer.len() != residents.atom_count() {
            log::debug!(
                "Box {}: restart buffer resized {} -> {} atoms",
                box_index,
                buffer.len(),
                residents.atom_count()
            );
            buffer.resize(residents.atom_count(), [0.0; 3]);
        }
        wrap_residents(lattice, &residents, view.topology, view.coordinates, buffer);

        self.flush(box_index, step, residents.atom_count())?;
        Ok(residents.atom_count())
    }

    fn flush(&mut self, box_index: BoxIndex, step: u64, expected: usize) -> Result<(), OutputError> {
        let buffer = &self.buffers[box_index];
        assert_eq!(
            buffer.len(),
            expected,
            "restart buffer for box {} is not sized to its resident atoms",
            box_index
        );
        let file = self.files[box_index].ready_mut(box_index, StreamKind::Restart);
        file.write(buffer).map_err(|source| OutputError::Codec {
            box_index,
            kind: StreamKind::Restart,
            step,
            path: self.paths[box_index].clone(),
            source,
        })?;
        log::debug!(
            "Box {}: restart coordinates for {} atoms at step {}",
            box_index,
            expected,
            step
        );
        Ok(())
    }

    /// Close every open restart file; later calls do nothing.
    pub fn close(&mut self) -> Result<(), OutputError> {
        let mut first_error = None;
        for (box_index, state) in self.files.iter_mut().enumerate() {
            let Some(file) = state.take() else {
                continue;
            };
            let rewrites = file.frames_written();
            match file.close() {
                Ok(()) => log::info!(
                    "Box {}: restart file '{}' closed after {} rewrites",
                    box_index,
                    self.paths[box_index].display(),
                    rewrites
                ),
                Err(source) => {
                    first_error.get_or_insert(OutputError::Close {
                        box_index,
                        kind: StreamKind::Restart,
                        path: self.paths[box_index].clone(),
                        source,
                    });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for RestartWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoxOutputConfig, EventSettings};
    use crate::testing::Fixture;
    use rmc_core::residents::select_residents;
    use rmc_core::trajectory::restart::read_restart;

    fn config(dir: &Path, box0: EventSettings, box1: EventSettings) -> OutputConfig {
        OutputConfig {
            boxes: vec![
                BoxOutputConfig {
                    restart: box0,
                    ..BoxOutputConfig::default()
                },
                BoxOutputConfig {
                    restart: box1,
                    ..BoxOutputConfig::default()
                },
            ],
            unique_name: "unit".to_string(),
            replica_dir: Some(dir.to_path_buf()),
            ..OutputConfig::default()
        }
    }

    #[test]
    fn test_disabled_box_never_opens_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), EventSettings::disabled(), EventSettings::every(100));
        let fixture = Fixture::two_box();
        let mut writer = RestartWriter::open(&config, 2).unwrap();

        assert!(!writer.is_ready(0));
        assert!(!config.restart_path(0).exists());
        assert!(!writer.is_ready(2));
        assert_eq!(writer.write_box(&fixture.view(), 1, 100).unwrap(), 6);
        writer.close().unwrap();

        assert!(!config.restart_path(0).exists());
        let frame = read_restart(config.restart_path(1)).unwrap();
        assert_eq!(frame.n_atoms(), 6);
    }

    #[test]
    fn test_buffer_follows_population() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), EventSettings::every(10), EventSettings::disabled());
        let mut fixture = Fixture::two_box();
        let mut writer = RestartWriter::open(&config, 2).unwrap();

        writer.write_box(&fixture.view(), 0, 10).unwrap();
        assert_eq!(writer.buffer(0).len(), 4);
        // wrapped, not raw: the water crossing x = 20 comes back as x ≈ 1
        assert!((writer.buffer(0)[1][0] - 1.0).abs() < 1e-9);

        // insert the free argon, then move a water over from box 1
        fixture.lookup.insert(4, 0).unwrap();
        fixture.lookup.transfer(3, 0).unwrap();
        writer.write_box(&fixture.view(), 0, 20).unwrap();
        assert_eq!(writer.buffer(0).len(), 8);

        let residents = select_residents(&fixture.table, &fixture.lookup, 0);
        let frame = read_restart(config.restart_path(0)).unwrap();
        let restored = frame.scatter(&residents, &fixture.table).unwrap();
        assert_eq!(restored.len(), 8);
        assert_eq!(restored.last().map(|(atom, _)| *atom), Some(10));

        fixture.lookup.remove(1).unwrap();
        writer.write_box(&fixture.view(), 0, 30).unwrap();
        assert_eq!(writer.buffer(0).len(), 5);
        assert_eq!(read_restart(config.restart_path(0)).unwrap().n_atoms(), 5);
    }

    #[test]
    fn test_restart_values_match_wrapped_positions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), EventSettings::disabled(), EventSettings::every(1));
        let fixture = Fixture::two_box();
        let mut writer = RestartWriter::open(&config, 2).unwrap();
        writer.write_box(&fixture.view(), 1, 1).unwrap();

        let frame = read_restart(config.restart_path(1)).unwrap();
        for (stored, wrapped) in frame.positions().iter().zip(writer.buffer(1)) {
            for k in 0..3 {
                assert_eq!(stored[k], wrapped[k] as f32 as f64);
            }
        }
    }

    #[test]
    #[should_panic(expected = "restart output for box 0 is disabled")]
    fn test_write_to_disabled_box_panics() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), EventSettings::disabled(), EventSettings::disabled());
        let fixture = Fixture::two_box();
        let mut writer = RestartWriter::open(&config, 2).unwrap();
        let _ = writer.write_box(&fixture.view(), 0, 0);
    }

    #[test]
    fn test_open_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir");
        let config = config(&missing, EventSettings::every(5), EventSettings::disabled());
        let err = RestartWriter::open(&config, 2).err().unwrap();
        assert!(matches!(err, OutputError::Open { box_index: 0, .. }));
        assert!(err.to_string().contains("no_such_dir"));
    }
}
