//! Owner of every output stream in a run.

use crate::config::OutputConfig;
use crate::error::OutputError;
use crate::frame::{assemble_frame, TrajectoryWriter};
use crate::restart::RestartWriter;
use crate::schedule::{OutputScheduler, StreamKind};
use crate::view::SimulationView;
use rmc_core::system::BoxIndex;
use rmc_core::trajectory::{FrameSink, TrajectoryCodec};

/// Which boxes were written during one call to
/// [`OutputManager::do_output`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputReport {
    pub step: u64,
    pub trajectory: Vec<BoxIndex>,
    pub restart: Vec<BoxIndex>,
}

impl OutputReport {
    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty() && self.restart.is_empty()
    }
}

/// Trajectory and restart output for all boxes of a simulation.
///
/// Streams are opened by [`OutputManager::new`] and released by
/// [`OutputManager::close`] or on drop.
pub struct OutputManager<S: FrameSink> {
    config: OutputConfig,
    scheduler: OutputScheduler,
    trajectory: TrajectoryWriter<S>,
    restart: RestartWriter,
    closed: bool,
}

impl<S: FrameSink> OutputManager<S> {
    /// Validate `config` against the system in `view` and open every
    /// enabled stream.
    pub fn new<C>(
        config: OutputConfig,
        codec: &C,
        view: &SimulationView<'_>,
    ) -> Result<Self, OutputError>
    where
        C: TrajectoryCodec<Sink = S>,
    {
        let box_total = view.geometry.box_total();
        config.validate(box_total)?;

        if let Some(dir) = &config.replica_dir {
            log::info!("Writing output under '{}'", dir.display());
        }
        let n_atoms = view.topology.total_atoms();
        let trajectory = TrajectoryWriter::open(codec, &config, box_total, n_atoms)?;
        let restart = RestartWriter::open(&config, box_total)?;
        let scheduler = OutputScheduler::new(&config, box_total);

        Ok(Self {
            config,
            scheduler,
            trajectory,
            restart,
            closed: false,
        })
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &OutputScheduler {
        &self.scheduler
    }

    pub fn trajectory(&self) -> &TrajectoryWriter<S> {
        &self.trajectory
    }

    pub fn restart(&self) -> &RestartWriter {
        &self.restart
    }

    /// Write every stream that fires at `step`. Boxes are handled in order,
    /// trajectory frames before restart files; the first error stops the
    /// event.
    ///
    /// # Panics
    ///
    /// If called after [`OutputManager::close`].
    pub fn do_output(
        &mut self,
        step: u64,
        view: &SimulationView<'_>,
    ) -> Result<OutputReport, OutputError> {
        assert!(!self.closed, "output written after close (step {})", step);

        let mut report = OutputReport {
            step,
            ..OutputReport::default()
        };
        if !self.scheduler.any_due(step) {
            return Ok(report);
        }

        for box_index in self.scheduler.due(StreamKind::State, step) {
            let frame = assemble_frame(view, box_index, step)?;
            self.trajectory.write(&frame)?;
            report.trajectory.push(box_index);
        }
        for box_index in self.scheduler.due(StreamKind::Restart, step) {
            self.restart.write_box(view, box_index, step)?;
            report.restart.push(box_index);
        }

        if !report.is_empty() {
            log::info!(
                "Step {}: trajectory boxes {:?}, restart boxes {:?}",
                step,
                report.trajectory,
                report.restart
            );
        }
        Ok(report)
    }

    /// Close all streams. Both writers are closed even if the first fails.
    pub fn close(&mut self) -> Result<(), OutputError> {
        self.closed = true;
        let trajectory = self.trajectory.close();
        let restart = self.restart.close();
        trajectory.and(restart)
    }
}
