//! Decides which box streams fire at a given step.
//!
//! Each (box, stream) pair is evaluated on its own: a box may write its
//! trajectory every 1000 steps and its restart file every 10000 while the
//! next box writes neither.

use crate::config::{EventSettings, OutputConfig};
use rmc_core::system::BoxIndex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// DCD trajectory frames.
    State,
    /// Binary restart coordinates.
    Restart,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::State, StreamKind::Restart];
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::State => write!(f, "trajectory"),
            StreamKind::Restart => write!(f, "restart"),
        }
    }
}

/// Per-box event settings for both streams, fixed at construction.
#[derive(Debug, Clone)]
pub struct OutputScheduler {
    boxes: Vec<(EventSettings, EventSettings)>,
}

impl OutputScheduler {
    /// Take the settings of the first `box_total` entries of `config`.
    pub fn new(config: &OutputConfig, box_total: usize) -> Self {
        let boxes = config
            .boxes
            .iter()
            .take(box_total)
            .map(|b| (b.state, b.restart))
            .collect();
        Self { boxes }
    }

    pub fn box_total(&self) -> usize {
        self.boxes.len()
    }

    pub fn settings(&self, box_index: BoxIndex, kind: StreamKind) -> EventSettings {
        match (self.boxes.get(box_index), kind) {
            (Some((state, _)), StreamKind::State) => *state,
            (Some((_, restart)), StreamKind::Restart) => *restart,
            (None, _) => EventSettings::disabled(),
        }
    }

    pub fn fires(&self, box_index: BoxIndex, kind: StreamKind, step: u64) -> bool {
        self.settings(box_index, kind).fires(step)
    }

    /// Boxes whose `kind` stream fires at `step`, in box order.
    pub fn due(&self, kind: StreamKind, step: u64) -> Vec<BoxIndex> {
        (0..self.boxes.len())
            .filter(|&b| self.fires(b, kind, step))
            .collect()
    }

    /// True when any stream of any box fires at `step`.
    pub fn any_due(&self, step: u64) -> bool {
        StreamKind::ALL
            .iter()
            .any(|&kind| (0..self.boxes.len()).any(|b| self.fires(b, kind, step)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoxOutputConfig;

    fn two_boxes() -> OutputConfig {
        OutputConfig {
            boxes: vec![
                BoxOutputConfig {
                    state: EventSettings::every(50),
                    restart: EventSettings::disabled(),
                    ..BoxOutputConfig::default()
                },
                BoxOutputConfig {
                    state: EventSettings::every(200),
                    restart: EventSettings::every(100),
                    ..BoxOutputConfig::default()
                },
            ],
            ..OutputConfig::default()
        }
    }

    #[test]
    fn test_streams_fire_independently() {
        let scheduler = OutputScheduler::new(&two_boxes(), 2);

        assert_eq!(scheduler.due(StreamKind::State, 50), vec![0]);
        assert_eq!(scheduler.due(StreamKind::Restart, 50), Vec::<BoxIndex>::new());
        assert_eq!(scheduler.due(StreamKind::State, 100), vec![0]);
        assert_eq!(scheduler.due(StreamKind::Restart, 100), vec![1]);
        assert_eq!(scheduler.due(StreamKind::State, 200), vec![0, 1]);

        assert!(scheduler.any_due(100));
        assert!(!scheduler.any_due(75));
        assert!(!scheduler.settings(0, StreamKind::Restart).enable);
    }

    #[test]
    fn test_entries_beyond_box_total_are_ignored() {
        let scheduler = OutputScheduler::new(&two_boxes(), 1);
        assert_eq!(scheduler.box_total(), 1);
        assert!(!scheduler.fires(1, StreamKind::State, 200));
        assert_eq!(scheduler.due(StreamKind::State, 200), vec![0]);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(StreamKind::State.to_string(), "trajectory");
        assert_eq!(StreamKind::Restart.to_string(), "restart");
    }
}
