//! Core library of the MIDI performance engine.
//!
//! A [`Performance`] plays one [`TimeBasedSequence`] against a [`Sequencer`]
//! device. Each frame it reconciles its own integrated clock with the
//! sequencer, advances every instrument's event collectors to the current
//! time, updates the active camera plugin and hands the resulting poses to a
//! [`Scene`]. Each module owns one of those subsystems.

pub mod animation;
pub mod assignment;
pub mod camera;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod math;
pub mod performance;
pub mod render;
pub mod sequence;

pub use animation::{Frame, Instrument};
pub use assignment::assign_instruments;
pub use camera::{CameraAction, CameraKind, CameraManager, CameraPlugin, CameraPose, Platform};
pub use clock::{DriftCorrector, ManualSequencer, Sequencer, SequencerClock, SoftwareSequencer};
pub use collector::EventCollector;
pub use config::{CameraConfig, PerformanceConfig, PlaybackConfig, VisibilityConfig};
pub use error::{PerformanceError, Result};
pub use performance::{Performance, PlaybackStatus};
pub use render::{NodeId, RenderGraph, Scene};
pub use sequence::{NoteEvent, TempoChange, TimeBasedSequence, Timed, Track};
