//! Per-instrument animation controllers.
//!
//! Every controller owns its collectors and is driven once per frame from the
//! render loop. Controllers keep no timers of their own: strike poses, arcs
//! and visibility are all derived from collector queries against the frame's
//! playback time.

mod arc;
mod instruments;
mod recoil;
mod striker;
mod visibility;

use std::time::Duration;

pub use arc::ArcMotion;
pub use instruments::{HarmonicInstrument, Mallets, Percussion};
pub use recoil::Recoil;
pub use striker::{StrikePolicy, Striker, StrikerParameters, VisibilityBehavior};
pub use visibility::{
    standard_rules, HarmonicInstanceControl, SubjectState, VisibilityParameters,
};

use crate::render::Scene;

/// Playback position handed to every controller for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub time: Duration,
    /// `time` expressed in ticks, for windows measured in musical time.
    pub tick: u64,
    /// Seconds elapsed since the previous frame.
    pub tpf: f32,
}

impl Frame {
    pub fn new(time: Duration, tick: u64, tpf: f32) -> Self {
        Self { time, tick, tpf }
    }
}

/// An animated instrument placed in the scene.
pub trait Instrument: Send {
    fn name(&self) -> &str;

    /// Advances collectors to `frame.time` and pushes poses to the scene.
    fn update(&mut self, frame: &Frame, scene: &mut dyn Scene);

    /// Re-derives every collector after a seek to `time`.
    fn seek(&mut self, time: Duration);

    /// Visibility as of the last update.
    fn is_visible(&self) -> bool;
}
