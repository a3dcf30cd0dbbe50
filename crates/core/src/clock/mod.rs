//! The sequencer-backed master clock and the per-frame drift corrector.
//!
//! The sequencer device runs on its own thread and is the ground truth for
//! musical time. The render loop never waits on it: it reads the reported
//! position and running flag once per frame through [`ClockSample`] and keeps
//! its own integrated time in a [`DriftCorrector`].

mod manual;
mod software;

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

pub use manual::ManualSequencer;
pub use software::SoftwareSequencer;

use crate::Result;

/// Capability surface of a real-time MIDI sequencer device.
///
/// `start`, `stop` and `set_position` are requests; their effect becomes
/// visible through `position`/`is_running` whenever the device applies them.
pub trait Sequencer: Send {
    /// Acquires the named device. Fails with
    /// [`PerformanceError::DeviceUnavailable`](crate::PerformanceError::DeviceUnavailable)
    /// if it cannot be reached.
    fn open(&mut self, device: &str) -> Result<()>;
    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;
    fn position(&self) -> Duration;
    fn set_position(&mut self, position: Duration) -> Result<()>;
}

/// Position and running flag shared between a device thread and readers.
#[derive(Debug, Default)]
pub struct TransportState {
    position_micros: AtomicU64,
    running: AtomicBool,
}

impl TransportState {
    pub fn position(&self) -> Duration {
        Duration::from_micros(self.position_micros.load(Ordering::Acquire))
    }

    pub fn set_position(&self, position: Duration) {
        self.position_micros
            .store(duration_micros(position), Ordering::Release);
    }

    pub fn advance(&self, delta: Duration) {
        self.position_micros
            .fetch_add(duration_micros(delta), Ordering::AcqRel);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}

/// One frame's reading of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub position: Duration,
    pub running: bool,
}

/// Exclusive owner of an opened sequencer for the lifetime of a performance.
///
/// The device is acquired in [`SequencerClock::open`] and released when the
/// clock is dropped, on every exit path.
pub struct SequencerClock {
    sequencer: Box<dyn Sequencer>,
    device: String,
    duration: Duration,
}

impl SequencerClock {
    /// Opens `device` on `sequencer`. Errors are returned before any
    /// animation state exists, so playback never starts on a dead device.
    pub fn open(mut sequencer: Box<dyn Sequencer>, device: &str, duration: Duration) -> Result<Self> {
        sequencer.open(device)?;
        tracing::info!(device, ?duration, "sequencer opened");
        Ok(Self {
            sequencer,
            device: device.to_string(),
            duration,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Length of the sequence the clock plays.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn start(&mut self) -> Result<()> {
        self.sequencer.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.sequencer.stop()
    }

    pub fn is_running(&self) -> bool {
        self.sequencer.is_running()
    }

    /// Requests a seek. Positions past the end are clamped to the sequence
    /// duration; the clamped target is returned.
    pub fn seek(&mut self, position: Duration) -> Result<Duration> {
        let target = position.min(self.duration);
        if target != position {
            tracing::debug!(?position, ?target, "seek clamped to sequence duration");
        }
        self.sequencer.set_position(target)?;
        Ok(target)
    }

    pub fn sample(&self) -> ClockSample {
        ClockSample {
            position: self.sequencer.position(),
            running: self.sequencer.is_running(),
        }
    }
}

impl Drop for SequencerClock {
    fn drop(&mut self) {
        if self.sequencer.is_running() {
            if let Err(err) = self.sequencer.stop() {
                tracing::warn!(%err, "failed to stop sequencer during teardown");
            }
        }
        self.sequencer.close();
        tracing::info!(device = %self.device, "sequencer closed");
    }
}

impl std::fmt::Debug for SequencerClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerClock")
            .field("device", &self.device)
            .field("duration", &self.duration)
            .field("running", &self.sequencer.is_running())
            .finish()
    }
}

/// Outcome of one drift check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftSample {
    /// `|sequencer time - render time|` before correction.
    pub drift: Duration,
    /// Whether render time was snapped to the sequencer.
    pub resynced: bool,
}

/// Render-loop clock that free-runs on frame deltas and hard-snaps to the
/// sequencer when the two disagree by more than `tolerance`.
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    render_time: Duration,
    tolerance: Duration,
    last_drift: Duration,
    resyncs: u64,
}

impl DriftCorrector {
    pub fn new(tolerance: Duration) -> Self {
        Self {
            render_time: Duration::ZERO,
            tolerance,
            last_drift: Duration::ZERO,
            resyncs: 0,
        }
    }

    pub fn render_time(&self) -> Duration {
        self.render_time
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Drift measured by the most recent check.
    pub fn last_drift(&self) -> Duration {
        self.last_drift
    }

    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Integrates one frame. While the sequencer is not running render time
    /// is frozen and no drift check happens (`None`).
    pub fn update(&mut self, tpf: f32, sample: ClockSample) -> Option<DriftSample> {
        if !sample.running {
            return None;
        }

        self.render_time += frame_duration(tpf);
        let drift = abs_diff(sample.position, self.render_time);
        self.last_drift = drift;

        let resynced = drift > self.tolerance;
        if resynced {
            tracing::debug!(
                ?drift,
                render_time = ?self.render_time,
                sequencer_time = ?sample.position,
                "drift exceeded tolerance, resyncing"
            );
            self.render_time = sample.position;
            self.resyncs += 1;
        }

        Some(DriftSample { drift, resynced })
    }

    /// Moves render time directly, e.g. after a seek.
    pub fn snap_to(&mut self, time: Duration) {
        self.render_time = time;
        self.last_drift = Duration::ZERO;
    }
}

/// Converts a frame delta in seconds into a [`Duration`], treating negative,
/// non-finite or unrepresentable deltas as zero.
pub(crate) fn frame_duration(tpf: f32) -> Duration {
    if tpf > 0.0 {
        Duration::try_from_secs_f32(tpf).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

pub(crate) fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerformanceError;

    fn running(position_ms: u64) -> ClockSample {
        ClockSample {
            position: Duration::from_millis(position_ms),
            running: true,
        }
    }

    #[test]
    fn free_runs_within_tolerance() {
        let mut drift = DriftCorrector::new(Duration::from_millis(100));

        let sample = drift.update(0.5, running(550)).unwrap();

        assert!(!sample.resynced);
        assert_eq!(drift.render_time(), Duration::from_millis(500));
        assert_eq!(sample.drift, Duration::from_millis(50));
    }

    #[test]
    fn hard_snaps_when_drift_exceeds_tolerance() {
        let mut drift = DriftCorrector::new(Duration::from_millis(100));
        drift.update(0.5, running(500));

        let sample = drift.update(0.25, running(2000)).unwrap();

        assert!(sample.resynced);
        assert_eq!(drift.render_time(), Duration::from_millis(2000));
        assert_eq!(drift.resync_count(), 1);
    }

    #[test]
    fn freezes_while_sequencer_is_stopped() {
        let mut drift = DriftCorrector::new(Duration::from_millis(100));
        drift.update(1.0, running(1000));

        let paused = ClockSample {
            position: Duration::from_secs(30),
            running: false,
        };
        assert!(drift.update(0.5, paused).is_none());
        assert_eq!(drift.render_time(), Duration::from_secs(1));
    }

    #[test]
    fn ignores_bad_frame_deltas() {
        assert_eq!(frame_duration(-1.0), Duration::ZERO);
        assert_eq!(frame_duration(f32::NAN), Duration::ZERO);
        assert_eq!(frame_duration(1e30), Duration::ZERO);
        assert_eq!(frame_duration(f32::INFINITY), Duration::ZERO);
    }

    #[test]
    fn open_failure_is_surfaced() {
        let sequencer = ManualSequencer::with_devices(&["synth"]);
        let err = SequencerClock::open(Box::new(sequencer), "missing", Duration::from_secs(1))
            .unwrap_err();

        assert!(matches!(err, PerformanceError::DeviceUnavailable { device } if device == "missing"));
    }

    #[test]
    fn seek_is_clamped_to_duration() {
        let sequencer = ManualSequencer::new();
        let handle = sequencer.clone();
        let mut clock =
            SequencerClock::open(Box::new(sequencer), "synth", Duration::from_secs(5)).unwrap();

        let target = clock.seek(Duration::from_secs(60)).unwrap();

        assert_eq!(target, Duration::from_secs(5));
        assert_eq!(handle.position(), Duration::from_secs(5));
    }

    #[test]
    fn dropping_the_clock_releases_the_device() {
        let sequencer = ManualSequencer::new();
        let handle = sequencer.clone();
        {
            let mut clock =
                SequencerClock::open(Box::new(sequencer), "synth", Duration::from_secs(5)).unwrap();
            clock.start().unwrap();
            assert!(handle.is_open());
        }

        assert!(!handle.is_open());
        assert!(!handle.is_running());
    }
}
