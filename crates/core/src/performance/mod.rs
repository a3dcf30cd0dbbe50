//! Top-level driver: one [`Performance`] per played sequence.
//!
//! The host calls [`Performance::update`] once per frame and forwards input
//! through [`Performance::on_action`]. All scene mutation happens inside those
//! two calls, on the caller's thread.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    animation::{Frame, Instrument},
    assignment::assign_instruments,
    camera::{CameraContext, CameraKind, CameraManager, Platform},
    clock::{frame_duration, DriftCorrector, Sequencer, SequencerClock},
    config::PerformanceConfig,
    render::Scene,
    sequence::TimeBasedSequence,
    Result,
};

/// Read-only snapshot for overlays and logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackStatus {
    /// Position reported by the sequencer.
    pub position: Duration,
    pub render_time: Duration,
    pub running: bool,
    pub drift: Duration,
    pub finished: bool,
    pub camera: CameraKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Play,
    PlayPause,
    SeekForward,
    SeekBackward,
    Restart,
}

impl Transport {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "play" => Some(Self::Play),
            "play_pause" => Some(Self::PlayPause),
            "seek_forward" => Some(Self::SeekForward),
            "seek_backward" => Some(Self::SeekBackward),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }
}

pub struct Performance<S: Scene> {
    sequence: Arc<TimeBasedSequence>,
    config: PerformanceConfig,
    clock: SequencerClock,
    drift: DriftCorrector,
    instruments: Vec<Box<dyn Instrument>>,
    camera: CameraManager,
    scene: S,
    /// Remaining lead-in before the sequencer is started.
    lead_in: Option<Duration>,
    /// Time spent past the end of the sequence.
    outro: Duration,
    paused: bool,
    finished: bool,
}

impl<S: Scene> Performance<S> {
    /// Opens the sequencer on `device` and builds the stage.
    ///
    /// The device is opened before any instrument is created: if it is
    /// unavailable the error is returned and nothing is spawned into `scene`.
    pub fn start(
        sequence: Arc<TimeBasedSequence>,
        sequencer: Box<dyn Sequencer>,
        device: &str,
        config: PerformanceConfig,
        platform: Platform,
        mut scene: S,
    ) -> Result<Self> {
        let duration = sequence.duration();
        let clock = SequencerClock::open(sequencer, device, duration)?;

        let instruments = assign_instruments(&sequence, &config.visibility, &mut scene);
        let camera = CameraManager::new(platform, &config.camera, duration);
        tracing::info!(
            instruments = instruments.len(),
            ?duration,
            camera = ?camera.current_kind(),
            "performance started"
        );

        Ok(Self {
            drift: DriftCorrector::new(config.playback.drift_tolerance()),
            lead_in: Some(config.playback.intro()),
            outro: Duration::ZERO,
            paused: false,
            finished: false,
            sequence,
            config,
            clock,
            instruments,
            camera,
            scene,
        })
    }

    pub fn sequence(&self) -> &TimeBasedSequence {
        &self.sequence
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn instruments(&self) -> &[Box<dyn Instrument>] {
        &self.instruments
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraManager {
        &mut self.camera
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn status(&self) -> PlaybackStatus {
        let sample = self.clock.sample();
        PlaybackStatus {
            position: sample.position,
            render_time: self.drift.render_time(),
            running: sample.running,
            drift: self.drift.last_drift(),
            finished: self.finished,
            camera: self.camera.current_kind(),
        }
    }

    /// Advances one frame of `tpf` seconds.
    ///
    /// A sequencer that refuses to start at the end of the lead-in, or a scene
    /// that fails to present, is logged and retried on the next frame.
    pub fn update(&mut self, tpf: f32) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let delta = frame_duration(tpf);

        if !self.paused {
            if let Some(remaining) = self.lead_in {
                let remaining = remaining.saturating_sub(delta);
                if remaining.is_zero() {
                    match self.clock.start() {
                        Ok(()) => self.lead_in = None,
                        Err(err) => {
                            tracing::warn!(%err, "sequencer failed to start, retrying");
                            self.lead_in = Some(Duration::ZERO);
                        }
                    }
                } else {
                    self.lead_in = Some(remaining);
                }
            }
        }

        let sample = self.clock.sample();
        self.drift.update(tpf, sample);

        let duration = self.sequence.duration();
        let time = self.drift.render_time();
        let past_end = time >= duration || (!sample.running && sample.position >= duration);
        if past_end && self.lead_in.is_none() && !self.paused {
            self.outro += delta;
            if self.outro >= self.config.playback.outro() {
                self.end_of_piece()?;
                if self.finished {
                    return Ok(());
                }
            }
        }

        let time = self.drift.render_time();
        let frame = Frame::new(time, self.sequence.tick_at_time(time), tpf);
        for instrument in &mut self.instruments {
            instrument.update(&frame, &mut self.scene);
        }

        let context = CameraContext { time, duration };
        let pose = self.camera.update(tpf, &context);
        self.scene.set_camera(pose);
        if let Err(err) = self.scene.draw() {
            tracing::warn!(%err, "frame dropped");
        }
        Ok(())
    }

    /// Handles a discrete input. Transport actions are consumed here;
    /// everything else goes to the camera system.
    pub fn on_action(&mut self, name: &str, pressed: bool, _tpf: f32) -> Result<()> {
        let Some(transport) = Transport::from_name(name) else {
            self.camera.on_action(name, pressed);
            return Ok(());
        };
        if !pressed {
            return Ok(());
        }
        tracing::debug!(?transport, "transport action");

        let now = self.drift.render_time();
        let step = self.config.playback.seek_step();
        match transport {
            Transport::Play => {
                if self.paused {
                    self.toggle_pause()?;
                } else {
                    self.resume_clock()?;
                }
            }
            Transport::PlayPause => self.toggle_pause()?,
            Transport::SeekForward => {
                self.seek(now + step)?;
            }
            Transport::SeekBackward => {
                self.seek(now.saturating_sub(step))?;
            }
            Transport::Restart => {
                self.seek(Duration::ZERO)?;
            }
        }
        Ok(())
    }

    /// Seeks every part of the performance to `time`, clamped to the piece.
    /// Returns the position actually used.
    ///
    /// Unless paused or still in the lead-in, playback continues from the new
    /// position, even if the sequencer had stopped at the end of the piece.
    pub fn seek(&mut self, time: Duration) -> Result<Duration> {
        let target = self.clock.seek(time)?;
        self.drift.snap_to(target);
        for instrument in &mut self.instruments {
            instrument.seek(target);
        }
        self.camera.seek(target);
        self.outro = Duration::ZERO;
        self.finished = false;
        self.resume_clock()?;
        Ok(target)
    }

    /// Starts a stopped sequencer when playback is supposed to be running.
    fn resume_clock(&mut self) -> Result<()> {
        if self.paused || self.lead_in.is_some() || self.clock.is_running() {
            return Ok(());
        }
        tracing::debug!("resuming stopped sequencer");
        self.clock.start()
    }

    fn toggle_pause(&mut self) -> Result<()> {
        self.paused = !self.paused;
        if self.lead_in.is_some() {
            return Ok(());
        }
        if self.paused {
            self.clock.stop()
        } else {
            self.clock.start()
        }
    }

    fn end_of_piece(&mut self) -> Result<()> {
        if self.clock.is_running() {
            self.clock.stop()?;
        }
        if self.config.playback.looping {
            tracing::info!("end of piece, looping");
            self.lead_in = Some(self.config.playback.intro());
            self.seek(Duration::ZERO)?;
        } else {
            tracing::info!("end of piece");
            self.finished = true;
        }
        Ok(())
    }
}

impl<S: Scene> std::fmt::Debug for Performance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Performance")
            .field("clock", &self.clock)
            .field("instruments", &self.instruments.len())
            .field("camera", &self.camera)
            .field("status", &self.status())
            .finish()
    }
}
