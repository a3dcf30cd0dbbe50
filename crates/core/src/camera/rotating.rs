use std::time::Duration;

use crate::math::{ease_in_out_cubic, ease_out_cubic, Vec3};

use super::{CameraAction, CameraContext, CameraKind, CameraPlugin, CameraPose};

const RADIUS: f32 = 134.0;
const Y_BASELINE: f32 = 92.0;
const LOOK_AT: Vec3 = Vec3::new(-2.0, 47.32, 0.0);
const BRAKING_PERIOD: Duration = Duration::from_secs(20);

fn orbit_location(angle: f32) -> Vec3 {
    Vec3::new(RADIUS * angle.sin(), Y_BASELINE, RADIUS * angle.cos())
}

/// Braking progress in the last [`BRAKING_PERIOD`] of the piece, `0..=1`.
fn brakes_factor(context: &CameraContext) -> f32 {
    let braking = BRAKING_PERIOD.as_secs_f32();
    ((braking - context.remaining().as_secs_f32()) / braking).clamp(0.0, 1.0)
}

/// Swings back and forth around the stage and settles on the front view as
/// the piece ends.
#[derive(Debug)]
pub struct RotatingCam {
    desired: f32,
    eased: f32,
    direction: f32,
    transition_in: f32,
    pose_on_enable: CameraPose,
    active: bool,
}

impl RotatingCam {
    const ROTATION_SPEED: f32 = 0.05;
    const TRANSITION_IN_RATE: f32 = 0.2;
    const EASE_RATE: f32 = 1.0;

    pub fn new() -> Self {
        Self {
            desired: 0.0,
            eased: 0.0,
            direction: 1.0,
            transition_in: 0.0,
            pose_on_enable: CameraPose::default(),
            active: false,
        }
    }

    pub fn track_position(&self) -> f32 {
        self.eased
    }
}

impl Default for RotatingCam {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPlugin for RotatingCam {
    fn kind(&self) -> CameraKind {
        CameraKind::Rotating
    }

    fn activate(&mut self, pose: CameraPose) {
        self.active = true;
        self.pose_on_enable = pose;
        self.transition_in = 0.0;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, tpf: f32, context: &CameraContext, pose: &mut CameraPose) {
        self.desired = (self.desired + tpf * self.direction * Self::ROTATION_SPEED).clamp(-1.0, 1.0);
        if self.desired >= 1.0 {
            self.direction = -1.0;
        } else if self.desired <= -1.0 {
            self.direction = 1.0;
        }
        self.eased += (self.desired - self.eased) * (tpf * Self::EASE_RATE).min(1.0);
        self.transition_in = (self.transition_in + tpf * Self::TRANSITION_IN_RATE).min(1.0);

        let braked = self.eased * (1.0 - ease_in_out_cubic(brakes_factor(context)));
        let orbit = CameraPose::looking_at(orbit_location(braked), LOOK_AT);
        *pose = self.pose_on_enable.lerp(orbit, ease_out_cubic(self.transition_in));
    }

    fn on_action(&mut self, _action: CameraAction, _pressed: bool) {}

    fn seek(&mut self, time: Duration) {
        if time.is_zero() {
            self.desired = 0.0;
            self.eased = 0.0;
            self.direction = 1.0;
        }
    }
}

/// Glides along a short rail in front of the stage, damped toward the rail
/// position every frame.
#[derive(Debug)]
pub struct SlideCam {
    track: f32,
    direction: f32,
    active: bool,
}

impl SlideCam {
    const MAX_ANGLE: f32 = 0.5;
    const SPEED: f32 = 0.04;
    const DAMPENING: f32 = 0.6;

    pub fn new() -> Self {
        Self {
            track: 0.0,
            direction: 1.0,
            active: false,
        }
    }

    pub fn track_position(&self) -> f32 {
        self.track
    }
}

impl Default for SlideCam {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPlugin for SlideCam {
    fn kind(&self) -> CameraKind {
        CameraKind::Slide
    }

    fn activate(&mut self, _pose: CameraPose) {
        self.active = true;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, tpf: f32, context: &CameraContext, pose: &mut CameraPose) {
        self.track += tpf * Self::SPEED * self.direction;
        if self.track > Self::MAX_ANGLE {
            self.direction = -1.0;
        } else if self.track < -Self::MAX_ANGLE {
            self.direction = 1.0;
        }

        let braked = self.track * (1.0 - brakes_factor(context));
        let rail = (braked * std::f32::consts::FRAC_PI_2).sin();
        let desired = orbit_location(rail);

        let location = pose.location.lerp(desired, (Self::DAMPENING * tpf).min(1.0));
        let facing = CameraPose::looking_at(location, LOOK_AT);
        *pose = CameraPose {
            location,
            ..pose.lerp(facing, (Self::DAMPENING * 5.0 * tpf).min(1.0))
        };
    }

    fn on_action(&mut self, _action: CameraAction, _pressed: bool) {}

    fn seek(&mut self, time: Duration) {
        if time.is_zero() {
            self.track = 0.0;
            self.direction = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(time_secs: u64, duration_secs: u64) -> CameraContext {
        CameraContext {
            time: Duration::from_secs(time_secs),
            duration: Duration::from_secs(duration_secs),
        }
    }

    #[test]
    fn transitions_in_from_the_previous_pose() {
        let mut camera = RotatingCam::new();
        let start = CameraPose::looking_at(Vec3::new(0.0, 300.0, 0.0), LOOK_AT);
        camera.activate(start);

        let mut pose = start;
        camera.update(1.0 / 60.0, &context(0, 120), &mut pose);
        assert!(pose.location.distance(start.location) < 5.0);

        for _ in 0..600 {
            camera.update(1.0 / 60.0, &context(10, 120), &mut pose);
        }
        let radius = (pose.location.x.powi(2) + pose.location.z.powi(2)).sqrt();
        assert!((radius - RADIUS).abs() < 1e-2);
        assert_eq!(pose.location.y, Y_BASELINE);
    }

    #[test]
    fn brakes_to_the_front_at_the_end() {
        let mut camera = RotatingCam::new();
        camera.activate(CameraPose::default());
        let mut pose = CameraPose::default();
        for _ in 0..1200 {
            camera.update(1.0 / 60.0, &context(10, 120), &mut pose);
        }
        assert!(camera.track_position().abs() > 0.1);

        camera.update(1.0 / 60.0, &context(120, 120), &mut pose);
        assert!(pose.location.x.abs() < 1e-3);
        assert!((pose.location.z - RADIUS).abs() < 1e-3);
    }

    #[test]
    fn slide_stays_on_its_rail() {
        let mut camera = SlideCam::new();
        camera.activate(CameraPose::default());
        let mut pose = CameraPose::default();
        for _ in 0..60 * 60 {
            camera.update(1.0 / 60.0, &context(10, 600), &mut pose);
            assert!(camera.track_position().abs() <= SlideCam::MAX_ANGLE + 0.01);
        }
        assert!((pose.location.y - Y_BASELINE).abs() < 1.0);
    }
}
