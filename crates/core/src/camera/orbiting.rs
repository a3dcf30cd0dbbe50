use crate::math::Vec3;

use super::{CameraAction, CameraContext, CameraKind, CameraPlugin, CameraPose};

const PIVOT: Vec3 = Vec3::new(-2.0, 47.32, 0.0);
const ORBIT_SPEED: f32 = 1.2;
const ZOOM_SPEED: f32 = 80.0;
const PAN_SPEED: f32 = 40.0;
const MIN_DISTANCE: f32 = 20.0;
const MAX_DISTANCE: f32 = 300.0;
const PAN_LIMIT: f32 = 150.0;

/// Touch-device camera: orbits a pivot in front of the stage. Gestures arrive
/// as press/release pairs of `pan`, `zoom` and `orbit` actions.
#[derive(Debug)]
pub struct OrbitingCam {
    yaw: f32,
    pitch: f32,
    distance: f32,
    pan: f32,
    orbit_input: i8,
    zoom_input: i8,
    pan_input: i8,
    active: bool,
}

impl OrbitingCam {
    pub fn new() -> Self {
        let home = Vec3::new(-2.0, 92.0, 134.0) - PIVOT;
        let horizontal = (home.x * home.x + home.z * home.z).sqrt();
        Self {
            yaw: home.x.atan2(home.z),
            pitch: home.y.atan2(horizontal),
            distance: home.length(),
            pan: 0.0,
            orbit_input: 0,
            zoom_input: 0,
            pan_input: 0,
            active: false,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn pivot(&self) -> Vec3 {
        PIVOT + Vec3::new(self.pan, 0.0, 0.0)
    }

    fn location(&self) -> Vec3 {
        self.pivot()
            + Vec3::new(
                self.distance * self.yaw.sin() * self.pitch.cos(),
                self.distance * self.pitch.sin(),
                self.distance * self.yaw.cos() * self.pitch.cos(),
            )
    }
}

impl Default for OrbitingCam {
    fn default() -> Self {
        Self::new()
    }
}

fn held(pressed: bool, sign: i8) -> i8 {
    if pressed {
        sign.signum()
    } else {
        0
    }
}

impl CameraPlugin for OrbitingCam {
    fn kind(&self) -> CameraKind {
        CameraKind::Orbiting
    }

    fn activate(&mut self, _pose: CameraPose) {
        self.active = true;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.orbit_input = 0;
        self.zoom_input = 0;
        self.pan_input = 0;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, tpf: f32, _context: &CameraContext, pose: &mut CameraPose) {
        self.yaw += f32::from(self.orbit_input) * ORBIT_SPEED * tpf;
        self.distance = (self.distance - f32::from(self.zoom_input) * ZOOM_SPEED * tpf)
            .clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.pan = (self.pan + f32::from(self.pan_input) * PAN_SPEED * tpf).clamp(-PAN_LIMIT, PAN_LIMIT);

        *pose = CameraPose::looking_at(self.location(), self.pivot());
    }

    fn on_action(&mut self, action: CameraAction, pressed: bool) {
        match action {
            CameraAction::Orbit(sign) => self.orbit_input = held(pressed, sign),
            CameraAction::Zoom(sign) => self.zoom_input = held(pressed, sign),
            CameraAction::Pan(sign) => self.pan_input = held(pressed, sign),
            _ => {}
        }
    }

    fn owns(&self, action: CameraAction) -> bool {
        matches!(
            action,
            CameraAction::SwitchToFreeCam
                | CameraAction::Pan(_)
                | CameraAction::Zoom(_)
                | CameraAction::Orbit(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn context() -> CameraContext {
        CameraContext {
            time: Duration::ZERO,
            duration: Duration::from_secs(60),
        }
    }

    #[test]
    fn starts_at_the_home_view() {
        let mut camera = OrbitingCam::new();
        let mut pose = CameraPose::default();
        camera.update(0.016, &context(), &mut pose);
        assert!(pose.location.distance(Vec3::new(-2.0, 92.0, 134.0)) < 1e-3);
    }

    #[test]
    fn zoom_is_bounded() {
        let mut camera = OrbitingCam::new();
        let mut pose = CameraPose::default();
        camera.on_action(CameraAction::Zoom(1), true);
        for _ in 0..600 {
            camera.update(0.016, &context(), &mut pose);
        }
        assert_eq!(camera.distance(), MIN_DISTANCE);

        camera.on_action(CameraAction::Zoom(1), false);
        camera.on_action(CameraAction::Orbit(1), true);
        camera.update(0.5, &context(), &mut pose);
        assert_eq!(camera.distance(), MIN_DISTANCE);
        assert!(pose.location.distance(PIVOT) - MIN_DISTANCE < 1e-3);
    }
}
