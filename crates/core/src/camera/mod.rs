//! Camera state machine.
//!
//! A [`CameraManager`] owns a fixed set of [`CameraPlugin`]s and keeps exactly
//! one of them current. Discrete input actions are routed to the current
//! plugin; some of them first force a switch to the plugin that owns them.

mod angles;
mod auto;
mod free;
mod orbiting;
mod rotating;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use angles::{category, default_angle, CameraAngle, ANGLES, CATEGORY_COUNT};
pub use auto::AutoCam;
pub use free::FreeCam;
pub use orbiting::OrbitingCam;
pub use rotating::{RotatingCam, SlideCam};

use crate::{config::CameraConfig, math::Vec3, Result};

/// The camera may not leave this box around the stage.
pub const STAGE_BOUNDS: Vec3 = Vec3::new(400.0, 432.0, 400.0);
const DEFAULT_FOV: f32 = 50.0;

/// Where the camera is and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub location: Vec3,
    /// Pitch, yaw and roll in radians. Zero yaw faces +Z; positive pitch
    /// looks down.
    pub rotation: Vec3,
    pub fov: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            location: Vec3::new(-2.0, 92.0, 134.0),
            rotation: Vec3::new(18.44f32.to_radians(), std::f32::consts::PI, 0.0),
            fov: DEFAULT_FOV,
        }
    }
}

impl CameraPose {
    pub fn looking_at(location: Vec3, target: Vec3) -> Self {
        let direction = target - location;
        let horizontal = (direction.x * direction.x + direction.z * direction.z).sqrt();
        Self {
            location,
            rotation: Vec3::new(
                (-direction.y).atan2(horizontal),
                direction.x.atan2(direction.z),
                0.0,
            ),
            fov: DEFAULT_FOV,
        }
    }

    /// Interpolates location linearly and each angle along its shortest path.
    pub fn lerp(self, target: Self, factor: f32) -> Self {
        Self {
            location: self.location.lerp(target.location, factor),
            rotation: Vec3::new(
                lerp_angle(self.rotation.x, target.rotation.x, factor),
                lerp_angle(self.rotation.y, target.rotation.y, factor),
                lerp_angle(self.rotation.z, target.rotation.z, factor),
            ),
            fov: self.fov + (target.fov - self.fov) * factor,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (pitch, yaw) = (self.rotation.x, self.rotation.y);
        Vec3::new(yaw.sin() * pitch.cos(), -pitch.sin(), yaw.cos() * pitch.cos())
    }

    pub fn right(&self) -> Vec3 {
        let yaw = self.rotation.y;
        Vec3::new(-yaw.cos(), 0.0, yaw.sin())
    }
}

fn lerp_angle(from: f32, to: f32, factor: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let delta = (to - from + PI).rem_euclid(TAU) - PI;
    from + delta * factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraKind {
    Free,
    Auto,
    Rotating,
    Slide,
    Orbiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Discrete input understood by the camera system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraAction {
    SwitchToFreeCam,
    SwitchToAutoCam,
    SwitchToRotatingCam,
    SwitchToSlideCam,
    /// One of the numbered angle categories, `1..=6`.
    MoveToCameraAngle(u8),
    Move(MoveDirection),
    Pan(i8),
    Zoom(i8),
    Orbit(i8),
}

impl CameraAction {
    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "camera_plugin_free" => Self::SwitchToFreeCam,
            "camera_plugin_auto" => Self::SwitchToAutoCam,
            "camera_plugin_rotating" => Self::SwitchToRotatingCam,
            "camera_plugin_slide" => Self::SwitchToSlideCam,
            "move_forward" => Self::Move(MoveDirection::Forward),
            "move_backward" => Self::Move(MoveDirection::Backward),
            "move_left" => Self::Move(MoveDirection::Left),
            "move_right" => Self::Move(MoveDirection::Right),
            "move_up" => Self::Move(MoveDirection::Up),
            "move_down" => Self::Move(MoveDirection::Down),
            "pan_left" => Self::Pan(-1),
            "pan_right" => Self::Pan(1),
            "zoom_in" => Self::Zoom(1),
            "zoom_out" => Self::Zoom(-1),
            "orbit_left" => Self::Orbit(-1),
            "orbit_right" => Self::Orbit(1),
            other => {
                let category = other.strip_prefix("camera_angle_")?.parse().ok()?;
                if !(1..=CATEGORY_COUNT).contains(&category) {
                    return None;
                }
                Self::MoveToCameraAngle(category)
            }
        };
        Some(action)
    }
}

/// Performance state visible to camera plugins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraContext {
    pub time: Duration,
    pub duration: Duration,
}

impl CameraContext {
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.time)
    }
}

pub trait CameraPlugin: Send {
    fn kind(&self) -> CameraKind;

    /// Called when the plugin becomes current, with the pose it takes over.
    fn activate(&mut self, pose: CameraPose);

    fn deactivate(&mut self);

    fn is_active(&self) -> bool;

    fn update(&mut self, tpf: f32, context: &CameraContext, pose: &mut CameraPose);

    fn on_action(&mut self, action: CameraAction, pressed: bool);

    /// Whether pressing `action` should make this plugin current.
    fn owns(&self, _action: CameraAction) -> bool {
        false
    }

    fn seek(&mut self, _time: Duration) {}
}

/// Plugin types addressable by type in [`CameraManager::set_current_plugin`].
pub trait KnownCamera {
    const KIND: CameraKind;
}

impl KnownCamera for AutoCam {
    const KIND: CameraKind = CameraKind::Auto;
}

impl KnownCamera for FreeCam {
    const KIND: CameraKind = CameraKind::Free;
}

impl KnownCamera for RotatingCam {
    const KIND: CameraKind = CameraKind::Rotating;
}

impl KnownCamera for SlideCam {
    const KIND: CameraKind = CameraKind::Slide;
}

impl KnownCamera for OrbitingCam {
    const KIND: CameraKind = CameraKind::Orbiting;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

/// The camera a user on `platform` steers by hand.
pub fn device_camera_plugin(platform: Platform, config: &CameraConfig) -> Box<dyn CameraPlugin> {
    match platform {
        Platform::Desktop => Box::new(FreeCam::new(config.free_cam_move_speed)),
        Platform::Mobile => Box::new(OrbitingCam::new()),
    }
}

pub struct CameraManager {
    plugins: Vec<Box<dyn CameraPlugin>>,
    current: usize,
    pose: CameraPose,
}

impl CameraManager {
    /// Registers the device plugin for `platform` followed by the auto,
    /// rotating and slide cameras.
    pub fn new(platform: Platform, config: &CameraConfig, duration: Duration) -> Self {
        let plugins: Vec<Box<dyn CameraPlugin>> = vec![
            device_camera_plugin(platform, config),
            Box::new(AutoCam::new(duration, config)),
            Box::new(RotatingCam::new()),
            Box::new(SlideCam::new()),
        ];
        let start = if config.start_with_auto_cam {
            CameraKind::Auto
        } else {
            plugins[0].kind()
        };

        let mut manager = Self {
            plugins,
            current: 0,
            pose: CameraPose::default(),
        };
        manager.current = manager.index_of(start).unwrap_or(0);
        manager.activate_current();
        manager
    }

    /// Builds a manager over an explicit plugin set. `start` must be one of
    /// the registered kinds.
    pub fn with_plugins(plugins: Vec<Box<dyn CameraPlugin>>, start: CameraKind) -> Result<Self> {
        let current = plugins
            .iter()
            .position(|plugin| plugin.kind() == start)
            .ok_or_else(|| crate::PerformanceError::msg(format!("no {start:?} camera registered")))?;

        let mut manager = Self {
            plugins,
            current,
            pose: CameraPose::default(),
        };
        manager.activate_current();
        Ok(manager)
    }

    pub fn current_kind(&self) -> CameraKind {
        self.plugins[self.current].kind()
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn plugins(&self) -> impl Iterator<Item = &dyn CameraPlugin> {
        self.plugins.iter().map(|plugin| plugin.as_ref())
    }

    pub fn is_registered(&self, kind: CameraKind) -> bool {
        self.index_of(kind).is_some()
    }

    pub fn set_current_plugin<T: KnownCamera>(&mut self) -> bool {
        self.set_current(T::KIND)
    }

    /// Makes `kind` current. Switching to the current plugin is a no-op;
    /// switching to an unregistered one is ignored and returns false.
    pub fn set_current(&mut self, kind: CameraKind) -> bool {
        let Some(index) = self.index_of(kind) else {
            tracing::debug!(?kind, "camera plugin not registered on this device");
            return false;
        };
        if index != self.current {
            self.plugins[self.current].deactivate();
            self.current = index;
            self.activate_current();
            tracing::debug!(?kind, "camera plugin switched");
        }
        true
    }

    pub fn on_action(&mut self, name: &str, pressed: bool) {
        let Some(action) = CameraAction::from_name(name) else {
            tracing::debug!(name, "ignoring unknown camera action");
            return;
        };

        if pressed {
            match action {
                CameraAction::SwitchToAutoCam => {
                    self.set_current(CameraKind::Auto);
                }
                CameraAction::SwitchToRotatingCam => {
                    self.set_current(CameraKind::Rotating);
                }
                CameraAction::SwitchToSlideCam => {
                    self.set_current(CameraKind::Slide);
                }
                _ => {
                    let owner = self
                        .plugins
                        .iter()
                        .find(|plugin| plugin.owns(action))
                        .map(|plugin| plugin.kind());
                    match owner {
                        Some(kind) => {
                            self.set_current(kind);
                        }
                        None => {
                            tracing::debug!(?action, "no camera plugin handles action");
                            return;
                        }
                    }
                }
            }
        }

        self.plugins[self.current].on_action(action, pressed);
    }

    pub fn update(&mut self, tpf: f32, context: &CameraContext) -> CameraPose {
        self.plugins[self.current].update(tpf, context, &mut self.pose);
        self.pose.location = self.pose.location.clamp_abs(STAGE_BOUNDS);
        self.pose
    }

    pub fn seek(&mut self, time: Duration) {
        for plugin in &mut self.plugins {
            plugin.seek(time);
        }
    }

    fn index_of(&self, kind: CameraKind) -> Option<usize> {
        self.plugins.iter().position(|plugin| plugin.kind() == kind)
    }

    fn activate_current(&mut self) {
        let pose = self.pose;
        self.plugins[self.current].activate(pose);
    }
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("current", &self.current_kind())
            .field("pose", &self.pose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    struct Probe {
        kind: CameraKind,
        active: bool,
        deactivations: Arc<AtomicUsize>,
    }

    impl Probe {
        fn boxed(kind: CameraKind, deactivations: &Arc<AtomicUsize>) -> Box<dyn CameraPlugin> {
            Box::new(Self {
                kind,
                active: false,
                deactivations: Arc::clone(deactivations),
            })
        }
    }

    impl CameraPlugin for Probe {
        fn kind(&self) -> CameraKind {
            self.kind
        }

        fn activate(&mut self, _pose: CameraPose) {
            self.active = true;
        }

        fn deactivate(&mut self) {
            self.active = false;
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn update(&mut self, _tpf: f32, _context: &CameraContext, pose: &mut CameraPose) {
            pose.location = Vec3::new(1000.0, -1000.0, 5.0);
        }

        fn on_action(&mut self, _action: CameraAction, _pressed: bool) {}
    }

    fn active_count(manager: &CameraManager) -> usize {
        manager.plugins().filter(|plugin| plugin.is_active()).count()
    }

    #[test]
    fn exactly_one_plugin_is_active_across_switches() {
        let deactivations = Arc::new(AtomicUsize::new(0));
        let plugins = vec![
            Probe::boxed(CameraKind::Free, &deactivations),
            Probe::boxed(CameraKind::Auto, &deactivations),
            Probe::boxed(CameraKind::Rotating, &deactivations),
        ];
        let mut manager = CameraManager::with_plugins(plugins, CameraKind::Free).unwrap();
        assert_eq!(active_count(&manager), 1);

        let switches = [
            CameraKind::Auto,
            CameraKind::Auto,
            CameraKind::Rotating,
            CameraKind::Free,
            CameraKind::Free,
        ];
        for kind in switches {
            assert!(manager.set_current(kind));
            assert_eq!(manager.current_kind(), kind);
            assert_eq!(active_count(&manager), 1);
        }

        // Two of the five requests were no-ops.
        assert_eq!(deactivations.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unregistered_plugin_is_ignored() {
        let deactivations = Arc::new(AtomicUsize::new(0));
        let plugins = vec![Probe::boxed(CameraKind::Free, &deactivations)];
        let mut manager = CameraManager::with_plugins(plugins, CameraKind::Free).unwrap();

        assert!(!manager.set_current_plugin::<SlideCam>());
        manager.on_action("camera_plugin_slide", true);
        manager.on_action("no_such_action", true);

        assert_eq!(manager.current_kind(), CameraKind::Free);
        assert_eq!(deactivations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn free_cam_keys_force_a_switch() {
        let mut manager = CameraManager::new(Platform::Desktop, &CameraConfig::default(), Duration::from_secs(60));
        manager.set_current_plugin::<RotatingCam>();

        manager.on_action("camera_angle_2", true);
        assert_eq!(manager.current_kind(), CameraKind::Free);

        let context = CameraContext {
            time: Duration::ZERO,
            duration: Duration::from_secs(60),
        };
        let pose = manager.update(1.0 / 60.0, &context);
        assert_eq!(pose.location, Vec3::new(0.0, 71.8, 44.5));
    }

    #[test]
    fn mobile_has_no_angle_keys() {
        let mut manager = CameraManager::new(Platform::Mobile, &CameraConfig::default(), Duration::from_secs(60));
        manager.set_current_plugin::<AutoCam>();

        manager.on_action("camera_angle_3", true);
        assert_eq!(manager.current_kind(), CameraKind::Auto);

        manager.on_action("orbit_left", true);
        assert_eq!(manager.current_kind(), CameraKind::Orbiting);
    }

    #[test]
    fn starts_with_auto_cam_when_configured() {
        let config = CameraConfig {
            start_with_auto_cam: true,
            ..CameraConfig::default()
        };
        let manager = CameraManager::new(Platform::Desktop, &config, Duration::from_secs(60));
        assert_eq!(manager.current_kind(), CameraKind::Auto);
        assert_eq!(active_count(&manager), 1);
    }

    #[test]
    fn pose_is_kept_inside_the_stage() {
        let deactivations = Arc::new(AtomicUsize::new(0));
        let plugins = vec![Probe::boxed(CameraKind::Free, &deactivations)];
        let mut manager = CameraManager::with_plugins(plugins, CameraKind::Free).unwrap();
        let context = CameraContext {
            time: Duration::ZERO,
            duration: Duration::ZERO,
        };

        let pose = manager.update(0.1, &context);
        assert_eq!(pose.location, Vec3::new(400.0, -432.0, 5.0));
    }

    #[test]
    fn parses_action_names() {
        assert_eq!(
            CameraAction::from_name("camera_angle_6"),
            Some(CameraAction::MoveToCameraAngle(6))
        );
        assert_eq!(CameraAction::from_name("camera_angle_7"), None);
        assert_eq!(CameraAction::from_name("zoom_out"), Some(CameraAction::Zoom(-1)));
        assert_eq!(CameraAction::from_name(""), None);
    }

    #[test]
    fn looking_at_matches_home_angle() {
        let pose = CameraPose::looking_at(Vec3::new(-2.0, 92.0, 134.0), Vec3::new(-2.0, 47.32, 0.0));
        let home = default_angle().pose();
        assert!((pose.rotation.x - home.rotation.x).abs() < 0.01);
        assert!((pose.rotation.y - home.rotation.y).abs() < 1e-5);
    }
}
