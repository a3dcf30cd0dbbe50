use std::collections::HashSet;

use crate::math::Vec3;

use super::{
    angles::{self, CameraAngle},
    CameraAction, CameraContext, CameraKind, CameraPlugin, CameraPose, MoveDirection,
};

/// Desktop camera: jumps between the numbered angles and flies freely while
/// movement keys are held.
#[derive(Debug)]
pub struct FreeCam {
    move_speed: f32,
    category: u8,
    index: usize,
    target: CameraPose,
    held: HashSet<MoveDirection>,
    active: bool,
}

impl FreeCam {
    pub fn new(move_speed: f32) -> Self {
        Self {
            move_speed,
            category: 1,
            index: 0,
            target: angles::default_angle().pose(),
            held: HashSet::new(),
            active: false,
        }
    }

    /// Currently selected angle category and index within it.
    pub fn selection(&self) -> (u8, usize) {
        (self.category, self.index)
    }

    fn select_category(&mut self, category: u8) {
        if category == self.category {
            let count = angles::category(category).count();
            self.index = if self.index + 1 >= count { 0 } else { self.index + 1 };
        } else if angles::category(category).next().is_some() {
            self.category = category;
            self.index = 0;
        }
    }

    fn selected_angle(&self) -> Option<&'static CameraAngle> {
        angles::category(self.category).nth(self.index)
    }

    fn apply_angle(&mut self) {
        if let Some(angle) = self.selected_angle() {
            self.target = angle.pose();
        }
    }

    fn velocity(&self) -> Vec3 {
        let forward = self.target.forward();
        let right = self.target.right();
        self.held.iter().fold(Vec3::ZERO, |velocity, direction| {
            velocity
                + match direction {
                    MoveDirection::Forward => forward,
                    MoveDirection::Backward => -forward,
                    MoveDirection::Right => right,
                    MoveDirection::Left => -right,
                    MoveDirection::Up => Vec3::UNIT_Y,
                    MoveDirection::Down => -Vec3::UNIT_Y,
                }
        })
    }
}

impl CameraPlugin for FreeCam {
    fn kind(&self) -> CameraKind {
        CameraKind::Free
    }

    fn activate(&mut self, pose: CameraPose) {
        self.active = true;
        self.target = pose;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.held.clear();
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, tpf: f32, _context: &CameraContext, pose: &mut CameraPose) {
        if !self.held.is_empty() {
            self.target.location += self.velocity() * (self.move_speed * tpf);
        }
        *pose = self.target;
    }

    fn on_action(&mut self, action: CameraAction, pressed: bool) {
        match action {
            CameraAction::Move(direction) => {
                if pressed {
                    self.held.insert(direction);
                } else {
                    self.held.remove(&direction);
                }
            }
            CameraAction::SwitchToFreeCam if pressed => {
                self.category = 1;
                self.index = 0;
                self.apply_angle();
            }
            CameraAction::MoveToCameraAngle(category) if pressed => {
                self.select_category(category);
                self.apply_angle();
            }
            _ => {}
        }
    }

    fn owns(&self, action: CameraAction) -> bool {
        matches!(
            action,
            CameraAction::SwitchToFreeCam | CameraAction::MoveToCameraAngle(_) | CameraAction::Move(_)
        )
    }
}
