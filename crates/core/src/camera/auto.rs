use std::time::Duration;

use crate::{collector::EventCollector, config::CameraConfig, sequence::Timed};

use super::{
    angles::{default_angle, ANGLES},
    CameraAction, CameraContext, CameraKind, CameraPlugin, CameraPose,
};

/// Stride through the angle table between cues. Coprime with the table size
/// so every angle is used before any repeats.
const ANGLE_STRIDE: usize = 5;
/// Every third cue cuts instead of gliding.
const JUMP_CUT_EVERY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CameraCue {
    angle: usize,
    jump_cut: bool,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: CameraPose,
    factor: f32,
}

/// Cuts between the predefined angles on a script laid over the piece.
///
/// The cue list is built once from the piece duration; during playback it is
/// walked with an [`EventCollector`], so seeking re-derives the current angle
/// the same way instruments re-derive their state.
#[derive(Debug)]
pub struct AutoCam {
    cues: EventCollector<CameraCue>,
    transition_speed: f32,
    target: CameraPose,
    transition: Option<Transition>,
    active: bool,
}

impl AutoCam {
    pub fn new(duration: Duration, config: &CameraConfig) -> Self {
        let transition_speed = config.transition_speed.max(f32::EPSILON);
        let transition = Duration::try_from_secs_f32(1.0 / transition_speed).unwrap_or(Duration::ZERO);
        Self {
            cues: EventCollector::new(script(duration, config.auto_cam_idle(), transition)),
            transition_speed,
            target: default_angle().pose(),
            transition: None,
            active: false,
        }
    }

    pub fn cue_count(&self) -> usize {
        self.cues.events().len()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    fn start_cue(&mut self, cue: CameraCue, current: CameraPose) {
        self.target = ANGLES[cue.angle].pose();
        self.transition = (!cue.jump_cut).then_some(Transition {
            from: current,
            factor: 0.0,
        });
    }

    fn angle_at_cursor(&self) -> CameraPose {
        self.cues
            .prev()
            .map_or_else(|| default_angle().pose(), |cue| ANGLES[cue.event.angle].pose())
    }
}

impl CameraPlugin for AutoCam {
    fn kind(&self) -> CameraKind {
        CameraKind::Auto
    }

    fn activate(&mut self, pose: CameraPose) {
        self.active = true;
        self.target = self.angle_at_cursor();
        self.transition = Some(Transition { from: pose, factor: 0.0 });
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, tpf: f32, context: &CameraContext, pose: &mut CameraPose) {
        let fired = self.cues.advance_to(context.time).last().map(|cue| cue.event);
        if let Some(cue) = fired {
            self.start_cue(cue, *pose);
        }

        *pose = match &mut self.transition {
            Some(transition) => {
                transition.factor = (transition.factor + tpf * self.transition_speed).min(1.0);
                let blended = transition.from.lerp(self.target, transition.factor);
                if transition.factor >= 1.0 {
                    self.transition = None;
                }
                blended
            }
            None => self.target,
        };
    }

    fn on_action(&mut self, action: CameraAction, pressed: bool) {
        // Pressing the auto-cam key while holding an angle skips ahead to the
        // next scripted cue.
        if pressed && action == CameraAction::SwitchToAutoCam && self.transition.is_none() {
            if let Some(next) = self.cues.peek().map(|cue| cue.event) {
                let current = self.target;
                self.start_cue(CameraCue { jump_cut: false, ..next }, current);
            }
        }
    }

    fn seek(&mut self, time: Duration) {
        self.cues.reset(time);
        self.transition = None;
        self.target = self.angle_at_cursor();
    }
}

/// Lays cues out every `idle + transition` from the first idle period on.
fn script(duration: Duration, idle: Duration, transition: Duration) -> Vec<Timed<CameraCue>> {
    let step = idle.saturating_add(transition);
    if step.is_zero() {
        return Vec::new();
    }

    let mut cues = Vec::new();
    let mut time = idle;
    let mut angle = 0;
    while time < duration {
        angle = (angle + ANGLE_STRIDE) % ANGLES.len();
        let jump_cut = cues.len() % JUMP_CUT_EVERY == JUMP_CUT_EVERY - 1;
        cues.push(Timed::new(time, CameraCue { angle, jump_cut }));
        let Some(next) = time.checked_add(step) else {
            break;
        };
        time = next;
    }
    cues
}
