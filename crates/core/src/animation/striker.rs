use std::time::Duration;

use crate::{
    collector::EventCollector,
    math::{ease_out_cubic, lerp, map_range_clamped, Transform, Vec3},
    render::{NodeId, Scene},
    sequence::NoteEvent,
};

use super::Frame;

const DEFAULT_STRIKE_SPEED: f32 = 3.0;
const MAX_IDLE_ANGLE_DEGREES: f64 = 50.0;
const LIFT_HEIGHT: f64 = 2.0;
/// Length of the blend used by [`StrikePolicy::Ease`], in seconds.
const EASE_SECONDS: f64 = 0.15;
const REST: f64 = 1.0;

/// What happens when a new hit lands while the previous recoil is still
/// playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrikePolicy {
    /// Snap straight into the new strike (percussion).
    #[default]
    Restart,
    /// Blend from the current pose into the new one (sustained instruments).
    Ease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityBehavior {
    /// Only while winding up for or recoiling from a hit.
    OnlyNecessary,
    /// Also between hits that are close together.
    #[default]
    BetweenHits,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikerParameters {
    pub strike_speed: f32,
    /// Raise the stick higher before loud hits.
    pub strike_lift: bool,
    pub visibility: VisibilityBehavior,
    pub policy: StrikePolicy,
    /// Pose of the striker at rest.
    pub rest: Transform,
}

impl Default for StrikerParameters {
    fn default() -> Self {
        Self {
            strike_speed: DEFAULT_STRIKE_SPEED,
            strike_lift: true,
            visibility: VisibilityBehavior::default(),
            policy: StrikePolicy::default(),
            rest: Transform::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Blend {
    from: f64,
    started: Duration,
}

/// Stick, mallet or bow that winds up before each hit and recoils after it.
///
/// The pose is a pure function of the time to the next hit and the time since
/// the previous one, both read from the collector each frame. `rotation` is
/// `1.0` at rest and `0.0` at the moment of impact.
#[derive(Debug)]
pub struct Striker {
    node: NodeId,
    collector: EventCollector<NoteEvent>,
    parameters: StrikerParameters,
    ticks_per_quarter: u16,
    anticipation: f64,
    recoil: f64,
    rotation: f64,
    visible: bool,
    blend: Option<Blend>,
}

impl Striker {
    pub fn new(
        node: NodeId,
        collector: EventCollector<NoteEvent>,
        ticks_per_quarter: u16,
        parameters: StrikerParameters,
    ) -> Self {
        let speed = f64::from(parameters.strike_speed.max(f32::EPSILON) / DEFAULT_STRIKE_SPEED);
        Self {
            node,
            collector,
            parameters,
            ticks_per_quarter,
            anticipation: 0.22 * speed,
            recoil: 0.45 * speed,
            rotation: REST,
            visible: false,
            blend: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) -> Option<NoteEvent> {
        self.update_gated(frame, scene, true)
    }

    /// Like [`Self::update`], but hidden regardless of its own rules when
    /// `gate` is false (e.g. the owning instance is hidden).
    ///
    /// Returns the hit that landed this frame, if any.
    pub fn update_gated(&mut self, frame: &Frame, scene: &mut dyn Scene, gate: bool) -> Option<NoteEvent> {
        let strike = self.collector.advance_one(frame.time).map(|timed| timed.event);

        let time = frame.time.as_secs_f64();
        let last = self.collector.prev().map(|prev| prev.time.as_secs_f64());
        let next = self.collector.peek().map(|next| next.time.as_secs_f64());

        self.visible = gate && self.calculate_visibility(time, next, last);
        let target = if self.visible {
            let velocity = self.collector.peek().map_or(0, |next| next.event.velocity);
            self.evaluate_rotation(time, next, last, velocity)
        } else {
            REST
        };

        if strike.is_some()
            && self.parameters.policy == StrikePolicy::Ease
            && self.rotation < REST - f64::EPSILON
        {
            self.blend = Some(Blend {
                from: self.rotation,
                started: frame.time,
            });
        }

        self.rotation = match self.blend {
            Some(blend) => {
                let factor = (frame.time.saturating_sub(blend.started)).as_secs_f64() / EASE_SECONDS;
                if factor >= 1.0 {
                    self.blend = None;
                    target
                } else {
                    lerp(blend.from, target, f64::from(ease_out_cubic(factor as f32)))
                }
            }
            None => target,
        };

        self.apply(scene);
        strike
    }

    pub fn seek(&mut self, time: Duration) {
        self.collector.reset(time);
        self.blend = None;
        self.rotation = REST;
    }

    fn apply(&self, scene: &mut dyn Scene) {
        let rest = self.parameters.rest;
        let lift = if self.parameters.strike_lift {
            (self.rotation * LIFT_HEIGHT) as f32
        } else {
            0.0
        };
        let angle = (self.rotation * MAX_IDLE_ANGLE_DEGREES).to_radians() as f32;
        let transform = Transform {
            translation: rest.translation + Vec3::new(0.0, lift, 0.0),
            rotation: rest.rotation + Vec3::new(angle, 0.0, 0.0),
            scale: rest.scale,
        };

        scene.set_visible(self.node, self.visible);
        scene.set_transform(self.node, transform);
    }

    fn calculate_visibility(&self, time: f64, next: Option<f64>, last: Option<f64>) -> bool {
        match self.parameters.visibility {
            VisibilityBehavior::Always => true,
            VisibilityBehavior::OnlyNecessary => self.simple_visibility(time, next, last),
            VisibilityBehavior::BetweenHits => {
                self.simple_visibility(time, next, last) || self.hits_are_close(next, last)
            }
        }
    }

    fn simple_visibility(&self, time: f64, next: Option<f64>, last: Option<f64>) -> bool {
        let anticipating = next.is_some_and(|next| next - time < self.anticipation);
        let recoiling = last.is_some_and(|last| time - last < self.recoil);
        anticipating || recoiling
    }

    fn hits_are_close(&self, next: Option<f64>, last: Option<f64>) -> bool {
        let (Some(next_time), Some(last_time)) = (next, last) else {
            return false;
        };
        let (Some(peek), Some(prev)) = (self.collector.peek(), self.collector.prev()) else {
            return false;
        };
        let tick_span = peek.event.start_tick.saturating_sub(prev.event.start_tick) as f64;
        tick_span <= f64::from(self.ticks_per_quarter) * 2.1 || next_time - last_time < 2.0
    }

    fn evaluate_rotation(&self, time: f64, next: Option<f64>, last: Option<f64>, velocity: u8) -> f64 {
        let strike_index = next.map_or(0.0, |next| {
            1.0 - (next - time).min(self.anticipation) / self.anticipation
        });
        let weak = weak_strike_curve(strike_index);
        let strike = if self.parameters.strike_lift {
            lerp(weak, strong_strike_curve(strike_index), f64::from(velocity) / 127.0)
        } else {
            weak
        };

        let recoil_index = last.map_or(0.0, |last| (time - last) / self.recoil);
        let recoil = recoil_curve(recoil_index);

        match (next, last) {
            (Some(next), Some(last)) => lerp(recoil, strike, map_range_clamped(time, last, next, 0.0, 1.0)),
            (Some(_), None) => strike,
            (None, Some(_)) => recoil,
            (None, None) => REST,
        }
    }
}

fn recoil_curve(index: f64) -> f64 {
    2.0 / (1.0 + (-10.0 * index).exp()) - 1.0
}

fn strong_strike_curve(index: f64) -> f64 {
    const A: f64 = 0.5;
    const B: f64 = 5.55;
    const C: f64 = 1.0;
    if index < 0.0 {
        1.0
    } else if index < 0.4 {
        A + A * (std::f64::consts::PI * (index - 0.2) / 0.4).sin() + C
    } else if index < 1.0 {
        -B * (index - 0.4).powi(2) + C + 2.0 * A
    } else {
        0.0
    }
}

fn weak_strike_curve(index: f64) -> f64 {
    if index < 0.4 {
        1.0
    } else if index < 1.0 {
        1.0 - 2.7777 * (index - 0.4).powi(2)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render::RenderGraph, sequence::Timed};

    fn hits(times_ms: &[u64]) -> EventCollector<NoteEvent> {
        let events: Vec<_> = times_ms
            .iter()
            .map(|ms| Timed::new(Duration::from_millis(*ms), NoteEvent::hit(ms * 480 / 500, 38, 100)))
            .collect();
        EventCollector::new(events)
    }

    fn frame(ms: u64) -> Frame {
        Frame::new(Duration::from_millis(ms), ms * 480 / 500, 1.0 / 60.0)
    }

    fn striker(scene: &mut RenderGraph, times_ms: &[u64], policy: StrikePolicy) -> Striker {
        let node = scene.spawn("stick");
        let parameters = StrikerParameters {
            policy,
            ..Default::default()
        };
        Striker::new(node, hits(times_ms), 480, parameters)
    }

    #[test]
    fn rests_hidden_far_from_hits() {
        let mut scene = RenderGraph::new();
        let mut striker = striker(&mut scene, &[10_000], StrikePolicy::Restart);

        assert!(striker.update(&frame(0), &mut scene).is_none());

        assert!(!striker.is_visible());
        assert_eq!(striker.rotation(), REST);
        assert!(!scene.node(striker.node()).unwrap().visible);
    }

    #[test]
    fn reaches_impact_on_the_hit() {
        let mut scene = RenderGraph::new();
        let mut striker = striker(&mut scene, &[500, 1000], StrikePolicy::Restart);

        striker.update(&frame(400), &mut scene);
        let hit = striker.update(&frame(500), &mut scene);

        assert_eq!(hit.map(|note| note.note), Some(38));
        assert!(striker.is_visible());
        assert!(striker.rotation().abs() < 1e-9);
    }

    #[test]
    fn winds_up_before_the_hit() {
        let mut scene = RenderGraph::new();
        let mut striker = striker(&mut scene, &[1000], StrikePolicy::Restart);

        striker.update(&frame(900), &mut scene);
        let early = striker.rotation();
        striker.update(&frame(990), &mut scene);

        assert!(striker.is_visible());
        assert!(striker.rotation() < early);
    }

    #[test]
    fn ease_policy_blends_into_overlapping_strike() {
        let mut scene = RenderGraph::new();
        let mut restart = striker(&mut scene, &[500, 600], StrikePolicy::Restart);
        let mut ease = striker(&mut scene, &[500, 600], StrikePolicy::Ease);

        for ms in [500, 590, 600] {
            restart.update(&frame(ms), &mut scene);
            ease.update(&frame(ms), &mut scene);
        }

        assert!(restart.rotation().abs() < 1e-9);
        assert!(ease.rotation() > 0.2);

        restart.update(&frame(800), &mut scene);
        ease.update(&frame(800), &mut scene);
        assert!((restart.rotation() - ease.rotation()).abs() < 1e-9);
    }

    #[test]
    fn seek_returns_to_rest() {
        let mut scene = RenderGraph::new();
        let mut striker = striker(&mut scene, &[500, 5000], StrikePolicy::Ease);
        striker.update(&frame(500), &mut scene);

        striker.seek(Duration::from_millis(4000));

        assert_eq!(striker.rotation(), REST);
        assert!(striker.update(&frame(4000), &mut scene).is_none());
    }

    #[test]
    fn curves_meet_at_rest_and_impact() {
        assert_eq!(weak_strike_curve(0.0), 1.0);
        assert_eq!(weak_strike_curve(1.0), 0.0);
        assert!((strong_strike_curve(0.0) - 1.0).abs() < 1e-9);
        assert_eq!(recoil_curve(0.0), 0.0);
        assert!(recoil_curve(1.0) > 0.99);
    }
}
