use std::time::Duration;

use crate::{
    animation::Frame,
    collector::EventCollector,
    math::{Transform, Vec3},
    render::{NodeId, Scene},
    sequence::NoteEvent,
};

const DEFAULT_DEPTH: f32 = 1.0;
const DEFAULT_RETURN_RATE: f32 = 10.0;
const REST_THRESHOLD: f32 = 1e-4;

/// Bounded-duration displacement of a struck body (a mallet bar, a drum
/// shell). A hit pushes the node down in proportion to velocity and the
/// displacement decays exponentially from the time of the hit.
///
/// The pose is read from the hit collector every frame, so after a seek the
/// body is exactly where a straight run would have left it.
#[derive(Debug, Clone)]
pub struct Recoil {
    node: NodeId,
    rest: Transform,
    hits: EventCollector<NoteEvent>,
    depth: f32,
    return_rate: f32,
    displacement: f32,
}

impl Recoil {
    pub fn new(node: NodeId, rest: Transform, hits: EventCollector<NoteEvent>) -> Self {
        Self {
            node,
            rest,
            hits,
            depth: DEFAULT_DEPTH,
            return_rate: DEFAULT_RETURN_RATE,
            displacement: 0.0,
        }
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn displacement(&self) -> f32 {
        self.displacement
    }

    pub fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) {
        self.hits.advance_to(frame.time);
        self.displacement = self.displacement_at(frame.time);

        let mut transform = self.rest;
        transform.translation += Vec3::new(0.0, -self.displacement, 0.0);
        scene.set_transform(self.node, transform);
    }

    pub fn seek(&mut self, time: Duration) {
        self.hits.reset(time);
        self.displacement = 0.0;
    }

    fn displacement_at(&self, time: Duration) -> f32 {
        let Some(hit) = self.hits.prev() else {
            return 0.0;
        };
        let elapsed = time.saturating_sub(hit.time).as_secs_f32();
        let displacement = self.depth * velocity_ramp(hit.event.velocity) * (-self.return_rate * elapsed).exp();
        if displacement < REST_THRESHOLD {
            0.0
        } else {
            displacement
        }
    }
}

/// Softens the response to quiet hits and saturates for loud ones.
fn velocity_ramp(velocity: u8) -> f32 {
    (f32::from(velocity.min(127)) / 127.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render::RenderGraph, sequence::Timed};

    fn frame(ms: u64) -> Frame {
        Frame::new(Duration::from_millis(ms), 0, 1.0 / 60.0)
    }

    fn hits(times_ms: &[u64]) -> EventCollector<NoteEvent> {
        let events: Vec<_> = times_ms
            .iter()
            .map(|ms| Timed::new(Duration::from_millis(*ms), NoteEvent::hit(0, 60, 127)))
            .collect();
        EventCollector::new(events)
    }

    #[test]
    fn hit_displaces_then_settles() {
        let mut scene = RenderGraph::new();
        let node = scene.spawn("bar");
        let rest = Transform::from_translation(Vec3::new(0.0, 5.0, 0.0));
        let mut recoil = Recoil::new(node, rest, hits(&[100]));

        recoil.update(&frame(50), &mut scene);
        assert_eq!(recoil.displacement(), 0.0);

        recoil.update(&frame(100), &mut scene);
        assert_eq!(recoil.displacement(), 1.0);

        recoil.update(&frame(116), &mut scene);
        let y = scene.node(node).unwrap().transform.translation.y;
        assert!(y < 5.0 && y > 4.0);

        recoil.update(&frame(2100), &mut scene);
        assert_eq!(recoil.displacement(), 0.0);
        assert_eq!(scene.node(node).unwrap().transform.translation.y, 5.0);
    }

    #[test]
    fn seek_lands_on_the_same_pose_as_playing_through() {
        let mut scene = RenderGraph::new();
        let node = scene.spawn("shell");
        let mut played = Recoil::new(node, Transform::default(), hits(&[100, 400]));
        for ms in (0..=450).step_by(16) {
            played.update(&frame(ms), &mut scene);
        }
        played.update(&frame(450), &mut scene);

        let mut seeked = Recoil::new(node, Transform::default(), hits(&[100, 400]));
        seeked.update(&frame(1500), &mut scene);
        seeked.seek(Duration::from_millis(450));
        seeked.update(&frame(450), &mut scene);

        assert!(played.displacement() > 0.0);
        assert_eq!(seeked.displacement(), played.displacement());
    }

    #[test]
    fn louder_hits_go_deeper() {
        assert!(velocity_ramp(30) < velocity_ramp(100));
        assert_eq!(velocity_ramp(0), 0.0);
    }
}
