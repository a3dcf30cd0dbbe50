use std::time::Duration;

use crate::{
    collector::EventCollector,
    math::{Transform, Vec3},
    render::{NodeId, Scene},
    sequence::NoteEvent,
};

use super::Frame;

/// Moves one striking object (a mallet) between consecutive note positions.
///
/// Between the previously fired note and the next one the object follows a
/// parabolic arc from the old position to the new, timed so that it lands on
/// the new position exactly at the next note's start time.
pub struct ArcMotion {
    node: NodeId,
    collector: EventCollector<NoteEvent>,
    position_of: Box<dyn Fn(u8) -> Vec3 + Send>,
    rest: Vec3,
    /// Peak height of an arc per unit of horizontal distance travelled.
    lift: f32,
    look_ahead_ticks: u64,
    linger: Duration,
    position: Vec3,
    visible: bool,
}

impl ArcMotion {
    pub fn new<F>(
        node: NodeId,
        collector: EventCollector<NoteEvent>,
        rest: Vec3,
        position_of: F,
    ) -> Self
    where
        F: Fn(u8) -> Vec3 + Send + 'static,
    {
        Self {
            node,
            collector,
            position_of: Box::new(position_of),
            rest,
            lift: 0.25,
            look_ahead_ticks: 0,
            linger: Duration::ZERO,
            position: rest,
            visible: false,
        }
    }

    /// Show the object this many ticks before its next note and keep it
    /// visible for `linger` after the last one.
    pub fn with_window(mut self, look_ahead_ticks: u64, linger: Duration) -> Self {
        self.look_ahead_ticks = look_ahead_ticks;
        self.linger = linger;
        self
    }

    pub fn with_lift(mut self, lift: f32) -> Self {
        self.lift = lift;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Advances to `frame` and returns the notes struck this frame.
    pub fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) -> Vec<NoteEvent> {
        let struck: Vec<NoteEvent> = self
            .collector
            .advance_to(frame.time)
            .iter()
            .map(|timed| timed.event)
            .collect();

        let prev = self.collector.prev();
        let next = self.collector.peek();

        self.position = match (prev, next) {
            (Some(prev), Some(next)) => {
                let from = (self.position_of)(prev.event.note);
                let to = (self.position_of)(next.event.note);
                let gap = (next.time - prev.time).as_secs_f32();
                let progress = if gap > 0.0 {
                    ((frame.time - prev.time).as_secs_f32() / gap).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let height = self.lift * from.distance(to) * 4.0 * progress * (1.0 - progress);
                from.lerp(to, progress) + Vec3::new(0.0, height, 0.0)
            }
            (Some(prev), None) => (self.position_of)(prev.event.note),
            (None, Some(next)) => (self.position_of)(next.event.note),
            (None, None) => self.rest,
        };

        let approaching = next.is_some_and(|next| {
            next.event.start_tick.saturating_sub(frame.tick) <= self.look_ahead_ticks
        });
        let between = prev.is_some() && next.is_some();
        let lingering = prev.is_some_and(|prev| frame.time.saturating_sub(prev.time) <= self.linger);
        self.visible = approaching || between || lingering;

        scene.set_visible(self.node, self.visible);
        scene.set_transform(self.node, Transform::from_translation(self.position));

        struck
    }

    pub fn seek(&mut self, time: Duration) {
        self.collector.reset(time);
    }
}

impl std::fmt::Debug for ArcMotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcMotion")
            .field("node", &self.node)
            .field("position", &self.position)
            .field("visible", &self.visible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render::RenderGraph, sequence::Timed};

    fn mallet(scene: &mut RenderGraph) -> ArcMotion {
        let events = vec![
            Timed::new(Duration::from_millis(1000), NoteEvent::hit(960, 60, 100)),
            Timed::new(Duration::from_millis(2000), NoteEvent::hit(1920, 72, 100)),
        ];
        let node = scene.spawn("mallet");
        ArcMotion::new(node, EventCollector::new(events), Vec3::ZERO, |note| {
            Vec3::new(f32::from(note), 0.0, 0.0)
        })
        .with_window(480, Duration::from_millis(500))
    }

    fn frame(ms: u64) -> Frame {
        Frame::new(Duration::from_millis(ms), ms * 480 / 500, 1.0 / 60.0)
    }

    #[test]
    fn lands_on_next_note_exactly_on_time() {
        let mut scene = RenderGraph::new();
        let mut mallet = mallet(&mut scene);

        let struck = mallet.update(&frame(1000), &mut scene);
        assert_eq!(struck.len(), 1);
        assert_eq!(mallet.position(), Vec3::new(60.0, 0.0, 0.0));

        mallet.update(&frame(1500), &mut scene);
        let midway = mallet.position();
        assert!((midway.x - 66.0).abs() < 1e-4);
        assert!(midway.y > 0.0);

        let struck = mallet.update(&frame(2000), &mut scene);
        assert_eq!(struck[0].note, 72);
        assert_eq!(mallet.position(), Vec3::new(72.0, 0.0, 0.0));
    }

    #[test]
    fn waits_at_first_note_and_hides_when_far() {
        let mut scene = RenderGraph::new();
        let mut mallet = mallet(&mut scene);

        mallet.update(&frame(0), &mut scene);
        assert_eq!(mallet.position(), Vec3::new(60.0, 0.0, 0.0));
        assert!(!mallet.is_visible());

        mallet.update(&frame(600), &mut scene);
        assert!(mallet.is_visible());

        mallet.update(&frame(3000), &mut scene);
        assert!(!mallet.is_visible());
        assert!(!scene.node(mallet.node()).unwrap().visible);
    }

    #[test]
    fn seek_back_restores_arc_endpoints() {
        let mut scene = RenderGraph::new();
        let mut mallet = mallet(&mut scene);
        mallet.update(&frame(2500), &mut scene);

        mallet.seek(Duration::from_millis(1500));
        let struck = mallet.update(&frame(1500), &mut scene);

        assert!(struck.is_empty());
        assert!((mallet.position().x - 66.0).abs() < 1e-4);
    }
}
