use std::time::Duration;

use crate::{
    collector::EventCollector,
    render::{NodeId, Scene},
    sequence::NotePeriod,
};

use super::Frame;

/// Instrument-level show windows around hits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityParameters {
    /// Show this long before the next hit.
    pub show_before: Duration,
    /// Stay visible between hits closer together than this.
    pub show_between: Duration,
    /// Linger this long after the last hit.
    pub show_after: Duration,
}

impl Default for VisibilityParameters {
    fn default() -> Self {
        Self {
            show_before: Duration::from_secs(1),
            show_between: Duration::from_secs(7),
            show_after: Duration::from_secs(2),
        }
    }
}

/// Standard instrument visibility from the collector's neighbouring events.
pub fn standard_rules<T>(
    collector: &EventCollector<T>,
    time: Duration,
    parameters: &VisibilityParameters,
) -> bool {
    if let Some(next) = collector.peek() {
        if next.time.saturating_sub(time) <= parameters.show_before {
            return true;
        }
    }

    if let (Some(prev), Some(next)) = (collector.prev(), collector.peek()) {
        if next.time - prev.time <= parameters.show_between {
            return true;
        }
    }

    if let Some(prev) = collector.prev() {
        if time.saturating_sub(prev.time) <= parameters.show_after {
            return true;
        }
    }

    false
}

/// Activity of one animated subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectState {
    Idle,
    /// The next note starts within the look-ahead window.
    Approaching,
    Sounding,
    /// The last note ended recently.
    Decaying,
}

impl SubjectState {
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Visibility control for one instance in a family of identical instances
/// (e.g. one of several stage string sections).
///
/// Instance 0 is the home representative of its family and is always shown
/// so the stage never goes empty. Other instances are shown only while
/// approaching, sounding or decaying.
#[derive(Debug)]
pub struct HarmonicInstanceControl {
    index: usize,
    node: NodeId,
    collector: EventCollector<NotePeriod>,
    look_ahead_ticks: u64,
    decay: Duration,
    state: SubjectState,
    visible: bool,
}

impl HarmonicInstanceControl {
    pub fn new(
        index: usize,
        node: NodeId,
        collector: EventCollector<NotePeriod>,
        look_ahead_ticks: u64,
        decay: Duration,
    ) -> Self {
        Self {
            index,
            node,
            collector,
            look_ahead_ticks,
            decay,
            state: SubjectState::Idle,
            visible: index == 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> SubjectState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Note currently sounding, if any.
    pub fn sounding(&self) -> Option<&NotePeriod> {
        match self.state {
            SubjectState::Sounding => self.collector.prev().map(|prev| &prev.event),
            _ => None,
        }
    }

    /// Advances the collector, derives the new state and applies visibility.
    /// Returns the notes that started during this frame.
    pub fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) -> Vec<NotePeriod> {
        let started: Vec<NotePeriod> = self
            .collector
            .advance_to(frame.time)
            .iter()
            .map(|timed| timed.event)
            .collect();

        let state = self.derive_state(frame);
        if state != self.state {
            tracing::trace!(index = self.index, from = ?self.state, to = ?state, "instance state changed");
            self.state = state;
        }

        self.visible = self.index == 0 || state.is_active();
        scene.set_visible(self.node, self.visible);

        started
    }

    pub fn seek(&mut self, time: Duration) {
        self.collector.reset(time);
        self.state = SubjectState::Idle;
    }

    fn derive_state(&self, frame: &Frame) -> SubjectState {
        let prev = self.collector.prev();
        if let Some(prev) = prev {
            if prev.event.end > frame.time {
                return SubjectState::Sounding;
            }
        }

        // With no next note the gap is unbounded.
        let gap_ticks = self
            .collector
            .peek()
            .map(|next| next.event.note.start_tick.saturating_sub(frame.tick));
        if matches!(gap_ticks, Some(gap) if gap <= self.look_ahead_ticks) {
            return SubjectState::Approaching;
        }

        match prev {
            Some(prev) if frame.time.saturating_sub(prev.event.end) <= self.decay => {
                SubjectState::Decaying
            }
            _ => SubjectState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render::RenderGraph,
        sequence::{NoteEvent, TempoChange, TimeBasedSequence, Timed, Track},
    };

    fn sequence() -> TimeBasedSequence {
        let notes = vec![
            NoteEvent::sustained(1920, 2400, 60, 100),
            NoteEvent::sustained(4800, 5280, 64, 100),
        ];
        TimeBasedSequence::new(
            480,
            vec![TempoChange::from_bpm(0, 120.0)],
            vec![Track::new("strings", 0, 48, notes)],
        )
        .unwrap()
    }

    fn frame(sequence: &TimeBasedSequence, ms: u64) -> Frame {
        let time = Duration::from_millis(ms);
        Frame::new(time, sequence.tick_at_time(time), 1.0 / 60.0)
    }

    fn control(index: usize, scene: &mut RenderGraph, sequence: &TimeBasedSequence) -> HarmonicInstanceControl {
        let node = scene.spawn("instance");
        let collector = EventCollector::new(sequence.note_periods(0, |_| true));
        HarmonicInstanceControl::new(index, node, collector, 960, Duration::from_millis(500))
    }

    #[test]
    fn walks_through_states() {
        let sequence = sequence();
        let mut scene = RenderGraph::new();
        let mut control = control(1, &mut scene, &sequence);

        let expectations = [
            (0, SubjectState::Idle, false),
            (1000, SubjectState::Approaching, true),
            (2000, SubjectState::Sounding, true),
            (2600, SubjectState::Decaying, true),
            (3100, SubjectState::Idle, false),
            (4100, SubjectState::Approaching, true),
        ];
        for (ms, state, visible) in expectations {
            control.update(&frame(&sequence, ms), &mut scene);
            assert_eq!(control.state(), state, "at {ms} ms");
            assert_eq!(scene.node(control.node()).unwrap().visible, visible, "at {ms} ms");
        }
    }

    #[test]
    fn home_instance_is_always_visible() {
        let sequence = sequence();
        let mut scene = RenderGraph::new();
        let node = scene.spawn("home");
        let mut control =
            HarmonicInstanceControl::new(0, node, EventCollector::empty(), 960, Duration::ZERO);

        control.update(&frame(&sequence, 10_000), &mut scene);

        assert_eq!(control.state(), SubjectState::Idle);
        assert!(control.is_visible());
        assert!(scene.node(node).unwrap().visible);
    }

    #[test]
    fn exhausted_collector_is_not_approaching() {
        let sequence = sequence();
        let mut scene = RenderGraph::new();
        let mut control = control(2, &mut scene, &sequence);

        control.update(&frame(&sequence, 60_000), &mut scene);

        assert!(control.sounding().is_none());
        assert!(!control.is_visible());
    }

    #[test]
    fn reports_started_notes_and_seeks_back() {
        let sequence = sequence();
        let mut scene = RenderGraph::new();
        let mut control = control(1, &mut scene, &sequence);

        let started = control.update(&frame(&sequence, 5000), &mut scene);
        assert_eq!(started.len(), 2);
        assert_eq!(control.sounding().map(|p| p.note.note), Some(64));

        control.seek(Duration::from_millis(2100));
        let started = control.update(&frame(&sequence, 2100), &mut scene);
        assert!(started.is_empty());
        assert_eq!(control.sounding().map(|p| p.note.note), Some(60));
    }

    #[test]
    fn standard_rules_use_show_windows() {
        let events: Vec<Timed<u8>> = [1_000, 20_000]
            .iter()
            .map(|ms| Timed::new(Duration::from_millis(*ms), 0))
            .collect();
        let mut collector = EventCollector::new(events);
        let parameters = VisibilityParameters::default();

        assert!(standard_rules(&collector, Duration::ZERO, &parameters));
        collector.advance_to(Duration::from_millis(1_000));
        assert!(standard_rules(&collector, Duration::from_millis(2_500), &parameters));
        assert!(!standard_rules(&collector, Duration::from_millis(10_000), &parameters));
        assert!(standard_rules(&collector, Duration::from_millis(19_500), &parameters));
    }
}
