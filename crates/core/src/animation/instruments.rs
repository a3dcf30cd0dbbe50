use std::{collections::BTreeSet, sync::Arc, time::Duration};

use crate::{
    collector::EventCollector,
    config::VisibilityConfig,
    math::{Transform, Vec3},
    render::{NodeId, Scene},
    sequence::{NoteEvent, NotePeriod, TimeBasedSequence, Timed},
};

use super::{
    standard_rules, ArcMotion, Frame, HarmonicInstanceControl, Instrument, Recoil, StrikePolicy,
    Striker, StrikerParameters, VisibilityBehavior, VisibilityParameters,
};

/// Lowest and highest bars on a mallet instrument.
const MALLET_RANGE: std::ops::RangeInclusive<u8> = 21..=108;
const MALLET_HEIGHT: f32 = 1.35;
const INSTANCE_SPACING: f32 = 12.0;
const PITCH_EASE_RATE: f32 = 8.0;

// ---------------------------------------------------------------------------
// Percussion
// ---------------------------------------------------------------------------

struct Drum {
    striker: Striker,
    shell: Recoil,
}

/// A kit with one stick per distinct drum note. Sticks snap into every new
/// hit ([`StrikePolicy::Restart`]) and the shell recoils on impact.
pub struct Percussion {
    name: String,
    drums: Vec<Drum>,
    visible: bool,
}

impl Percussion {
    pub fn new(
        name: &str,
        sequence: &TimeBasedSequence,
        track: usize,
        origin: Vec3,
        scene: &mut dyn Scene,
    ) -> Self {
        let notes: BTreeSet<u8> = sequence
            .tracks()
            .get(track)
            .map(|track| track.events.iter().map(|event| event.note).collect())
            .unwrap_or_default();

        let drums = notes
            .into_iter()
            .map(|note| {
                let position = origin + drum_position(note);

                let shell_node = scene.spawn(&format!("{name}/drum-{note}"));
                let shell_rest = Transform::from_translation(position);
                scene.set_transform(shell_node, shell_rest);
                scene.set_visible(shell_node, true);

                let stick_node = scene.spawn(&format!("{name}/stick-{note}"));
                let parameters = StrikerParameters {
                    visibility: VisibilityBehavior::BetweenHits,
                    policy: StrikePolicy::Restart,
                    rest: Transform::from_translation(position + Vec3::new(0.0, 3.0, 2.0)),
                    ..Default::default()
                };
                let hits: Arc<[Timed<NoteEvent>]> =
                    sequence.timed_notes(track, |event| event.note == note).into();

                Drum {
                    striker: Striker::new(
                        stick_node,
                        EventCollector::new(hits.clone()),
                        sequence.ticks_per_quarter(),
                        parameters,
                    ),
                    shell: Recoil::new(shell_node, shell_rest, EventCollector::new(hits)).with_depth(0.3),
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            drums,
            visible: false,
        }
    }

    pub fn drum_count(&self) -> usize {
        self.drums.len()
    }
}

impl Instrument for Percussion {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) {
        self.visible = false;
        for drum in &mut self.drums {
            drum.striker.update(frame, scene);
            drum.shell.update(frame, scene);
            self.visible |= drum.striker.is_visible();
        }
    }

    fn seek(&mut self, time: Duration) {
        for drum in &mut self.drums {
            drum.striker.seek(time);
            drum.shell.seek(time);
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Rough kit layout: kick in front, snare and hats to the left, toms across
/// the top, cymbals behind. Unknown notes fan out on an arc.
fn drum_position(note: u8) -> Vec3 {
    match note {
        35 | 36 => Vec3::new(0.0, 0.0, 0.0),
        37..=40 => Vec3::new(-10.0, 6.0, 5.0),
        42 | 44 | 46 => Vec3::new(-18.0, 9.0, 2.0),
        41 | 43 => Vec3::new(12.0, 5.0, 4.0),
        45 | 47 => Vec3::new(5.0, 11.0, -2.0),
        48 | 50 => Vec3::new(-4.0, 11.0, -2.0),
        49 | 52 | 55 | 57 => Vec3::new(-16.0, 18.0, -10.0),
        51 | 53 | 59 => Vec3::new(16.0, 16.0, -8.0),
        other => {
            let angle = (f32::from(other) - 60.0) * 0.1;
            Vec3::new(30.0 * angle.sin(), 4.0, -30.0 * angle.cos())
        }
    }
}

// ---------------------------------------------------------------------------
// Mallets
// ---------------------------------------------------------------------------

/// Keyboard percussion: a row of bars from A0 to C8 and two mallets that arc
/// from bar to bar, one for each hand.
pub struct Mallets {
    name: String,
    origin: Vec3,
    bars: Vec<Recoil>,
    case: NodeId,
    mallets: Vec<ArcMotion>,
    notes: EventCollector<NoteEvent>,
    visibility: VisibilityParameters,
    visible: bool,
}

impl Mallets {
    pub fn new(
        name: &str,
        sequence: &TimeBasedSequence,
        track: usize,
        origin: Vec3,
        config: &VisibilityConfig,
        scene: &mut dyn Scene,
    ) -> Self {
        let timed = sequence.timed_notes(track, |event| MALLET_RANGE.contains(&event.note));

        let bars = MALLET_RANGE
            .map(|note| {
                let node = scene.spawn(&format!("{name}/bar-{note}"));
                let rest = Transform::from_translation(origin + bar_position(note));
                scene.set_transform(node, rest);
                let hits: Vec<_> = timed.iter().filter(|timed| timed.event.note == note).copied().collect();
                Recoil::new(node, rest, EventCollector::new(hits))
            })
            .collect();
        let case = scene.spawn(&format!("{name}/case"));
        scene.set_transform(case, Transform::from_translation(origin));

        let split = split_pitch(&timed);
        let look_ahead = config.look_ahead_ticks(sequence.ticks_per_quarter());

        let mallets = [(true, "left"), (false, "right")]
            .into_iter()
            .map(|(low, hand)| {
                let events: Vec<_> = timed
                    .iter()
                    .filter(|timed| (timed.event.note < split) == low)
                    .copied()
                    .collect();
                let node = scene.spawn(&format!("{name}/mallet-{hand}"));
                let rest = origin + bar_position(if low { 48 } else { 72 }) + Vec3::new(0.0, MALLET_HEIGHT, 0.0);
                ArcMotion::new(node, EventCollector::new(events), rest, move |note| {
                    origin + bar_position(note) + Vec3::new(0.0, MALLET_HEIGHT, 0.0)
                })
                .with_window(look_ahead, config.decay())
            })
            .collect();

        Self {
            name: name.to_string(),
            origin,
            bars,
            case,
            mallets,
            notes: EventCollector::new(timed),
            visibility: VisibilityParameters::default(),
            visible: false,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn mallets(&self) -> &[ArcMotion] {
        &self.mallets
    }

    pub fn bar(&self, note: u8) -> Option<&Recoil> {
        note.checked_sub(*MALLET_RANGE.start())
            .and_then(|index| self.bars.get(usize::from(index)))
    }
}

impl Instrument for Mallets {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) {
        self.notes.advance_to(frame.time);
        self.visible = standard_rules(&self.notes, frame.time, &self.visibility);

        for mallet in &mut self.mallets {
            mallet.update(frame, scene);
            if !self.visible {
                scene.set_visible(mallet.node(), false);
            }
        }

        for bar in &mut self.bars {
            bar.update(frame, scene);
            scene.set_visible(bar.node(), self.visible);
        }
        scene.set_visible(self.case, self.visible);
    }

    fn seek(&mut self, time: Duration) {
        self.notes.reset(time);
        for mallet in &mut self.mallets {
            mallet.seek(time);
        }
        for bar in &mut self.bars {
            bar.seek(time);
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Position of a bar relative to the instrument origin. Natural notes sit in
/// the front row, accidentals in a raised back row.
fn bar_position(note: u8) -> Vec3 {
    const WHITE_OFFSETS: [Option<u8>; 12] = [
        Some(0), None, Some(1), None, Some(2), Some(3), None, Some(4), None, Some(5), None, Some(6),
    ];
    let n = f32::from(note);
    match WHITE_OFFSETS[usize::from(note % 12)] {
        Some(offset) => {
            let white_index = f32::from(note / 12) * 7.0 + f32::from(offset);
            Vec3::new((4.0 / 3.0) * (white_index - 38.0), 0.0, -n / 9.5 + 19.0)
        }
        None => Vec3::new(0.777 * n - 50.933, 1.25, 0.045 * n + 0.667),
    }
}

/// Median pitch, used to divide notes between the two mallets.
fn split_pitch(notes: &[Timed<NoteEvent>]) -> u8 {
    let mut pitches: Vec<u8> = notes.iter().map(|timed| timed.event.note).collect();
    if pitches.is_empty() {
        return 60;
    }
    pitches.sort_unstable();
    pitches[pitches.len() / 2]
}

// ---------------------------------------------------------------------------
// Harmonic families
// ---------------------------------------------------------------------------

struct HarmonicInstance {
    control: HarmonicInstanceControl,
    bow: Striker,
    base: Vec3,
    pitch_angle: f32,
}

/// A family of identical instances (string sections, choir singers, ...).
/// Each simultaneously sounding voice gets its own instance; instances other
/// than the first appear only around their notes.
pub struct HarmonicInstrument {
    name: String,
    instances: Vec<HarmonicInstance>,
    visible: bool,
}

impl HarmonicInstrument {
    pub fn new(
        name: &str,
        sequence: &TimeBasedSequence,
        track: usize,
        origin: Vec3,
        config: &VisibilityConfig,
        scene: &mut dyn Scene,
    ) -> Self {
        let look_ahead = config.look_ahead_ticks(sequence.ticks_per_quarter());
        let mut voices = allocate_voices(&sequence.note_periods(track, |_| true));
        if voices.is_empty() {
            voices.push(Vec::new());
        }

        let instances = voices
            .into_iter()
            .enumerate()
            .map(|(index, voice)| {
                let base = origin + Vec3::new(index as f32 * INSTANCE_SPACING, 0.0, 0.0);
                let body = scene.spawn(&format!("{name}/instance-{index}"));
                scene.set_transform(body, Transform::from_translation(base));
                let bow_node = scene.spawn(&format!("{name}/instance-{index}/bow"));

                let starts: Vec<Timed<NoteEvent>> = voice
                    .iter()
                    .map(|timed| Timed::new(timed.time, timed.event.note))
                    .collect();
                let parameters = StrikerParameters {
                    strike_lift: false,
                    visibility: VisibilityBehavior::Always,
                    policy: StrikePolicy::Ease,
                    rest: Transform::from_translation(base + Vec3::new(0.0, 4.0, 1.5)),
                    ..Default::default()
                };

                HarmonicInstance {
                    control: HarmonicInstanceControl::new(
                        index,
                        body,
                        EventCollector::new(voice),
                        look_ahead,
                        config.decay(),
                    ),
                    bow: Striker::new(
                        bow_node,
                        EventCollector::new(starts),
                        sequence.ticks_per_quarter(),
                        parameters,
                    ),
                    base,
                    pitch_angle: 0.0,
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            instances,
            visible: true,
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance_control(&self, index: usize) -> Option<&HarmonicInstanceControl> {
        self.instances.get(index).map(|instance| &instance.control)
    }
}

impl Instrument for HarmonicInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, frame: &Frame, scene: &mut dyn Scene) {
        self.visible = false;
        for instance in &mut self.instances {
            instance.control.update(frame, scene);
            let visible = instance.control.is_visible();
            instance.bow.update_gated(frame, scene, visible);

            let target = instance
                .control
                .sounding()
                .map_or(0.0, |period| (f32::from(period.note.note) - 60.0) / 24.0 * 0.35);
            let step = (frame.tpf.max(0.0) * PITCH_EASE_RATE).min(1.0);
            instance.pitch_angle += (target - instance.pitch_angle) * step;

            let transform = Transform::from_translation(instance.base)
                .with_rotation(Vec3::new(0.0, 0.0, instance.pitch_angle));
            scene.set_transform(instance.control.node(), transform);

            self.visible |= visible;
        }
    }

    fn seek(&mut self, time: Duration) {
        for instance in &mut self.instances {
            instance.control.seek(time);
            instance.bow.seek(time);
            instance.pitch_angle = 0.0;
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Greedy voice allocation: each note goes to the first voice that has gone
/// quiet by the time the note starts, or to a new voice.
pub(crate) fn allocate_voices(periods: &[Timed<NotePeriod>]) -> Vec<Vec<Timed<NotePeriod>>> {
    let mut voices: Vec<Vec<Timed<NotePeriod>>> = Vec::new();
    for period in periods {
        let free = voices.iter_mut().find(|voice| {
            voice
                .last()
                .map_or(true, |last| last.event.end <= period.time)
        });
        match free {
            Some(voice) => voice.push(*period),
            None => voices.push(vec![*period]),
        }
    }
    voices
}
