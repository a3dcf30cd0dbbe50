//! Immutable, tick-indexed view of a parsed MIDI file.
//!
//! The parsing collaborator hands over ticks-per-quarter, a tempo map and the
//! per-track note lists. Everything here is read-only after construction, so a
//! sequence is shared behind an [`Arc`](std::sync::Arc) by every collector and
//! by the render loop without locking.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PerformanceError, Result};

/// Tempo assumed when the file does not set one at tick zero (120 BPM).
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

const NANOS_PER_MICRO: u128 = 1_000;

/// A tempo change: from `tick` onward a quarter note lasts `micros_per_quarter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_quarter: u32,
}

impl TempoChange {
    pub fn new(tick: u64, micros_per_quarter: u32) -> Self {
        Self {
            tick,
            micros_per_quarter,
        }
    }

    pub fn from_bpm(tick: u64, bpm: f64) -> Self {
        Self::new(tick, (60_000_000.0 / bpm).round() as u32)
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_quarter)
    }
}

/// A single note. `end_tick` is present for sustained notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start_tick: u64,
    #[serde(default)]
    pub end_tick: Option<u64>,
    pub note: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn hit(start_tick: u64, note: u8, velocity: u8) -> Self {
        Self {
            start_tick,
            end_tick: None,
            note,
            velocity,
        }
    }

    pub fn sustained(start_tick: u64, end_tick: u64, note: u8, velocity: u8) -> Self {
        Self {
            start_tick,
            end_tick: Some(end_tick.max(start_tick)),
            note,
            velocity,
        }
    }

    /// Last tick at which the note is still sounding.
    pub fn last_tick(&self) -> u64 {
        self.end_tick.unwrap_or(self.start_tick)
    }
}

/// Ordered notes of one logical channel group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    /// Zero-based MIDI channel; channel 9 carries percussion.
    pub channel: u8,
    #[serde(default)]
    pub program: u8,
    pub events: Vec<NoteEvent>,
}

impl Track {
    pub fn new(name: impl Into<String>, channel: u8, program: u8, events: Vec<NoteEvent>) -> Self {
        Self {
            name: name.into(),
            channel,
            program,
            events,
        }
    }

    pub fn is_percussion(&self) -> bool {
        self.channel == 9
    }
}

/// A value paired with its absolute time in the piece. Collectors operate on
/// slices of these so that the tempo map is consulted once, at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timed<T> {
    pub time: Duration,
    pub event: T,
}

impl<T> Timed<T> {
    pub fn new(time: Duration, event: T) -> Self {
        Self { time, event }
    }
}

/// A note together with the time it stops sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotePeriod {
    pub note: NoteEvent,
    pub end: Duration,
}

/// Wire form used for (de)serialization; validated into a [`TimeBasedSequence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequenceData {
    ticks_per_quarter: u16,
    #[serde(default)]
    tempos: Vec<TempoChange>,
    tracks: Vec<Track>,
}

/// Static view of a parsed MIDI file with tick/time conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SequenceData", into = "SequenceData")]
pub struct TimeBasedSequence {
    ticks_per_quarter: u16,
    tempos: Vec<TempoChange>,
    /// Absolute start time of each tempo segment, parallel to `tempos`.
    segment_starts: Vec<Duration>,
    tracks: Vec<Track>,
    duration: Duration,
}

impl TimeBasedSequence {
    /// Validates the tempo map and builds the conversion tables.
    ///
    /// A missing tempo at tick zero is filled with 120 BPM. Track events are
    /// stably sorted by start tick so ties keep their original order.
    pub fn new(ticks_per_quarter: u16, tempos: Vec<TempoChange>, tracks: Vec<Track>) -> Result<Self> {
        if ticks_per_quarter == 0 {
            return Err(PerformanceError::MalformedSequence(
                "ticks per quarter note must be positive".to_string(),
            ));
        }

        let mut tempos = tempos;
        if tempos.first().map_or(true, |first| first.tick > 0) {
            tempos.insert(0, TempoChange::new(0, DEFAULT_MICROS_PER_QUARTER));
        }

        for window in tempos.windows(2) {
            if window[1].tick <= window[0].tick {
                return Err(PerformanceError::MalformedSequence(format!(
                    "tempo changes must be strictly increasing by tick (tick {} follows tick {})",
                    window[1].tick, window[0].tick
                )));
            }
        }
        if let Some(tempo) = tempos.iter().find(|tempo| tempo.micros_per_quarter == 0) {
            return Err(PerformanceError::MalformedSequence(format!(
                "zero-length quarter note at tick {}",
                tempo.tick
            )));
        }

        let mut segment_starts = Vec::with_capacity(tempos.len());
        let mut elapsed = Duration::ZERO;
        segment_starts.push(elapsed);
        for window in tempos.windows(2) {
            elapsed += span(window[1].tick - window[0].tick, window[0].micros_per_quarter, ticks_per_quarter);
            segment_starts.push(elapsed);
        }

        let mut tracks = tracks;
        for track in &mut tracks {
            track.events.sort_by_key(|event| event.start_tick);
        }

        let mut sequence = Self {
            ticks_per_quarter,
            tempos,
            segment_starts,
            tracks,
            duration: Duration::ZERO,
        };
        let last_tick = sequence
            .tracks
            .iter()
            .flat_map(|track| track.events.iter())
            .map(NoteEvent::last_tick)
            .max()
            .unwrap_or(0);
        sequence.duration = sequence.time_at_tick(last_tick);

        Ok(sequence)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn tempos(&self) -> &[TempoChange] {
        &self.tempos
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Time at which the last note ends.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Absolute time of `tick`. Monotonic: `a < b` implies
    /// `time_at_tick(a) <= time_at_tick(b)`.
    pub fn time_at_tick(&self, tick: u64) -> Duration {
        let segment = self.tempos.partition_point(|tempo| tempo.tick <= tick) - 1;
        let tempo = self.tempos[segment];
        self.segment_starts[segment]
            + span(tick - tempo.tick, tempo.micros_per_quarter, self.ticks_per_quarter)
    }

    /// Tick nearest to `time`. Inverse of [`Self::time_at_tick`] for every
    /// tick in the piece.
    pub fn tick_at_time(&self, time: Duration) -> u64 {
        let segment = self.segment_starts.partition_point(|start| *start <= time) - 1;
        let tempo = self.tempos[segment];
        let offset = (time - self.segment_starts[segment]).as_nanos();
        let nanos_per_quarter = u128::from(tempo.micros_per_quarter) * NANOS_PER_MICRO;
        let ticks = (offset * u128::from(self.ticks_per_quarter) + nanos_per_quarter / 2) / nanos_per_quarter;
        tempo.tick + ticks as u64
    }

    pub fn time_of(&self, event: &NoteEvent) -> Duration {
        self.time_at_tick(event.start_tick)
    }

    pub fn end_time_of(&self, event: &NoteEvent) -> Duration {
        self.time_at_tick(event.last_tick())
    }

    /// Pairs every event of `track` accepted by `filter` with its start time,
    /// preserving track order.
    pub fn timed_notes<F>(&self, track: usize, mut filter: F) -> Vec<Timed<NoteEvent>>
    where
        F: FnMut(&NoteEvent) -> bool,
    {
        self.tracks
            .get(track)
            .map(|track| {
                track
                    .events
                    .iter()
                    .filter(|event| filter(event))
                    .map(|event| Timed::new(self.time_of(event), *event))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Like [`Self::timed_notes`] but also resolves when each note ends.
    pub fn note_periods<F>(&self, track: usize, filter: F) -> Vec<Timed<NotePeriod>>
    where
        F: FnMut(&NoteEvent) -> bool,
    {
        self.timed_notes(track, filter)
            .into_iter()
            .map(|timed| {
                let end = self.end_time_of(&timed.event);
                Timed::new(timed.time, NotePeriod { note: timed.event, end })
            })
            .collect()
    }
}

impl TryFrom<SequenceData> for TimeBasedSequence {
    type Error = PerformanceError;

    fn try_from(data: SequenceData) -> Result<Self> {
        Self::new(data.ticks_per_quarter, data.tempos, data.tracks)
    }
}

impl From<TimeBasedSequence> for SequenceData {
    fn from(sequence: TimeBasedSequence) -> Self {
        Self {
            ticks_per_quarter: sequence.ticks_per_quarter,
            tempos: sequence.tempos,
            tracks: sequence.tracks,
        }
    }
}

fn span(ticks: u64, micros_per_quarter: u32, ticks_per_quarter: u16) -> Duration {
    let nanos = u128::from(ticks) * u128::from(micros_per_quarter) * NANOS_PER_MICRO
        / u128::from(ticks_per_quarter);
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(tempos: Vec<TempoChange>) -> TimeBasedSequence {
        let notes = vec![
            NoteEvent::hit(0, 60, 100),
            NoteEvent::hit(480, 62, 100),
            NoteEvent::sustained(960, 1440, 64, 100),
        ];
        TimeBasedSequence::new(480, tempos, vec![Track::new("lead", 0, 0, notes)]).unwrap()
    }

    #[test]
    fn converts_ticks_at_constant_tempo() {
        let sequence = sequence(vec![TempoChange::from_bpm(0, 120.0)]);

        assert_eq!(sequence.time_at_tick(480), Duration::from_millis(500));
        assert_eq!(sequence.time_at_tick(960), Duration::from_millis(1000));
        assert_eq!(sequence.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn converts_ticks_across_tempo_changes() {
        let sequence = sequence(vec![
            TempoChange::new(0, 500_000),
            TempoChange::new(960, 1_000_000),
        ]);

        assert_eq!(sequence.time_at_tick(960), Duration::from_millis(1000));
        assert_eq!(sequence.time_at_tick(1440), Duration::from_millis(2000));
        assert_eq!(sequence.tick_at_time(Duration::from_millis(1500)), 1200);
    }

    #[test]
    fn fills_missing_initial_tempo() {
        let sequence = sequence(vec![TempoChange::new(960, 250_000)]);

        assert_eq!(sequence.tempos()[0], TempoChange::new(0, DEFAULT_MICROS_PER_QUARTER));
        assert_eq!(sequence.time_at_tick(1200), Duration::from_millis(1125));
    }

    #[test]
    fn rejects_unordered_tempo_map() {
        let err = TimeBasedSequence::new(
            480,
            vec![TempoChange::new(0, 500_000), TempoChange::new(0, 400_000)],
            Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, PerformanceError::MalformedSequence(_)));
    }

    #[test]
    fn tick_and_time_round_trip() {
        let sequence = sequence(vec![
            TempoChange::new(0, 512_345),
            TempoChange::new(700, 333_333),
            TempoChange::new(1900, 901_001),
        ]);

        let mut previous = Duration::ZERO;
        for tick in 0..4000 {
            let time = sequence.time_at_tick(tick);
            assert!(time >= previous);
            assert_eq!(sequence.tick_at_time(time), tick);
            previous = time;
        }
    }

    #[test]
    fn sorts_events_stably_and_deserializes() {
        let json = r#"{
            "ticks_per_quarter": 96,
            "tracks": [{ "channel": 9, "events": [
                { "start_tick": 96, "note": 38, "velocity": 90 },
                { "start_tick": 0, "note": 36, "velocity": 80 },
                { "start_tick": 96, "note": 42, "velocity": 70 }
            ]}]
        }"#;

        let sequence = TimeBasedSequence::from_json_str(json).unwrap();
        let notes: Vec<u8> = sequence.tracks()[0].events.iter().map(|e| e.note).collect();

        assert_eq!(notes, vec![36, 38, 42]);
        assert!(sequence.tracks()[0].is_percussion());
    }

    #[test]
    fn invalid_tempo_map_fails_to_load() {
        let json = r#"{
            "ticks_per_quarter": 480,
            "tempos": [{ "tick": 0, "micros_per_quarter": 0 }],
            "tracks": []
        }"#;

        let err = TimeBasedSequence::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("zero-length quarter note"));
    }
}
