//! Maps sequence tracks onto animated instruments.

use crate::{
    animation::{HarmonicInstrument, Instrument, Mallets, Percussion},
    config::VisibilityConfig,
    math::Vec3,
    render::Scene,
    sequence::{TimeBasedSequence, Track},
};

const PERCUSSION_ORIGIN: Vec3 = Vec3::new(0.0, 0.0, -40.0);
const MALLETS_ORIGIN: Vec3 = Vec3::new(-30.0, 10.0, 20.0);
const HARMONIC_ORIGIN: Vec3 = Vec3::new(40.0, 0.0, 0.0);
/// Room left between consecutive instruments of the same family.
const FAMILY_SPACING: Vec3 = Vec3::new(0.0, 0.0, -30.0);

/// General MIDI programs 8-15: celesta through dulcimer.
const CHROMATIC_PERCUSSION: std::ops::RangeInclusive<u8> = 8..=15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Percussion,
    Mallets,
    Harmonic,
}

impl Family {
    pub fn of(track: &Track) -> Self {
        if track.is_percussion() {
            Self::Percussion
        } else if CHROMATIC_PERCUSSION.contains(&track.program) {
            Self::Mallets
        } else {
            Self::Harmonic
        }
    }
}

/// Builds one instrument per non-empty track, spawning its nodes into `scene`.
pub fn assign_instruments(
    sequence: &TimeBasedSequence,
    config: &VisibilityConfig,
    scene: &mut dyn Scene,
) -> Vec<Box<dyn Instrument>> {
    let mut placed = [0usize; 3];

    sequence
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, track)| !track.events.is_empty())
        .map(|(index, track)| {
            let family = Family::of(track);
            let slot = &mut placed[family as usize];
            let offset = FAMILY_SPACING * *slot as f32;
            *slot += 1;

            let name = if track.name.is_empty() {
                format!("track-{index}")
            } else {
                format!("{}-{index}", track.name)
            };
            tracing::debug!(track = index, ?family, %name, "assigning instrument");

            let instrument: Box<dyn Instrument> = match family {
                Family::Percussion => Box::new(Percussion::new(
                    &name,
                    sequence,
                    index,
                    PERCUSSION_ORIGIN + offset,
                    scene,
                )),
                Family::Mallets => Box::new(Mallets::new(
                    &name,
                    sequence,
                    index,
                    MALLETS_ORIGIN + offset,
                    config,
                    scene,
                )),
                Family::Harmonic => Box::new(HarmonicInstrument::new(
                    &name,
                    sequence,
                    index,
                    HARMONIC_ORIGIN + offset,
                    config,
                    scene,
                )),
            };
            instrument
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render::RenderGraph,
        sequence::{NoteEvent, TempoChange},
    };

    #[test]
    fn families_follow_channel_and_program() {
        let note = vec![NoteEvent::hit(0, 60, 100)];
        assert_eq!(Family::of(&Track::new("kit", 9, 0, note.clone())), Family::Percussion);
        assert_eq!(Family::of(&Track::new("vibes", 0, 11, note.clone())), Family::Mallets);
        assert_eq!(Family::of(&Track::new("piano", 0, 0, note.clone())), Family::Harmonic);
        assert_eq!(Family::of(&Track::new("kit", 9, 11, note)), Family::Percussion);
    }

    #[test]
    fn skips_empty_tracks() {
        let sequence = TimeBasedSequence::new(
            480,
            vec![TempoChange::from_bpm(0, 120.0)],
            vec![
                Track::new("", 0, 40, vec![NoteEvent::sustained(0, 480, 60, 90)]),
                Track::new("silent", 1, 0, Vec::new()),
                Track::new("kit", 9, 0, vec![NoteEvent::hit(0, 36, 90)]),
            ],
        )
        .unwrap();
        let mut scene = RenderGraph::new();

        let instruments = assign_instruments(&sequence, &VisibilityConfig::default(), &mut scene);

        let names: Vec<_> = instruments.iter().map(|instrument| instrument.name()).collect();
        assert_eq!(names, ["track-0", "kit-2"]);
        assert!(scene.find("kit-2/drum-36").is_some());
    }
}
