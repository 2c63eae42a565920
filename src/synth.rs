use crate::chord::{self, ChordParser};
use crate::segment::ChordSequence;
use serde::Serialize;
use thiserror::Error;

/// Tempo assumed when the caller doesn't pick one.
pub const DEFAULT_TEMPO_BPM: u32 = 100;

/// Every synthesized note is struck at this velocity.
pub const NOTE_VELOCITY: u8 = 80;

/// Synthesis with fewer notes than this is rejected.
pub const MIN_NOTES: usize = 2;

/// Synthesis voicing fewer segments than this is rejected.
pub const MIN_CHORDS: usize = 2;

const MAX_PITCH: u16 = 127;

/// A pitched note spanning `[start, end)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("synthesis produced {produced} note(s) from {chords} chord(s); at least 2 of each are required")]
    InsufficientNotes { produced: usize, chords: usize },
}

/// Synthesize note events with the built-in quality table.
///
/// `tempo_bpm` is carried for export formats; note timestamps are the
/// segment times and never depend on it.
pub fn synthesize(sequence: &ChordSequence, tempo_bpm: u32) -> Result<Vec<NoteEvent>, SynthesisError> {
    synthesize_with(chord::default_parser(), sequence, tempo_bpm)
}

/// Synthesize note events, resolving chords with `parser`.
///
/// One note per chord interval for every valid, non-`N` segment whose root
/// parses. Notes come out in segment order, then ascending interval order.
/// Output from a single chord, or with fewer than two notes, is rejected.
pub fn synthesize_with(
    parser: &ChordParser,
    sequence: &ChordSequence,
    tempo_bpm: u32,
) -> Result<Vec<NoteEvent>, SynthesisError> {
    log::debug!(
        "Synthesizing {} segments at {} BPM",
        sequence.valid_count(),
        tempo_bpm
    );

    let mut notes = Vec::new();
    let mut chords = 0;

    for segment in sequence.valid_segments().filter(|s| !s.is_no_chord()) {
        let chord = match parser.parse(&segment.label) {
            Ok(chord) => chord,
            Err(e) => {
                log::debug!("Skipping segment at {:.2}s: {}", segment.start, e);
                continue;
            }
        };

        let before = notes.len();
        for pitch in chord.pitches() {
            if pitch > MAX_PITCH {
                log::warn!(
                    "Skipping pitch {} of {:?}: above MIDI range",
                    pitch,
                    segment.label
                );
                continue;
            }
            notes.push(NoteEvent {
                pitch: pitch as u8,
                velocity: NOTE_VELOCITY,
                start: segment.start,
                end: segment.end,
            });
        }
        if notes.len() > before {
            chords += 1;
        }
    }

    if notes.len() < MIN_NOTES || chords < MIN_CHORDS {
        return Err(SynthesisError::InsufficientNotes {
            produced: notes.len(),
            chords,
        });
    }

    Ok(notes)
}
