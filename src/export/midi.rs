// MIDI export: write synthesized chord notes as a Standard MIDI File using midly.
// Seconds are mapped to ticks at the given tempo, and the same tempo is written
// as a meta event, so players recover the original absolute timing.

use crate::synth::NoteEvent;
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slowest tempo whose microseconds-per-quarter still fits the 24-bit tempo field.
const MIN_TEMPO_BPM: u32 = 4;

const MAX_PPQ: u16 = 0x7FFF;

const META_TRACK_NAME: &str = "META";
const CHORD_TRACK_NAME: &str = "Chords";

#[derive(Error, Debug)]
pub enum MidiExportError {
    #[error("tempo {0} BPM is outside the representable range")]
    InvalidTempo(u32),
    #[error("PPQ must be between 1 and 32767, got {0}")]
    InvalidPpq(u16),
    #[error("failed to write MIDI: {0}")]
    Write(String),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note
    pub ppq: u16,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Include a 4/4 time signature
    pub include_time_signature: bool,

    /// Include track names
    pub track_names: bool,

    /// General MIDI program for the chord track (0 = acoustic grand piano)
    pub program: u8,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            include_tempo: true,
            include_time_signature: true,
            track_names: true,
            program: 0,
        }
    }
}

/// Export note events to MIDI file bytes (format 1: meta track + chord track).
pub fn export_midi(
    notes: &[NoteEvent],
    tempo_bpm: u32,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiExportError> {
    if tempo_bpm < MIN_TEMPO_BPM {
        return Err(MidiExportError::InvalidTempo(tempo_bpm));
    }
    if options.ppq == 0 || options.ppq > MAX_PPQ {
        return Err(MidiExportError::InvalidPpq(options.ppq));
    }

    let header = Header {
        format: midly::Format::Parallel,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let mut meta_track = Track::new();
    if options.track_names {
        add_track_name(&mut meta_track, META_TRACK_NAME);
    }
    if options.include_tempo {
        add_tempo(&mut meta_track, tempo_bpm);
    }
    if options.include_time_signature {
        add_time_signature(&mut meta_track);
    }
    add_end_of_track(&mut meta_track, 0);

    let ticks_per_second = calculate_ticks_per_second(tempo_bpm, options.ppq);
    let chord_track = create_chord_track(notes, ticks_per_second, options);

    let smf = Smf {
        header,
        tracks: vec![meta_track, chord_track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiExportError::Write(e.to_string()))?;

    log::debug!(
        "Wrote {} notes as {} bytes of MIDI at {} BPM",
        notes.len(),
        bytes.len(),
        tempo_bpm
    );
    Ok(bytes)
}

fn create_chord_track(
    notes: &[NoteEvent],
    ticks_per_second: f64,
    options: &MidiExportOptions,
) -> Track<'static> {
    let mut track = Track::new();
    if options.track_names {
        add_track_name(&mut track, CHORD_TRACK_NAME);
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Midi {
            channel: 0.into(),
            message: MidiMessage::ProgramChange {
                program: options.program.min(127).into(),
            },
        },
    });

    // (tick, is_note_on, event): note-offs sort before note-ons on the same
    // tick so a repeated pitch in back-to-back chords is re-struck.
    let mut events: Vec<(u32, bool, TrackEventKind<'static>)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let tick_on = seconds_to_ticks(note.start, ticks_per_second);
        // At least one tick long, so the off never sorts ahead of its own on.
        let tick_off = seconds_to_ticks(note.end, ticks_per_second).max(tick_on + 1);
        events.push((
            tick_on,
            true,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: note.pitch.into(),
                    vel: note.velocity.into(),
                },
            },
        ));
        events.push((
            tick_off,
            false,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: note.pitch.into(),
                    vel: 0.into(),
                },
            },
        ));
    }
    events.sort_by_key(|(tick, is_on, _)| (*tick, *is_on));

    let mut last_tick = 0;
    for (tick, _, kind) in events {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    add_end_of_track(&mut track, 0);
    track
}

fn calculate_ticks_per_second(bpm: u32, ppq: u16) -> f64 {
    f64::from(ppq) * f64::from(bpm) / 60.0
}

fn seconds_to_ticks(seconds: f64, ticks_per_second: f64) -> u32 {
    (seconds * ticks_per_second).round() as u32
}

fn add_track_name(track: &mut Track<'static>, name: &'static str) {
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });
}

fn add_tempo(track: &mut Track<'static>, bpm: u32) {
    let us_per_quarter = 60_000_000 / bpm;
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}

fn add_time_signature(track: &mut Track<'static>) {
    // 4/4 (denominator as a power of two), 24 clocks per click, 8 32nds per quarter
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
    });
}

fn add_end_of_track(track: &mut Track<'static>, delta: u32) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
