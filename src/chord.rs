use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Absolute MIDI note of pitch class 0 (middle C, C4).
pub const MIDDLE_C: u8 = 60;

/// Intervals used for any quality missing from the table.
pub const DEFAULT_INTERVALS: &[u8] = &[0, 4, 7];

/// Root spellings, upper-cased, mapped to pitch class.
/// Flats appear as `DB`, `EB`, ... because lookup happens after upper-casing.
const ROOTS: &[(&str, u8)] = &[
    ("C", 0),
    ("C#", 1),
    ("DB", 1),
    ("D", 2),
    ("D#", 3),
    ("EB", 3),
    ("E", 4),
    ("F", 5),
    ("F#", 6),
    ("GB", 6),
    ("G", 7),
    ("G#", 8),
    ("AB", 8),
    ("A", 9),
    ("A#", 10),
    ("BB", 10),
    ("B", 11),
];

/// Built-in quality → semitone offsets from the root.
const QUALITIES: &[(&str, &[u8])] = &[
    ("", &[0, 4, 7]),
    ("maj", &[0, 4, 7]),
    ("min", &[0, 3, 7]),
    ("m", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
    ("min7", &[0, 3, 7, 10]),
    ("5", &[0, 7]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("dim7", &[0, 3, 6, 9]),
    ("hdim7", &[0, 3, 6, 10]),
    ("minmaj7", &[0, 3, 7, 11]),
    ("maj6", &[0, 4, 7, 9]),
    ("min6", &[0, 3, 7, 9]),
    ("9", &[0, 4, 7, 10, 14]),
];

static DEFAULT_PARSER: LazyLock<ChordParser> = LazyLock::new(ChordParser::default);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown root {root:?} in chord label {label:?}")]
    UnknownRoot { label: String, root: String },
}

/// A chord label resolved to pitches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedChord {
    /// 0 (C) to 11 (B).
    pub root_pitch_class: u8,
    /// Absolute MIDI root in the octave starting at middle C.
    pub root: u8,
    pub quality: String,
    /// Ascending semitone offsets from the root.
    pub intervals: Vec<u8>,
    /// False when the quality was not in the table and the major triad was used.
    pub known_quality: bool,
}

impl ParsedChord {
    /// Absolute pitches in ascending interval order. May exceed 127 for wide custom qualities.
    pub fn pitches(&self) -> impl Iterator<Item = u16> + '_ {
        self.intervals.iter().map(|&i| u16::from(self.root) + u16::from(i))
    }
}

/// Pitch class of a root spelling (`C`, `F#`, `Bb`, ...), case-insensitive.
pub fn root_pitch_class(root: &str) -> Option<u8> {
    let key = root.trim().to_uppercase();
    ROOTS.iter().find(|(name, _)| *name == key).map(|&(_, pc)| pc)
}

/// Chord label parser over an extensible quality table.
#[derive(Debug, Clone)]
pub struct ChordParser {
    qualities: HashMap<String, Vec<u8>>,
}

impl Default for ChordParser {
    fn default() -> Self {
        Self {
            qualities: QUALITIES
                .iter()
                .map(|&(name, intervals)| (name.to_string(), intervals.to_vec()))
                .collect(),
        }
    }
}

impl ChordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a quality. Intervals are sorted and deduplicated.
    pub fn with_quality(mut self, name: impl Into<String>, intervals: impl Into<Vec<u8>>) -> Self {
        let mut intervals = intervals.into();
        intervals.sort_unstable();
        intervals.dedup();
        self.qualities.insert(name.into(), intervals);
        self
    }

    pub fn intervals(&self, quality: &str) -> Option<&[u8]> {
        self.qualities.get(quality).map(Vec::as_slice)
    }

    /// Parse `ROOT[:QUALITY]`.
    ///
    /// Unknown roots fail; unknown qualities fall back to a major triad.
    pub fn parse(&self, label: &str) -> Result<ParsedChord, ParseError> {
        let (root, quality) = label.split_once(':').unwrap_or((label, ""));
        let quality = quality.trim();

        let root_pitch_class = root_pitch_class(root).ok_or_else(|| ParseError::UnknownRoot {
            label: label.to_string(),
            root: root.trim().to_string(),
        })?;

        let (intervals, known_quality) = match self.intervals(quality) {
            Some(intervals) => (intervals.to_vec(), true),
            None => (DEFAULT_INTERVALS.to_vec(), false),
        };

        Ok(ParsedChord {
            root_pitch_class,
            root: MIDDLE_C + root_pitch_class,
            quality: quality.to_string(),
            intervals,
            known_quality,
        })
    }
}

/// Shared parser with the built-in quality table.
pub fn default_parser() -> &'static ChordParser {
    &DEFAULT_PARSER
}

/// Parse with the built-in quality table.
pub fn parse(label: &str) -> Result<ParsedChord, ParseError> {
    DEFAULT_PARSER.parse(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_major() {
        let chord = parse("D:maj").unwrap();
        assert_eq!(chord.root_pitch_class, 2);
        assert_eq!(chord.root, 62);
        assert_eq!(chord.intervals, vec![0, 4, 7]);
        assert!(chord.known_quality);
    }

    #[test]
    fn test_parse_flat_minor() {
        let chord = parse("Bb:min").unwrap();
        assert_eq!(chord.root, 70);
        assert_eq!(chord.quality, "min");
        assert_eq!(chord.intervals, vec![0, 3, 7]);
    }

    #[test]
    fn test_unknown_root_fails() {
        let err = parse("Xb:maj").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownRoot {
                label: "Xb:maj".into(),
                root: "Xb".into()
            }
        );
        assert!(parse("N").is_err());
        assert!(parse("").is_err());
        assert!(parse(":maj").is_err());
    }

    #[test]
    fn test_root_is_trimmed_and_case_insensitive() {
        assert_eq!(parse(" f#:7").unwrap().root, 66);
        assert_eq!(parse("eb").unwrap().root, 63);
        assert_eq!(root_pitch_class("GB"), Some(6));
        assert_eq!(root_pitch_class("H"), None);
    }

    #[test]
    fn test_no_quality_defaults_to_major() {
        let chord = parse("G").unwrap();
        assert_eq!(chord.quality, "");
        assert_eq!(chord.intervals, vec![0, 4, 7]);
        assert!(chord.known_quality);
    }

    #[test]
    fn test_unknown_quality_degrades_to_major_triad() {
        let chord = parse("A:weird(9,11)").unwrap();
        assert_eq!(chord.root, 69);
        assert_eq!(chord.intervals, DEFAULT_INTERVALS.to_vec());
        assert!(!chord.known_quality);

        // Bass annotations are not in the table either
        let slash = parse("C:maj/3").unwrap();
        assert_eq!(slash.intervals, vec![0, 4, 7]);
    }

    #[test]
    fn test_only_first_colon_splits() {
        let chord = parse("C:min:extra").unwrap();
        assert_eq!(chord.quality, "min:extra");
        assert!(!chord.known_quality);
    }

    #[test]
    fn test_quality_table() {
        let parser = ChordParser::new();
        assert_eq!(parser.intervals("dim"), Some(&[0, 3, 6][..]));
        assert_eq!(parser.intervals("aug"), Some(&[0, 4, 8][..]));
        assert_eq!(parser.intervals("7"), Some(&[0, 4, 7, 10][..]));
        assert_eq!(parser.intervals("maj7"), Some(&[0, 4, 7, 11][..]));
        assert_eq!(parser.intervals("m7"), Some(&[0, 3, 7, 10][..]));
        assert_eq!(parser.intervals("m"), Some(&[0, 3, 7][..]));
        assert_eq!(parser.intervals("nope"), None);
    }

    #[test]
    fn test_custom_quality_sorted() {
        let parser = ChordParser::new().with_quality("7sus4", vec![10, 0, 7, 5, 7]);
        let chord = parser.parse("C:7sus4").unwrap();
        assert_eq!(chord.intervals, vec![0, 5, 7, 10]);
        assert!(chord.known_quality);
        // The shared parser is unaffected
        assert!(!parse("C:7sus4").unwrap().known_quality);
    }

    #[test]
    fn test_pitches() {
        let chord = parse("C:maj7").unwrap();
        let pitches: Vec<u16> = chord.pitches().collect();
        assert_eq!(pitches, vec![60, 64, 67, 71]);
    }
}
