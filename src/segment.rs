use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Label the recognizer emits for regions with no discernible harmony.
pub const NO_CHORD: &str = "N";

/// Label text produced for missing values by some recognizers; never a chord.
const MISSING_LABEL: &str = "nan";

/// One element of raw recognizer output, before any validation.
///
/// Fields are kept as loosely-typed JSON values because recognizers hand back
/// whatever their runtime produces (numbers, numeric strings, nulls). All
/// coercion happens in [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub start: Value,
    pub end: Value,
    pub label: Value,
}

impl RawSegment {
    pub fn new(start: impl Into<Value>, end: impl Into<Value>, label: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            label: label.into(),
        }
    }
}

/// Accepts exact `[start, end, label]` arrays and `{"start", "end", "label"}` objects.
/// Anything else, including longer arrays, becomes a segment of nulls, which [`normalize`] rejects.
impl From<Value> for RawSegment {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(mut items) if items.len() == 3 => {
                let label = items.pop().unwrap_or(Value::Null);
                let end = items.pop().unwrap_or(Value::Null);
                let start = items.pop().unwrap_or(Value::Null);
                Self { start, end, label }
            }
            Value::Object(mut map) => Self {
                start: map.remove("start").unwrap_or(Value::Null),
                end: map.remove("end").unwrap_or(Value::Null),
                label: map.remove("label").unwrap_or(Value::Null),
            },
            _ => Self::new(Value::Null, Value::Null, Value::Null),
        }
    }
}

/// Why a raw element was dropped during normalization.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MalformedReason {
    #[error("{field} is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },
    #[error("{field} is not finite")]
    NonFinite { field: &'static str },
    #[error("start {start} is negative")]
    NegativeStart { start: f64 },
    #[error("end {end} precedes start {start}")]
    EndBeforeStart { start: f64, end: f64 },
}

/// A raw element that could not become a [`ChordSegment`].
/// Reported to the caller; the element is dropped and processing continues.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("malformed segment #{index}: {reason}")]
pub struct MalformedSegmentError {
    /// Position of the element in the raw input.
    pub index: usize,
    pub reason: MalformedReason,
}

/// A validated chord segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordSegment {
    pub start: f64,
    pub end: f64,
    pub label: String,
    valid: bool,
}

impl ChordSegment {
    /// Build a segment from an already-stripped label.
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        let label = label.into();
        let valid = is_valid_label(&label);
        Self {
            start,
            end,
            label,
            valid,
        }
    }

    /// Valid segments take part in statistics and synthesis.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_no_chord(&self) -> bool {
        self.label == NO_CHORD
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A label is valid when it is non-empty and not the literal `nan` (case-sensitive).
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label != MISSING_LABEL
}

/// Ordered, immutable sequence of chord segments, invalid ones included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChordSequence {
    segments: Vec<ChordSegment>,
}

impl ChordSequence {
    pub fn segments(&self) -> &[ChordSegment] {
        &self.segments
    }

    pub fn valid_segments(&self) -> impl Iterator<Item = &ChordSegment> {
        self.segments.iter().filter(|s| s.is_valid())
    }

    pub fn valid_labels(&self) -> Vec<&str> {
        self.valid_segments().map(|s| s.label.as_str()).collect()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_segments().count()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End time of the last segment, whether valid or not. 0 for an empty sequence.
    pub fn end_time(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }

    /// Valid segments with runs of identical labels merged into one span.
    /// Invalid segments are left out of this view.
    pub fn coalesced(&self) -> Vec<ChordSegment> {
        let mut merged: Vec<ChordSegment> = Vec::new();
        for segment in self.valid_segments() {
            match merged.last_mut() {
                Some(last) if last.label == segment.label => last.end = segment.end,
                _ => merged.push(segment.clone()),
            }
        }
        merged
    }

    /// Lay out bare labels back-to-back, `seconds_per_chord` each, and normalize them.
    pub fn from_labels<I, S>(labels: I, seconds_per_chord: f64) -> Normalized
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw = labels.into_iter().enumerate().map(|(i, label)| {
            let start = i as f64 * seconds_per_chord;
            let end = (i + 1) as f64 * seconds_per_chord;
            let label: String = label.into();
            RawSegment::new(start, end, label)
        });
        normalize(raw)
    }
}

/// Output of [`normalize`]: the clean sequence plus every element that was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub sequence: ChordSequence,
    pub rejected: Vec<MalformedSegmentError>,
}

/// Validate raw recognizer output into a [`ChordSequence`].
///
/// Numeric fields are coerced to seconds and checked against the time
/// invariants; labels are coerced to text and stripped. Elements that fail are
/// dropped and reported in [`Normalized::rejected`]. The producer's
/// segmentation is kept as is; out-of-order starts are stably re-sorted.
pub fn normalize<I>(raw: I) -> Normalized
where
    I: IntoIterator<Item = RawSegment>,
{
    let mut segments = Vec::new();
    let mut rejected = Vec::new();

    for (index, item) in raw.into_iter().enumerate() {
        match coerce_segment(&item) {
            Ok(segment) => segments.push(segment),
            Err(reason) => {
                let err = MalformedSegmentError { index, reason };
                log::warn!("Dropping {}", err);
                rejected.push(err);
            }
        }
    }

    if segments.windows(2).any(|w| w[1].start < w[0].start) {
        log::warn!("Segment start times out of order; re-sorting by start");
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    Normalized {
        sequence: ChordSequence { segments },
        rejected,
    }
}

fn coerce_segment(raw: &RawSegment) -> Result<ChordSegment, MalformedReason> {
    let start = coerce_seconds(&raw.start, "start")?;
    let end = coerce_seconds(&raw.end, "end")?;

    if start < 0.0 {
        return Err(MalformedReason::NegativeStart { start });
    }
    if end < start {
        return Err(MalformedReason::EndBeforeStart { start, end });
    }

    Ok(ChordSegment::new(start, end, coerce_label(&raw.label)))
}

fn coerce_seconds(value: &Value, field: &'static str) -> Result<f64, MalformedReason> {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    match seconds {
        Some(s) if s.is_finite() => Ok(s),
        Some(_) => Err(MalformedReason::NonFinite { field }),
        None => Err(MalformedReason::NotNumeric {
            field,
            value: value.to_string(),
        }),
    }
}

fn coerce_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(start: f64, end: f64, label: &str) -> RawSegment {
        RawSegment::new(start, end, label)
    }

    #[test]
    fn test_label_validity() {
        assert!(is_valid_label("C:maj"));
        assert!(is_valid_label("N"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("nan"));
        // Case-sensitive: only the exact lowercase text is a missing value
        assert!(is_valid_label("NaN"));
    }

    #[test]
    fn test_invalid_labels_retained_but_flagged() {
        let normalized = normalize(vec![
            seg(0.0, 1.0, "C:maj"),
            seg(1.0, 2.0, "   "),
            seg(2.0, 3.0, "nan"),
            seg(3.0, 4.0, " G:min "),
        ]);

        let seq = &normalized.sequence;
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.valid_count(), 2);
        assert_eq!(seq.valid_labels(), vec!["C:maj", "G:min"]);
        assert!(!seq.segments()[1].is_valid());
        assert_eq!(seq.segments()[1].label, "");
        assert!(normalized.rejected.is_empty());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let normalized = normalize(vec![
            // Booleans count as 0 and 1
            RawSegment::new(false, true, "G:maj"),
            RawSegment::new(" 0.5", "1.25", "A:min"),
        ]);
        let b = &normalized.sequence.segments()[0];
        assert_eq!((b.start, b.end), (0.0, 1.0));

        let s = &normalized.sequence.segments()[1];
        assert!((s.start - 0.5).abs() < 1e-9);
        assert!((s.end - 1.25).abs() < 1e-9);
        assert!(normalized.rejected.is_empty());
    }

    #[test]
    fn test_non_string_labels_use_text_form() {
        let normalized = normalize(vec![
            RawSegment::new(0.0, 1.0, 7),
            RawSegment::new(1.0, 2.0, Value::Null),
        ]);
        let segs = normalized.sequence.segments();
        assert_eq!(segs[0].label, "7");
        assert!(segs[0].is_valid());
        assert!(!segs[1].is_valid());
    }

    #[test]
    fn test_malformed_elements_dropped_and_reported() {
        let normalized = normalize(vec![
            seg(0.0, 1.0, "C"),
            RawSegment::new("abc", 2.0, "D"),
            RawSegment::new(2.0, Value::Null, "E"),
            seg(3.0, 4.0, "F"),
        ]);

        assert_eq!(normalized.sequence.valid_labels(), vec!["C", "F"]);
        assert_eq!(normalized.rejected.len(), 2);
        assert_eq!(normalized.rejected[0].index, 1);
        assert!(matches!(
            normalized.rejected[0].reason,
            MalformedReason::NotNumeric { field: "start", .. }
        ));
        assert_eq!(normalized.rejected[1].index, 2);
        assert!(matches!(
            normalized.rejected[1].reason,
            MalformedReason::NotNumeric { field: "end", .. }
        ));
    }

    #[test]
    fn test_time_invariants_enforced() {
        let normalized = normalize(vec![
            seg(-1.0, 1.0, "C"),
            seg(2.0, 1.5, "D"),
            RawSegment::new("inf", 5.0, "E"),
            seg(1.0, 1.0, "F"), // zero-length is allowed
        ]);

        assert_eq!(normalized.sequence.valid_labels(), vec!["F"]);
        let reasons: Vec<_> = normalized.rejected.iter().map(|e| &e.reason).collect();
        assert!(matches!(reasons[0], MalformedReason::NegativeStart { .. }));
        assert!(matches!(reasons[1], MalformedReason::EndBeforeStart { .. }));
        assert!(matches!(reasons[2], MalformedReason::NonFinite { field: "start" }));
    }

    #[test]
    fn test_raw_segment_from_json_shapes() {
        let from_array = RawSegment::from(json!([0.0, 1.5, "C:maj"]));
        assert_eq!(from_array, RawSegment::new(0.0, 1.5, "C:maj"));

        let from_object = RawSegment::from(json!({"start": 1, "end": "2", "label": "G"}));
        assert_eq!(from_object, RawSegment::new(1, "2", "G"));

        let short = RawSegment::from(json!([0.0, 1.0]));
        let long = RawSegment::from(json!([0.0, 1.0, "C:maj", 0.93]));
        assert_eq!(long, RawSegment::new(Value::Null, Value::Null, Value::Null));
        let normalized = normalize(vec![short, long]);
        assert!(normalized.sequence.is_empty());
        assert_eq!(normalized.rejected.len(), 2);
        assert_eq!(normalized.rejected[1].index, 1);
    }

    #[test]
    fn test_ordered_input_is_not_reordered_or_merged() {
        let normalized = normalize(vec![
            seg(0.0, 1.0, "C"),
            seg(1.0, 2.0, "C"),
            seg(2.0, 3.0, "G"),
        ]);
        let labels: Vec<_> = normalized.sequence.segments().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "C", "G"]);
    }

    #[test]
    fn test_out_of_order_input_is_stably_sorted() {
        let normalized = normalize(vec![
            seg(2.0, 3.0, "G"),
            seg(0.0, 1.0, "C"),
            seg(0.0, 1.0, "Am"),
        ]);
        let labels: Vec<_> = normalized.sequence.segments().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "Am", "G"]);
    }

    #[test]
    fn test_end_time_includes_trailing_invalid_segment() {
        let normalized = normalize(vec![seg(0.0, 2.0, "C"), seg(2.0, 9.5, "nan")]);
        assert!((normalized.sequence.end_time() - 9.5).abs() < 1e-9);
        assert_eq!(ChordSequence::default().end_time(), 0.0);
    }

    #[test]
    fn test_coalesced_view() {
        let normalized = normalize(vec![
            seg(0.0, 1.0, "C"),
            seg(1.0, 2.0, "C"),
            seg(2.0, 3.0, ""),
            seg(3.0, 4.0, "C"),
            seg(4.0, 5.0, "G"),
        ]);
        let merged = normalized.sequence.coalesced();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].label, "C");
        assert!((merged[0].end - 4.0).abs() < 1e-9);
        assert_eq!(merged[1].label, "G");
        // The underlying sequence is untouched
        assert_eq!(normalized.sequence.len(), 5);
    }

    #[test]
    fn test_from_labels_lays_out_fixed_durations() {
        let normalized = ChordSequence::from_labels(["D:maj", "G:maj", "A:7"], 2.0);
        let segs = normalized.sequence.segments();
        assert_eq!(segs.len(), 3);
        assert!((segs[1].start - 2.0).abs() < 1e-9);
        assert!((segs[1].end - 4.0).abs() < 1e-9);
        assert_eq!(segs[2].label, "A:7");
        assert!((normalized.sequence.end_time() - 6.0).abs() < 1e-9);
    }
}
