use crate::recognizer::{RecognitionFailure, Recognizer};
use crate::segment::{self, ChordSequence, MalformedSegmentError, RawSegment};
use crate::stats::{self, ChordStatistics};
use crate::synth::{self, NoteEvent, SynthesisError};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no valid chord segments to analyze")]
    Empty,
    #[error("chord recognition failed: {0}")]
    Recognition(#[from] RecognitionFailure),
}

/// Immutable outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    segments: ChordSequence,
    statistics: ChordStatistics,
    duration: f64,
    rejected: Vec<MalformedSegmentError>,
}

impl AnalysisResult {
    pub fn sequence(&self) -> &ChordSequence {
        &self.segments
    }

    pub fn statistics(&self) -> &ChordStatistics {
        &self.statistics
    }

    /// Seconds covered by the analyzed audio (end of the last segment).
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Raw elements dropped during normalization.
    pub fn rejected(&self) -> &[MalformedSegmentError] {
        &self.rejected
    }

    /// Synthesize playback notes from this result's segments.
    pub fn synthesize(&self, tempo_bpm: u32) -> Result<Vec<NoteEvent>, SynthesisError> {
        synth::synthesize(&self.segments, tempo_bpm)
    }
}

/// Normalize raw triples and compute their statistics.
pub fn analyze<I>(raw: I) -> Result<AnalysisResult, AnalysisError>
where
    I: IntoIterator<Item = RawSegment>,
{
    let normalized = segment::normalize(raw);
    let sequence = normalized.sequence;

    if sequence.valid_count() == 0 {
        return Err(AnalysisError::Empty);
    }

    let statistics = stats::compute(&sequence);
    log::info!(
        "Analyzed {} segments ({} valid, {} rejected) over {:.1}s",
        sequence.len(),
        statistics.total_count,
        normalized.rejected.len(),
        statistics.duration
    );

    Ok(AnalysisResult {
        duration: statistics.duration,
        segments: sequence,
        statistics,
        rejected: normalized.rejected,
    })
}

/// Run `recognizer` on `source` and analyze its output. Recognizer failures are not retried.
pub fn analyze_source<R>(recognizer: &R, source: &Path) -> Result<AnalysisResult, AnalysisError>
where
    R: Recognizer + ?Sized,
{
    let raw = recognizer.recognize(source)?;
    analyze(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(segments: &[(f64, f64, &str)]) -> Vec<RawSegment> {
        segments
            .iter()
            .map(|&(start, end, label)| RawSegment::new(start, end, label))
            .collect()
    }

    #[test]
    fn test_analyze_empty_input() {
        assert!(matches!(analyze(Vec::new()), Err(AnalysisError::Empty)));
    }

    #[test]
    fn test_analyze_only_invalid_labels() {
        let result = analyze(raw(&[(0.0, 1.0, ""), (1.0, 2.0, "nan")]));
        assert!(matches!(result, Err(AnalysisError::Empty)));
    }

    #[test]
    fn test_analyze_packages_sequence_and_statistics() {
        let result = analyze(raw(&[
            (0.0, 2.0, "C:maj"),
            (2.0, 4.0, "G:maj"),
            (4.0, 6.0, "nan"),
            (6.0, 8.0, "C:maj"),
        ]))
        .unwrap();

        assert_eq!(result.sequence().len(), 4);
        assert_eq!(result.statistics().total_count, 3);
        assert_eq!(result.statistics().unique_count, 2);
        assert!((result.duration() - 8.0).abs() < 1e-9);
        assert!(result.rejected().is_empty());
    }

    #[test]
    fn test_analyze_reports_rejected_elements() {
        let mut input = raw(&[(0.0, 1.0, "C"), (1.0, 2.0, "G")]);
        input.push(RawSegment::new("oops", 3.0, "A"));
        let result = analyze(input).unwrap();
        assert_eq!(result.statistics().total_count, 2);
        assert_eq!(result.rejected().len(), 1);
        assert_eq!(result.rejected()[0].index, 2);
    }

    #[test]
    fn test_reanalysis_is_independent() {
        let input = raw(&[(0.0, 1.0, "C:maj"), (1.0, 2.0, "A:min")]);
        let first = analyze(input.clone()).unwrap();
        let second = analyze(input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_synthesizes() {
        let result = analyze(raw(&[(0.0, 1.0, "C:maj"), (1.0, 2.0, "C:maj")])).unwrap();
        assert_eq!(result.synthesize(synth::DEFAULT_TEMPO_BPM).unwrap().len(), 6);
    }

    #[test]
    fn test_recognition_failure_surfaces() {
        let failing = |_: &Path| -> Result<Vec<RawSegment>, RecognitionFailure> {
            Err(RecognitionFailure::Recognizer("model crashed".into()))
        };
        let err = analyze_source(&failing, Path::new("song.wav")).unwrap_err();
        match err {
            AnalysisError::Recognition(RecognitionFailure::Recognizer(msg)) => {
                assert_eq!(msg, "model crashed")
            }
            other => panic!("expected recognition failure, got {other:?}"),
        }
    }

    #[test]
    fn test_analyze_source_success() {
        let recognizer = |_: &Path| -> Result<Vec<RawSegment>, RecognitionFailure> {
            Ok(vec![
                RawSegment::new(0.0, 1.0, "E:min"),
                RawSegment::new(1.0, 2.0, "N"),
            ])
        };
        let result = analyze_source(&recognizer, Path::new("song.wav")).unwrap();
        assert_eq!(result.statistics().total_count, 2);
    }

    #[test]
    fn test_results_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnalysisResult>();
    }
}
