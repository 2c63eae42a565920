use crate::segment::{ChordSequence, NO_CHORD};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Number of transitions presentation layers show by default.
pub const DEFAULT_TOP_TRANSITIONS: usize = 10;

const TRANSITION_ARROW: &str = " → ";

/// Complexity score thresholds (score = diversity ratio × 100).
const SIMPLE_BELOW: f64 = 30.0;
const MODERATE_BELOW: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// An ordered pair of consecutive valid labels and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// `"{from} → {to}"`.
    pub pattern: String,
    pub from: String,
    pub to: String,
    pub count: usize,
}

/// Major/minor split of a label.
///
/// This is a substring heuristic, not harmonic analysis: a label counts as
/// minor when the text after its first `:` contains `m`. Qualities such as
/// `maj` or `maj7` therefore land in the minor bucket too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicQuality {
    Major,
    Minor,
    NoChord,
}

pub fn classify_quality(label: &str) -> HarmonicQuality {
    if label == NO_CHORD {
        return HarmonicQuality::NoChord;
    }
    let quality = label.split_once(':').map(|(_, q)| q).unwrap_or("");
    if quality.contains('m') {
        HarmonicQuality::Minor
    } else {
        HarmonicQuality::Major
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Complexity {
    /// 0-100.
    pub score: f64,
    pub level: ComplexityLevel,
}

/// Statistics derived from the valid segments of a [`ChordSequence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordStatistics {
    pub total_count: usize,
    pub unique_count: usize,
    /// Label counts in first-seen order.
    pub distribution: Vec<LabelCount>,
    /// Highest count; ties go to the label seen first.
    pub most_common: Option<LabelCount>,
    /// End time of the last segment, trailing no-chord or invalid regions included.
    pub duration: f64,
    /// Bigram transitions ranked by count, ties in first-seen order.
    pub transitions: Vec<Transition>,
    pub diversity_ratio: f64,
    pub change_count: usize,
    pub change_ratio: f64,
    pub longest_run: usize,
    pub major_count: usize,
    pub minor_count: usize,
    pub average_chord_duration: f64,
}

impl ChordStatistics {
    /// Occurrences of `label` among valid segments.
    pub fn count_of(&self, label: &str) -> usize {
        self.distribution
            .iter()
            .find(|lc| lc.label == label)
            .map(|lc| lc.count)
            .unwrap_or(0)
    }

    /// Distribution sorted by count (descending, stable) with each label's share of the total.
    pub fn ranked_distribution(&self) -> Vec<(&LabelCount, f64)> {
        let mut ranked: Vec<&LabelCount> = self.distribution.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
            .into_iter()
            .map(|lc| (lc, ratio(lc.count, self.total_count)))
            .collect()
    }

    pub fn top_transitions(&self, limit: usize) -> &[Transition] {
        &self.transitions[..limit.min(self.transitions.len())]
    }

    pub fn major_ratio(&self) -> f64 {
        ratio(self.major_count, self.total_count)
    }

    pub fn minor_ratio(&self) -> f64 {
        ratio(self.minor_count, self.total_count)
    }

    /// Only meaningful with at least two valid segments.
    pub fn complexity(&self) -> Option<Complexity> {
        if self.total_count <= 1 {
            return None;
        }
        let score = self.diversity_ratio * 100.0;
        let level = if score < SIMPLE_BELOW {
            ComplexityLevel::Simple
        } else if score < MODERATE_BELOW {
            ComplexityLevel::Moderate
        } else {
            ComplexityLevel::Complex
        };
        Some(Complexity { score, level })
    }

    /// Valid labels joined with arrows, for progression summaries.
    pub fn progression_summary(sequence: &ChordSequence) -> String {
        sequence.valid_labels().join(TRANSITION_ARROW)
    }
}

/// Compute statistics over the valid segments of `sequence`.
pub fn compute(sequence: &ChordSequence) -> ChordStatistics {
    let labels = sequence.valid_labels();
    let total_count = labels.len();

    let distribution: Vec<LabelCount> = count_first_seen(labels.iter().copied())
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();

    let most_common = distribution
        .iter()
        .fold(None::<&LabelCount>, |best, lc| match best {
            Some(b) if b.count >= lc.count => Some(b),
            _ => Some(lc),
        })
        .cloned();

    let change_count = labels.windows(2).filter(|w| w[0] != w[1]).count();
    let change_ratio = if total_count > 1 {
        change_count as f64 / (total_count - 1) as f64
    } else {
        0.0
    };

    let (major_count, minor_count) =
        labels
            .iter()
            .fold((0, 0), |(major, minor), label| match classify_quality(label) {
                HarmonicQuality::Major => (major + 1, minor),
                HarmonicQuality::Minor => (major, minor + 1),
                HarmonicQuality::NoChord => (major, minor),
            });

    let duration = sequence.end_time();

    ChordStatistics {
        total_count,
        unique_count: distribution.len(),
        diversity_ratio: ratio(distribution.len(), total_count),
        most_common,
        distribution,
        duration,
        transitions: rank_transitions(&labels),
        change_count,
        change_ratio,
        longest_run: longest_run(&labels),
        major_count,
        minor_count,
        average_chord_duration: if total_count > 0 {
            duration / total_count as f64
        } else {
            0.0
        },
    }
}

fn rank_transitions(labels: &[&str]) -> Vec<Transition> {
    let pairs = labels.windows(2).map(|w| (w[0], w[1]));
    let mut transitions: Vec<Transition> = count_first_seen(pairs)
        .into_iter()
        .map(|((from, to), count)| Transition {
            pattern: format!("{}{}{}", from, TRANSITION_ARROW, to),
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts
    transitions.sort_by(|a, b| b.count.cmp(&a.count));
    transitions
}

fn longest_run(labels: &[&str]) -> usize {
    labels.chunk_by(|a, b| a == b).map(|run| run.len()).max().unwrap_or(0)
}

/// Count items, keeping keys in the order they first appear.
fn count_first_seen<K, I>(items: I) -> Vec<(K, usize)>
where
    K: Hash + Eq + Copy,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for item in items {
        match index.get(&item) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(item, counts.len());
                counts.push((item, 1));
            }
        }
    }
    counts
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
