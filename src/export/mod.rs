pub mod midi;

use crate::analysis::AnalysisResult;
use crate::metadata::AudioMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write;

/// Serialization formats for an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Top-level JSON export document.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<&'a AudioMetadata>,
    pub analysis: &'a AnalysisResult,
}

impl<'a> ExportDocument<'a> {
    pub fn new(analysis: &'a AnalysisResult) -> Self {
        Self {
            generated_at: Utc::now(),
            source: None,
            audio: None,
            analysis,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_audio(mut self, audio: &'a AudioMetadata) -> Self {
        self.audio = Some(audio);
        self
    }
}

pub fn to_json(document: &ExportDocument<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

/// One `start,end,label` row per valid segment.
pub fn timeline_csv(result: &AnalysisResult) -> String {
    let mut out = String::from("start,end,label\n");
    for segment in result.sequence().valid_segments() {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{}",
            segment.start,
            segment.end,
            csv_field(&segment.label)
        );
    }
    out
}

/// One `label,count,share` row per distinct label, most frequent first.
pub fn distribution_csv(result: &AnalysisResult) -> String {
    let mut out = String::from("label,count,share\n");
    for (lc, share) in result.statistics().ranked_distribution() {
        let _ = writeln!(out, "{},{},{:.4}", csv_field(&lc.label), lc.count, share);
    }
    out
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
