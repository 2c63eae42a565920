use crate::segment::RawSegment;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// `start end label...` with the label being the rest of the line.
/// Missing fields are allowed here and rejected later by normalization.
static LAB_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<start>\S+)(?:\s+(?P<end>\S+))?(?:\s+(?P<label>.*?))?\s*$").unwrap()
});

/// Failure of the external chord recognizer. Surfaced to callers as is.
#[derive(Error, Debug)]
pub enum RecognitionFailure {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: expected a JSON array of segments")]
    NotAnArray { path: String },
    #[error("unsupported recognizer output: {0}")]
    UnsupportedSource(String),
    #[error("recognizer failed: {0}")]
    Recognizer(String),
}

/// The chord-recognition collaborator: turns a source into raw `(start, end, label)` triples.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, source: &Path) -> Result<Vec<RawSegment>, RecognitionFailure>;
}

impl<F> Recognizer for F
where
    F: Fn(&Path) -> Result<Vec<RawSegment>, RecognitionFailure> + Send + Sync,
{
    fn recognize(&self, source: &Path) -> Result<Vec<RawSegment>, RecognitionFailure> {
        self(source)
    }
}

/// Reads recognizer output that has already been written to disk.
///
/// `.lab`/`.txt` files hold one `start end label` line per segment (MIREX
/// style); `.json` files hold an array of `[start, end, label]` arrays or
/// `{start, end, label}` objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabFileRecognizer;

impl LabFileRecognizer {
    /// Blank lines and `#` comments are skipped.
    pub fn parse_lab(text: &str) -> Vec<RawSegment> {
        text.lines()
            .filter(|line| {
                let t = line.trim();
                !t.is_empty() && !t.starts_with('#')
            })
            .filter_map(|line| LAB_LINE_RE.captures(line))
            .map(|caps| {
                let field = |name: &str| {
                    caps.name(name)
                        .map(|m| Value::String(m.as_str().to_string()))
                        .unwrap_or(Value::Null)
                };
                RawSegment {
                    start: field("start"),
                    end: field("end"),
                    label: field("label"),
                }
            })
            .collect()
    }

    pub fn parse_json(text: &str, path: &str) -> Result<Vec<RawSegment>, RecognitionFailure> {
        let value: Value = serde_json::from_str(text).map_err(|source| RecognitionFailure::Json {
            path: path.to_string(),
            source,
        })?;
        match value {
            Value::Array(items) => Ok(items.into_iter().map(RawSegment::from).collect()),
            _ => Err(RecognitionFailure::NotAnArray {
                path: path.to_string(),
            }),
        }
    }
}

impl Recognizer for LabFileRecognizer {
    fn recognize(&self, source: &Path) -> Result<Vec<RawSegment>, RecognitionFailure> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let path = source.display().to_string();

        if !crate::SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(RecognitionFailure::UnsupportedSource(path));
        }

        let text = std::fs::read_to_string(source).map_err(|source| RecognitionFailure::Io {
            path: path.clone(),
            source,
        })?;

        let raw = if ext == "json" {
            Self::parse_json(&text, &path)?
        } else {
            Self::parse_lab(&text)
        };
        log::debug!("Read {} raw segments from {}", raw.len(), path);
        Ok(raw)
    }
}
