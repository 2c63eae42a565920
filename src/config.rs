use std::collections::BTreeMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::chord::ChordParser;
use crate::export::ExportFormat;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers for batch analysis. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    pub synthesis: SynthesisConfig,
    pub export: ExportConfig,
    pub progression: ProgressionConfig,
    pub report: ReportConfig,
    /// Extra chord qualities (name → semitone offsets), merged over the built-in table.
    pub qualities: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Tempo written into MIDI exports.
    pub tempo_bpm: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: crate::synth::DEFAULT_TEMPO_BPM,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// MIDI pulses per quarter note.
    pub ppq: u16,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            ppq: 480,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Span given to each chord of a hand-entered progression.
    pub seconds_per_chord: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            seconds_per_chord: 2.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Transitions listed in the analysis report.
    pub top_transitions: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_transitions: crate::stats::DEFAULT_TOP_TRANSITIONS,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/chordscope/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Chord parser with the configured extra qualities applied.
    pub fn chord_parser(&self) -> ChordParser {
        self.qualities
            .iter()
            .fold(ChordParser::new(), |parser, (name, intervals)| {
                parser.with_quality(name.clone(), intervals.clone())
            })
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
