pub mod analysis;
pub mod batch;
pub mod chord;
pub mod config;
pub mod export;
pub mod metadata;
pub mod recognizer;
pub mod segment;
pub mod stats;
pub mod synth;

/// Recognizer output file extensions we read
pub const SUPPORTED_EXTENSIONS: &[&str] = &["lab", "json", "txt"];

/// Application name for XDG paths
pub const APP_NAME: &str = "chordscope";
