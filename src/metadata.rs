use lofty::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Container properties of the source audio. Display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioMetadata {
    pub path: String,
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bitrate_kbps: Option<u32>,
}

/// Read audio properties. Returns empty fields on failure (unknown formats, missing files).
pub fn read_audio_metadata(path: &Path) -> AudioMetadata {
    let empty = AudioMetadata {
        path: path.display().to_string(),
        ..Default::default()
    };

    let tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("Could not read audio properties from {}: {}", path.display(), e);
            return empty;
        }
    };

    let props = tagged_file.properties();
    let secs = props.duration().as_secs_f64();

    AudioMetadata {
        duration_secs: if secs > 0.0 { Some(secs) } else { None },
        sample_rate: props.sample_rate(),
        channels: props.channels(),
        bitrate_kbps: props.audio_bitrate(),
        ..empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_empty_metadata() {
        let meta = read_audio_metadata(Path::new("/nonexistent/song.flac"));
        assert_eq!(meta.path, "/nonexistent/song.flac");
        assert!(meta.duration_secs.is_none());
        assert!(meta.sample_rate.is_none());
        assert!(meta.channels.is_none());
    }

    #[test]
    fn test_unrecognized_content_yields_empty_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let meta = read_audio_metadata(&path);
        assert!(meta.duration_secs.is_none());
        assert!(meta.sample_rate.is_none());
    }
}
