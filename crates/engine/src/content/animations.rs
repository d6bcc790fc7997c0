use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnimationLoadError {
    #[error("failed to read animations {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse animations json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("animation '{name}' has a negative or non-finite frame time")]
    InvalidFrame { name: String },
}

#[derive(Debug, Clone, Deserialize)]
struct AnimationData {
    #[serde(default)]
    timelines: Vec<Timeline>,
}

#[derive(Debug, Clone, Deserialize)]
struct Timeline {
    #[serde(default)]
    frames: Vec<f32>,
}

/// Keyframe timing by animation name. Playback lives with the host; the
/// simulation only needs how long a named animation runs.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    durations_ms: HashMap<String, f32>,
}

impl AnimationLibrary {
    pub fn load(path: &Path) -> Result<Self, AnimationLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| AnimationLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AnimationLoadError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let parsed = serde_path_to_error::deserialize::<_, HashMap<String, AnimationData>>(
            &mut deserializer,
        )
        .map_err(|error| {
            let path = error.path().to_string();
            AnimationLoadError::Parse {
                path,
                message: error.into_inner().to_string(),
            }
        })?;

        let mut durations_ms = HashMap::with_capacity(parsed.len());
        for (name, data) in parsed {
            let frames = data.timelines.iter().flat_map(|timeline| timeline.frames.iter());
            if frames.clone().any(|ms| !ms.is_finite() || *ms < 0.0) {
                return Err(AnimationLoadError::InvalidFrame { name });
            }
            let duration = data
                .timelines
                .iter()
                .filter_map(|timeline| timeline.frames.last().copied())
                .fold(None, |longest: Option<f32>, last| {
                    Some(longest.map_or(last, |ms| ms.max(last)))
                });
            if let Some(duration) = duration {
                durations_ms.insert(name, duration);
            }
        }
        Ok(Self { durations_ms })
    }

    pub fn insert(&mut self, name: impl Into<String>, duration_ms: f32) {
        self.durations_ms.insert(name.into(), duration_ms);
    }

    /// Longest last keyframe across the animation's timelines.
    pub fn duration_ms(&self, name: &str) -> Option<f32> {
        self.durations_ms.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }
}

/// Number of fixed ticks covering `duration_ms`, rounded up.
pub fn duration_ticks(duration_ms: f32, ticks_per_second: u32) -> u32 {
    if !duration_ms.is_finite() || duration_ms <= 0.0 {
        return 0;
    }
    (duration_ms * ticks_per_second as f32 / 1000.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn duration_is_longest_last_frame() {
        let library = AnimationLibrary::from_json(
            r#"{
                "weapon_cut_r": {"timelines": [
                    {"property": "x", "frames": [0, 100, 250], "values": [0, 4, 8]},
                    {"property": "rotation", "frames": [0, 300], "values": [0, 90], "discrete": false}
                ]},
                "blink": {"timelines": [{"property": "visible", "frames": [0, 50, 100]}]},
                "empty": {"timelines": []}
            }"#,
        )
        .expect("library");
        assert_eq!(library.duration_ms("weapon_cut_r"), Some(300.0));
        assert_eq!(library.duration_ms("blink"), Some(100.0));
        assert_eq!(library.duration_ms("empty"), None);
        assert_eq!(library.duration_ms("unknown"), None);
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn negative_frame_is_rejected() {
        let err = AnimationLibrary::from_json(r#"{"a": {"timelines": [{"frames": [0, -5]}]}}"#)
            .expect_err("err");
        assert!(matches!(err, AnimationLoadError::InvalidFrame { name } if name == "a"));
    }

    #[test]
    fn parse_error_reports_path() {
        let err = AnimationLibrary::from_json(r#"{"a": {"timelines": [{"frames": "x"}]}}"#)
            .expect_err("err");
        match err {
            AnimationLoadError::Parse { path, .. } => assert_eq!(path, "a.timelines[0].frames"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ticks_round_up() {
        assert_eq!(duration_ticks(300.0, 60), 18);
        assert_eq!(duration_ticks(250.0, 60), 15);
        assert_eq!(duration_ticks(10.0, 60), 1);
        assert_eq!(duration_ticks(0.0, 60), 0);
        assert_eq!(duration_ticks(f32::NAN, 60), 0);
    }

    #[test]
    fn load_reads_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("animations.json");
        fs::write(&path, r#"{"hero_walk_r": {"timelines": [{"frames": [0, 400]}]}}"#)
            .expect("write");
        let library = AnimationLibrary::load(&path).expect("load");
        assert_eq!(library.duration_ms("hero_walk_r"), Some(400.0));
        assert!(matches!(
            AnimationLibrary::load(&temp.path().join("missing.json")).expect_err("err"),
            AnimationLoadError::Read { .. }
        ));
    }
}
