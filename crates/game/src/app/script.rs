use std::fs;
use std::path::{Path, PathBuf};

use engine::{InputSnapshot, InputSource};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error("failed to read input script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse input script json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("input script has no ticks")]
    Empty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    segments: Vec<SegmentDef>,
    #[serde(default)]
    repeat: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SegmentDef {
    ticks: u64,
    #[serde(default)]
    axes: [f32; 2],
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    end_tick: u64,
    snapshot: InputSnapshot,
}

/// Replays a fixed sequence of input snapshots by tick number.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedInput {
    segments: Vec<Segment>,
    total_ticks: u64,
    repeat: bool,
}

impl ScriptedInput {
    pub(crate) fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, ScriptError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let file = serde_path_to_error::deserialize::<_, ScriptFile>(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                ScriptError::Parse {
                    path,
                    message: error.into_inner().to_string(),
                }
            },
        )?;
        if file.segments.iter().all(|segment| segment.ticks == 0) {
            return Err(ScriptError::Empty);
        }
        Ok(Self::compile(
            file.segments
                .iter()
                .map(|segment| (segment.ticks, segment.axes, segment.primary)),
            file.repeat,
        ))
    }

    /// Walks a square clockwise, swinging once per side, forever.
    pub(crate) fn default_script() -> Self {
        let side = |x: f32, y: f32| {
            [
                (60, [x, y], false),
                (1, [0.0, 0.0], true),
                (20, [0.0, 0.0], false),
            ]
        };
        let sides = [
            side(1.0, 0.0),
            side(0.0, 1.0),
            side(-1.0, 0.0),
            side(0.0, -1.0),
        ];
        Self::compile(sides.into_iter().flatten(), true)
    }

    /// Zero-length segments are skipped. Callers reject scripts with no ticks.
    fn compile(segments: impl IntoIterator<Item = (u64, [f32; 2], bool)>, repeat: bool) -> Self {
        let mut total_ticks = 0u64;
        let mut compiled = Vec::new();
        for (ticks, [x, y], primary) in segments {
            if ticks == 0 {
                continue;
            }
            total_ticks = total_ticks.saturating_add(ticks);
            compiled.push(Segment {
                end_tick: total_ticks,
                snapshot: InputSnapshot::empty()
                    .with_axes(x, y)
                    .with_primary_pressed(primary),
            });
        }
        Self {
            segments: compiled,
            total_ticks,
            repeat,
        }
    }

    pub(crate) fn total_ticks(&self) -> u64 {
        self.total_ticks
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot {
        if self.total_ticks == 0 {
            return InputSnapshot::empty();
        }
        let local = if self.repeat {
            tick % self.total_ticks
        } else if tick >= self.total_ticks {
            return InputSnapshot::empty();
        } else {
            tick
        };
        let index = self
            .segments
            .partition_point(|segment| segment.end_tick <= local);
        self.segments
            .get(index)
            .map(|segment| segment.snapshot)
            .unwrap_or_default()
    }
}
