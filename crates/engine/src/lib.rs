use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod behavior;
pub mod content;
pub mod math;
pub mod movement;
pub mod tilemap;

pub use app::{
    compass_8way, AnimationSlots, Camera2D, Contact, Direction, DriverError, Entity, EntityId,
    EntityKind, EntitySpawn, FixedStepDriver, FrameReport, InputSnapshot, InputSource,
    LoopConfig, LoopMetricsSnapshot, MetricsHandle, MoveTally, Scene, SceneCommand, SceneWorld,
    SeekTarget, Vitals, BODY_SLOT, OVERLAY_SLOT,
};
pub use behavior::{
    run_tracks, BehaviorError, BehaviorTracks, ControlSignal, StateId, StateRegistry,
    TrackTickReport, MAX_TRACKS,
};
pub use content::{
    compile_def_database, duration_ticks, load_tiled_map, parse_tiled_map, AnimationLibrary,
    AnimationLoadError, ContentCompileError, ContentErrorCode, DefDatabase, EntityArchetype,
    EntityDefId, MapLoadError, SourceLocation,
};
pub use math::Vec2;
pub use movement::{
    resolve_axis_x, resolve_axis_y, resolve_diagonal, resolve_velocity, Body, BoundingBox,
    MoveOutcome,
};
pub use tilemap::{CollisionView, Layer, TileMap, TileSet, TilemapError};

pub const ROOT_ENV_VAR: &str = "ADVENTURE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub defs_path: PathBuf,
    pub animations_path: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets_dir = root.join("assets");
        Self {
            maps_dir: assets_dir.join("maps"),
            defs_path: assets_dir.join("base").join("defs.xml"),
            animations_path: assets_dir.join("animations.json"),
            assets_dir,
            root,
        }
    }

    pub fn map_path(&self, name: &str) -> PathBuf {
        self.maps_dir.join(format!("{name}.json"))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "ADVENTURE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
export {env_var}=\"/path/to/adventure\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    resolve_root().map(AppPaths::from_root)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
