mod animations;
mod compiler;
mod database;
mod tiled;

pub use animations::{duration_ticks, AnimationLibrary, AnimationLoadError};
pub use compiler::{
    compile_def_database, compile_def_source, ContentCompileError, ContentErrorCode,
    SourceLocation, DEFAULT_HEALTH, DEFAULT_MOVE_SPEED,
};
pub use database::{DefDatabase, EntityArchetype, EntityDefId};
pub use tiled::{load_tiled_map, parse_tiled_map, MapLoadError};
