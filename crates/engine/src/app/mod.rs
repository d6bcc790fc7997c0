mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::{compass_8way, InputSnapshot, InputSource};
pub use loop_runner::{DriverError, FixedStepDriver, FrameReport, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle, MoveTally};
pub use scene::{
    AnimationSlots, Camera2D, Contact, Direction, Entity, EntityId, EntityIdAllocator, EntityKind,
    EntitySpawn, Scene, SceneCommand, SceneWorld, SeekTarget, Vitals, ANIMATION_SLOT_COUNT,
    BODY_SLOT, OVERLAY_SLOT,
};
