use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::input::InputSource;
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::scene::{Scene, SceneCommand, SceneWorld};
use crate::math::Vec2;
use crate::tilemap::TilemapError;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Camera viewport in tiles.
    pub view_size_tiles: (u32, u32),
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 16,
            metrics_log_interval: Duration::from_secs(1),
            view_size_tiles: (10, 9),
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot tick without a loaded map")]
    MapNotLoaded,
    #[error("collision layer unavailable: {0}")]
    Tilemap(#[source] TilemapError),
}

impl From<TilemapError> for DriverError {
    fn from(error: TilemapError) -> Self {
        match error {
            TilemapError::NotLoaded => DriverError::MapNotLoaded,
            other => DriverError::Tilemap(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
    /// A tick in this frame asked the driver to pause.
    pub paused_by_scene: bool,
}

/// Turns host frame timestamps into a deterministic number of fixed ticks.
///
/// Time is supplied as a monotonic reading (`Duration` since any fixed
/// origin); the driver never reads a clock itself.
#[derive(Debug)]
pub struct FixedStepDriver {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    view_size_tiles: (u32, u32),
    accumulator: Duration,
    last_frame: Option<Duration>,
    paused: bool,
    tick: u64,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl FixedStepDriver {
    pub fn new(config: &LoopConfig) -> Self {
        Self::with_metrics(config, MetricsHandle::default())
    }

    pub fn with_metrics(config: &LoopConfig, metrics_handle: MetricsHandle) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta =
            normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
        let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        let fixed_dt = Duration::from_nanos(1_000_000_000 / u64::from(target_tps));
        info!(
            target_tps,
            max_frame_delta_ms = max_frame_delta.as_millis() as u64,
            max_ticks_per_frame,
            metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
            view_width_tiles = config.view_size_tiles.0,
            view_height_tiles = config.view_size_tiles.1,
            "loop_config"
        );
        Self {
            fixed_dt,
            max_frame_delta,
            max_ticks_per_frame,
            view_size_tiles: config.view_size_tiles,
            accumulator: Duration::ZERO,
            last_frame: None,
            paused: false,
            tick: 0,
            metrics: MetricsAccumulator::new(metrics_log_interval),
            metrics_handle,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics_handle
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            info!(tick = self.tick, "sim_paused");
        }
    }

    /// The next frame re-anchors its time reference, so the paused interval
    /// never turns into a catch-up burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.last_frame = None;
            info!(tick = self.tick, "sim_resumed");
        }
    }

    /// Sizes the camera viewport from the loaded map's tile size.
    pub fn configure_camera(&self, world: &mut SceneWorld) -> Result<(), DriverError> {
        let view = world.collision_view()?;
        let view_size = Vec2::new(
            self.view_size_tiles.0 as f32 * view.tile_width(),
            self.view_size_tiles.1 as f32 * view.tile_height(),
        );
        world.camera_mut().view_size = view_size;
        world.follow_player();
        Ok(())
    }

    /// Feeds one host frame observed at `now` and runs the ticks it pays for.
    pub fn frame(
        &mut self,
        now: Duration,
        scene: &mut dyn Scene,
        world: &mut SceneWorld,
        input: &mut dyn InputSource,
    ) -> Result<FrameReport, DriverError> {
        let Some(last_frame) = self.last_frame.replace(now) else {
            return Ok(FrameReport::default());
        };
        if self.paused {
            return Ok(FrameReport::default());
        }

        let raw_frame_dt = now.saturating_sub(last_frame);
        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let mut report = FrameReport::default();
        for _ in 0..step_plan.ticks_to_run {
            let command = self.run_tick(scene, world, input)?;
            report.ticks_run += 1;
            if command == SceneCommand::Pause {
                report.paused_by_scene = true;
                self.pause();
                break;
            }
        }

        if report.paused_by_scene {
            self.accumulator = self
                .accumulator
                .saturating_sub(self.fixed_dt.saturating_mul(report.ticks_run));
        } else {
            self.accumulator = step_plan.remaining_accumulator;
            report.dropped_backlog = step_plan.dropped_backlog;
            if step_plan.dropped_backlog > Duration::ZERO {
                warn!(
                    dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                    max_ticks_per_frame = self.max_ticks_per_frame,
                    "sim_clamp_triggered"
                );
            }
        }

        self.metrics.record_frame(raw_frame_dt);
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                clear = snapshot.moves.clear,
                hooked = snapshot.moves.hooked,
                slid = snapshot.moves.slid,
                nudged = snapshot.moves.nudged,
                stopped = snapshot.moves.stopped,
                degenerate = snapshot.moves.degenerate,
                unhandled_states = snapshot.unhandled_states,
                entity_count = world.entity_count(),
                "loop_metrics"
            );
        }

        Ok(report)
    }

    /// One full tick: behaviors, pending spawns, movement, camera.
    pub fn run_tick(
        &mut self,
        scene: &mut dyn Scene,
        world: &mut SceneWorld,
        input: &mut dyn InputSource,
    ) -> Result<SceneCommand, DriverError> {
        if world.tilemap().is_none() {
            return Err(DriverError::MapNotLoaded);
        }
        let snapshot = input.snapshot_for_tick(self.tick);
        let command = scene.update(self.tick, &snapshot, world);
        world.apply_pending();
        let moves = world.step_bodies()?;
        world.follow_player();
        self.tick = self.tick.saturating_add(1);
        self.metrics
            .record_tick(moves, scene.take_unhandled_state_count());
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
