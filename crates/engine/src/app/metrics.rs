use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::movement::MoveOutcome;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Resolver outcome counters for moving bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveTally {
    pub clear: u32,
    pub hooked: u32,
    pub slid: u32,
    pub nudged: u32,
    pub stopped: u32,
    pub degenerate: u32,
}

impl MoveTally {
    pub fn record(&mut self, outcome: MoveOutcome) {
        let slot = match outcome {
            MoveOutcome::Idle => return,
            MoveOutcome::Clear => &mut self.clear,
            MoveOutcome::Hooked => &mut self.hooked,
            MoveOutcome::Slid => &mut self.slid,
            MoveOutcome::Nudged => &mut self.nudged,
            MoveOutcome::Stopped => &mut self.stopped,
            MoveOutcome::Degenerate => &mut self.degenerate,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn merge(&mut self, other: MoveTally) {
        self.clear = self.clear.saturating_add(other.clear);
        self.hooked = self.hooked.saturating_add(other.hooked);
        self.slid = self.slid.saturating_add(other.slid);
        self.nudged = self.nudged.saturating_add(other.nudged);
        self.stopped = self.stopped.saturating_add(other.stopped);
        self.degenerate = self.degenerate.saturating_add(other.degenerate);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub moves: MoveTally,
    pub unhandled_states: u32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

/// Interval counters. Time is the host's monotonic clock reading, not a
/// wall-clock instant, so headless runs report against simulated time.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Option<Duration>,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
    moves: MoveTally,
    unhandled_states: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: None,
            interval,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            moves: MoveTally::default(),
            unhandled_states: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, moves: MoveTally, unhandled_states: u32) {
        self.ticks = self.ticks.saturating_add(1);
        self.moves.merge(moves);
        self.unhandled_states = self.unhandled_states.saturating_add(unhandled_states);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Duration) -> Option<LoopMetricsSnapshot> {
        let Some(interval_start) = self.interval_start else {
            self.interval_start = Some(now);
            return None;
        };
        let elapsed = now.saturating_sub(interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            moves: self.moves,
            unhandled_states: self.unhandled_states,
        };

        self.interval_start = Some(now);
        self.frames = 0;
        self.ticks = 0;
        self.frame_time_sum = Duration::ZERO;
        self.moves = MoveTally::default();
        self.unhandled_states = 0;

        Some(snapshot)
    }
}
