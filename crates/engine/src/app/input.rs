use crate::math::{Vec2, SQRT_1_2};

/// Normalized per-tick input: a 2-axis stick in `[-1, 1]` and the primary
/// action button.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    axes: Vec2,
    primary_pressed: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_axes(mut self, x: f32, y: f32) -> Self {
        self.axes = Vec2::new(clamp_axis(x), clamp_axis(y));
        self
    }

    pub fn with_primary_pressed(mut self, primary_pressed: bool) -> Self {
        self.primary_pressed = primary_pressed;
        self
    }

    pub fn axes(&self) -> Vec2 {
        self.axes
    }

    pub fn primary_pressed(&self) -> bool {
        self.primary_pressed
    }

    /// Axes snapped to the nearest of the 8 compass directions, unit length
    /// on diagonals. Returns zero for a centered stick.
    pub fn compass_axes(&self) -> Vec2 {
        compass_8way(self.axes)
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() && value != 0.0 {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

const COMPASS_DEAD_ZONE: f32 = 0.2;

pub fn compass_8way(axes: Vec2) -> Vec2 {
    if axes.length() < COMPASS_DEAD_ZONE {
        return Vec2::ZERO;
    }
    let octant = (axes.y.atan2(axes.x) / std::f32::consts::FRAC_PI_4).round() as i32;
    match octant.rem_euclid(8) {
        0 => Vec2::new(1.0, 0.0),
        1 => Vec2::new(SQRT_1_2, SQRT_1_2),
        2 => Vec2::new(0.0, 1.0),
        3 => Vec2::new(-SQRT_1_2, SQRT_1_2),
        4 => Vec2::new(-1.0, 0.0),
        5 => Vec2::new(-SQRT_1_2, -SQRT_1_2),
        6 => Vec2::new(0.0, -1.0),
        _ => Vec2::new(SQRT_1_2, -SQRT_1_2),
    }
}

/// Supplies one snapshot per fixed tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot;
}

impl InputSource for InputSnapshot {
    fn snapshot_for_tick(&mut self, _tick: u64) -> InputSnapshot {
        *self
    }
}
