use tracing::{debug, warn};

use crate::math::{feq, flt, flte, inset, snap_integer, snap_zero, Vec2, SQRT_1_2};
use crate::tilemap::CollisionView;

/// Axis-aligned box relative to an entity's logical position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        let valid = |extent: f32| extent.is_finite() && extent > 0.0;
        !(valid(self.width) && valid(self.height))
    }

    pub fn left_at(&self, position: Vec2) -> f32 {
        position.x + self.x
    }

    pub fn top_at(&self, position: Vec2) -> f32 {
        position.y + self.y
    }

    pub fn right_at(&self, position: Vec2) -> f32 {
        position.x + self.x + self.width
    }

    pub fn bottom_at(&self, position: Vec2) -> f32 {
        position.y + self.y + self.height
    }

    /// Strict overlap of two placed boxes; touching edges do not overlap.
    pub fn overlaps(&self, position: Vec2, other: &BoundingBox, other_position: Vec2) -> bool {
        self.left_at(position) < other.right_at(other_position)
            && other.left_at(other_position) < self.right_at(position)
            && self.top_at(position) < other.bottom_at(other_position)
            && other.top_at(other_position) < self.bottom_at(position)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(-8.0, -8.0, 16.0, 16.0)
    }
}

/// Kinematic state consumed by the resolver and the integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub bounds: BoundingBox,
}

impl Body {
    pub fn at(position: Vec2, bounds: BoundingBox) -> Self {
        Self {
            position,
            bounds,
            ..Self::default()
        }
    }

    pub fn collides_at(&self, view: &CollisionView<'_>, position: Vec2) -> bool {
        view.box_collides(
            self.bounds.left_at(position),
            self.bounds.top_at(position),
            self.bounds.width,
            self.bounds.height,
        )
    }

    /// Zeroes velocity and acceleration components lost in float noise.
    pub fn clamp_small(&mut self) {
        self.velocity = Vec2::new(snap_zero(self.velocity.x), snap_zero(self.velocity.y));
        self.acceleration = Vec2::new(
            snap_zero(self.acceleration.x),
            snap_zero(self.acceleration.y),
        );
    }

    /// Advances one tick with the already resolved velocity.
    pub fn integrate(&mut self) {
        let moved = self.position + self.velocity + self.acceleration * 0.5;
        self.position = Vec2::new(snap_integer(moved.x), snap_integer(moved.y));
        self.velocity = self.velocity + self.acceleration;
    }
}

/// What the resolver did to the requested velocity this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveOutcome {
    /// Nothing requested.
    Idle,
    /// Requested velocity accepted as is.
    Clear,
    /// One diagonal component snapped to a tile boundary.
    Hooked,
    /// One component zeroed, the other kept.
    Slid,
    /// Single-axis move deflected into a diagonal around a corner.
    Nudged,
    /// Blocked on every tested axis.
    Stopped,
    /// Bounding box has no area; velocity zeroed.
    Degenerate,
}

/// Replaces `body.velocity` with a collision-safe velocity for one tick.
pub fn resolve_velocity(view: &CollisionView<'_>, body: &mut Body) -> MoveOutcome {
    if body.bounds.is_degenerate() {
        if !body.velocity.is_zero() {
            warn!(
                width = body.bounds.width,
                height = body.bounds.height,
                "degenerate_bounding_box"
            );
        }
        body.velocity = Vec2::ZERO;
        return MoveOutcome::Degenerate;
    }

    let x_still = feq(body.velocity.x, 0.0);
    let y_still = feq(body.velocity.y, 0.0);
    if x_still && y_still {
        return MoveOutcome::Idle;
    }

    if body.collides_at(view, body.position) {
        debug!(x = body.position.x, y = body.position.y, "entity_embedded");
    }

    match (x_still, y_still) {
        (false, false) => resolve_diagonal(view, body),
        (false, true) => resolve_axis_x(view, body),
        (true, false) => resolve_axis_y(view, body),
        (true, true) => MoveOutcome::Idle,
    }
}

/// Diagonal move: accept, hook onto a tile boundary, or fall back to
/// independent per-axis tests.
pub fn resolve_diagonal(view: &CollisionView<'_>, body: &mut Body) -> MoveOutcome {
    let position = body.position;
    let velocity = body.velocity;
    if !body.collides_at(view, position + velocity) {
        return MoveOutcome::Clear;
    }

    let bounds = body.bounds;
    let tile_w = view.tile_width();
    let tile_h = view.tile_height();
    let snap_x_plus = tile_w - bounds.left_at(position).rem_euclid(tile_w);
    let snap_x_neg = -bounds.right_at(position).rem_euclid(tile_w);
    let snap_y_plus = tile_h - bounds.top_at(position).rem_euclid(tile_h);
    let snap_y_neg = -bounds.bottom_at(position).rem_euclid(tile_h);

    let probe = *body;
    let free = |dx: f32, dy: f32| !probe.collides_at(view, position + Vec2::new(dx, dy));

    // Fixed priority: +x, -x, +y, -y.
    let candidates = [
        (
            flt(0.0, snap_x_plus) && flte(snap_x_plus, velocity.x),
            Vec2::new(snap_x_plus, velocity.y),
        ),
        (
            flte(velocity.x, snap_x_neg) && flt(snap_x_neg, 0.0),
            Vec2::new(snap_x_neg, velocity.y),
        ),
        (
            flt(0.0, snap_y_plus) && flte(snap_y_plus, velocity.y),
            Vec2::new(velocity.x, snap_y_plus),
        ),
        (
            flte(velocity.y, snap_y_neg) && flt(snap_y_neg, 0.0),
            Vec2::new(velocity.x, snap_y_neg),
        ),
    ];
    let hook = candidates
        .into_iter()
        .find(|&(applies, candidate)| applies && free(candidate.x, candidate.y))
        .map(|(_, candidate)| candidate);

    if let Some(hooked) = hook {
        debug!(
            vx = velocity.x,
            vy = velocity.y,
            hooked_vx = hooked.x,
            hooked_vy = hooked.y,
            "resolver_hook"
        );
        body.velocity = hooked;
        return MoveOutcome::Hooked;
    }

    let blocked_x = !free(velocity.x, 0.0);
    let blocked_y = !free(0.0, velocity.y);
    match (blocked_x, blocked_y) {
        (true, true) => {
            body.velocity = Vec2::ZERO;
            MoveOutcome::Stopped
        }
        (true, false) => {
            body.velocity.x = 0.0;
            MoveOutcome::Slid
        }
        (false, true) => {
            body.velocity.y = 0.0;
            MoveOutcome::Slid
        }
        // Each axis is free alone but the corner tile blocks the pair.
        (false, false) => {
            if velocity.y.abs() > velocity.x.abs() {
                body.velocity.x = 0.0;
            } else {
                body.velocity.y = 0.0;
            }
            MoveOutcome::Slid
        }
    }
}

pub fn resolve_axis_x(view: &CollisionView<'_>, body: &mut Body) -> MoveOutcome {
    let position = body.position;
    let vx = body.velocity.x;
    if !body.collides_at(view, position + Vec2::new(vx, 0.0)) {
        return MoveOutcome::Clear;
    }

    let bounds = body.bounds;
    let lead_x = if vx > 0.0 {
        inset(bounds.right_at(position) + vx)
    } else {
        bounds.left_at(position) + vx
    };
    let top_solid = view.is_solid(lead_x, bounds.top_at(position));
    let bottom_solid = view.is_solid(lead_x, inset(bounds.bottom_at(position)));

    let deflect_y = match (top_solid, bottom_solid) {
        (true, false) => vx.abs() * SQRT_1_2,
        (false, true) => -vx.abs() * SQRT_1_2,
        _ => {
            body.velocity.x = 0.0;
            return MoveOutcome::Stopped;
        }
    };

    debug!(vx, vy = deflect_y, "resolver_nudge_x");
    body.velocity = Vec2::new(vx * SQRT_1_2, deflect_y);
    settle_nudge(resolve_diagonal(view, body))
}

pub fn resolve_axis_y(view: &CollisionView<'_>, body: &mut Body) -> MoveOutcome {
    let position = body.position;
    let vy = body.velocity.y;
    if !body.collides_at(view, position + Vec2::new(0.0, vy)) {
        return MoveOutcome::Clear;
    }

    let bounds = body.bounds;
    let lead_y = if vy > 0.0 {
        inset(bounds.bottom_at(position) + vy)
    } else {
        bounds.top_at(position) + vy
    };
    let left_solid = view.is_solid(bounds.left_at(position), lead_y);
    let right_solid = view.is_solid(inset(bounds.right_at(position)), lead_y);

    let deflect_x = match (left_solid, right_solid) {
        (true, false) => vy.abs() * SQRT_1_2,
        (false, true) => -vy.abs() * SQRT_1_2,
        _ => {
            body.velocity.y = 0.0;
            return MoveOutcome::Stopped;
        }
    };

    debug!(vx = deflect_x, vy, "resolver_nudge_y");
    body.velocity = Vec2::new(deflect_x, vy * SQRT_1_2);
    settle_nudge(resolve_diagonal(view, body))
}

fn settle_nudge(outcome: MoveOutcome) -> MoveOutcome {
    match outcome {
        MoveOutcome::Clear | MoveOutcome::Hooked | MoveOutcome::Slid => MoveOutcome::Nudged,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::TileMap;

    fn open_map_with(solid: &[(usize, usize)]) -> TileMap {
        let mut rows = vec![vec!['.'; 16]; 16];
        for &(x, y) in solid {
            rows[y][x] = '#';
        }
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().collect::<String>())
            .collect::<Vec<_>>();
        let refs = rows.iter().map(String::as_str).collect::<Vec<_>>();
        TileMap::from_ascii(16.0, 16.0, &refs).expect("map")
    }

    fn body(x: f32, y: f32, vx: f32, vy: f32) -> Body {
        let mut body = Body::at(Vec2::new(x, y), BoundingBox::default());
        body.velocity = Vec2::new(vx, vy);
        body
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1.0e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn zero_velocity_is_idle() {
        let map = open_map_with(&[]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 0.0, 0.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Idle);
        assert_eq!(entity.velocity, Vec2::ZERO);
    }

    #[test]
    fn one_tile_move_toward_open_neighbor_is_unchanged() {
        let map = open_map_with(&[(3, 1)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 16.0, 0.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Clear);
        assert_eq!(entity.velocity, Vec2::new(16.0, 0.0));
    }

    #[test]
    fn flush_wall_zeroes_blocked_axis() {
        let map = open_map_with(&[(2, 1)]);
        let view = map.collision_view(0).expect("view");
        // Box [16,32) already touches the solid tile at x=32.
        let mut entity = body(24.0, 24.0, 5.0, 0.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Stopped);
        assert_eq!(entity.velocity, Vec2::ZERO);
    }

    #[test]
    fn flush_wall_on_y_axis_zeroes_vy() {
        let map = open_map_with(&[(1, 2)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 0.0, 3.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Stopped);
        assert_eq!(entity.velocity.y, 0.0);
    }

    #[test]
    fn corner_clip_on_x_deflects_downward_preserving_speed() {
        let map = open_map_with(&[(2, 1)]);
        let view = map.collision_view(0).expect("view");
        // Box [16,32) x [31,47): only the top of the leading edge clips tile (2,1).
        let mut entity = body(24.0, 39.0, 2.0, 0.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Nudged);
        assert_close(entity.velocity.x, 2.0 * SQRT_1_2);
        assert_close(entity.velocity.y, 2.0 * SQRT_1_2);
        let speed_sq = entity.velocity.x.powi(2) + entity.velocity.y.powi(2);
        assert_close(speed_sq, 4.0);
    }

    #[test]
    fn corner_clip_moving_left_deflects_away_from_solid_corner() {
        let map = open_map_with(&[(1, 1)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(40.0, 39.0, -2.0, 0.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Nudged);
        assert_close(entity.velocity.x, -2.0 * SQRT_1_2);
        assert_close(entity.velocity.y, 2.0 * SQRT_1_2);
    }

    #[test]
    fn corner_clip_on_y_deflects_sideways() {
        let map = open_map_with(&[(1, 2)]);
        let view = map.collision_view(0).expect("view");
        // Box [31,47) x [16,32): only the left of the leading edge clips tile (1,2).
        let mut entity = body(39.0, 24.0, 0.0, 2.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Nudged);
        assert_close(entity.velocity.x, 2.0 * SQRT_1_2);
        assert_close(entity.velocity.y, 2.0 * SQRT_1_2);
    }

    #[test]
    fn diagonal_hook_prefers_x_snap() {
        let map = open_map_with(&[(3, 3)]);
        let view = map.collision_view(0).expect("view");
        // Box [28,44)^2; both the x and the y snap of 4 would clear tile (3,3).
        let mut entity = body(36.0, 36.0, 6.0, 6.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Hooked);
        assert_eq!(entity.velocity, Vec2::new(4.0, 6.0));
    }

    #[test]
    fn diagonal_hook_snaps_negative_x() {
        let map = open_map_with(&[(1, 1)]);
        let view = map.collision_view(0).expect("view");
        // Box [36,52)^2; pulling x back to the line at 32 clears tile (1,1).
        let mut entity = body(44.0, 44.0, -6.0, -6.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Hooked);
        assert_eq!(entity.velocity, Vec2::new(-4.0, -6.0));
    }

    #[test]
    fn diagonal_hook_snaps_positive_y() {
        let map = open_map_with(&[(2, 3)]);
        let view = map.collision_view(0).expect("view");
        // Box [28,44)^2 moving down-left; only stopping at y=48 clears tile (2,3).
        let mut entity = body(36.0, 36.0, -2.0, 6.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Hooked);
        assert_eq!(entity.velocity, Vec2::new(-2.0, 4.0));
    }

    #[test]
    fn diagonal_hook_snaps_negative_y() {
        let map = open_map_with(&[(2, 1)]);
        let view = map.collision_view(0).expect("view");
        // Box [28,44) x [36,52) moving up-right; the top stops at y=32.
        let mut entity = body(36.0, 44.0, 2.0, -6.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Hooked);
        assert_eq!(entity.velocity, Vec2::new(2.0, -4.0));
    }

    #[test]
    fn blocked_x_hook_falls_through_to_y_hook() {
        let map = open_map_with(&[(2, 3)]);
        let view = map.collision_view(0).expect("view");
        // The x snap of 4 still leaves the box over tile (2,3); the y snap clears it.
        let mut entity = body(36.0, 36.0, 6.0, 6.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Hooked);
        assert_eq!(entity.velocity, Vec2::new(6.0, 4.0));
        assert!(!entity.collides_at(&view, entity.position + entity.velocity));
    }

    #[test]
    fn diagonal_into_open_space_is_clear() {
        let map = open_map_with(&[]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(36.0, 36.0, -3.0, 2.5);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Clear);
        assert_eq!(entity.velocity, Vec2::new(-3.0, 2.5));
    }

    #[test]
    fn diagonal_along_wall_slides_on_open_axis() {
        let map = open_map_with(&[(2, 1), (2, 2)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 5.0, 5.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Slid);
        assert_eq!(entity.velocity, Vec2::new(0.0, 5.0));
    }

    #[test]
    fn diagonal_into_inside_corner_stops() {
        let map = open_map_with(&[(2, 1), (1, 2), (2, 2)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 5.0, 5.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Stopped);
        assert_eq!(entity.velocity, Vec2::ZERO);
    }

    #[test]
    fn diagonal_blocked_only_at_corner_keeps_one_axis() {
        let map = open_map_with(&[(2, 2)]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 5.0, 5.0);
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Slid);
        assert_eq!(entity.velocity, Vec2::new(5.0, 0.0));
        assert!(!entity.collides_at(&view, entity.position + entity.velocity));
    }

    #[test]
    fn degenerate_box_zeroes_velocity() {
        let map = open_map_with(&[]);
        let view = map.collision_view(0).expect("view");
        let mut entity = body(24.0, 24.0, 3.0, 1.0);
        entity.bounds.width = 0.0;
        assert_eq!(resolve_velocity(&view, &mut entity), MoveOutcome::Degenerate);
        assert_eq!(entity.velocity, Vec2::ZERO);
    }

    #[test]
    fn integrate_applies_half_acceleration_and_snaps_drift() {
        let mut entity = body(10.0, 20.0, 1.5, 0.0);
        entity.acceleration = Vec2::new(1.0, 2.0);
        entity.integrate();
        assert_eq!(entity.position, Vec2::new(12.0, 21.0));
        assert_eq!(entity.velocity, Vec2::new(2.5, 2.0));

        let mut drifting = body(31.999_998, 8.0, 0.0, 0.0);
        drifting.integrate();
        assert_eq!(drifting.position.x, 32.0);
    }

    #[test]
    fn slow_velocity_still_advances_from_integer_position() {
        let mut entity = body(300.0, 40.0, 0.003, 0.0);
        for _ in 0..10 {
            entity.integrate();
        }
        assert!(entity.position.x > 300.02, "moved only to {}", entity.position.x);
        assert_eq!(entity.position.y, 40.0);
    }

    #[test]
    fn clamp_small_zeroes_noise_only() {
        let mut entity = body(0.0, 0.0, 1.0e-7, 0.5);
        entity.acceleration = Vec2::new(-2.0e-6, 0.0);
        entity.clamp_small();
        assert_eq!(entity.velocity, Vec2::new(0.0, 0.5));
        assert_eq!(entity.acceleration, Vec2::ZERO);
    }

    #[test]
    fn overlap_is_strict() {
        let bounds = BoundingBox::default();
        assert!(bounds.overlaps(Vec2::new(0.0, 0.0), &bounds, Vec2::new(15.0, 15.0)));
        assert!(!bounds.overlaps(Vec2::new(0.0, 0.0), &bounds, Vec2::new(16.0, 0.0)));
    }
}
