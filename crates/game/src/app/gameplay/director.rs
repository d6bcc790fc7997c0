use engine::{CollisionView, ControlSignal, EntityId, EntityKind, Vec2};
use rand::Rng;
use tracing::{info, warn};

use super::DirectorContext;

/// Resets the player and populates the level, then hands over to `base`.
pub(super) fn load(ctx: &mut DirectorContext<'_>) -> ControlSignal {
    let player_behavior = ctx.player_behavior.clone();
    let Some(player) = ctx.world.player_mut() else {
        warn!("director_load_without_player");
        return ControlSignal::Replace(ctx.ids.base);
    };
    player.behavior = player_behavior;
    let player_tile_center = player.body.position;

    let Ok(view) = ctx.world.collision_view() else {
        warn!("director_load_without_map");
        return ControlSignal::Replace(ctx.ids.base);
    };
    let player_tile = view.tile_coord(player_tile_center.x, player_tile_center.y);
    let candidates = interior_open_tiles(&view)
        .into_iter()
        .filter(|tile| *tile != player_tile)
        .map(|(x, y)| view.tile_center(x, y))
        .collect::<Vec<_>>();

    if candidates.is_empty() && ctx.enemy_count > 0 {
        warn!(requested = ctx.enemy_count, "no_open_tiles_for_enemies");
        return ControlSignal::Replace(ctx.ids.base);
    }

    let positions = (0..ctx.enemy_count)
        .map(|_| candidates[ctx.rng.gen_range(0..candidates.len())])
        .collect::<Vec<_>>();
    for position in &positions {
        ctx.world.spawn(ctx.enemy.spawn(EntityKind::Enemy, *position));
    }
    info!(enemies = positions.len(), "level_populated");
    ControlSignal::Replace(ctx.ids.base)
}

/// Flags the first enemy whose box overlaps the player's.
pub(super) fn base(ctx: &mut DirectorContext<'_>) -> ControlSignal {
    let Some(player) = ctx.world.player() else {
        return ControlSignal::Continue;
    };
    if player.contact.damage_disabled {
        return ControlSignal::Continue;
    }
    let (bounds, position) = (player.body.bounds, player.body.position);
    let hit: Option<EntityId> = ctx
        .world
        .entities()
        .iter()
        .filter(|entity| entity.kind == EntityKind::Enemy)
        .find(|enemy| bounds.overlaps(position, &enemy.body.bounds, enemy.body.position))
        .map(|enemy| enemy.id);

    if let Some(enemy) = hit {
        if let Some(player) = ctx.world.player_mut() {
            player.contact.enemy_collision = Some(enemy);
        }
    }
    ControlSignal::Continue
}

/// Non-solid tiles excluding the outer ring, row-major.
pub(super) fn interior_open_tiles(view: &CollisionView<'_>) -> Vec<(i64, i64)> {
    let layer = view.layer();
    let (width, height) = (i64::from(layer.width()), i64::from(layer.height()));
    (1..height.saturating_sub(1))
        .flat_map(|y| (1..width.saturating_sub(1)).map(move |x| (x, y)))
        .filter(|(x, y)| !view.is_tile_solid(*x, *y))
        .collect()
}

/// Center of the open tile nearest the map center. Falls back to the map
/// center when every tile is solid.
pub(super) fn player_start(view: &CollisionView<'_>) -> Vec2 {
    let layer = view.layer();
    let middle = view.world_size() * 0.5;
    (0..i64::from(layer.height()))
        .flat_map(|y| (0..i64::from(layer.width())).map(move |x| (x, y)))
        .filter(|(x, y)| !view.is_tile_solid(*x, *y))
        .map(|(x, y)| view.tile_center(x, y))
        .min_by(|a, b| {
            let da = (*a - middle).length();
            let db = (*b - middle).length();
            da.total_cmp(&db)
        })
        .unwrap_or(middle)
}
