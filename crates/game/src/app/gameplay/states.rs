use engine::{ControlSignal, Direction, Entity, SeekTarget, Vec2, BODY_SLOT, OVERLAY_SLOT};
use rand::Rng;
use tracing::debug;

use super::{BehaviorContext, GameEvent, BLINK, HERO_IDLE, HERO_WALK, WEAPON_CUT};

const SEEK_RANDOM_ATTEMPTS: usize = 8;

/// Player control: contact damage, invincibility window, attack, walking.
pub(super) fn normal(ctx: &mut BehaviorContext<'_>, entity: &mut Entity) -> ControlSignal {
    if let Some(enemy) = entity.contact.enemy_collision.take() {
        entity.vitals.health -= 1;
        debug!(
            entity = entity.id.0,
            enemy = enemy.0,
            health = entity.vitals.health,
            "player_hit"
        );
        if entity.vitals.health <= 0 {
            entity.body.velocity = Vec2::ZERO;
            ctx.events.push(GameEvent::GameOver { player: entity.id });
            return ControlSignal::Replace(ctx.ids.game_over);
        }

        entity.body.velocity = -entity.direction.unit();
        entity.contact.damage_disabled = true;
        entity.vitals.hurt_countdown = ctx.tuning.hurt_ticks;
        return ControlSignal::Push(ctx.ids.hurt);
    }

    if entity.vitals.invincible_countdown > 0 {
        entity.vitals.invincible_countdown -= 1;
        if entity.vitals.invincible_countdown == 0 {
            entity.contact.damage_disabled = false;
            entity.animations.clear(OVERLAY_SLOT);
            entity.visible = true;
        }
    }

    let facing = entity.direction.index();
    if ctx.input.primary_pressed() {
        entity.animations.play(BODY_SLOT, WEAPON_CUT[facing]);
        entity.vitals.attack_countdown = ctx.tuning.attack_ticks[facing];
        entity.body.velocity = Vec2::ZERO;
        return ControlSignal::Push(ctx.ids.attack);
    }

    let axes = ctx.input.axes();
    entity.body.velocity = axes * entity.move_speed;
    match Direction::from_axes(axes) {
        Some(direction) => {
            entity.direction = direction;
            entity.animations.play(BODY_SLOT, HERO_WALK[direction.index()]);
        }
        None => {
            entity.animations.play(BODY_SLOT, HERO_IDLE[facing]);
        }
    }
    ControlSignal::Continue
}

pub(super) fn hurt(ctx: &mut BehaviorContext<'_>, entity: &mut Entity) -> ControlSignal {
    entity.vitals.hurt_countdown = entity.vitals.hurt_countdown.saturating_sub(1);
    if entity.vitals.hurt_countdown > 0 {
        return ControlSignal::Continue;
    }
    entity.vitals.invincible_countdown = ctx.tuning.invincible_ticks;
    entity.animations.play(OVERLAY_SLOT, BLINK);
    ControlSignal::Terminate
}

pub(super) fn attack(_ctx: &mut BehaviorContext<'_>, entity: &mut Entity) -> ControlSignal {
    entity.vitals.attack_countdown = entity.vitals.attack_countdown.saturating_sub(1);
    if entity.vitals.attack_countdown > 0 {
        ControlSignal::Continue
    } else {
        ControlSignal::Terminate
    }
}

pub(super) fn game_over(_ctx: &mut BehaviorContext<'_>, entity: &mut Entity) -> ControlSignal {
    entity.body.velocity = Vec2::ZERO;
    entity.body.acceleration = Vec2::ZERO;
    ControlSignal::Continue
}

/// Wander one tile at a time toward a random open neighbour.
pub(super) fn seek(ctx: &mut BehaviorContext<'_>, entity: &mut Entity) -> ControlSignal {
    let body = entity.body;
    let next = body.position + body.velocity + body.acceleration;
    let repick = match entity.seek {
        None => true,
        Some(target) => {
            body.velocity.is_zero()
                || target.remaining <= 0.0
                || body.collides_at(&ctx.view, next)
        }
    };

    if repick {
        pick_seek_target(ctx, entity);
    } else if let Some(target) = entity.seek.as_mut() {
        target.remaining -= target.speed;
    }
    ControlSignal::Continue
}

fn pick_seek_target(ctx: &mut BehaviorContext<'_>, entity: &mut Entity) {
    let view = ctx.view;
    let position = entity.body.position;
    let (tile_x, tile_y) = view.tile_coord(position.x, position.y);
    let neighbour = |direction: Direction| {
        let unit = direction.unit();
        (tile_x + unit.x as i64, tile_y + unit.y as i64)
    };
    let open = |direction: Direction| {
        let (x, y) = neighbour(direction);
        view.layer().tile_at(x, y).is_some() && !view.is_tile_solid(x, y)
    };

    let mut choice = None;
    for _ in 0..SEEK_RANDOM_ATTEMPTS {
        let direction = Direction::ALL[ctx.rng.gen_range(0..Direction::ALL.len())];
        if open(direction) {
            choice = Some(direction);
            break;
        }
    }
    if choice.is_none() {
        let start = ctx.rng.gen_range(0..Direction::ALL.len());
        choice = (0..Direction::ALL.len())
            .map(|offset| Direction::ALL[(start + offset) % Direction::ALL.len()])
            .find(|direction| open(*direction));
    }

    let Some(direction) = choice else {
        entity.seek = None;
        entity.body.velocity = Vec2::ZERO;
        return;
    };

    let (target_x, target_y) = neighbour(direction);
    let origin = view.tile_center(tile_x, tile_y);
    let target = view.tile_center(target_x, target_y);
    let speed = ctx.tuning.seek_speed * entity.move_speed;
    // The step taken this tick already counts toward the distance.
    entity.seek = Some(SeekTarget {
        origin,
        target,
        remaining: (target - origin).length() - speed,
        speed,
    });
    entity.direction = direction;
    entity.body.velocity = direction.unit() * speed;
}
