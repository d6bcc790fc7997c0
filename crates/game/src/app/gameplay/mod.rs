use std::mem;

use engine::{
    duration_ticks, run_tracks, AnimationLibrary, BehaviorError, BehaviorTracks, BoundingBox,
    CollisionView, ControlSignal, DefDatabase, Direction, Entity, EntityId, EntityKind,
    EntitySpawn, InputSnapshot, Scene, SceneCommand, SceneWorld, StateId, StateRegistry,
    TrackTickReport, Vec2,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

mod director;
mod states;

pub(crate) const PLAYER_DEF: &str = "hero";
pub(crate) const ENEMY_DEF: &str = "enemy";
const DEFAULT_ENEMY_COUNT: usize = 4;
const HURT_TICKS: u32 = 10;
const INVINCIBLE_TICKS: u32 = 60;
const SEEK_SPEED: f32 = 0.5;

pub(crate) const WEAPON_CUT: [&str; 4] = [
    "weapon_cut_r",
    "weapon_cut_d",
    "weapon_cut_l",
    "weapon_cut_u",
];
pub(crate) const HERO_WALK: [&str; 4] = [
    "hero_walk_r",
    "hero_walk_d",
    "hero_walk_l",
    "hero_walk_u",
];
pub(crate) const HERO_IDLE: [&str; 4] = [
    "hero_idle_r",
    "hero_idle_d",
    "hero_idle_l",
    "hero_idle_u",
];
pub(crate) const BLINK: &str = "blink";

type EntityStateFn = fn(&mut BehaviorContext<'_>, &mut Entity) -> ControlSignal;
type DirectorStateFn = fn(&mut DirectorContext<'_>) -> ControlSignal;

#[derive(Debug, Error)]
pub(crate) enum GameplayError {
    #[error("entity definition '{name}' is missing")]
    MissingDef { name: &'static str },
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

#[derive(Debug, Clone)]
pub(crate) struct GameplayConfig {
    pub(crate) enemy_count: usize,
    pub(crate) seed: u64,
    pub(crate) target_tps: u32,
    /// Player start; `None` picks the open tile nearest the map center.
    pub(crate) player_spawn: Option<Vec2>,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            enemy_count: DEFAULT_ENEMY_COUNT,
            seed: 0,
            target_tps: 60,
            player_spawn: None,
        }
    }
}

/// State ids resolved once when the scene is built.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StateIds {
    pub(crate) normal: StateId,
    pub(crate) hurt: StateId,
    pub(crate) attack: StateId,
    pub(crate) seek: StateId,
    pub(crate) game_over: StateId,
    pub(crate) load: StateId,
    pub(crate) base: StateId,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tuning {
    pub(crate) attack_ticks: [u32; 4],
    pub(crate) hurt_ticks: u32,
    pub(crate) invincible_ticks: u32,
    pub(crate) seek_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameEvent {
    GameOver { player: EntityId },
}

/// Spawn recipe compiled from an entity definition.
#[derive(Debug, Clone)]
pub(crate) struct EntityTemplate {
    pub(crate) health: i32,
    pub(crate) move_speed: f32,
    pub(crate) bounds: BoundingBox,
    pub(crate) behavior: BehaviorTracks,
}

impl EntityTemplate {
    pub(crate) fn spawn(&self, kind: EntityKind, position: Vec2) -> EntitySpawn {
        EntitySpawn {
            kind,
            position,
            bounds: self.bounds,
            health: self.health,
            move_speed: self.move_speed,
            behavior: self.behavior.clone(),
        }
    }
}

pub(crate) struct BehaviorContext<'a> {
    pub(crate) view: CollisionView<'a>,
    pub(crate) input: &'a InputSnapshot,
    pub(crate) rng: &'a mut SmallRng,
    pub(crate) ids: &'a StateIds,
    pub(crate) tuning: &'a Tuning,
    pub(crate) events: &'a mut Vec<GameEvent>,
}

pub(crate) struct DirectorContext<'a> {
    pub(crate) world: &'a mut SceneWorld,
    pub(crate) rng: &'a mut SmallRng,
    pub(crate) ids: &'a StateIds,
    pub(crate) enemy: &'a EntityTemplate,
    pub(crate) player_behavior: &'a BehaviorTracks,
    pub(crate) enemy_count: usize,
}

pub(crate) struct GameplayScene {
    config: GameplayConfig,
    entity_states: StateRegistry<EntityStateFn>,
    director_states: StateRegistry<DirectorStateFn>,
    ids: StateIds,
    tuning: Tuning,
    player: EntityTemplate,
    enemy: EntityTemplate,
    director_initial: BehaviorTracks,
    rng: SmallRng,
    events: Vec<GameEvent>,
    player_id: Option<EntityId>,
    game_over: bool,
    unhandled_states: u32,
}

impl GameplayScene {
    pub(crate) fn new(
        defs: &DefDatabase,
        animations: &AnimationLibrary,
        config: GameplayConfig,
    ) -> Result<Self, GameplayError> {
        let mut entity_states = StateRegistry::<EntityStateFn>::new();
        let normal = entity_states.register("normal", states::normal)?;
        let hurt = entity_states.register("hurt", states::hurt)?;
        let attack = entity_states.register("attack", states::attack)?;
        let seek = entity_states.register("seek", states::seek)?;
        let game_over = entity_states.register("game_over", states::game_over)?;

        let mut director_states = StateRegistry::<DirectorStateFn>::new();
        let load = director_states.register("load", director::load)?;
        let base = director_states.register("base", director::base)?;

        let ids = StateIds {
            normal,
            hurt,
            attack,
            seek,
            game_over,
            load,
            base,
        };

        let player = compile_template(defs, PLAYER_DEF, &mut entity_states, Some(normal))?;
        let enemy = compile_template(defs, ENEMY_DEF, &mut entity_states, None)?;
        for name in entity_states.unhandled_names() {
            warn!(state = name, "unregistered_behavior_state");
        }

        let tuning = Tuning {
            attack_ticks: attack_ticks(animations, config.target_tps),
            hurt_ticks: HURT_TICKS,
            invincible_ticks: INVINCIBLE_TICKS,
            seek_speed: SEEK_SPEED,
        };

        Ok(Self {
            rng: SmallRng::seed_from_u64(config.seed),
            config,
            entity_states,
            director_states,
            director_initial: BehaviorTracks::with_initial([load])?,
            ids,
            tuning,
            player,
            enemy,
            events: Vec::new(),
            player_id: None,
            game_over: false,
            unhandled_states: 0,
        })
    }

    pub(crate) fn player_id(&self) -> Option<EntityId> {
        self.player_id
    }

    pub(crate) fn is_game_over(&self) -> bool {
        self.game_over
    }

    #[cfg(test)]
    pub(crate) fn state_ids(&self) -> &StateIds {
        &self.ids
    }

    #[cfg(test)]
    pub(crate) fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    #[cfg(test)]
    pub(crate) fn state_name(&self, id: StateId) -> Option<&str> {
        self.entity_states.name(id)
    }

    fn run_director(&mut self, world: &mut SceneWorld) -> TrackTickReport {
        let mut tracks = mem::take(world.director_mut());
        let Self {
            director_states,
            rng,
            ids,
            enemy,
            player,
            config,
            ..
        } = self;
        let mut ctx = DirectorContext {
            world: &mut *world,
            rng,
            ids,
            enemy,
            player_behavior: &player.behavior,
            enemy_count: config.enemy_count,
        };
        let report = run_tracks(&mut tracks, |id| {
            director_states.handler(id).map(|handler| handler(&mut ctx))
        });
        *world.director_mut() = tracks;
        report
    }

    fn run_entities(&mut self, input: &InputSnapshot, world: &mut SceneWorld) -> TrackTickReport {
        let mut report = TrackTickReport::default();
        let (view, entities) = match world.view_and_entities_mut() {
            Ok(split) => split,
            Err(error) => {
                warn!(error = %error, "behavior_pass_skipped");
                return report;
            }
        };
        let Self {
            entity_states,
            rng,
            ids,
            tuning,
            events,
            ..
        } = self;
        let mut ctx = BehaviorContext {
            view,
            input,
            rng,
            ids,
            tuning,
            events,
        };
        for entity in entities.iter_mut() {
            let mut tracks = mem::take(&mut entity.behavior);
            report.merge(run_tracks(&mut tracks, |id| {
                entity_states
                    .handler(id)
                    .map(|handler| handler(&mut ctx, &mut *entity))
            }));
            entity.behavior = tracks;
        }
        report
    }
}

impl Scene for GameplayScene {
    fn load(&mut self, world: &mut SceneWorld) {
        world.clear();
        self.events.clear();
        self.game_over = false;
        self.unhandled_states = 0;

        let spawn_point = match (self.config.player_spawn, world.collision_view()) {
            (Some(position), _) => position,
            (None, Ok(view)) => director::player_start(&view),
            (None, Err(error)) => {
                warn!(error = %error, "player_spawn_without_map");
                Vec2::ZERO
            }
        };
        let player_id = world.spawn(self.player.spawn(EntityKind::Player, spawn_point));
        world.apply_pending();
        self.player_id = Some(player_id);
        *world.director_mut() = self.director_initial.clone();

        info!(
            player = player_id.0,
            x = spawn_point.x,
            y = spawn_point.y,
            enemy_count = self.config.enemy_count,
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        tick: u64,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let mut report = self.run_director(world);
        report.merge(self.run_entities(input, world));
        if report.unhandled > 0 {
            debug!(tick, unhandled = report.unhandled, "unhandled_behavior_states");
        }
        self.unhandled_states = self
            .unhandled_states
            .saturating_add(u32::try_from(report.unhandled).unwrap_or(u32::MAX));

        let mut command = SceneCommand::None;
        for event in self.events.drain(..) {
            match event {
                GameEvent::GameOver { player } => {
                    self.game_over = true;
                    info!(tick, player = player.0, "game_over");
                    command = SceneCommand::Pause;
                }
            }
        }
        command
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        world.clear();
        self.player_id = None;
        info!(game_over = self.game_over, "scene_unloaded");
    }

    fn take_unhandled_state_count(&mut self) -> u32 {
        mem::take(&mut self.unhandled_states)
    }
}

fn compile_template(
    defs: &DefDatabase,
    name: &'static str,
    registry: &mut StateRegistry<EntityStateFn>,
    fallback: Option<StateId>,
) -> Result<EntityTemplate, GameplayError> {
    let def = defs
        .entity_def_by_name(name)
        .ok_or(GameplayError::MissingDef { name })?;
    let mut initial = def
        .tracks
        .iter()
        .map(|state| registry.declare(state))
        .collect::<Result<Vec<_>, _>>()?;
    if initial.is_empty() {
        initial.extend(fallback);
    }
    Ok(EntityTemplate {
        health: def.health,
        move_speed: def.move_speed,
        bounds: def.bounds,
        behavior: BehaviorTracks::with_initial(initial)?,
    })
}

fn attack_ticks(animations: &AnimationLibrary, target_tps: u32) -> [u32; 4] {
    Direction::ALL.map(|direction| {
        let name = WEAPON_CUT[direction.index()];
        match animations.duration_ms(name) {
            Some(ms) => duration_ticks(ms, target_tps),
            None => {
                warn!(animation = name, "attack_animation_missing");
                0
            }
        }
    })
}
