use super::input::InputSnapshot;
use super::metrics::MoveTally;
use crate::behavior::BehaviorTracks;
use crate::math::Vec2;
use crate::movement::{resolve_velocity, Body, BoundingBox};
use crate::tilemap::{CollisionView, TileMap, TilemapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    /// Stop ticking until the host resumes the driver.
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3,
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Right => Vec2::new(1.0, 0.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Up => Vec2::new(0.0, -1.0),
        }
    }

    /// Facing for a stick deflection; `None` when the stick is centered.
    /// Exact diagonals resolve toward the vertical facing.
    pub fn from_axes(axes: Vec2) -> Option<Direction> {
        if axes.x == 0.0 && axes.y == 0.0 {
            return None;
        }
        // Signed zero on x would flip the tangent to -inf.
        if axes.x == 0.0 {
            return Some(if axes.y > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            });
        }
        let tan = axes.y / axes.x;
        let direction = if axes.x >= 0.0 {
            if tan < -1.0 {
                Direction::Up
            } else if tan < 1.0 {
                Direction::Right
            } else {
                Direction::Down
            }
        } else if tan < -1.0 {
            Direction::Down
        } else if tan < 1.0 {
            Direction::Left
        } else {
            Direction::Up
        };
        Some(direction)
    }
}

pub const ANIMATION_SLOT_COUNT: usize = 2;
pub const BODY_SLOT: usize = 0;
pub const OVERLAY_SLOT: usize = 1;

/// Named animation selection per slot, read by presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationSlots {
    slots: [Option<&'static str>; ANIMATION_SLOT_COUNT],
}

impl AnimationSlots {
    /// Returns true when the slot changed.
    pub fn play(&mut self, slot: usize, name: &'static str) -> bool {
        match self.slots.get_mut(slot) {
            Some(current) if *current != Some(name) => {
                *current = Some(name);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self, slot: usize) {
        if let Some(current) = self.slots.get_mut(slot) {
            *current = None;
        }
    }

    pub fn current(&self, slot: usize) -> Option<&'static str> {
        self.slots.get(slot).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vitals {
    pub health: i32,
    pub hurt_countdown: u32,
    pub invincible_countdown: u32,
    pub attack_countdown: u32,
}

/// Enemy contact bookkeeping written by the world and read by the entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contact {
    pub enemy_collision: Option<EntityId>,
    pub damage_disabled: bool,
}

/// Wandering target: one tile step from `origin` toward `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub origin: Vec2,
    pub target: Vec2,
    pub remaining: f32,
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub body: Body,
    pub direction: Direction,
    pub visible: bool,
    pub move_speed: f32,
    pub animations: AnimationSlots,
    pub behavior: BehaviorTracks,
    pub vitals: Vitals,
    pub contact: Contact,
    pub seek: Option<SeekTarget>,
}

/// Everything needed to place a new entity.
#[derive(Debug, Clone)]
pub struct EntitySpawn {
    pub kind: EntityKind,
    pub position: Vec2,
    pub bounds: BoundingBox,
    pub health: i32,
    pub move_speed: f32,
    pub behavior: BehaviorTracks,
}

impl EntitySpawn {
    pub fn new(kind: EntityKind, position: Vec2) -> Self {
        Self {
            kind,
            position,
            bounds: BoundingBox::default(),
            health: 1,
            move_speed: 1.0,
            behavior: BehaviorTracks::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Viewport over the map, in world units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera2D {
    pub offset: Vec2,
    pub view_size: Vec2,
}

impl Camera2D {
    /// Centers on `target`, clamped so the view stays inside the map.
    pub fn follow(&mut self, target: Vec2, world_size: Vec2) {
        let axis = |target: f32, view: f32, world: f32| {
            let max_offset = (world - view).max(0.0);
            (target - view * 0.5).clamp(0.0, max_offset)
        };
        self.offset = Vec2::new(
            axis(target.x, self.view_size.x, world_size.x),
            axis(target.y, self.view_size.y, world_size.y),
        );
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    camera: Camera2D,
    tilemap: Option<TileMap>,
    collision_layer: usize,
    director: BehaviorTracks,
}

impl SceneWorld {
    pub fn spawn(&mut self, spawn: EntitySpawn) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            kind: spawn.kind,
            body: Body::at(spawn.position, spawn.bounds),
            direction: Direction::default(),
            visible: true,
            move_speed: spawn.move_speed,
            animations: AnimationSlots::default(),
            behavior: spawn.behavior,
            vitals: Vitals {
                health: spawn.health,
                ..Vitals::default()
            },
            contact: Contact::default(),
            seek: None,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    /// Applies queued despawns, then queued spawns in request order.
    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            let doomed = |entity: &Entity| pending.binary_search_by_key(&entity.id.0, |id| id.0).is_ok();
            self.entities.retain(|entity| !doomed(entity));
            self.pending_spawns.retain(|entity| !doomed(entity));
            self.pending_despawns.clear();
        }

        self.entities.append(&mut self.pending_spawns);
    }

    /// Drops entities and the director track. The tilemap stays loaded.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.camera.offset = Vec2::ZERO;
        self.director.clear();
    }

    pub fn set_tilemap(&mut self, tilemap: TileMap, collision_layer: usize) {
        self.tilemap = Some(tilemap);
        self.collision_layer = collision_layer;
    }

    pub fn tilemap(&self) -> Option<&TileMap> {
        self.tilemap.as_ref()
    }

    pub fn collision_view(&self) -> Result<CollisionView<'_>, TilemapError> {
        self.tilemap
            .as_ref()
            .ok_or(TilemapError::NotLoaded)?
            .collision_view(self.collision_layer)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn player(&self) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.kind == EntityKind::Player)
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|entity| entity.kind == EntityKind::Player)
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    /// World-level behavior track, run before any entity.
    pub fn director(&self) -> &BehaviorTracks {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut BehaviorTracks {
        &mut self.director
    }

    /// Split borrow for behavior passes that read the map while mutating
    /// entities.
    pub fn view_and_entities_mut(
        &mut self,
    ) -> Result<(CollisionView<'_>, &mut Vec<Entity>), TilemapError> {
        let view = self
            .tilemap
            .as_ref()
            .ok_or(TilemapError::NotLoaded)?
            .collision_view(self.collision_layer)?;
        Ok((view, &mut self.entities))
    }

    /// Resolves and integrates every body for one tick, player first then
    /// the rest in list order.
    pub fn step_bodies(&mut self) -> Result<MoveTally, TilemapError> {
        let (view, entities) = self.view_and_entities_mut()?;
        let mut tally = MoveTally::default();
        for entity in entities.iter_mut() {
            entity.body.clamp_small();
            tally.record(resolve_velocity(&view, &mut entity.body));
            entity.body.integrate();
        }
        Ok(tally)
    }

    pub fn follow_player(&mut self) {
        let Some(target) = self.player().map(|player| player.body.position) else {
            return;
        };
        let Ok(world_size) = self.collision_view().map(|view| view.world_size()) else {
            return;
        };
        self.camera.follow(target, world_size);
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(&mut self, tick: u64, input: &InputSnapshot, world: &mut SceneWorld)
        -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    /// Behavior states that ran without a handler since the last call.
    fn take_unhandled_state_count(&mut self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_map() -> SceneWorld {
        let mut world = SceneWorld::default();
        let map = TileMap::from_ascii(16.0, 16.0, &["......", "......", "..#...", "......"])
            .expect("map");
        world.set_tilemap(map, 0);
        world
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn spawns_become_visible_only_after_apply_pending() {
        let mut world = SceneWorld::default();
        let id = world.spawn(EntitySpawn::new(EntityKind::Enemy, Vec2::new(8.0, 8.0)));
        assert_eq!(world.entity_count(), 0);
        world.apply_pending();
        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(id).is_some_and(|entity| entity.visible));

        assert!(world.despawn(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
        assert!(!world.despawn(id));
    }

    #[test]
    fn duplicate_pending_despawns_are_idempotent() {
        let mut world = SceneWorld::default();
        let doomed = world.spawn(EntitySpawn::new(EntityKind::Enemy, Vec2::ZERO));
        let survivor = world.spawn(EntitySpawn::new(EntityKind::Player, Vec2::new(3.0, 1.0)));
        world.apply_pending();

        assert!(world.despawn(doomed));
        assert!(world.despawn(doomed));
        world.apply_pending();

        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(doomed).is_none());
        assert_eq!(world.player().map(|player| player.id), Some(survivor));
    }

    #[test]
    fn despawn_of_pending_spawn_cancels_it() {
        let mut world = SceneWorld::default();
        let id = world.spawn(EntitySpawn::new(EntityKind::Enemy, Vec2::ZERO));
        assert!(world.despawn(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn collision_view_requires_loaded_map() {
        let world = SceneWorld::default();
        assert!(matches!(
            world.collision_view(),
            Err(TilemapError::NotLoaded)
        ));
    }

    #[test]
    fn step_bodies_resolves_before_integrating() {
        let mut world = world_with_map();
        let id = world.spawn(EntitySpawn::new(EntityKind::Player, Vec2::new(24.0, 40.0)));
        world.apply_pending();
        if let Some(entity) = world.find_entity_mut(id) {
            entity.body.velocity = Vec2::new(4.0, 0.0);
        }

        let tally = world.step_bodies().expect("step");
        assert_eq!(tally.stopped, 1);
        let entity = world.find_entity(id).expect("entity");
        assert_eq!(entity.body.position, Vec2::new(24.0, 40.0));
        assert_eq!(entity.body.velocity, Vec2::ZERO);
    }

    #[test]
    fn camera_follow_clamps_to_map_edges() {
        let mut camera = Camera2D {
            offset: Vec2::ZERO,
            view_size: Vec2::new(160.0, 144.0),
        };
        let world_size = Vec2::new(320.0, 256.0);

        camera.follow(Vec2::new(10.0, 10.0), world_size);
        assert_eq!(camera.offset, Vec2::ZERO);

        camera.follow(Vec2::new(200.0, 130.0), world_size);
        assert_eq!(camera.offset, Vec2::new(120.0, 58.0));

        camera.follow(Vec2::new(319.0, 255.0), world_size);
        assert_eq!(camera.offset, Vec2::new(160.0, 112.0));

        camera.follow(Vec2::new(50.0, 50.0), Vec2::new(100.0, 100.0));
        assert_eq!(camera.offset, Vec2::ZERO);
    }

    #[test]
    fn direction_from_axes_matches_octant_rules() {
        assert_eq!(Direction::from_axes(Vec2::ZERO), None);
        assert_eq!(Direction::from_axes(Vec2::new(1.0, 0.0)), Some(Direction::Right));
        assert_eq!(Direction::from_axes(Vec2::new(0.0, 1.0)), Some(Direction::Down));
        assert_eq!(Direction::from_axes(Vec2::new(0.0, -1.0)), Some(Direction::Up));
        assert_eq!(Direction::from_axes(Vec2::new(-1.0, 0.2)), Some(Direction::Left));
        assert_eq!(Direction::from_axes(Vec2::new(1.0, 1.0)), Some(Direction::Down));
        assert_eq!(Direction::from_axes(Vec2::new(-1.0, -1.0)), Some(Direction::Up));
        assert_eq!(Direction::from_axes(Vec2::new(-0.5, 1.0)), Some(Direction::Down));
    }

    #[test]
    fn negative_zero_x_keeps_vertical_facing() {
        assert_eq!(Direction::from_axes(Vec2::new(-0.0, 1.0)), Some(Direction::Down));
        assert_eq!(Direction::from_axes(Vec2::new(-0.0, -1.0)), Some(Direction::Up));
    }

    #[test]
    fn animation_slots_ignore_repeats_and_bad_slots() {
        let mut slots = AnimationSlots::default();
        assert!(slots.play(BODY_SLOT, "hero_walk_r"));
        assert!(!slots.play(BODY_SLOT, "hero_walk_r"));
        assert!(slots.play(OVERLAY_SLOT, "blink"));
        assert!(!slots.play(7, "blink"));
        slots.clear(OVERLAY_SLOT);
        assert_eq!(slots.current(OVERLAY_SLOT), None);
        assert_eq!(slots.current(BODY_SLOT), Some("hero_walk_r"));
    }
}
