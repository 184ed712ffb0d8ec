#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation state for Deep Tank.
//!
//! The [`World`] owns a sliding depth-window of [`LevelLayer`] values plus a
//! generational arena of actors. Adapters drive it exclusively through
//! [`apply`] with [`Command`] values and observe the resulting [`Event`]
//! stream; read access goes through the [`query`] module. Terrain arrives
//! asynchronously: the update loop keeps the window topped up with
//! generation requests and publishes finished buffers as they are drained
//! from the pool, so a tick never blocks on a layer that is still baking.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use glam::{IVec3, Vec3};

use deep_tank_core::{
    cell_of, ActorId, CellCategory, Command, Event, LayerBuffer, Tile, TileClassId,
};
use deep_tank_generation::LayerPool;

mod actors;
pub mod layer;

pub use actors::{
    ActorSpec, AppearAction, BaseSpec, BulletSpec, EffectSpec, EnemySpec, Inventory,
    ProjectileRecipe, TankSpec, WeaponSpec,
};
pub use layer::{fill_round_area, LayerError, LevelLayer};

use actors::Actor;

/// Construction parameters for a [`World`].
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    first_layer_depth: i32,
    max_loaded_layers: usize,
}

impl WorldConfig {
    /// Creates a configuration with the provided window placement and size.
    #[must_use]
    pub const fn new(first_layer_depth: i32, max_loaded_layers: usize) -> Self {
        Self {
            first_layer_depth,
            max_loaded_layers,
        }
    }

    /// Depth of the shallowest layer in the initial window.
    #[must_use]
    pub const fn first_layer_depth(&self) -> i32 {
        self.first_layer_depth
    }

    /// Number of consecutive layers the update loop keeps resident.
    #[must_use]
    pub const fn max_loaded_layers(&self) -> usize {
        self.max_loaded_layers
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new(0, 32)
    }
}

enum LayerSlot {
    /// Requested from the generator but not yet published.
    Pending,
    /// Fully resident and readable.
    Loaded(LevelLayer),
}

struct ArenaSlot {
    generation: u32,
    ready_fired: bool,
    actor: Option<Actor>,
}

/// Slot-reusing actor storage with generation-counted handles.
///
/// Removing an actor bumps the slot generation, so handles held by other
/// actors (chase targets, instigators) go stale instead of aliasing a
/// later occupant. `take`/`put_back` let the update loop move an actor out
/// of the arena while it mutates the world that owns it.
#[derive(Default)]
struct ActorArena {
    slots: Vec<ArenaSlot>,
    free: Vec<u32>,
}

impl ActorArena {
    fn insert(&mut self, actor: Actor) -> ActorId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.actor = Some(actor);
            slot.ready_fired = false;
            ActorId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(ArenaSlot {
                generation: 0,
                ready_fired: false,
                actor: Some(actor),
            });
            ActorId::new(index, 0)
        }
    }

    fn slot(&self, id: ActorId) -> Option<&ArenaSlot> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    fn slot_mut(&mut self, id: ActorId) -> Option<&mut ArenaSlot> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    fn get(&self, id: ActorId) -> Option<&Actor> {
        self.slot(id).and_then(|slot| slot.actor.as_ref())
    }

    fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.slot_mut(id).and_then(|slot| slot.actor.as_mut())
    }

    fn take(&mut self, id: ActorId) -> Option<Actor> {
        self.slot_mut(id).and_then(|slot| slot.actor.take())
    }

    fn put_back(&mut self, id: ActorId, actor: Actor) {
        if let Some(slot) = self.slot_mut(id) {
            slot.actor = Some(actor);
        }
    }

    fn remove(&mut self, id: ActorId) -> Option<Actor> {
        let slot = self.slot_mut(id)?;
        let actor = slot.actor.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        Some(actor)
    }

    fn ready_pending(&self, id: ActorId) -> bool {
        self.slot(id)
            .is_some_and(|slot| !slot.ready_fired && slot.actor.is_some())
    }

    fn mark_ready(&mut self, id: ActorId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.ready_fired = true;
        }
    }
}

/// The complete simulation state: terrain window plus actor registry.
pub struct World {
    first_layer_depth: i32,
    max_loaded_layers: usize,
    layers: VecDeque<LayerSlot>,
    pool: Option<LayerPool>,
    arena: ActorArena,
    order: Vec<ActorId>,
    collideable: BTreeSet<ActorId>,
    frame_stamp: u64,
}

impl World {
    /// Creates a world with no generator attached.
    ///
    /// Layers only become resident through explicit [`World::publish_layer`]
    /// calls; every cell categorizes as unloaded until then.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            first_layer_depth: config.first_layer_depth(),
            max_loaded_layers: config.max_loaded_layers().max(1),
            layers: VecDeque::new(),
            pool: None,
            arena: ActorArena::default(),
            order: Vec::new(),
            collideable: BTreeSet::new(),
            frame_stamp: 0,
        }
    }

    /// Creates a world that keeps its window filled from a generation pool.
    #[must_use]
    pub fn with_generator(config: WorldConfig, pool: LayerPool) -> Self {
        let mut world = Self::new(config);
        world.pool = Some(pool);
        world
    }

    /// Resolves a depth to its resident layer, if the window holds one.
    #[must_use]
    pub fn layer(&self, depth: i32) -> Option<&LevelLayer> {
        let index = usize::try_from(depth.checked_sub(self.first_layer_depth)?).ok()?;
        match self.layers.get(index) {
            Some(LayerSlot::Loaded(layer)) => Some(layer),
            _ => None,
        }
    }

    pub(crate) fn layer_mut(&mut self, depth: i32) -> Option<&mut LevelLayer> {
        let index = usize::try_from(depth.checked_sub(self.first_layer_depth)?).ok()?;
        match self.layers.get_mut(index) {
            Some(LayerSlot::Loaded(layer)) => Some(layer),
            _ => None,
        }
    }

    fn is_layer_loaded(&self, depth: i32) -> bool {
        self.layer(depth).is_some()
    }

    /// Classifies a grid point for movement.
    ///
    /// The wall layer at `point.z` is consulted first; a solid tile there is
    /// a wall regardless of what lies beneath. Otherwise the layer at
    /// `point.z + 1` decides between floor and pit. If either required layer
    /// is absent or pending the answer is unloaded, which movement treats as
    /// "freeze, never guess".
    #[must_use]
    pub fn categorize(&self, point: IVec3) -> CellCategory {
        let Some(wall) = self.layer(point.z) else {
            return CellCategory::Unloaded;
        };
        if wall.tile(point.truncate()).is_solid() {
            return CellCategory::Wall;
        }
        let Some(floor) = self.layer(point.z + 1) else {
            return CellCategory::Unloaded;
        };
        if floor.tile(point.truncate()).is_solid() {
            CellCategory::Floor
        } else {
            CellCategory::Empty
        }
    }

    /// Reads the tile at a grid point, or `None` when its layer is absent.
    #[must_use]
    pub fn tile_at(&self, point: IVec3) -> Option<Tile> {
        self.layer(point.z).map(|layer| layer.tile(point.truncate()))
    }

    /// Installs a generated buffer into the window.
    ///
    /// Buffers for depths shallower than the window are stale products of
    /// trimmed requests and are discarded, as are duplicates for depths that
    /// already loaded. A successful publish fires the ready hook of every
    /// actor standing on the new layer and announces [`Event::LayerLoaded`].
    pub fn publish_layer(
        &mut self,
        buffer: LayerBuffer,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LayerError> {
        let depth = buffer.depth();
        let Some(offset) = depth.checked_sub(self.first_layer_depth) else {
            return Ok(());
        };
        let Ok(index) = usize::try_from(offset) else {
            tracing::trace!(depth, "discarding stale layer below the window");
            return Ok(());
        };

        while self.layers.len() <= index {
            self.layers.push_back(LayerSlot::Pending);
        }
        if matches!(self.layers[index], LayerSlot::Loaded(_)) {
            tracing::trace!(depth, "discarding duplicate layer");
            return Ok(());
        }

        self.layers[index] = LayerSlot::Loaded(LevelLayer::from_buffer(buffer)?);
        tracing::debug!(depth, "layer published");
        out_events.push(Event::LayerLoaded { depth });

        let arrivals: Vec<ActorId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.arena.ready_pending(*id)
                    && self
                        .arena
                        .get(*id)
                        .is_some_and(|actor| cell_of(actor.position()).z == depth)
            })
            .collect();
        for id in arrivals {
            self.run_ready_hook(id, out_events);
        }
        Ok(())
    }

    /// Advances the simulation by `dt`.
    ///
    /// Order within the tick: clock, generation pump, actor updates over a
    /// snapshot of the registry (actors spawned mid-tick first update next
    /// tick), then removal of everything whose liveness predicate failed.
    pub fn update(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.frame_stamp += 1;
        out_events.push(Event::TimeAdvanced { dt });
        let dt = dt.as_secs_f32();

        self.pump_generation(out_events);

        let snapshot = self.order.clone();
        for id in snapshot {
            let resident = self
                .arena
                .get(id)
                .map(|actor| self.is_layer_loaded(cell_of(actor.position()).z));
            // An actor whose layer is still baking is frozen outright.
            if resident != Some(true) {
                continue;
            }
            if let Some(mut actor) = self.arena.take(id) {
                actors::update(&mut actor, id, dt, self, out_events);
                self.arena.put_back(id, actor);
            }
        }

        self.prune_dead(out_events);
    }

    fn pump_generation(&mut self, out_events: &mut Vec<Event>) {
        let drained = match &self.pool {
            Some(pool) => pool.try_drain(),
            None => return,
        };
        for buffer in drained {
            let depth = buffer.depth();
            if let Err(error) = self.publish_layer(buffer, out_events) {
                tracing::warn!(depth, %error, "generated layer rejected");
            }
        }

        let mut wanted = Vec::new();
        while self.layers.len() < self.max_loaded_layers {
            let depth = self.first_layer_depth + self.layers.len() as i32;
            self.layers.push_back(LayerSlot::Pending);
            wanted.push(depth);
        }
        if let Some(pool) = &self.pool {
            for depth in wanted {
                pool.request(depth);
            }
        }
    }

    fn prune_dead(&mut self, out_events: &mut Vec<Event>) {
        let dead: Vec<ActorId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.arena.get(*id).is_some_and(|actor| !actor.is_alive()))
            .collect();
        for id in dead {
            if let Some(actor) = self.arena.remove(id) {
                actors::on_destroy(&actor, id);
                self.unregister_for_collision(id);
                out_events.push(Event::ActorDestroyed {
                    actor: id,
                    kind: actor.kind(),
                });
            }
        }
        let arena = &self.arena;
        self.order.retain(|id| arena.get(*id).is_some());
    }

    /// Drops fully loaded layers shallower than `min_depth` from the window.
    ///
    /// A pending slot is never dropped: its buffer is already in flight and
    /// eviction would leave the window misaligned with the pool's answer.
    pub fn trim_layers_above(&mut self, min_depth: i32, out_events: &mut Vec<Event>) {
        while self.first_layer_depth < min_depth {
            if !matches!(self.layers.front(), Some(LayerSlot::Loaded(_))) {
                break;
            }
            if let Some(LayerSlot::Loaded(layer)) = self.layers.pop_front() {
                tracing::debug!(depth = layer.depth(), "layer evicted");
                out_events.push(Event::LayerEvicted {
                    depth: layer.depth(),
                });
            }
            self.first_layer_depth += 1;
        }
    }

    /// Inserts an actor from its blueprint and returns its handle.
    ///
    /// Tanks, bases and enemies join the collision index immediately. The
    /// ready hook runs now when the spawn layer is resident, otherwise it is
    /// deferred until that layer's publication.
    pub fn add_actor(&mut self, spec: ActorSpec, out_events: &mut Vec<Event>) -> ActorId {
        let actor = actors::instantiate(spec);
        let kind = actor.kind();
        let depth = cell_of(actor.position()).z;
        let collideable = actor.is_collideable();

        let id = self.arena.insert(actor);
        self.order.push(id);
        if collideable {
            self.register_for_collision(id);
        }
        tracing::debug!(actor = id.index(), ?kind, depth, "actor spawned");
        out_events.push(Event::ActorSpawned { actor: id, kind });

        if self.is_layer_loaded(depth) {
            self.run_ready_hook(id, out_events);
        }
        id
    }

    fn run_ready_hook(&mut self, id: ActorId, out_events: &mut Vec<Event>) {
        if !self.arena.ready_pending(id) {
            return;
        }
        self.arena.mark_ready(id);
        if let Some(mut actor) = self.arena.take(id) {
            actors::on_ready(&mut actor, id, self, out_events);
            self.arena.put_back(id, actor);
        }
    }

    /// Adds an actor to the point-query collision index. Idempotent.
    pub fn register_for_collision(&mut self, id: ActorId) {
        let _ = self.collideable.insert(id);
    }

    /// Removes an actor from the point-query collision index. Idempotent.
    pub fn unregister_for_collision(&mut self, id: ActorId) {
        let _ = self.collideable.remove(&id);
    }

    /// Returns every registered actor whose disc contains `point`.
    ///
    /// Membership uses the candidate's own size as the radius and requires
    /// the candidate to occupy the same layer as the query point.
    #[must_use]
    pub fn query_point(&self, point: Vec3) -> Vec<ActorId> {
        let cell_z = point.z.floor() as i32;
        self.collideable
            .iter()
            .copied()
            .filter(|id| {
                self.arena.get(*id).is_some_and(|actor| {
                    cell_of(actor.position()).z == cell_z
                        && actor
                            .position()
                            .truncate()
                            .distance_squared(point.truncate())
                            <= actor.size() * actor.size()
                })
            })
            .collect()
    }

    pub(crate) fn overlaps_collideable(&self, point: Vec3, exclude: Option<ActorId>) -> bool {
        self.query_point(point)
            .into_iter()
            .any(|id| Some(id) != exclude)
    }

    /// Weakens a single tile, crediting the gatherer when it breaks.
    pub fn harvest_tile(
        &mut self,
        point: IVec3,
        force: i16,
        gatherer: Option<ActorId>,
        out_events: &mut Vec<Event>,
    ) -> Option<(TileClassId, i16)> {
        let broken = self
            .layer_mut(point.z)?
            .harvest(point.truncate(), force)?;
        self.credit_harvest(gatherer, &[broken], out_events);
        Some(broken)
    }

    /// Overwrites a single tile, failing when its layer is absent.
    pub fn set_tile(&mut self, point: IVec3, tile: Tile) -> Result<(), LayerError> {
        self.layer_mut(point.z)
            .ok_or(LayerError::NotLoaded)?
            .set_tile(point.truncate(), tile)
    }

    pub(crate) fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.arena.get(id)
    }

    pub(crate) fn credit_harvest(
        &mut self,
        gatherer: Option<ActorId>,
        yields: &[(TileClassId, i16)],
        out_events: &mut Vec<Event>,
    ) {
        let Some(gatherer) = gatherer else {
            return;
        };
        let Some(Actor::Tank { inventory, .. }) = self.arena.get_mut(gatherer) else {
            return;
        };
        for (class_id, value) in yields.iter().copied() {
            if value <= 0 {
                continue;
            }
            if class_id == TileClassId::FUEL {
                inventory.fuel += i32::from(value);
            } else {
                inventory.minerals += i32::from(value);
            }
            out_events.push(Event::ResourceHarvested {
                gatherer,
                class_id,
                value,
            });
        }
    }

    pub(crate) fn damage_actor(&mut self, id: ActorId, amount: f32) {
        if let Some(movement) = self.arena.get_mut(id).and_then(Actor::movement_mut) {
            movement.hp -= amount;
        }
    }

    /// Moves a solid wall tile down one layer, leaving a passage behind.
    ///
    /// Both the wall layer and the layer beneath must be resident; a probe
    /// into a half-loaded seam does nothing.
    pub(crate) fn tunnel(&mut self, point: IVec3) {
        let pos = point.truncate();
        let wall_tile = match self.layer(point.z) {
            Some(layer) => layer.tile(pos),
            None => return,
        };
        if !wall_tile.is_solid() || !self.is_layer_loaded(point.z + 1) {
            return;
        }
        if let Some(floor) = self.layer_mut(point.z + 1) {
            let _ = floor.set_tile(pos, wall_tile);
        }
        if let Some(wall) = self.layer_mut(point.z) {
            let _ = wall.set_tile(pos, Tile::EMPTY);
        }
    }

    /// Fills a disc with `fill` on the probed layer and the one beneath.
    pub(crate) fn fortify(&mut self, point: IVec3, radius: i32, fill: Tile) {
        for depth in [point.z, point.z + 1] {
            if let Some(layer) = self.layer_mut(depth) {
                fill_round_area(layer, point.truncate(), radius, fill);
            }
        }
    }
}

/// Applies one external command to the world.
///
/// This is the single mutation entry point adapters use; commands that
/// address a stale or mismatched actor handle are silently ignored.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.update(dt, out_events),
        Command::SetVelocity { actor, velocity } => {
            if let Some(movement) = world.arena.get_mut(actor).and_then(Actor::movement_mut) {
                movement.velocity = velocity.clamp_length_max(movement.max_speed);
            }
        }
        Command::SetRotation { actor, rotation } => {
            if let Some(movement) = world.arena.get_mut(actor).and_then(Actor::movement_mut) {
                movement.rotation = rotation;
            }
        }
        Command::SetShootDirection { actor, direction } => {
            if let Some(arsenal) = world.arena.get_mut(actor).and_then(Actor::arsenal_mut) {
                arsenal.shoot_direction = direction;
            }
        }
        Command::TriggerShoot { actor } => {
            if let Some(arsenal) = world.arena.get_mut(actor).and_then(Actor::arsenal_mut) {
                arsenal.shoot_requested = true;
            }
        }
        Command::SetActiveWeapon { actor, slot } => {
            if let Some(arsenal) = world.arena.get_mut(actor).and_then(Actor::arsenal_mut) {
                if slot < arsenal.weapons.len() {
                    arsenal.active = slot;
                }
            }
        }
        Command::TrimLayersAbove { min_depth } => world.trim_layers_above(min_depth, out_events),
    }
}

/// Read-only projections of world state for adapters and tests.
pub mod query {
    use glam::{IVec3, Vec3};

    use deep_tank_core::{ActorId, ActorKind, CellCategory, Tile};

    use super::{actors::Inventory, LayerSlot, LevelLayer, World};

    /// Point-in-time copy of one actor's externally visible state.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct ActorSnapshot {
        /// Handle the actor is addressed by.
        pub id: ActorId,
        /// Variant tag.
        pub kind: ActorKind,
        /// Current position; `z` selects the layer.
        pub position: Vec3,
        /// Facing angle in radians.
        pub rotation: f32,
        /// Collision radius and visual scale.
        pub size: f32,
        /// Remaining hit points, for variants that have them.
        pub hp: Option<f32>,
        /// Remaining lifetime, for particle variants.
        pub lifetime: Option<f32>,
    }

    /// Snapshots every live actor in insertion order.
    #[must_use]
    pub fn actor_view(world: &World) -> Vec<ActorSnapshot> {
        world
            .order
            .iter()
            .filter_map(|id| {
                world.arena.get(*id).map(|actor| ActorSnapshot {
                    id: *id,
                    kind: actor.kind(),
                    position: actor.position(),
                    rotation: actor.rotation(),
                    size: actor.size(),
                    hp: actor.hp(),
                    lifetime: actor.lifetime(),
                })
            })
            .collect()
    }

    /// Resident layer at `depth`, if any.
    #[must_use]
    pub fn layer(world: &World, depth: i32) -> Option<&LevelLayer> {
        world.layer(depth)
    }

    /// Movement classification of a grid point.
    #[must_use]
    pub fn categorize(world: &World, point: IVec3) -> CellCategory {
        world.categorize(point)
    }

    /// Tile at a grid point, or `None` when its layer is absent.
    #[must_use]
    pub fn tile_at(world: &World, point: IVec3) -> Option<Tile> {
        world.tile_at(point)
    }

    /// A tank's harvested resources.
    #[must_use]
    pub fn inventory(world: &World, actor: ActorId) -> Option<Inventory> {
        world.arena.get(actor).and_then(super::Actor::inventory)
    }

    /// Remaining hit points of a character actor.
    #[must_use]
    pub fn hp(world: &World, actor: ActorId) -> Option<f32> {
        world.arena.get(actor).and_then(super::Actor::hp)
    }

    /// Per-slot ammunition counts of a tank's arsenal.
    #[must_use]
    pub fn ammunition(world: &World, actor: ActorId) -> Option<Vec<u32>> {
        world.arena.get(actor).and_then(super::Actor::ammunition)
    }

    /// Monotonic tick counter.
    #[must_use]
    pub fn frame_stamp(world: &World) -> u64 {
        world.frame_stamp
    }

    /// Depth of the shallowest slot still in the window.
    #[must_use]
    pub fn first_layer_depth(world: &World) -> i32 {
        world.first_layer_depth
    }

    /// Number of fully resident layers in the window.
    #[must_use]
    pub fn loaded_layer_count(world: &World) -> usize {
        world
            .layers
            .iter()
            .filter(|slot| matches!(slot, LayerSlot::Loaded(_)))
            .count()
    }

    /// Number of requested-but-unpublished slots in the window.
    #[must_use]
    pub fn pending_layer_count(world: &World) -> usize {
        world
            .layers
            .iter()
            .filter(|slot| matches!(slot, LayerSlot::Pending))
            .count()
    }

    /// Handles currently registered for point-query collision, in order.
    #[must_use]
    pub fn collideable_actors(world: &World) -> Vec<ActorId> {
        world.collideable.iter().copied().collect()
    }
}
