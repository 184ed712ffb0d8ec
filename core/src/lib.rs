#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Deep Tank engine.
//!
//! This crate defines the value types that connect the background terrain
//! generator, the authoritative world, and its external consumers. The
//! generator produces immutable [`LayerBuffer`] values, the world publishes
//! them as live layers and advances actors referenced by stable [`ActorId`]
//! handles, and adapters drive the simulation through [`Command`] values
//! while observing [`Event`] values broadcast after every tick.

use std::time::Duration;

use glam::{IVec2, IVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier of a tile class inside the fixed process-wide catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileClassId(u8);

impl TileClassId {
    /// The non-solid class used for carved-out and never-generated cells.
    pub const EMPTY: Self = Self(0);
    /// Soft solid ground.
    pub const DIRT: Self = Self(1);
    /// Hard solid ground.
    pub const ROCK: Self = Self(2);
    /// First ore class seeded by the generator's detail pass.
    pub const FIRST_ORE: Self = Self(3);
    /// Last ore class seeded by the generator's detail pass.
    pub const LAST_ORE: Self = Self(10);
    /// Combustible class credited to a gatherer's fuel reserve.
    pub const FUEL: Self = Self(10);

    /// Creates a new tile class identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Immutable metadata shared by every tile referencing the class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileClass {
    name: &'static str,
    initial_strength: i16,
    resource_value: i16,
    solid: bool,
}

impl TileClass {
    const fn new(name: &'static str, initial_strength: i16, resource_value: i16) -> Self {
        Self {
            name,
            initial_strength,
            resource_value,
            solid: true,
        }
    }

    const fn passable(name: &'static str) -> Self {
        Self {
            name,
            initial_strength: 0,
            resource_value: 0,
            solid: false,
        }
    }

    /// Human-readable name of the class.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Durability a freshly generated tile of this class starts with.
    #[must_use]
    pub const fn initial_strength(&self) -> i16 {
        self.initial_strength
    }

    /// Resource value credited to a gatherer when a tile of this class breaks.
    #[must_use]
    pub const fn resource_value(&self) -> i16 {
        self.resource_value
    }

    /// Whether tiles of this class block movement on their own layer.
    #[must_use]
    pub const fn is_solid(&self) -> bool {
        self.solid
    }
}

/// Fixed catalog mapping [`TileClassId`] values to their shared metadata.
///
/// The catalog is baked into the binary and never mutated; tiles reference
/// classes by id only. Lookups for unknown ids resolve to the empty class so
/// that read paths never fail.
#[derive(Debug)]
pub struct TileCatalog;

const TILE_CLASSES: [TileClass; 11] = [
    TileClass::passable("empty"),
    TileClass::new("dirt", 5, 0),
    TileClass::new("rock", 20, 0),
    TileClass::new("cuprum_ore", 3, 1),
    TileClass::new("mineral_sapphire", 4, 4),
    TileClass::new("mineral_emerald", 4, 5),
    TileClass::new("mineral_amethyst", 4, 3),
    TileClass::new("mineral_quartz", 4, 6),
    TileClass::new("gold_ore", 3, 2),
    TileClass::new("mineral_ruby", 10, 10),
    TileClass::new("fuel", 1, 1),
];

impl TileCatalog {
    /// Resolves a class id to its metadata, falling back to the empty class.
    #[must_use]
    pub fn class(id: TileClassId) -> &'static TileClass {
        TILE_CLASSES
            .get(usize::from(id.get()))
            .unwrap_or(&TILE_CLASSES[0])
    }

    /// Number of classes contained in the catalog.
    #[must_use]
    pub const fn len() -> usize {
        TILE_CLASSES.len()
    }

    /// Iterator over the ore class ids in seeding priority order.
    pub fn ore_ids() -> impl Iterator<Item = TileClassId> {
        (TileClassId::FIRST_ORE.get()..=TileClassId::LAST_ORE.get()).map(TileClassId::new)
    }
}

/// A single grid cell: a class reference plus its remaining durability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    class_id: TileClassId,
    strength: i16,
}

impl Tile {
    /// Shared sentinel returned by reads outside loaded storage.
    pub const EMPTY: Self = Self {
        class_id: TileClassId::EMPTY,
        strength: 0,
    };

    /// Creates a tile of the given class with full initial strength.
    #[must_use]
    pub fn of(class_id: TileClassId) -> Self {
        Self {
            class_id,
            strength: TileCatalog::class(class_id).initial_strength(),
        }
    }

    /// Class the tile currently belongs to.
    #[must_use]
    pub const fn class_id(&self) -> TileClassId {
        self.class_id
    }

    /// Remaining durability of the tile.
    #[must_use]
    pub const fn strength(&self) -> i16 {
        self.strength
    }

    /// Whether the tile blocks movement on its own layer.
    #[must_use]
    pub fn is_solid(&self) -> bool {
        TileCatalog::class(self.class_id).is_solid()
    }

    /// Reduces durability by `force`, floored at zero.
    ///
    /// Returns the class's resource value exactly when the hit broke the
    /// tile; the caller is responsible for swapping in the empty class so the
    /// depletion and the replacement stay one atomic step.
    #[must_use]
    pub fn weaken(&mut self, force: i16) -> Option<i16> {
        if self.strength <= 0 {
            return None;
        }
        self.strength = (self.strength - force).max(0);
        if self.strength == 0 {
            Some(TileCatalog::class(self.class_id).resource_value())
        } else {
            None
        }
    }
}

/// Fully generated tile storage handed from the generator to the world.
///
/// The buffer is built entirely off the simulation thread and published
/// whole; it is the only value crossing the generation thread boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerBuffer {
    depth: i32,
    size: IVec2,
    tiles: Vec<Tile>,
}

impl LayerBuffer {
    /// Wraps a dense row-major tile vector sized `size.x * size.y`.
    #[must_use]
    pub fn new(depth: i32, size: IVec2, tiles: Vec<Tile>) -> Self {
        Self { depth, size, tiles }
    }

    /// Creates a buffer with every tile set to the provided value.
    #[must_use]
    pub fn filled(depth: i32, size: IVec2, tile: Tile) -> Self {
        let capacity = (size.x.max(0) as usize) * (size.y.max(0) as usize);
        Self {
            depth,
            size,
            tiles: vec![tile; capacity],
        }
    }

    /// Depth the buffer was generated for.
    #[must_use]
    pub const fn depth(&self) -> i32 {
        self.depth
    }

    /// Horizontal dimensions of the buffer.
    #[must_use]
    pub const fn size(&self) -> IVec2 {
        self.size
    }

    /// Mutable access to a tile during generation.
    #[must_use]
    pub fn tile_mut(&mut self, pos: IVec2) -> Option<&mut Tile> {
        let index = self.index(pos)?;
        self.tiles.get_mut(index)
    }

    /// Read access used by generator tests.
    #[must_use]
    pub fn tile(&self, pos: IVec2) -> Option<Tile> {
        let index = self.index(pos)?;
        self.tiles.get(index).copied()
    }

    /// Consumes the buffer, yielding its parts for publication.
    #[must_use]
    pub fn into_parts(self) -> (i32, IVec2, Vec<Tile>) {
        (self.depth, self.size, self.tiles)
    }

    fn index(&self, pos: IVec2) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.x || pos.y >= self.size.y {
            return None;
        }
        Some(pos.y as usize * self.size.x as usize + pos.x as usize)
    }
}

/// Movement classification of a 3D grid point.
///
/// The wall layer at `z` decides between [`CellCategory::Wall`] and the
/// floor lookup at `z + 1`; a solid floor makes the point walkable while a
/// hollow one is a pit actors sink through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellCategory {
    /// One of the two required layers is outside the window or still pending.
    Unloaded,
    /// Neither the wall nor the floor tile is solid; actors fall here.
    Empty,
    /// The floor beneath is solid; actors can stand and drive here.
    Floor,
    /// The wall tile itself is solid; movement is blocked.
    Wall,
}

/// Generation-counted handle addressing an actor slot in the world arena.
///
/// A handle outlives the actor it names; lookups through a stale handle
/// simply miss, which is how "weak reference" semantics are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId {
    index: u32,
    generation: u32,
}

impl ActorId {
    /// Creates a handle from its raw slot index and generation counter.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Closed set of actor variants simulated by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// Player-controlled digging tank.
    Tank,
    /// Stationary home base that rearms tanks.
    Base,
    /// Hostile pursuer that tunnels or fortifies terrain.
    Enemy,
    /// Short-lived non-colliding particle or area action.
    Effect,
    /// Straight-line projectile that may carry a payload effect.
    Bullet,
}

/// Commands that express all permissible external mutations per frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Replaces a character's velocity with the provided value.
    SetVelocity {
        /// Actor whose velocity changes.
        actor: ActorId,
        /// New velocity expressed in world units per second.
        velocity: Vec2,
    },
    /// Points a character's body at the provided angle in radians.
    SetRotation {
        /// Actor whose rotation changes.
        actor: ActorId,
        /// New facing angle in radians.
        rotation: f32,
    },
    /// Aims a character's active weapon along the provided direction.
    SetShootDirection {
        /// Actor whose aim changes.
        actor: ActorId,
        /// Direction projectiles travel when fired.
        direction: Vec2,
    },
    /// Requests that the actor fire during the current tick.
    ///
    /// The request is level-triggered: it is cleared at the end of every
    /// tick and a sustained request fires once per reload window.
    TriggerShoot {
        /// Actor that should fire.
        actor: ActorId,
    },
    /// Selects which weapon slot resolves shoot requests.
    SetActiveWeapon {
        /// Actor whose weapon selection changes.
        actor: ActorId,
        /// Index into the actor's weapon list.
        slot: usize,
    },
    /// Drops fully loaded layers above the provided depth from the window.
    TrimLayersAbove {
        /// Smallest depth that must stay resident.
        min_depth: i32,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a generated layer became readable at its depth.
    LayerLoaded {
        /// Depth of the freshly published layer.
        depth: i32,
    },
    /// Announces that a loaded layer left the sliding window.
    LayerEvicted {
        /// Depth of the evicted layer.
        depth: i32,
    },
    /// Confirms that an actor joined the simulation.
    ActorSpawned {
        /// Handle assigned to the new actor.
        actor: ActorId,
        /// Variant of the new actor.
        kind: ActorKind,
    },
    /// Confirms that a dead actor left the registry and collision index.
    ActorDestroyed {
        /// Handle the actor was addressed by.
        actor: ActorId,
        /// Variant of the removed actor.
        kind: ActorKind,
    },
    /// Reports that breaking a tile credited a gatherer with resources.
    ResourceHarvested {
        /// Actor credited with the yield.
        gatherer: ActorId,
        /// Class of the tile that broke.
        class_id: TileClassId,
        /// Resource value transferred to the gatherer.
        value: i16,
    },
}

/// Converts a continuous world position to the grid cell containing it.
#[must_use]
pub fn cell_of(position: Vec3) -> IVec3 {
    IVec3::new(
        position.x.floor() as i32,
        position.y.floor() as i32,
        position.z.floor() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn catalog_empty_class_is_passable_and_worthless() {
        let empty = TileCatalog::class(TileClassId::EMPTY);
        assert!(!empty.is_solid());
        assert_eq!(empty.initial_strength(), 0);
        assert_eq!(empty.resource_value(), 0);
    }

    #[test]
    fn catalog_ore_ids_cover_the_seeding_range() {
        let ids: Vec<u8> = TileCatalog::ore_ids().map(|id| id.get()).collect();
        assert_eq!(ids, vec![3, 4, 5, 6, 7, 8, 9, 10]);
        for id in TileCatalog::ore_ids() {
            assert!(TileCatalog::class(id).is_solid());
            assert!(TileCatalog::class(id).resource_value() > 0);
        }
    }

    #[test]
    fn unknown_class_resolves_to_empty() {
        let class = TileCatalog::class(TileClassId::new(200));
        assert_eq!(class.name(), "empty");
        assert!(!class.is_solid());
    }

    #[test]
    fn tile_of_seeds_strength_from_class() {
        let rock = Tile::of(TileClassId::ROCK);
        assert_eq!(rock.strength(), 20);
        assert!(rock.is_solid());
        assert_eq!(Tile::EMPTY.strength(), 0);
        assert!(!Tile::EMPTY.is_solid());
    }

    #[test]
    fn weaken_floors_at_zero_and_yields_once() {
        let mut tile = Tile::of(TileClassId::new(3));
        assert_eq!(tile.weaken(2), None);
        assert_eq!(tile.strength(), 1);
        assert_eq!(tile.weaken(5), Some(1));
        assert_eq!(tile.strength(), 0);
        assert_eq!(tile.weaken(5), None);
    }

    #[test]
    fn layer_buffer_indexes_row_major() {
        let size = IVec2::new(3, 2);
        let mut buffer = LayerBuffer::filled(4, size, Tile::EMPTY);
        *buffer.tile_mut(IVec2::new(2, 1)).expect("in bounds") = Tile::of(TileClassId::ROCK);

        let (depth, reported, tiles) = buffer.clone().into_parts();
        assert_eq!(depth, 4);
        assert_eq!(reported, size);
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[5], Tile::of(TileClassId::ROCK));
        assert!(buffer.tile(IVec2::new(3, 0)).is_none());
    }

    #[test]
    fn cell_of_floors_negative_coordinates() {
        let cell = cell_of(Vec3::new(-0.25, 1.75, 2.0));
        assert_eq!(cell, IVec3::new(-1, 1, 2));
    }

    #[test]
    fn tile_round_trips_through_bincode() {
        let tile = Tile::of(TileClassId::DIRT);
        let bytes = bincode::serialize(&tile).expect("serialize");
        let restored: Tile = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, tile);
    }
}
