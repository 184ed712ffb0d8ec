//! Actor variants, their shared state blocks, and per-tick behavior.
//!
//! The deep inheritance chain of the original design is flattened into a
//! closed [`Actor`] enum: shared "character" behavior lives in
//! [`MovementState`] and [`ArsenalState`] composed into the variants that
//! need them, and interaction rules are resolved by tag comparison rather
//! than runtime type identification. Weapon factories and appear callbacks
//! are plain data ([`ProjectileRecipe`], [`AppearAction`]) interpreted by
//! the dispatcher below.

use glam::{Vec2, Vec3};

use deep_tank_core::{cell_of, ActorId, ActorKind, CellCategory, Event, Tile, TileClassId};

use crate::{layer::fill_round_area, World};

/// Reload timers at or below this epsilon count as ready to fire.
const RELOAD_EPSILON: f32 = 0.01;
/// Depth gained per second while standing over a pit.
const SINK_RATE: f32 = 1.0;
/// Distance ahead of an enemy's nose probed for terrain work.
const PROBE_DISTANCE: f32 = 1.0;
/// Lifetime of the flash effect left by a drill pulse.
const DRILL_PULSE_LIFETIME: f32 = 0.15;
/// Lifetime of the explosion effect carried by cannon shots.
const BLAST_LIFETIME: f32 = 0.4;

/// Resources carried by a tank, filled by harvesting broken tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Combined value of harvested mineral and ore tiles.
    pub minerals: i32,
    /// Value of harvested fuel tiles.
    pub fuel: i32,
}

/// Spawn recipe interpreted when a weapon fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProjectileRecipe {
    /// Straight-line shell that detonates on impact.
    CannonShot {
        /// Muzzle speed in world units per second.
        speed: f32,
        /// Seconds before an airborne shell expires on its own.
        lifetime: f32,
        /// Radius of the detonation's excavation disc.
        blast_radius: i32,
        /// Durability removed from every tile in the disc.
        blast_force: i16,
        /// Hit points removed from actors caught in the detonation.
        blast_damage: f32,
    },
    /// Short-range pulse that chews through tiles directly ahead.
    DrillPulse {
        /// Distance from the shooter at which the pulse lands.
        range: f32,
        /// Radius of the excavation disc.
        radius: i32,
        /// Durability removed from every tile in the disc.
        force: i16,
    },
}

/// Action run exactly once when an effect's owning layer is ready.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AppearAction {
    /// Purely visual effect.
    None,
    /// Area gameplay: harvest the surrounding disc and damage bystanders.
    Excavate {
        /// Radius of the harvested disc.
        radius: i32,
        /// Durability removed from every tile in the disc.
        force: i16,
        /// Hit points removed from overlapping collideable actors.
        damage: f32,
        /// Actor credited with the broken tiles' resource value.
        gatherer: Option<ActorId>,
    },
}

/// One weapon slot configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponSpec {
    /// Projectile produced when the weapon fires.
    pub recipe: ProjectileRecipe,
    /// Seconds between consecutive shots.
    pub reload_time: f32,
    /// Starting (and maximum) ammunition count.
    pub ammunition: u32,
}

/// Blueprint for a player tank.
#[derive(Clone, Debug, PartialEq)]
pub struct TankSpec {
    /// Spawn position; `z` selects the layer.
    pub position: Vec3,
    /// Collision radius and visual scale.
    pub size: f32,
    /// Starting hit points.
    pub hp: f32,
    /// Speed cap applied by steering code.
    pub max_speed: f32,
    /// Weapon loadout in slot order.
    pub weapons: Vec<WeaponSpec>,
}

/// Blueprint for a stationary base.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseSpec {
    /// Spawn position; `z` selects the layer.
    pub position: Vec3,
    /// Collision radius and clearing radius.
    pub size: f32,
    /// Starting hit points.
    pub hp: f32,
}

/// Blueprint for a hostile pursuer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySpec {
    /// Spawn position; `z` selects the layer.
    pub position: Vec3,
    /// Collision radius.
    pub size: f32,
    /// Starting hit points.
    pub hp: f32,
    /// Pursuit speed.
    pub max_speed: f32,
    /// Hit points per second dealt to overlapping tanks.
    pub near_damage: f32,
    /// Zero for tunnelers; a positive radius turns the enemy into a builder.
    pub building_range: i32,
    /// Character the enemy steers toward while the handle stays live.
    pub chase_target: Option<ActorId>,
}

/// Blueprint for a particle or area-action effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectSpec {
    /// Spawn position; `z` selects the layer.
    pub position: Vec3,
    /// Drift velocity.
    pub velocity: Vec2,
    /// Seconds until the effect expires.
    pub lifetime: f32,
    /// Visual spin in radians per second.
    pub angular_velocity: f32,
    /// Growth (or shrink) rate applied to the size each second.
    pub size_velocity: f32,
    /// Starting size; the effect also dies when this reaches zero.
    pub size: f32,
    /// Gameplay action run once when the owning layer is ready.
    pub on_appear: AppearAction,
}

/// Blueprint for a projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulletSpec {
    /// Spawn position; `z` selects the layer.
    pub position: Vec3,
    /// Flight velocity.
    pub velocity: Vec2,
    /// Seconds until the bullet expires without impact.
    pub lifetime: f32,
    /// Visual size of the projectile.
    pub size: f32,
    /// Shooter excluded from the bullet's overlap test.
    pub instigator: Option<ActorId>,
    /// Effect injected at the impact point when the bullet dies on contact.
    pub payload: Option<EffectSpec>,
}

/// Blueprint describing an actor to insert into the world.
#[derive(Clone, Debug, PartialEq)]
pub enum ActorSpec {
    /// Player-controlled digging tank.
    Tank(TankSpec),
    /// Stationary home base.
    Base(BaseSpec),
    /// Hostile pursuer.
    Enemy(EnemySpec),
    /// Particle or area action.
    Effect(EffectSpec),
    /// Straight-line projectile.
    Bullet(BulletSpec),
}

/// Shared mobile-character state block.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MovementState {
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec2,
    pub(crate) rotation: f32,
    pub(crate) size: f32,
    pub(crate) hp: f32,
    pub(crate) max_speed: f32,
}

impl MovementState {
    fn new(position: Vec3, size: f32, hp: f32, max_speed: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            size,
            hp,
            max_speed,
        }
    }
}

/// One loaded weapon slot.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Weapon {
    pub(crate) recipe: ProjectileRecipe,
    pub(crate) reload_time: f32,
    pub(crate) reload_timer: f32,
    pub(crate) ammunition: u32,
    pub(crate) full_ammunition: u32,
}

impl Weapon {
    fn from_spec(spec: WeaponSpec) -> Self {
        Self {
            recipe: spec.recipe,
            reload_time: spec.reload_time,
            reload_timer: 0.0,
            ammunition: spec.ammunition,
            full_ammunition: spec.ammunition,
        }
    }
}

/// Weapon slots plus the per-tick firing request.
#[derive(Clone, Debug)]
pub(crate) struct ArsenalState {
    pub(crate) weapons: Vec<Weapon>,
    pub(crate) active: usize,
    pub(crate) shoot_requested: bool,
    pub(crate) shoot_direction: Vec2,
}

impl ArsenalState {
    fn from_specs(specs: Vec<WeaponSpec>) -> Self {
        Self {
            weapons: specs.into_iter().map(Weapon::from_spec).collect(),
            active: 0,
            shoot_requested: false,
            shoot_direction: Vec2::ZERO,
        }
    }
}

/// Particle state shared by effects and bullets.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EffectState {
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec2,
    pub(crate) lifetime: f32,
    pub(crate) rotation: f32,
    pub(crate) angular_velocity: f32,
    pub(crate) size_velocity: f32,
    pub(crate) size: f32,
    pub(crate) on_appear: AppearAction,
}

impl EffectState {
    fn from_spec(spec: EffectSpec) -> Self {
        Self {
            position: spec.position,
            velocity: spec.velocity,
            lifetime: spec.lifetime,
            rotation: 0.0,
            angular_velocity: spec.angular_velocity,
            size_velocity: spec.size_velocity,
            size: spec.size,
            on_appear: spec.on_appear,
        }
    }
}

/// Closed set of simulated actor variants.
#[derive(Clone, Debug)]
pub(crate) enum Actor {
    Tank {
        movement: MovementState,
        arsenal: ArsenalState,
        inventory: Inventory,
    },
    Base {
        movement: MovementState,
    },
    Enemy {
        movement: MovementState,
        chase_target: Option<ActorId>,
        near_damage: f32,
        building_range: i32,
    },
    Effect(EffectState),
    Bullet {
        effect: EffectState,
        instigator: Option<ActorId>,
        payload: Option<EffectSpec>,
    },
}

impl Actor {
    pub(crate) fn kind(&self) -> ActorKind {
        match self {
            Self::Tank { .. } => ActorKind::Tank,
            Self::Base { .. } => ActorKind::Base,
            Self::Enemy { .. } => ActorKind::Enemy,
            Self::Effect(_) => ActorKind::Effect,
            Self::Bullet { .. } => ActorKind::Bullet,
        }
    }

    pub(crate) fn position(&self) -> Vec3 {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => movement.position,
            Self::Effect(effect) | Self::Bullet { effect, .. } => effect.position,
        }
    }

    pub(crate) fn size(&self) -> f32 {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => movement.size,
            Self::Effect(effect) | Self::Bullet { effect, .. } => effect.size,
        }
    }

    pub(crate) fn rotation(&self) -> f32 {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => movement.rotation,
            Self::Effect(effect) | Self::Bullet { effect, .. } => effect.rotation,
        }
    }

    pub(crate) fn hp(&self) -> Option<f32> {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => Some(movement.hp),
            Self::Effect(_) | Self::Bullet { .. } => None,
        }
    }

    pub(crate) fn lifetime(&self) -> Option<f32> {
        match self {
            Self::Effect(effect) | Self::Bullet { effect, .. } => Some(effect.lifetime),
            _ => None,
        }
    }

    pub(crate) fn inventory(&self) -> Option<Inventory> {
        match self {
            Self::Tank { inventory, .. } => Some(*inventory),
            _ => None,
        }
    }

    pub(crate) fn movement_mut(&mut self) -> Option<&mut MovementState> {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => Some(movement),
            _ => None,
        }
    }

    pub(crate) fn arsenal_mut(&mut self) -> Option<&mut ArsenalState> {
        match self {
            Self::Tank { arsenal, .. } => Some(arsenal),
            _ => None,
        }
    }

    pub(crate) fn ammunition(&self) -> Option<Vec<u32>> {
        match self {
            Self::Tank { arsenal, .. } => {
                Some(arsenal.weapons.iter().map(|weapon| weapon.ammunition).collect())
            }
            _ => None,
        }
    }

    /// Subclass liveness predicate; world presence is handled by the arena.
    pub(crate) fn is_alive(&self) -> bool {
        match self {
            Self::Tank { movement, .. }
            | Self::Base { movement }
            | Self::Enemy { movement, .. } => movement.hp > 0.0,
            Self::Effect(effect) | Self::Bullet { effect, .. } => {
                effect.lifetime > 0.0 && effect.size > 0.0
            }
        }
    }

    /// Whether the actor participates in point-query collision tests.
    pub(crate) fn is_collideable(&self) -> bool {
        matches!(
            self.kind(),
            ActorKind::Tank | ActorKind::Base | ActorKind::Enemy
        )
    }
}

/// Materializes a blueprint into live actor state.
pub(crate) fn instantiate(spec: ActorSpec) -> Actor {
    match spec {
        ActorSpec::Tank(spec) => Actor::Tank {
            movement: MovementState::new(spec.position, spec.size, spec.hp, spec.max_speed),
            arsenal: ArsenalState::from_specs(spec.weapons),
            inventory: Inventory::default(),
        },
        ActorSpec::Base(spec) => Actor::Base {
            movement: MovementState::new(spec.position, spec.size, spec.hp, 0.0),
        },
        ActorSpec::Enemy(spec) => Actor::Enemy {
            movement: MovementState::new(spec.position, spec.size, spec.hp, spec.max_speed),
            chase_target: spec.chase_target,
            near_damage: spec.near_damage,
            building_range: spec.building_range,
        },
        ActorSpec::Effect(spec) => Actor::Effect(EffectState::from_spec(spec)),
        ActorSpec::Bullet(spec) => Actor::Bullet {
            effect: EffectState {
                position: spec.position,
                velocity: spec.velocity,
                lifetime: spec.lifetime,
                rotation: 0.0,
                angular_velocity: 0.0,
                size_velocity: 0.0,
                size: spec.size,
                on_appear: AppearAction::None,
            },
            instigator: spec.instigator,
            payload: spec.payload,
        },
    }
}

/// Ready hook fired once the actor's layer is resident.
pub(crate) fn on_ready(actor: &mut Actor, id: ActorId, world: &mut World, out: &mut Vec<Event>) {
    match actor {
        Actor::Tank { movement, .. } => {
            carve_clearing(world, movement.position, movement.size * 4.0);
            tracing::debug!(actor = id.index(), "tank clearing carved");
        }
        Actor::Base { movement } => {
            carve_clearing(world, movement.position, movement.size);
            tracing::debug!(actor = id.index(), "base clearing carved");
        }
        Actor::Effect(effect) => apply_appear(world, effect, out),
        Actor::Enemy { .. } | Actor::Bullet { .. } => {}
    }
}

/// Destroy hook fired exactly once when the actor leaves the registry.
pub(crate) fn on_destroy(actor: &Actor, id: ActorId) {
    tracing::debug!(actor = id.index(), kind = ?actor.kind(), "actor destroyed");
}

/// Advances one actor by `dt` seconds.
pub(crate) fn update(
    actor: &mut Actor,
    id: ActorId,
    dt: f32,
    world: &mut World,
    out: &mut Vec<Event>,
) {
    match actor {
        Actor::Tank {
            movement,
            arsenal,
            ..
        } => {
            step_character(movement, dt, world);
            resolve_proximity(movement, arsenal, dt, world);
            if let Some(spec) = resolve_fire(arsenal, movement, id, dt) {
                let _ = world.add_actor(spec, out);
            }
        }
        Actor::Base { movement } => {
            // Nothing ever sets a base's velocity; the shared step keeps it
            // honest about pits opening underneath it.
            step_character(movement, dt, world);
        }
        Actor::Enemy {
            movement,
            chase_target,
            building_range,
            ..
        } => {
            steer_toward_target(movement, *chase_target, world);
            step_character(movement, dt, world);
            work_terrain(movement, *building_range, world);
        }
        Actor::Effect(effect) => integrate_effect(effect, dt),
        Actor::Bullet {
            effect,
            instigator,
            payload,
        } => {
            integrate_effect(effect, dt);
            resolve_impact(effect, *instigator, payload, world, out);
        }
    }
}

/// Shared character step: categorize, sink over pits, move or stop.
fn step_character(movement: &mut MovementState, dt: f32, world: &World) {
    match world.categorize(cell_of(movement.position)) {
        CellCategory::Unloaded => return,
        CellCategory::Empty => movement.position.z += SINK_RATE * dt,
        CellCategory::Floor | CellCategory::Wall => {}
    }

    let candidate = movement.position + (movement.velocity * dt).extend(0.0);
    if world.categorize(cell_of(candidate)) == CellCategory::Floor {
        movement.position = candidate;
    } else {
        movement.velocity = Vec2::ZERO;
    }
}

/// Fires the active weapon if requested and ready, then decays every reload
/// timer and clears the level-triggered request flag.
fn resolve_fire(
    arsenal: &mut ArsenalState,
    movement: &MovementState,
    owner: ActorId,
    dt: f32,
) -> Option<ActorSpec> {
    let mut spawned = None;
    if arsenal.shoot_requested {
        if let Some(weapon) = arsenal.weapons.get_mut(arsenal.active) {
            if weapon.reload_timer <= RELOAD_EPSILON && weapon.ammunition > 0 {
                spawned = Some(build_projectile(
                    weapon.recipe,
                    owner,
                    movement,
                    arsenal.shoot_direction,
                ));
                weapon.ammunition -= 1;
                weapon.reload_timer = weapon.reload_time;
            }
        }
    }

    for weapon in &mut arsenal.weapons {
        weapon.reload_timer = (weapon.reload_timer - dt).max(0.0);
    }
    arsenal.shoot_requested = false;

    spawned
}

/// Interprets a weapon recipe into a concrete spawn blueprint.
fn build_projectile(
    recipe: ProjectileRecipe,
    owner: ActorId,
    movement: &MovementState,
    direction: Vec2,
) -> ActorSpec {
    let aim = if direction.length_squared() > f32::EPSILON {
        direction.normalize()
    } else {
        Vec2::new(movement.rotation.cos(), movement.rotation.sin())
    };

    match recipe {
        ProjectileRecipe::CannonShot {
            speed,
            lifetime,
            blast_radius,
            blast_force,
            blast_damage,
        } => ActorSpec::Bullet(BulletSpec {
            position: movement.position,
            velocity: aim * speed,
            lifetime,
            size: 1.0,
            instigator: Some(owner),
            payload: Some(EffectSpec {
                position: movement.position,
                velocity: Vec2::ZERO,
                lifetime: BLAST_LIFETIME,
                angular_velocity: 0.0,
                size_velocity: 0.0,
                size: (blast_radius as f32 * 2.0).max(1.0),
                on_appear: AppearAction::Excavate {
                    radius: blast_radius,
                    force: blast_force,
                    damage: blast_damage,
                    gatherer: Some(owner),
                },
            }),
        }),
        ProjectileRecipe::DrillPulse {
            range,
            radius,
            force,
        } => ActorSpec::Effect(EffectSpec {
            position: movement.position + (aim * range).extend(0.0),
            velocity: Vec2::ZERO,
            lifetime: DRILL_PULSE_LIFETIME,
            angular_velocity: 0.0,
            size_velocity: 0.0,
            size: (radius as f32 * 2.0).max(1.0),
            on_appear: AppearAction::Excavate {
                radius,
                force,
                damage: 0.0,
                gatherer: Some(owner),
            },
        }),
    }
}

/// Tank proximity rules: rearm on a base, bleed near an enemy.
fn resolve_proximity(
    movement: &mut MovementState,
    arsenal: &mut ArsenalState,
    dt: f32,
    world: &World,
) {
    for other in world.query_point(movement.position) {
        match world.actor(other) {
            Some(Actor::Base { .. }) => {
                for weapon in &mut arsenal.weapons {
                    weapon.ammunition = weapon.full_ammunition;
                }
            }
            Some(Actor::Enemy { near_damage, .. }) => {
                movement.hp -= near_damage * dt;
            }
            _ => {}
        }
    }
}

/// Steers directly at a live chase target; a stale handle leaves the
/// previous steering untouched.
fn steer_toward_target(movement: &mut MovementState, target: Option<ActorId>, world: &World) {
    let Some(target) = target else {
        return;
    };
    let Some(actor) = world.actor(target) else {
        return;
    };
    if !actor.is_alive() {
        return;
    }

    let to_target = actor.position().truncate() - movement.position.truncate();
    if to_target.length_squared() <= f32::EPSILON {
        return;
    }
    let direction = to_target.normalize();
    movement.rotation = direction.y.atan2(direction.x);
    movement.velocity = direction * movement.max_speed;
}

/// Enemy terrain work at the cell one probe-length ahead of the nose.
fn work_terrain(movement: &MovementState, building_range: i32, world: &mut World) {
    let front = Vec2::new(movement.rotation.cos(), movement.rotation.sin());
    let probe = cell_of(movement.position + (front * PROBE_DISTANCE).extend(0.0));

    match world.categorize(probe) {
        CellCategory::Wall if building_range == 0 => world.tunnel(probe),
        CellCategory::Empty if building_range > 0 => {
            world.fortify(probe, building_range, Tile::of(TileClassId::ROCK));
        }
        _ => {}
    }
}

/// Particle integration shared by effects and bullets.
fn integrate_effect(effect: &mut EffectState, dt: f32) {
    effect.position += (effect.velocity * dt).extend(0.0);
    effect.size += effect.size_velocity * dt;
    effect.lifetime -= dt;
    effect.rotation += effect.angular_velocity * dt;
}

/// Bullet impact resolution: wall cells and collideable overlaps both end
/// the flight; a carried payload is injected at the impact point.
fn resolve_impact(
    effect: &mut EffectState,
    instigator: Option<ActorId>,
    payload: &mut Option<EffectSpec>,
    world: &mut World,
    out: &mut Vec<Event>,
) {
    let cell = cell_of(effect.position);
    let hit = world.categorize(cell) == CellCategory::Wall
        || world.overlaps_collideable(effect.position, instigator);
    if !hit {
        return;
    }

    effect.lifetime = 0.0;
    if let Some(mut spec) = payload.take() {
        spec.position = effect.position;
        let _ = world.add_actor(ActorSpec::Effect(spec), out);
    }
}

/// Runs an effect's appear action against the world.
pub(crate) fn apply_appear(world: &mut World, effect: &EffectState, out: &mut Vec<Event>) {
    let AppearAction::Excavate {
        radius,
        force,
        damage,
        gatherer,
    } = effect.on_appear
    else {
        return;
    };

    let cell = cell_of(effect.position);
    let yields = match world.layer_mut(cell.z) {
        Some(layer) => layer.excavate_round(cell.truncate(), radius, force),
        None => Vec::new(),
    };
    world.credit_harvest(gatherer, &yields, out);

    if damage > 0.0 {
        for victim in world.query_point(effect.position) {
            world.damage_actor(victim, damage);
        }
    }
}

fn carve_clearing(world: &mut World, position: Vec3, radius: f32) {
    let cell = cell_of(position);
    if let Some(layer) = world.layer_mut(cell.z) {
        fill_round_area(layer, cell.truncate(), radius.round() as i32, Tile::EMPTY);
    }
}
