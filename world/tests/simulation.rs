//! End-to-end scenarios driving the world through commands and events.

use std::thread;
use std::time::{Duration, Instant};

use glam::{IVec2, IVec3, Vec2, Vec3};

use deep_tank_core::{ActorId, ActorKind, CellCategory, Command, Event, LayerBuffer, Tile, TileClassId};
use deep_tank_generation::{GeneratorConfig, LayerPool, WorldGenerator};
use deep_tank_world::{
    apply, query, ActorSpec, BaseSpec, EnemySpec, ProjectileRecipe, TankSpec, WeaponSpec, World,
    WorldConfig,
};

const SIDE: i32 = 32;

fn buffer(depth: i32, tile: Tile) -> LayerBuffer {
    LayerBuffer::filled(depth, IVec2::splat(SIDE), tile)
}

/// A walkable field: hollow wall layer at depth 0 over solid dirt at depth 1.
fn playfield() -> (World, Vec<Event>) {
    let mut world = World::new(WorldConfig::default());
    let mut events = Vec::new();
    world
        .publish_layer(buffer(0, Tile::EMPTY), &mut events)
        .expect("publish");
    world
        .publish_layer(buffer(1, Tile::of(TileClassId::DIRT)), &mut events)
        .expect("publish");
    events.clear();
    (world, events)
}

fn tick(world: &mut World, seconds: f32, events: &mut Vec<Event>) {
    apply(
        world,
        Command::Tick {
            dt: Duration::from_secs_f32(seconds),
        },
        events,
    );
}

fn position_of(world: &World, id: ActorId) -> Vec3 {
    query::actor_view(world)
        .into_iter()
        .find(|snapshot| snapshot.id == id)
        .expect("actor is alive")
        .position
}

fn plain_tank(position: Vec3) -> ActorSpec {
    ActorSpec::Tank(TankSpec {
        position,
        size: 0.5,
        hp: 100.0,
        max_speed: 10.0,
        weapons: Vec::new(),
    })
}

fn drill_weapon(reload_time: f32, ammunition: u32) -> WeaponSpec {
    WeaponSpec {
        recipe: ProjectileRecipe::DrillPulse {
            range: 4.0,
            radius: 1,
            force: 10,
        },
        reload_time,
        ammunition,
    }
}

#[test]
fn tank_drives_on_floor_and_stops_at_rock() {
    let (mut world, mut events) = playfield();
    for y in 0..SIDE {
        world
            .set_tile(IVec3::new(12, y, 0), Tile::of(TileClassId::ROCK))
            .expect("in bounds");
    }
    let tank = world.add_actor(plain_tank(Vec3::new(4.5, 4.5, 0.0)), &mut events);
    apply(
        &mut world,
        Command::SetVelocity {
            actor: tank,
            velocity: Vec2::new(2.0, 0.0),
        },
        &mut events,
    );

    tick(&mut world, 1.0, &mut events);
    assert_eq!(position_of(&world, tank).x, 6.5);

    for _ in 0..6 {
        tick(&mut world, 1.0, &mut events);
    }
    // 10.5 + 2.0 lands in the rock column at x = 12, so the tank parks.
    assert_eq!(position_of(&world, tank).x, 10.5);
    assert_eq!(position_of(&world, tank).y, 4.5);
}

#[test]
fn tank_sinks_through_a_pit_until_it_finds_floor() {
    let mut world = World::new(WorldConfig::default());
    let mut events = Vec::new();
    world
        .publish_layer(buffer(0, Tile::EMPTY), &mut events)
        .expect("publish");
    world
        .publish_layer(buffer(1, Tile::EMPTY), &mut events)
        .expect("publish");
    world
        .publish_layer(buffer(2, Tile::of(TileClassId::DIRT)), &mut events)
        .expect("publish");

    let tank = world.add_actor(plain_tank(Vec3::new(4.5, 4.5, 0.0)), &mut events);

    tick(&mut world, 0.5, &mut events);
    assert_eq!(position_of(&world, tank).z, 0.5);
    tick(&mut world, 0.5, &mut events);
    assert_eq!(position_of(&world, tank).z, 1.0);

    // Depth 1 has a solid floor beneath it, so the descent ends.
    tick(&mut world, 0.5, &mut events);
    assert_eq!(position_of(&world, tank).z, 1.0);
}

#[test]
fn spawning_on_an_absent_layer_defers_the_clearing_carve() {
    let mut world = World::new(WorldConfig::default());
    let mut events = Vec::new();
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(16.5, 16.5, 0.0),
            size: 1.0,
            hp: 100.0,
            max_speed: 5.0,
            weapons: Vec::new(),
        }),
        &mut events,
    );
    assert_eq!(
        query::categorize(&world, IVec3::new(16, 16, 0)),
        CellCategory::Unloaded
    );

    world
        .publish_layer(buffer(0, Tile::of(TileClassId::DIRT)), &mut events)
        .expect("publish");
    world
        .publish_layer(buffer(1, Tile::of(TileClassId::DIRT)), &mut events)
        .expect("publish");

    // The deferred ready hook carved a size * 4 clearing around the spawn.
    assert_eq!(
        query::tile_at(&world, IVec3::new(16, 16, 0)),
        Some(Tile::EMPTY)
    );
    assert_eq!(
        query::categorize(&world, IVec3::new(16, 16, 0)),
        CellCategory::Floor
    );
    assert!(query::tile_at(&world, IVec3::new(28, 16, 0)).is_some_and(|tile| tile.is_solid()));
    assert_eq!(position_of(&world, tank).z, 0.0);
}

#[test]
fn sustained_trigger_fires_once_per_reload_window() {
    let (mut world, mut events) = playfield();
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 0.5,
            hp: 100.0,
            max_speed: 10.0,
            weapons: vec![drill_weapon(0.5, 2)],
        }),
        &mut events,
    );
    apply(
        &mut world,
        Command::SetShootDirection {
            actor: tank,
            direction: Vec2::X,
        },
        &mut events,
    );

    let mut shots = 0;
    for _ in 0..4 {
        events.clear();
        apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);
        tick(&mut world, 0.2, &mut events);
        shots += events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    Event::ActorSpawned {
                        kind: ActorKind::Effect,
                        ..
                    }
                )
            })
            .count();
    }
    // Ticks at 0.2 s against a 0.5 s reload: shots land on ticks 1 and 4.
    assert_eq!(shots, 2);
    assert_eq!(query::ammunition(&world, tank), Some(vec![0]));

    // Empty magazine: the request is honored but nothing spawns.
    events.clear();
    apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);
    tick(&mut world, 1.0, &mut events);
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::ActorSpawned { .. })));
}

#[test]
fn drill_pulse_harvests_ore_into_the_inventory() {
    let (mut world, mut events) = playfield();
    world
        .set_tile(IVec3::new(8, 4, 0), Tile::of(TileClassId::FIRST_ORE))
        .expect("in bounds");
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 0.5,
            hp: 100.0,
            max_speed: 10.0,
            weapons: vec![drill_weapon(0.5, 10)],
        }),
        &mut events,
    );
    apply(
        &mut world,
        Command::SetShootDirection {
            actor: tank,
            direction: Vec2::X,
        },
        &mut events,
    );

    events.clear();
    apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);
    tick(&mut world, 0.1, &mut events);

    assert_eq!(query::tile_at(&world, IVec3::new(8, 4, 0)), Some(Tile::EMPTY));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ResourceHarvested {
            gatherer,
            class_id,
            value: 1,
        } if *gatherer == tank && *class_id == TileClassId::FIRST_ORE
    )));
    let inventory = query::inventory(&world, tank).expect("tank is alive");
    assert_eq!(inventory.minerals, 1);
    assert_eq!(inventory.fuel, 0);
}

#[test]
fn base_overlap_refills_spent_ammunition() {
    let (mut world, mut events) = playfield();
    let _base = world.add_actor(
        ActorSpec::Base(BaseSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 3.0,
            hp: 500.0,
        }),
        &mut events,
    );
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(5.5, 4.5, 0.0),
            size: 0.5,
            hp: 100.0,
            max_speed: 10.0,
            weapons: vec![drill_weapon(0.5, 2)],
        }),
        &mut events,
    );

    apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);
    tick(&mut world, 0.05, &mut events);
    // The shot spends a round before the next tick's base overlap rearms it.
    tick(&mut world, 0.05, &mut events);
    assert_eq!(query::ammunition(&world, tank), Some(vec![2]));
}

#[test]
fn enemy_chases_and_wears_down_the_tank() {
    let (mut world, mut events) = playfield();
    let tank = world.add_actor(plain_tank(Vec3::new(4.5, 4.5, 0.0)), &mut events);
    let enemy = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: Vec3::new(10.5, 4.5, 0.0),
            size: 1.0,
            hp: 50.0,
            max_speed: 2.0,
            near_damage: 8.0,
            building_range: 0,
            chase_target: Some(tank),
        }),
        &mut events,
    );

    let start = position_of(&world, enemy);
    for _ in 0..10 {
        tick(&mut world, 0.5, &mut events);
    }
    let end = position_of(&world, enemy);
    assert!(end.x < start.x, "enemy should close on the tank");
    assert!((end - position_of(&world, tank)).truncate().length() <= 1.5);
    let hp = query::hp(&world, tank).expect("tank survives the window");
    assert!(hp < 100.0, "overlap should have dealt contact damage");
}

#[test]
fn a_dead_chase_target_leaves_the_enemy_idle() {
    let (mut world, mut events) = playfield();
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 0.5,
            hp: 1.0,
            max_speed: 10.0,
            weapons: Vec::new(),
        }),
        &mut events,
    );
    // Spawned already on top of its victim, so steering never engages.
    let enemy = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 1.0,
            hp: 50.0,
            max_speed: 2.0,
            near_damage: 100.0,
            building_range: 0,
            chase_target: Some(tank),
        }),
        &mut events,
    );

    tick(&mut world, 0.5, &mut events);
    assert!(
        query::hp(&world, tank).is_none(),
        "contact damage should have destroyed the tank"
    );
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ActorDestroyed {
            actor,
            kind: ActorKind::Tank,
        } if *actor == tank
    )));

    let parked = position_of(&world, enemy);
    for _ in 0..4 {
        tick(&mut world, 0.5, &mut events);
    }
    assert_eq!(position_of(&world, enemy), parked);
}

#[test]
fn tunneler_moves_a_wall_tile_to_the_layer_beneath() {
    let (mut world, mut events) = playfield();
    world
        .set_tile(IVec3::new(9, 4, 0), Tile::of(TileClassId::ROCK))
        .expect("in bounds");
    let _enemy = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: Vec3::new(8.5, 4.5, 0.0),
            size: 1.0,
            hp: 50.0,
            max_speed: 0.0,
            near_damage: 0.0,
            building_range: 0,
            chase_target: None,
        }),
        &mut events,
    );

    tick(&mut world, 0.1, &mut events);

    assert_eq!(query::tile_at(&world, IVec3::new(9, 4, 0)), Some(Tile::EMPTY));
    assert_eq!(
        query::tile_at(&world, IVec3::new(9, 4, 1)).map(|t| t.class_id()),
        Some(TileClassId::ROCK)
    );
}

#[test]
fn builder_fortifies_a_pit_ahead_of_it() {
    let (mut world, mut events) = playfield();
    world
        .set_tile(IVec3::new(9, 4, 1), Tile::EMPTY)
        .expect("in bounds");
    assert_eq!(
        query::categorize(&world, IVec3::new(9, 4, 0)),
        CellCategory::Empty
    );
    let _enemy = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: Vec3::new(8.5, 4.5, 0.0),
            size: 1.0,
            hp: 50.0,
            max_speed: 0.0,
            near_damage: 0.0,
            building_range: 2,
            chase_target: None,
        }),
        &mut events,
    );

    tick(&mut world, 0.1, &mut events);

    assert_eq!(
        query::tile_at(&world, IVec3::new(9, 4, 0)).map(|t| t.class_id()),
        Some(TileClassId::ROCK)
    );
    assert_eq!(
        query::tile_at(&world, IVec3::new(9, 4, 1)).map(|t| t.class_id()),
        Some(TileClassId::ROCK)
    );
}

#[test]
fn cannon_shell_detonates_against_a_wall() {
    let (mut world, mut events) = playfield();
    for y in 0..SIDE {
        world
            .set_tile(IVec3::new(10, y, 0), Tile::of(TileClassId::ROCK))
            .expect("in bounds");
    }
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 0.5,
            hp: 100.0,
            max_speed: 10.0,
            weapons: vec![WeaponSpec {
                recipe: ProjectileRecipe::CannonShot {
                    speed: 10.0,
                    lifetime: 5.0,
                    blast_radius: 2,
                    blast_force: 20,
                    blast_damage: 0.0,
                },
                reload_time: 1.0,
                ammunition: 5,
            }],
        }),
        &mut events,
    );
    apply(
        &mut world,
        Command::SetShootDirection {
            actor: tank,
            direction: Vec2::X,
        },
        &mut events,
    );
    apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);

    events.clear();
    for _ in 0..4 {
        tick(&mut world, 0.2, &mut events);
    }

    // Impact at x = 10.5 broke the rock and retired the shell.
    assert_eq!(
        query::tile_at(&world, IVec3::new(10, 4, 0)),
        Some(Tile::EMPTY)
    );
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ActorDestroyed {
            kind: ActorKind::Bullet,
            ..
        }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ActorSpawned {
            kind: ActorKind::Effect,
            ..
        }
    )));
}

#[test]
fn cannon_shell_detonates_against_an_enemy() {
    let (mut world, mut events) = playfield();
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: Vec3::new(4.5, 4.5, 0.0),
            size: 0.5,
            hp: 100.0,
            max_speed: 10.0,
            weapons: vec![WeaponSpec {
                recipe: ProjectileRecipe::CannonShot {
                    speed: 10.0,
                    lifetime: 5.0,
                    blast_radius: 1,
                    blast_force: 5,
                    blast_damage: 25.0,
                },
                reload_time: 1.0,
                ammunition: 5,
            }],
        }),
        &mut events,
    );
    let enemy = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: Vec3::new(8.5, 4.5, 0.0),
            size: 1.0,
            hp: 20.0,
            max_speed: 0.0,
            near_damage: 0.0,
            building_range: 0,
            chase_target: None,
        }),
        &mut events,
    );
    apply(
        &mut world,
        Command::SetShootDirection {
            actor: tank,
            direction: Vec2::X,
        },
        &mut events,
    );
    apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);

    events.clear();
    for _ in 0..3 {
        tick(&mut world, 0.2, &mut events);
    }

    assert!(events.iter().any(|event| matches!(
        event,
        Event::ActorDestroyed {
            actor,
            kind: ActorKind::Enemy,
        } if *actor == enemy
    )));
    assert!(!query::collideable_actors(&world).contains(&enemy));
}

#[test]
fn generator_pool_fills_the_sliding_window() {
    let generator = WorldGenerator::new(GeneratorConfig::new(IVec2::splat(16), 42));
    let pool = LayerPool::spawn(generator, 2);
    let mut world = World::with_generator(WorldConfig::new(0, 4), pool);
    let mut events = Vec::new();

    let deadline = Instant::now() + Duration::from_secs(10);
    while query::loaded_layer_count(&world) < 4 {
        assert!(Instant::now() < deadline, "window never filled");
        world.update(Duration::from_millis(16), &mut events);
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(query::pending_layer_count(&world), 0);
    let loaded: Vec<i32> = events
        .iter()
        .filter_map(|event| match event {
            Event::LayerLoaded { depth } => Some(*depth),
            _ => None,
        })
        .collect();
    for depth in 0..4 {
        assert!(loaded.contains(&depth), "depth {depth} never announced");
    }
}

#[test]
fn trimming_advances_the_window_and_announces_evictions() {
    let (mut world, mut events) = playfield();
    events.clear();
    apply(
        &mut world,
        Command::TrimLayersAbove { min_depth: 1 },
        &mut events,
    );

    assert_eq!(events, vec![Event::LayerEvicted { depth: 0 }]);
    assert_eq!(query::first_layer_depth(&world), 1);
    assert!(query::layer(&world, 0).is_none());
    assert!(query::layer(&world, 1).is_some());
}
