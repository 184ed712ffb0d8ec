#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Deep Tank simulation.
//!
//! Boots a generator-backed world, spawns a base, a tank and one pursuer,
//! then drives a fixed-timestep loop while tallying the event stream. Useful
//! for soak-testing the simulation without any rendering attached.

use std::time::Duration;

use anyhow::ensure;
use clap::Parser;
use glam::{IVec2, Vec2, Vec3};
use tracing_subscriber::EnvFilter;

use deep_tank_core::{Command, Event};
use deep_tank_generation::{GeneratorConfig, LayerPool, WorldGenerator};
use deep_tank_world::{
    apply, query, ActorSpec, BaseSpec, EnemySpec, ProjectileRecipe, TankSpec, WeaponSpec, World,
    WorldConfig,
};

const TICK: Duration = Duration::from_millis(16);

/// Headless Deep Tank simulation runner.
#[derive(Debug, Parser)]
#[command(name = "deep-tank")]
struct Args {
    /// Number of fixed 16 ms ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Terrain seed shared by every noise field.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u32,
    /// Layer width in tiles.
    #[arg(long, default_value_t = 128)]
    width: i32,
    /// Layer height in tiles.
    #[arg(long, default_value_t = 128)]
    height: i32,
    /// Background generation worker threads.
    #[arg(long, default_value_t = 2)]
    workers: usize,
    /// Number of layers kept resident in the sliding window.
    #[arg(long, default_value_t = 16)]
    layers: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    ensure!(args.width > 0 && args.height > 0, "layer dimensions must be positive");
    ensure!(args.layers > 0, "the layer window cannot be empty");

    let generator = WorldGenerator::new(GeneratorConfig::new(
        IVec2::new(args.width, args.height),
        args.seed,
    ));
    let pool = LayerPool::spawn(generator, args.workers);
    let mut world = World::with_generator(WorldConfig::new(0, args.layers), pool);
    let mut events = Vec::new();

    let center = Vec3::new(args.width as f32 / 2.0, args.height as f32 / 2.0, 0.0);
    let base = world.add_actor(
        ActorSpec::Base(BaseSpec {
            position: center,
            size: 4.0,
            hp: 500.0,
        }),
        &mut events,
    );
    let tank = world.add_actor(
        ActorSpec::Tank(TankSpec {
            position: center + Vec3::new(2.0, 0.0, 0.0),
            size: 1.5,
            hp: 100.0,
            max_speed: 6.0,
            weapons: vec![
                WeaponSpec {
                    recipe: ProjectileRecipe::CannonShot {
                        speed: 24.0,
                        lifetime: 2.0,
                        blast_radius: 3,
                        blast_force: 10,
                        blast_damage: 25.0,
                    },
                    reload_time: 0.75,
                    ammunition: 40,
                },
                WeaponSpec {
                    recipe: ProjectileRecipe::DrillPulse {
                        range: 2.0,
                        radius: 1,
                        force: 5,
                    },
                    reload_time: 0.2,
                    ammunition: 200,
                },
            ],
        }),
        &mut events,
    );
    let _pursuer = world.add_actor(
        ActorSpec::Enemy(EnemySpec {
            position: center + Vec3::new(20.0, 20.0, 0.0),
            size: 1.2,
            hp: 60.0,
            max_speed: 4.0,
            near_damage: 8.0,
            building_range: 0,
            chase_target: Some(tank),
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
    apply(
        &mut world,
        Command::SetVelocity {
            actor: tank,
            velocity: Vec2::new(3.0, 0.0),
        },
        &mut events,
    );

    let mut tally = EventTally::default();
    for tick in 0..args.ticks {
        if tick % 30 == 0 {
            apply(&mut world, Command::TriggerShoot { actor: tank }, &mut events);
        }
        apply(&mut world, Command::Tick { dt: TICK }, &mut events);
        tally.absorb(events.drain(..));
    }

    println!(
        "simulated {} ticks ({} loaded / {} pending layers)",
        query::frame_stamp(&world),
        query::loaded_layer_count(&world),
        query::pending_layer_count(&world),
    );
    println!(
        "layers loaded {} evicted {}, actors spawned {} destroyed {}, harvested value {}",
        tally.layers_loaded,
        tally.layers_evicted,
        tally.actors_spawned,
        tally.actors_destroyed,
        tally.harvested_value,
    );
    if let Some(inventory) = query::inventory(&world, tank) {
        println!(
            "tank: hp {:?}, minerals {}, fuel {}",
            query::hp(&world, tank),
            inventory.minerals,
            inventory.fuel,
        );
    } else {
        println!("tank was destroyed");
    }
    println!("base hp {:?}", query::hp(&world, base));

    Ok(())
}

/// Running totals extracted from the per-tick event stream.
#[derive(Debug, Default)]
struct EventTally {
    layers_loaded: u32,
    layers_evicted: u32,
    actors_spawned: u32,
    actors_destroyed: u32,
    harvested_value: i64,
}

impl EventTally {
    fn absorb(&mut self, events: impl Iterator<Item = Event>) {
        for event in events {
            match event {
                Event::LayerLoaded { .. } => self.layers_loaded += 1,
                Event::LayerEvicted { .. } => self.layers_evicted += 1,
                Event::ActorSpawned { .. } => self.actors_spawned += 1,
                Event::ActorDestroyed { .. } => self.actors_destroyed += 1,
                Event::ResourceHarvested { value, .. } => {
                    self.harvested_value += i64::from(value);
                }
                Event::TimeAdvanced { .. } => {}
            }
        }
    }
}
