#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic procedural terrain generation for Deep Tank.
//!
//! A [`WorldGenerator`] turns a depth into a fully populated [`LayerBuffer`]
//! using layered noise fields, either synchronously or through a
//! [`LayerPool`] of background workers. The pool exposes a request queue and
//! a completion queue; the simulation thread submits depths and drains
//! finished buffers without ever blocking, so the only cross-thread resource
//! is the immutable buffer travelling through the channel.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use glam::IVec2;
use noise::{MultiFractal, NoiseFn, Perlin, RidgedMulti};

use deep_tank_core::{LayerBuffer, Tile, TileCatalog, TileClassId};

const CONTINENT_SCALE: f64 = 0.1;
const DEPTH_SCALE: f64 = 1.2;
const ROCK_THRESHOLD: f64 = -0.3;
const DIRT_THRESHOLD: f64 = 0.4;
const ORE_CUTOFF: f64 = -0.98;
const ORE_FREQUENCY_STEP: f64 = 0.02;
const ORE_SEED_STRIDE: f64 = 1000.0;

/// Configuration parameters required to construct a generator.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorConfig {
    dimensions: IVec2,
    seed: u32,
}

impl GeneratorConfig {
    /// Creates a new configuration with fixed horizontal dimensions.
    #[must_use]
    pub const fn new(dimensions: IVec2, seed: u32) -> Self {
        Self { dimensions, seed }
    }

    /// Horizontal dimensions of every generated layer.
    #[must_use]
    pub const fn dimensions(&self) -> IVec2 {
        self.dimensions
    }

    /// Seed all noise fields derive from.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new(IVec2::new(256, 256), 0x5eed)
    }
}

/// Produces fully populated layers for requested depths.
///
/// All noise modules are per-instance state configured once at construction,
/// so concurrent generators never share hidden coupling. Generation is a
/// pure function of `(seed, dimensions, depth)`.
#[derive(Debug)]
pub struct WorldGenerator {
    dimensions: IVec2,
    continent: Perlin,
    ridges: RidgedMulti<Perlin>,
    detail: Perlin,
}

impl WorldGenerator {
    /// Creates a generator with its noise fields seeded from the config.
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            dimensions: config.dimensions(),
            continent: Perlin::new(config.seed()),
            ridges: RidgedMulti::new(config.seed().wrapping_add(1))
                .set_octaves(4)
                .set_frequency(0.2),
            detail: Perlin::new(config.seed().wrapping_add(2)),
        }
    }

    /// Horizontal dimensions of every layer this generator produces.
    #[must_use]
    pub const fn dimensions(&self) -> IVec2 {
        self.dimensions
    }

    /// Generates the complete tile buffer for the provided depth.
    #[must_use]
    pub fn generate_layer(&self, depth: i32) -> LayerBuffer {
        let mut buffer = LayerBuffer::filled(depth, self.dimensions, Tile::EMPTY);
        let layer_z = f64::from(depth) * DEPTH_SCALE;

        for y in 0..self.dimensions.y {
            for x in 0..self.dimensions.x {
                let pos = IVec2::new(x, y);
                if let Some(tile) = buffer.tile_mut(pos) {
                    *tile = self.terrain_tile(pos, layer_z);
                }
            }
        }

        buffer
    }

    /// Chooses the base terrain class, then runs the ore detail pass.
    ///
    /// Thresholds are strict `<` comparisons evaluated rock before dirt
    /// before empty; the ore loop stops at the first matching class.
    fn terrain_tile(&self, pos: IVec2, layer_z: f64) -> Tile {
        let sample = [
            f64::from(pos.x) * CONTINENT_SCALE,
            f64::from(pos.y) * CONTINENT_SCALE,
            layer_z,
        ];
        let value = self.continent.get(sample) + self.ridges.get(sample);

        let mut tile = Tile::EMPTY;
        if value < ROCK_THRESHOLD {
            tile = Tile::of(TileClassId::ROCK);
        } else if value < DIRT_THRESHOLD {
            tile = Tile::of(TileClassId::DIRT);
        }

        if tile.is_solid() {
            for ore in TileCatalog::ore_ids() {
                let frequency = f64::from(ore.get()) * ORE_FREQUENCY_STEP;
                let vein = self.detail.get([
                    f64::from(pos.x) * frequency,
                    f64::from(pos.y) * frequency,
                    layer_z + ORE_SEED_STRIDE * f64::from(ore.get()),
                ]);
                if vein < ORE_CUTOFF {
                    tile = Tile::of(ore);
                    break;
                }
            }
        }

        tile
    }
}

/// Background worker pool that generates layers off the simulation thread.
///
/// Requests and completions travel through unbounded channels; a request is
/// never cancelled, so a depth trimmed away while in flight simply produces
/// a buffer the world discards on arrival.
#[derive(Debug)]
pub struct LayerPool {
    requests: Option<Sender<i32>>,
    completions: Receiver<LayerBuffer>,
    workers: Vec<JoinHandle<()>>,
}

impl LayerPool {
    /// Spawns `workers` generation threads sharing the provided generator.
    #[must_use]
    pub fn spawn(generator: WorldGenerator, workers: usize) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<i32>();
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded::<LayerBuffer>();
        let generator = Arc::new(generator);

        let worker_count = workers.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let requests = request_rx.clone();
            let completions = completion_tx.clone();
            let generator = Arc::clone(&generator);
            let handle = thread::Builder::new()
                .name(format!("layer-gen-{index}"))
                .spawn(move || {
                    while let Ok(depth) = requests.recv() {
                        let buffer = generator.generate_layer(depth);
                        if completions.send(buffer).is_err() {
                            break;
                        }
                    }
                })
                .expect("layer generation worker failed to spawn");
            handles.push(handle);
        }
        tracing::debug!(workers = worker_count, "layer pool started");

        Self {
            requests: Some(request_tx),
            completions: completion_rx,
            workers: handles,
        }
    }

    /// Queues generation of the provided depth.
    pub fn request(&self, depth: i32) {
        tracing::trace!(depth, "layer generation requested");
        if let Some(requests) = &self.requests {
            let _ = requests.send(depth);
        }
    }

    /// Drains every finished buffer without blocking.
    #[must_use]
    pub fn try_drain(&self) -> Vec<LayerBuffer> {
        let mut drained = Vec::new();
        loop {
            match self.completions.try_recv() {
                Ok(buffer) => drained.push(buffer),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

impl Drop for LayerPool {
    fn drop(&mut self) {
        // Closing the request channel lets the workers run off the end.
        self.requests = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
