//! Cross-thread behavior of the background generation pool.

use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use glam::IVec2;

use deep_tank_generation::{GeneratorConfig, LayerPool, WorldGenerator};

#[test]
fn pool_answers_every_request_with_a_matching_buffer() {
    let config = GeneratorConfig::new(IVec2::splat(16), 99);
    let pool = LayerPool::spawn(WorldGenerator::new(config), 2);

    let wanted: BTreeSet<i32> = (0..6).collect();
    for depth in &wanted {
        pool.request(*depth);
    }

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.len() < wanted.len() {
        assert!(Instant::now() < deadline, "pool never answered");
        received.extend(pool.try_drain());
        thread::sleep(Duration::from_millis(5));
    }

    let depths: BTreeSet<i32> = received.iter().map(|buffer| buffer.depth()).collect();
    assert_eq!(depths, wanted);

    // Workers share one generator, so the answers match synchronous output.
    let reference = WorldGenerator::new(config);
    for buffer in &received {
        assert_eq!(buffer, &reference.generate_layer(buffer.depth()));
    }
}

#[test]
fn dropping_the_pool_joins_its_workers() {
    let pool = LayerPool::spawn(
        WorldGenerator::new(GeneratorConfig::new(IVec2::splat(8), 1)),
        3,
    );
    pool.request(0);
    let _ = pool.try_drain();
    drop(pool);
}
