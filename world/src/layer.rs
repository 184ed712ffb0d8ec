//! Tile storage for a single horizontal slice of the world.

use glam::IVec2;
use thiserror::Error;

use deep_tank_core::{LayerBuffer, Tile, TileClassId};

/// Programming-contract violations raised by layer mutation paths.
///
/// None of these are recoverable runtime conditions; they indicate misuse of
/// the world/generator contract and are expected to terminate the update
/// loop.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LayerError {
    /// A write was attempted against a layer that has no tile storage yet.
    #[error("attempted to mutate a layer that is not loaded")]
    NotLoaded,
    /// A write addressed a position outside the layer's fixed extent.
    #[error("tile position ({x}, {y}) is outside the layer bounds")]
    OutOfBounds {
        /// Column of the rejected write.
        x: i32,
        /// Row of the rejected write.
        y: i32,
    },
    /// A replacement buffer did not match the layer's dimensions.
    #[error("replacement buffer holds {actual} tiles, layer needs {expected}")]
    BufferSizeMismatch {
        /// Tile count implied by the layer dimensions.
        expected: usize,
        /// Tile count actually provided.
        actual: usize,
    },
}

/// One fully generated horizontal slice at a fixed depth.
///
/// Renderers watch [`LevelLayer::revision`] to decide whether their cached
/// buffers are stale; every mutating entry point bumps the counter exactly
/// once, no matter how many tiles it touched.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelLayer {
    depth: i32,
    size: IVec2,
    revision: u64,
    tiles: Vec<Tile>,
}

impl LevelLayer {
    /// Builds a live layer from a generator hand-off buffer.
    pub fn from_buffer(buffer: LayerBuffer) -> Result<Self, LayerError> {
        let (depth, size, tiles) = buffer.into_parts();
        let expected = (size.x.max(0) as usize) * (size.y.max(0) as usize);
        if tiles.len() != expected {
            return Err(LayerError::BufferSizeMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            depth,
            size,
            revision: 0,
            tiles,
        })
    }

    /// Depth identity of the layer; immutable after construction.
    #[must_use]
    pub const fn depth(&self) -> i32 {
        self.depth
    }

    /// Fixed horizontal extent of the layer.
    #[must_use]
    pub const fn size(&self) -> IVec2 {
        self.size
    }

    /// Counter incremented once per mutating visit.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Reads the tile at `pos`; out-of-bounds reads yield the empty sentinel.
    #[must_use]
    pub fn tile(&self, pos: IVec2) -> Tile {
        self.index(pos)
            .and_then(|index| self.tiles.get(index).copied())
            .unwrap_or(Tile::EMPTY)
    }

    /// Overwrites the tile at `pos`, bumping the revision.
    pub fn set_tile(&mut self, pos: IVec2, tile: Tile) -> Result<(), LayerError> {
        let index = self
            .index(pos)
            .ok_or(LayerError::OutOfBounds { x: pos.x, y: pos.y })?;
        self.tiles[index] = tile;
        self.revision += 1;
        Ok(())
    }

    /// Applies `visitor` to every tile in the clamped `[from, to)` rectangle.
    pub fn visit<F>(&self, from: IVec2, to: IVec2, mut visitor: F)
    where
        F: FnMut(IVec2, Tile),
    {
        let (from, to) = self.clamp_rect(from, to);
        for y in from.y..to.y {
            for x in from.x..to.x {
                let pos = IVec2::new(x, y);
                visitor(pos, self.tiles[self.index_unchecked(pos)]);
            }
        }
    }

    /// Applies `visitor` to the whole layer without touching the revision.
    pub fn visit_all<F>(&self, visitor: F)
    where
        F: FnMut(IVec2, Tile),
    {
        self.visit(IVec2::ZERO, self.size, visitor);
    }

    /// Mutating rectangle visit; increments the revision exactly once per
    /// call regardless of how many tiles the visitor changed.
    pub fn visit_mut<F>(&mut self, from: IVec2, to: IVec2, mut visitor: F)
    where
        F: FnMut(IVec2, &mut Tile),
    {
        let (from, to) = self.clamp_rect(from, to);
        for y in from.y..to.y {
            for x in from.x..to.x {
                let pos = IVec2::new(x, y);
                let index = self.index_unchecked(pos);
                visitor(pos, &mut self.tiles[index]);
            }
        }
        self.revision += 1;
    }

    /// Weakens the tile at `pos` by `force`.
    ///
    /// Depletion and class replacement are one step: when the hit breaks the
    /// tile it is swapped for the empty class before returning, and the
    /// broken class plus its resource value are reported exactly once.
    pub fn harvest(&mut self, pos: IVec2, force: i16) -> Option<(TileClassId, i16)> {
        let index = self.index(pos)?;
        let tile = &mut self.tiles[index];
        let class_id = tile.class_id();
        let yielded = tile.weaken(force);
        if yielded.is_some() {
            *tile = Tile::EMPTY;
        }
        self.revision += 1;
        yielded.map(|value| (class_id, value))
    }

    /// Round-area harvest used by explosions and drill pulses.
    ///
    /// Every tile with Euclidean distance ≤ `radius` from `center` is
    /// weakened by `force`; broken tiles become empty and their class/value
    /// pairs are returned in visit order.
    pub fn excavate_round(
        &mut self,
        center: IVec2,
        radius: i32,
        force: i16,
    ) -> Vec<(TileClassId, i16)> {
        let mut yields = Vec::new();
        let span = IVec2::splat(radius);
        self.visit_mut(center - span, center + span + IVec2::ONE, |pos, tile| {
            if !within_radius(center, pos, radius) {
                return;
            }
            let class_id = tile.class_id();
            if let Some(value) = tile.weaken(force) {
                *tile = Tile::EMPTY;
                yields.push((class_id, value));
            }
        });
        yields
    }

    fn clamp_rect(&self, from: IVec2, to: IVec2) -> (IVec2, IVec2) {
        (from.max(IVec2::ZERO), to.min(self.size))
    }

    fn index(&self, pos: IVec2) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.x || pos.y >= self.size.y {
            return None;
        }
        Some(self.index_unchecked(pos))
    }

    fn index_unchecked(&self, pos: IVec2) -> usize {
        pos.y as usize * self.size.x as usize + pos.x as usize
    }
}

/// Replaces every tile within `radius` of `center` with `fill`.
///
/// The iteration covers only the bounding box `center ± radius` intersected
/// with the layer bounds; membership is inclusive Euclidean distance.
pub fn fill_round_area(layer: &mut LevelLayer, center: IVec2, radius: i32, fill: Tile) {
    let span = IVec2::splat(radius);
    layer.visit_mut(center - span, center + span + IVec2::ONE, |pos, tile| {
        if within_radius(center, pos, radius) {
            *tile = fill;
        }
    });
}

fn within_radius(center: IVec2, pos: IVec2, radius: i32) -> bool {
    let delta = center - pos;
    i64::from(delta.x) * i64::from(delta.x) + i64::from(delta.y) * i64::from(delta.y)
        <= i64::from(radius) * i64::from(radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deep_tank_core::LayerBuffer;

    fn solid_layer(depth: i32, side: i32, class: TileClassId) -> LevelLayer {
        let buffer = LayerBuffer::filled(depth, IVec2::splat(side), Tile::of(class));
        LevelLayer::from_buffer(buffer).expect("well-formed buffer")
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let buffer = LayerBuffer::new(0, IVec2::new(4, 4), vec![Tile::EMPTY; 9]);
        assert_eq!(
            LevelLayer::from_buffer(buffer),
            Err(LayerError::BufferSizeMismatch {
                expected: 16,
                actual: 9,
            })
        );
    }

    #[test]
    fn out_of_bounds_read_returns_empty_sentinel() {
        let layer = solid_layer(0, 4, TileClassId::ROCK);
        assert_eq!(layer.tile(IVec2::new(-1, 2)), Tile::EMPTY);
        assert_eq!(layer.tile(IVec2::new(4, 0)), Tile::EMPTY);
    }

    #[test]
    fn out_of_bounds_write_is_a_contract_violation() {
        let mut layer = solid_layer(0, 4, TileClassId::ROCK);
        assert_eq!(
            layer.set_tile(IVec2::new(9, 0), Tile::EMPTY),
            Err(LayerError::OutOfBounds { x: 9, y: 0 })
        );
    }

    #[test]
    fn mutating_visit_bumps_revision_once_even_for_noop() {
        let mut layer = solid_layer(0, 8, TileClassId::DIRT);
        let before = layer.revision();
        layer.visit_mut(IVec2::ZERO, layer.size(), |_, _| {});
        assert_eq!(layer.revision(), before + 1);
    }

    #[test]
    fn read_only_visit_never_changes_revision() {
        let layer = solid_layer(0, 8, TileClassId::DIRT);
        let before = layer.revision();
        let mut count = 0;
        layer.visit_all(|_, _| count += 1);
        assert_eq!(count, 64);
        assert_eq!(layer.revision(), before);
    }

    #[test]
    fn visit_clamps_rectangle_to_bounds() {
        let layer = solid_layer(0, 4, TileClassId::DIRT);
        let mut visited = Vec::new();
        layer.visit(IVec2::new(-3, 2), IVec2::new(99, 99), |pos, _| {
            visited.push(pos);
        });
        assert_eq!(visited.len(), 8);
        assert!(visited.iter().all(|pos| pos.y >= 2 && pos.x < 4));
    }

    #[test]
    fn fill_round_area_matches_euclidean_disc() {
        let mut layer = solid_layer(0, 16, TileClassId::ROCK);
        let center = IVec2::new(8, 8);
        let radius = 3;
        fill_round_area(&mut layer, center, radius, Tile::EMPTY);

        layer.visit_all(|pos, tile| {
            let delta = center - pos;
            let inside = delta.x * delta.x + delta.y * delta.y <= radius * radius;
            if inside {
                assert_eq!(tile, Tile::EMPTY, "tile at {pos} should be cleared");
            } else {
                assert_eq!(
                    tile.class_id(),
                    TileClassId::ROCK,
                    "tile at {pos} should be untouched"
                );
            }
        });
    }

    #[test]
    fn harvest_depletes_then_replaces_exactly_once() {
        let mut layer = solid_layer(0, 4, TileClassId::ROCK);
        let pos = IVec2::new(1, 1);

        for _ in 0..3 {
            assert_eq!(layer.harvest(pos, 5), None);
        }
        assert_eq!(layer.tile(pos).strength(), 5);
        assert_eq!(layer.harvest(pos, 5), Some((TileClassId::ROCK, 0)));
        assert_eq!(layer.tile(pos), Tile::EMPTY);
        assert_eq!(layer.harvest(pos, 5), None);
    }

    #[test]
    fn excavate_round_reports_broken_classes() {
        let mut layer = solid_layer(0, 8, TileClassId::new(3));
        let yields = layer.excavate_round(IVec2::new(4, 4), 1, 10);
        assert_eq!(yields.len(), 5);
        assert!(yields
            .iter()
            .all(|(class, value)| *class == TileClassId::new(3) && *value == 1));
        assert_eq!(layer.tile(IVec2::new(4, 4)), Tile::EMPTY);
        assert_eq!(layer.tile(IVec2::new(6, 6)).class_id(), TileClassId::new(3));
    }
}
