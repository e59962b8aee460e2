//! Tile and worker identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tile::geometry::{EXTENT, TILE_SIZE};

/// Tile coordinate plus the zoom level it is rendered at.
///
/// `overscaled_z` may exceed `z` when a tile is reused past its source's
/// maximum zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverscaledTileId {
    pub overscaled_z: u8,
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl OverscaledTileId {
    pub fn new(overscaled_z: u8, z: u8, x: u32, y: u32) -> Self {
        debug_assert!(overscaled_z >= z, "overscaled zoom below native zoom");
        Self {
            overscaled_z,
            z,
            x,
            y,
        }
    }

    /// Tile rendered at its native zoom.
    pub fn native(z: u8, x: u32, y: u32) -> Self {
        Self::new(z, z, x, y)
    }

    /// Factor by which the tile is magnified relative to its native zoom.
    ///
    /// An overscaled zoom below the native zoom counts as no overscale; a
    /// gap too wide for `u32` saturates.
    pub fn overscale_factor(&self) -> u32 {
        let shift = u32::from(self.overscaled_z.saturating_sub(self.z));
        1u32.checked_shl(shift).unwrap_or(u32::MAX)
    }

    /// Screen pixels per tile unit at the render zoom.
    pub fn pixels_per_unit(&self) -> f32 {
        TILE_SIZE * self.overscale_factor() as f32 / EXTENT
    }
}

impl fmt::Display for OverscaledTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}=>{}",
            self.z, self.x, self.y, self.overscaled_z
        )
    }
}

/// Opaque identity a worker uses when reserving shared resources.
///
/// Ids are never reused within a process, so reservations released on
/// teardown cannot collide with a later worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

impl WorkerId {
    pub fn next() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overscale_factor() {
        assert_eq!(OverscaledTileId::native(4, 1, 2).overscale_factor(), 1);
        assert_eq!(OverscaledTileId::new(6, 4, 1, 2).overscale_factor(), 4);
    }

    #[test]
    fn test_overscale_factor_out_of_range() {
        let below = OverscaledTileId {
            overscaled_z: 3,
            z: 5,
            x: 0,
            y: 0,
        };
        assert_eq!(below.overscale_factor(), 1);

        let far = OverscaledTileId {
            overscaled_z: 40,
            z: 0,
            x: 0,
            y: 0,
        };
        assert_eq!(far.overscale_factor(), u32::MAX);
        assert!(far.pixels_per_unit().is_finite());
    }

    #[test]
    fn test_pixels_per_unit() {
        assert_eq!(OverscaledTileId::native(4, 1, 2).pixels_per_unit(), 0.0625);
        assert_eq!(OverscaledTileId::new(5, 4, 1, 2).pixels_per_unit(), 0.125);
    }

    #[test]
    fn test_display() {
        let id = OverscaledTileId::new(15, 14, 8192, 5461);
        assert_eq!(id.to_string(), "14/8192/5461=>15");
    }

    #[test]
    fn test_worker_ids_are_unique() {
        let a = WorkerId::next();
        let b = WorkerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
