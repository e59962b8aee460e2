//! Collision tile: greedy screen-space reservation for symbol placement.
//!
//! Built fresh for every placement pass. Boxes are claimed in call order;
//! the first claim wins and later overlapping symbols are hidden.

use glam::{Mat2, Vec2};
use rstar::{RTree, RTreeObject, AABB};

use crate::config::PlacementConfig;

/// Identifies the feature a collision box was placed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub bucket_name: String,
    pub source_layer: String,
    pub feature_index: usize,
}

/// A claimed box in collision space.
#[derive(Debug, Clone)]
pub struct CollisionBox {
    /// Bounding box [x0, y0, x1, y1].
    pub bounds: [f32; 4],
    pub symbol: SymbolRef,
}

impl RTreeObject for CollisionBox {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds[0], self.bounds[1]],
            [self.bounds[2], self.bounds[3]],
        )
    }
}

/// A box tested during a debug placement pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugBox {
    pub bounds: [f32; 4],
    pub placed: bool,
}

/// Spatial reservation structure for one placement pass.
#[derive(Debug)]
pub struct CollisionTile {
    config: PlacementConfig,
    rotation: Mat2,
    y_scale: f32,
    tree: RTree<CollisionBox>,
    ignored: Vec<CollisionBox>,
    debug_boxes: Vec<DebugBox>,
}

impl CollisionTile {
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            rotation: Mat2::from_angle(-config.angle),
            // Pitch foreshortens distances along the view direction.
            y_scale: config.pitch.cos(),
            config,
            tree: RTree::new(),
            ignored: Vec::new(),
            debug_boxes: Vec::new(),
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Map a tile-pixel position into collision space.
    pub fn project(&self, point: Vec2) -> Vec2 {
        let rotated = self.rotation * point;
        Vec2::new(rotated.x, rotated.y * self.y_scale)
    }

    /// Viewport-aligned box around `anchor` with pixel `offsets`
    /// [x0, y0, x1, y1] grown by `padding`.
    pub fn screen_box(&self, anchor: Vec2, offsets: [f32; 4], padding: f32) -> [f32; 4] {
        let center = self.project(anchor);
        [
            center.x + offsets[0] - padding,
            center.y + offsets[1] - padding,
            center.x + offsets[2] + padding,
            center.y + offsets[3] + padding,
        ]
    }

    /// True when `bounds` does not collide with any claimed box.
    pub fn can_place(&self, bounds: [f32; 4]) -> bool {
        let envelope = AABB::from_corners([bounds[0], bounds[1]], [bounds[2], bounds[3]]);
        let tolerance = self.config.overlap_tolerance;
        !self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|existing| boxes_overlap(bounds, existing.bounds, tolerance))
    }

    /// Claim `bounds` so later symbols collide with it.
    pub fn insert(&mut self, bounds: [f32; 4], symbol: SymbolRef) {
        self.tree.insert(CollisionBox { bounds, symbol });
    }

    /// Record a placed symbol that does not block others.
    pub fn insert_ignored(&mut self, bounds: [f32; 4], symbol: SymbolRef) {
        self.ignored.push(CollisionBox { bounds, symbol });
    }

    pub fn record_debug(&mut self, bounds: [f32; 4], placed: bool) {
        if self.config.debug {
            self.debug_boxes.push(DebugBox { bounds, placed });
        }
    }

    pub fn debug_boxes(&self) -> &[DebugBox] {
        &self.debug_boxes
    }

    /// Symbols rendered inside `bounds` (collision space).
    pub fn query_rendered_symbols(&self, bounds: [f32; 4]) -> Vec<&SymbolRef> {
        let envelope = AABB::from_corners([bounds[0], bounds[1]], [bounds[2], bounds[3]]);
        let mut hits: Vec<&SymbolRef> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|b| &b.symbol)
            .collect();
        hits.extend(
            self.ignored
                .iter()
                .filter(|b| boxes_overlap(bounds, b.bounds, 0.0))
                .map(|b| &b.symbol),
        );
        hits
    }

    /// Number of blocking boxes claimed so far.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Overlap beyond `tolerance` pixels on both axes.
#[inline]
fn boxes_overlap(a: [f32; 4], b: [f32; 4], tolerance: f32) -> bool {
    let overlap_x = a[2].min(b[2]) - a[0].max(b[0]);
    let overlap_y = a[3].min(b[3]) - a[1].max(b[1]);
    overlap_x > tolerance && overlap_y > tolerance
}
