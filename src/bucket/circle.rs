//! Circle bucket: one quad per point, expanded by the renderer.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::bucket::{feature_passes, BucketParameters};
use crate::style::filter::FilterExpr;
use crate::tile::geometry::{FeatureType, EXTENT};

/// Quad corner of a circle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CircleVertex {
    pub position: [f32; 2],
    /// Unit corner offset, scaled by the circle radius when drawn.
    pub extrude: [f32; 2],
}

const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

#[derive(Debug, Default)]
pub struct CircleBucket {
    pub vertices: Vec<CircleVertex>,
    pub indices: Vec<u32>,
}

impl CircleBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn circle_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn populate(
        &mut self,
        params: &mut BucketParameters<'_>,
        bucket_name: &str,
        filter: Option<&FilterExpr>,
    ) {
        let layer = params.layer;
        for (index, feature) in layer.features.iter().enumerate() {
            if params.is_cancelled() {
                return;
            }
            if feature.feature_type != FeatureType::Point || !feature_passes(filter, feature) {
                continue;
            }
            let before = self.circle_count();
            for point in feature.geometry.iter().flatten() {
                self.add_circle(*point);
            }
            if self.circle_count() == before {
                continue;
            }
            if let Some(bounds) = feature.bounds() {
                params
                    .feature_index
                    .insert(bounds, index, &layer.name, bucket_name);
            }
        }
    }

    /// Add a circle at `point`. Points outside the tile are dropped; the
    /// neighbouring tile draws them.
    pub fn add_circle(&mut self, point: Vec2) -> bool {
        if point.x < 0.0 || point.y < 0.0 || point.x >= EXTENT || point.y >= EXTENT {
            return false;
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend(CORNERS.iter().map(|&extrude| CircleVertex {
            position: [point.x, point.y],
            extrude,
        }));
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_per_point() {
        let mut bucket = CircleBucket::new();
        assert!(bucket.add_circle(Vec2::new(100.0, 200.0)));
        assert!(bucket.add_circle(Vec2::new(300.0, 400.0)));
        assert_eq!(bucket.circle_count(), 2);
        assert_eq!(bucket.indices.len(), 12);
        assert_eq!(&bucket.indices[6..9], &[4, 5, 6]);
    }

    #[test]
    fn test_points_outside_tile_dropped() {
        let mut bucket = CircleBucket::new();
        assert!(!bucket.add_circle(Vec2::new(-1.0, 10.0)));
        assert!(!bucket.add_circle(Vec2::new(10.0, EXTENT)));
        assert!(!bucket.has_data());
    }
}
