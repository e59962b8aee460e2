//! Line bucket: paths extruded into triangle strips.
//!
//! Each path vertex emits two vertices offset along a unit-width normal; the
//! renderer scales normals by the line width. Interior vertices use miter
//! normals, clamped to `MITER_LIMIT`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use log::warn;

use crate::bucket::{feature_passes, open_ring, BucketParameters, GeometryError};
use crate::style::filter::FilterExpr;
use crate::tile::geometry::FeatureType;

/// Longest allowed miter, in half line widths.
pub const MITER_LIMIT: f32 = 2.0;

/// Line vertex: position in tile units plus extrusion normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub normal: [f32; 2],
}

#[derive(Debug, Default)]
pub struct LineBucket {
    pub vertices: Vec<LineVertex>,
    pub indices: Vec<u32>,
    segment_count: usize,
}

impl LineBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Add every line and polygon outline of the parameters' layer that
    /// passes `filter`.
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
            let closed = match feature.feature_type {
                FeatureType::LineString => false,
                FeatureType::Polygon => true,
                _ => continue,
            };
            if !feature_passes(filter, feature) {
                continue;
            }

            let mut added = false;
            for part in &feature.geometry {
                match self.add_line(part, closed) {
                    Ok(()) => added = true,
                    Err(e) => warn!("Skipping line part of feature {} in '{}': {}", index, layer.name, e),
                }
            }
            if !added {
                continue;
            }
            if let Some(bounds) = feature.bounds() {
                params
                    .feature_index
                    .insert(bounds, index, &layer.name, bucket_name);
            }
        }
    }

    /// Extrude one path. `closed` paths join their last point to the first.
    pub fn add_line(&mut self, path: &[Vec2], closed: bool) -> Result<(), GeometryError> {
        let path = if closed { open_ring(path) } else { path };
        let mut points: Vec<Vec2> = Vec::with_capacity(path.len() + 1);
        for &p in path {
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        if closed {
            if points.len() < 3 {
                return Err(GeometryError::TooFewPoints {
                    found: points.len(),
                    required: 3,
                });
            }
            points.push(points[0]);
        } else if points.len() < 2 {
            return Err(GeometryError::TooFewPoints {
                found: points.len(),
                required: 2,
            });
        }

        let normals = line_normals(&points, closed);
        let base = self.vertices.len() as u32;
        for (p, n) in points.iter().zip(&normals) {
            self.vertices.push(LineVertex {
                position: [p.x, p.y],
                normal: [n.x, n.y],
            });
            self.vertices.push(LineVertex {
                position: [p.x, p.y],
                normal: [-n.x, -n.y],
            });
        }
        for i in 0..(points.len() as u32 - 1) {
            let a = base + i * 2;
            self.indices
                .extend_from_slice(&[a, a + 1, a + 2, a + 1, a + 3, a + 2]);
        }

        self.segment_count += points.len() - 1;
        Ok(())
    }
}

/// Per-vertex extrusion normals for a deduplicated path.
fn line_normals(points: &[Vec2], closed: bool) -> Vec<Vec2> {
    let n = points.len();
    let mut normals = Vec::with_capacity(n);

    for i in 0..n {
        let prev = if i > 0 {
            Some(points[i - 1])
        } else if closed {
            // points[n - 1] repeats points[0]
            Some(points[n - 2])
        } else {
            None
        };
        let next = if i + 1 < n {
            Some(points[i + 1])
        } else if closed {
            Some(points[1])
        } else {
            None
        };

        let curr = points[i];
        let normal = match (prev, next) {
            (Some(prev), Some(next)) => {
                let seg1 = (curr - prev).normalize_or_zero();
                let seg2 = (next - curr).normalize_or_zero();
                let join = (seg1 + seg2).normalize_or_zero();
                if join == Vec2::ZERO {
                    // Path doubles back on itself.
                    seg1.perp()
                } else {
                    let miter_dot = join.dot(seg1);
                    let miter_length = if miter_dot.abs() > 0.01 {
                        (1.0 / miter_dot).min(MITER_LIMIT)
                    } else {
                        MITER_LIMIT
                    };
                    join.perp() * miter_length
                }
            }
            (None, Some(next)) => (next - curr).normalize_or_zero().perp(),
            (Some(prev), None) => (curr - prev).normalize_or_zero().perp(),
            (None, None) => Vec2::ZERO,
        };
        normals.push(normal);
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line() {
        let mut bucket = LineBucket::new();
        bucket
            .add_line(&[Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)], false)
            .unwrap();
        assert_eq!(bucket.vertices.len(), 4);
        assert_eq!(bucket.indices.len(), 6);
        assert_eq!(bucket.vertices[0].normal, [0.0, 1.0]);
        assert_eq!(bucket.vertices[1].normal, [0.0, -1.0]);
    }

    #[test]
    fn test_skip_duplicate_points() {
        let mut bucket = LineBucket::new();
        bucket
            .add_line(
                &[
                    Vec2::new(0.0, 0.0),
                    Vec2::new(0.0, 0.0),
                    Vec2::new(10.0, 0.0),
                ],
                false,
            )
            .unwrap();
        assert_eq!(bucket.segment_count(), 1);
    }

    #[test]
    fn test_right_angle_miter() {
        let normals = line_normals(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(10.0, 10.0),
            ],
            false,
        );
        let corner = normals[1];
        assert!((corner.length() - std::f32::consts::SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_sharp_miter_is_clamped() {
        let normals = line_normals(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(0.0, 0.5),
            ],
            false,
        );
        assert!(normals[1].length() <= MITER_LIMIT + 1e-4);
    }

    #[test]
    fn test_closed_ring() {
        let mut bucket = LineBucket::new();
        let ring = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 0.0),
        ];
        bucket.add_line(&ring, true).unwrap();
        assert_eq!(bucket.segment_count(), 3);
        assert_eq!(bucket.vertices.len(), 8);
    }

    #[test]
    fn test_reject_short_line() {
        let mut bucket = LineBucket::new();
        assert!(bucket.add_line(&[Vec2::ONE], false).is_err());
        assert!(bucket
            .add_line(&[Vec2::ZERO, Vec2::ONE, Vec2::ZERO], true)
            .is_err());
        assert!(!bucket.has_data());
    }
}
