//! Polygon fill bucket.
//!
//! Polygons are tessellated with lyon into triangle lists; ring edges are
//! kept separately as a line list for outlines.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use log::warn;

use crate::bucket::{feature_passes, open_ring, BucketParameters, GeometryError};
use crate::style::filter::FilterExpr;
use crate::tile::geometry::FeatureType;

/// Fill vertex in tile units.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FillVertex {
    pub position: [f32; 2],
}

#[derive(Debug, Default)]
pub struct FillBucket {
    pub vertices: Vec<FillVertex>,
    pub indices: Vec<u32>,
    pub outline_vertices: Vec<FillVertex>,
    /// Line-list indices into `outline_vertices`.
    pub outline_indices: Vec<u32>,
    feature_count: usize,
}

impl FillBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Add every polygon of the parameters' layer that passes `filter`.
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
            if feature.feature_type != FeatureType::Polygon || !feature_passes(filter, feature) {
                continue;
            }
            if let Err(e) = self.add_polygon(&feature.geometry) {
                warn!("Skipping polygon {} of '{}': {}", index, layer.name, e);
                continue;
            }
            if let Some(bounds) = feature.bounds() {
                params
                    .feature_index
                    .insert(bounds, index, &layer.name, bucket_name);
            }
        }
    }

    /// Tessellate one polygon (exterior ring first, then holes).
    pub fn add_polygon(&mut self, rings: &[Vec<Vec2>]) -> Result<(), GeometryError> {
        use lyon_path::Path;
        use lyon_tessellation::{
            BuffersBuilder, FillOptions, FillTessellator, FillVertex as LyonVertex, VertexBuffers,
        };

        let rings: Vec<&[Vec2]> = rings.iter().map(|r| open_ring(r)).collect();
        for ring in &rings {
            if ring.len() < 3 {
                return Err(GeometryError::TooFewPoints {
                    found: ring.len(),
                    required: 3,
                });
            }
        }
        if rings.is_empty() {
            return Err(GeometryError::TooFewPoints {
                found: 0,
                required: 3,
            });
        }

        let mut path_builder = Path::builder();
        for ring in &rings {
            path_builder.begin(lyon_path::math::Point::new(ring[0].x, ring[0].y));
            for vertex in ring.iter().skip(1) {
                path_builder.line_to(lyon_path::math::Point::new(vertex.x, vertex.y));
            }
            path_builder.close();
        }
        let path = path_builder.build();

        // Even-odd fill treats inner rings as holes.
        let mut buffers: VertexBuffers<FillVertex, u32> = VertexBuffers::new();
        let mut tessellator = FillTessellator::new();
        tessellator
            .tessellate_path(
                &path,
                &FillOptions::default(),
                &mut BuffersBuilder::new(&mut buffers, |vertex: LyonVertex| FillVertex {
                    position: [vertex.position().x, vertex.position().y],
                }),
            )
            .map_err(|e| GeometryError::Tessellation(format!("{:?}", e)))?;

        if buffers.indices.is_empty() {
            return Err(GeometryError::Tessellation(
                "polygon has no area".to_string(),
            ));
        }

        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&buffers.vertices);
        self.indices.extend(buffers.indices.iter().map(|i| i + base));

        for ring in &rings {
            let start = self.outline_vertices.len() as u32;
            let count = ring.len() as u32;
            self.outline_vertices
                .extend(ring.iter().map(|p| FillVertex { position: [p.x, p.y] }));
            for i in 0..count {
                self.outline_indices.push(start + i);
                self.outline_indices.push(start + (i + 1) % count);
            }
        }

        self.feature_count += 1;
        Ok(())
    }
}
