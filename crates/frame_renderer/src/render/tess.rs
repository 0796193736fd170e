//! Tessellation batch
//!
//! Accumulates the geometry of consecutive surfaces that share a shader,
//! fog volume and light flag until the batch is shaded.

use crate::config::TessLimits;
use crate::foundation::math::Vec3;
use crate::render::error::{RenderError, RenderResult};

/// A vertex as surfaces hand it to the batch
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TessVertex {
    /// Position
    pub xyz: Vec3,
    /// Normal
    pub normal: Vec3,
    /// Texture coordinates
    pub st: [f32; 2],
    /// Lightmap coordinates
    pub lightmap: [f32; 2],
    /// Vertex color
    pub color: [u8; 4],
}

impl TessVertex {
    /// A vertex with white color and zero coordinates
    pub fn at(xyz: Vec3) -> Self {
        Self {
            xyz,
            normal: Vec3::z(),
            color: [255; 4],
            ..Self::default()
        }
    }
}

/// Per-stage outputs rebuilt for every stage and effect pass
#[derive(Debug, Clone, Default)]
pub struct StageVars {
    /// Generated colors
    pub colors: Vec<[u8; 4]>,
    /// Generated texture coordinates per texture unit
    pub tex_coords: [Vec<[f32; 2]>; 2],
}

/// The batch being accumulated
#[derive(Debug, Clone)]
pub struct TessBatch {
    /// Positions, w unused
    pub xyz: Vec<[f32; 4]>,
    /// Normals, w unused
    pub normals: Vec<[f32; 4]>,
    /// Surface texture (0) and lightmap (1) coordinates
    pub tex_coords: Vec<[[f32; 2]; 2]>,
    /// Surface vertex colors
    pub vertex_colors: Vec<[u8; 4]>,
    /// Triangle list
    pub indexes: Vec<u32>,
    /// Stage outputs
    pub svars: StageVars,
    /// Sorted index of the batch shader
    pub shader: u32,
    /// Fog volume of the batch
    pub fog_num: u32,
    /// Lights touching the batch, one bit per light
    pub dlight_bits: u32,
    /// Shader clock of the current entity
    pub shader_time: f32,
    limits: TessLimits,
}

impl TessBatch {
    /// An empty batch with fixed limits
    pub fn new(limits: TessLimits) -> Self {
        let max_vertexes = limits.max_vertexes as usize;
        Self {
            xyz: Vec::with_capacity(max_vertexes),
            normals: Vec::with_capacity(max_vertexes),
            tex_coords: Vec::with_capacity(max_vertexes),
            vertex_colors: Vec::with_capacity(max_vertexes),
            indexes: Vec::with_capacity(limits.max_indexes as usize),
            svars: StageVars::default(),
            shader: 0,
            fog_num: 0,
            dlight_bits: 0,
            shader_time: 0.0,
            limits,
        }
    }

    /// Start a batch for a shader and fog volume
    pub fn begin(&mut self, shader: u32, fog_num: u32, shader_time: f32) {
        self.clear();
        self.shader = shader;
        self.fog_num = fog_num;
        self.shader_time = shader_time;
    }

    /// Drop all geometry, keeping the batch parameters
    pub fn clear(&mut self) {
        self.xyz.clear();
        self.normals.clear();
        self.tex_coords.clear();
        self.vertex_colors.clear();
        self.indexes.clear();
        self.dlight_bits = 0;
    }

    /// Fixed limits
    pub fn limits(&self) -> TessLimits {
        self.limits
    }

    /// Vertexes accumulated
    pub fn num_vertexes(&self) -> u32 {
        self.xyz.len() as u32
    }

    /// Indexes accumulated
    pub fn num_indexes(&self) -> u32 {
        self.indexes.len() as u32
    }

    /// True when the batch can take `vertexes` and `indexes` more
    pub fn has_room(&self, vertexes: u32, indexes: u32) -> bool {
        self.num_vertexes() + vertexes <= self.limits.max_vertexes
            && self.num_indexes() + indexes <= self.limits.max_indexes
    }

    /// Fail when the batch cannot take `vertexes` and `indexes` more
    pub fn reserve(&self, vertexes: u32, indexes: u32) -> RenderResult<()> {
        if self.has_room(vertexes, indexes) {
            return Ok(());
        }
        Err(RenderError::TessOverflow {
            vertexes: self.num_vertexes() + vertexes,
            indexes: self.num_indexes() + indexes,
            max_vertexes: self.limits.max_vertexes,
            max_indexes: self.limits.max_indexes,
        })
    }

    /// Append a vertex and return its index
    pub fn push_vertex(&mut self, vertex: TessVertex) -> RenderResult<u32> {
        self.reserve(1, 0)?;
        let index = self.num_vertexes();
        let TessVertex {
            xyz,
            normal,
            st,
            lightmap,
            color,
        } = vertex;
        self.xyz.push([xyz.x, xyz.y, xyz.z, 0.0]);
        self.normals.push([normal.x, normal.y, normal.z, 0.0]);
        self.tex_coords.push([st, lightmap]);
        self.vertex_colors.push(color);
        Ok(index)
    }

    /// Append indexes relative to the start of the batch
    pub fn push_indexes(&mut self, indexes: &[u32]) -> RenderResult<()> {
        self.reserve(0, indexes.len() as u32)?;
        self.indexes.extend_from_slice(indexes);
        Ok(())
    }

    /// Position of vertex `i`
    pub fn position(&self, i: usize) -> Vec3 {
        let [x, y, z, _] = self.xyz[i];
        Vec3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> TessLimits {
        TessLimits {
            max_vertexes: 4,
            max_indexes: 6,
        }
    }

    #[test]
    fn test_vertex_limit_boundary() {
        let mut tess = TessBatch::new(limits());
        for i in 0..4 {
            assert_eq!(tess.push_vertex(TessVertex::at(Vec3::repeat(i as f32))).unwrap(), i);
        }
        assert_eq!(tess.num_vertexes(), 4);
        let err = tess.push_vertex(TessVertex::default()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::TessOverflow {
                vertexes: 5,
                max_vertexes: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_index_limit_boundary() {
        let mut tess = TessBatch::new(limits());
        assert!(tess.push_indexes(&[0, 1, 2, 0, 2, 3]).is_ok());
        assert!(tess.push_indexes(&[0]).is_err());
        assert_eq!(tess.num_indexes(), 6);
    }

    #[test]
    fn test_begin_clears_geometry() {
        let mut tess = TessBatch::new(limits());
        tess.push_vertex(TessVertex::default()).unwrap();
        tess.dlight_bits = 3;
        tess.begin(7, 2, 1.5);
        assert_eq!(tess.num_vertexes(), 0);
        assert_eq!(tess.dlight_bits, 0);
        assert_eq!((tess.shader, tess.fog_num), (7, 2));
        assert!(tess.has_room(4, 6));
        assert!(!tess.has_room(5, 0));
    }
}
