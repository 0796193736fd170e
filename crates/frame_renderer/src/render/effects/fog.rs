//! Fog pass
//!
//! Redraws a fogged batch with the fog color and coordinates into the fog
//! falloff image: `s` grows with view depth, `t` with depth below the fog
//! volume's surface plane.

use crate::foundation::math::{Vec3, Vec4};
use crate::render::error::RenderResult;
use crate::render::shading::{BatchEnv, ShadeContext};
use crate::render::tess::TessBatch;
use crate::render::view::{Orientation, ViewParms};
use crate::scene::{FogPass, FogVolume};

/// Plane equations producing the fog coordinates of a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogVectors {
    /// View depth, scaled by the fog density
    pub distance: Vec4,
    /// Depth below the fog surface
    pub depth: Vec4,
    /// Depth of the eye below the fog surface
    pub eye_t: f32,
}

impl FogVectors {
    /// Derive the fog planes for a batch drawn with `or` from `view`
    pub fn new(fog: &FogVolume, or: &Orientation, view: &ViewParms) -> Self {
        let m = &or.model_matrix;
        let local = or.origin - view.camera.origin;
        let mut distance = Vec4::new(-m[(2, 0)], -m[(2, 1)], -m[(2, 2)], local.dot(&view.camera.axis[0]));
        distance *= fog.tc_scale;
        distance.w += 1.0 / 512.0;

        let (depth, eye_t) = match fog.surface {
            Some(surface) => {
                let normal = surface.xyz();
                let depth = Vec4::new(
                    normal.dot(&or.axis[0]),
                    normal.dot(&or.axis[1]),
                    normal.dot(&or.axis[2]),
                    -surface.w + or.origin.dot(&normal),
                );
                let eye_t = or.view_origin.dot(&depth.xyz()) + depth.w;
                (depth, eye_t)
            }
            // volumes without a surface always contain the eye
            None => (Vec4::new(0.0, 0.0, 0.0, 1.0), 1.0),
        };

        Self { distance, depth, eye_t }
    }

    /// Fog coordinates of a local-space vertex
    pub fn tex_coord(&self, xyz: &Vec3) -> [f32; 2] {
        let s = xyz.dot(&self.distance.xyz()) + self.distance.w;
        let mut t = xyz.dot(&self.depth.xyz()) + self.depth.w;

        if self.eye_t < 0.0 {
            t = if t < 1.0 {
                1.0 / 32.0
            } else {
                1.0 / 32.0 + 30.0 / 32.0 * t / (t - self.eye_t)
            };
        } else if t < 0.0 {
            t = 1.0 / 32.0;
        } else {
            t = 31.0 / 32.0;
        }

        [s, t]
    }
}

/// Redraw the batch through its fog volume
pub fn fog_pass(ctx: &mut ShadeContext<'_>, tess: &mut TessBatch, env: &BatchEnv<'_>) -> RenderResult<()> {
    let Some(fog) = env.fog else {
        return Ok(());
    };
    let shader = env.shader;
    if shader.fog_pass == FogPass::None {
        return Ok(());
    }

    let vectors = FogVectors::new(fog, env.orientation, env.view);
    let count = tess.xyz.len();
    tess.svars.colors.clear();
    tess.svars.colors.resize(count, fog.color);
    tess.svars.tex_coords[0].clear();
    for i in 0..count {
        let st = vectors.tex_coord(&tess.position(i));
        tess.svars.tex_coords[0].push(st);
    }

    let attributes = ctx
        .geometry
        .upload_attributes(&tess.svars.colors, &tess.svars.tex_coords[0], None)?;
    ctx.sink.bind_vertex_buffers(
        1,
        &attributes.buffers()[..attributes.count],
        &attributes.offsets[..attributes.count],
    );

    // the light pass may have left a reduced index list bound
    let index_count = ctx.rebind_full_indexes();

    let pipeline = ctx
        .resources
        .pipelines
        .fog_pipeline(shader.fog_pass, shader.cull, shader.polygon_offset);
    let fog_image = ctx.resources.images.fog;
    let depth_range = env.depth_range(ctx.config);
    ctx.shade_geometry(
        pipeline,
        &[fog_image],
        depth_range,
        shader.polygon_offset,
        index_count,
        env.view,
    );
    Ok(())
}
