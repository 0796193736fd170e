//! # Dynamic Light Pass
//!
//! Each light touching the batch redraws the batch's geometry with a
//! radial falloff texture. Vertex positions are projected onto a disc
//! centred on the light and scaled by its radius; the vertex color carries
//! the light color modulated by the vertex's distance from the light's
//! plane:
//!
//! ```text
//! |dz| < r/2        full intensity
//! r/2 <= |dz| <= r  2 (r - |dz|) / r
//! |dz| > r          zero, clipped
//! ```
//!
//! Triangles whose three vertexes are clipped on the same side are dropped
//! from the light's index list.

use crate::foundation::math::Vec3;
use crate::render::error::RenderResult;
use crate::render::shading::{BatchEnv, ShadeContext};
use crate::render::tess::TessBatch;
use crate::scene::{Dlight, SortClass, SurfaceFlags};

/// s < 0
pub const CLIP_S_LOW: u8 = 1;
/// s > 1
pub const CLIP_S_HIGH: u8 = 2;
/// t < 0
pub const CLIP_T_LOW: u8 = 4;
/// t > 1
pub const CLIP_T_HIGH: u8 = 8;
/// Vertex too far below the light
pub const CLIP_BELOW: u8 = 16;
/// Vertex too far above the light
pub const CLIP_ABOVE: u8 = 32;

/// Light texture coordinates, color scale and clip code of one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    /// Coordinates on the light disc
    pub st: [f32; 2],
    /// Intensity scale
    pub modulate: f32,
    /// Clip bits
    pub clip: u8,
}

/// Intensity scale at distance `dz` from the light's plane
pub fn light_modulation(dz: f32, radius: f32) -> f32 {
    let dz = dz.abs();
    if dz > radius {
        0.0
    } else if dz < radius * 0.5 {
        1.0
    } else {
        2.0 * (radius - dz) / radius
    }
}

/// Project one vertex onto a light in the batch's local frame
pub fn project_vertex(light_origin: &Vec3, radius: f32, xyz: &Vec3) -> LightProjection {
    let scale = 1.0 / radius;
    let dist = light_origin - xyz;

    let s = 0.5 + dist.x * scale;
    let t = 0.5 + dist.y * scale;

    let mut clip = 0;
    if s < 0.0 {
        clip |= CLIP_S_LOW;
    } else if s > 1.0 {
        clip |= CLIP_S_HIGH;
    }
    if t < 0.0 {
        clip |= CLIP_T_LOW;
    } else if t > 1.0 {
        clip |= CLIP_T_HIGH;
    }
    if dist.z > radius {
        clip |= CLIP_BELOW;
    } else if dist.z < -radius {
        clip |= CLIP_ABOVE;
    }

    LightProjection {
        st: [s, t],
        modulate: light_modulation(dist.z, radius),
        clip,
    }
}

/// Indexes of the triangles not entirely clipped on one side
pub fn surviving_indexes(indexes: &[u32], clip_bits: &[u8]) -> Vec<u32> {
    indexes
        .chunks_exact(3)
        .filter(|tri| {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| clip_bits[i as usize]);
            a & b & c == 0
        })
        .flatten()
        .copied()
        .collect()
}

/// True when the batch qualifies for the light pass at all
pub fn wants_dlights(tess: &TessBatch, env: &BatchEnv<'_>) -> bool {
    tess.dlight_bits != 0
        && !env.dlights.is_empty()
        && env.shader.sort <= SortClass::Opaque
        && !env
            .shader
            .surface_flags
            .intersects(SurfaceFlags::NODLIGHT | SurfaceFlags::SKY)
}

/// Fill `tess.svars` for one light; returns the per-vertex clip bits
fn project_light(tess: &mut TessBatch, light: &Dlight) -> Vec<u8> {
    let color = light.color * 255.0;
    let count = tess.xyz.len();

    tess.svars.colors.clear();
    tess.svars.tex_coords[0].clear();
    let mut clip_bits = Vec::with_capacity(count);

    for i in 0..count {
        let projection = project_vertex(&light.transformed, light.radius, &tess.position(i));
        let scaled = color * projection.modulate;
        tess.svars.tex_coords[0].push(projection.st);
        tess.svars.colors.push([scaled.x as u8, scaled.y as u8, scaled.z as u8, 255]);
        clip_bits.push(projection.clip);
    }
    clip_bits
}

/// Draw every light touching the batch
pub fn dlight_pass(ctx: &mut ShadeContext<'_>, tess: &mut TessBatch, env: &BatchEnv<'_>) -> RenderResult<()> {
    let shader = env.shader;
    for (light_index, light) in env.dlights.iter().enumerate().take(32) {
        if tess.dlight_bits & (1 << light_index) == 0 {
            continue;
        }

        let clip_bits = project_light(tess, light);
        let indexes = surviving_indexes(&tess.indexes, &clip_bits);
        if indexes.is_empty() {
            continue;
        }

        ctx.counters.dlight_vertexes += tess.num_vertexes();
        ctx.counters.dlight_indexes += indexes.len() as u32;

        let attributes = ctx
            .geometry
            .upload_attributes(&tess.svars.colors, &tess.svars.tex_coords[0], None)?;
        ctx.sink.bind_vertex_buffers(
            1,
            &attributes.buffers()[..attributes.count],
            &attributes.offsets[..attributes.count],
        );

        let binding = ctx.geometry.upload_indexes(&indexes)?;
        ctx.sink.bind_index_buffer(binding.buffer, binding.offset);

        let pipeline = ctx
            .resources
            .pipelines
            .dlight_pipeline(light.additive, shader.cull, shader.polygon_offset);
        let light_image = ctx.resources.images.dlight;
        let depth_range = env.depth_range(ctx.config);
        ctx.shade_geometry(
            pipeline,
            &[light_image],
            depth_range,
            shader.polygon_offset,
            indexes.len() as u32,
            env.view,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_modulation_thresholds() {
        let radius = 100.0;
        assert_relative_eq!(light_modulation(radius / 4.0, radius), 1.0);
        assert_relative_eq!(light_modulation(-radius / 4.0, radius), 1.0);
        assert_relative_eq!(light_modulation(radius * 0.75, radius), 0.5);
        assert_relative_eq!(light_modulation(radius, radius), 0.0);
        assert_relative_eq!(light_modulation(radius * 1.5, radius), 0.0);
    }

    #[test]
    fn test_vertex_beyond_radius_is_clipped() {
        let light = Vec3::zeros();
        let inside = project_vertex(&light, 100.0, &Vec3::new(0.0, 0.0, -25.0));
        assert_eq!(inside.clip, 0);
        assert_relative_eq!(inside.modulate, 1.0);
        assert_relative_eq!(inside.st[0], 0.5);

        let below = project_vertex(&light, 100.0, &Vec3::new(0.0, 0.0, -150.0));
        assert_eq!(below.clip, CLIP_BELOW);
        assert_relative_eq!(below.modulate, 0.0);

        let above = project_vertex(&light, 100.0, &Vec3::new(0.0, 0.0, 150.0));
        assert_eq!(above.clip, CLIP_ABOVE);

        let side = project_vertex(&light, 100.0, &Vec3::new(-80.0, 90.0, 0.0));
        assert_eq!(side.clip, CLIP_S_HIGH | CLIP_T_LOW);
    }

    #[test]
    fn test_triangles_clipped_on_one_side_are_dropped() {
        let clip_bits = [CLIP_S_LOW, CLIP_S_LOW, CLIP_S_LOW | CLIP_T_LOW, 0, CLIP_T_LOW];
        let indexes = [0, 1, 2, 0, 1, 3, 2, 4, 4];
        assert_eq!(surviving_indexes(&indexes, &clip_bits), vec![0, 1, 3]);
    }
}
