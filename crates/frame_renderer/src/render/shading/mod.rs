//! # Shading Stage Executor
//!
//! Turns one tessellation batch into draw calls.
//!
//! ```text
//! deform → upload xyz/indexes → push MVP
//!        → per stage: colors → texcoords → images → pipeline → viewport → draw
//!        → dynamic light pass (optional)
//!        → fog pass (optional)
//! ```
//!
//! Positions and indexes are uploaded once per batch and stay bound for
//! every stage; colors and texture coordinates are regenerated and uploaded
//! per stage.

pub mod calc;

use ash::vk;

use crate::config::RendererConfig;
use crate::render::commands::CommandSink;
use crate::render::effects::{dlight, fog};
use crate::render::error::RenderResult;
use crate::render::frame::FrameCounters;
use crate::render::geometry_buffer::{GeometryStreamBuffer, StreamBinding};
use crate::render::tess::TessBatch;
use crate::render::view::{Orientation, ViewParms};
use crate::scene::{CinematicPlayer, CullType, Dlight, FogPass, FogVolume, Shader, ShaderStage};

/// Pipelines of the effect passes, indexed `[variant][cull][polygon_offset]`
///
/// The light variant is `[modulate, additive]`; the fog variant is
/// `[depth equal, depth less-or-equal]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPipelines {
    /// Dynamic light pipelines
    pub dlight: [[[vk::Pipeline; 2]; 3]; 2],
    /// Fog pipelines
    pub fog: [[[vk::Pipeline; 2]; 3]; 2],
}

impl GlobalPipelines {
    /// Pipeline of the dynamic light pass
    pub fn dlight_pipeline(&self, additive: bool, cull: CullType, polygon_offset: bool) -> vk::Pipeline {
        self.dlight[usize::from(additive)][cull.index()][usize::from(polygon_offset)]
    }

    /// Pipeline of the fog pass; `FogPass::None` never reaches here
    pub fn fog_pipeline(&self, fog_pass: FogPass, cull: CullType, polygon_offset: bool) -> vk::Pipeline {
        let variant = fog_pass.ordinal().saturating_sub(1).min(1);
        self.fog[variant][cull.index()][usize::from(polygon_offset)]
    }
}

/// Images the back end binds on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialImages {
    /// Flat white, replaces base textures in lightmap-only mode
    pub white: vk::DescriptorSet,
    /// Radial light falloff
    pub dlight: vk::DescriptorSet,
    /// Fog density ramp
    pub fog: vk::DescriptorSet,
}

/// GPU objects owned outside the frame pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendResources {
    /// Effect pass pipelines
    pub pipelines: GlobalPipelines,
    /// Built-in images
    pub images: SpecialImages,
    /// Framebuffer area viewports are clamped to
    pub render_area: vk::Rect2D,
}

/// Depth range of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthRange {
    /// [0, 1]
    Normal,
    /// [0, 0], sky drawn in front of everything
    ForceZero,
    /// [1, 1], sky drawn behind everything
    ForceOne,
    /// [0, 0.3], view weapons
    Weapon,
}

impl DepthRange {
    /// Minimum and maximum depth
    pub const fn bounds(self) -> (f32, f32) {
        match self {
            Self::Normal => (0.0, 1.0),
            Self::ForceZero => (0.0, 0.0),
            Self::ForceOne => (1.0, 1.0),
            Self::Weapon => (0.0, 0.3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexBinding {
    binding: StreamBinding,
    count: u32,
}

/// Command state carried across batches and views of a frame
#[derive(Debug, Clone, Default)]
pub struct ShadingState {
    /// Something was drawn since the depth buffer was last cleared
    pub depth_dirty: bool,
    full_indexes: Option<IndexBinding>,
}

impl ShadingState {
    /// Forget everything for a new frame
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a batch is drawn with
#[derive(Debug, Clone, Copy)]
pub struct BatchEnv<'a> {
    /// Batch shader
    pub shader: &'a Shader,
    /// Entity (or world) orientation
    pub orientation: &'a Orientation,
    /// View being rendered
    pub view: &'a ViewParms,
    /// Entity requested the compressed depth range
    pub depth_hack: bool,
    /// Lights, transformed into the orientation's frame
    pub dlights: &'a [Dlight],
    /// Fog volume of the batch
    pub fog: Option<&'a FogVolume>,
}

impl BatchEnv<'_> {
    /// Depth range for this batch
    pub fn depth_range(&self, config: &RendererConfig) -> DepthRange {
        if self.shader.is_sky {
            if config.show_sky {
                DepthRange::ForceZero
            } else {
                DepthRange::ForceOne
            }
        } else if self.depth_hack {
            DepthRange::Weapon
        } else {
            DepthRange::Normal
        }
    }
}

/// Everything shading writes to
pub struct ShadeContext<'a> {
    /// Command receiver
    pub sink: &'a mut dyn CommandSink,
    /// Stream memory
    pub geometry: &'a mut GeometryStreamBuffer,
    /// Carried command state
    pub state: &'a mut ShadingState,
    /// Frame statistics
    pub counters: &'a mut FrameCounters,
    /// Video texture decoder
    pub cinematics: &'a mut dyn CinematicPlayer,
    /// Renderer settings
    pub config: &'a RendererConfig,
    /// Pipelines and images
    pub resources: &'a BackendResources,
}

impl ShadeContext<'_> {
    /// Bind state and issue one indexed draw
    pub fn shade_geometry(
        &mut self,
        pipeline: vk::Pipeline,
        descriptor_sets: &[vk::DescriptorSet],
        depth_range: DepthRange,
        polygon_offset: bool,
        index_count: u32,
        view: &ViewParms,
    ) {
        let viewport = self.viewport(view, depth_range);
        let config = self.config;

        self.sink.bind_descriptor_sets(descriptor_sets);
        self.sink.bind_pipeline(pipeline);
        self.sink.set_viewport(viewport);
        if polygon_offset {
            self.sink
                .set_depth_bias(config.offset_units, 0.0, config.offset_factor);
        }
        self.sink.draw_indexed(index_count, 0, 0);

        self.state.depth_dirty = true;
        self.counters.draw_calls += 1;
        self.counters.total_indexes += index_count;
    }

    /// Viewport of `view` clamped to the render area
    pub fn viewport(&self, view: &ViewParms, depth_range: DepthRange) -> vk::Viewport {
        let area = self.resources.render_area;
        let area_x1 = area.offset.x + area.extent.width as i32;
        let area_y1 = area.offset.y + area.extent.height as i32;

        let x0 = view.viewport.x.clamp(area.offset.x, area_x1);
        let y0 = view.viewport.y.clamp(area.offset.y, area_y1);
        let x1 = (view.viewport.x + view.viewport.width as i32).clamp(x0, area_x1);
        let y1 = (view.viewport.y + view.viewport.height as i32).clamp(y0, area_y1);

        let (min_depth, max_depth) = depth_range.bounds();
        vk::Viewport {
            x: x0 as f32,
            y: y0 as f32,
            width: (x1 - x0) as f32,
            height: (y1 - y0) as f32,
            min_depth,
            max_depth,
        }
    }

    /// Rebind the batch's full index list; returns its length
    pub fn rebind_full_indexes(&mut self) -> u32 {
        match self.state.full_indexes {
            Some(IndexBinding { binding, count }) => {
                self.sink.bind_index_buffer(binding.buffer, binding.offset);
                count
            }
            None => 0,
        }
    }

    /// Push the transform constants of a batch
    ///
    /// 64 bytes of MVP normally; portal views add the eye transform and the
    /// portal plane in eye space for clipping, 128 bytes in total.
    pub fn update_mvp(&mut self, orientation: &Orientation, view: &ViewParms) {
        let mvp = view.projection * orientation.model_matrix;
        let mut push = [0.0_f32; 32];
        push[..16].copy_from_slice(mvp.as_slice());

        if !view.is_portal {
            self.sink.push_constants(0, bytemuck::cast_slice(&push[..16]));
            return;
        }

        let mv = &orientation.model_matrix;
        for i in 0..12 {
            push[16 + i] = mv[(i / 4, i % 4)];
        }

        let plane = &view.portal_plane;
        let camera = &view.camera;
        let eye_plane = [
            camera.axis[0].dot(&plane.normal),
            camera.axis[1].dot(&plane.normal),
            camera.axis[2].dot(&plane.normal),
            plane.normal.dot(&camera.origin) - plane.dist,
        ];
        // same flip as the eye transform
        push[28] = -eye_plane[1];
        push[29] = eye_plane[2];
        push[30] = -eye_plane[0];
        push[31] = eye_plane[3];

        self.sink.push_constants(0, bytemuck::cast_slice(&push));
    }
}

/// Pipeline variant of a stage for the kind of view
pub fn stage_pipeline(stage: &ShaderStage, view: &ViewParms) -> vk::Pipeline {
    if view.is_mirror {
        stage.mirror_pipeline
    } else if view.is_portal {
        stage.portal_pipeline
    } else {
        stage.pipeline
    }
}

/// Shade one batch: every stage, then the light and fog passes
pub fn stage_iterator_generic(ctx: &mut ShadeContext<'_>, tess: &mut TessBatch, env: &BatchEnv<'_>) -> RenderResult<()> {
    let shader = env.shader;

    calc::deform_geometry(tess, &shader.deforms);

    let positions = ctx.geometry.upload_positions(&tess.xyz)?;
    ctx.sink
        .bind_vertex_buffers(0, &[positions.buffer], &[positions.offset]);

    let indexes = ctx.geometry.upload_indexes(&tess.indexes)?;
    ctx.sink.bind_index_buffer(indexes.buffer, indexes.offset);
    ctx.state.full_indexes = Some(IndexBinding {
        binding: indexes,
        count: tess.num_indexes(),
    });

    ctx.update_mvp(env.orientation, env.view);

    let depth_range = env.depth_range(ctx.config);
    let time = tess.shader_time;

    for stage in &shader.stages {
        let multitexture = stage.is_multitextured();

        calc::compute_colors(stage, tess);
        calc::compute_tex_coords(&stage.bundles[0], tess, 0, &env.orientation.view_origin);
        if multitexture {
            calc::compute_tex_coords(&stage.bundles[1], tess, 1, &env.orientation.view_origin);
        }

        let st1 = multitexture.then(|| tess.svars.tex_coords[1].as_slice());
        let attributes = ctx
            .geometry
            .upload_attributes(&tess.svars.colors, &tess.svars.tex_coords[0], st1)?;
        ctx.sink.bind_vertex_buffers(
            1,
            &attributes.buffers()[..attributes.count],
            &attributes.offsets[..attributes.count],
        );

        let mut descriptor_sets = [calc::bind_animated_image(&stage.bundles[0], time, &mut *ctx.cinematics); 2];
        if multitexture {
            if ctx.config.lightmap_only {
                descriptor_sets[0] = ctx.resources.images.white;
            }
            descriptor_sets[1] = calc::bind_animated_image(&stage.bundles[1], time, &mut *ctx.cinematics);
        }
        let set_count = if multitexture { 2 } else { 1 };

        ctx.shade_geometry(
            stage_pipeline(stage, env.view),
            &descriptor_sets[..set_count],
            depth_range,
            shader.polygon_offset,
            tess.num_indexes(),
            env.view,
        );

        let lightmap_stage = stage.bundles.iter().any(|b| b.is_lightmap);
        if ctx.config.lightmap_only && lightmap_stage {
            break;
        }
    }

    if dlight::wants_dlights(tess, env) {
        dlight::dlight_pass(ctx, tess, env)?;
    }

    if tess.fog_num != 0 && shader.fog_pass != FogPass::None && env.fog.is_some() {
        fog::fog_pass(ctx, tess, env)?;
    }

    Ok(())
}
