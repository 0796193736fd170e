//! # Frame Driver
//!
//! Runs the per-view pipeline and replays the committed views.
//!
//! ```text
//! render_frame
//!   └─ render_view (primary)
//!        rotate → frustum → world + polys → projection → entities
//!        → sort → portal scan ──trigger──→ render_view (portal, one level)
//!        → commit
//!   └─ execute: every committed view, in commit order, through the back end
//! ```
//!
//! A portal view is committed before the view that contains it, so it is
//! drawn first.

use crate::config::RendererConfig;
use crate::render::backend;
use crate::render::collector;
use crate::render::commands::CommandSink;
use crate::render::draw_surface::{DrawSurface, DrawSurfaceBuffer};
use crate::render::error::{RenderError, RenderResult};
use crate::render::geometry_buffer::GeometryStreamBuffer;
use crate::render::shading::{BackendResources, ShadingState};
use crate::render::sorter;
use crate::render::tess::TessBatch;
use crate::render::view::ViewParms;
use crate::scene::{CinematicPlayer, Scene, SortClass};

/// Per-frame statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    /// Views rendered, portal views included
    pub views: u32,
    /// Draw surfaces walked by the back end
    pub surfaces: u32,
    /// Batches shaded
    pub batches: u32,
    /// Vertexes shaded
    pub vertexes: u32,
    /// Indexes shaded
    pub indexes: u32,
    /// Indexes drawn over every stage and pass
    pub total_indexes: u32,
    /// Indexed draws issued
    pub draw_calls: u32,
    /// Vertexes redrawn by the light pass
    pub dlight_vertexes: u32,
    /// Indexes drawn by the light pass
    pub dlight_indexes: u32,
}

/// One committed view and its sorted surfaces
#[derive(Debug, Clone)]
pub struct DrawSurfsCommand {
    /// View the surfaces were collected for
    pub view: ViewParms,
    /// Surfaces in sort key order
    pub surfaces: Vec<DrawSurface>,
}

/// Mutable state reused from frame to frame
pub struct FrameContext {
    /// Stream memory for batch uploads
    pub geometry: GeometryStreamBuffer,
    /// Batch being accumulated
    pub tess: TessBatch,
    /// Surfaces of every view collected this frame
    pub draw_surfs: DrawSurfaceBuffer,
    /// Views committed this frame
    pub commands: Vec<DrawSurfsCommand>,
    /// Statistics of the current frame
    pub counters: FrameCounters,
    /// Command state carried between batches
    pub shading: ShadingState,
}

impl FrameContext {
    /// Frame state over caller-provided stream memory
    pub fn new(config: &RendererConfig, geometry: GeometryStreamBuffer) -> Self {
        Self {
            geometry,
            tess: TessBatch::new(config.tess),
            draw_surfs: DrawSurfaceBuffer::new(config.max_draw_surfs),
            commands: Vec::new(),
            counters: FrameCounters::default(),
            shading: ShadingState::default(),
        }
    }

    /// Frame state over host memory streams
    pub fn host(config: &RendererConfig) -> Self {
        Self::new(config, GeometryStreamBuffer::host(config.geometry))
    }

    /// Rewind everything for a new frame
    ///
    /// The caller must have waited for the GPU to finish with the stream
    /// memory of the previous use.
    pub fn begin_frame(&mut self) {
        self.geometry.reset();
        self.draw_surfs.clear();
        self.commands.clear();
        self.counters = FrameCounters::default();
        self.shading.reset();
    }
}

/// Builds and draws frames
pub struct FrameDriver {
    config: RendererConfig,
    resources: BackendResources,
}

impl FrameDriver {
    /// Create a driver; fails on an invalid configuration
    pub fn new(config: RendererConfig, resources: BackendResources) -> RenderResult<Self> {
        config.validate()?;
        log::debug!(
            "Frame driver ready: {} draw surfaces, tess {}/{}",
            config.max_draw_surfs,
            config.tess.max_vertexes,
            config.tess.max_indexes
        );
        Ok(Self { config, resources })
    }

    /// Active configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Pipelines and images used by the back end
    pub fn resources(&self) -> &BackendResources {
        &self.resources
    }

    /// Build and draw a whole frame from the primary view
    pub fn render_frame(
        &self,
        frame: &mut FrameContext,
        scene: &Scene<'_>,
        primary: ViewParms,
        sink: &mut dyn CommandSink,
        cinematics: &mut dyn CinematicPlayer,
    ) -> RenderResult<FrameCounters> {
        frame.begin_frame();
        self.render_view(frame, scene, primary)?;
        self.execute(frame, scene, sink, cinematics)?;

        log::trace!("Frame done: {:?}", frame.counters);
        Ok(frame.counters)
    }

    /// Collect, sort and commit one view
    ///
    /// A view with an empty viewport is skipped. A view without surfaces is
    /// still committed.
    pub fn render_view(&self, frame: &mut FrameContext, scene: &Scene<'_>, mut view: ViewParms) -> RenderResult<()> {
        if view.viewport.is_empty() {
            return Ok(());
        }
        frame.counters.views += 1;
        view.no_world_model |= scene.refdef.no_world_model();

        let first = frame.draw_surfs.count();

        view.rotate_for_viewer();
        view.setup_frustum();

        collector::add_world_surfaces(scene, &mut view, &mut frame.draw_surfs);
        collector::add_polygon_surfaces(scene, &mut frame.draw_surfs);

        // the far plane depends on the visible world bounds
        view.setup_projection(self.config.z_near);

        collector::add_entity_surfaces(scene, &view, &self.config, &mut frame.draw_surfs);

        let mut surfaces = frame.draw_surfs.take_since(first);
        sorter::sort_draw_surfaces(&mut surfaces);

        for surf in &surfaces {
            let key = surf.sort.decode();
            let shader = scene.shaders.by_sorted_index(key.shader);
            if shader.sort == SortClass::Bad {
                return Err(RenderError::BadSortClass {
                    shader: shader.name.clone(),
                });
            }
            if shader.sort > SortClass::Portal {
                break;
            }

            if self.mirror_view_by_surface(frame, scene, surf, &view)? {
                if self.config.portal_only {
                    return Ok(());
                }
                break;
            }
        }

        log::trace!("Committing view with {} surfaces", surfaces.len());
        frame.commands.push(DrawSurfsCommand { view, surfaces });
        Ok(())
    }

    /// Render the view seen through a portal surface; true when it triggered
    fn mirror_view_by_surface(
        &self,
        frame: &mut FrameContext,
        scene: &Scene<'_>,
        surf: &DrawSurface,
        view: &ViewParms,
    ) -> RenderResult<bool> {
        if view.is_portal {
            log::debug!("Recursive portal view refused");
            return Ok(false);
        }

        let entity = scene.entity(surf.sort.entity());
        let Some(mut portal) = scene.portals.portal_view(surf.surface, entity, view) else {
            return Ok(false);
        };
        portal.is_portal = true;

        self.render_view(frame, scene, portal)?;
        Ok(true)
    }

    /// Draw every committed view in commit order
    pub fn execute(
        &self,
        frame: &mut FrameContext,
        scene: &Scene<'_>,
        sink: &mut dyn CommandSink,
        cinematics: &mut dyn CinematicPlayer,
    ) -> RenderResult<()> {
        let commands = std::mem::take(&mut frame.commands);
        let mut result = Ok(());
        for command in &commands {
            result = backend::render_draw_surf_list(
                frame,
                scene,
                command,
                &mut *sink,
                &mut *cinematics,
                &self.config,
                &self.resources,
            );
            if result.is_err() {
                break;
            }
        }
        frame.commands = commands;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TessLimits;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RendererConfig::default().with_max_draw_surfs(1000);
        assert!(matches!(
            FrameDriver::new(config, BackendResources::default()),
            Err(RenderError::Config(_))
        ));
    }

    #[test]
    fn test_begin_frame_rewinds_state() {
        let config = RendererConfig::default()
            .with_max_draw_surfs(16)
            .with_tess_limits(TessLimits {
                max_vertexes: 8,
                max_indexes: 12,
            });
        let mut frame = FrameContext::host(&config);
        frame.counters.draw_calls = 5;
        frame.shading.depth_dirty = true;
        frame.draw_surfs.add(DrawSurface::default());

        frame.begin_frame();
        assert_eq!(frame.counters, FrameCounters::default());
        assert!(!frame.shading.depth_dirty);
        assert_eq!(frame.draw_surfs.count(), 0);
        assert_eq!(frame.tess.limits(), config.tess);
    }
}
