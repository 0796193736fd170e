//! # Frame Renderer
//!
//! Builds and draws one frame of a first-person scene on Vulkan: collects
//! the draw surfaces visible from each view, sorts them by a packed key,
//! batches surfaces that share a shader and shades every batch through its
//! stages plus the dynamic light and fog passes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_renderer::prelude::*;
//!
//! fn draw(scene: &Scene<'_>, camera: ViewParms) -> RenderResult<FrameCounters> {
//!     let config = RendererConfig::default();
//!     let driver = FrameDriver::new(config.clone(), BackendResources::default())?;
//!     let mut frame = FrameContext::host(&config);
//!     let mut sink = CommandLog::new();
//!     driver.render_frame(&mut frame, scene, camera, &mut sink, &mut NoCinematics)
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, GeometryBufferConfig, RendererConfig, TessLimits},
        foundation::math::{Aabb, Axis, Mat4, Vec3},
        render::{
            BackendResources, CommandLog, CommandSink, FrameContext, FrameCounters, FrameDriver,
            RenderError, RenderResult, ViewParms, Viewport,
        },
        scene::{
            CinematicPlayer, Dlight, FogTable, FogVolume, ModelSource, NoCinematics, NoPortals,
            PortalResolver, RefDef, RefEntity, Scene, Shader, ShaderTable, SortClass,
            SurfaceTessellator, WorldSurfaces,
        },
    };
}
