//! # Rendering System
//!
//! The per-frame pipeline: view setup, surface collection, sorting and
//! multi-pass shading into a command sink.
//!
//! ## Architecture
//!
//! ```text
//! FrameDriver
//!   ├─ view          camera transform, frustum, projection
//!   ├─ collector     world, polygon and entity surfaces → DrawSurfaceBuffer
//!   ├─ sorter        ascending by SortKey
//!   └─ backend       batches → shading → effects → CommandSink
//!                                   └─ GeometryStreamBuffer uploads
//! ```
//!
//! The Vulkan adapter in [`vulkan`] implements the two seams that touch the
//! device: [`CommandSink`] and [`StreamRegion`].

pub mod backend;
pub mod collector;
pub mod commands;
pub mod draw_surface;
pub mod effects;
pub mod error;
pub mod frame;
pub mod geometry_buffer;
pub mod shading;
pub mod sort_key;
pub mod sorter;
pub mod tess;
pub mod view;
pub mod vulkan;

pub use commands::{CommandLog, CommandSink, RecordedCommand};
pub use draw_surface::{DrawSurface, DrawSurfaceBuffer, SurfaceHandle, SurfaceSink};
pub use error::{RenderError, RenderResult, StreamKind};
pub use frame::{DrawSurfsCommand, FrameContext, FrameCounters, FrameDriver};
pub use geometry_buffer::{GeometryStreamBuffer, HostRegion, StreamBinding, StreamRegion};
pub use shading::{BackendResources, DepthRange, GlobalPipelines, SpecialImages};
pub use sort_key::{SortKey, ENTITY_NUM_WORLD};
pub use tess::{TessBatch, TessVertex};
pub use view::{Orientation, ViewParms, Viewport};
