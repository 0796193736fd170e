//! # Draw Surfaces
//!
//! A draw surface pairs a packed sort key with a handle to the geometry it
//! draws. Surfaces of every view rendered in a frame accumulate in one
//! fixed-capacity ring; each view takes the slice it appended.

use crate::render::sort_key::SortKey;
use crate::scene::{ModelHandle, Shader, ShaderHandle, ShaderTable};

/// The geometry behind a draw surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceHandle {
    /// World surface by index
    World(u32),
    /// Procedural surface of the entity named in the sort key
    #[default]
    Entity,
    /// Surface of a model
    Model {
        /// Owning model
        model: ModelHandle,
        /// Surface index inside the model
        surface: u32,
    },
    /// Client polygon by index
    Poly(u32),
}

/// One renderable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DrawSurface {
    /// Packed sort key
    pub sort: SortKey,
    /// Geometry to tessellate
    pub surface: SurfaceHandle,
}

/// Fixed-capacity ring of draw surfaces
///
/// The write index wraps at capacity while the total count keeps growing, so
/// a view that appends more than the capacity keeps only its most recent
/// surfaces.
#[derive(Debug, Clone)]
pub struct DrawSurfaceBuffer {
    surfs: Vec<DrawSurface>,
    mask: usize,
    count: usize,
}

impl DrawSurfaceBuffer {
    /// Create a ring; `capacity` must be a power of two
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            surfs: vec![DrawSurface::default(); capacity],
            mask: capacity - 1,
            count: 0,
        }
    }

    /// Append a surface, overwriting the oldest one once full
    pub fn add(&mut self, surf: DrawSurface) {
        self.surfs[self.count & self.mask] = surf;
        self.count += 1;
    }

    /// Total surfaces appended since the last clear
    pub fn count(&self) -> usize {
        self.count
    }

    /// Ring capacity
    pub fn capacity(&self) -> usize {
        self.surfs.len()
    }

    /// Copy out the surfaces appended since `first`
    ///
    /// When more than the capacity were appended the oldest are lost and a
    /// warning is logged.
    pub fn take_since(&self, first: usize) -> Vec<DrawSurface> {
        let mut first = first.min(self.count);
        if self.count - first > self.surfs.len() {
            log::warn!(
                "Draw surface buffer overflow: {} surfaces added, keeping the last {}",
                self.count - first,
                self.surfs.len()
            );
            first = self.count - self.surfs.len();
        }
        (first..self.count).map(|i| self.surfs[i & self.mask]).collect()
    }

    /// Rewind for a new frame
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

/// Appends surfaces for one entity
pub struct SurfaceSink<'a> {
    buffer: &'a mut DrawSurfaceBuffer,
    shaders: &'a ShaderTable,
    entity_num: u32,
}

impl<'a> SurfaceSink<'a> {
    /// A sink tagging surfaces with `entity_num`
    pub fn new(buffer: &'a mut DrawSurfaceBuffer, shaders: &'a ShaderTable, entity_num: u32) -> Self {
        Self {
            buffer,
            shaders,
            entity_num,
        }
    }

    /// Retarget the sink at another entity
    pub fn set_entity(&mut self, entity_num: u32) {
        self.entity_num = entity_num;
    }

    /// Entity the sink currently tags surfaces with
    pub fn entity(&self) -> u32 {
        self.entity_num
    }

    /// The shader table, for providers that resolve shaders by name
    pub fn shaders(&self) -> &'a ShaderTable {
        self.shaders
    }

    /// Append a surface drawn with a registered shader
    pub fn add(&mut self, surface: SurfaceHandle, shader: ShaderHandle, fog_num: u32, dlight: bool) {
        let shader = self.shaders.get(shader);
        self.add_with_shader(surface, shader, fog_num, dlight);
    }

    /// Append a surface drawn with an already resolved shader
    pub fn add_with_shader(&mut self, surface: SurfaceHandle, shader: &Shader, fog_num: u32, dlight: bool) {
        let sort = SortKey::encode(shader.sorted_index, self.entity_num, fog_num, u32::from(dlight));
        self.buffer.add(DrawSurface { sort, surface });
    }
}
