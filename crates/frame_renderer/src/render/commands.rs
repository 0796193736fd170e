//! GPU command submission seam
//!
//! The frame pipeline never talks to a command buffer directly. Everything
//! it issues goes through [`CommandSink`], which the Vulkan adapter
//! implements over a recording command buffer and [`CommandLog`] implements
//! by recording plain values for inspection.
//!
//! # Design Philosophy
//!
//! - Sinks are passive: they neither reorder nor filter commands
//! - Push constants are raw bytes, at most 128 per call

use ash::vk;

/// Receiver of the commands issued while shading a frame
pub trait CommandSink {
    /// Bind vertex streams starting at `first_binding`
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]);

    /// Bind the 32-bit index stream
    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize);

    /// Bind texture descriptor sets starting at set 0
    fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet]);

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);

    /// Set the viewport, depth range included
    fn set_viewport(&mut self, viewport: vk::Viewport);

    /// Set the depth bias
    fn set_depth_bias(&mut self, constant_factor: f32, clamp: f32, slope_factor: f32);

    /// Clear depth (and stencil) inside `area`
    fn clear_attachments(&mut self, clear_stencil: bool, area: vk::Rect2D);

    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32, first_vertex: u32);

    /// Indexed draw from the bound index stream
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32);

    /// Update vertex-stage push constants
    fn push_constants(&mut self, offset: u32, data: &[u8]);
}

/// A command captured by [`CommandLog`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `bind_vertex_buffers`
    BindVertexBuffers {
        /// First binding slot
        first_binding: u32,
        /// Byte offsets, one per buffer
        offsets: Vec<vk::DeviceSize>,
    },
    /// `bind_index_buffer`
    BindIndexBuffer {
        /// Byte offset
        offset: vk::DeviceSize,
    },
    /// `bind_descriptor_sets`
    BindDescriptorSets(Vec<vk::DescriptorSet>),
    /// `bind_pipeline`
    BindPipeline(vk::Pipeline),
    /// `set_viewport`
    SetViewport {
        /// x, y, width, height
        rect: [f32; 4],
        /// Minimum depth
        min_depth: f32,
        /// Maximum depth
        max_depth: f32,
    },
    /// `set_depth_bias`
    SetDepthBias {
        /// Constant factor
        constant_factor: f32,
        /// Slope factor
        slope_factor: f32,
    },
    /// `clear_attachments`
    ClearAttachments {
        /// Stencil cleared too
        stencil: bool,
    },
    /// `draw`
    Draw {
        /// Vertex count
        vertex_count: u32,
    },
    /// `draw_indexed`
    DrawIndexed {
        /// Index count
        index_count: u32,
    },
    /// `push_constants`
    PushConstants(Vec<f32>),
}

/// A sink that records commands instead of submitting them
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    /// Commands in issue order
    pub commands: Vec<RecordedCommand>,
}

impl CommandLog {
    /// An empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Index counts of every indexed draw
    pub fn draws(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    /// Pipelines in bind order
    pub fn pipelines(&self) -> Vec<vk::Pipeline> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BindPipeline(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Forget everything recorded
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandSink for CommandLog {
    fn bind_vertex_buffers(&mut self, first_binding: u32, _buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        self.commands.push(RecordedCommand::BindVertexBuffers {
            first_binding,
            offsets: offsets.to_vec(),
        });
    }

    fn bind_index_buffer(&mut self, _buffer: vk::Buffer, offset: vk::DeviceSize) {
        self.commands.push(RecordedCommand::BindIndexBuffer { offset });
    }

    fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet]) {
        self.commands.push(RecordedCommand::BindDescriptorSets(sets.to_vec()));
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.commands.push(RecordedCommand::SetViewport {
            rect: [viewport.x, viewport.y, viewport.width, viewport.height],
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        });
    }

    fn set_depth_bias(&mut self, constant_factor: f32, _clamp: f32, slope_factor: f32) {
        self.commands.push(RecordedCommand::SetDepthBias {
            constant_factor,
            slope_factor,
        });
    }

    fn clear_attachments(&mut self, clear_stencil: bool, _area: vk::Rect2D) {
        self.commands.push(RecordedCommand::ClearAttachments {
            stencil: clear_stencil,
        });
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) {
        self.commands.push(RecordedCommand::Draw { vertex_count });
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) {
        self.commands.push(RecordedCommand::DrawIndexed { index_count });
    }

    fn push_constants(&mut self, _offset: u32, data: &[u8]) {
        let floats = data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        self.commands.push(RecordedCommand::PushConstants(floats));
    }
}
