//! Command sink over a recording Vulkan command buffer

use ash::{vk, Device};

use crate::render::commands::CommandSink;

/// Records frame commands into a command buffer inside an active render pass
pub struct VulkanCommandSink<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
}

impl<'a> VulkanCommandSink<'a> {
    /// Wrap a command buffer in the recording state
    ///
    /// `pipeline_layout` must be compatible with every pipeline the frame
    /// binds: two combined image sampler sets and 128 bytes of vertex push
    /// constants.
    pub fn new(device: &'a Device, command_buffer: vk::CommandBuffer, pipeline_layout: vk::PipelineLayout) -> Self {
        Self {
            device,
            command_buffer,
            pipeline_layout,
        }
    }
}

impl CommandSink for VulkanCommandSink<'_> {
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, buffers, offsets);
        }
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, vk::IndexType::UINT32);
        }
    }

    fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                sets,
                &[],
            );
        }
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    fn set_depth_bias(&mut self, constant_factor: f32, clamp: f32, slope_factor: f32) {
        unsafe {
            self.device
                .cmd_set_depth_bias(self.command_buffer, constant_factor, clamp, slope_factor);
        }
    }

    fn clear_attachments(&mut self, clear_stencil: bool, area: vk::Rect2D) {
        let mut aspect_mask = vk::ImageAspectFlags::DEPTH;
        if clear_stencil {
            aspect_mask |= vk::ImageAspectFlags::STENCIL;
        }

        let attachment = vk::ClearAttachment {
            aspect_mask,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        };
        let rect = vk::ClearRect {
            rect: area,
            base_array_layer: 0,
            layer_count: 1,
        };

        unsafe {
            self.device
                .cmd_clear_attachments(self.command_buffer, &[attachment], &[rect]);
        }
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
    }

    fn push_constants(&mut self, offset: u32, data: &[u8]) {
        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                offset,
                data,
            );
        }
    }
}
