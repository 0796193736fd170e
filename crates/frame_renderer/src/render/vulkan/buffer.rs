//! Persistently mapped stream buffers
//!
//! Memory management following RAII patterns: the buffer, its memory and
//! the mapping live and die together.

use ash::{vk, Device, Instance};

use crate::render::error::{RenderError, RenderResult};
use crate::render::geometry_buffer::StreamRegion;

/// Host-visible, host-coherent buffer mapped for its whole lifetime
pub struct MappedBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: *mut u8,
}

impl MappedBuffer {
    /// Create, allocate, bind and map a buffer
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> RenderResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(RenderError::Vulkan)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            instance,
            physical_device,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            device.allocate_memory(&alloc_info, None).map_err(|e| {
                device.destroy_buffer(buffer, None);
                RenderError::Vulkan(e)
            })?
        };

        let mapped = unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|()| device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()))
                .map_err(|e| {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                    RenderError::Vulkan(e)
                })?
        };

        log::debug!("Created mapped stream buffer: {} bytes, usage {:?}", size, usage);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: mapped.cast::<u8>(),
        })
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl StreamRegion for MappedBuffer {
    fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // the mapping covers `size` bytes until drop and is only reachable
        // through this exclusive borrow
        unsafe { std::slice::from_raw_parts_mut(self.mapped, self.size as usize) }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        log::debug!("Destroying mapped stream buffer ({} bytes)", self.size);
        unsafe {
            self.device.unmap_memory(self.memory);
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    let mem_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(RenderError::NoSuitableMemoryType)
}
