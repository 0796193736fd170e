//! Vulkan adapter
//!
//! Binds the frame pipeline's seams to a real device: stream regions become
//! persistently mapped buffers and commands go into a recording command
//! buffer. Device, swapchain and pipeline creation stay with the caller.

pub mod buffer;
pub mod command_sink;

pub use buffer::MappedBuffer;
pub use command_sink::VulkanCommandSink;
