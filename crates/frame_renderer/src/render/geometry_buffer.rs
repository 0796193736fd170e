//! # Geometry Stream Buffer
//!
//! Two fixed regions of host-visible memory receive every vertex and index
//! drawn in a frame. The vertex region is split into four sub-streams:
//!
//! ```text
//! | xyz (4 chunks) | color (1) | st0 (2) | st1 (2) |
//! ```
//!
//! Writes append at increasing offsets and never wrap. A write that would
//! pass the end of its sub-stream aborts the frame with
//! [`RenderError::StreamOverflow`]. At frame start the cursors rewind to
//! zero; the memory itself is never reallocated.

use ash::vk;

use crate::config::{ConfigError, GeometryBufferConfig};
use crate::render::error::{RenderError, RenderResult, StreamKind};

const XYZ_STRIDE: u64 = std::mem::size_of::<[f32; 4]>() as u64;
const COLOR_STRIDE: u64 = std::mem::size_of::<[u8; 4]>() as u64;
const ST_STRIDE: u64 = std::mem::size_of::<[f32; 2]>() as u64;
const INDEX_STRIDE: u64 = std::mem::size_of::<u32>() as u64;

/// Writable memory backing one stream region
pub trait StreamRegion {
    /// Buffer to bind when drawing from this region
    fn handle(&self) -> vk::Buffer;

    /// The mapped bytes
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Size in bytes
    fn size(&self) -> u64;
}

/// Plain host memory standing in for a mapped GPU region
#[derive(Debug, Clone)]
pub struct HostRegion {
    data: Vec<u8>,
}

impl HostRegion {
    /// Allocate a zeroed region
    pub fn new(size: u64) -> Self {
        Self {
            data: vec![0; size as usize],
        }
    }

    /// The written bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl StreamRegion for HostRegion {
    fn handle(&self) -> vk::Buffer {
        vk::Buffer::null()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A buffer and offset ready for binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBinding {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Byte offset of the written data
    pub offset: vk::DeviceSize,
}

/// Offsets of the per-stage attributes of one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    /// Vertex region handle
    pub buffer: vk::Buffer,
    /// Color, st0 and st1 offsets
    pub offsets: [vk::DeviceSize; 3],
    /// 2 without a second texture unit, 3 with one
    pub count: usize,
}

impl AttributeBinding {
    /// Buffers to pass to `bind_vertex_buffers`
    pub fn buffers(&self) -> [vk::Buffer; 3] {
        [self.buffer; 3]
    }
}

/// Append-only per-frame vertex and index streams
pub struct GeometryStreamBuffer {
    layout: GeometryBufferConfig,
    vertex: Box<dyn StreamRegion>,
    index: Box<dyn StreamRegion>,
    xyz_elements: u64,
    color_st_elements: u64,
    index_offset: u64,
}

impl GeometryStreamBuffer {
    /// Wrap two regions laid out according to `layout`
    pub fn new(
        layout: GeometryBufferConfig,
        vertex: Box<dyn StreamRegion>,
        index: Box<dyn StreamRegion>,
    ) -> RenderResult<Self> {
        if vertex.size() < layout.vertex_buffer_size() || index.size() < layout.index_buffer_size {
            return Err(ConfigError::Invalid {
                field: "geometry",
                reason: format!(
                    "regions of {} / {} bytes cannot hold layout {} / {}",
                    vertex.size(),
                    index.size(),
                    layout.vertex_buffer_size(),
                    layout.index_buffer_size
                ),
            }
            .into());
        }

        Ok(Self {
            layout,
            vertex,
            index,
            xyz_elements: 0,
            color_st_elements: 0,
            index_offset: 0,
        })
    }

    /// Streams backed by host memory
    pub fn host(layout: GeometryBufferConfig) -> Self {
        Self {
            layout,
            vertex: Box::new(HostRegion::new(layout.vertex_buffer_size())),
            index: Box::new(HostRegion::new(layout.index_buffer_size)),
            xyz_elements: 0,
            color_st_elements: 0,
            index_offset: 0,
        }
    }

    /// Rewind every cursor for a new frame
    pub fn reset(&mut self) {
        self.xyz_elements = 0;
        self.color_st_elements = 0;
        self.index_offset = 0;
    }

    /// Region layout
    pub fn layout(&self) -> &GeometryBufferConfig {
        &self.layout
    }

    /// Vertex region handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex.handle()
    }

    /// Index region handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index.handle()
    }

    /// Current write offset of the index region
    pub fn index_offset(&self) -> u64 {
        self.index_offset
    }

    /// Vertexes written to the position stream this frame
    pub fn position_count(&self) -> u64 {
        self.xyz_elements
    }

    /// Vertexes written to the color and texcoord streams this frame
    pub fn attribute_count(&self) -> u64 {
        self.color_st_elements
    }

    /// Append positions; returns where they landed
    pub fn upload_positions(&mut self, xyz: &[[f32; 4]]) -> RenderResult<StreamBinding> {
        let cursor = self.xyz_elements * XYZ_STRIDE;
        let size = xyz.len() as u64 * XYZ_STRIDE;
        check_fits(StreamKind::Position, cursor, size, self.layout.xyz_size())?;

        let offset = self.layout.xyz_offset() + cursor;
        write_at(self.vertex.as_mut(), offset, bytemuck::cast_slice(xyz));
        self.xyz_elements += xyz.len() as u64;

        Ok(StreamBinding {
            buffer: self.vertex.handle(),
            offset,
        })
    }

    /// Append triangle indexes; returns where they landed
    pub fn upload_indexes(&mut self, indexes: &[u32]) -> RenderResult<StreamBinding> {
        let offset = self.index_offset;
        let size = indexes.len() as u64 * INDEX_STRIDE;
        check_fits(StreamKind::Index, offset, size, self.layout.index_buffer_size)?;

        write_at(self.index.as_mut(), offset, bytemuck::cast_slice(indexes));
        self.index_offset += size;

        Ok(StreamBinding {
            buffer: self.index.handle(),
            offset,
        })
    }

    /// Append per-stage colors and texture coordinates
    ///
    /// All three streams share one element cursor; `st1` is written only for
    /// multitextured stages.
    pub fn upload_attributes(
        &mut self,
        colors: &[[u8; 4]],
        st0: &[[f32; 2]],
        st1: Option<&[[f32; 2]]>,
    ) -> RenderResult<AttributeBinding> {
        let count = colors.len() as u64;
        let base = self.color_st_elements;

        check_fits(
            StreamKind::Color,
            base * COLOR_STRIDE,
            count * COLOR_STRIDE,
            self.layout.color_size(),
        )?;
        check_fits(
            StreamKind::TexCoord0,
            base * ST_STRIDE,
            count * ST_STRIDE,
            self.layout.st_size(),
        )?;
        if st1.is_some() {
            check_fits(
                StreamKind::TexCoord1,
                base * ST_STRIDE,
                count * ST_STRIDE,
                self.layout.st_size(),
            )?;
        }

        let offsets = [
            self.layout.color_offset() + base * COLOR_STRIDE,
            self.layout.st0_offset() + base * ST_STRIDE,
            self.layout.st1_offset() + base * ST_STRIDE,
        ];

        write_at(self.vertex.as_mut(), offsets[0], bytemuck::cast_slice(colors));
        write_at(self.vertex.as_mut(), offsets[1], bytemuck::cast_slice(&st0[..colors.len()]));
        if let Some(st1) = st1 {
            write_at(self.vertex.as_mut(), offsets[2], bytemuck::cast_slice(&st1[..colors.len()]));
        }
        self.color_st_elements += count;

        Ok(AttributeBinding {
            buffer: self.vertex.handle(),
            offsets,
            count: if st1.is_some() { 3 } else { 2 },
        })
    }
}

fn check_fits(stream: StreamKind, cursor: u64, size: u64, capacity: u64) -> RenderResult<()> {
    if cursor + size > capacity {
        return Err(RenderError::StreamOverflow {
            stream,
            requested: cursor + size,
            capacity,
        });
    }
    Ok(())
}

fn write_at(region: &mut dyn StreamRegion, offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    region.bytes_mut()[start..start + bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> GeometryBufferConfig {
        GeometryBufferConfig {
            vertex_chunk_size: 64,
            index_buffer_size: 64,
        }
    }

    #[test]
    fn test_positions_append_and_overflow() {
        let mut geometry = GeometryStreamBuffer::host(small_layout());
        // xyz stream holds 256 / 16 = 16 vertexes
        let first = geometry.upload_positions(&[[1.0; 4]; 10]).unwrap();
        let second = geometry.upload_positions(&[[2.0; 4]; 6]).unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 160);

        let err = geometry.upload_positions(&[[3.0; 4]]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::StreamOverflow {
                stream: StreamKind::Position,
                requested: 272,
                capacity: 256
            }
        ));

        geometry.reset();
        assert_eq!(geometry.upload_positions(&[[3.0; 4]]).unwrap().offset, 0);
    }

    #[test]
    fn test_indexes_exactly_fill_region() {
        let mut geometry = GeometryStreamBuffer::host(small_layout());
        assert!(geometry.upload_indexes(&[0; 16]).is_ok());
        assert_eq!(geometry.index_offset(), 64);
        assert!(matches!(
            geometry.upload_indexes(&[0]),
            Err(RenderError::StreamOverflow { stream: StreamKind::Index, .. })
        ));
    }

    #[test]
    fn test_attribute_offsets_share_cursor() {
        let mut geometry = GeometryStreamBuffer::host(small_layout());
        let colors = [[255u8, 0, 0, 255]; 4];
        let st = [[0.5f32, 0.25]; 4];

        let first = geometry.upload_attributes(&colors, &st, None).unwrap();
        assert_eq!(first.count, 2);
        assert_eq!(first.offsets[0], small_layout().color_offset());

        let second = geometry.upload_attributes(&colors, &st, Some(&st)).unwrap();
        assert_eq!(second.count, 3);
        assert_eq!(second.offsets[0], small_layout().color_offset() + 16);
        assert_eq!(second.offsets[1], small_layout().st0_offset() + 32);
        assert_eq!(second.offsets[2], small_layout().st1_offset() + 32);
        assert_eq!(geometry.attribute_count(), 8);
    }

    #[test]
    fn test_undersized_region_is_rejected() {
        let layout = small_layout();
        let result = GeometryStreamBuffer::new(
            layout,
            Box::new(HostRegion::new(layout.vertex_buffer_size() - 1)),
            Box::new(HostRegion::new(layout.index_buffer_size)),
        );
        assert!(matches!(result, Err(RenderError::Config(_))));
    }
}
