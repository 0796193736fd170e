//! Render error types
//!
//! Every variant except `Config` is fatal for the frame being built: the
//! frame driver returns it unchanged and the caller decides how to recover.

use ash::vk;
use std::fmt;

use crate::config::ConfigError;

/// Result type for frame rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Geometry sub-stream identifiers, used in overflow diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Vertex positions
    Position,
    /// Vertex colors
    Color,
    /// First texture coordinate set
    TexCoord0,
    /// Second texture coordinate set
    TexCoord1,
    /// Triangle indexes
    Index,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "position",
            Self::Color => "color",
            Self::TexCoord0 => "texcoord0",
            Self::TexCoord1 => "texcoord1",
            Self::Index => "index",
        };
        f.write_str(name)
    }
}

/// Errors that abort the current frame
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A geometry stream write would pass the end of its fixed region
    #[error("geometry buffer overflow ({stream}): {requested} bytes requested, {capacity} available")]
    StreamOverflow {
        /// Stream that overflowed
        stream: StreamKind,
        /// Write cursor plus incoming bytes
        requested: u64,
        /// Fixed size of the stream
        capacity: u64,
    },

    /// A tessellation batch would exceed its fixed vertex/index limits
    #[error("tessellation overflow: {vertexes} vertexes / {indexes} indexes exceed limits {max_vertexes} / {max_indexes}")]
    TessOverflow {
        /// Vertex count the batch would reach
        vertexes: u32,
        /// Index count the batch would reach
        indexes: u32,
        /// Vertex limit
        max_vertexes: u32,
        /// Index limit
        max_indexes: u32,
    },

    /// A draw surface references a shader with the invalid sort class
    #[error("shader '{shader}' has sort class Bad")]
    BadSortClass {
        /// Shader name
        shader: String,
    },

    /// A shader declares more stages than the executor walks
    #[error("shader '{shader}' declares {count} stages, limit is {max}")]
    TooManyStages {
        /// Shader name
        shader: String,
        /// Declared stage count
        count: usize,
        /// Stage limit
        max: usize,
    },

    /// More shaders than the sort key can address
    #[error("{count} shaders registered, sort key addresses {max}")]
    TooManyShaders {
        /// Registered shader count
        count: usize,
        /// Sort key capacity
        max: usize,
    },

    /// A shader table was built without any shader to fall back on
    #[error("shader table has no default shader")]
    NoDefaultShader,

    /// Vulkan API error
    #[error("Vulkan API error: {0:?}")]
    Vulkan(vk::Result),

    /// No memory type satisfies a stream allocation
    #[error("no suitable memory type for stream buffer")]
    NoSuitableMemoryType,

    /// Invalid renderer configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}
