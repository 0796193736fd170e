//! Configuration system
//!
//! Renderer settings are plain serde structures that can be loaded from or
//! saved to TOML or RON files. They replace the runtime console variables
//! the frame pipeline consults (near plane, polygon offset, debug views)
//! and the fixed capacities of the per-frame buffers.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Fixed limits of one tessellation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TessLimits {
    /// Maximum vertexes accumulated for one draw
    pub max_vertexes: u32,
    /// Maximum indexes accumulated for one draw
    pub max_indexes: u32,
}

impl Default for TessLimits {
    fn default() -> Self {
        Self {
            max_vertexes: 1000,
            max_indexes: 6 * 1000,
        }
    }
}

/// # Geometry Stream Layout
///
/// The vertex buffer is split into four fixed sub-streams sized in units of
/// `vertex_chunk_size`: positions take four chunks (16 bytes per vertex),
/// colors one chunk (4 bytes), and each texture coordinate set two chunks
/// (8 bytes). Every sub-stream therefore holds the same number of vertexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryBufferConfig {
    /// Size unit of the vertex sub-streams, in bytes
    pub vertex_chunk_size: u64,
    /// Size of the index region, in bytes
    pub index_buffer_size: u64,
}

impl GeometryBufferConfig {
    /// Byte size of the position stream
    pub const fn xyz_size(&self) -> u64 {
        4 * self.vertex_chunk_size
    }

    /// Byte size of the color stream
    pub const fn color_size(&self) -> u64 {
        self.vertex_chunk_size
    }

    /// Byte size of one texture coordinate stream
    pub const fn st_size(&self) -> u64 {
        2 * self.vertex_chunk_size
    }

    /// Offset of the position stream inside the vertex region
    pub const fn xyz_offset(&self) -> u64 {
        0
    }

    /// Offset of the color stream inside the vertex region
    pub const fn color_offset(&self) -> u64 {
        self.xyz_offset() + self.xyz_size()
    }

    /// Offset of the first texture coordinate stream
    pub const fn st0_offset(&self) -> u64 {
        self.color_offset() + self.color_size()
    }

    /// Offset of the second texture coordinate stream
    pub const fn st1_offset(&self) -> u64 {
        self.st0_offset() + self.st_size()
    }

    /// Total byte size of the vertex region
    pub const fn vertex_buffer_size(&self) -> u64 {
        self.xyz_size() + self.color_size() + 2 * self.st_size()
    }
}

impl Default for GeometryBufferConfig {
    fn default() -> Self {
        Self {
            vertex_chunk_size: 768 * 1024,
            index_buffer_size: 2 * 1024 * 1024,
        }
    }
}

/// # Renderer Configuration
///
/// Tunables consulted while building and shading a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Near clip distance
    pub z_near: f32,
    /// Slope factor of the depth bias used by polygon-offset shaders
    pub offset_factor: f32,
    /// Constant factor of the depth bias used by polygon-offset shaders
    pub offset_units: f32,
    /// Draw sky surfaces at depth 0 instead of 1
    pub show_sky: bool,
    /// Replace base textures with white on multitextured stages and stop
    /// after the lightmap stage
    pub lightmap_only: bool,
    /// Render only the portal view when a portal triggers
    pub portal_only: bool,
    /// Collect entity surfaces at all
    pub draw_entities: bool,
    /// Stencil shadows are active; depth clears also clear stencil
    pub stencil_shadows: bool,
    /// Capacity of the draw-surface ring buffer (power of two)
    pub max_draw_surfs: usize,
    /// Tessellation batch limits
    pub tess: TessLimits,
    /// Geometry stream layout
    pub geometry: GeometryBufferConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            z_near: 4.0,
            offset_factor: -1.0,
            offset_units: -2.0,
            show_sky: false,
            lightmap_only: false,
            portal_only: false,
            draw_entities: true,
            stencil_shadows: false,
            max_draw_surfs: 0x10000,
            tess: TessLimits::default(),
            geometry: GeometryBufferConfig::default(),
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Set the near clip distance
    pub fn with_z_near(mut self, z_near: f32) -> Self {
        self.z_near = z_near;
        self
    }

    /// Set the draw-surface ring capacity
    pub fn with_max_draw_surfs(mut self, max_draw_surfs: usize) -> Self {
        self.max_draw_surfs = max_draw_surfs;
        self
    }

    /// Set the tessellation limits
    pub fn with_tess_limits(mut self, tess: TessLimits) -> Self {
        self.tess = tess;
        self
    }

    /// Set the geometry stream layout
    pub fn with_geometry(mut self, geometry: GeometryBufferConfig) -> Self {
        self.geometry = geometry;
        self
    }

    /// Enable or disable the portal-only debug view
    pub fn with_portal_only(mut self, portal_only: bool) -> Self {
        self.portal_only = portal_only;
        self
    }

    /// Enable or disable the lightmap-only debug view
    pub fn with_lightmap_only(mut self, lightmap_only: bool) -> Self {
        self.lightmap_only = lightmap_only;
        self
    }

    /// Check the values the frame pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_draw_surfs.is_power_of_two() {
            return Err(ConfigError::Invalid {
                field: "max_draw_surfs",
                reason: format!("{} is not a power of two", self.max_draw_surfs),
            });
        }
        if self.tess.max_vertexes == 0 || self.tess.max_indexes < 3 {
            return Err(ConfigError::Invalid {
                field: "tess",
                reason: format!("{:?} cannot hold a triangle", self.tess),
            });
        }
        if self.geometry.vertex_chunk_size == 0 || self.geometry.index_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "geometry",
                reason: "stream regions must not be empty".to_string(),
            });
        }
        if self.z_near <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "z_near",
                reason: format!("{} must be positive", self.z_near),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let geometry = GeometryBufferConfig::default();
        assert_eq!(geometry.color_offset(), 4 * 768 * 1024);
        assert_eq!(geometry.st1_offset() + geometry.st_size(), geometry.vertex_buffer_size());
        // every sub-stream holds the same vertex count
        assert_eq!(geometry.xyz_size() / 16, geometry.color_size() / 4);
        assert_eq!(geometry.st_size() / 8, geometry.color_size() / 4);
    }

    #[test]
    fn test_validate() {
        assert!(RendererConfig::default().validate().is_ok());
        assert!(RendererConfig::default().with_max_draw_surfs(1000).validate().is_err());
        assert!(RendererConfig::default().with_z_near(0.0).validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_overrides() {
        let config = RendererConfig::default().with_portal_only(true).with_max_draw_surfs(256);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_then_load_through_files() {
        let config = RendererConfig::default()
            .with_lightmap_only(true)
            .with_max_draw_surfs(512)
            .with_z_near(2.0);
        let dir = std::env::temp_dir();

        for ext in ["toml", "ron"] {
            let path = dir.join(format!("frame_renderer_config_{}.{ext}", std::process::id()));
            let path = path.to_str().unwrap();
            config.save_to_file(path).unwrap();
            let loaded = RendererConfig::load_from_file(path).unwrap();
            std::fs::remove_file(path).unwrap();
            assert_eq!(loaded, config);
        }

        assert!(matches!(
            config.save_to_file("renderer.yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            RendererConfig::load_from_file("/nonexistent/renderer.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed: RendererConfig = ron::from_str("(show_sky: true)").unwrap();
        assert!(parsed.show_sky);
        assert_eq!(parsed.max_draw_surfs, 0x10000);
    }
}
