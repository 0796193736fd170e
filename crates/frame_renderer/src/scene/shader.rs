//! # Shader Descriptors
//!
//! Shaders are produced by the asset layer and consumed read-only by the
//! frame pipeline. A shader is an ordered list of stages; each stage binds up
//! to two texture bundles and carries the pipelines used for normal, mirror
//! and portal views.

use ash::vk;
use bitflags::bitflags;

use crate::foundation::math::Vec3;
use crate::render::error::{RenderError, RenderResult};
use crate::render::sort_key::MAX_SHADERS;

/// Maximum number of stages the stage executor walks
pub const MAX_SHADER_STAGES: usize = 8;

/// Coarse draw ordering class of a shader
///
/// Classes at or below `Portal` are inspected for mirror/portal recursion;
/// `Bad` must never reach the sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SortClass {
    /// Invalid class
    Bad = 0,
    /// Mirrors and portals
    Portal,
    /// Sky box
    Environment,
    /// Solid geometry
    Opaque,
    /// Decals on opaque geometry
    Decal,
    /// Alpha tested geometry
    SeeThrough,
    /// Banners
    Banner,
    /// Fog volume surfaces
    Fog,
    /// Underwater surfaces
    Underwater,
    /// First blend group
    Blend0,
    /// Second blend group
    Blend1,
    /// Third blend group
    Blend2,
    /// Fourth blend group
    Blend3,
    /// Seventh blend group
    Blend6,
    /// Stencil shadow volumes
    StencilShadow,
    /// Drawn just before `Nearest`
    AlmostNearest,
    /// Drawn last (view weapons, flares)
    Nearest,
}

/// Face culling mode of a shader; indexes the effect pipeline tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullType {
    /// Cull front faces
    #[default]
    Front,
    /// Cull back faces
    Back,
    /// No culling
    TwoSided,
}

impl CullType {
    /// Index into `[_; 3]` pipeline tables
    pub const fn index(self) -> usize {
        match self {
            Self::Front => 0,
            Self::Back => 1,
            Self::TwoSided => 2,
        }
    }
}

/// Which fog pipeline a shader's fog pass uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FogPass {
    /// No fog contribution
    #[default]
    None,
    /// Depth test equal
    Equal,
    /// Depth test less-or-equal
    LessEqual,
}

impl FogPass {
    /// Ordinal of the pass; 0 means no fog
    pub const fn ordinal(self) -> usize {
        match self {
            Self::None => 0,
            Self::Equal => 1,
            Self::LessEqual => 2,
        }
    }
}

bitflags! {
    /// Surface flags relevant to the shading passes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        /// Sky surface
        const SKY = 0x4;
        /// Never receives dynamic lights
        const NODLIGHT = 0x20000;
    }
}

/// Periodic function shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveFunc {
    /// Sine
    Sin,
    /// Square wave, +1 then -1
    Square,
    /// Triangle wave, 0 to 1 to -1 and back
    Triangle,
    /// Rising ramp 0..1
    Sawtooth,
    /// Falling ramp 1..0
    InverseSawtooth,
}

/// A time-driven waveform `base + amplitude * f(phase + time * frequency)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    /// Shape
    pub func: WaveFunc,
    /// Constant offset
    pub base: f32,
    /// Scale of the periodic part
    pub amplitude: f32,
    /// Phase offset in cycles
    pub phase: f32,
    /// Cycles per second
    pub frequency: f32,
}

impl Waveform {
    /// Evaluate at `time` with an extra phase offset
    pub fn evaluate(&self, time: f32, phase_offset: f32) -> f32 {
        let cycle = (self.phase + phase_offset + time * self.frequency).rem_euclid(1.0);
        let value = match self.func {
            WaveFunc::Sin => (cycle * std::f32::consts::TAU).sin(),
            WaveFunc::Square => {
                if cycle < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveFunc::Triangle => {
                if cycle < 0.25 {
                    cycle * 4.0
                } else if cycle < 0.75 {
                    2.0 - cycle * 4.0
                } else {
                    cycle * 4.0 - 4.0
                }
            }
            WaveFunc::Sawtooth => cycle,
            WaveFunc::InverseSawtooth => 1.0 - cycle,
        };
        self.base + self.amplitude * value
    }
}

/// Vertex deformation applied before upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deform {
    /// Offset every vertex along its normal; `spread` varies phase by position
    Wave {
        /// Phase change per world unit
        spread: f32,
        /// Offset waveform
        wave: Waveform,
    },
    /// Translate every vertex along a fixed vector
    Move {
        /// Direction and scale of the motion
        vector: Vec3,
        /// Motion waveform
        wave: Waveform,
    },
}

/// Stage color source
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ColorGen {
    /// Full white
    #[default]
    Identity,
    /// Fixed color
    Const([u8; 3]),
    /// Per-vertex color
    Vertex,
    /// Per-vertex color, unscaled
    ExactVertex,
    /// Inverse of the per-vertex color
    OneMinusVertex,
    /// Gray level from a waveform
    Wave(Waveform),
}

/// Stage alpha source
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlphaGen {
    /// Opaque
    #[default]
    Identity,
    /// Keep whatever the color generator produced
    Skip,
    /// Fixed alpha
    Const(u8),
    /// Per-vertex alpha
    Vertex,
    /// Inverse of the per-vertex alpha
    OneMinusVertex,
}

/// Texture coordinate source of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TexCoordGen {
    /// Surface texture coordinates
    #[default]
    Texture,
    /// Surface lightmap coordinates
    Lightmap,
    /// Projection of the position onto two vectors
    Vector([Vec3; 2]),
    /// Reflection of the view vector
    EnvironmentMapped,
}

/// Texture coordinate modifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexMod {
    /// Scroll by `speed` units per second, wrapped to [0, 1)
    Scroll([f32; 2]),
    /// Multiply coordinates
    Scale([f32; 2]),
}

/// Handle of an external cinematic stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CinematicHandle(pub u32);

/// Images bound to one texture unit of a stage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureBundle {
    /// Animation frames; empty means the unit is unused
    pub images: Vec<vk::DescriptorSet>,
    /// Animation frames per second
    pub animation_speed: f32,
    /// Coordinate source
    pub tc_gen: TexCoordGen,
    /// Coordinate modifiers, applied in order
    pub tc_mods: Vec<TexMod>,
    /// The bundle samples a lightmap
    pub is_lightmap: bool,
    /// Video texture decoded by the cinematic player
    pub video_map: Option<CinematicHandle>,
}

impl TextureBundle {
    /// A single static image
    pub fn image(image: vk::DescriptorSet) -> Self {
        Self {
            images: vec![image],
            ..Self::default()
        }
    }

    /// A lightmap image sampled with lightmap coordinates
    pub fn lightmap(image: vk::DescriptorSet) -> Self {
        Self {
            images: vec![image],
            tc_gen: TexCoordGen::Lightmap,
            is_lightmap: true,
            ..Self::default()
        }
    }

    /// A looping frame animation
    pub fn animated(frames: Vec<vk::DescriptorSet>, speed: f32) -> Self {
        Self {
            images: frames,
            animation_speed: speed,
            ..Self::default()
        }
    }

    /// True if the bundle binds anything
    pub fn is_active(&self) -> bool {
        !self.images.is_empty() || self.video_map.is_some()
    }
}

/// One shading stage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderStage {
    /// Base (0) and secondary (1) texture units
    pub bundles: [TextureBundle; 2],
    /// Color generator
    pub rgb_gen: ColorGen,
    /// Alpha generator
    pub alpha_gen: AlphaGen,
    /// Pipeline for normal views
    pub pipeline: vk::Pipeline,
    /// Pipeline variant for mirror views
    pub mirror_pipeline: vk::Pipeline,
    /// Pipeline variant for portal views
    pub portal_pipeline: vk::Pipeline,
}

impl ShaderStage {
    /// A stage drawing `base` with the given pipeline for all view kinds
    pub fn new(base: TextureBundle, pipeline: vk::Pipeline) -> Self {
        Self {
            bundles: [base, TextureBundle::default()],
            pipeline,
            mirror_pipeline: pipeline,
            portal_pipeline: pipeline,
            ..Self::default()
        }
    }

    /// Add a secondary texture unit
    pub fn with_second_bundle(mut self, bundle: TextureBundle) -> Self {
        self.bundles[1] = bundle;
        self
    }

    /// Set the mirror and portal pipeline variants
    pub fn with_view_pipelines(mut self, mirror: vk::Pipeline, portal: vk::Pipeline) -> Self {
        self.mirror_pipeline = mirror;
        self.portal_pipeline = portal;
        self
    }

    /// Set the color and alpha generators
    pub fn with_color(mut self, rgb_gen: ColorGen, alpha_gen: AlphaGen) -> Self {
        self.rgb_gen = rgb_gen;
        self.alpha_gen = alpha_gen;
        self
    }

    /// True when the second texture unit is bound
    pub fn is_multitextured(&self) -> bool {
        self.bundles[1].images.first().is_some()
    }
}

/// A loaded shader
#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    /// Shader name, for diagnostics
    pub name: String,
    /// Position in the sort-class ordered table; assigned by [`ShaderTable`]
    pub sorted_index: u32,
    /// Sort class
    pub sort: SortClass,
    /// Face culling
    pub cull: CullType,
    /// Apply depth bias
    pub polygon_offset: bool,
    /// Fog pass pipeline selector
    pub fog_pass: FogPass,
    /// Sky shader
    pub is_sky: bool,
    /// Surface flags
    pub surface_flags: SurfaceFlags,
    /// Vertex deforms
    pub deforms: Vec<Deform>,
    /// Stages, drawn in order
    pub stages: Vec<ShaderStage>,
}

impl Shader {
    /// A shader with no stages
    pub fn new(name: impl Into<String>, sort: SortClass) -> Self {
        Self {
            name: name.into(),
            sorted_index: 0,
            sort,
            cull: CullType::default(),
            polygon_offset: false,
            fog_pass: FogPass::default(),
            is_sky: false,
            surface_flags: SurfaceFlags::empty(),
            deforms: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn with_stage(mut self, stage: ShaderStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set face culling
    pub fn with_cull(mut self, cull: CullType) -> Self {
        self.cull = cull;
        self
    }

    /// Set the fog pass selector
    pub fn with_fog_pass(mut self, fog_pass: FogPass) -> Self {
        self.fog_pass = fog_pass;
        self
    }

    /// Enable depth bias
    pub fn with_polygon_offset(mut self) -> Self {
        self.polygon_offset = true;
        self
    }

    /// Mark as sky
    pub fn with_sky(mut self) -> Self {
        self.is_sky = true;
        self.surface_flags |= SurfaceFlags::SKY;
        self
    }

    /// Set surface flags
    pub fn with_surface_flags(mut self, flags: SurfaceFlags) -> Self {
        self.surface_flags |= flags;
        self
    }

    /// Append a vertex deform
    pub fn with_deform(mut self, deform: Deform) -> Self {
        self.deforms.push(deform);
        self
    }
}

/// Handle returned by the asset layer when a shader is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderHandle(pub u32);

/// Read-only registry of loaded shaders
///
/// Handle 0 is the default shader used for missing content. The table also
/// assigns each shader its sorted index: shaders are ordered by sort class so
/// that the shader field of a sort key orders draws by class first.
#[derive(Debug, Clone)]
pub struct ShaderTable {
    shaders: Vec<Shader>,
    sorted: Vec<usize>,
}

impl ShaderTable {
    /// Build the table; the first shader becomes the default
    pub fn new(mut shaders: Vec<Shader>) -> RenderResult<Self> {
        if shaders.is_empty() {
            return Err(RenderError::NoDefaultShader);
        }
        if shaders.len() > MAX_SHADERS as usize {
            return Err(RenderError::TooManyShaders {
                count: shaders.len(),
                max: MAX_SHADERS as usize,
            });
        }
        if let Some(shader) = shaders.iter().find(|s| s.stages.len() > MAX_SHADER_STAGES) {
            return Err(RenderError::TooManyStages {
                shader: shader.name.clone(),
                count: shader.stages.len(),
                max: MAX_SHADER_STAGES,
            });
        }

        let mut sorted: Vec<usize> = (0..shaders.len()).collect();
        sorted.sort_by_key(|&i| shaders[i].sort);
        for (sorted_index, &i) in sorted.iter().enumerate() {
            shaders[i].sorted_index = sorted_index as u32;
        }

        log::debug!("Shader table built with {} shaders", shaders.len());
        Ok(Self { shaders, sorted })
    }

    /// Look up by handle; unknown handles resolve to the default shader
    pub fn get(&self, handle: ShaderHandle) -> &Shader {
        self.shaders.get(handle.0 as usize).unwrap_or_else(|| {
            log::warn!("Unknown shader handle {}, using default", handle.0);
            self.default_shader()
        })
    }

    /// Look up by the index stored in a sort key
    pub fn by_sorted_index(&self, sorted_index: u32) -> &Shader {
        self.sorted
            .get(sorted_index as usize)
            .map_or_else(|| self.default_shader(), |&i| &self.shaders[i])
    }

    /// The fallback shader for missing content
    pub fn default_shader(&self) -> &Shader {
        &self.shaders[0]
    }

    /// Handle of the first shader with the given name
    pub fn find(&self, name: &str) -> Option<ShaderHandle> {
        self.shaders
            .iter()
            .position(|s| s.name == name)
            .map(|i| ShaderHandle(i as u32))
    }

    /// Number of registered shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// True if no shaders are registered
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sorted_index_follows_sort_class() {
        let table = ShaderTable::new(vec![
            Shader::new("default", SortClass::Opaque),
            Shader::new("glass", SortClass::Blend0),
            Shader::new("mirror", SortClass::Portal),
            Shader::new("sky", SortClass::Environment),
        ])
        .unwrap();

        let index = |name: &str| table.get(table.find(name).unwrap()).sorted_index;
        assert!(index("mirror") < index("sky"));
        assert!(index("sky") < index("default"));
        assert!(index("default") < index("glass"));
        assert_eq!(table.by_sorted_index(index("glass")).name, "glass");
    }

    #[test]
    fn test_unknown_handles_fall_back_to_default() {
        let table = ShaderTable::new(vec![Shader::new("default", SortClass::Opaque)]).unwrap();
        assert_eq!(table.get(ShaderHandle(99)).name, "default");
        assert_eq!(table.by_sorted_index(99).name, "default");
    }

    #[test]
    fn test_rejects_too_many_stages() {
        let mut shader = Shader::new("busy", SortClass::Opaque);
        shader.stages = vec![ShaderStage::default(); MAX_SHADER_STAGES + 1];
        assert!(matches!(
            ShaderTable::new(vec![shader]),
            Err(RenderError::TooManyStages { count: 9, .. })
        ));
        assert!(matches!(ShaderTable::new(Vec::new()), Err(RenderError::NoDefaultShader)));
    }

    #[test]
    fn test_waveforms() {
        let wave = |func| Waveform { func, base: 1.0, amplitude: 2.0, phase: 0.0, frequency: 1.0 };
        assert_relative_eq!(wave(WaveFunc::Sin).evaluate(0.25, 0.0), 3.0, epsilon = 1e-5);
        assert_relative_eq!(wave(WaveFunc::Square).evaluate(0.75, 0.0), -1.0);
        assert_relative_eq!(wave(WaveFunc::Triangle).evaluate(0.5, 0.0), 1.0);
        assert_relative_eq!(wave(WaveFunc::Triangle).evaluate(0.75, 0.0), -1.0);
        assert_relative_eq!(wave(WaveFunc::Sawtooth).evaluate(1.5, 0.0), 2.0);
        assert_relative_eq!(wave(WaveFunc::InverseSawtooth).evaluate(0.25, 0.0), 2.5);
    }
}
