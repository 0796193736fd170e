//! Scene entities and the models they reference

use bitflags::bitflags;

use crate::foundation::math::{identity_axis, Aabb, Axis, Vec3};
use crate::scene::shader::ShaderHandle;

bitflags! {
    /// Per-entity render effect flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFx: u32 {
        /// Always receive at least a little light
        const MINLIGHT = 0x1;
        /// Only drawn in mirror and portal views (the local player's body)
        const THIRD_PERSON = 0x2;
        /// Only drawn in the primary view (the view weapon)
        const FIRST_PERSON = 0x4;
        /// Compress the depth range to avoid near-plane clipping
        const DEPTH_HACK = 0x8;
    }
}

/// Handle of a model registered with the asset layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub u32);

/// Model families with distinct surface enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Static or vertex-animated mesh
    Mesh,
    /// Skeletal animated mesh
    Skeletal,
    /// Inline world model (doors, platforms)
    Brush,
    /// Failed to load
    Bad,
}

/// Model metadata the collector needs
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Model family
    pub kind: ModelKind,
    /// Bounding sphere radius around the entity origin
    pub radius: f32,
    /// Local bounds
    pub bounds: Aabb,
}

/// What an entity draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefEntityType {
    /// A model resolved through the asset layer
    Model(ModelHandle),
    /// Camera-facing quad
    Sprite,
    /// Beam between two points
    Beam,
    /// Lightning bolt
    Lightning,
    /// Railgun core trail
    RailCore,
    /// Railgun ring trail
    RailRings,
    /// Marks a portal camera; draws nothing
    PortalSurface,
}

impl RefEntityType {
    /// True for effects generated procedurally by the back end
    pub const fn is_procedural(self) -> bool {
        matches!(
            self,
            Self::Sprite | Self::Beam | Self::Lightning | Self::RailCore | Self::RailRings
        )
    }
}

/// An entity submitted for this frame
#[derive(Debug, Clone, PartialEq)]
pub struct RefEntity {
    /// Entity type
    pub kind: RefEntityType,
    /// Render effect flags
    pub render_fx: RenderFx,
    /// World position
    pub origin: Vec3,
    /// Local axes in world space
    pub axis: Axis,
    /// Axes carry a scale and must be compensated
    pub non_normalized_axes: bool,
    /// Sprite radius
    pub radius: f32,
    /// Shader of procedural effects
    pub custom_shader: ShaderHandle,
    /// Subtracted from the frame time when shading this entity
    pub shader_time: f32,
}

impl RefEntity {
    /// An entity at `origin` with identity axes
    pub fn new(kind: RefEntityType, origin: Vec3) -> Self {
        Self {
            kind,
            render_fx: RenderFx::empty(),
            origin,
            axis: identity_axis(),
            non_normalized_axes: false,
            radius: 0.0,
            custom_shader: ShaderHandle::default(),
            shader_time: 0.0,
        }
    }

    /// Set render effect flags
    pub fn with_render_fx(mut self, render_fx: RenderFx) -> Self {
        self.render_fx = render_fx;
        self
    }

    /// Set the orientation; `non_normalized` marks scaled axes
    pub fn with_axis(mut self, axis: Axis, non_normalized: bool) -> Self {
        self.axis = axis;
        self.non_normalized_axes = non_normalized;
        self
    }

    /// Set the shader used by procedural effects
    pub fn with_shader(mut self, shader: ShaderHandle) -> Self {
        self.custom_shader = shader;
        self
    }

    /// Set the sprite radius
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }
}
