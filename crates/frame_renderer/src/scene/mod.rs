//! Scene inputs and external collaborators
//!
//! Bridges the asset and game layers with the frame pipeline.
//!
//! ## Architecture
//!
//! ```text
//! Game (RefDef: entities, lights, polys)
//!      ↓
//! Scene (shader table, fog table, collaborator traits)
//!      ↓
//! Frame pipeline (collect → sort → shade)
//! ```
//!
//! World traversal, model surface enumeration, per-surface tessellation,
//! mirror/portal geometry and cinematic decoding stay outside the crate and
//! are reached through the traits below.

mod entity;
mod fog;
mod shader;

pub use entity::{Model, ModelHandle, ModelKind, RefEntity, RefEntityType, RenderFx};
pub use fog::{Dlight, FogTable, FogVolume, Poly, PolyVert, RefDef, RefDefFlags};
pub use shader::{
    AlphaGen, CinematicHandle, ColorGen, CullType, Deform, FogPass, Shader, ShaderHandle,
    ShaderStage, ShaderTable, SortClass, SurfaceFlags, TexCoordGen, TexMod, TextureBundle,
    WaveFunc, Waveform, MAX_SHADER_STAGES,
};

use crate::foundation::math::Aabb;
use crate::render::draw_surface::{SurfaceHandle, SurfaceSink};
use crate::render::error::RenderResult;
use crate::render::sort_key::MAX_REF_ENTITIES;
use crate::render::tess::TessBatch;
use crate::render::view::ViewParms;

/// World geometry provider
pub trait WorldSurfaces {
    /// Add every potentially visible world surface for `view` to `sink` and
    /// return the bounds of the visible leaves
    fn add_world_surfaces(&self, view: &ViewParms, sink: &mut SurfaceSink<'_>) -> Aabb;
}

/// Model lookup and per-family surface enumeration
pub trait ModelSource {
    /// Resolve a handle; `None` for unknown handles
    fn model(&self, handle: ModelHandle) -> Option<&Model>;

    /// Add the surfaces of a mesh model
    fn add_mesh_surfaces(&self, entity: &RefEntity, model: &Model, view: &ViewParms, sink: &mut SurfaceSink<'_>);

    /// Add the surfaces of a skeletal model
    fn add_skeletal_surfaces(&self, entity: &RefEntity, model: &Model, view: &ViewParms, sink: &mut SurfaceSink<'_>);

    /// Add the surfaces of an inline brush model
    fn add_brush_surfaces(&self, entity: &RefEntity, model: &Model, view: &ViewParms, sink: &mut SurfaceSink<'_>);
}

/// Turns surface handles into tessellated geometry
///
/// Client polygons are tessellated by the frame pipeline itself and never
/// reach this trait.
pub trait SurfaceTessellator {
    /// Vertex and index counts `surface` will append
    fn surface_size(&self, surface: SurfaceHandle, entity: Option<&RefEntity>) -> (u32, u32);

    /// Append the surface's geometry to `tess`; may OR light bits into
    /// `tess.dlight_bits`
    fn tessellate(
        &self,
        surface: SurfaceHandle,
        entity: Option<&RefEntity>,
        view: &ViewParms,
        tess: &mut TessBatch,
    ) -> RenderResult<()>;
}

/// Mirror and portal geometry
pub trait PortalResolver {
    /// The view seen through `surface`, or `None` when the surface is not
    /// visible enough to trigger a recursive view
    fn portal_view(&self, surface: SurfaceHandle, entity: Option<&RefEntity>, view: &ViewParms) -> Option<ViewParms>;
}

/// Video texture decoder
pub trait CinematicPlayer {
    /// Advance the stream to the current time
    fn run(&mut self, handle: CinematicHandle);

    /// Upload the current frame into the stream's image
    fn upload(&mut self, handle: CinematicHandle);
}

/// A scene with no mirrors or portals
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPortals;

impl PortalResolver for NoPortals {
    fn portal_view(&self, _surface: SurfaceHandle, _entity: Option<&RefEntity>, _view: &ViewParms) -> Option<ViewParms> {
        None
    }
}

/// A scene with no video textures
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCinematics;

impl CinematicPlayer for NoCinematics {
    fn run(&mut self, _handle: CinematicHandle) {}

    fn upload(&mut self, _handle: CinematicHandle) {}
}

/// Read-only inputs of one frame
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    /// Client submission
    pub refdef: &'a RefDef,
    /// Loaded shaders
    pub shaders: &'a ShaderTable,
    /// World fog volumes
    pub fogs: &'a FogTable,
    /// World geometry
    pub world: &'a dyn WorldSurfaces,
    /// Models
    pub models: &'a dyn ModelSource,
    /// Surface geometry
    pub tessellator: &'a dyn SurfaceTessellator,
    /// Mirrors and portals
    pub portals: &'a dyn PortalResolver,
}

impl<'a> Scene<'a> {
    /// Entity referenced by a sort key; `None` for world geometry
    ///
    /// The world slot is reserved even when more entities were submitted
    /// than can be drawn.
    pub fn entity(&self, entity_num: u32) -> Option<&'a RefEntity> {
        if entity_num >= MAX_REF_ENTITIES {
            return None;
        }
        self.refdef.entities.get(entity_num as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::sort_key::ENTITY_NUM_WORLD;

    struct Empty;

    impl WorldSurfaces for Empty {
        fn add_world_surfaces(&self, _view: &ViewParms, _sink: &mut SurfaceSink<'_>) -> Aabb {
            Aabb::cleared()
        }
    }

    impl ModelSource for Empty {
        fn model(&self, _handle: ModelHandle) -> Option<&Model> {
            None
        }

        fn add_mesh_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}

        fn add_skeletal_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}

        fn add_brush_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}
    }

    impl SurfaceTessellator for Empty {
        fn surface_size(&self, _s: SurfaceHandle, _e: Option<&RefEntity>) -> (u32, u32) {
            (0, 0)
        }

        fn tessellate(&self, _s: SurfaceHandle, _e: Option<&RefEntity>, _v: &ViewParms, _t: &mut TessBatch) -> RenderResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_world_slot_never_resolves_to_an_entity() {
        let refdef = RefDef {
            entities: (0..=MAX_REF_ENTITIES)
                .map(|i| RefEntity::new(RefEntityType::Sprite, Vec3::new(i as f32, 0.0, 0.0)))
                .collect(),
            ..RefDef::default()
        };
        let shaders = ShaderTable::new(vec![Shader::new("default", SortClass::Opaque)]).unwrap();
        let fogs = FogTable::default();
        let scene = Scene {
            refdef: &refdef,
            shaders: &shaders,
            fogs: &fogs,
            world: &Empty,
            models: &Empty,
            tessellator: &Empty,
            portals: &NoPortals,
        };

        assert!(scene.entity(ENTITY_NUM_WORLD).is_none());
        assert_eq!(scene.entity(MAX_REF_ENTITIES - 1).map(|e| e.origin.x), Some(1022.0));
    }
}
