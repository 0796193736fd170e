//! # Surface Collector
//!
//! Appends the draw surfaces of one view: world surfaces, client polygons,
//! then entities. Each surface's sort key carries the shader's sorted index,
//! the entity number, the fog volume and the dynamic-light flag.

use crate::config::RendererConfig;
use crate::render::draw_surface::{DrawSurfaceBuffer, SurfaceHandle, SurfaceSink};
use crate::render::sort_key::{ENTITY_NUM_WORLD, MAX_REF_ENTITIES};
use crate::render::view::{CullResult, ViewParms};
use crate::scene::{ModelKind, RefEntity, RefEntityType, RenderFx, Scene};

/// Add the visible world and record its bounds on the view
pub fn add_world_surfaces(scene: &Scene<'_>, view: &mut ViewParms, buffer: &mut DrawSurfaceBuffer) {
    if view.no_world_model {
        return;
    }

    let mut sink = SurfaceSink::new(buffer, scene.shaders, ENTITY_NUM_WORLD);
    view.vis_bounds = scene.world.add_world_surfaces(view, &mut sink);
}

/// Add client polygons as world surfaces
pub fn add_polygon_surfaces(scene: &Scene<'_>, buffer: &mut DrawSurfaceBuffer) {
    let mut sink = SurfaceSink::new(buffer, scene.shaders, ENTITY_NUM_WORLD);
    for (index, poly) in scene.refdef.polys.iter().enumerate() {
        sink.add(SurfaceHandle::Poly(index as u32), poly.shader, poly.fog_num, false);
    }
}

/// Add the surfaces of every entity visible from `view`
pub fn add_entity_surfaces(
    scene: &Scene<'_>,
    view: &ViewParms,
    config: &RendererConfig,
    buffer: &mut DrawSurfaceBuffer,
) {
    if !config.draw_entities {
        return;
    }

    let entities = &scene.refdef.entities;
    if entities.len() > MAX_REF_ENTITIES as usize {
        log::warn!(
            "{} entities submitted, only the first {} are drawn",
            entities.len(),
            MAX_REF_ENTITIES
        );
    }

    let mut sink = SurfaceSink::new(buffer, scene.shaders, ENTITY_NUM_WORLD);
    for (entity_num, entity) in entities.iter().enumerate().take(MAX_REF_ENTITIES as usize) {
        // the local player's weapon never shows up in reflections
        if view.is_portal && entity.render_fx.contains(RenderFx::FIRST_PERSON) {
            continue;
        }
        sink.set_entity(entity_num as u32);
        add_entity(scene, view, entity, &mut sink);
    }
}

fn add_entity(scene: &Scene<'_>, view: &ViewParms, entity: &RefEntity, sink: &mut SurfaceSink<'_>) {
    let third_person_hidden = !view.is_portal && entity.render_fx.contains(RenderFx::THIRD_PERSON);

    match entity.kind {
        RefEntityType::PortalSurface => {}
        kind if kind.is_procedural() => {
            if third_person_hidden {
                return;
            }
            let fog_num = if view.no_world_model {
                0
            } else {
                scene.fogs.sprite_fog_num(&entity.origin, entity.radius)
            };
            sink.add(SurfaceHandle::Entity, entity.custom_shader, fog_num, false);
        }
        RefEntityType::Model(handle) => {
            let Some(model) = scene.models.model(handle) else {
                log::trace!("Model {} not loaded, drawing placeholder", handle.0);
                add_placeholder(sink);
                return;
            };

            if model.kind == ModelKind::Bad {
                if !third_person_hidden {
                    add_placeholder(sink);
                }
                return;
            }
            // inline brush models always draw, even in third person
            if third_person_hidden && model.kind != ModelKind::Brush {
                return;
            }
            if model.radius > 0.0
                && view.frustum.cull_sphere(&entity.origin, model.radius) == CullResult::Out
            {
                return;
            }

            match model.kind {
                ModelKind::Mesh => scene.models.add_mesh_surfaces(entity, model, view, sink),
                ModelKind::Skeletal => scene.models.add_skeletal_surfaces(entity, model, view, sink),
                ModelKind::Brush => scene.models.add_brush_surfaces(entity, model, view, sink),
                ModelKind::Bad => {}
            }
        }
        _ => {}
    }
}

fn add_placeholder(sink: &mut SurfaceSink<'_>) {
    let shader = sink.shaders().default_shader();
    sink.add_with_shader(SurfaceHandle::Entity, shader, 0, false);
}
