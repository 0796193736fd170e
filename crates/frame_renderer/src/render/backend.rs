//! Back-end surface walk
//!
//! Replays one committed view: consecutive surfaces with the same shader,
//! fog volume, light flag and entity are tessellated into one batch, and
//! each finished batch goes through the stage executor.

use crate::config::RendererConfig;
use crate::foundation::math::Vec3;
use crate::render::commands::CommandSink;
use crate::render::draw_surface::SurfaceHandle;
use crate::render::error::RenderResult;
use crate::render::frame::{DrawSurfsCommand, FrameContext};
use crate::render::shading::{self, BackendResources, BatchEnv, ShadeContext};
use crate::render::sort_key::SortKey;
use crate::render::tess::{TessBatch, TessVertex};
use crate::render::view::{rotate_for_entity, world_point_to_local, Orientation, ViewParms};
use crate::scene::{CinematicPlayer, Dlight, Poly, RefEntity, RenderFx, Scene};

/// Entity-dependent state of the walk
struct EntityState<'a> {
    num: u32,
    entity: Option<&'a RefEntity>,
    orientation: Orientation,
    dlights: Vec<Dlight>,
    depth_hack: bool,
    shader_time: f32,
}

impl<'a> EntityState<'a> {
    fn enter(scene: &Scene<'a>, view: &ViewParms, num: u32) -> Self {
        let entity = scene.entity(num);
        let (orientation, depth_hack, shader_time) = match entity {
            Some(entity) => (
                rotate_for_entity(entity, view),
                entity.render_fx.contains(RenderFx::DEPTH_HACK),
                scene.refdef.time - entity.shader_time,
            ),
            None => (view.world.clone(), false, scene.refdef.time),
        };

        let dlights = scene
            .refdef
            .dlights
            .iter()
            .map(|light| Dlight {
                transformed: world_point_to_local(&light.origin, &orientation),
                ..*light
            })
            .collect();

        Self {
            num,
            entity,
            orientation,
            dlights,
            depth_hack,
            shader_time,
        }
    }
}

/// Draw one committed view
pub fn render_draw_surf_list(
    frame: &mut FrameContext,
    scene: &Scene<'_>,
    command: &DrawSurfsCommand,
    sink: &mut dyn CommandSink,
    cinematics: &mut dyn CinematicPlayer,
    config: &RendererConfig,
    resources: &BackendResources,
) -> RenderResult<()> {
    let FrameContext {
        geometry,
        tess,
        counters,
        shading,
        ..
    } = frame;
    let view = &command.view;

    if shading.depth_dirty {
        sink.clear_attachments(config.stencil_shadows, resources.render_area);
        shading.depth_dirty = false;
    }

    let mut shade = ShadeContext {
        sink,
        geometry,
        state: shading,
        counters,
        cinematics,
        config,
        resources,
    };

    let mut old_sort: Option<SortKey> = None;
    let mut batch_key: Option<(u32, u32, u32)> = None;
    let mut state: Option<EntityState<'_>> = None;

    for surf in &command.surfaces {
        shade.counters.surfaces += 1;

        if old_sort != Some(surf.sort) {
            old_sort = Some(surf.sort);
            let key = surf.sort.decode();
            let entity_changed = state.as_ref().map_or(true, |s| s.num != key.entity);
            let next_batch = (key.shader, key.fog, key.dlight);

            if batch_key != Some(next_batch) || entity_changed {
                if let Some(current) = &state {
                    end_surface(&mut shade, tess, scene, view, current)?;
                }
                tess.begin(key.shader, key.fog, 0.0);
                batch_key = Some(next_batch);
            }

            if entity_changed {
                state = Some(EntityState::enter(scene, view, key.entity));
            }
        }

        let Some(current) = &state else {
            continue;
        };
        tess.shader_time = current.shader_time;

        let (vertexes, indexes) = surface_size(scene, surf.surface, current.entity);
        if !tess.has_room(vertexes, indexes) && tess.num_indexes() > 0 {
            end_surface(&mut shade, tess, scene, view, current)?;
            tess.clear();
        }
        tessellate(scene, surf.surface, current.entity, view, tess)?;
    }

    if let Some(current) = &state {
        end_surface(&mut shade, tess, scene, view, current)?;
    }
    Ok(())
}

fn end_surface(
    shade: &mut ShadeContext<'_>,
    tess: &mut TessBatch,
    scene: &Scene<'_>,
    view: &ViewParms,
    state: &EntityState<'_>,
) -> RenderResult<()> {
    if tess.indexes.is_empty() {
        return Ok(());
    }

    shade.counters.batches += 1;
    shade.counters.vertexes += tess.num_vertexes();
    shade.counters.indexes += tess.num_indexes();

    let env = BatchEnv {
        shader: scene.shaders.by_sorted_index(tess.shader),
        orientation: &state.orientation,
        view,
        depth_hack: state.depth_hack,
        dlights: &state.dlights,
        fog: scene.fogs.get(tess.fog_num),
    };
    shading::stage_iterator_generic(shade, tess, &env)
}

fn surface_size(scene: &Scene<'_>, surface: SurfaceHandle, entity: Option<&RefEntity>) -> (u32, u32) {
    match surface {
        SurfaceHandle::Poly(index) => scene
            .refdef
            .polys
            .get(index as usize)
            .map_or((0, 0), poly_size),
        _ => scene.tessellator.surface_size(surface, entity),
    }
}

fn tessellate(
    scene: &Scene<'_>,
    surface: SurfaceHandle,
    entity: Option<&RefEntity>,
    view: &ViewParms,
    tess: &mut TessBatch,
) -> RenderResult<()> {
    match surface {
        SurfaceHandle::Poly(index) => match scene.refdef.polys.get(index as usize) {
            Some(poly) => tessellate_poly(poly, tess),
            None => Ok(()),
        },
        _ => scene.tessellator.tessellate(surface, entity, view, tess),
    }
}

fn poly_size(poly: &Poly) -> (u32, u32) {
    let verts = poly.verts.len() as u32;
    if verts < 3 {
        return (0, 0);
    }
    (verts, 3 * (verts - 2))
}

/// Append a client polygon as a triangle fan
fn tessellate_poly(poly: &Poly, tess: &mut TessBatch) -> RenderResult<()> {
    let (vertexes, indexes) = poly_size(poly);
    if vertexes == 0 {
        return Ok(());
    }
    tess.reserve(vertexes, indexes)?;

    let base = tess.num_vertexes();
    for vert in &poly.verts {
        tess.push_vertex(TessVertex {
            xyz: vert.xyz,
            normal: Vec3::z(),
            st: vert.st,
            lightmap: [0.0, 0.0],
            color: vert.color,
        })?;
    }
    for i in 1..vertexes - 1 {
        tess.push_indexes(&[base, base + i, base + i + 1])?;
    }
    Ok(())
}
