//! Arena demo application
//!
//! Builds a small synthetic arena (a tiled floor, a mirror, a fogged pit,
//! two sprites, a scorch mark and a moving light) and renders a few frames
//! into host memory through a recording command sink, logging the frame
//! counters. Pass a `.toml` or `.ron` path to override the renderer
//! configuration.

use std::cell::Cell;

use ash::vk::{self, Handle};
use frame_renderer::foundation::logging;
use frame_renderer::foundation::math::{identity_axis, Plane};
use frame_renderer::prelude::*;
use frame_renderer::render::{
    GlobalPipelines, SpecialImages, SurfaceHandle, SurfaceSink, TessBatch, TessVertex,
};
use frame_renderer::scene::{
    FogPass, Model, ModelHandle, Poly, PolyVert, RefEntityType, ShaderHandle, ShaderStage,
    TextureBundle,
};

const FRAMES: u32 = 4;
const TILE: f32 = 64.0;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    /// Configuration file could not be used
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Frame building failed
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Shader handles of the arena
mod handles {
    pub const FLOOR: u32 = 1;
    pub const MIRROR: u32 = 2;
    pub const PIT: u32 = 3;
    pub const FLARE: u32 = 4;
    pub const SCORCH: u32 = 5;
}

/// Floor tiles plus one mirror on the far wall
struct Arena {
    /// Center and shader of every world quad
    quads: Vec<(Vec3, u32, u32)>,
}

impl Arena {
    fn new() -> Self {
        let mut quads = Vec::new();
        for x in 0..6 {
            for y in -3..3 {
                let center = Vec3::new(x as f32 * TILE + TILE, y as f32 * TILE, -32.0);
                // the middle tiles sit in the fog pit
                let (shader, fog_num) = if x == 3 && (-1..1).contains(&y) {
                    (handles::PIT, 1)
                } else {
                    (handles::FLOOR, 0)
                };
                quads.push((center, shader, fog_num));
            }
        }
        quads.push((Vec3::new(7.0 * TILE, 0.0, 32.0), handles::MIRROR, 0));
        Self { quads }
    }

    fn mirror_index(&self) -> u32 {
        self.quads.len() as u32 - 1
    }
}

impl WorldSurfaces for Arena {
    fn add_world_surfaces(&self, _view: &ViewParms, sink: &mut SurfaceSink<'_>) -> Aabb {
        let mut bounds = Aabb::cleared();
        for (index, (center, shader, fog_num)) in self.quads.iter().enumerate() {
            sink.add(SurfaceHandle::World(index as u32), ShaderHandle(*shader), *fog_num, true);
            bounds.add_point(&(center - Vec3::repeat(TILE * 0.5)));
            bounds.add_point(&(center + Vec3::repeat(TILE * 0.5)));
        }
        bounds
    }
}

struct NoModels;

impl ModelSource for NoModels {
    fn model(&self, _handle: ModelHandle) -> Option<&Model> {
        None
    }

    fn add_mesh_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}

    fn add_skeletal_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}

    fn add_brush_surfaces(&self, _e: &RefEntity, _m: &Model, _v: &ViewParms, _s: &mut SurfaceSink<'_>) {}
}

/// Emits a flat quad for world surfaces and a camera-facing one for sprites
struct QuadTessellator<'a> {
    arena: &'a Arena,
}

impl SurfaceTessellator for QuadTessellator<'_> {
    fn surface_size(&self, _surface: SurfaceHandle, _entity: Option<&RefEntity>) -> (u32, u32) {
        (4, 6)
    }

    fn tessellate(
        &self,
        surface: SurfaceHandle,
        entity: Option<&RefEntity>,
        view: &ViewParms,
        tess: &mut TessBatch,
    ) -> RenderResult<()> {
        let (center, u, v) = match (surface, entity) {
            (SurfaceHandle::World(index), _) => {
                let Some((center, ..)) = self.arena.quads.get(index as usize) else {
                    return Ok(());
                };
                (*center, Vec3::x() * TILE * 0.5, Vec3::y() * TILE * 0.5)
            }
            (_, Some(entity)) => {
                let [_, left, up] = view.camera.axis;
                (entity.origin, left * entity.radius, up * entity.radius)
            }
            _ => return Ok(()),
        };

        tess.reserve(4, 6)?;
        let base = tess.num_vertexes();
        for (corner, st) in [(-u - v, [0.0, 0.0]), (u - v, [1.0, 0.0]), (u + v, [1.0, 1.0]), (v - u, [0.0, 1.0])] {
            tess.push_vertex(TessVertex {
                st,
                ..TessVertex::at(center + corner)
            })?;
        }
        tess.push_indexes(&[base, base + 1, base + 2, base, base + 2, base + 3])?;
        // every arena surface is close enough to the single light
        tess.dlight_bits |= 1;
        Ok(())
    }
}

/// Reflects the camera in the mirror plane at x = 7 * TILE
struct MirrorResolver {
    mirror: u32,
    opened: Cell<u32>,
}

impl PortalResolver for MirrorResolver {
    fn portal_view(&self, surface: SurfaceHandle, _entity: Option<&RefEntity>, view: &ViewParms) -> Option<ViewParms> {
        if surface != SurfaceHandle::World(self.mirror) {
            return None;
        }
        self.opened.set(self.opened.get() + 1);

        let plane_x = 7.0 * TILE;
        let origin = view.camera.origin;
        let [forward, left, up] = view.camera.axis;
        let mirrored = Vec3::new(2.0 * plane_x - origin.x, origin.y, origin.z);
        let flip = |a: Vec3| Vec3::new(-a.x, a.y, a.z);

        let mut mirror = ViewParms::new(mirrored, [flip(forward), flip(left), flip(up)], view.fov_x, view.fov_y, view.viewport);
        mirror.is_mirror = true;
        mirror.portal_plane = Plane::new(Vec3::new(-1.0, 0.0, 0.0), -plane_x);
        Some(mirror)
    }
}

fn stage(image: u64, pipeline: u64) -> ShaderStage {
    ShaderStage::new(
        TextureBundle::image(vk::DescriptorSet::from_raw(image)),
        vk::Pipeline::from_raw(pipeline),
    )
}

fn shader_table() -> RenderResult<ShaderTable> {
    ShaderTable::new(vec![
        Shader::new("default", SortClass::Opaque).with_stage(stage(1, 1)),
        Shader::new("floor", SortClass::Opaque)
            .with_stage(stage(2, 2).with_second_bundle(TextureBundle::lightmap(vk::DescriptorSet::from_raw(3)))),
        Shader::new("mirror", SortClass::Portal),
        Shader::new("pit", SortClass::Opaque)
            .with_stage(stage(4, 2))
            .with_fog_pass(FogPass::Equal),
        Shader::new("flare", SortClass::Blend0).with_stage(stage(5, 3)),
        Shader::new("scorch", SortClass::Decal)
            .with_stage(stage(6, 4))
            .with_polygon_offset(),
    ])
}

fn backend_resources(width: u32, height: u32) -> BackendResources {
    let pipeline = vk::Pipeline::from_raw;
    BackendResources {
        pipelines: GlobalPipelines {
            dlight: [[[pipeline(100); 2]; 3], [[pipeline(101); 2]; 3]],
            fog: [[[pipeline(110); 2]; 3], [[pipeline(111); 2]; 3]],
        },
        images: SpecialImages {
            white: vk::DescriptorSet::from_raw(90),
            dlight: vk::DescriptorSet::from_raw(91),
            fog: vk::DescriptorSet::from_raw(92),
        },
        render_area: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        },
    }
}

fn refdef(frame: u32) -> RefDef {
    let time = frame as f32 * 0.1;
    let flare = |y: f32| {
        RefEntity::new(RefEntityType::Sprite, Vec3::new(5.0 * TILE, y, 16.0))
            .with_shader(ShaderHandle(handles::FLARE))
            .with_radius(8.0)
    };
    let scorch = Poly {
        shader: ShaderHandle(handles::SCORCH),
        fog_num: 0,
        verts: [(-16.0, -16.0), (16.0, -16.0), (16.0, 16.0), (-16.0, 16.0)]
            .into_iter()
            .map(|(x, y)| PolyVert {
                xyz: Vec3::new(2.0 * TILE + x, y, -31.0),
                st: [0.5 + x / 32.0, 0.5 + y / 32.0],
                color: [255; 4],
            })
            .collect(),
    };

    RefDef {
        time,
        entities: vec![flare(-48.0), flare(48.0)],
        dlights: vec![Dlight::new(
            Vec3::new(3.0 * TILE, (time * 4.0).sin() * TILE, 0.0),
            Vec3::new(1.0, 0.6, 0.2),
            300.0,
        )],
        polys: vec![scorch],
        ..RefDef::default()
    }
}

fn load_config() -> Result<RendererConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading renderer configuration from {path}");
            RendererConfig::load_from_file(&path)?
        }
        None => RendererConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let (width, height) = (800, 600);

    let arena = Arena::new();
    let shaders = shader_table()?;
    let fogs = FogTable::new(vec![FogVolume::new(
        Aabb::new(Vec3::new(3.5 * TILE, -2.0 * TILE, -96.0), Vec3::new(4.5 * TILE, TILE, 0.0)),
        [96, 110, 128, 255],
        128.0,
    )
    .with_surface(Vec3::z(), 0.0)]);
    let tessellator = QuadTessellator { arena: &arena };
    let portals = MirrorResolver {
        mirror: arena.mirror_index(),
        opened: Cell::new(0),
    };

    let driver = FrameDriver::new(config.clone(), backend_resources(width, height))?;
    let mut frame = FrameContext::host(&config);
    let mut sink = CommandLog::new();

    for n in 0..FRAMES {
        let refdef = refdef(n);
        let scene = Scene {
            refdef: &refdef,
            shaders: &shaders,
            fogs: &fogs,
            world: &arena,
            models: &NoModels,
            tessellator: &tessellator,
            portals: &portals,
        };

        let camera = ViewParms::new(
            Vec3::new(n as f32 * 8.0, 0.0, 48.0),
            identity_axis(),
            90.0,
            73.74,
            Viewport::new(0, 0, width, height),
        );

        sink.clear();
        let counters = driver.render_frame(&mut frame, &scene, camera, &mut sink, &mut NoCinematics)?;
        log::info!(
            "frame {n}: {} views, {} surfaces, {} batches, {} draws, {} indexes ({} lit)",
            counters.views,
            counters.surfaces,
            counters.batches,
            counters.draw_calls,
            counters.total_indexes,
            counters.dlight_indexes
        );
        log::debug!("frame {n}: {} commands recorded", sink.commands.len());
    }

    log::info!("Mirror opened {} times", portals.opened.get());
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting arena demo...");

    if let Err(e) = run() {
        log::error!("Arena demo failed: {e}");
        std::process::exit(1);
    }
}
