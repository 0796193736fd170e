//! Whole-frame tests driven through the recording command sink

use std::cell::Cell;

use ash::vk::{self, Handle};
use frame_renderer::foundation::math::identity_axis;
use frame_renderer::prelude::*;
use frame_renderer::render::{
    GlobalPipelines, RecordedCommand, SpecialImages, SurfaceHandle, SurfaceSink, TessBatch, TessVertex,
};
use frame_renderer::scene::{
    FogPass, Model, ModelHandle, RefEntityType, RenderFx, ShaderHandle, ShaderStage, TextureBundle,
};

const STAGE_PIPELINE: u64 = 10;
const DLIGHT_PIPELINE: u64 = 20;
const FOG_PIPELINE: u64 = 30;

/// World surface: index, shader, fog number, light flag
type WorldSurf = (u32, u32, u32, bool);

struct TestWorld {
    surfaces: Vec<WorldSurf>,
}

impl WorldSurfaces for TestWorld {
    fn add_world_surfaces(&self, _view: &ViewParms, sink: &mut SurfaceSink<'_>) -> Aabb {
        for &(index, shader, fog_num, dlight) in &self.surfaces {
            sink.add(SurfaceHandle::World(index), ShaderHandle(shader), fog_num, dlight);
        }
        Aabb::new(Vec3::new(-200.0, -200.0, -200.0), Vec3::new(200.0, 200.0, 200.0))
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

/// Every surface is a 20x20 quad facing the camera at x = 100
struct QuadTessellator {
    dlight_bits: u32,
}

impl SurfaceTessellator for QuadTessellator {
    fn surface_size(&self, _surface: SurfaceHandle, _entity: Option<&RefEntity>) -> (u32, u32) {
        (4, 6)
    }

    fn tessellate(
        &self,
        _surface: SurfaceHandle,
        _entity: Option<&RefEntity>,
        _view: &ViewParms,
        tess: &mut TessBatch,
    ) -> RenderResult<()> {
        tess.reserve(4, 6)?;
        let base = tess.num_vertexes();
        for (y, z) in [(-10.0, -10.0), (10.0, -10.0), (10.0, 10.0), (-10.0, 10.0)] {
            tess.push_vertex(TessVertex::at(Vec3::new(100.0, y, z)))?;
        }
        tess.push_indexes(&[base, base + 1, base + 2, base, base + 2, base + 3])?;
        tess.dlight_bits |= self.dlight_bits;
        Ok(())
    }
}

/// Counts resolver calls and opens a portal on one world surface
struct CountingPortals {
    calls: Cell<u32>,
    trigger: Option<u32>,
}

impl CountingPortals {
    fn new(trigger: Option<u32>) -> Self {
        Self {
            calls: Cell::new(0),
            trigger,
        }
    }
}

impl PortalResolver for CountingPortals {
    fn portal_view(&self, surface: SurfaceHandle, _entity: Option<&RefEntity>, _view: &ViewParms) -> Option<ViewParms> {
        self.calls.set(self.calls.get() + 1);
        match (surface, self.trigger) {
            (SurfaceHandle::World(index), Some(trigger)) if index == trigger => Some(camera()),
            _ => None,
        }
    }
}

fn pipeline(raw: u64) -> vk::Pipeline {
    vk::Pipeline::from_raw(raw)
}

fn camera() -> ViewParms {
    ViewParms::new(Vec3::zeros(), identity_axis(), 90.0, 73.74, Viewport::new(0, 0, 640, 480))
}

fn resources() -> BackendResources {
    BackendResources {
        pipelines: GlobalPipelines {
            dlight: [[[pipeline(DLIGHT_PIPELINE); 2]; 3]; 2],
            fog: [[[pipeline(FOG_PIPELINE); 2]; 3]; 2],
        },
        images: SpecialImages::default(),
        render_area: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
        },
    }
}

fn lit_stage() -> ShaderStage {
    ShaderStage::new(
        TextureBundle::image(vk::DescriptorSet::from_raw(1)),
        pipeline(STAGE_PIPELINE),
    )
}

/// Handles: 0 default, 1 wall, 2..=4 mirrors, 5 bad
fn shaders() -> ShaderTable {
    ShaderTable::new(vec![
        Shader::new("default", SortClass::Opaque).with_stage(lit_stage()),
        Shader::new("wall", SortClass::Opaque)
            .with_stage(lit_stage())
            .with_fog_pass(FogPass::Equal),
        Shader::new("mirror_a", SortClass::Portal),
        Shader::new("mirror_b", SortClass::Portal),
        Shader::new("mirror_c", SortClass::Portal),
        Shader::new("bad", SortClass::Bad),
    ])
    .unwrap()
}

fn config() -> RendererConfig {
    RendererConfig::default().with_max_draw_surfs(256)
}

struct Harness {
    refdef: RefDef,
    shaders: ShaderTable,
    fogs: FogTable,
    world: TestWorld,
    tessellator: QuadTessellator,
    portals: CountingPortals,
}

impl Harness {
    fn new(surfaces: Vec<WorldSurf>) -> Self {
        Self {
            refdef: RefDef::default(),
            shaders: shaders(),
            fogs: FogTable::default(),
            world: TestWorld { surfaces },
            tessellator: QuadTessellator { dlight_bits: 0 },
            portals: CountingPortals::new(None),
        }
    }

    fn scene(&self) -> Scene<'_> {
        Scene {
            refdef: &self.refdef,
            shaders: &self.shaders,
            fogs: &self.fogs,
            world: &self.world,
            models: &NoModels,
            tessellator: &self.tessellator,
            portals: &self.portals,
        }
    }

    fn render(&self, config: RendererConfig) -> (RenderResult<FrameCounters>, FrameContext, CommandLog) {
        let driver = FrameDriver::new(config.clone(), resources()).unwrap();
        let mut frame = FrameContext::host(&config);
        let mut log = CommandLog::new();
        let result = driver.render_frame(&mut frame, &self.scene(), camera(), &mut log, &mut NoCinematics);
        (result, frame, log)
    }
}

fn push_constant_sizes(log: &CommandLog) -> Vec<usize> {
    log.commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::PushConstants(floats) => Some(floats.len() * 4),
            _ => None,
        })
        .collect()
}

fn viewport_depths(log: &CommandLog) -> Vec<(f32, f32)> {
    log.commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::SetViewport {
                min_depth, max_depth, ..
            } => Some((*min_depth, *max_depth)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_empty_scene_commits_one_view() {
    let harness = Harness::new(Vec::new());
    let (result, frame, log) = harness.render(config());

    let counters = result.unwrap();
    assert_eq!(frame.commands.len(), 1);
    assert!(frame.commands[0].surfaces.is_empty());
    assert_eq!(harness.portals.calls.get(), 0);
    assert_eq!(counters.views, 1);
    assert_eq!(counters.draw_calls, 0);
    assert!(log.commands.is_empty());
}

#[test]
fn test_portal_trigger_stops_scan() {
    let mut harness = Harness::new(vec![(0, 2, 0, false), (1, 3, 0, false), (2, 4, 0, false), (3, 1, 0, false)]);
    harness.portals = CountingPortals::new(Some(1));
    let (result, frame, log) = harness.render(config());

    let counters = result.unwrap();
    // mirror_a declines, mirror_b opens the portal, mirror_c is never tested;
    // the portal view itself refuses to recurse
    assert_eq!(harness.portals.calls.get(), 2);
    assert_eq!(counters.views, 2);
    assert_eq!(frame.commands.len(), 2);
    assert!(frame.commands[0].view.is_portal);
    assert!(!frame.commands[1].view.is_portal);
    assert_eq!(frame.commands[1].surfaces.len(), 4);

    // portal view drawn first with the extended constants
    let sizes = push_constant_sizes(&log);
    assert_eq!(sizes.first(), Some(&128));
    assert_eq!(sizes.last(), Some(&64));

    // depth cleared once, between the two views
    let clears = log.count(|c| matches!(c, RecordedCommand::ClearAttachments { stencil: false }));
    assert_eq!(clears, 1);
}

#[test]
fn test_portal_only_drops_parent_view() {
    let mut harness = Harness::new(vec![(0, 2, 0, false), (3, 1, 0, false)]);
    harness.portals = CountingPortals::new(Some(0));
    let (result, frame, _log) = harness.render(config().with_portal_only(true));

    result.unwrap();
    assert_eq!(frame.commands.len(), 1);
    assert!(frame.commands[0].view.is_portal);
}

#[test]
fn test_bad_sort_class_is_fatal() {
    let harness = Harness::new(vec![(0, 5, 0, false), (1, 1, 0, false)]);
    let (result, _frame, log) = harness.render(config());

    match result {
        Err(RenderError::BadSortClass { shader }) => assert_eq!(shader, "bad"),
        other => panic!("expected BadSortClass, got {other:?}"),
    }
    assert!(log.commands.is_empty());
}

#[test]
fn test_light_and_fog_passes_follow_stages() {
    let mut harness = Harness::new(vec![(0, 1, 1, true)]);
    harness.fogs = FogTable::new(vec![FogVolume::new(
        Aabb::new(Vec3::repeat(-500.0), Vec3::repeat(500.0)),
        [128, 128, 128, 255],
        256.0,
    )]);
    harness.tessellator.dlight_bits = 1;
    harness.refdef.dlights = vec![Dlight::new(Vec3::new(100.0, 0.0, 0.0), Vec3::new(1.0, 0.5, 0.0), 200.0)];

    let (result, _frame, log) = harness.render(config());
    let counters = result.unwrap();

    assert_eq!(log.draws(), vec![6, 6, 6]);
    assert_eq!(
        log.pipelines(),
        vec![pipeline(STAGE_PIPELINE), pipeline(DLIGHT_PIPELINE), pipeline(FOG_PIPELINE)]
    );
    assert_eq!(counters.batches, 1);
    assert_eq!(counters.surfaces, 1);
    assert_eq!(counters.draw_calls, 3);
    assert_eq!(counters.dlight_vertexes, 4);
    assert_eq!(counters.dlight_indexes, 6);
    assert_eq!(counters.total_indexes, 18);
}

#[test]
fn test_full_batch_is_flushed_before_next_surface() {
    let harness = Harness::new(vec![(0, 1, 0, false), (1, 1, 0, false), (2, 1, 0, false)]);
    let config = config().with_tess_limits(TessLimits {
        max_vertexes: 8,
        max_indexes: 60,
    });
    let (result, _frame, log) = harness.render(config);

    let counters = result.unwrap();
    assert_eq!(counters.batches, 2);
    assert_eq!(log.draws(), vec![12, 6]);
}

#[test]
fn test_surface_larger_than_batch_is_fatal() {
    let harness = Harness::new(vec![(0, 1, 0, false)]);
    let config = config().with_tess_limits(TessLimits {
        max_vertexes: 3,
        max_indexes: 60,
    });
    let (result, _frame, _log) = harness.render(config);

    assert!(matches!(result, Err(RenderError::TessOverflow { max_vertexes: 3, .. })));
}

#[test]
fn test_entity_change_starts_new_batch() {
    let mut harness = Harness::new(Vec::new());
    let sprite = |y: f32| {
        RefEntity::new(RefEntityType::Sprite, Vec3::new(100.0, y, 0.0))
            .with_shader(ShaderHandle(1))
            .with_radius(8.0)
    };
    harness.refdef.entities = vec![sprite(-20.0), sprite(20.0)];

    let (result, frame, log) = harness.render(config());
    let counters = result.unwrap();

    assert_eq!(frame.commands[0].surfaces.len(), 2);
    assert_eq!(counters.batches, 2);
    assert_eq!(log.draws(), vec![6, 6]);
}

#[test]
fn test_world_batch_ignores_entity_past_the_limit() {
    let mut harness = Harness::new(vec![(0, 1, 0, false)]);
    let mut entities: Vec<RefEntity> = (0..1023)
        .map(|_| RefEntity::new(RefEntityType::PortalSurface, Vec3::new(100.0, 0.0, 0.0)))
        .collect();
    entities.push(
        RefEntity::new(RefEntityType::Sprite, Vec3::new(100.0, 0.0, 0.0))
            .with_shader(ShaderHandle(1))
            .with_radius(8.0)
            .with_render_fx(RenderFx::DEPTH_HACK),
    );
    harness.refdef.entities = entities;

    let (result, frame, log) = harness.render(config());
    result.unwrap();

    // the 1024th entity is dropped and must not stand in for the world
    assert_eq!(frame.commands[0].surfaces.len(), 1);
    assert_eq!(viewport_depths(&log), vec![(0.0, 1.0)]);
}
