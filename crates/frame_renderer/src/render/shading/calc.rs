//! Per-vertex stage computations: deforms, colors, texture coordinates and
//! animated image selection

use ash::vk;

use crate::foundation::math::Vec3;
use crate::render::tess::TessBatch;
use crate::scene::{AlphaGen, CinematicPlayer, ColorGen, Deform, ShaderStage, TexCoordGen, TexMod, TextureBundle};

/// Fixed-point scale of animation frame selection
const FUNCTABLE_SIZE: f32 = 1024.0;
const FUNCTABLE_SHIFT: u32 = 10;

/// Apply vertex deforms in order
pub fn deform_geometry(tess: &mut TessBatch, deforms: &[Deform]) {
    let time = tess.shader_time;
    for deform in deforms {
        match deform {
            Deform::Wave { spread, wave } => {
                for (xyz, normal) in tess.xyz.iter_mut().zip(&tess.normals) {
                    let phase = (xyz[0] + xyz[1] + xyz[2]) * spread;
                    let scale = wave.evaluate(time, phase);
                    for j in 0..3 {
                        xyz[j] += normal[j] * scale;
                    }
                }
            }
            Deform::Move { vector, wave } => {
                let offset = vector * wave.evaluate(time, 0.0);
                for xyz in &mut tess.xyz {
                    for j in 0..3 {
                        xyz[j] += offset[j];
                    }
                }
            }
        }
    }
}

/// Fill the stage colors from the stage's color and alpha generators
pub fn compute_colors(stage: &ShaderStage, tess: &mut TessBatch) {
    let time = tess.shader_time;
    let colors = &mut tess.svars.colors;
    colors.clear();

    let wave_gray = match stage.rgb_gen {
        ColorGen::Wave(wave) => (wave.evaluate(time, 0.0).clamp(0.0, 1.0) * 255.0) as u8,
        _ => 255,
    };

    colors.extend(tess.vertex_colors.iter().map(|&vertex| {
        let [r, g, b, a] = vertex;
        let rgb = match stage.rgb_gen {
            ColorGen::Identity => [255, 255, 255],
            ColorGen::Const(c) => c,
            ColorGen::Vertex | ColorGen::ExactVertex => [r, g, b],
            ColorGen::OneMinusVertex => [255 - r, 255 - g, 255 - b],
            ColorGen::Wave(_) => [wave_gray; 3],
        };
        let alpha = match stage.alpha_gen {
            AlphaGen::Identity => 255,
            AlphaGen::Skip => match stage.rgb_gen {
                ColorGen::Vertex | ColorGen::ExactVertex => a,
                _ => 255,
            },
            AlphaGen::Const(alpha) => alpha,
            AlphaGen::Vertex => a,
            AlphaGen::OneMinusVertex => 255 - a,
        };
        [rgb[0], rgb[1], rgb[2], alpha]
    }));
}

/// Fill the texture coordinates of texture unit `unit`
pub fn compute_tex_coords(bundle: &TextureBundle, tess: &mut TessBatch, unit: usize, view_origin: &Vec3) {
    let time = tess.shader_time;
    let out = &mut tess.svars.tex_coords[unit];
    out.clear();

    match bundle.tc_gen {
        TexCoordGen::Texture => out.extend(tess.tex_coords.iter().map(|tc| tc[0])),
        TexCoordGen::Lightmap => out.extend(tess.tex_coords.iter().map(|tc| tc[1])),
        TexCoordGen::Vector([s, t]) => out.extend(tess.xyz.iter().map(|v| {
            let p = Vec3::new(v[0], v[1], v[2]);
            [p.dot(&s), p.dot(&t)]
        })),
        TexCoordGen::EnvironmentMapped => {
            out.extend(tess.xyz.iter().zip(&tess.normals).map(|(v, n)| {
                let normal = Vec3::new(n[0], n[1], n[2]);
                let viewer = (view_origin - Vec3::new(v[0], v[1], v[2]))
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vec3::zeros);
                let reflected = normal * 2.0 * normal.dot(&viewer) - viewer;
                [0.5 + reflected.y * 0.5, 0.5 - reflected.z * 0.5]
            }));
        }
    }

    for tc_mod in &bundle.tc_mods {
        match *tc_mod {
            TexMod::Scroll([speed_s, speed_t]) => {
                let ds = (speed_s * time).fract();
                let dt = (speed_t * time).fract();
                for st in out.iter_mut() {
                    st[0] += ds;
                    st[1] += dt;
                }
            }
            TexMod::Scale([scale_s, scale_t]) => {
                for st in out.iter_mut() {
                    st[0] *= scale_s;
                    st[1] *= scale_t;
                }
            }
        }
    }
}

/// Frame of an animated bundle at `time`
pub fn animation_frame(bundle: &TextureBundle, time: f32) -> usize {
    let frames = bundle.images.len();
    if frames <= 1 {
        return 0;
    }

    let fixed = (time * bundle.animation_speed * FUNCTABLE_SIZE) as i64;
    let index = (fixed >> FUNCTABLE_SHIFT).max(0) as usize;
    index % frames
}

/// Descriptor set to bind for a bundle, running video bundles first
pub fn bind_animated_image(
    bundle: &TextureBundle,
    time: f32,
    cinematics: &mut dyn CinematicPlayer,
) -> vk::DescriptorSet {
    if let Some(video) = bundle.video_map {
        cinematics.run(video);
        cinematics.upload(video);
        return bundle.images.first().copied().unwrap_or_default();
    }

    bundle
        .images
        .get(animation_frame(bundle, time))
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TessLimits;
    use crate::render::tess::TessVertex;
    use crate::scene::{CinematicHandle, WaveFunc, Waveform};
    use approx::assert_relative_eq;
    use ash::vk::Handle;

    fn batch() -> TessBatch {
        let mut tess = TessBatch::new(TessLimits::default());
        for (i, color) in [[10u8, 20, 30, 40], [200, 100, 50, 25]].into_iter().enumerate() {
            tess.push_vertex(TessVertex {
                xyz: Vec3::new(i as f32, 0.0, 0.0),
                normal: Vec3::z(),
                st: [i as f32 * 0.5, 0.25],
                lightmap: [0.75, i as f32],
                color,
            })
            .unwrap();
        }
        tess
    }

    fn frames(count: u64) -> Vec<vk::DescriptorSet> {
        (1..=count).map(vk::DescriptorSet::from_raw).collect()
    }

    #[test]
    fn test_animation_frame_selection() {
        let bundle = TextureBundle::animated(frames(4), 2.0);
        assert_eq!(animation_frame(&bundle, 0.0), 0);
        assert_eq!(animation_frame(&bundle, 0.6), 1);
        assert_eq!(animation_frame(&bundle, 2.1), 0);
        // negative time clamps to the first frame
        assert_eq!(animation_frame(&bundle, -3.0), 0);
        assert_eq!(animation_frame(&TextureBundle::image(vk::DescriptorSet::from_raw(9)), 100.0), 0);
    }

    #[test]
    fn test_video_bundle_runs_cinematic() {
        #[derive(Default)]
        struct Player(Vec<&'static str>);
        impl CinematicPlayer for Player {
            fn run(&mut self, _handle: CinematicHandle) {
                self.0.push("run");
            }
            fn upload(&mut self, _handle: CinematicHandle) {
                self.0.push("upload");
            }
        }

        let mut bundle = TextureBundle::image(vk::DescriptorSet::from_raw(5));
        bundle.video_map = Some(CinematicHandle(0));
        let mut player = Player::default();
        let set = bind_animated_image(&bundle, 1.0, &mut player);
        assert_eq!(set.as_raw(), 5);
        assert_eq!(player.0, vec!["run", "upload"]);
    }

    #[test]
    fn test_color_generators() {
        let mut tess = batch();
        let stage = ShaderStage::default().with_color(ColorGen::OneMinusVertex, AlphaGen::Vertex);
        compute_colors(&stage, &mut tess);
        assert_eq!(tess.svars.colors, vec![[245, 235, 225, 40], [55, 155, 205, 25]]);

        let stage = ShaderStage::default().with_color(ColorGen::Const([1, 2, 3]), AlphaGen::Const(9));
        compute_colors(&stage, &mut tess);
        assert_eq!(tess.svars.colors[1], [1, 2, 3, 9]);
    }

    #[test]
    fn test_tex_coord_generators_and_mods() {
        let mut tess = batch();
        tess.shader_time = 1.25;

        let lightmap = TextureBundle::lightmap(vk::DescriptorSet::null());
        compute_tex_coords(&lightmap, &mut tess, 1, &Vec3::zeros());
        assert_eq!(tess.svars.tex_coords[1], vec![[0.75, 0.0], [0.75, 1.0]]);

        let mut scrolled = TextureBundle::image(vk::DescriptorSet::null());
        scrolled.tc_mods = vec![TexMod::Scroll([1.0, 0.0]), TexMod::Scale([2.0, 2.0])];
        compute_tex_coords(&scrolled, &mut tess, 0, &Vec3::zeros());
        // scroll by fract(1.25) then scale
        assert_relative_eq!(tess.svars.tex_coords[0][1][0], (0.5 + 0.25) * 2.0);
        assert_relative_eq!(tess.svars.tex_coords[0][1][1], 0.5);
    }

    #[test]
    fn test_move_deform() {
        let mut tess = batch();
        let wave = Waveform {
            func: WaveFunc::Sawtooth,
            base: 0.0,
            amplitude: 1.0,
            phase: 0.5,
            frequency: 0.0,
        };
        deform_geometry(&mut tess, &[Deform::Move { vector: Vec3::new(0.0, 0.0, 8.0), wave }]);
        assert_relative_eq!(tess.xyz[1][2], 4.0);
    }
}
