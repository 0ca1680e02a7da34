//! Headless demo: builds a small scene across three layered batchers, renders a
//! few frames into an offscreen texture and logs what each frame cost.

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use tessel_engine::config::{BatcherConfig, EngineConfig, WgpuBackendConfig};
use tessel_engine::coords::ClipRect;
use tessel_engine::logging::{init_logging, LoggingConfig};
use tessel_engine::paint::Color;
use tessel_engine::render::gpu::{HeadlessGpu, HeadlessInit, RenderTarget, WgpuBackend};
use tessel_engine::render::{BatcherId, FrameStats, RenderPass};
use tessel_engine::scene::{quad, DrawableId, PrimitiveType, RenderState, Scene, StateAttr, TextureId};

const FRAMES: u32 = 4;
const CHECKER: TextureId = TextureId(1);

struct Demo {
    scene: Scene,
    pass: RenderPass,
    tiles: Vec<DrawableId>,
    orbit_root: DrawableId,
    sprites: BatcherId,
    overlay: BatcherId,
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gpu = pollster::block_on(HeadlessGpu::new(HeadlessInit::default()))
        .context("failed to initialize headless GPU")?;
    let mut backend = WgpuBackend::new(WgpuBackendConfig {
        clear_color: Some(Color::from_straight(0.08, 0.09, 0.12, 1.0)),
        ..Default::default()
    });
    backend
        .upload_texture_rgba8(&gpu.ctx(), CHECKER, 8, 8, &checker_pixels(8))
        .context("failed to upload checker texture")?;

    let mut demo = build_scene()?;

    for frame in 0..FRAMES {
        mutate(&mut demo, frame)?;

        let stats = demo.pass.render_frame(&mut demo.scene, &mut backend)?;

        let mut encoder = gpu.create_encoder();
        let encoded = {
            let mut target = RenderTarget::new(&mut encoder, gpu.view());
            backend.encode(&gpu.ctx(), &mut target)
        };
        gpu.submit(encoder);

        report(frame, &stats, encoded, &demo);
    }

    log::info!("rendered {FRAMES} frames into a {:?} target", gpu.target().size());
    Ok(())
}

fn build_scene() -> Result<Demo> {
    let mut scene = Scene::new(EngineConfig {
        log_frame_stats: true,
        ..Default::default()
    });
    let mut pass = RenderPass::new();

    let background = pass.create_batcher(BatcherConfig::default().with_label("background"));
    let sprites = pass.create_batcher(
        BatcherConfig::default()
            .with_label("sprites")
            .with_layer(1)
            .with_max_vertices(96),
    );
    let overlay = pass.create_batcher(BatcherConfig::default().with_label("overlay").with_layer(2));

    // Static backdrop, drawn from its own buffer.
    let backdrop = scene.create_drawable(
        quad(0.0, 0.0, 640.0, 480.0, Color::from_straight(0.15, 0.16, 0.2, 1.0)),
        RenderState::default(),
    );
    scene
        .drawable_mut(backdrop)
        .context("backdrop vanished")?
        .set_locked(true);
    pass.attach(&mut scene, backdrop, background)?;

    // A grid of tiles; every third one textured. The small sprite batcher
    // overflows and flushes early.
    let mut tiles = Vec::new();
    for row in 0..6 {
        for col in 0..8 {
            let i = row * 8 + col;
            let mut state = RenderState::default().with_depth((i % 5) as f32);
            if i % 3 == 0 {
                state = state.with_texture(CHECKER);
            }
            let color = Color::from_straight(col as f32 / 8.0, row as f32 / 6.0, 0.6, 0.9);
            let id = scene.create_drawable(
                quad(40.0 + col as f32 * 70.0, 40.0 + row as f32 * 60.0, 60.0, 50.0, color),
                state,
            );
            pass.attach(&mut scene, id, sprites)?;
            tiles.push(id);
        }
    }

    // Children follow the root's transform.
    let orbit_root = scene.create_drawable(
        quad(-10.0, -10.0, 20.0, 20.0, Color::WHITE),
        RenderState::default().with_depth(10.0),
    );
    pass.attach(&mut scene, orbit_root, sprites)?;
    let root_transform = scene.drawable(orbit_root).context("orbit root vanished")?.transform();
    for k in 0..4 {
        let angle = k as f32 * std::f32::consts::FRAC_PI_2;
        let local = Mat4::from_translation(Vec3::new(angle.cos() * 40.0, angle.sin() * 40.0, 0.0));
        let child = scene.create_child_drawable(
            quad(-5.0, -5.0, 10.0, 10.0, Color::from_straight(1.0, 0.8, 0.2, 1.0)),
            RenderState::default().with_depth(11.0),
            local,
            root_transform,
        )?;
        pass.attach(&mut scene, child, sprites)?;
    }

    // Clipped line strip in the overlay.
    let border = scene.create_drawable(
        quad(20.0, 20.0, 600.0, 440.0, Color::WHITE),
        RenderState::default()
            .with_primitive(PrimitiveType::LineStrip)
            .with_clip(ClipRect::new(0.0, 0.0, 320.0, 480.0)),
    );
    pass.attach(&mut scene, border, overlay)?;

    Ok(Demo {
        scene,
        pass,
        tiles,
        orbit_root,
        sprites,
        overlay,
    })
}

fn mutate(demo: &mut Demo, frame: u32) -> Result<()> {
    let scene = &mut demo.scene;

    // Shuffle a few tiles in depth; only real changes reach the index.
    for (i, &id) in demo.tiles.iter().enumerate().skip(frame as usize % 3).step_by(7) {
        scene.set_state(id, StateAttr::Depth(((i as u32 + frame) % 5) as f32))?;
    }
    if frame == 2 {
        scene.set_state(demo.tiles[1], StateAttr::Texture(Some(CHECKER)))?;
    }

    let t = scene.drawable(demo.orbit_root).context("orbit root vanished")?.transform();
    let local = Mat4::from_translation(Vec3::new(320.0, 240.0, 0.0))
        * Mat4::from_rotation_z(frame as f32 * 0.3);
    scene.transforms_mut().set_local(t, local)?;

    // One-frame marker.
    let marker = scene.create_drawable(
        quad(600.0, 10.0 + frame as f32 * 12.0, 10.0, 10.0, Color::from_straight(1.0, 0.2, 0.2, 1.0)),
        RenderState::default(),
    );
    scene.drawable_mut(marker).context("marker vanished")?.set_immediate(true);
    demo.pass.attach(scene, marker, demo.overlay)?;
    Ok(())
}

fn report(frame: u32, stats: &FrameStats, encoded: usize, demo: &Demo) {
    log::info!(
        "frame {frame}: {} draws ({encoded} encoded), {} vertices, {} dynamic / {} static, \
         {} overflow flushes, {} static uploads",
        stats.draw_calls,
        stats.vertices,
        stats.dynamic_batched,
        stats.static_batched,
        stats.overflow_flushes,
        stats.static_uploads,
    );
    if let Some(sprites) = demo.pass.batcher(demo.sprites) {
        log::debug!("sprites batcher: {} drawables, last frame {:?}", sprites.len(), sprites.stats());
    }
}

/// Two-tone 8x8 checkerboard, premultiplied RGBA8.
fn checker_pixels(size: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x + y) % 2 == 0 {
                [255, 255, 255, 255]
            } else {
                [96, 96, 96, 255]
            }
        })
        .collect()
}
