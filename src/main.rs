mod cli;
mod logger;

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use progressive_tracer::camera::Camera;
use progressive_tracer::controller::{Interaction, Phase, RenderSettings};
use progressive_tracer::demo_scene::{demo_camera, demo_scene};
use progressive_tracer::geometry::{Fp, Vec3f};
use progressive_tracer::gltf_to_scene::load_gltf_scene;
use progressive_tracer::output::save_image;
use progressive_tracer::progress::{format_timings, SampleProgress};
use progressive_tracer::renderer::{Renderer, RendererConfig};

use crate::cli::Args;
use crate::logger::init_logger;

const ORBIT_STEPS: u32 = 12;
// Pixels of pointer travel per radian, matching the renderer's orbit speed.
const PIXELS_PER_RADIAN: Fp = 200.0;

fn build_camera(args: &Args, scene_camera: Option<Camera>) -> Camera {
    let aspect = args.width as Fp / args.height.max(1) as Fp;
    let base = scene_camera.unwrap_or_else(|| demo_camera(aspect));
    let look_from = args.look_from.map(Vec3f::from).unwrap_or(base.look_from());
    let look_at = args.look_at.map(Vec3f::from).unwrap_or(base.look_at());
    let vfov = args.vfov.unwrap_or(base.vfov());
    let focus_dist = args.focus_dist.unwrap_or((look_from - look_at).norm());
    Camera::new(look_from, look_at, vfov, aspect).with_defocus(args.defocus_angle, focus_dist)
}

/// Drags the camera across a few ticks before the final accumulation.
fn scripted_orbit(renderer: &mut Renderer, degrees: Fp) {
    let step = degrees.to_radians() * PIXELS_PER_RADIAN / ORBIT_STEPS as Fp;
    renderer.interact(Interaction::DragStart);
    for _ in 0..ORBIT_STEPS {
        renderer.interact(Interaction::DragMove { dx: -step, dy: 0.0 });
        renderer.tick();
    }
    renderer.interact(Interaction::DragEnd);
    info!(
        "orbited {degrees} degrees, camera now at {:?}",
        renderer.camera().look_from()
    );
}

fn write_debug_lines(path: &Path, lines: &[[Vec3f; 2]]) -> Result<()> {
    let mut out = std::io::BufWriter::new(fs::File::create(path)?);
    for [a, b] in lines {
        writeln!(out, "{} {} {} {} {} {}", a.x, a.y, a.z, b.x, b.y, b.z)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_level.into());

    let (scene, scene_camera) = match &args.scene {
        Some(path) => {
            let imported = load_gltf_scene(path)
                .with_context(|| format!("failed to load scene {}", path.display()))?;
            (imported.scene, imported.camera)
        }
        None => (demo_scene().context("failed to build the built-in scene")?, None),
    };
    let has_crystal = scene.object_index(&args.crystal_object).is_ok();

    let camera = build_camera(&args, scene_camera);
    let settings = RenderSettings {
        max_samples: args.max_samples,
        max_bounces: args.max_bounces,
        debug_bvh: args.debug_bvh,
        debug_normals: args.debug_normals,
        phong_shading: !args.flat_shading,
        crystal_object: args.crystal,
    };
    let config = RendererConfig {
        width: args.width,
        height: args.height,
        threads: args.threads,
        timestamps: !args.no_timestamps,
        seed: args.seed,
        ..Default::default()
    };
    let mut renderer = Renderer::new(scene, camera, settings, &config)?;
    if has_crystal {
        renderer.set_crystal_object(&args.crystal_object)?;
    } else if args.crystal {
        warn!(
            "no object named `{}`, crystal toggle has no effect",
            args.crystal_object
        );
    }

    if let Some(degrees) = args.orbit {
        scripted_orbit(&mut renderer, degrees);
    }

    let progress = SampleProgress::new(renderer.target_samples(), !args.quiet);
    progress.reset(renderer.target_samples());
    loop {
        let report = renderer.tick();
        progress.update(report.frame_counter, renderer.timings());
        if report.phase == Phase::IdleAtTarget {
            break;
        }
    }
    progress.finish();
    info!(
        "{} samples in {:.2}s, {}",
        renderer.frame_counter(),
        renderer.state().elapsed.as_secs_f64(),
        format_timings(renderer.timings())
    );

    save_image(renderer.accumulation(), &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    if let Some(lines) = renderer.debug_lines() {
        let path = args.output.with_extension("lines.txt");
        write_debug_lines(&path, lines)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("{} overlay segments written to {}", lines.len(), path.display());
    }
    Ok(())
}
