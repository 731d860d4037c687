//! Frame loop glue: one call to [`Renderer::tick`] per displayed frame.

use std::time::{Duration, Instant};

use log::{debug, info};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::accumulation::AccumulationBuffer;
use crate::camera::Camera;
use crate::controller::{Interaction, Phase, RenderSettings, RenderState, SettingChange, TickPlan};
use crate::device::{CpuDevice, DeviceCapabilities, DeviceDescriptor};
use crate::error::{RenderError, SceneError};
use crate::geometry::{Fp, Vec3f, Vec4f};
use crate::rendering::PathTracer;
use crate::scene::Scene;
use crate::timing::FrameTimings;

pub const MAX_SURFACE_WIDTH: u32 = 1920;
pub const MAX_SURFACE_HEIGHT: u32 = 1080;
const ORBIT_RADIANS_PER_PIXEL: Fp = 0.005;

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub threads: usize,
    pub timestamps: bool,
    pub seed: u64,
    pub readback_latency: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            width: 640,
            height: 480,
            threads: 0,
            timestamps: true,
            seed: 0,
            readback_latency: 1,
        }
    }
}

fn surface_size(width: u32, height: u32) -> Result<(u32, u32), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::ZeroSizedSurface { width, height });
    }
    Ok((width.min(MAX_SURFACE_WIDTH), height.min(MAX_SURFACE_HEIGHT)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: bool,
    pub frame_counter: u32,
    pub phase: Phase,
}

pub struct Renderer {
    scene: Scene,
    camera: Camera,
    accumulation: AccumulationBuffer,
    device: CpuDevice,
    timings: FrameTimings,
    state: RenderState,
    host_rng: Xoshiro256PlusPlus,
    last_tick: Option<Instant>,
    crystal_object: Option<usize>,
    debug_lines: Vec<[Vec3f; 2]>,
}

impl Renderer {
    pub fn new(
        scene: Scene,
        mut camera: Camera,
        settings: RenderSettings,
        config: &RendererConfig,
    ) -> Result<Self, RenderError> {
        let (width, height) = surface_size(config.width, config.height)?;
        if (width, height) != (config.width, config.height) {
            info!("surface clamped to {width}x{height}");
        }
        camera.set_aspect_ratio(width as Fp / height as Fp);
        let device = CpuDevice::new(&DeviceDescriptor {
            capabilities: DeviceCapabilities {
                timestamp_query: config.timestamps,
            },
            threads: config.threads,
            readback_latency: config.readback_latency,
        })?;
        let debug_lines = scene.debug_aabb_lines();
        Ok(Renderer {
            scene,
            camera,
            accumulation: AccumulationBuffer::new(width, height),
            device,
            timings: FrameTimings::default(),
            state: RenderState::new(settings),
            host_rng: Xoshiro256PlusPlus::seed_from_u64(config.seed),
            last_tick: None,
            crystal_object: None,
            debug_lines,
        })
    }

    /// Designates the object the crystal toggle turns to glass.
    pub fn set_crystal_object(&mut self, name: &str) -> Result<(), SceneError> {
        let index = self.scene.object_index(name)?;
        if let Some(previous) = self.crystal_object.replace(index) {
            self.scene.set_material_override(previous, false);
        }
        self.sync_material_override();
        self.state = self.state.clone().request_reset();
        Ok(())
    }

    fn sync_material_override(&mut self) {
        if let Some(index) = self.crystal_object {
            self.scene
                .set_material_override(index, self.state.settings.crystal_object);
        }
    }

    pub fn tick(&mut self) -> TickReport {
        let tick_start = Instant::now();
        let delta = match self.last_tick.replace(tick_start) {
            Some(previous) => {
                let delta = tick_start.duration_since(previous);
                self.timings.record_frame(delta);
                delta
            }
            None => Duration::ZERO,
        };

        if let Some(device_time) = self.device.poll() {
            self.timings.record_device(device_time);
        }

        let (state, plan) = self.state.clone().tick(delta, &mut self.host_rng);
        self.state = state;

        let mut device_time = Duration::ZERO;
        let dispatched = match plan {
            TickPlan::Skip => false,
            TickPlan::Dispatch {
                uniforms,
                clear_accumulation,
            } => {
                if clear_accumulation {
                    self.accumulation.clear();
                }
                let kernel = PathTracer::new(
                    &self.scene,
                    &self.camera,
                    self.accumulation.width(),
                    self.accumulation.height(),
                    uniforms,
                );
                device_time =
                    self.device
                        .dispatch(&kernel, &mut self.accumulation, uniforms.sample_count());
                self.device.submit_timestamp_readback();
                self.state = self.state.clone().after_dispatch();
                true
            }
        };

        self.timings
            .record_host(tick_start.elapsed().saturating_sub(device_time));
        TickReport {
            dispatched,
            frame_counter: self.state.frame_counter,
            phase: self.state.phase,
        }
    }

    pub fn apply_setting(&mut self, change: SettingChange) {
        self.state = self.state.clone().apply(change);
        if let SettingChange::CrystalObject(_) = change {
            self.sync_material_override();
        }
    }

    pub fn interact(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::DragMove { dx, dy } if self.state.dragging => {
                self.camera
                    .orbit(-dx * ORBIT_RADIANS_PER_PIXEL, dy * ORBIT_RADIANS_PER_PIXEL);
            }
            Interaction::Zoom { delta } => self.camera.zoom(delta),
            _ => {}
        }
        self.state = self.state.clone().interact(interaction);
    }

    /// Reallocates the accumulation buffer for a new surface size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let (width, height) = surface_size(width, height)?;
        debug!("resizing surface to {width}x{height}");
        self.accumulation = AccumulationBuffer::new(width, height);
        self.camera.set_aspect_ratio(width as Fp / height as Fp);
        self.state = self.state.clone().request_reset();
        Ok(())
    }

    /// Linear, unclamped RGBA radiance means.
    pub fn image(&self) -> &[Vec4f] {
        self.accumulation.image()
    }

    pub fn accumulation(&self) -> &AccumulationBuffer {
        &self.accumulation
    }

    /// Hierarchy wireframe for the overlay, while the overlay is enabled.
    pub fn debug_lines(&self) -> Option<&[[Vec3f; 2]]> {
        self.state.settings.debug_bvh.then_some(self.debug_lines.as_slice())
    }

    pub fn timings(&self) -> &FrameTimings {
        &self.timings
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn frame_counter(&self) -> u32 {
        self.state.frame_counter
    }

    pub fn target_samples(&self) -> u32 {
        self.state.settings.max_samples
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_scene::{demo_scene, DEMO_CRYSTAL_OBJECT};

    fn small_renderer(settings: RenderSettings) -> Renderer {
        let camera = Camera::new(Vec3f::new(0.0, 1.0, 4.0), Vec3f::new(0.0, 0.8, 0.0), 45.0, 1.0);
        let config = RendererConfig {
            width: 12,
            height: 9,
            threads: 2,
            ..Default::default()
        };
        Renderer::new(demo_scene().unwrap(), camera, settings, &config).unwrap()
    }

    fn quick_settings(max_samples: u32) -> RenderSettings {
        RenderSettings {
            max_samples,
            max_bounces: 2,
            ..Default::default()
        }
    }

    #[test]
    fn runs_to_target_then_idles() {
        let mut renderer = small_renderer(quick_settings(3));
        let reports: Vec<_> = (0..5).map(|_| renderer.tick()).collect();
        assert!(reports[..3].iter().all(|r| r.dispatched));
        assert!(reports[3..].iter().all(|r| !r.dispatched));
        assert_eq!(renderer.frame_counter(), 3);
        assert_eq!(renderer.state().phase, Phase::IdleAtTarget);
        assert!(renderer.image().iter().all(|p| p.iter().all(|c| c.is_finite())));
        assert!(renderer.image().iter().any(|p| p.x > 0.0));
    }

    #[test]
    fn timings_are_reported() {
        let mut renderer = small_renderer(quick_settings(4));
        renderer.tick();
        assert_eq!(renderer.timings().frame_time_ms(), None);
        assert!(renderer.timings().host_time_ms().is_some());
        renderer.tick();
        assert!(renderer.timings().frame_time_ms().is_some());
        assert!(renderer.timings().device_time_ms().is_some());
    }

    #[test]
    fn resize_clamps_and_resets() {
        let mut renderer = small_renderer(quick_settings(10));
        renderer.tick();
        renderer.tick();
        renderer.resize(4000, 20).unwrap();
        assert_eq!(renderer.accumulation().width(), MAX_SURFACE_WIDTH);
        assert_eq!(renderer.state().phase, Phase::ResetPending);
        assert!(matches!(
            renderer.resize(0, 10),
            Err(RenderError::ZeroSizedSurface { .. })
        ));
    }

    #[test]
    fn overlay_and_crystal_follow_settings() {
        let mut renderer = small_renderer(quick_settings(2));
        renderer.set_crystal_object(DEMO_CRYSTAL_OBJECT).unwrap();
        assert!(renderer.debug_lines().is_none());
        renderer.apply_setting(SettingChange::DebugBvh(true));
        let lines = renderer.debug_lines().unwrap();
        assert_eq!(lines.len(), renderer.scene().nodes.len() * 12);

        let orb = renderer.scene().object_index(DEMO_CRYSTAL_OBJECT).unwrap();
        renderer.apply_setting(SettingChange::CrystalObject(true));
        assert!(renderer.scene().material_override(orb));
        renderer.apply_setting(SettingChange::CrystalObject(false));
        assert!(!renderer.scene().material_override(orb));
        assert!(renderer.set_crystal_object("nope").is_err());
    }

    #[test]
    fn failed_redesignation_keeps_series() {
        let mut renderer = small_renderer(quick_settings(10));
        renderer.set_crystal_object(DEMO_CRYSTAL_OBJECT).unwrap();
        renderer.apply_setting(SettingChange::CrystalObject(true));
        for _ in 0..3 {
            renderer.tick();
        }
        let orb = renderer.scene().object_index(DEMO_CRYSTAL_OBJECT).unwrap();
        assert_eq!(renderer.state().phase, Phase::Accumulating);

        assert!(matches!(
            renderer.set_crystal_object("nope"),
            Err(SceneError::UnknownObject { .. })
        ));
        assert!(renderer.scene().material_override(orb));
        assert_eq!(renderer.state().phase, Phase::Accumulating);
        assert_eq!(renderer.tick().frame_counter, 4);
    }

    #[test]
    fn dragging_orbits_camera() {
        let mut renderer = small_renderer(quick_settings(10));
        let before = renderer.camera().look_from();
        renderer.interact(Interaction::DragMove { dx: 50.0, dy: 0.0 });
        assert_eq!(renderer.camera().look_from(), before);
        renderer.interact(Interaction::DragStart);
        renderer.interact(Interaction::DragMove { dx: 50.0, dy: 0.0 });
        assert_ne!(renderer.camera().look_from(), before);
        let report = renderer.tick();
        assert!(report.dispatched);
        assert_eq!(report.frame_counter, 1);
        renderer.interact(Interaction::DragEnd);
        assert_eq!(renderer.state().current_max_bounces(), 2);
    }
}
