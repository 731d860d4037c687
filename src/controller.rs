//! Progressive accumulation control: sample counting, resets and the
//! interactive bounce cap.

use std::ops::RangeInclusive;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;

use crate::geometry::Fp;
use crate::rendering::FrameUniforms;

/// Bounce cap while the camera is being dragged.
pub const MAX_BOUNCES_INTERACTING: u32 = 3;
pub const MAX_SAMPLES_RANGE: RangeInclusive<u32> = 1..=10000;
pub const MAX_BOUNCES_RANGE: RangeInclusive<u32> = 1..=16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    pub max_samples: u32,
    pub max_bounces: u32,
    pub debug_bvh: bool,
    pub debug_normals: bool,
    pub phong_shading: bool,
    pub crystal_object: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            max_samples: 5000,
            max_bounces: 8,
            debug_bvh: false,
            debug_normals: false,
            phong_shading: true,
            crystal_object: false,
        }
    }
}

impl RenderSettings {
    pub fn clamped(mut self) -> Self {
        self.max_samples = clamp_to(self.max_samples, &MAX_SAMPLES_RANGE);
        self.max_bounces = clamp_to(self.max_bounces, &MAX_BOUNCES_RANGE);
        self
    }

    pub fn apply(&mut self, change: SettingChange) {
        match change {
            SettingChange::MaxSamples(n) => self.max_samples = clamp_to(n, &MAX_SAMPLES_RANGE),
            SettingChange::MaxBounces(n) => self.max_bounces = clamp_to(n, &MAX_BOUNCES_RANGE),
            SettingChange::DebugBvh(on) => self.debug_bvh = on,
            SettingChange::DebugNormals(on) => self.debug_normals = on,
            SettingChange::PhongShading(on) => self.phong_shading = on,
            SettingChange::CrystalObject(on) => self.crystal_object = on,
        }
    }
}

fn clamp_to(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingChange {
    MaxSamples(u32),
    MaxBounces(u32),
    DebugBvh(bool),
    DebugNormals(bool),
    PhongShading(bool),
    CrystalObject(bool),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interaction {
    DragStart,
    DragMove { dx: Fp, dy: Fp },
    DragEnd,
    Zoom { delta: Fp },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    IdleAtTarget,
    Accumulating,
    ResetPending,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickPlan {
    Skip,
    Dispatch {
        uniforms: FrameUniforms,
        /// Set on the first frame of a series; stale averages must go.
        clear_accumulation: bool,
    },
}

/// Everything the frame loop carries from one tick to the next.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    pub phase: Phase,
    pub frame_counter: u32,
    pub settings: RenderSettings,
    pub dragging: bool,
    pub seed: [Fp; 3],
    pub elapsed: Duration,
}

impl RenderState {
    pub fn new(settings: RenderSettings) -> Self {
        RenderState {
            phase: Phase::ResetPending,
            frame_counter: 0,
            settings: settings.clamped(),
            dragging: false,
            seed: [0.0; 3],
            elapsed: Duration::ZERO,
        }
    }

    pub fn current_max_bounces(&self) -> u32 {
        if self.dragging {
            MAX_BOUNCES_INTERACTING
        } else {
            self.settings.max_bounces
        }
    }

    pub fn request_reset(mut self) -> Self {
        if self.phase != Phase::ResetPending {
            debug!("accumulation reset requested at frame {}", self.frame_counter);
        }
        self.phase = Phase::ResetPending;
        self
    }

    pub fn apply(mut self, change: SettingChange) -> Self {
        self.settings.apply(change);
        self.request_reset()
    }

    pub fn interact(mut self, interaction: Interaction) -> Self {
        match interaction {
            Interaction::DragStart if self.dragging => return self,
            Interaction::DragStart => self.dragging = true,
            Interaction::DragEnd if !self.dragging => return self,
            Interaction::DragEnd => self.dragging = false,
            Interaction::DragMove { .. } if !self.dragging => return self,
            Interaction::DragMove { .. } | Interaction::Zoom { .. } => {}
        }
        self.request_reset()
    }

    /// Decides what this tick does. `delta` is the wall-clock time since the
    /// previous tick; it only counts towards `elapsed` while accumulating.
    pub fn tick<R: Rng + ?Sized>(mut self, delta: Duration, rng: &mut R) -> (RenderState, TickPlan) {
        let clear_accumulation = match self.phase {
            Phase::IdleAtTarget => return (self, TickPlan::Skip),
            Phase::ResetPending => {
                self.frame_counter = 0;
                self.elapsed = Duration::ZERO;
                self.phase = Phase::Accumulating;
                debug!("starting accumulation, {} bounces", self.current_max_bounces());
                true
            }
            Phase::Accumulating => {
                self.elapsed += delta;
                false
            }
        };
        if self.frame_counter >= self.settings.max_samples {
            self.phase = Phase::IdleAtTarget;
            return (self, TickPlan::Skip);
        }
        self.seed = [rng.gen(), rng.gen(), rng.gen()];
        let uniforms = FrameUniforms {
            seed: self.seed,
            frame_counter: self.frame_counter,
            max_bounces: self.current_max_bounces(),
            flat_shading: !self.settings.phong_shading,
            debug_normals: self.settings.debug_normals,
        };
        (
            self,
            TickPlan::Dispatch {
                uniforms,
                clear_accumulation,
            },
        )
    }

    pub fn after_dispatch(mut self) -> Self {
        self.frame_counter += 1;
        if self.frame_counter >= self.settings.max_samples {
            info!(
                "reached {} samples in {:.2}s",
                self.frame_counter,
                self.elapsed.as_secs_f64()
            );
            self.phase = Phase::IdleAtTarget;
        }
        self
    }

    pub fn progress_percent(&self) -> f64 {
        self.frame_counter as f64 / self.settings.max_samples as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const TICK: Duration = Duration::from_millis(16);

    fn run_frame(state: RenderState, rng: &mut Xoshiro256PlusPlus) -> (RenderState, TickPlan) {
        let (state, plan) = state.tick(TICK, rng);
        match plan {
            TickPlan::Dispatch { .. } => (state.after_dispatch(), plan),
            TickPlan::Skip => (state, plan),
        }
    }

    #[test]
    fn single_sample_budget_goes_idle() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let settings = RenderSettings {
            max_samples: 1,
            max_bounces: 1,
            ..Default::default()
        };
        let (state, plan) = run_frame(RenderState::new(settings), &mut rng);
        assert!(matches!(plan, TickPlan::Dispatch { .. }));
        assert_eq!(state.frame_counter, 1);
        assert_eq!(state.phase, Phase::IdleAtTarget);
        for _ in 0..5 {
            let (next, plan) = run_frame(state.clone(), &mut rng);
            assert_eq!(plan, TickPlan::Skip);
            assert_eq!(next, state);
        }
    }

    #[test]
    fn setting_change_restarts_series() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut state = RenderState::new(RenderSettings::default());
        for _ in 0..4 {
            state = run_frame(state, &mut rng).0;
        }
        assert_eq!(state.frame_counter, 4);
        assert!(state.elapsed > Duration::ZERO);

        let state = state.apply(SettingChange::DebugBvh(true));
        assert_eq!(state.phase, Phase::ResetPending);
        let (state, plan) = state.tick(TICK, &mut rng);
        assert_eq!(state.frame_counter, 0);
        assert_eq!(state.elapsed, Duration::ZERO);
        match plan {
            TickPlan::Dispatch {
                uniforms,
                clear_accumulation,
            } => {
                assert!(clear_accumulation);
                assert_eq!(uniforms.frame_counter, 0);
                assert_eq!(uniforms.sample_count(), 1);
            }
            TickPlan::Skip => panic!("reset tick must dispatch"),
        }
        let (_, plan) = state.after_dispatch().tick(TICK, &mut rng);
        assert!(matches!(
            plan,
            TickPlan::Dispatch {
                clear_accumulation: false,
                ..
            }
        ));
    }

    #[test]
    fn reset_wakes_idle_state() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let settings = RenderSettings {
            max_samples: 2,
            ..Default::default()
        };
        let mut state = RenderState::new(settings);
        for _ in 0..3 {
            state = run_frame(state, &mut rng).0;
        }
        assert_eq!(state.phase, Phase::IdleAtTarget);
        let state = state.interact(Interaction::Zoom { delta: 1.0 });
        let (state, plan) = run_frame(state, &mut rng);
        assert!(matches!(plan, TickPlan::Dispatch { clear_accumulation: true, .. }));
        assert_eq!(state.frame_counter, 1);
    }

    #[test]
    fn drag_caps_bounces_until_release() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let settings = RenderSettings {
            max_bounces: 12,
            ..Default::default()
        };
        let state = RenderState::new(settings).interact(Interaction::DragStart);
        let mut state = state.interact(Interaction::DragMove { dx: 4.0, dy: 0.0 });
        for _ in 0..3 {
            let (next, plan) = run_frame(state, &mut rng);
            match plan {
                TickPlan::Dispatch { uniforms, .. } => {
                    assert_eq!(uniforms.max_bounces, MAX_BOUNCES_INTERACTING)
                }
                TickPlan::Skip => panic!("dragging must keep dispatching"),
            }
            state = next.interact(Interaction::DragMove { dx: 1.0, dy: 1.0 });
        }
        let state = state.interact(Interaction::DragEnd);
        assert!(!state.dragging);
        assert_eq!(state.current_max_bounces(), 12);
        let (_, plan) = state.tick(TICK, &mut rng);
        match plan {
            TickPlan::Dispatch {
                uniforms,
                clear_accumulation,
            } => {
                assert_eq!(uniforms.max_bounces, 12);
                assert!(clear_accumulation);
            }
            TickPlan::Skip => panic!("release must restart accumulation"),
        }
    }

    #[test]
    fn stray_drag_events_are_ignored() {
        let state = RenderState {
            phase: Phase::Accumulating,
            frame_counter: 7,
            ..RenderState::new(RenderSettings::default())
        };
        assert_eq!(state.clone().interact(Interaction::DragEnd), state);
        assert_eq!(
            state.clone().interact(Interaction::DragMove { dx: 3.0, dy: 2.0 }),
            state
        );
    }

    #[test]
    fn settings_are_clamped() {
        let mut settings = RenderSettings::default();
        settings.apply(SettingChange::MaxSamples(0));
        settings.apply(SettingChange::MaxBounces(100));
        assert_eq!(settings.max_samples, 1);
        assert_eq!(settings.max_bounces, 16);
    }

    #[test]
    fn seed_changes_every_dispatch() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let (state, _) = run_frame(RenderState::new(RenderSettings::default()), &mut rng);
        let first = state.seed;
        let (state, _) = run_frame(state, &mut rng);
        assert_ne!(first, state.seed);
        assert!(state.seed.iter().all(|s| (0.0..1.0).contains(s)));
        assert!((state.progress_percent() - 0.04).abs() < 1e-9);
    }
}
