//! One mounted simulation screen.
//!
//! A `Scene` owns the model, the drag controller and the render driver and
//! is the only writer of [`SimulationState`]. Hosts call it from a single
//! thread: gesture events, frame ticks and selection changes each run to
//! completion. After [`Scene::teardown`] (or drop) nothing mutates the state
//! any more and outstanding frame tokens and expiry timers are inert.

use crate::config::SimulationConfig;
use crate::controller::{
    DragController, DragPhase, GestureArbiter, GestureEvent, GestureOutcome, PositionBounds,
};
use crate::driver::{DriverConfig, ExpiryTimer, FrameParams, RenderDriver};
use crate::error::SimResult;
use crate::fluid::{fluid_by_key, FluidChoice};
use crate::model::{step_atmosphere, DerivedQuantities, PhysicsModel, ATMOSPHERIC_PRESSURE};
use log::{debug, warn};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationState {
    pub object_position: f64,
    pub base_water_level: f64,
    pub is_dragging: bool,
    pub selected_fluid: FluidChoice,
    /// Pa on the fluid surface.
    pub atmospheric_pressure: f64,
}

/// Everything observable about a scene, for comparisons in tests and logs.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSnapshot {
    pub state: SimulationState,
    pub derived: DerivedQuantities,
    pub phase: DragPhase,
    pub ripple_ids: Vec<u64>,
}

/// Permission to run one frame, handed out by [`Scene::request_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameToken {
    generation: u64,
}

pub struct Scene {
    model: PhysicsModel,
    state: SimulationState,
    derived: DerivedQuantities,
    controller: DragController,
    driver: RenderDriver,
    generation: u64,
    mounted: bool,
}

impl Scene {
    /// Validates `config` and places the object fully out of the fluid.
    ///
    /// `object_x` only positions ripples; the model is vertical.
    pub fn mount(
        config: SimulationConfig,
        fluid: FluidChoice,
        arbiter: Box<dyn GestureArbiter>,
        object_x: f64,
    ) -> SimResult<Self> {
        let model = PhysicsModel::new(config)?;
        let cfg = model.config();
        let base_water_level = cfg.initial_water_level;
        let bounds = PositionBounds {
            min: cfg.min_position(base_water_level),
            max: cfg.max_position(),
        };
        let controller = DragController::new(bounds.min, bounds, arbiter);
        let object_position = controller.position();
        let derived = model.compute(&fluid, object_position, base_water_level);
        let driver = RenderDriver::new(
            DriverConfig::for_scene(cfg, object_x),
            object_position,
            derived.current_water_level,
            derived.submerged_volume > 0.0,
        );
        debug!(
            "scene mounted: {} ({} kg/m³), object {} kg/m³",
            fluid.name,
            fluid.density(),
            cfg.object_density
        );

        Ok(Self {
            model,
            state: SimulationState {
                object_position,
                base_water_level,
                is_dragging: false,
                selected_fluid: fluid,
                atmospheric_pressure: ATMOSPHERIC_PRESSURE,
            },
            derived,
            controller,
            driver,
            generation: 0,
            mounted: true,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        self.model.config()
    }

    pub fn model(&self) -> &PhysicsModel {
        &self.model
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn derived(&self) -> &DerivedQuantities {
        &self.derived
    }

    pub fn phase(&self) -> DragPhase {
        self.controller.phase()
    }

    pub fn bounds(&self) -> PositionBounds {
        self.controller.bounds()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn on_gesture(&mut self, event: GestureEvent) -> GestureOutcome {
        if !self.mounted {
            return GestureOutcome::Ignored;
        }
        let outcome = self.controller.on_gesture(event);
        self.sync();
        outcome
    }

    pub fn request_position(&mut self, y: f64) -> GestureOutcome {
        if !self.mounted {
            return GestureOutcome::Ignored;
        }
        let outcome = self.controller.request_position(y);
        self.sync();
        outcome
    }

    pub fn select_fluid(&mut self, fluid: FluidChoice) {
        if !self.mounted {
            return;
        }
        debug!("fluid -> {} ({} kg/m³)", fluid.name, fluid.density());
        self.state.selected_fluid = fluid;
        self.sync();
    }

    /// Moves the air pressure by `steps` 5 kPa steps, within 80..=120 kPa.
    pub fn adjust_atmosphere(&mut self, steps: i32) -> f64 {
        if self.mounted {
            let pa = step_atmosphere(self.state.atmospheric_pressure, steps);
            debug!("air pressure -> {pa:.0} Pa");
            self.state.atmospheric_pressure = pa;
            self.sync();
        }
        self.state.atmospheric_pressure
    }

    /// Sets the air pressure, clamped like [`Scene::adjust_atmosphere`].
    pub fn set_atmospheric_pressure(&mut self, pa: f64) {
        if !self.mounted {
            return;
        }
        self.state.atmospheric_pressure = step_atmosphere(pa, 0);
        self.sync();
    }

    /// Switches fluid by catalog key. Unknown keys keep the current fluid.
    pub fn select_fluid_by_key(&mut self, key: &str) -> bool {
        match fluid_by_key(key) {
            Some(fluid) => {
                self.select_fluid(fluid);
                true
            }
            None => {
                warn!(
                    "unknown fluid `{key}`, keeping {}",
                    self.state.selected_fluid.key
                );
                false
            }
        }
    }

    /// `None` once the scene is torn down.
    pub fn request_frame(&self) -> Option<FrameToken> {
        self.mounted.then_some(FrameToken {
            generation: self.generation,
        })
    }

    /// Runs one animation frame at monotonic time `now`.
    pub fn on_frame(&mut self, token: FrameToken, now: Duration) -> Option<FrameParams> {
        if !self.mounted || token.generation != self.generation {
            return None;
        }
        let params = self.driver.frame(
            now,
            self.controller.phase(),
            self.controller.position(),
            &self.derived,
        )?;
        if params.settled {
            self.controller.settle_finished();
            self.sync();
        }
        Some(params)
    }

    /// Expiry reminders for ripples spawned since the last call, for hosts
    /// that schedule ripple removal separately from frames.
    pub fn take_expiry_timers(&mut self) -> Vec<ExpiryTimer> {
        self.driver.take_expiry_timers()
    }

    pub fn expire_ripple(&mut self, timer: ExpiryTimer) -> bool {
        self.mounted && self.driver.expire(timer)
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            state: self.state.clone(),
            derived: self.derived,
            phase: self.controller.phase(),
            ripple_ids: self.driver.ripples().iter().map(|r| r.id).collect(),
        }
    }

    /// Stops animations, clears ripples, releases gesture arbitration.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.generation += 1;
        self.controller.shutdown();
        self.driver.stop();
        self.state.is_dragging = false;
        debug!("scene torn down");
    }

    fn sync(&mut self) {
        self.state.object_position = self.controller.position();
        self.state.is_dragging = self.controller.is_dragging();
        self.derived = self.model.compute_at(
            &self.state.selected_fluid,
            self.state.object_position,
            self.state.base_water_level,
            self.state.atmospheric_pressure,
        );
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.teardown();
    }
}
