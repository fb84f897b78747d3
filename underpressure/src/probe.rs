//! A measuring point dragged through a column of still fluid.
//!
//! The gauge reads `P = ρ g h` at the probe depth. Depth is kept in
//! centimetres below the surface and moves through the same drag controller
//! as the tank's object, so the probe clamps, damps and arbitrates gestures
//! the same way.

use crate::controller::{
    DragController, DragPhase, GestureArbiter, GestureEvent, GestureOutcome, PositionBounds,
};
use crate::driver::MAX_FRAME_DT;
use crate::easing::{EasedValue, Easing};
use crate::fluid::FluidChoice;
use crate::model::GRAVITY;
use log::debug;
use std::f64::consts::TAU;
use std::time::Duration;

/// Reachable probe depths, cm below the surface.
pub const DEPTH_RANGE_CM: PositionBounds = PositionBounds {
    min: 10.0,
    max: 110.0,
};
pub const START_DEPTH_CM: f64 = 50.0;
/// One grow-and-shrink cycle of the marker while playing.
pub const PULSE_PERIOD: Duration = Duration::from_millis(2000);
const PULSE_SCALE: f64 = 0.3;
const REST_OPACITY: f64 = 0.8;

/// Gauge pressure in Pa at `depth_m` metres below a free surface.
pub fn gauge_pressure(density: f64, depth_m: f64) -> f64 {
    density * GRAVITY * depth_m.max(0.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeFrame {
    /// Depth of the marker as drawn, cm.
    pub depth_cm: f64,
    /// Marker size relative to rest, `1.0..=1.3`.
    pub scale: f64,
    pub opacity: f64,
    pub settled: bool,
}

pub struct PressureProbe {
    controller: DragController,
    marker: EasedValue,
    fluid: FluidChoice,
    playing: bool,
    pulse_since: Option<Duration>,
    last_tick: Option<Duration>,
}

impl PressureProbe {
    pub fn new(fluid: FluidChoice, arbiter: Box<dyn GestureArbiter>) -> Self {
        let controller = DragController::new(START_DEPTH_CM, DEPTH_RANGE_CM, arbiter);
        Self {
            marker: EasedValue::new(controller.position(), Easing::SETTLE),
            controller,
            fluid,
            playing: false,
            pulse_since: None,
            last_tick: None,
        }
    }

    pub fn depth_cm(&self) -> f64 {
        self.controller.position()
    }

    pub fn fluid(&self) -> &FluidChoice {
        &self.fluid
    }

    pub fn phase(&self) -> DragPhase {
        self.controller.phase()
    }

    /// Pa at the logical (not the drawn) depth.
    pub fn pressure(&self) -> f64 {
        gauge_pressure(self.fluid.density(), self.depth_cm() / 100.0)
    }

    pub fn select_fluid(&mut self, fluid: FluidChoice) {
        debug!("probe fluid -> {} ({} kg/m³)", fluid.name, fluid.density());
        self.fluid = fluid;
    }

    /// Move deltas are in centimetres.
    pub fn on_gesture(&mut self, event: GestureEvent) -> GestureOutcome {
        self.controller.on_gesture(event)
    }

    pub fn request_depth(&mut self, depth_cm: f64) -> GestureOutcome {
        self.controller.request_position(depth_cm)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing != self.playing {
            self.playing = playing;
            self.pulse_since = None;
        }
    }

    pub fn frame(&mut self, now: Duration) -> ProbeFrame {
        let dt = match self.last_tick {
            Some(prev) => now.saturating_sub(prev).as_secs_f64().min(MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_tick = Some(now);

        let phase = self.controller.phase();
        self.marker.set_easing(if phase == DragPhase::Dragging {
            Easing::Immediate
        } else {
            Easing::SETTLE
        });
        self.marker.set_target(self.controller.position());
        let depth_cm = self.marker.update(dt);
        let settled = phase == DragPhase::Releasing && self.marker.is_settled();
        if settled {
            self.controller.settle_finished();
        }

        // 0 at rest, 1 at the peak of the pulse
        let pulse = if self.playing {
            let t0 = *self.pulse_since.get_or_insert(now);
            let t = now.saturating_sub(t0).as_secs_f64() / PULSE_PERIOD.as_secs_f64();
            0.5 - 0.5 * (TAU * t.fract()).cos()
        } else {
            0.0
        };

        ProbeFrame {
            depth_cm,
            scale: 1.0 + PULSE_SCALE * pulse,
            opacity: REST_OPACITY + (1.0 - REST_OPACITY) * pulse,
            settled,
        }
    }

    /// Ends any drag and stops the pulse.
    pub fn shutdown(&mut self) {
        self.controller.shutdown();
        self.set_playing(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{NoArbiter, SharedArbiter};
    use crate::fluid::{probe_fluid_by_key, water};
    use approx::assert_abs_diff_eq;

    fn probe() -> PressureProbe {
        PressureProbe::new(water(), Box::new(NoArbiter))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn pressure_is_rho_g_h() {
        let mut p = probe();
        assert_abs_diff_eq!(p.pressure(), 1000.0 * 9.81 * 0.5, epsilon = 1e-9);
        p.request_depth(100.0);
        assert_abs_diff_eq!(p.pressure(), 9810.0, epsilon = 1e-9);
        p.select_fluid(probe_fluid_by_key("mercury").unwrap());
        assert_abs_diff_eq!(p.pressure(), 13600.0 * 9.81, epsilon = 1e-6);
        assert_eq!(gauge_pressure(1000.0, -1.0), 0.0);
    }

    #[test]
    fn depth_is_clamped() {
        let mut p = probe();
        p.request_depth(500.0);
        assert_eq!(p.depth_cm(), 110.0);
        p.request_depth(-20.0);
        assert_eq!(p.depth_cm(), 10.0);

        p.on_gesture(GestureEvent::Start);
        let out = p.on_gesture(GestureEvent::Move {
            delta_y: Some(1000.0),
        });
        assert_eq!(
            out,
            GestureOutcome::Moved {
                from: 10.0,
                to: 110.0,
                clamped: true
            }
        );
    }

    #[test]
    fn drags_are_damped_like_the_tank() {
        let mut p = probe();
        p.on_gesture(GestureEvent::Start);
        p.on_gesture(GestureEvent::Move { delta_y: Some(10.0) });
        assert_abs_diff_eq!(p.depth_cm(), 58.0, epsilon = 1e-12);
        // direct requests wait for the drag to end
        p.request_depth(20.0);
        assert_abs_diff_eq!(p.depth_cm(), 58.0, epsilon = 1e-12);
    }

    #[test]
    fn marker_follows_drag_then_settles() {
        let mut p = probe();
        p.frame(ms(0));
        p.on_gesture(GestureEvent::Start);
        p.on_gesture(GestureEvent::Move { delta_y: Some(25.0) });
        assert_eq!(p.frame(ms(16)).depth_cm, 70.0);
        p.on_gesture(GestureEvent::End);
        let f = p.frame(ms(32));
        assert!(f.settled);
        assert_eq!(p.phase(), DragPhase::Idle);
    }

    #[test]
    fn marker_pulses_only_while_playing() {
        let mut p = probe();
        let rest = p.frame(ms(0));
        assert_eq!(rest.scale, 1.0);
        assert_eq!(rest.opacity, 0.8);

        p.set_playing(true);
        assert_eq!(p.frame(ms(100)).scale, 1.0);
        let peak = p.frame(ms(1100));
        assert_abs_diff_eq!(peak.scale, 1.3, epsilon = 1e-9);
        assert_abs_diff_eq!(peak.opacity, 1.0, epsilon = 1e-9);

        p.set_playing(false);
        assert_eq!(p.frame(ms(1200)).scale, 1.0);
    }

    #[test]
    fn shutdown_releases_gestures_and_stops_the_pulse() {
        let arbiter = SharedArbiter::new();
        let mut p = PressureProbe::new(water(), Box::new(arbiter.clone()));
        p.set_playing(true);
        p.on_gesture(GestureEvent::Start);
        assert!(arbiter.is_suppressed());
        p.shutdown();
        assert!(!arbiter.is_suppressed());
        assert!(!p.is_playing());
        assert_eq!(p.phase(), DragPhase::Idle);
    }
}
