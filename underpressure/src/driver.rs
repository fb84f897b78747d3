//! Per-frame visual state: where to draw the object and the surface, and
//! which ripples are alive.
//!
//! The driver only reads the model. Idle bobbing and ripples are drawn on
//! top of the logical position and never feed back into it.

use crate::config::SimulationConfig;
use crate::controller::DragPhase;
use crate::easing::{EasedValue, Easing};
use crate::model::DerivedQuantities;
use std::f64::consts::TAU;
use std::time::Duration;

pub const RIPPLE_LIFETIME: Duration = Duration::from_millis(1000);
pub const IDLE_PERIOD: Duration = Duration::from_millis(1000);
// Frames further apart than this are treated as a hiccup, not as elapsed time.
pub(crate) const MAX_FRAME_DT: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriverConfig {
    /// Horizontal centre of the object, where ripples start.
    pub object_x: f64,
    pub object_size: f64,
    /// Scene units of idle bobbing.
    pub idle_amplitude: f64,
    /// Scene units of idle surface swell.
    pub wave_amplitude: f64,
    pub ripple_seed_radius: f64,
    /// Final ripple radius per object size at full displacement.
    pub ripple_spread: f64,
}

impl DriverConfig {
    pub fn for_scene(config: &SimulationConfig, object_x: f64) -> Self {
        Self {
            object_x,
            object_size: config.object_size,
            idle_amplitude: config.object_size * 0.05,
            wave_amplitude: config.object_size * 0.04,
            ripple_seed_radius: 2.0,
            ripple_spread: 2.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ripple {
    pub id: u64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub start: Duration,
    pub seed_radius: f64,
    pub max_radius: f64,
}

impl Ripple {
    /// 0 at spawn, 1 at expiry.
    pub fn progress(&self, now: Duration) -> f64 {
        let age = now.saturating_sub(self.start).as_secs_f64();
        (age / RIPPLE_LIFETIME.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.start) >= RIPPLE_LIFETIME
    }

    pub fn radius(&self, now: Duration) -> f64 {
        let p = self.progress(now);
        let eased = 1.0 - (1.0 - p) * (1.0 - p);
        self.seed_radius + (self.max_radius - self.seed_radius) * eased
    }

    /// Fades in over the first quarter, then out to zero.
    pub fn opacity(&self, now: Duration) -> f64 {
        const PEAK: f64 = 0.8;
        const RISE: f64 = 0.25;
        let p = self.progress(now);
        if p < RISE {
            PEAK * p / RISE
        } else {
            PEAK * (1.0 - (p - RISE) / (1.0 - RISE))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleView {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub opacity: f64,
}

/// A host-scheduled reminder that a ripple is due to expire. Timers from a
/// stopped driver are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryTimer {
    pub ripple_id: u64,
    pub due: Duration,
    pub(crate) generation: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameParams {
    /// Scene y of the object's top edge as drawn.
    pub object_y: f64,
    /// Scene y of the fluid surface as drawn, before the swell.
    pub water_level: f64,
    /// Signed swell added to the surface; the renderer shapes it along x.
    pub surface_swell: f64,
    /// 0..1 phase of the idle loop.
    pub idle_phase: f64,
    pub ripples: Vec<RippleView>,
    /// Set on the frame where the settle animation reaches its target.
    pub settled: bool,
}

pub struct RenderDriver {
    cfg: DriverConfig,
    object: EasedValue,
    level: EasedValue,
    ripples: Vec<Ripple>,
    timers: Vec<ExpiryTimer>,
    next_ripple_id: u64,
    was_submerged: bool,
    last_tick: Option<Duration>,
    idle_since: Option<Duration>,
    generation: u64,
    running: bool,
}

impl RenderDriver {
    pub fn new(cfg: DriverConfig, object_y: f64, water_level: f64, submerged: bool) -> Self {
        Self {
            cfg,
            object: EasedValue::new(object_y, Easing::SETTLE),
            level: EasedValue::new(water_level, Easing::SETTLE),
            ripples: Vec::new(),
            timers: Vec::new(),
            next_ripple_id: 0,
            was_submerged: submerged,
            last_tick: None,
            idle_since: None,
            generation: 0,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    /// Expiry reminders for ripples spawned since the last call.
    pub fn take_expiry_timers(&mut self) -> Vec<ExpiryTimer> {
        std::mem::take(&mut self.timers)
    }

    /// Drops the ripple a timer refers to. Returns whether anything changed.
    pub fn expire(&mut self, timer: ExpiryTimer) -> bool {
        if !self.running || timer.generation != self.generation {
            return false;
        }
        let before = self.ripples.len();
        self.ripples.retain(|r| r.id != timer.ripple_id);
        before != self.ripples.len()
    }

    /// Advances all animations to `now` (a monotonic clock reading).
    pub fn frame(
        &mut self,
        now: Duration,
        phase: DragPhase,
        position: f64,
        derived: &DerivedQuantities,
    ) -> Option<FrameParams> {
        if !self.running {
            return None;
        }
        let dt = match self.last_tick {
            Some(prev) => now.saturating_sub(prev).as_secs_f64().min(MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_tick = Some(now);

        match phase {
            DragPhase::Dragging => {
                self.object.set_easing(Easing::Immediate);
                self.idle_since = None;
            }
            DragPhase::Releasing | DragPhase::Idle => self.object.set_easing(Easing::SETTLE),
        }
        self.object.set_target(position);
        let object_y = self.object.update(dt);
        let settled = phase == DragPhase::Releasing && self.object.is_settled();

        self.level.set_target(derived.current_water_level);
        let water_level = self.level.update(dt);

        let idle = phase == DragPhase::Idle && self.object.is_settled();
        if idle && self.idle_since.is_none() {
            self.idle_since = Some(now);
        } else if !idle {
            self.idle_since = None;
        }
        let idle_phase = match self.idle_since {
            Some(t0) => {
                let t = now.saturating_sub(t0).as_secs_f64();
                (t / IDLE_PERIOD.as_secs_f64()).fract()
            }
            None => 0.0,
        };
        let wave = (TAU * idle_phase).sin();
        let (bob, surface_swell) = if self.idle_since.is_some() {
            (self.cfg.idle_amplitude * wave, self.cfg.wave_amplitude * wave)
        } else {
            (0.0, 0.0)
        };

        let submerged = derived.submerged_volume > 0.0;
        if submerged && !self.was_submerged && phase != DragPhase::Dragging {
            self.spawn_ripple(now, water_level, derived.submerged_ratio);
        }
        self.was_submerged = submerged;

        self.ripples.retain(|r| !r.is_expired(now));
        let ripples = self
            .ripples
            .iter()
            .map(|r| RippleView {
                id: r.id,
                x: r.origin_x,
                y: r.origin_y,
                radius: r.radius(now),
                opacity: r.opacity(now),
            })
            .collect();

        Some(FrameParams {
            object_y: object_y + bob,
            water_level,
            surface_swell,
            idle_phase,
            ripples,
            settled,
        })
    }

    /// Stops every animation and forgets all ripples and pending timers.
    pub fn stop(&mut self) {
        self.running = false;
        self.ripples.clear();
        self.timers.clear();
        self.generation += 1;
    }

    fn spawn_ripple(&mut self, now: Duration, surface: f64, displaced_ratio: f64) {
        let id = self.next_ripple_id;
        self.next_ripple_id += 1;
        let seed = self.cfg.ripple_seed_radius;
        let max_radius = seed + self.cfg.ripple_spread * self.cfg.object_size * displaced_ratio;
        self.ripples.push(Ripple {
            id,
            origin_x: self.cfg.object_x,
            origin_y: surface,
            start: now,
            seed_radius: seed,
            max_radius,
        });
        self.timers.push(ExpiryTimer {
            ripple_id: id,
            due: now + RIPPLE_LIFETIME,
            generation: self.generation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn driver() -> RenderDriver {
        let cfg = DriverConfig::for_scene(&SimulationConfig::default(), 100.0);
        RenderDriver::new(cfg, 0.0, 120.0, false)
    }

    fn dry() -> DerivedQuantities {
        DerivedQuantities {
            current_water_level: 120.0,
            ..Default::default()
        }
    }

    fn wet(ratio: f64) -> DerivedQuantities {
        DerivedQuantities {
            current_water_level: 115.0,
            submerged_ratio: ratio,
            submerged_volume: 0.000027 * ratio,
            ..Default::default()
        }
    }

    #[test]
    fn dragging_tracks_position_exactly() {
        let mut d = driver();
        let f = d.frame(ms(0), DragPhase::Dragging, 80.0, &dry()).unwrap();
        assert_eq!(f.object_y, 80.0);
        assert_eq!(f.surface_swell, 0.0);
    }

    #[test]
    fn release_settles_and_reports_once() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Dragging, 0.0, &dry());
        let mut settled_frames = 0;
        let mut t = 0;
        for _ in 0..120 {
            t += 16;
            let f = d.frame(ms(t), DragPhase::Releasing, 60.0, &dry()).unwrap();
            if f.settled {
                settled_frames += 1;
                break;
            }
        }
        assert_eq!(settled_frames, 1);
    }

    #[test]
    fn idle_bob_never_leaves_the_amplitude() {
        let cfg = DriverConfig::for_scene(&SimulationConfig::default(), 100.0);
        let mut d = RenderDriver::new(cfg, 50.0, 120.0, false);
        let amp = SimulationConfig::default().object_size * 0.05;
        for i in 0..200 {
            let f = d.frame(ms(i * 7), DragPhase::Idle, 50.0, &dry()).unwrap();
            assert!((f.object_y - 50.0).abs() <= amp + 1e-9);
            assert!((0.0..1.0).contains(&f.idle_phase));
        }
    }

    #[test]
    fn entering_the_fluid_spawns_one_ripple() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Idle, 80.0, &dry());
        let f = d.frame(ms(16), DragPhase::Idle, 100.0, &wet(0.5)).unwrap();
        assert_eq!(f.ripples.len(), 1);
        let f = d.frame(ms(32), DragPhase::Idle, 100.0, &wet(0.6)).unwrap();
        assert_eq!(f.ripples.len(), 1);
        assert_eq!(d.take_expiry_timers().len(), 1);
        assert!(d.take_expiry_timers().is_empty());
    }

    #[test]
    fn no_ripple_while_dragging() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Dragging, 80.0, &dry());
        let f = d.frame(ms(16), DragPhase::Dragging, 100.0, &wet(0.5)).unwrap();
        assert!(f.ripples.is_empty());
        // already wet on release: no transition, no ripple
        let f = d.frame(ms(32), DragPhase::Releasing, 100.0, &wet(0.5)).unwrap();
        assert!(f.ripples.is_empty());
    }

    #[test]
    fn ripple_lifecycle() {
        let r = Ripple {
            id: 0,
            origin_x: 0.0,
            origin_y: 0.0,
            start: ms(100),
            seed_radius: 2.0,
            max_radius: 40.0,
        };
        assert_abs_diff_eq!(r.radius(ms(100)), 2.0);
        assert_abs_diff_eq!(r.opacity(ms(100)), 0.0);
        assert_abs_diff_eq!(r.opacity(ms(350)), 0.8, epsilon = 1e-9);
        assert!(r.opacity(ms(800)) < 0.8);
        assert_abs_diff_eq!(r.radius(ms(1100)), 40.0);
        assert_abs_diff_eq!(r.opacity(ms(1100)), 0.0, epsilon = 1e-9);
        assert!(r.is_expired(ms(1100)));
        assert!(!r.is_expired(ms(1099)));
    }

    #[test]
    fn expired_ripples_are_pruned() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Idle, 80.0, &dry());
        d.frame(ms(10), DragPhase::Idle, 100.0, &wet(1.0));
        assert_eq!(d.ripples().len(), 1);
        let f = d.frame(ms(1010), DragPhase::Idle, 100.0, &wet(1.0)).unwrap();
        assert!(f.ripples.is_empty());
    }

    #[test]
    fn timers_from_before_stop_do_nothing() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Idle, 80.0, &dry());
        d.frame(ms(10), DragPhase::Idle, 100.0, &wet(1.0));
        let timer = d.take_expiry_timers()[0];
        assert!(d.is_running());
        d.stop();
        assert!(!d.is_running());
        assert!(!d.expire(timer));
        assert!(d.frame(ms(20), DragPhase::Idle, 100.0, &wet(1.0)).is_none());
        assert!(d.ripples().is_empty());
    }

    #[test]
    fn timer_removes_its_ripple() {
        let mut d = driver();
        d.frame(ms(0), DragPhase::Idle, 80.0, &dry());
        d.frame(ms(10), DragPhase::Idle, 100.0, &wet(1.0));
        let timer = d.take_expiry_timers()[0];
        assert!(d.expire(timer));
        assert!(!d.expire(timer));
    }
}
