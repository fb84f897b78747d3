//! Scalar values that move toward a target over time.

/// How an [`EasedValue`] approaches its target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    /// Snap to the target on the next update.
    Immediate,
    /// Constant speed in units per second, no overshoot.
    Linear { speed: f64 },
    /// Damped spring with unit mass.
    Spring { stiffness: f64, damping: f64 },
}

impl Easing {
    /// Close to critically damped; settles in about half a second.
    pub const SETTLE: Easing = Easing::Spring {
        stiffness: 170.0,
        damping: 26.0,
    };
}

const SETTLE_EPS: f64 = 1e-3;
// Spring integration is explicit; keep steps small enough to stay stable
// for the stiffness values we use.
const MAX_SUBSTEP: f64 = 1.0 / 240.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EasedValue {
    target: f64,
    current: f64,
    velocity: f64,
    easing: Easing,
}

impl EasedValue {
    pub fn new(value: f64, easing: Easing) -> Self {
        Self {
            target: value,
            current: value,
            velocity: 0.0,
            easing,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Changes the easing without disturbing the current motion.
    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    /// Moves to `value` at once and forgets any velocity.
    pub fn jump_to(&mut self, value: f64) {
        self.target = value;
        self.current = value;
        self.velocity = 0.0;
    }

    pub fn is_settled(&self) -> bool {
        (self.target - self.current).abs() < SETTLE_EPS && self.velocity.abs() < SETTLE_EPS
    }

    /// Advances by `dt` seconds and returns the new value.
    pub fn update(&mut self, dt: f64) -> f64 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        match self.easing {
            Easing::Immediate => self.jump_to(self.target),
            Easing::Linear { speed } => {
                let step = speed.abs() * dt;
                let gap = self.target - self.current;
                if gap.abs() <= step {
                    self.jump_to(self.target);
                } else {
                    self.current += step.copysign(gap);
                    self.velocity = speed.abs().copysign(gap);
                }
            }
            Easing::Spring { stiffness, damping } => {
                let mut left = dt;
                while left > 0.0 {
                    let h = left.min(MAX_SUBSTEP);
                    let accel =
                        stiffness * (self.target - self.current) - damping * self.velocity;
                    self.velocity += accel * h;
                    self.current += self.velocity * h;
                    left -= h;
                }
                if self.is_settled() {
                    self.jump_to(self.target);
                }
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn immediate_jumps() {
        let mut v = EasedValue::new(0.0, Easing::Immediate);
        v.set_target(42.0);
        assert_eq!(v.update(0.0), 42.0);
        assert!(v.is_settled());
    }

    #[test]
    fn linear_never_overshoots() {
        let mut v = EasedValue::new(0.0, Easing::Linear { speed: 10.0 });
        v.set_target(3.0);
        assert_abs_diff_eq!(v.update(0.1), 1.0, epsilon = 1e-12);
        assert_eq!(v.update(1.0), 3.0);
        assert!(v.is_settled());

        v.set_target(-2.0);
        assert_abs_diff_eq!(v.update(0.2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn spring_settles_on_target() {
        let mut v = EasedValue::new(0.0, Easing::SETTLE);
        v.set_target(100.0);
        for _ in 0..120 {
            v.update(1.0 / 60.0);
        }
        assert!(v.is_settled());
        assert_eq!(v.current(), 100.0);
    }

    #[test]
    fn spring_moves_toward_target_first() {
        let mut v = EasedValue::new(0.0, Easing::SETTLE);
        v.set_target(-50.0);
        let first = v.update(1.0 / 60.0);
        assert!(first < 0.0 && first > -50.0);
        assert!(!v.is_settled());
    }

    #[test]
    fn bad_dt_is_ignored() {
        let mut v = EasedValue::new(1.0, Easing::SETTLE);
        v.set_target(2.0);
        assert_eq!(v.update(-1.0), 1.0);
        assert_eq!(v.update(f64::NAN), 1.0);
    }
}
