//! Drag-gesture state machine that moves the test object.

use log::trace;
use std::cell::Cell;
use std::rc::Rc;

/// Reference damping between pointer travel and object travel.
pub const DRAG_DAMPING: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    /// Gesture ended; the settle animation is still running.
    Releasing,
}

/// One event from whatever delivers pointer input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    Start,
    /// `delta_y` may be missing when the source could not compute one.
    Move { delta_y: Option<f64> },
    End,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureOutcome {
    Started,
    Moved { from: f64, to: f64, clamped: bool },
    Released,
    Ignored,
}

/// Something that owns gestures competing with the object drag (scrolling,
/// keyboard nudging). Suspended for exactly the duration of a drag.
pub trait GestureArbiter {
    fn suspend_competing(&mut self);
    fn resume_competing(&mut self);
}

/// For hosts with nothing to arbitrate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoArbiter;

impl GestureArbiter for NoArbiter {
    fn suspend_competing(&mut self) {}
    fn resume_competing(&mut self) {}
}

/// A flag shared with the host's other input handlers.
#[derive(Clone, Debug, Default)]
pub struct SharedArbiter {
    suppressed: Rc<Cell<bool>>,
}

impl SharedArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.get()
    }
}

impl GestureArbiter for SharedArbiter {
    fn suspend_competing(&mut self) {
        self.suppressed.set(true);
    }

    fn resume_competing(&mut self) {
        self.suppressed.set(false);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionBounds {
    pub min: f64,
    pub max: f64,
}

impl PositionBounds {
    pub fn clamp(&self, y: f64) -> f64 {
        y.clamp(self.min, self.max)
    }
}

pub struct DragController {
    phase: DragPhase,
    position: f64,
    bounds: PositionBounds,
    damping: f64,
    arbiter: Box<dyn GestureArbiter>,
    holding_arbiter: bool,
}

impl DragController {
    pub fn new(position: f64, bounds: PositionBounds, arbiter: Box<dyn GestureArbiter>) -> Self {
        Self {
            phase: DragPhase::Idle,
            position: bounds.clamp(position),
            bounds,
            damping: DRAG_DAMPING,
            arbiter,
            holding_arbiter: false,
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == DragPhase::Dragging
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn bounds(&self) -> PositionBounds {
        self.bounds
    }

    pub fn on_gesture(&mut self, event: GestureEvent) -> GestureOutcome {
        match (self.phase, event) {
            (DragPhase::Idle | DragPhase::Releasing, GestureEvent::Start) => {
                self.phase = DragPhase::Dragging;
                self.acquire();
                trace!("drag start at {:.2}", self.position);
                GestureOutcome::Started
            }
            (DragPhase::Dragging, GestureEvent::Move { delta_y: Some(dy) }) if dy.is_finite() => {
                let from = self.position;
                let wanted = from + dy * self.damping;
                let to = self.bounds.clamp(wanted);
                self.position = to;
                trace!("drag move {dy:+.2} -> {to:.2}");
                GestureOutcome::Moved {
                    from,
                    to,
                    clamped: to != wanted,
                }
            }
            (DragPhase::Dragging, GestureEvent::End | GestureEvent::Cancel) => {
                self.phase = DragPhase::Releasing;
                self.release();
                trace!("drag {event:?} at {:.2}", self.position);
                GestureOutcome::Released
            }
            _ => GestureOutcome::Ignored,
        }
    }

    /// Direct placement outside of a drag. Out-of-range requests clamp.
    pub fn request_position(&mut self, y: f64) -> GestureOutcome {
        if self.is_dragging() || !y.is_finite() {
            return GestureOutcome::Ignored;
        }
        let from = self.position;
        let to = self.bounds.clamp(y);
        self.position = to;
        GestureOutcome::Moved {
            from,
            to,
            clamped: to != y,
        }
    }

    /// The render side reports that the settle animation finished.
    pub fn settle_finished(&mut self) {
        if self.phase == DragPhase::Releasing {
            self.phase = DragPhase::Idle;
        }
    }

    /// Ends any drag and gives competing gestures back. Idempotent.
    pub fn shutdown(&mut self) {
        self.release();
        self.phase = DragPhase::Idle;
    }

    fn acquire(&mut self) {
        if !self.holding_arbiter {
            self.arbiter.suspend_competing();
            self.holding_arbiter = true;
        }
    }

    fn release(&mut self) {
        if self.holding_arbiter {
            self.arbiter.resume_competing();
            self.holding_arbiter = false;
        }
    }
}

impl Drop for DragController {
    fn drop(&mut self) {
        self.release();
    }
}
