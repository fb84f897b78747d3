//! Flow through a pipe that narrows from section 1 to section 2.
//!
//! Continuity gives the velocities (A₁v₁ = A₂v₂ = Q); Bernoulli gives the
//! pressure in section 2 with section 1 open to the atmosphere.

use crate::fluid::FluidChoice;
use crate::model::{ATMOSPHERIC_PRESSURE, GRAVITY};
use std::f64::consts::PI;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipeFlow {
    /// m.
    pub diameter_1: f64,
    /// m.
    pub diameter_2: f64,
    /// Litres per second.
    pub flow_rate_lps: f64,
    /// m above the reference.
    pub height_1: f64,
    /// m above the reference.
    pub height_2: f64,
}

impl Default for PipeFlow {
    fn default() -> Self {
        Self {
            diameter_1: 0.04,
            diameter_2: 0.02,
            flow_rate_lps: 2.0,
            height_1: 1.0,
            height_2: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowState {
    /// m².
    pub area_1: f64,
    pub area_2: f64,
    /// m/s.
    pub velocity_1: f64,
    pub velocity_2: f64,
    /// Pa, absolute.
    pub pressure_1: f64,
    pub pressure_2: f64,
}

fn circle_area(diameter: f64) -> f64 {
    let r = diameter.max(0.0) / 2.0;
    PI * r * r
}

impl PipeFlow {
    pub fn compute(&self, fluid: &FluidChoice) -> FlowState {
        let q = self.flow_rate_lps.max(0.0) / 1000.0;
        let area_1 = circle_area(self.diameter_1);
        let area_2 = circle_area(self.diameter_2);
        let velocity_1 = if area_1 > 0.0 { q / area_1 } else { 0.0 };
        let velocity_2 = if area_2 > 0.0 { q / area_2 } else { 0.0 };

        let rho = fluid.density();
        let pressure_1 = ATMOSPHERIC_PRESSURE;
        let pressure_2 = pressure_1
            + 0.5 * rho * (velocity_1 * velocity_1 - velocity_2 * velocity_2)
            + rho * GRAVITY * (self.height_1 - self.height_2);

        FlowState {
            area_1,
            area_2,
            velocity_1,
            velocity_2,
            pressure_1,
            pressure_2,
        }
    }

    pub fn adjust_flow_rate(&mut self, delta_lps: f64) {
        let (lo, hi) = PipeKnob::FlowRate.range();
        self.flow_rate_lps = (self.flow_rate_lps + delta_lps).clamp(lo, hi);
    }

    /// Turns one control by `steps` notches, clamped to its range.
    pub fn adjust(&mut self, knob: PipeKnob, steps: i32) {
        let (lo, hi) = knob.range();
        let delta = steps as f64 * knob.step();
        let value = match knob {
            PipeKnob::Diameter1 => &mut self.diameter_1,
            PipeKnob::Diameter2 => &mut self.diameter_2,
            PipeKnob::Height1 => &mut self.height_1,
            PipeKnob::Height2 => &mut self.height_2,
            PipeKnob::FlowRate => &mut self.flow_rate_lps,
        };
        *value = (*value + delta).clamp(lo, hi);
    }
}

/// The user-adjustable pipe parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeKnob {
    Diameter1,
    Diameter2,
    Height1,
    Height2,
    FlowRate,
}

impl PipeKnob {
    /// Inclusive range, in the unit of the matching `PipeFlow` field.
    pub fn range(self) -> (f64, f64) {
        match self {
            PipeKnob::Diameter1 => (0.020, 0.060),
            PipeKnob::Diameter2 => (0.015, 0.050),
            PipeKnob::Height1 | PipeKnob::Height2 => (0.2, 1.2),
            PipeKnob::FlowRate => (0.5, 10.0),
        }
    }

    pub fn step(self) -> f64 {
        match self {
            PipeKnob::Diameter1 | PipeKnob::Diameter2 => 0.005,
            PipeKnob::Height1 | PipeKnob::Height2 => 0.1,
            PipeKnob::FlowRate => 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeSection {
    Wide,
    Narrow,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowParticle {
    pub id: u64,
    pub section: PipeSection,
    pub progress: f64,
}

/// Where the wide section ends, as a fraction of pipe length.
pub const NARROWING_AT: f64 = 0.4;

impl FlowParticle {
    /// 0 at the inlet, 1 at the outlet.
    pub fn x_fraction(&self) -> f64 {
        match self.section {
            PipeSection::Wide => self.progress,
            PipeSection::Narrow => NARROWING_AT + self.progress,
        }
    }
}

/// Tracer particles pushed through the pipe, one tick per frame.
#[derive(Clone, Debug)]
pub struct ParticleStream {
    particles: Vec<FlowParticle>,
    next_id: u64,
    last_spawn: Option<Duration>,
    spawn_interval: Duration,
    step: f64,
}

impl Default for ParticleStream {
    fn default() -> Self {
        Self {
            particles: Vec::new(),
            next_id: 0,
            last_spawn: None,
            spawn_interval: Duration::from_millis(500),
            step: 0.01,
        }
    }
}

impl ParticleStream {
    pub fn particles(&self) -> &[FlowParticle] {
        &self.particles
    }

    pub fn tick(&mut self, now: Duration, flowing: bool) {
        let due = match self.last_spawn {
            Some(t) => now.saturating_sub(t) > self.spawn_interval,
            None => true,
        };
        if due {
            self.particles.push(FlowParticle {
                id: self.next_id,
                section: PipeSection::Wide,
                progress: 0.0,
            });
            self.next_id += 1;
            self.last_spawn = Some(now);
        }

        let step = if flowing { self.step } else { 0.0 };
        for p in &mut self.particles {
            p.progress += step;
            if p.section == PipeSection::Wide && p.progress >= NARROWING_AT {
                p.section = PipeSection::Narrow;
                p.progress = 0.0;
            }
        }
        self.particles
            .retain(|p| !(p.section == PipeSection::Narrow && p.progress >= 1.0 - NARROWING_AT));
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.last_spawn = None;
    }
}
