//! Buoyancy and hydrostatic-pressure toy: a cube dragged into a tank.
//!
//! The core is framework independent:
//!
//! * [`model`] maps object position, fluid and tank geometry to submerged
//!   volume, surface rise, pressure and buoyant force;
//! * [`controller`] turns a stream of drag events into a clamped position;
//! * [`driver`] eases what gets drawn and runs the idle loop and ripples;
//! * [`scene`] ties the three together for one mounted screen.
//!
//! [`probe`] reuses the controller and easing for a depth gauge, and
//! [`flow`] holds the companion pipe-flow model.

pub mod config;
pub mod controller;
pub mod driver;
pub mod easing;
pub mod error;
pub mod flow;
pub mod fluid;
pub mod model;
pub mod probe;
pub mod scene;

pub use config::SimulationConfig;
pub use controller::{GestureArbiter, GestureEvent, GestureOutcome};
pub use error::{SimError, SimResult};
pub use fluid::FluidChoice;
pub use model::{compute_derived, DerivedQuantities, PhysicsModel};
pub use probe::PressureProbe;
pub use scene::Scene;
