//! Hydrostatics of a single cube in a tank.
//!
//! Everything here is a pure function of the configuration, the fluid and
//! the object position. Nothing is cached between calls.

use crate::config::SimulationConfig;
use crate::error::SimResult;
use crate::fluid::FluidChoice;

/// m/s².
pub const GRAVITY: f64 = 9.81;
/// Pa, standard sea-level air pressure.
pub const ATMOSPHERIC_PRESSURE: f64 = 101_325.0;
/// Pa, lowest air pressure the user can dial in.
pub const MIN_ATMOSPHERE: f64 = 80_000.0;
/// Pa.
pub const MAX_ATMOSPHERE: f64 = 120_000.0;
/// Pa per adjustment step.
pub const ATMOSPHERE_STEP: f64 = 5_000.0;

/// Moves `current` by `steps` adjustment steps, staying inside
/// `MIN_ATMOSPHERE..=MAX_ATMOSPHERE`. Non-finite input resets to standard.
pub fn step_atmosphere(current: f64, steps: i32) -> f64 {
    let base = if current.is_finite() {
        current
    } else {
        ATMOSPHERIC_PRESSURE
    };
    (base + steps as f64 * ATMOSPHERE_STEP).clamp(MIN_ATMOSPHERE, MAX_ATMOSPHERE)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DerivedQuantities {
    /// Scene units of the object below the displayed surface.
    pub submerged_height: f64,
    /// `submerged_height / object_size`, in `0..=1`.
    pub submerged_ratio: f64,
    /// m³.
    pub submerged_volume: f64,
    /// Scene units the surface rose because of the displaced fluid.
    pub level_shift: f64,
    /// Displayed fluid surface, scene units.
    pub current_water_level: f64,
    /// Pa, at the object's bottom face, relative to the surface.
    pub hydrostatic_pressure: f64,
    /// Pa, hydrostatic plus the air pressure on the surface.
    pub absolute_pressure: f64,
    /// N, upward.
    pub buoyant_force: f64,
    /// N, downward.
    pub object_weight: f64,
    /// N, `buoyant_force - object_weight`; positive pushes up.
    pub net_force: f64,
    pub will_float: bool,
}

/// A validated configuration, ready to evaluate positions.
#[derive(Clone, Debug)]
pub struct PhysicsModel {
    config: SimulationConfig,
}

impl PhysicsModel {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Evaluates a position under standard air pressure.
    pub fn compute(
        &self,
        fluid: &FluidChoice,
        object_position: f64,
        base_water_level: f64,
    ) -> DerivedQuantities {
        self.compute_at(fluid, object_position, base_water_level, ATMOSPHERIC_PRESSURE)
    }

    /// Evaluates a position with `atmospheric_pressure` (Pa) on the surface.
    /// Only `absolute_pressure` depends on it.
    pub fn compute_at(
        &self,
        fluid: &FluidChoice,
        object_position: f64,
        base_water_level: f64,
        atmospheric_pressure: f64,
    ) -> DerivedQuantities {
        let cfg = &self.config;
        let size = cfg.object_size;
        let position = object_position.clamp(
            cfg.min_position(base_water_level),
            cfg.max_position(),
        );
        let bottom = position + size;

        // The surface rises by `gain` per unit of submerged height, so the
        // height measured against the displayed surface solves
        // h = (bottom - base) + gain * h.
        let penetration = bottom - base_water_level;
        let gain = cfg.level_gain();
        let unbounded_height = if penetration <= 0.0 {
            0.0
        } else if gain < 1.0 {
            (penetration / (1.0 - gain)).min(size)
        } else {
            // the surface would outrun the object: any contact floods it
            size
        };
        let rise = cfg.object_volume * (unbounded_height / size) / cfg.cross_section_area
            * cfg.level_amplification;

        // Overflow is not modelled; the surface stops at the rim and only
        // the part of the object below the rim is wet.
        let current_water_level = (base_water_level - rise).max(cfg.container_top);
        let submerged_height = if current_water_level > base_water_level - rise {
            (bottom - current_water_level).clamp(0.0, size)
        } else {
            unbounded_height
        };

        let submerged_ratio = (submerged_height / size).clamp(0.0, 1.0);
        let submerged_volume = cfg.object_volume * submerged_ratio;
        let level_shift = base_water_level - current_water_level;

        let rho = fluid.density();
        let depth_units = (bottom - current_water_level).max(0.0);
        let hydrostatic_pressure = rho * GRAVITY * depth_units * cfg.metres_per_unit();
        let buoyant_force = rho * GRAVITY * submerged_volume;
        let object_weight = cfg.object_weight();
        let net_force = buoyant_force - object_weight;

        DerivedQuantities {
            submerged_height,
            submerged_ratio,
            submerged_volume,
            level_shift,
            current_water_level,
            hydrostatic_pressure,
            absolute_pressure: atmospheric_pressure + hydrostatic_pressure,
            buoyant_force,
            object_weight,
            net_force,
            will_float: buoyant_force > object_weight,
        }
    }

    /// Whether the object floats once fully submerged in `fluid`.
    pub fn floats_in(&self, fluid: &FluidChoice) -> bool {
        fluid.density() > self.config.object_density
    }

    /// Fraction of the object under the surface when floating at rest.
    pub fn equilibrium_fraction(&self, fluid: &FluidChoice) -> f64 {
        equilibrium_fraction(self.config.object_density, fluid.density())
    }
}

/// Validates `config` and evaluates a single position.
pub fn compute_derived(
    config: &SimulationConfig,
    fluid: &FluidChoice,
    object_position: f64,
    base_water_level: f64,
) -> SimResult<DerivedQuantities> {
    let model = PhysicsModel::new(config.clone())?;
    Ok(model.compute(fluid, object_position, base_water_level))
}

/// `ρ_object / ρ_fluid`, capped at 1 for objects that sink.
pub fn equilibrium_fraction(object_density: f64, fluid_density: f64) -> f64 {
    if fluid_density > 0.0 {
        (object_density / fluid_density).min(1.0)
    } else {
        1.0
    }
}

pub fn format_pressure(pa: f64) -> String {
    if pa >= 1000.0 {
        format!("{:.2} kPa", pa / 1000.0)
    } else {
        format!("{pa:.0} Pa")
    }
}

pub fn format_force(newtons: f64) -> String {
    format!("{:.2} N", newtons.abs())
}

pub fn format_velocity(mps: f64) -> String {
    format!("{mps:.2} m/s")
}
