//! Scene geometry and material parameters.
//!
//! Scene coordinates are vertical only and grow downward, like screen rows:
//! the container spans `container_top..container_top + container_height`
//! and a larger `object_position` means a deeper object.

use crate::error::{SimError, SimResult};
use crate::fluid::ObjectPreset;
use crate::model::GRAVITY;

/// Immutable per-scene setup. Build one, then hand it to
/// [`PhysicsModel::new`](crate::model::PhysicsModel::new) or
/// [`Scene::mount`](crate::scene::Scene::mount), which validate it.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub container_top: f64,
    pub container_height: f64,
    /// Edge length of the cubic test object, in scene units.
    pub object_size: f64,
    /// Real volume of the test object in m³.
    pub object_volume: f64,
    /// kg/m³.
    pub object_density: f64,
    /// Notional horizontal cross-section of the container in m².
    pub cross_section_area: f64,
    /// Scene units of surface rise per metre of real level rise. Purely a
    /// visibility knob; the physical quantities do not depend on it.
    pub level_amplification: f64,
    /// Undisturbed fluid surface in scene units.
    pub initial_water_level: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            container_top: 0.0,
            container_height: 300.0,
            object_size: 30.0,
            object_volume: 0.000027,
            object_density: 2000.0,
            cross_section_area: 0.01,
            level_amplification: 4000.0,
            initial_water_level: 120.0,
        }
    }
}

fn require_positive(name: &str, v: f64) -> SimResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!(
            "{name} must be positive, got {v}"
        )))
    }
}

impl SimulationConfig {
    /// Same geometry with the volume and density of `preset`.
    pub fn with_object(mut self, preset: &ObjectPreset) -> Self {
        self.object_volume = preset.volume_m3;
        self.object_density = preset.density();
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require_positive("object_size", self.object_size)?;
        require_positive("object_volume", self.object_volume)?;
        require_positive("object_density", self.object_density)?;
        require_positive("cross_section_area", self.cross_section_area)?;
        require_positive("container_height", self.container_height)?;

        if !self.container_top.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "container_top must be finite, got {}",
                self.container_top
            )));
        }
        if self.container_height <= self.object_size {
            return Err(SimError::InvalidConfig(format!(
                "container_height ({}) must exceed object_size ({})",
                self.container_height, self.object_size
            )));
        }
        if !(self.level_amplification.is_finite() && self.level_amplification >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "level_amplification must be non-negative, got {}",
                self.level_amplification
            )));
        }
        let level = self.initial_water_level;
        if !(level >= self.container_top && level <= self.container_bottom()) {
            return Err(SimError::InvalidConfig(format!(
                "initial_water_level ({level}) lies outside the container ({}..{})",
                self.container_top,
                self.container_bottom()
            )));
        }
        Ok(())
    }

    pub fn container_bottom(&self) -> f64 {
        self.container_top + self.container_height
    }

    /// Deepest allowed top edge: the object rests on the floor.
    pub fn max_position(&self) -> f64 {
        self.container_bottom() - self.object_size
    }

    /// Highest allowed top edge. Always leaves room to lift the object fully
    /// out of the fluid, even when the surface sits near the rim.
    pub fn min_position(&self, base_water_level: f64) -> f64 {
        self.container_top.min(base_water_level - self.object_size)
    }

    /// Metres per scene unit, from the object's real edge length.
    pub fn metres_per_unit(&self) -> f64 {
        self.object_volume.cbrt() / self.object_size
    }

    /// Scene units the surface rises per scene unit of submerged height.
    pub(crate) fn level_gain(&self) -> f64 {
        self.level_amplification * self.object_volume
            / (self.cross_section_area * self.object_size)
    }

    /// Newtons; constant for the session.
    pub fn object_weight(&self) -> f64 {
        self.object_density * self.object_volume * GRAVITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::object_by_key;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_config_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_container_not_taller_than_object() {
        let cfg = SimulationConfig {
            container_height: 30.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_positive_parameters() {
        let base = SimulationConfig::default();
        let broken = [
            SimulationConfig {
                object_size: 0.0,
                ..base.clone()
            },
            SimulationConfig {
                object_volume: -1.0,
                ..base.clone()
            },
            SimulationConfig {
                object_density: 0.0,
                ..base.clone()
            },
            SimulationConfig {
                cross_section_area: f64::NAN,
                ..base.clone()
            },
            SimulationConfig {
                initial_water_level: 400.0,
                ..base.clone()
            },
        ];
        for cfg in broken {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn position_bounds() {
        let cfg = SimulationConfig::default();
        assert_abs_diff_eq!(cfg.max_position(), 270.0);
        assert_abs_diff_eq!(cfg.min_position(120.0), 0.0);
        // surface right at the rim: the object may be held above the container
        assert_abs_diff_eq!(cfg.min_position(10.0), -20.0);
    }

    #[test]
    fn scale_follows_object_edge() {
        let cfg = SimulationConfig::default();
        // 3 cm cube drawn 30 units tall
        assert_abs_diff_eq!(cfg.metres_per_unit(), 0.001, epsilon = 1e-12);
    }

    #[test]
    fn with_object_takes_volume_and_density() {
        let brick = object_by_key("brick").unwrap();
        let cfg = SimulationConfig::default().with_object(&brick);
        assert_abs_diff_eq!(cfg.object_volume, 0.002);
        assert_abs_diff_eq!(cfg.object_density, 2000.0);
    }
}
