//! Fluids and test objects the scene can be set up with.

use crate::error::{SimError, SimResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// A selectable fluid. Density is always positive: the only way in is
/// [`FluidChoice::new`] or a catalog lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidChoice {
    pub key: String,
    pub name: String,
    density_kg_m3: f64,
    pub display_color: Rgb,
}

impl FluidChoice {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        density_kg_m3: f64,
        display_color: Rgb,
    ) -> SimResult<Self> {
        let key = key.into();
        if !(density_kg_m3.is_finite() && density_kg_m3 > 0.0) {
            return Err(SimError::InvalidFluid(format!(
                "density of `{key}` must be positive, got {density_kg_m3}"
            )));
        }
        Ok(Self {
            key,
            name: name.into(),
            density_kg_m3,
            display_color,
        })
    }

    pub fn density(&self) -> f64 {
        self.density_kg_m3
    }
}

struct FluidEntry {
    key: &'static str,
    name: &'static str,
    density: f64,
    color: Rgb,
}

const FLUIDS: [FluidEntry; 5] = [
    FluidEntry {
        key: "water",
        name: "Water",
        density: 1000.0,
        color: Rgb::new(79, 195, 247),
    },
    FluidEntry {
        key: "oil",
        name: "Oil",
        density: 920.0,
        color: Rgb::new(255, 167, 38),
    },
    FluidEntry {
        key: "honey",
        name: "Honey",
        density: 1420.0,
        color: Rgb::new(255, 202, 40),
    },
    FluidEntry {
        key: "mercury",
        name: "Mercury",
        density: 13600.0,
        color: Rgb::new(189, 189, 189),
    },
    FluidEntry {
        key: "gasoline",
        name: "Gasoline",
        density: 680.0,
        color: Rgb::new(129, 199, 132),
    },
];

fn from_entry(entry: &FluidEntry) -> FluidChoice {
    FluidChoice {
        key: entry.key.to_string(),
        name: entry.name.to_string(),
        density_kg_m3: entry.density,
        display_color: entry.color,
    }
}

/// The closed set of fluids, in display order.
pub fn fluid_catalog() -> Vec<FluidChoice> {
    FLUIDS.iter().map(from_entry).collect()
}

pub fn fluid_by_key(key: &str) -> Option<FluidChoice> {
    FLUIDS
        .iter()
        .find(|f| f.key.eq_ignore_ascii_case(key))
        .map(from_entry)
}

pub fn water() -> FluidChoice {
    from_entry(&FLUIDS[0])
}

fn next_key(table: &[FluidEntry], key: &str) -> &'static str {
    let i = table.iter().position(|f| f.key == key).unwrap_or(0);
    table[(i + 1) % table.len()].key
}

/// Key of the fluid after `key` in catalog order, wrapping around.
pub fn next_fluid_key(key: &str) -> &'static str {
    next_key(&FLUIDS, key)
}

/// The smaller set offered next to the pressure probe. Its oil is a lighter
/// grade than the tank's.
const PROBE_FLUIDS: [FluidEntry; 3] = [
    FluidEntry {
        key: "water",
        name: "Water",
        density: 1000.0,
        color: Rgb::new(79, 195, 247),
    },
    FluidEntry {
        key: "oil",
        name: "Oil",
        density: 800.0,
        color: Rgb::new(255, 167, 38),
    },
    FluidEntry {
        key: "mercury",
        name: "Mercury",
        density: 13600.0,
        color: Rgb::new(158, 158, 158),
    },
];

pub fn probe_fluid_catalog() -> Vec<FluidChoice> {
    PROBE_FLUIDS.iter().map(from_entry).collect()
}

pub fn probe_fluid_by_key(key: &str) -> Option<FluidChoice> {
    PROBE_FLUIDS
        .iter()
        .find(|f| f.key.eq_ignore_ascii_case(key))
        .map(from_entry)
}

pub fn next_probe_fluid_key(key: &str) -> &'static str {
    next_key(&PROBE_FLUIDS, key)
}

/// A test object the user can drop into the tank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub volume_m3: f64,
    pub mass_kg: f64,
}

impl ObjectPreset {
    pub fn density(&self) -> f64 {
        self.mass_kg / self.volume_m3
    }
}

pub const OBJECTS: [ObjectPreset; 5] = [
    // 3 cm stone cube, 2000 kg/m³
    ObjectPreset {
        key: "cube",
        name: "Stone cube",
        volume_m3: 0.000027,
        mass_kg: 0.054,
    },
    ObjectPreset {
        key: "ball",
        name: "Ball",
        volume_m3: 0.00524,
        mass_kg: 0.4,
    },
    ObjectPreset {
        key: "brick",
        name: "Brick",
        volume_m3: 0.002,
        mass_kg: 4.0,
    },
    ObjectPreset {
        key: "wood",
        name: "Wood",
        volume_m3: 0.008,
        mass_kg: 4.0,
    },
    ObjectPreset {
        key: "anchor",
        name: "Anchor",
        volume_m3: 0.01,
        mass_kg: 100.0,
    },
];

pub fn object_by_key(key: &str) -> Option<ObjectPreset> {
    OBJECTS
        .iter()
        .copied()
        .find(|o| o.key.eq_ignore_ascii_case(key))
}

pub fn next_object_key(key: &str) -> &'static str {
    let i = OBJECTS.iter().position(|o| o.key == key).unwrap_or(0);
    OBJECTS[(i + 1) % OBJECTS.len()].key
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn catalog_densities_are_positive() {
        for fluid in fluid_catalog() {
            assert!(fluid.density() > 0.0, "{}", fluid.key);
        }
    }

    #[test]
    fn rejects_non_positive_density() {
        assert!(FluidChoice::new("vacuum", "Vacuum", 0.0, Rgb::default()).is_err());
        assert!(FluidChoice::new("nan", "NaN", f64::NAN, Rgb::default()).is_err());
        assert!(FluidChoice::new("brine", "Brine", 1025.0, Rgb::default()).is_ok());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(fluid_by_key("Mercury").map(|f| f.density()), Some(13600.0));
        assert!(fluid_by_key("lava").is_none());
    }

    #[test]
    fn cycling_wraps_around() {
        assert_eq!(next_fluid_key("water"), "oil");
        assert_eq!(next_fluid_key("gasoline"), "water");
        assert_eq!(next_fluid_key("unknown"), "oil");
        assert_eq!(next_object_key("anchor"), "cube");
        assert_eq!(next_probe_fluid_key("mercury"), "water");
    }

    #[test]
    fn probe_fluids_are_their_own_set() {
        let keys: Vec<_> = probe_fluid_catalog().into_iter().map(|f| f.key).collect();
        assert_eq!(keys, ["water", "oil", "mercury"]);
        assert_eq!(probe_fluid_by_key("oil").map(|f| f.density()), Some(800.0));
        assert_eq!(fluid_by_key("oil").map(|f| f.density()), Some(920.0));
        assert!(probe_fluid_by_key("honey").is_none());
    }

    #[test]
    fn default_cube_is_twice_as_dense_as_water() {
        let cube = object_by_key("cube").unwrap();
        assert_abs_diff_eq!(cube.density(), 2000.0, epsilon = 1e-9);
    }
}
