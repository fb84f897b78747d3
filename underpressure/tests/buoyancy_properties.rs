use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use underpressure::controller::{DragController, NoArbiter, PositionBounds};
use underpressure::fluid::{fluid_by_key, water, Rgb};
use underpressure::{compute_derived, FluidChoice, GestureEvent, PhysicsModel, SimulationConfig};

const BASE: f64 = 120.0;

fn model() -> PhysicsModel {
    PhysicsModel::new(SimulationConfig::default()).unwrap()
}

fn range(cfg: &SimulationConfig) -> std::ops::RangeInclusive<f64> {
    cfg.min_position(BASE)..=cfg.max_position()
}

prop_compose! {
    fn position_pair()(a in 0.0..=270.0f64, b in 0.0..=270.0f64) -> (f64, f64) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

prop_compose! {
    fn any_fluid()(density in 1.0..20_000.0f64) -> FluidChoice {
        FluidChoice::new("test", "Test", density, Rgb::new(0, 0, 255)).unwrap()
    }
}

proptest! {
    #[test]
    fn buoyancy_never_decreases_with_depth((upper, lower) in position_pair(), fluid in any_fluid()) {
        let m = model();
        let shallow = m.compute(&fluid, upper, BASE);
        let deep = m.compute(&fluid, lower, BASE);
        prop_assert!(deep.buoyant_force >= shallow.buoyant_force);
        prop_assert!(deep.submerged_volume >= shallow.submerged_volume);
        prop_assert!(deep.current_water_level <= shallow.current_water_level);
    }

    #[test]
    fn nothing_is_displaced_above_the_surface(pos in -50.0..=(BASE - 30.0), fluid in any_fluid()) {
        let d = model().compute(&fluid, pos, BASE);
        prop_assert_eq!(d.submerged_volume, 0.0);
        prop_assert_eq!(d.buoyant_force, 0.0);
        prop_assert_eq!(d.hydrostatic_pressure, 0.0);
        prop_assert_eq!(d.current_water_level, BASE);
    }

    #[test]
    fn displacement_is_capped_by_the_object(pos in -1e6..1e6f64, fluid in any_fluid()) {
        let m = model();
        let d = m.compute(&fluid, pos, BASE);
        let v = m.config().object_volume;
        prop_assert!(d.submerged_volume <= v);
        prop_assert!((0.0..=1.0).contains(&d.submerged_ratio));
        prop_assert!(d.current_water_level >= m.config().container_top);
    }

    #[test]
    fn fully_submerged_buoyancy_is_constant(pos in 160.0..=270.0f64, fluid in any_fluid()) {
        // at 160 the object already sits under the raised surface
        let m = model();
        let d = m.compute(&fluid, pos, BASE);
        let full = m.compute(&fluid, m.config().max_position(), BASE);
        prop_assert_eq!(d.submerged_ratio, 1.0);
        prop_assert_eq!(d.buoyant_force, full.buoyant_force);
    }

    #[test]
    fn clamping_is_idempotent(y in -1e9..1e9f64) {
        let cfg = SimulationConfig::default();
        let bounds = PositionBounds { min: cfg.min_position(BASE), max: cfg.max_position() };
        let once = bounds.clamp(y);
        prop_assert_eq!(bounds.clamp(once), once);
        prop_assert!(range(&cfg).contains(&once));
    }

    #[test]
    fn drags_stay_in_bounds(deltas in prop::collection::vec(-500.0..500.0f64, 1..40)) {
        let cfg = SimulationConfig::default();
        let bounds = PositionBounds { min: cfg.min_position(BASE), max: cfg.max_position() };
        let mut c = DragController::new(bounds.min, bounds, Box::new(NoArbiter));
        c.on_gesture(GestureEvent::Start);
        for dy in deltas {
            c.on_gesture(GestureEvent::Move { delta_y: Some(dy) });
            prop_assert!(range(&cfg).contains(&c.position()));
        }
    }

    #[test]
    fn floats_iff_fluid_is_denser(object_density in 100.0..15_000.0f64, ratio in prop_oneof![0.2..0.99f64, 1.01..5.0f64]) {
        let cfg = SimulationConfig { object_density, ..Default::default() };
        let fluid = FluidChoice::new("test", "Test", object_density * ratio, Rgb::default()).unwrap();
        let d = compute_derived(&cfg, &fluid, cfg.max_position(), BASE).unwrap();
        prop_assert_eq!(d.will_float, ratio > 1.0);
        prop_assert_eq!(d.will_float, d.net_force > 0.0);
    }
}

#[test]
fn stone_cube_sinks_in_water() {
    let cfg = SimulationConfig::default();
    let d = compute_derived(&cfg, &water(), cfg.max_position(), BASE).unwrap();
    assert_abs_diff_eq!(d.object_weight, 0.5297, epsilon = 1e-4);
    assert_abs_diff_eq!(d.buoyant_force, 0.2648, epsilon = 1e-4);
    assert!(!d.will_float);
    assert!(d.net_force < 0.0);
}

#[test]
fn stone_cube_floats_in_mercury() {
    let cfg = SimulationConfig::default();
    let mercury = fluid_by_key("mercury").unwrap();
    let d = compute_derived(&cfg, &mercury, cfg.max_position(), BASE).unwrap();
    assert_abs_diff_eq!(d.buoyant_force, 3.602, epsilon = 1e-3);
    assert_abs_diff_eq!(d.object_weight, 0.5297, epsilon = 1e-4);
    assert!(d.will_float);
}

#[test]
fn pressure_is_absolute_plus_one_atmosphere() {
    let cfg = SimulationConfig::default();
    let d = compute_derived(&cfg, &water(), 200.0, BASE).unwrap();
    assert!(d.hydrostatic_pressure > 0.0);
    assert_abs_diff_eq!(
        d.absolute_pressure - d.hydrostatic_pressure,
        101_325.0,
        epsilon = 1e-9
    );
}
