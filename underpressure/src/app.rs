use crate::input::{collect_input_nonblocking, map_event, Action, DragTracker};
use crate::render::{
    bar, canvas_to_cells, draw_pipe, draw_probe, draw_ripples, draw_tank, draw_text, to_color,
    ProbeLayout, TankLook, Terminal, Viewport,
};
use crate::settings::{load_settings, save_settings_atomic, settings_path, Settings};
use crate::Args;
use clap::ValueEnum;
use crossterm::style::Color;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use underpressure::controller::SharedArbiter;
use underpressure::driver::{ExpiryTimer, FrameParams};
use underpressure::flow::{ParticleStream, PipeFlow};
use underpressure::fluid::{
    fluid_by_key, next_fluid_key, next_object_key, next_probe_fluid_key, object_by_key,
    probe_fluid_by_key, water, ObjectPreset, OBJECTS,
};
use underpressure::model::{format_force, format_pressure, format_velocity, GRAVITY};
use underpressure::probe::ProbeFrame;
use underpressure::{
    FluidChoice, GestureEvent, GestureOutcome, PressureProbe, Scene, SimulationConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Screen {
    Tank,
    Pressure,
    Flow,
}

impl Screen {
    /// Tab order.
    pub(crate) fn next(self) -> Self {
        match self {
            Screen::Tank => Screen::Pressure,
            Screen::Pressure => Screen::Flow,
            Screen::Flow => Screen::Tank,
        }
    }
}

const HUD_COLS: u16 = 36;
const MIN_TANK_W: i32 = 24;
const MIN_TANK_H: i32 = 32;
const BG: Color = Color::Black;

/// Tank interior for a terminal of `cols` x `rows`, in braille pixels.
pub(crate) fn tank_viewport(cols: u16, rows: u16, show_hud: bool) -> Viewport {
    let panel = if show_hud && cols > HUD_COLS + 20 {
        HUD_COLS
    } else {
        0
    };
    let x = (panel as i32 + 2) * 2;
    let y = 2 * 4;
    let w = (cols as i32 - panel as i32 - 4) * 2;
    let h = (rows as i32 - 4) * 4;
    Viewport { x, y, w, h }
}

/// Centre of a terminal cell in viewport pixels.
pub(crate) fn cell_centre(vp: Viewport, col: u16, row: u16) -> (f64, f64) {
    (
        col as f64 * 2.0 + 1.0 - vp.x as f64,
        row as f64 * 4.0 + 2.0 - vp.y as f64,
    )
}

/// Scene geometry for a viewport. Scene units are braille pixels and the
/// tank is square in plan, as wide as it is drawn.
pub(crate) fn scene_config(vp: Viewport, object: &ObjectPreset, amplification: f64) -> SimulationConfig {
    let h = vp.h.max(MIN_TANK_H) as f64;
    let w = vp.w.max(MIN_TANK_W) as f64;
    let size = (h / 6.0).round().clamp(6.0, 48.0);
    let metres_per_unit = object.volume_m3.cbrt() / size;
    let tank_w = w * metres_per_unit;
    SimulationConfig {
        container_top: 0.0,
        container_height: h,
        object_size: size,
        cross_section_area: tank_w * tank_w,
        level_amplification: amplification,
        initial_water_level: (h * 0.45).round(),
        ..SimulationConfig::default()
    }
    .with_object(object)
}

pub(crate) struct App {
    settings: Settings,
    settings_path: Option<PathBuf>,
    term: Terminal,
    scene: Scene,
    arbiter: SharedArbiter,
    drag: DragTracker,
    viewport: Viewport,
    object: ObjectPreset,
    screen: Screen,
    show_hud: bool,
    probe: PressureProbe,
    probe_frame: Option<ProbeFrame>,
    pipe: PipeFlow,
    particles: ParticleStream,
    paused: bool,
    pending_expiry: Vec<ExpiryTimer>,
    last_frame: Option<FrameParams>,
    clock: Instant,
    should_quit: bool,
}

fn resolve_fluid(key: &str) -> FluidChoice {
    fluid_by_key(key).unwrap_or_else(|| {
        warn!("unknown fluid `{key}`, using water");
        water()
    })
}

fn resolve_object(key: &str) -> ObjectPreset {
    object_by_key(key).unwrap_or_else(|| {
        warn!("unknown object `{key}`, using {}", OBJECTS[0].key);
        OBJECTS[0]
    })
}

fn mount(
    vp: Viewport,
    object: &ObjectPreset,
    amplification: f64,
    fluid: FluidChoice,
    arbiter: &SharedArbiter,
) -> anyhow::Result<Scene> {
    let cfg = scene_config(vp, object, amplification);
    let scene = Scene::mount(cfg, fluid, Box::new(arbiter.clone()), vp.w as f64 / 2.0)?;
    Ok(scene)
}

impl App {
    fn init(args: &Args) -> anyhow::Result<Self> {
        let settings_path = match settings_path() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("settings disabled: {e:#}");
                None
            }
        };
        let mut settings = settings_path
            .as_deref()
            .map(load_settings)
            .unwrap_or_default();

        if let Some(fps) = args.fps {
            settings.fps_cap = fps;
        }
        if let Some(fluid) = &args.fluid {
            settings.fluid = fluid.clone();
        }
        if let Some(object) = &args.object {
            settings.object = object.clone();
        }
        if let Some(amp) = args.amplification {
            settings.level_amplification = amp;
        }
        if args.no_color {
            settings.enable_color = false;
        }

        let fluid = resolve_fluid(&settings.fluid);
        let object = resolve_object(&settings.object);
        settings.fluid = fluid.key.clone();
        settings.object = object.key.to_string();

        let show_hud = !args.no_hud;
        let arbiter = SharedArbiter::new();

        let mut term = Terminal::begin()?;
        let viewport = tank_viewport(term.cols, term.rows, show_hud);
        let scene = match mount(
            viewport,
            &object,
            settings.level_amplification,
            fluid,
            &arbiter,
        ) {
            Ok(s) => s,
            Err(e) => {
                term.end()?;
                return Err(e);
            }
        };
        info!(
            "started: {} in {}, amplification {}",
            object.name,
            scene.state().selected_fluid.name,
            settings.level_amplification
        );

        let probe_fluid = probe_fluid_by_key("water").unwrap_or_else(water);
        let probe = PressureProbe::new(probe_fluid, Box::new(arbiter.clone()));

        Ok(Self {
            settings,
            settings_path: if args.no_save { None } else { settings_path },
            term,
            scene,
            arbiter,
            drag: DragTracker::default(),
            viewport,
            object,
            screen: args.screen,
            show_hud,
            probe,
            probe_frame: None,
            pipe: PipeFlow::default(),
            particles: ParticleStream::default(),
            paused: false,
            pending_expiry: Vec::new(),
            last_frame: None,
            clock: Instant::now(),
            should_quit: false,
        })
    }

    /// Replaces the scene. The old one is torn down on drop, which also
    /// releases any gesture it still holds.
    fn remount(&mut self) -> anyhow::Result<()> {
        self.cancel_drag();
        self.pending_expiry.clear();
        self.last_frame = None;
        let fluid = self.scene.state().selected_fluid.clone();
        let air = self.scene.state().atmospheric_pressure;
        self.scene = mount(
            self.viewport,
            &self.object,
            self.settings.level_amplification,
            fluid,
            &self.arbiter,
        )?;
        self.scene.set_atmospheric_pressure(air);
        Ok(())
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let frame_start = Instant::now();
            if self.term.resize_if_needed()? {
                self.viewport = tank_viewport(self.term.cols, self.term.rows, self.show_hud);
                debug!("resized to {}x{}", self.term.cols, self.term.rows);
                self.remount()?;
            }

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event(&ev) {
                    self.apply(action)?;
                }
                if self.should_quit {
                    break;
                }
            }

            let now = self.clock.elapsed();
            match self.screen {
                Screen::Tank => self.tick_tank(now),
                Screen::Pressure => self.probe_frame = Some(self.probe.frame(now)),
                Screen::Flow => self
                    .particles
                    .tick(now, !self.paused && self.pipe.flow_rate_lps > 0.0),
            }

            self.render_frame()?;
            spin_sleep(frame_dt, frame_start);
        }
        self.probe.shutdown();
        Ok(())
    }

    fn apply(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextFluid if self.screen == Screen::Pressure => {
                let key = next_probe_fluid_key(&self.probe.fluid().key);
                if let Some(fluid) = probe_fluid_by_key(key) {
                    self.probe.select_fluid(fluid);
                }
            }
            Action::NextFluid => {
                let key = next_fluid_key(&self.scene.state().selected_fluid.key);
                if self.scene.select_fluid_by_key(key) {
                    self.settings.fluid = key.to_string();
                }
            }
            Action::NextObject => {
                self.object = resolve_object(next_object_key(self.object.key));
                self.settings.object = self.object.key.to_string();
                self.remount()?;
            }
            Action::Nudge(dy) => {
                if self.arbiter.is_suppressed() {
                    debug!("nudge ignored while dragging");
                } else if self.screen == Screen::Pressure {
                    let cm = ProbeLayout::for_viewport(self.viewport).px_to_cm(dy);
                    self.probe.request_depth(self.probe.depth_cm() + cm);
                } else {
                    let y = self.scene.state().object_position + dy;
                    self.scene.request_position(y);
                }
            }
            Action::ToggleScreen => {
                self.cancel_drag();
                self.particles.clear();
                if self.screen == Screen::Pressure {
                    self.probe.shutdown();
                    self.probe_frame = None;
                }
                self.screen = self.screen.next();
            }
            Action::Pipe(knob, steps) => {
                if self.screen == Screen::Flow {
                    self.pipe.adjust(knob, steps);
                }
            }
            Action::Atmosphere(steps) => {
                if self.screen == Screen::Tank {
                    self.scene.adjust_atmosphere(steps);
                }
            }
            Action::ToggleForces => self.settings.show_forces = !self.settings.show_forces,
            Action::ToggleGauge => self.settings.show_gauge = !self.settings.show_gauge,
            Action::TogglePause if self.screen == Screen::Pressure => {
                self.probe.set_playing(!self.probe.is_playing());
            }
            Action::TogglePause => self.paused = !self.paused,
            Action::Press { col, row } => {
                let grabbed = match self.screen {
                    Screen::Tank => self.hits_object(col, row),
                    Screen::Pressure => self.hits_marker(col, row),
                    Screen::Flow => false,
                };
                if grabbed {
                    let ev = self.drag.start(row);
                    self.send_gesture(ev);
                }
            }
            Action::Drag { row } => {
                if self.drag.is_active() {
                    let ev = self.drag.drag(row);
                    self.send_gesture(ev);
                }
            }
            Action::Release => {
                if self.drag.is_active() {
                    let ev = self.drag.end();
                    self.send_gesture(ev);
                }
            }
            Action::Cancel => self.cancel_drag(),
        }
        Ok(())
    }

    /// Routes a pointer gesture to whatever the current screen lets you drag.
    fn send_gesture(&mut self, ev: GestureEvent) {
        match self.screen {
            Screen::Tank => {
                if let GestureOutcome::Moved { clamped: true, .. } = self.scene.on_gesture(ev) {
                    debug!("drag clamped at {}", self.scene.state().object_position);
                }
            }
            Screen::Pressure => {
                // the tracker reports pixels, the gauge works in centimetres
                let layout = ProbeLayout::for_viewport(self.viewport);
                let ev = match ev {
                    GestureEvent::Move { delta_y } => GestureEvent::Move {
                        delta_y: delta_y.map(|px| layout.px_to_cm(px)),
                    },
                    other => other,
                };
                if let GestureOutcome::Moved { clamped: true, .. } = self.probe.on_gesture(ev) {
                    debug!("depth clamped at {} cm", self.probe.depth_cm());
                }
            }
            Screen::Flow => {}
        }
    }

    fn cancel_drag(&mut self) {
        if self.drag.is_active() {
            let ev = self.drag.cancel();
            self.send_gesture(ev);
        }
    }

    fn hits_object(&self, col: u16, row: u16) -> bool {
        let vp = self.viewport;
        let s = self.scene.config().object_size;
        let top = self
            .last_frame
            .as_ref()
            .map(|f| f.object_y)
            .unwrap_or(self.scene.state().object_position);
        let (px, py) = cell_centre(vp, col, row);
        let left = vp.w as f64 / 2.0 - s / 2.0;
        // one cell of slack around the square
        px >= left - 2.0 && px <= left + s + 2.0 && py >= top - 4.0 && py <= top + s + 4.0
    }

    fn hits_marker(&self, col: u16, row: u16) -> bool {
        let vp = self.viewport;
        let depth = self
            .probe_frame
            .map(|f| f.depth_cm)
            .unwrap_or(self.probe.depth_cm());
        let (mx, my, r) = ProbeLayout::for_viewport(vp).marker(vp, depth);
        let (px, py) = cell_centre(vp, col, row);
        (px - mx).abs() <= r + 2.0 && (py - my).abs() <= r + 4.0
    }

    fn tick_tank(&mut self, now: Duration) {
        if let Some(token) = self.scene.request_frame() {
            if let Some(frame) = self.scene.on_frame(token, now) {
                self.last_frame = Some(frame);
            }
        }
        self.pending_expiry.extend(self.scene.take_expiry_timers());
        let (due, later): (Vec<_>, Vec<_>) =
            self.pending_expiry.drain(..).partition(|t| t.due <= now);
        self.pending_expiry = later;
        for t in due {
            self.scene.expire_ripple(t);
        }
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        self.term.cur.clear(BG);
        self.term.canvas.clear();

        let vp = self.viewport;
        let too_small = vp.w < MIN_TANK_W || vp.h < MIN_TANK_H;
        if too_small {
            draw_text(
                &mut self.term.cur,
                1,
                1,
                "terminal too small",
                Color::Yellow,
                BG,
            );
            return self.term.present(true);
        }

        let fluid = self.scene.state().selected_fluid.clone();
        match self.screen {
            Screen::Tank => {
                if let Some(frame) = &self.last_frame {
                    let d = self.scene.derived();
                    let strongest = d.buoyant_force.max(d.object_weight).max(1e-9);
                    let arrows = if self.settings.show_forces { 0.9 } else { 0.0 };
                    let look = TankLook {
                        fluid: fluid.display_color,
                        floats: d.will_float,
                        object_size: self.scene.config().object_size.round() as i32,
                        buoyancy_arrow: arrows * d.buoyant_force / strongest,
                        weight_arrow: arrows * d.object_weight / strongest,
                        gauge: self.settings.show_gauge,
                    };
                    draw_tank(&mut self.term.canvas, vp, frame, &look);
                    draw_ripples(&mut self.term.canvas, vp, &frame.ripples);
                }
            }
            Screen::Pressure => {
                if let Some(frame) = &self.probe_frame {
                    let color = self.probe.fluid().display_color;
                    draw_probe(&mut self.term.canvas, vp, frame, color);
                }
            }
            Screen::Flow => draw_pipe(
                &mut self.term.canvas,
                vp,
                &self.pipe,
                self.particles.particles(),
                fluid.display_color,
            ),
        }
        canvas_to_cells(
            &self.term.canvas,
            &mut self.term.cur,
            self.settings.enable_color,
            BG,
        );

        if self.show_hud {
            let lines = match self.screen {
                Screen::Tank => self.tank_hud(),
                Screen::Pressure => self.probe_hud(),
                Screen::Flow => self.flow_hud(),
            };
            for (i, (text, fg)) in lines.iter().enumerate() {
                let fg = if self.settings.enable_color {
                    *fg
                } else {
                    Color::White
                };
                draw_text(&mut self.term.cur, 1, 1 + i as u16, text, fg, BG);
            }
        }
        let hint = match self.screen {
            Screen::Tank => {
                "drag the block | arrows move | f fluid | o object | a/A air | v forces | g gauge | tab next | q quit"
            }
            Screen::Pressure => {
                "drag the marker | arrows move | f fluid | space pulse | tab next | q quit"
            }
            Screen::Flow => {
                "+/- flow | d/D n/N diameters | h/H j/J heights | space pause | tab next | q quit"
            }
        };
        let bottom = self.term.rows.saturating_sub(1);
        draw_text(&mut self.term.cur, 1, bottom, hint, Color::DarkGrey, BG);

        self.term.present(true)
    }

    fn tank_hud(&self) -> Vec<(String, Color)> {
        let s = self.scene.state();
        let d = self.scene.derived();
        let fluid_color = to_color(s.selected_fluid.display_color);
        let verdict = if d.will_float {
            (
                format!(
                    "FLOATS ({:.0}% under at rest)",
                    self.scene.model().equilibrium_fraction(&s.selected_fluid) * 100.0
                ),
                Color::Green,
            )
        } else {
            ("SINKS".to_string(), Color::Red)
        };
        let mut lines = vec![
            ("UNDER PRESSURE | buoyancy".to_string(), Color::Cyan),
            (String::new(), Color::White),
            (
                format!(
                    "Fluid:   {} ({:.0} kg/m³)",
                    s.selected_fluid.name,
                    s.selected_fluid.density()
                ),
                fluid_color,
            ),
            (
                format!(
                    "Object:  {} ({:.0} kg/m³)",
                    self.object.name,
                    self.scene.config().object_density
                ),
                Color::White,
            ),
            (
                format!(
                    "Under:   {} {:>3.0}%",
                    bar(d.submerged_ratio, 12),
                    d.submerged_ratio * 100.0
                ),
                fluid_color,
            ),
            (
                format!("Volume:  {:.3e} m³", d.submerged_volume),
                Color::White,
            ),
            (
                format!("Air:     {}", format_pressure(s.atmospheric_pressure)),
                Color::White,
            ),
        ];
        if self.settings.show_gauge {
            lines.push((
                format!("Depth p: {}", format_pressure(d.hydrostatic_pressure)),
                Color::White,
            ));
            lines.push((
                format!("Abs p:   {}", format_pressure(d.absolute_pressure)),
                Color::White,
            ));
        }
        if self.settings.show_forces {
            lines.push((
                format!("Buoyant: {} up", format_force(d.buoyant_force)),
                Color::Green,
            ));
            lines.push((
                format!("Weight:  {} down", format_force(d.object_weight)),
                Color::Red,
            ));
            lines.push((
                format!(
                    "Net:     {} {}",
                    format_force(d.net_force),
                    if d.net_force >= 0.0 { "up" } else { "down" }
                ),
                Color::White,
            ));
        }
        lines.push((String::new(), Color::White));
        lines.push(verdict);
        lines.push((
            format!("State:   {:?}", self.scene.phase()),
            Color::DarkGrey,
        ));
        lines
    }

    fn probe_hud(&self) -> Vec<(String, Color)> {
        let fluid = self.probe.fluid();
        let depth_m = self.probe.depth_cm() / 100.0;
        let p = self.probe.pressure();
        vec![
            ("UNDER PRESSURE | depth gauge".to_string(), Color::Cyan),
            (String::new(), Color::White),
            (
                format!("Fluid:   {} ({:.0} kg/m³)", fluid.name, fluid.density()),
                to_color(fluid.display_color),
            ),
            (format!("Depth:   {:.0} cm", self.probe.depth_cm()), Color::White),
            (format!("Gauge p: {}", format_pressure(p)), Color::Yellow),
            (
                format!(
                    "Abs p:   {}",
                    format_pressure(p + self.scene.state().atmospheric_pressure)
                ),
                Color::White,
            ),
            (String::new(), Color::White),
            (
                format!(
                    "P = ρgh = {:.0} × {GRAVITY} × {depth_m:.2}",
                    fluid.density()
                ),
                Color::DarkGrey,
            ),
            (
                format!(
                    "Pulse:   {}",
                    if self.probe.is_playing() { "on" } else { "off" }
                ),
                Color::DarkGrey,
            ),
            (
                format!("State:   {:?}", self.probe.phase()),
                Color::DarkGrey,
            ),
        ]
    }

    fn flow_hud(&self) -> Vec<(String, Color)> {
        let fluid = &self.scene.state().selected_fluid;
        let f = self.pipe.compute(fluid);
        vec![
            ("UNDER PRESSURE | pipe flow".to_string(), Color::Cyan),
            (String::new(), Color::White),
            (
                format!("Fluid:   {} ({:.0} kg/m³)", fluid.name, fluid.density()),
                to_color(fluid.display_color),
            ),
            (
                format!(
                    "Q:       {:.1} L/s{}",
                    self.pipe.flow_rate_lps,
                    if self.paused { " (paused)" } else { "" }
                ),
                Color::White,
            ),
            (
                format!("d1, d2:  {:.0} / {:.0} mm", self.pipe.diameter_1 * 1000.0, self.pipe.diameter_2 * 1000.0),
                Color::White,
            ),
            (
                format!("h1, h2:  {:.0} / {:.0} cm", self.pipe.height_1 * 100.0, self.pipe.height_2 * 100.0),
                Color::White,
            ),
            (format!("v1:      {}", format_velocity(f.velocity_1)), Color::White),
            (format!("v2:      {}", format_velocity(f.velocity_2)), Color::White),
            (format!("p1:      {}", format_pressure(f.pressure_1)), Color::White),
            (format!("p2:      {}", format_pressure(f.pressure_2)), Color::White),
        ]
    }

    fn persist(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = save_settings_atomic(path, &self.settings) {
            warn!("could not save settings: {e:#}");
        }
    }
}

pub(crate) fn run(args: &Args) -> anyhow::Result<()> {
    let mut app = App::init(args)?;
    let result = app.run();
    let restored = app.term.end();
    app.persist();
    result.and(restored)
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
