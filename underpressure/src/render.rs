use crossterm::{
    cursor,
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::f64::consts::TAU;
use std::io::{self, Write};
use underpressure::driver::{FrameParams, RippleView};
use underpressure::flow::{FlowParticle, PipeFlow, NARROWING_AT};
use underpressure::fluid::Rgb;
use underpressure::probe::ProbeFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                bg,
                ..Cell::default()
            };
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl Pixel {
    pub(crate) fn from_rgb(c: Rgb, a: u8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a,
        }
    }
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }
    pub(crate) fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, w: i32, h: i32, p: Pixel) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                self.blend_over(x, y, p);
            }
        }
    }

    fn vline(&mut self, x: i32, y0: i32, y1: i32, p: Pixel) {
        for y in y0.min(y1)..=y0.max(y1) {
            self.blend_over(x, y, p);
        }
    }

    fn hline(&mut self, x0: i32, x1: i32, y: i32, p: Pixel) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.blend_over(x, y, p);
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            EnableMouseCapture,
            EnableFocusChange,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);

        // Braille: 2×4 pixels per cell
        let canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            DisableFocusChange,
            DisableMouseCapture,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

/// Writes braille glyphs for every cell that has ink; leaves the rest alone
/// so text drawn earlier survives.
pub(crate) fn canvas_to_cells(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    enable_color: bool,
    bg: Color,
) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * 2;
            let py0 = cy * 4;

            let mut mask: u8 = 0;
            let mut sum_r: u32 = 0;
            let mut sum_g: u32 = 0;
            let mut sum_b: u32 = 0;
            let mut ink_count: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = px0 + dx;
                    let y = py0 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];

                    // threshold: treat alpha as ink
                    if p.a >= 32 {
                        mask |= braille_bit(dx, dy);
                        sum_r += p.r as u32;
                        sum_g += p.g as u32;
                        sum_b += p.b as u32;
                        ink_count += 1;
                    }
                }
            }
            if ink_count == 0 {
                continue;
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');
            let fg = if enable_color {
                Color::Rgb {
                    r: (sum_r / ink_count) as u8,
                    g: (sum_g / ink_count) as u8,
                    b: (sum_b / ink_count) as u8,
                }
            } else {
                Color::White
            };

            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

/* -----------------------------
   Tank scene
------------------------------ */

/// Tank interior in canvas pixels. Scene y 0 is `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
}

impl Viewport {
    pub(crate) fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

pub(crate) struct TankLook {
    pub(crate) fluid: Rgb,
    pub(crate) floats: bool,
    pub(crate) object_size: i32,
    /// Arrow lengths as fractions of the object size.
    pub(crate) buoyancy_arrow: f64,
    pub(crate) weight_arrow: f64,
    /// Dotted line at the bottom face, where pressure is read.
    pub(crate) gauge: bool,
}

const WALL: Pixel = Pixel {
    r: 1,
    g: 87,
    b: 155,
    a: 255,
};
const FLOATS: Rgb = Rgb::new(76, 175, 80);
const SINKS: Rgb = Rgb::new(244, 67, 54);

pub(crate) fn surface_y(frame: &FrameParams, vp: Viewport, x: i32) -> f64 {
    let t = (x - vp.x) as f64 / vp.w.max(1) as f64;
    frame.water_level + frame.surface_swell * (TAU * (1.5 * t + frame.idle_phase)).sin()
}

pub(crate) fn draw_tank(canvas: &mut PixelCanvas, vp: Viewport, frame: &FrameParams, look: &TankLook) {
    // walls and floor, one pixel outside the interior
    canvas.vline(vp.x - 1, vp.y, vp.y + vp.h, WALL);
    canvas.vline(vp.x + vp.w, vp.y, vp.y + vp.h, WALL);
    canvas.hline(vp.x - 1, vp.x + vp.w, vp.y + vp.h, WALL);

    let deep = look.fluid.lerp(Rgb::new(0, 0, 0), 0.55);
    for x in vp.x..vp.x + vp.w {
        let top = (vp.y as f64 + surface_y(frame, vp, x)).round() as i32;
        let top = top.max(vp.y);
        for y in top..vp.y + vp.h {
            let depth = (y - top) as f32 / vp.h.max(1) as f32;
            let c = look.fluid.lerp(deep, depth);
            // dither the body so braille shows texture, keep the surface solid
            let ink = y == top || (x + y) % 2 == 0;
            if ink {
                canvas.blend_over(x, y, Pixel::from_rgb(c, 150));
            }
        }
    }

    let s = look.object_size;
    let ox = vp.x + vp.w / 2 - s / 2;
    let oy = vp.y + frame.object_y.round() as i32;
    let body = if look.floats { FLOATS } else { SINKS };
    canvas.fill_rect(ox, oy, s, s, Pixel::from_rgb(body, 235));

    // force arrows from the centre: buoyancy up, weight down
    let cx = vp.x + vp.w / 2;
    let cy = oy + s / 2;
    let up = (look.buoyancy_arrow * s as f64).round() as i32;
    let down = (look.weight_arrow * s as f64).round() as i32;
    if up > 0 {
        canvas.vline(cx - 1, cy, cy - up, Pixel::from_rgb(FLOATS, 255));
    }
    if down > 0 {
        canvas.vline(cx + 1, cy, cy + down, Pixel::from_rgb(SINKS, 255));
    }

    if look.gauge {
        let y = oy + s;
        let surface = vp.y as f64 + frame.water_level;
        if y as f64 > surface {
            for x in (vp.x..ox - 1).step_by(3) {
                canvas.blend_over(x, y, Pixel::from_rgb(Rgb::new(255, 235, 59), 200));
            }
        }
    }
}

pub(crate) fn draw_ripples(canvas: &mut PixelCanvas, vp: Viewport, ripples: &[RippleView]) {
    for r in ripples {
        let alpha = (r.opacity.clamp(0.0, 1.0) * 255.0) as u8;
        let p = Pixel {
            r: 235,
            g: 245,
            b: 255,
            a: alpha,
        };
        // seen from the side: a flat ellipse on the surface
        let steps = (r.radius * 4.0).max(12.0) as usize;
        for i in 0..steps {
            let a = TAU * i as f64 / steps as f64;
            let x = vp.x as f64 + r.x + r.radius * a.cos();
            let y = vp.y as f64 + r.y + r.radius * 0.25 * a.sin();
            let (x, y) = (x.round() as i32, y.round() as i32);
            if vp.contains(x, y) {
                canvas.blend_over(x, y, p);
            }
        }
    }
}

/* -----------------------------
   Pressure column
------------------------------ */

/// Depth shown by the column, cm. The marker can reach most of it.
const COLUMN_DEPTH_CM: f64 = 120.0;
const MARKER_RADIUS: f64 = 3.0;
const MARKER: Rgb = Rgb::new(255, 235, 59);

/// Maps centimetres below the surface to viewport pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ProbeLayout {
    pub(crate) surface: f64,
    pub(crate) px_per_cm: f64,
}

impl ProbeLayout {
    pub(crate) fn for_viewport(vp: Viewport) -> Self {
        let surface = (vp.h as f64 * 0.1).round();
        let px_per_cm = ((vp.h as f64 - surface) / COLUMN_DEPTH_CM).max(0.1);
        Self { surface, px_per_cm }
    }

    pub(crate) fn depth_to_y(&self, depth_cm: f64) -> f64 {
        self.surface + depth_cm * self.px_per_cm
    }

    pub(crate) fn px_to_cm(&self, px: f64) -> f64 {
        px / self.px_per_cm
    }

    /// Marker centre and its hit radius, viewport pixels.
    pub(crate) fn marker(&self, vp: Viewport, depth_cm: f64) -> (f64, f64, f64) {
        let x = vp.w as f64 / 2.0;
        (x, self.depth_to_y(depth_cm), MARKER_RADIUS * 1.3)
    }
}

pub(crate) fn draw_probe(canvas: &mut PixelCanvas, vp: Viewport, frame: &ProbeFrame, fluid: Rgb) {
    let layout = ProbeLayout::for_viewport(vp);
    let left = vp.x + vp.w / 4;
    let right = vp.x + vp.w - vp.w / 4;
    let top = vp.y + layout.surface.round() as i32;
    let floor = vp.y + vp.h;

    canvas.vline(left - 1, vp.y, floor, WALL);
    canvas.vline(right, vp.y, floor, WALL);
    canvas.hline(left - 1, right, floor, WALL);

    let deep = fluid.lerp(Rgb::new(0, 0, 0), 0.55);
    for y in top..floor {
        let c = fluid.lerp(deep, (y - top) as f32 / (floor - top).max(1) as f32);
        for x in left..right {
            if y == top || (x + y) % 2 == 0 {
                canvas.blend_over(x, y, Pixel::from_rgb(c, 150));
            }
        }
    }

    // a tick every 10 cm, longer every 50
    let mut cm = 10.0;
    while cm <= COLUMN_DEPTH_CM {
        let y = vp.y + layout.depth_to_y(cm).round() as i32;
        let len = if cm % 50.0 == 0.0 { 6 } else { 3 };
        canvas.hline(left, left + len, y, WALL);
        cm += 10.0;
    }

    let (cx, cy, _) = layout.marker(vp, frame.depth_cm);
    let (cx, cy) = (vp.x as f64 + cx, vp.y as f64 + cy);
    let r = MARKER_RADIUS * frame.scale;
    let alpha = (frame.opacity.clamp(0.0, 1.0) * 255.0) as u8;
    canvas.vline(cx.round() as i32, top, (cy - r).round() as i32, Pixel::from_rgb(MARKER, 90));
    let reach = r.ceil() as i32;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let (fx, fy) = (dx as f64, dy as f64);
            if fx * fx + fy * fy <= r * r {
                let x = (cx + fx).round() as i32;
                let y = (cy + fy).round() as i32;
                canvas.blend_over(x, y, Pixel::from_rgb(MARKER, alpha));
            }
        }
    }
}

/* -----------------------------
   Pipe scene
------------------------------ */

pub(crate) fn draw_pipe(
    canvas: &mut PixelCanvas,
    vp: Viewport,
    pipe: &PipeFlow,
    particles: &[FlowParticle],
    fluid: Rgb,
) {
    let mid = vp.y + vp.h / 2;
    let widest = pipe.diameter_1.max(pipe.diameter_2).max(1e-6);
    let half = |d: f64| -> i32 { ((d / widest) * (vp.h as f64 * 0.35)).round().max(2.0) as i32 };
    let h1 = half(pipe.diameter_1);
    let h2 = half(pipe.diameter_2);
    let split = vp.x + (vp.w as f64 * NARROWING_AT).round() as i32;

    let body = Pixel::from_rgb(fluid, 120);
    canvas.fill_rect(vp.x, mid - h1, split - vp.x, 2 * h1, body);
    canvas.fill_rect(split, mid - h2, vp.x + vp.w - split, 2 * h2, body);

    canvas.hline(vp.x, split, mid - h1, WALL);
    canvas.hline(vp.x, split, mid + h1, WALL);
    canvas.hline(split, vp.x + vp.w, mid - h2, WALL);
    canvas.hline(split, vp.x + vp.w, mid + h2, WALL);
    canvas.vline(split, mid - h1, mid - h2, WALL);
    canvas.vline(split, mid + h2, mid + h1, WALL);

    let dot = Pixel {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
    for p in particles {
        let x = vp.x + (p.x_fraction() * vp.w as f64).round() as i32;
        for dy in 0..2 {
            for dx in 0..2 {
                canvas.blend_over(x + dx, mid + dy, dot);
            }
        }
    }
}

/* -----------------------------
   Text
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

pub(crate) fn bar(value01: f64, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f64 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

pub(crate) fn to_color(c: Rgb) -> Color {
    Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cell_is_full_braille() {
        let mut canvas = PixelCanvas::new(2, 4);
        canvas.fill_rect(
            0,
            0,
            2,
            4,
            Pixel {
                r: 10,
                g: 20,
                b: 30,
                a: 255,
            },
        );
        let mut cells = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut cells, true, Color::Black);
        assert_eq!(cells.cells[0].ch, '\u{28FF}');
        assert_eq!(cells.cells[0].fg, Color::Rgb { r: 10, g: 20, b: 30 });
    }

    #[test]
    fn empty_cells_keep_text() {
        let canvas = PixelCanvas::new(4, 4);
        let mut cells = CellBuffer::new(2, 1);
        draw_text(&mut cells, 0, 0, "ab", Color::White, Color::Black);
        canvas_to_cells(&canvas, &mut cells, true, Color::Black);
        assert_eq!(cells.cells[0].ch, 'a');
        assert_eq!(cells.cells[1].ch, 'b');
    }

    #[test]
    fn blending_out_of_bounds_is_ignored() {
        let mut canvas = PixelCanvas::new(2, 2);
        canvas.blend_over(-1, 0, Pixel::default());
        canvas.blend_over(5, 5, Pixel::default());
        assert!(canvas.px.iter().all(|p| *p == Pixel::default()));
    }

    #[test]
    fn column_spans_the_viewport_below_the_surface() {
        let vp = Viewport {
            x: 4,
            y: 8,
            w: 100,
            h: 130,
        };
        let l = ProbeLayout::for_viewport(vp);
        assert_eq!(l.depth_to_y(0.0), 13.0);
        assert!((l.depth_to_y(COLUMN_DEPTH_CM) - 130.0).abs() < 1e-9);
        assert!((l.px_to_cm(l.px_per_cm * 7.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn marker_is_drawn_at_its_depth() {
        let vp = Viewport {
            x: 0,
            y: 0,
            w: 40,
            h: 130,
        };
        let mut canvas = PixelCanvas::new(40, 140);
        let frame = ProbeFrame {
            depth_cm: 60.0,
            scale: 1.0,
            opacity: 1.0,
            settled: true,
        };
        draw_probe(&mut canvas, vp, &frame, Rgb::new(0, 0, 255));
        let y = ProbeLayout::for_viewport(vp).depth_to_y(60.0) as u32;
        let p = canvas.px[canvas.idx(20, y)];
        assert!(p.r > 200 && p.g > 200);
    }

    #[test]
    fn bar_rounds_to_nearest_cell() {
        assert_eq!(bar(0.5, 4), "[██  ]");
        assert_eq!(bar(2.0, 2), "[██]");
        assert_eq!(bar(-1.0, 2), "[  ]");
    }
}
