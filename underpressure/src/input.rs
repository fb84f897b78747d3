use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::time::Duration;
use underpressure::flow::PipeKnob;
use underpressure::GestureEvent;

/// Terminal rows are four braille pixels tall.
pub(crate) const PIXELS_PER_ROW: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Action {
    Quit,
    NextFluid,
    NextObject,
    Nudge(f64),
    ToggleScreen,
    /// Turns a pipe control by whole notches.
    Pipe(PipeKnob, i32),
    /// Air pressure, in 5 kPa notches.
    Atmosphere(i32),
    ToggleForces,
    ToggleGauge,
    TogglePause,
    /// Left button pressed at a cell.
    Press { col: u16, row: u16 },
    Drag { row: u16 },
    Release,
    Cancel,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<Event>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        out.push(event::read()?);
        if out.len() >= 64 {
            break;
        }
    }
    Ok(out)
}

pub(crate) fn map_event(ev: &Event) -> Option<Action> {
    match ev {
        Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
            if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
                return Some(Action::Quit);
            }
            let step = if k.modifiers.contains(KeyModifiers::SHIFT) {
                16.0
            } else {
                4.0
            };
            match k.code {
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
                KeyCode::Char('f') | KeyCode::Char('F') => Some(Action::NextFluid),
                KeyCode::Char('o') | KeyCode::Char('O') => Some(Action::NextObject),
                KeyCode::Up => Some(Action::Nudge(-step)),
                KeyCode::Down => Some(Action::Nudge(step)),
                KeyCode::Tab => Some(Action::ToggleScreen),
                KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::Pipe(PipeKnob::FlowRate, 1)),
                KeyCode::Char('-') | KeyCode::Char('_') => {
                    Some(Action::Pipe(PipeKnob::FlowRate, -1))
                }
                KeyCode::Char(' ') => Some(Action::TogglePause),
                KeyCode::Char('v') | KeyCode::Char('V') => Some(Action::ToggleForces),
                KeyCode::Char('g') | KeyCode::Char('G') => Some(Action::ToggleGauge),
                // lower case raises, upper case lowers
                KeyCode::Char(c) => notch(c),
                _ => None,
            }
        }
        Event::Mouse(m) => map_mouse(m),
        Event::FocusLost => Some(Action::Cancel),
        _ => None,
    }
}

fn notch(c: char) -> Option<Action> {
    let steps = if c.is_ascii_uppercase() { -1 } else { 1 };
    let action = match c.to_ascii_lowercase() {
        'a' => Action::Atmosphere(steps),
        'd' => Action::Pipe(PipeKnob::Diameter1, steps),
        'n' => Action::Pipe(PipeKnob::Diameter2, steps),
        'h' => Action::Pipe(PipeKnob::Height1, steps),
        'j' => Action::Pipe(PipeKnob::Height2, steps),
        _ => return None,
    };
    Some(action)
}

fn map_mouse(m: &MouseEvent) -> Option<Action> {
    match m.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(Action::Press {
            col: m.column,
            row: m.row,
        }),
        MouseEventKind::Drag(MouseButton::Left) => Some(Action::Drag { row: m.row }),
        MouseEventKind::Up(MouseButton::Left) => Some(Action::Release),
        _ => None,
    }
}

/// Turns absolute pointer rows into relative gesture moves.
#[derive(Debug, Default)]
pub(crate) struct DragTracker {
    last_row: Option<u16>,
}

impl DragTracker {
    pub(crate) fn is_active(&self) -> bool {
        self.last_row.is_some()
    }

    pub(crate) fn start(&mut self, row: u16) -> GestureEvent {
        self.last_row = Some(row);
        GestureEvent::Start
    }

    /// A drag report without a preceding press yields a move with no delta,
    /// which the controller drops.
    pub(crate) fn drag(&mut self, row: u16) -> GestureEvent {
        let delta_y = self
            .last_row
            .map(|prev| (row as f64 - prev as f64) * PIXELS_PER_ROW);
        if self.last_row.is_some() {
            self.last_row = Some(row);
        }
        GestureEvent::Move { delta_y }
    }

    pub(crate) fn end(&mut self) -> GestureEvent {
        self.last_row = None;
        GestureEvent::End
    }

    pub(crate) fn cancel(&mut self) -> GestureEvent {
        self.last_row = None;
        GestureEvent::Cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventState};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(
            map_event(&key(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Action::Quit)
        );
        assert_eq!(
            map_event(&key(KeyCode::Down, KeyModifiers::SHIFT)),
            Some(Action::Nudge(16.0))
        );
        assert_eq!(map_event(&key(KeyCode::Char('z'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn letter_case_picks_the_direction() {
        assert_eq!(
            map_event(&key(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(Action::Atmosphere(1))
        );
        assert_eq!(
            map_event(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(Action::Atmosphere(-1))
        );
        assert_eq!(
            map_event(&key(KeyCode::Char('N'), KeyModifiers::SHIFT)),
            Some(Action::Pipe(PipeKnob::Diameter2, -1))
        );
        assert_eq!(
            map_event(&key(KeyCode::Char('j'), KeyModifiers::NONE)),
            Some(Action::Pipe(PipeKnob::Height2, 1))
        );
        assert_eq!(
            map_event(&key(KeyCode::Char('-'), KeyModifiers::NONE)),
            Some(Action::Pipe(PipeKnob::FlowRate, -1))
        );
    }

    #[test]
    fn display_toggles() {
        assert_eq!(
            map_event(&key(KeyCode::Char('v'), KeyModifiers::NONE)),
            Some(Action::ToggleForces)
        );
        assert_eq!(
            map_event(&key(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(Action::ToggleGauge)
        );
    }

    #[test]
    fn left_button_drives_gestures() {
        assert_eq!(
            map_event(&mouse(MouseEventKind::Down(MouseButton::Left), 3, 7)),
            Some(Action::Press { col: 3, row: 7 })
        );
        assert_eq!(
            map_event(&mouse(MouseEventKind::Drag(MouseButton::Left), 3, 9)),
            Some(Action::Drag { row: 9 })
        );
        assert_eq!(
            map_event(&mouse(MouseEventKind::Down(MouseButton::Right), 3, 9)),
            None
        );
        assert_eq!(map_event(&Event::FocusLost), Some(Action::Cancel));
    }

    #[test]
    fn tracker_reports_pixel_deltas() {
        let mut t = DragTracker::default();
        assert_eq!(t.start(10), GestureEvent::Start);
        assert_eq!(
            t.drag(12),
            GestureEvent::Move {
                delta_y: Some(8.0)
            }
        );
        assert_eq!(
            t.drag(11),
            GestureEvent::Move {
                delta_y: Some(-4.0)
            }
        );
        assert_eq!(t.end(), GestureEvent::End);
        assert_eq!(t.drag(5), GestureEvent::Move { delta_y: None });
        assert!(!t.is_active());
    }
}
