use super::{InputDriver, InputError, MouseButton, TypingCadence};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::thread;
use std::time::Duration;

const DRAG_STEP_INTERVAL: Duration = Duration::from_millis(16);
const DRAG_EDGE_PAUSE: Duration = Duration::from_millis(50);
const DRAG_DURATION_MS: u32 = 500;
const NATURAL_KEYSTROKE_DELAY: Duration = Duration::from_millis(50);

impl From<MouseButton> for Button {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        }
    }
}

/// Real OS input driver backed by enigo.
pub struct EnigoDriver {
    enigo: Enigo,
}

impl EnigoDriver {
    pub fn new() -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::InitError(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn button(&mut self, button: MouseButton, direction: Direction) -> Result<(), InputError> {
        self.enigo
            .button(button.into(), direction)
            .map_err(|e| InputError::ActionError(e.to_string()))
    }
}

impl InputDriver for EnigoDriver {
    fn set_position(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InputError::ActionError(e.to_string()))
    }

    fn get_position(&mut self) -> Result<(i32, i32), InputError> {
        self.enigo
            .location()
            .map_err(|e| InputError::ActionError(e.to_string()))
    }

    fn click(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.button(button, Direction::Click)
    }

    fn double_click(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.button(button, Direction::Click)?;
        self.button(button, Direction::Click)
    }

    fn drag(&mut self, from: (i32, i32), to: (i32, i32)) -> Result<(), InputError> {
        self.set_position(from.0, from.1)?;
        thread::sleep(DRAG_EDGE_PAUSE);

        self.button(MouseButton::Left, Direction::Press)?;
        thread::sleep(DRAG_EDGE_PAUSE);

        // Smooth movement to the target (~60fps)
        let steps = (DRAG_DURATION_MS / 16).max(5);
        let dx = (to.0 - from.0) as f32 / steps as f32;
        let dy = (to.1 - from.1) as f32 / steps as f32;

        for i in 1..=steps {
            let x = from.0 + (dx * i as f32) as i32;
            let y = from.1 + (dy * i as f32) as i32;
            self.set_position(x, y)?;
            thread::sleep(DRAG_STEP_INTERVAL);
        }

        // Land on the exact target before releasing
        self.set_position(to.0, to.1)?;
        thread::sleep(DRAG_EDGE_PAUSE);

        self.button(MouseButton::Left, Direction::Release)
    }

    fn type_text(&mut self, text: &str, cadence: TypingCadence) -> Result<(), InputError> {
        match cadence {
            TypingCadence::Instant => self
                .enigo
                .text(text)
                .map_err(|e| InputError::ActionError(e.to_string())),
            TypingCadence::Natural => {
                let mut buf = [0u8; 4];
                for ch in text.chars() {
                    self.enigo
                        .text(ch.encode_utf8(&mut buf))
                        .map_err(|e| InputError::ActionError(e.to_string()))?;
                    thread::sleep(NATURAL_KEYSTROKE_DELAY);
                }
                Ok(())
            }
        }
    }

    fn press_chord(&mut self, keys: &[Key]) -> Result<(), InputError> {
        let enigo = &mut self.enigo;
        run_chord(keys, |key, direction| {
            enigo
                .key(key, direction)
                .map_err(|e| InputError::ActionError(e.to_string()))
        })
    }
}

/// Presses every key of the chord in order, then releases in reverse. A
/// failed event never leaves earlier keys of the chord held: on a press
/// failure the already-pressed keys get a best-effort release, and on a
/// release failure the remaining keys are still released. The first error
/// is returned.
fn run_chord<E>(
    keys: &[Key],
    mut event: impl FnMut(Key, Direction) -> Result<(), E>,
) -> Result<(), E> {
    let mut held: Vec<Key> = Vec::with_capacity(keys.len());
    for key in keys {
        if let Err(e) = event(*key, Direction::Press) {
            for pressed in held.iter().rev() {
                let _ = event(*pressed, Direction::Release);
            }
            return Err(e);
        }
        held.push(*key);
    }

    let mut first_error = None;
    for key in keys.iter().rev() {
        if let Err(e) = event(*key, Direction::Release) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
