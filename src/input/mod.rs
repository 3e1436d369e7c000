pub mod enigo_driver;
pub mod keyboard;

pub use enigo_driver::EnigoDriver;
pub use keyboard::{parse_chord, parse_key, KeyError};

use enigo::Key;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to create input driver: {0}")]
    InitError(String),
    #[error("Failed to execute input action: {0}")]
    ActionError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// How fast injected text is typed. Passed per call so a failed type
/// action leaves no driver-wide speed setting to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingCadence {
    /// No inter-keystroke delay; used for agent-driven typing.
    Instant,
    /// Human-like cadence with a default per-keystroke delay.
    Natural,
}

/// Low-level input capability the dispatcher drives. All coordinates are
/// real display pixels; delivery is at-least-once per call.
pub trait InputDriver: Send {
    fn set_position(&mut self, x: i32, y: i32) -> Result<(), InputError>;

    fn get_position(&mut self) -> Result<(i32, i32), InputError>;

    fn click(&mut self, button: MouseButton) -> Result<(), InputError>;

    /// Two rapid presses of the given button.
    fn double_click(&mut self, button: MouseButton) -> Result<(), InputError>;

    /// Two-point drag holding the left button.
    fn drag(&mut self, from: (i32, i32), to: (i32, i32)) -> Result<(), InputError>;

    fn type_text(&mut self, text: &str, cadence: TypingCadence) -> Result<(), InputError>;

    /// Presses every key down in order, then releases in reverse, so the
    /// whole chord lands as one combined key-press.
    fn press_chord(&mut self, keys: &[Key]) -> Result<(), InputError>;
}
