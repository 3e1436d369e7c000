use super::action::NextAction;
use crate::input::{parse_chord, InputDriver, InputError, KeyError, MouseButton, TypingCadence};
use crate::screen::{to_model_space, to_real_space, ScreenGeometry};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Pause between moving to a click target and pressing the button, so the
/// hover state settles before the click lands.
const CLICK_SETTLE: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Input action failed: {0}")]
    Input(#[from] InputError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("Unsupported action: {0}")]
    Unsupported(String),
}

/// What a dispatched action produced. `cursor_position` is the one
/// informational action; its model-space answer is returned here instead
/// of being dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Performed {
    Done,
    CursorPosition { x: f64, y: f64 },
}

/// Turns a typed action into real input events, owning all per-variant
/// edge-case policy: coordinate mapping, click settle timing, the closed
/// key table, and optional-coordinate clicks.
pub struct InputDispatcher<D: InputDriver> {
    driver: D,
}

impl<D: InputDriver> InputDispatcher<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn perform(
        &mut self,
        action: &NextAction,
        geometry: &ScreenGeometry,
    ) -> Result<Performed, DispatchError> {
        log::info!("performing action: {:?}", action);

        match action {
            NextAction::MouseMove { x, y } => {
                let (rx, ry) = to_real_space(*x, *y, geometry);
                self.driver.set_position(rx.round() as i32, ry.round() as i32)?;
                Ok(Performed::Done)
            }

            NextAction::LeftClickDrag { x, y } => {
                let (rx, ry) = to_real_space(*x, *y, geometry);
                let target = (rx.round() as i32, ry.round() as i32);
                // Drag starts wherever the pointer currently is
                let from = self.driver.get_position()?;
                log::info!("dragging from {:?} to {:?}", from, target);
                self.driver.drag(from, target)?;
                Ok(Performed::Done)
            }

            NextAction::CursorPosition => {
                let (rx, ry) = self.driver.get_position()?;
                let (mx, my) = to_model_space(rx as f64, ry as f64, geometry);
                Ok(Performed::CursorPosition { x: mx, y: my })
            }

            NextAction::LeftClick { x, y } => self.click(*x, *y, MouseButton::Left, geometry),
            NextAction::RightClick { x, y } => self.click(*x, *y, MouseButton::Right, geometry),
            NextAction::MiddleClick { x, y } => self.click(*x, *y, MouseButton::Middle, geometry),

            NextAction::DoubleClick { x, y } => {
                self.move_to_target(*x, *y, geometry)?;
                self.driver.double_click(MouseButton::Left)?;
                Ok(Performed::Done)
            }

            NextAction::Type { text } => {
                self.driver.type_text(text, TypingCadence::Instant)?;
                Ok(Performed::Done)
            }

            NextAction::Key { text } => {
                // Resolve the whole chord before touching the driver, so an
                // unknown component means zero injected input
                let keys = parse_chord(text)?;
                self.driver.press_chord(&keys)?;
                Ok(Performed::Done)
            }

            // The loop captures after every action anyway
            NextAction::Screenshot => Ok(Performed::Done),

            NextAction::Finish { .. } | NextAction::Error { .. } => Err(
                DispatchError::Unsupported(format!("{:?} is not an input action", action)),
            ),
        }
    }

    /// Moves to the mapped target and waits for the hover to settle; with
    /// no coordinates the click happens wherever the pointer already is.
    fn move_to_target(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        geometry: &ScreenGeometry,
    ) -> Result<(), DispatchError> {
        if let (Some(x), Some(y)) = (x, y) {
            let (rx, ry) = to_real_space(x, y, geometry);
            self.driver.set_position(rx.round() as i32, ry.round() as i32)?;
            thread::sleep(CLICK_SETTLE);
        }
        Ok(())
    }

    fn click(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        button: MouseButton,
        geometry: &ScreenGeometry,
    ) -> Result<Performed, DispatchError> {
        self.move_to_target(x, y, geometry)?;
        self.driver.click(button)?;
        Ok(Performed::Done)
    }
}
