//! deskpilot drives a desktop automation agent: a vision-language model is
//! asked what single input action to perform next, the action is executed
//! against the real OS, the resulting screen is captured and fed back, and
//! the cycle repeats until the model signals completion, something fails,
//! or the step budget runs out.
//!
//! The externals are trait seams: [`agent::StepPlanner`] for the model,
//! [`input::InputDriver`] for input injection, [`capture::Capturer`] for
//! the screen, [`host::WindowHost`] for the embedding UI's visibility and
//! [`screen::DisplayProbe`] for live display geometry.

pub mod agent;
pub mod capture;
pub mod config;
pub mod host;
pub mod input;
pub mod llm;
pub mod screen;
