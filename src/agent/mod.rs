pub mod action;
pub mod dispatch;
pub mod loop_runner;
pub mod planner;
pub mod state;

pub use action::{extract_action, NextAction, ParsedStep};
pub use dispatch::{DispatchError, InputDispatcher, Performed};
pub use loop_runner::{AgentLoop, LoopError, MAX_STEPS};
pub use planner::{strip_stale_images, PlanError, StepPlanner};
pub use state::{RunState, RunStateManager, RunStatus};
