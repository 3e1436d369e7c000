use super::action::{extract_action, NextAction};
use super::dispatch::{DispatchError, InputDispatcher, Performed};
use super::planner::{PlanError, StepPlanner};
use super::state::{RunState, RunStateManager};
use crate::capture::{capture_observation, CaptureError, Capturer};
use crate::host::{with_window_hidden, WindowHost};
use crate::input::InputDriver;
use crate::llm::Message;
use crate::screen::{DisplayProbe, ScreenError};
use thiserror::Error;
use tokio::time::{sleep, Duration};

/// Maximum number of action/result round-trips before the run is forced
/// to stop. Every step appends two messages, so the guard fires on the
/// history length.
pub const MAX_STEPS: usize = 50;

/// Wait after each action so the OS/UI reaches a stable state before the
/// next observation.
const ITERATION_SETTLE: Duration = Duration::from_millis(500);

const OBSERVATION_NOTE: &str = "Here is a screenshot after the action was executed";

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error("Maximum steps exceeded")]
    StepBudgetExceeded,
    #[error("{0}")]
    UnresolvedAction(String),
}

enum StepOutcome {
    Continue,
    Finished,
    Cancelled,
}

/// The orchestrating state machine: asks the planner for the next step,
/// translates and executes it, captures the resulting screen, and feeds
/// everything back into the shared conversation history until a terminal
/// condition. Strictly sequential; every awaited operation completes
/// before the next begins, so history order matches real event order.
pub struct AgentLoop<P, D, C, H, G>
where
    P: StepPlanner,
    D: InputDriver,
    C: Capturer,
    H: WindowHost,
    G: DisplayProbe,
{
    state: RunStateManager,
    planner: P,
    dispatcher: InputDispatcher<D>,
    capturer: C,
    host: H,
    probe: G,
}

impl<P, D, C, H, G> AgentLoop<P, D, C, H, G>
where
    P: StepPlanner,
    D: InputDriver,
    C: Capturer,
    H: WindowHost,
    G: DisplayProbe,
{
    pub fn new(
        state: RunStateManager,
        planner: P,
        driver: D,
        capturer: C,
        host: H,
        probe: G,
    ) -> Self {
        Self {
            state,
            planner,
            dispatcher: InputDispatcher::new(driver),
            capturer,
            host,
            probe,
        }
    }

    pub fn state(&self) -> RunStateManager {
        self.state.clone()
    }

    /// Runs a task to its terminal state and returns the final run state.
    /// Any failure in a step transitions to Failed with that failure's
    /// message; there is no retry of a failed step.
    pub async fn run(&mut self, instructions: String) -> RunState {
        self.state.start(instructions).await;

        loop {
            match self.step().await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Finished) => break,
                Ok(StepOutcome::Cancelled) => {
                    log::info!("run cancelled by host");
                    self.state.cancel().await;
                    break;
                }
                Err(e) => {
                    log::error!("agent loop failed: {}", e);
                    self.state.fail(e.to_string()).await;
                    break;
                }
            }
        }

        self.state.get_state().await
    }

    async fn step(&mut self) -> Result<StepOutcome, LoopError> {
        if self.state.history_len().await >= MAX_STEPS * 2 {
            return Err(LoopError::StepBudgetExceeded);
        }

        // Nothing is appended when the planner fails, including on a
        // missing credential
        let history = self.state.history().await;
        let assistant = self.planner.propose_next_step(&history).await?;
        self.state.push_message(assistant.clone()).await;

        let step = extract_action(&assistant);
        if !step.reasoning.is_empty() {
            log::info!("model reasoning: {}", step.reasoning);
        }

        match &step.action {
            NextAction::Error { message } => {
                return Err(LoopError::UnresolvedAction(message.clone()));
            }
            NextAction::Finish { success, error } => {
                if *success {
                    self.state.finish().await;
                } else {
                    // A reported-unsuccessful finish carries its reason in
                    // the run's error field
                    let reason = error
                        .clone()
                        .unwrap_or_else(|| "Run finished unsuccessfully".to_string());
                    self.state.fail(reason).await;
                }
                return Ok(StepOutcome::Finished);
            }
            _ => {}
        }

        // Checkpoint: the host may have requested a stop while the model
        // call was in flight
        if !self.state.is_running().await {
            return Ok(StepOutcome::Cancelled);
        }

        let geometry = self.probe.geometry()?;
        let host = &self.host;
        let dispatcher = &mut self.dispatcher;
        let action = &step.action;
        let performed =
            with_window_hidden(host, async move { dispatcher.perform(action, &geometry) }).await?;

        if let Performed::CursorPosition { x, y } = performed {
            log::info!("cursor position in model space: ({:.1}, {:.1})", x, y);
        }

        sleep(ITERATION_SETTLE).await;
        if !self.state.is_running().await {
            return Ok(StepOutcome::Cancelled);
        }

        let capturer = &self.capturer;
        let image = with_window_hidden(host, async move { capture_observation(capturer) }).await?;

        self.state
            .push_message(Message::tool_result(step.tool_id, OBSERVATION_NOTE, image))
            .await;

        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::RunStatus;
    use crate::input::{InputError, MouseButton, TypingCadence};
    use crate::llm::{ContentBlock, MessageContent, Role, ToolResultBlock};
    use crate::screen::FixedDisplayProbe;
    use async_trait::async_trait;
    use enigo::Key;
    use image::RgbaImage;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn assistant_tool_use(id: &str, name: &str, input: serde_json::Value) -> Message {
        Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }]),
        }
    }

    fn screenshot_step(id: &str) -> Message {
        assistant_tool_use(id, "computer", json!({"action": "screenshot"}))
    }

    /// Replays a fixed script; once exhausted it repeats the last entry,
    /// which models a planner that never finishes.
    struct ScriptedPlanner {
        script: Mutex<VecDeque<Message>>,
        last: Message,
        calls: AtomicUsize,
        stop_handle: Option<RunStateManager>,
    }

    impl ScriptedPlanner {
        fn new(script: Vec<Message>) -> Self {
            let last = script.last().cloned().expect("script must be non-empty");
            Self {
                script: Mutex::new(script.into()),
                last,
                calls: AtomicUsize::new(0),
                stop_handle: None,
            }
        }

        fn stopping(script: Vec<Message>, handle: RunStateManager) -> Self {
            let mut planner = Self::new(script);
            planner.stop_handle = Some(handle);
            planner
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StepPlanner for ScriptedPlanner {
        async fn propose_next_step(&self, _history: &[Message]) -> Result<Message, PlanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = &self.stop_handle {
                handle.request_stop();
            }
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.last.clone()))
        }
    }

    #[derive(Default)]
    struct CountingDriver {
        inputs: Arc<AtomicUsize>,
    }

    impl CountingDriver {
        fn bump(&self) -> Result<(), InputError> {
            self.inputs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl InputDriver for CountingDriver {
        fn set_position(&mut self, _x: i32, _y: i32) -> Result<(), InputError> {
            self.bump()
        }
        fn get_position(&mut self) -> Result<(i32, i32), InputError> {
            Ok((0, 0))
        }
        fn click(&mut self, _button: MouseButton) -> Result<(), InputError> {
            self.bump()
        }
        fn double_click(&mut self, _button: MouseButton) -> Result<(), InputError> {
            self.bump()
        }
        fn drag(&mut self, _from: (i32, i32), _to: (i32, i32)) -> Result<(), InputError> {
            self.bump()
        }
        fn type_text(&mut self, _text: &str, _cadence: TypingCadence) -> Result<(), InputError> {
            self.bump()
        }
        fn press_chord(&mut self, _keys: &[Key]) -> Result<(), InputError> {
            self.bump()
        }
    }

    struct TinyFrameCapturer;

    impl Capturer for TinyFrameCapturer {
        fn frame(&self) -> Result<RgbaImage, CaptureError> {
            Ok(RgbaImage::new(64, 40))
        }
    }

    struct NullHost;

    #[async_trait]
    impl WindowHost for NullHost {
        async fn hide(&self) {}
        async fn show(&self) {}
    }

    fn agent(
        planner: ScriptedPlanner,
    ) -> (
        AgentLoop<ScriptedPlanner, CountingDriver, TinyFrameCapturer, NullHost, FixedDisplayProbe>,
        Arc<AtomicUsize>,
    ) {
        let driver = CountingDriver::default();
        let inputs = Arc::clone(&driver.inputs);
        let agent = AgentLoop::new(
            RunStateManager::new(),
            planner,
            driver,
            TinyFrameCapturer,
            NullHost,
            FixedDisplayProbe(1920, 1080),
        );
        (agent, inputs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_budget_enforced() {
        // A planner that never finishes must be cut off after exactly
        // MAX_STEPS round-trips
        let (mut agent, _) = agent(ScriptedPlanner::new(vec![screenshot_step("toolu_1")]));
        let state = agent.run("loop forever".to_string()).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("Maximum steps exceeded"));
        assert_eq!(agent.planner.calls(), MAX_STEPS);
        assert_eq!(state.run_history.len(), 1 + 2 * MAX_STEPS);
    }

    #[tokio::test]
    async fn test_finish_success_transitions_to_finished() {
        let finish = assistant_tool_use("toolu_f", "finish_run", json!({"success": true}));
        let (mut agent, inputs) = agent(ScriptedPlanner::new(vec![finish]));
        let state = agent.run("do the thing".to_string()).await;

        assert_eq!(state.status, RunStatus::Finished);
        assert_eq!(state.error, None);
        assert_eq!(inputs.load(Ordering::SeqCst), 0);
        // Instructions plus one assistant message, no tool result
        assert_eq!(state.run_history.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_failure_carries_error_field() {
        let finish = assistant_tool_use(
            "toolu_f",
            "finish_run",
            json!({"success": false, "error": "X"}),
        );
        let (mut agent, _) = agent(ScriptedPlanner::new(vec![finish]));
        let state = agent.run("do the thing".to_string()).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_unresolved_action_fails_with_model_message() {
        let text_only = Message {
            role: Role::Assistant,
            content: MessageContent::Text("I cannot see the screen.".to_string()),
        };
        let (mut agent, inputs) = agent(ScriptedPlanner::new(vec![text_only]));
        let state = agent.run("task".to_string()).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("I cannot see the screen."));
        assert_eq!(inputs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_skips_queued_action() {
        // The stop request arrives while the model call is in flight: the
        // returned click must never be dispatched and nothing further is
        // appended to history
        let state_manager = RunStateManager::new();
        let click = assistant_tool_use(
            "toolu_1",
            "computer",
            json!({"action": "left_click", "coordinate": [100, 150]}),
        );
        let planner = ScriptedPlanner::stopping(vec![click], state_manager.clone());

        let driver = CountingDriver::default();
        let inputs = Arc::clone(&driver.inputs);
        let mut agent = AgentLoop::new(
            state_manager,
            planner,
            driver,
            TinyFrameCapturer,
            NullHost,
            FixedDisplayProbe(1920, 1080),
        );
        let state = agent.run("task".to_string()).await;

        assert_eq!(state.status, RunStatus::Idle);
        assert_eq!(inputs.load(Ordering::SeqCst), 0);
        // Instructions plus the in-flight assistant response only
        assert_eq!(state.run_history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_result_pairs_with_action_id() {
        let script = vec![
            screenshot_step("toolu_9"),
            assistant_tool_use("toolu_f", "finish_run", json!({"success": true})),
        ];
        let (mut agent, _) = agent(ScriptedPlanner::new(script));
        let state = agent.run("task".to_string()).await;

        assert_eq!(state.status, RunStatus::Finished);
        assert_eq!(state.run_history.len(), 4);

        match &state.run_history[2].content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => {
                    assert_eq!(tool_use_id, "toolu_9");
                    assert!(matches!(
                        &content[0],
                        ToolResultBlock::Text { text } if text == OBSERVATION_NOTE
                    ));
                    assert!(matches!(&content[1], ToolResultBlock::Image { .. }));
                }
                other => panic!("expected tool_result, got {:?}", other),
            },
            other => panic!("expected blocks, got {:?}", other),
        }
    }
}
