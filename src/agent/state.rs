use crate::llm::Message;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Explicit loop state machine: `Idle -> Running -> {Finished, Failed}`,
/// with cancellation dropping back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    pub instructions: String,
    pub run_history: Vec<Message>,
    pub error: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            instructions: String::new(),
            run_history: Vec::new(),
            error: None,
        }
    }
}

impl RunState {
    pub fn running(&self) -> bool {
        self.status == RunStatus::Running
    }
}

/// Shared handle to the run's single mutable state. The loop and the host
/// both hold clones; all access goes through these accessors, and the stop
/// flag may flip between any two of the loop's own reads, which is why the
/// loop re-checks it at every checkpoint.
pub struct RunStateManager {
    state: Arc<RwLock<RunState>>,
    should_stop: Arc<AtomicBool>,
}

impl Clone for RunStateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            should_stop: Arc::clone(&self.should_stop),
        }
    }
}

impl Default for RunStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn get_state(&self) -> RunState {
        self.state.read().await.clone()
    }

    /// Transition into Running: seed history with a single user message
    /// carrying the instructions and clear any prior error.
    pub async fn start(&self, instructions: String) {
        self.should_stop.store(false, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state.status = RunStatus::Running;
        state.run_history = vec![Message::user_text(instructions.clone())];
        state.instructions = instructions;
        state.error = None;
    }

    pub async fn push_message(&self, message: Message) {
        let mut state = self.state.write().await;
        state.run_history.push(message);
    }

    pub async fn history(&self) -> Vec<Message> {
        self.state.read().await.run_history.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.state.read().await.run_history.len()
    }

    pub async fn fail(&self, error: String) {
        let mut state = self.state.write().await;
        state.status = RunStatus::Failed;
        state.error = Some(error);
    }

    pub async fn finish(&self) {
        let mut state = self.state.write().await;
        state.status = RunStatus::Finished;
    }

    /// Cancellation exit: no terminal verdict, the run just stops.
    pub async fn cancel(&self) {
        let mut state = self.state.write().await;
        state.status = RunStatus::Idle;
    }

    /// Cooperative cancellation: takes effect at the loop's next
    /// checkpoint, never mid-action.
    pub fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub async fn is_running(&self) -> bool {
        if self.should_stop.load(Ordering::SeqCst) {
            return false;
        }
        self.state.read().await.running()
    }
}
