use crate::llm::{ContentBlock, LlmError, Message, MessageContent, ToolResultBlock};
use crate::screen::ScreenError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
}

/// Seam between the loop and the remote model: takes the full conversation
/// history, returns the next assistant message. Implementations own any
/// request shaping (trimming, tool schemas, credentials).
#[async_trait]
pub trait StepPlanner: Send + Sync {
    async fn propose_next_step(&self, history: &[Message]) -> Result<Message, PlanError>;
}

/// Drops image payloads from the tool results of every message except the
/// newest. Text and block structure stay intact, so tool pairing survives
/// while request size stays bounded as the run grows.
pub fn strip_stale_images(history: &[Message]) -> Vec<Message> {
    let last = history.len().saturating_sub(1);

    history
        .iter()
        .enumerate()
        .map(|(index, message)| {
            if index == last {
                return message.clone();
            }
            let MessageContent::Blocks(blocks) = &message.content else {
                return message.clone();
            };

            let stripped = blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => ContentBlock::ToolResult {
                        tool_use_id: tool_use_id.clone(),
                        content: content
                            .iter()
                            .filter(|item| !matches!(item, ToolResultBlock::Image { .. }))
                            .cloned()
                            .collect(),
                    },
                    other => other.clone(),
                })
                .collect();

            Message {
                role: message.role,
                content: MessageContent::Blocks(stripped),
            }
        })
        .collect()
}
