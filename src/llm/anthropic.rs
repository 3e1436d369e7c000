use super::messages::{ContentBlock, Message, MessageContent, Role};
use super::LlmError;
use crate::agent::planner::{strip_stale_images, PlanError, StepPlanner};
use crate::screen::{DisplayProbe, ScreenGeometry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const COMPUTER_USE_BETA: &str = "computer-use-2025-01-24";
const MAX_TOKENS: u32 = 1024;

pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

const SYSTEM_PROMPT: &str = "You are controlling a computer. The user will ask you to perform \
a task and you should use their computer to do so. After each step, take a screenshot and \
carefully evaluate if you have achieved the right outcome. Explicitly show your thinking: \
\"I have evaluated step X...\" If not correct, try again. Only when you confirm a step was \
executed correctly should you move on to the next one.\n\n\
CRITICAL: For ALL click actions (left_click, right_click, double_click), you MUST specify \
the exact coordinate [x, y] where to click. Look at the screenshot, identify the exact pixel \
location of the element you want to click, and include that coordinate in your action. Never \
click without coordinates.\n\n\
You should always call a tool! Always return a tool call. Remember to call the finish_run \
tool when you have achieved the goal of the task.";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    tools: Vec<serde_json::Value>,
    messages: &'a [Message],
}

/// One content block of a provider response. The provider may ship block
/// types this client has no use for (e.g. `thinking`); those land in the
/// catch-all arm instead of failing the whole response.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseBlock {
    Known(ContentBlock),
    Unknown(serde_json::Value),
}

#[derive(Deserialize)]
struct MessagesResponse {
    role: Role,
    content: Vec<ResponseBlock>,
}

fn collect_known_blocks(blocks: Vec<ResponseBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Known(block) => Some(block),
            ResponseBlock::Unknown(value) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown");
                log::warn!("skipping unsupported content block: {}", kind);
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// The closed action schema advertised to the model: the computer-use tool
/// with model-space display dimensions, plus `finish_run` for signalling
/// terminal success or failure.
fn build_tools(geometry: &ScreenGeometry) -> Vec<serde_json::Value> {
    vec![
        json!({
            "type": "computer_20250124",
            "name": "computer",
            "display_width_px": geometry.model_width,
            "display_height_px": geometry.model_height,
            "display_number": 1,
        }),
        json!({
            "name": "finish_run",
            "description": "Call this function when you have achieved the goal of the task.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "success": {
                        "type": "boolean",
                        "description": "Whether the task was successful",
                    },
                    "error": {
                        "type": "string",
                        "description": "The error message if the task was not successful",
                    },
                },
                "required": ["success"],
            },
        }),
    ]
}

/// Planner backed by the Anthropic Messages API. Display geometry is
/// probed fresh on every call so the advertised tool dimensions track the
/// live screen.
pub struct AnthropicPlanner<P: DisplayProbe> {
    client: Client,
    api_key: Option<String>,
    model: String,
    probe: P,
}

impl<P: DisplayProbe> AnthropicPlanner<P> {
    pub fn new(api_key: Option<String>, model: String, probe: P) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            probe,
        }
    }

    async fn create_message(
        &self,
        api_key: &str,
        geometry: &ScreenGeometry,
        messages: &[Message],
    ) -> Result<Message, LlmError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            tools: build_tools(geometry),
            messages,
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", COMPUTER_USE_BETA)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            // Prefer the provider's message field when the body parses
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(LlmError::ApiError(message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        Ok(Message {
            role: parsed.role,
            content: MessageContent::Blocks(collect_known_blocks(parsed.content)),
        })
    }
}

#[async_trait]
impl<P: DisplayProbe> StepPlanner for AnthropicPlanner<P> {
    async fn propose_next_step(&self, history: &[Message]) -> Result<Message, PlanError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingCredential)?;

        let geometry = self.probe.geometry()?;
        let trimmed = strip_stale_images(history);

        let message = self.create_message(api_key, &geometry, &trimmed).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::FixedDisplayProbe;

    #[tokio::test]
    async fn test_missing_api_key_is_reported_before_any_request() {
        let planner =
            AnthropicPlanner::new(None, DEFAULT_MODEL.to_string(), FixedDisplayProbe(1920, 1080));
        let err = planner
            .propose_next_step(&[Message::user_text("task")])
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Llm(LlmError::MissingCredential)));
    }

    #[test]
    fn test_tools_advertise_model_space_dimensions() {
        let geometry = ScreenGeometry::from_real(1920, 1080);
        let tools = build_tools(&geometry);
        assert_eq!(tools[0]["name"], "computer");
        assert_eq!(tools[0]["display_width_px"], 1280);
        assert_eq!(tools[0]["display_height_px"], 720);
        assert_eq!(tools[1]["name"], "finish_run");
        assert_eq!(tools[1]["input_schema"]["required"][0], "success");
    }

    #[test]
    fn test_unknown_response_blocks_are_skipped_not_fatal() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "let me look", "signature": "sig"},
                    {"type": "text", "text": "Clicking the button."},
                    {"type": "tool_use", "id": "toolu_1", "name": "computer",
                     "input": {"action": "screenshot"}}
                ]
            }"#,
        )
        .unwrap();

        let blocks = collect_known_blocks(parsed.content);
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Clicking the button."));
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "computer"));
    }
}
