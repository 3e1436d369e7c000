use crate::llm::{ContentBlock, Message, MessageContent};
use serde::{Deserialize, Serialize};

pub const COMPUTER_TOOL: &str = "computer";
pub const FINISH_RUN_TOOL: &str = "finish_run";

const NO_ACTION_MESSAGE: &str = "No action found in the model response";

/// Closed set of input primitives the loop can execute. Coordinates, when
/// present, are model-space values straight from the model; mapping to the
/// real display happens at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextAction {
    MouseMove {
        x: f64,
        y: f64,
    },
    LeftClickDrag {
        x: f64,
        y: f64,
    },
    CursorPosition,
    LeftClick {
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    RightClick {
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    MiddleClick {
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    DoubleClick {
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    Type {
        text: String,
    },
    Key {
        text: String,
    },
    Screenshot,
    Finish {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

/// One resolved assistant turn: the action to perform, the free-form
/// rationale that accompanied it, and the correlation id the eventual
/// tool_result must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStep {
    pub action: NextAction,
    pub reasoning: String,
    pub tool_id: String,
}

/// Wire shape of the computer tool's input: an action name plus optional
/// coordinate pair and text payload.
#[derive(Deserialize)]
struct ComputerInput {
    action: String,
    #[serde(default)]
    coordinate: Option<[f64; 2]>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct FinishInput {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Resolves the latest assistant message into a typed step. Free-form text
/// blocks concatenate into the reasoning; the first tool_use block is the
/// actionable one. Anything malformed becomes `NextAction::Error` so the
/// loop fails cleanly instead of panicking on model output.
pub fn extract_action(message: &Message) -> ParsedStep {
    let blocks = match &message.content {
        MessageContent::Blocks(blocks) => blocks.as_slice(),
        MessageContent::Text(text) => {
            // A bare text response carries no tool call at all
            return ParsedStep {
                action: NextAction::Error {
                    message: text.clone(),
                },
                reasoning: text.clone(),
                tool_id: String::new(),
            };
        }
    };

    let reasoning = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ");

    let tool_use = blocks.iter().find_map(|block| match block {
        ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
        _ => None,
    });

    let (action, tool_id) = match tool_use {
        Some((id, name, input)) => (decode_tool_use(name, input), id.clone()),
        None => {
            let message = if reasoning.is_empty() {
                NO_ACTION_MESSAGE.to_string()
            } else {
                reasoning.clone()
            };
            (NextAction::Error { message }, String::new())
        }
    };

    ParsedStep {
        action,
        reasoning,
        tool_id,
    }
}

fn decode_tool_use(name: &str, input: &serde_json::Value) -> NextAction {
    match name {
        COMPUTER_TOOL => decode_computer_input(input),
        FINISH_RUN_TOOL => match serde_json::from_value::<FinishInput>(input.clone()) {
            Ok(finish) => NextAction::Finish {
                success: finish.success,
                error: finish.error,
            },
            Err(e) => NextAction::Error {
                message: format!("Malformed finish_run input: {}", e),
            },
        },
        other => NextAction::Error {
            message: format!("Unsupported tool: {}", other),
        },
    }
}

fn decode_computer_input(input: &serde_json::Value) -> NextAction {
    let parsed: ComputerInput = match serde_json::from_value(input.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            return NextAction::Error {
                message: format!("Malformed computer tool input: {}", e),
            }
        }
    };

    let xy = parsed.coordinate.map(|[x, y]| (x, y));

    match parsed.action.as_str() {
        "mouse_move" => match xy {
            Some((x, y)) => NextAction::MouseMove { x, y },
            None => missing_coordinate("mouse_move"),
        },
        "left_click_drag" => match xy {
            Some((x, y)) => NextAction::LeftClickDrag { x, y },
            None => missing_coordinate("left_click_drag"),
        },
        "cursor_position" => NextAction::CursorPosition,
        "left_click" => NextAction::LeftClick {
            x: xy.map(|p| p.0),
            y: xy.map(|p| p.1),
        },
        "right_click" => NextAction::RightClick {
            x: xy.map(|p| p.0),
            y: xy.map(|p| p.1),
        },
        "middle_click" => NextAction::MiddleClick {
            x: xy.map(|p| p.0),
            y: xy.map(|p| p.1),
        },
        "double_click" => NextAction::DoubleClick {
            x: xy.map(|p| p.0),
            y: xy.map(|p| p.1),
        },
        "type" => match parsed.text {
            Some(text) => NextAction::Type { text },
            None => missing_text("type"),
        },
        "key" => match parsed.text {
            Some(text) => NextAction::Key { text },
            None => missing_text("key"),
        },
        "screenshot" => NextAction::Screenshot,
        other => NextAction::Error {
            message: format!("Unsupported action: {}", other),
        },
    }
}

fn missing_coordinate(action: &str) -> NextAction {
    NextAction::Error {
        message: format!("Action {} requires a coordinate", action),
    }
}

fn missing_text(action: &str) -> NextAction {
    NextAction::Error {
        message: format!("Action {} requires text", action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use serde_json::json;

    fn assistant(blocks: Vec<ContentBlock>) -> Message {
        Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    fn computer_use(id: &str, input: serde_json::Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: COMPUTER_TOOL.to_string(),
            input,
        }
    }

    #[test]
    fn test_click_with_coordinate() {
        let msg = assistant(vec![
            ContentBlock::Text {
                text: "I'll click the OK button.".to_string(),
            },
            computer_use(
                "toolu_1",
                json!({"action": "left_click", "coordinate": [100, 150]}),
            ),
        ]);
        let step = extract_action(&msg);
        assert_eq!(
            step.action,
            NextAction::LeftClick {
                x: Some(100.0),
                y: Some(150.0)
            }
        );
        assert_eq!(step.reasoning, "I'll click the OK button.");
        assert_eq!(step.tool_id, "toolu_1");
    }

    #[test]
    fn test_click_without_coordinate() {
        let msg = assistant(vec![computer_use("toolu_1", json!({"action": "right_click"}))]);
        assert_eq!(
            extract_action(&msg).action,
            NextAction::RightClick { x: None, y: None }
        );
    }

    #[test]
    fn test_type_and_key() {
        let msg = assistant(vec![computer_use(
            "toolu_1",
            json!({"action": "type", "text": "hello"}),
        )]);
        assert_eq!(
            extract_action(&msg).action,
            NextAction::Type {
                text: "hello".to_string()
            }
        );

        let msg = assistant(vec![computer_use(
            "toolu_2",
            json!({"action": "key", "text": "ctrl+s"}),
        )]);
        assert_eq!(
            extract_action(&msg).action,
            NextAction::Key {
                text: "ctrl+s".to_string()
            }
        );
    }

    #[test]
    fn test_reasoning_concatenates_text_blocks() {
        let msg = assistant(vec![
            ContentBlock::Text {
                text: "First.".to_string(),
            },
            ContentBlock::Text {
                text: "Second.".to_string(),
            },
            computer_use("toolu_1", json!({"action": "screenshot"})),
        ]);
        let step = extract_action(&msg);
        assert_eq!(step.reasoning, "First. Second.");
        assert_eq!(step.action, NextAction::Screenshot);
    }

    #[test]
    fn test_finish_run_success() {
        let msg = assistant(vec![ContentBlock::ToolUse {
            id: "toolu_f".to_string(),
            name: FINISH_RUN_TOOL.to_string(),
            input: json!({"success": true}),
        }]);
        let step = extract_action(&msg);
        assert_eq!(
            step.action,
            NextAction::Finish {
                success: true,
                error: None
            }
        );
        assert_eq!(step.tool_id, "toolu_f");
    }

    #[test]
    fn test_finish_run_failure_carries_error() {
        let msg = assistant(vec![ContentBlock::ToolUse {
            id: "toolu_f".to_string(),
            name: FINISH_RUN_TOOL.to_string(),
            input: json!({"success": false, "error": "X"}),
        }]);
        assert_eq!(
            extract_action(&msg).action,
            NextAction::Finish {
                success: false,
                error: Some("X".to_string())
            }
        );
    }

    #[test]
    fn test_no_actionable_block_uses_model_text() {
        let msg = assistant(vec![ContentBlock::Text {
            text: "I cannot see the screen.".to_string(),
        }]);
        let step = extract_action(&msg);
        assert_eq!(
            step.action,
            NextAction::Error {
                message: "I cannot see the screen.".to_string()
            }
        );
        assert!(step.tool_id.is_empty());
    }

    #[test]
    fn test_no_actionable_block_default_message() {
        let msg = assistant(vec![]);
        assert_eq!(
            extract_action(&msg).action,
            NextAction::Error {
                message: NO_ACTION_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_unknown_action_name_is_error_not_panic() {
        let msg = assistant(vec![computer_use("toolu_1", json!({"action": "teleport"}))]);
        match extract_action(&msg).action {
            NextAction::Error { message } => assert!(message.contains("teleport")),
            other => panic!("expected error action, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tool_name_is_error() {
        let msg = assistant(vec![ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: "bash".to_string(),
            input: json!({}),
        }]);
        match extract_action(&msg).action {
            NextAction::Error { message } => assert!(message.contains("bash")),
            other => panic!("expected error action, got {:?}", other),
        }
    }

    #[test]
    fn test_mouse_move_without_coordinate_is_error() {
        let msg = assistant(vec![computer_use("toolu_1", json!({"action": "mouse_move"}))]);
        match extract_action(&msg).action {
            NextAction::Error { message } => assert!(message.contains("mouse_move")),
            other => panic!("expected error action, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_message_is_error() {
        let msg = Message {
            role: Role::Assistant,
            content: MessageContent::Text("just words".to_string()),
        };
        assert_eq!(
            extract_action(&msg).action,
            NextAction::Error {
                message: "just words".to_string()
            }
        );
    }
}
