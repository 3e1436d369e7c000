//! Anthropic Messages API wire types shared by the client and the
//! conversation history. Serializable in both directions: requests carry
//! the full history back to the provider, responses come in as ordered
//! content blocks.

use serde::{Deserialize, Serialize};

pub const PNG_MEDIA_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

/// Assistant/user content is either a bare string or a block list; the
/// API accepts both shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultBlock>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64_png(data: String) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: PNG_MEDIA_TYPE.to_string(),
            data,
        }
    }
}

impl Message {
    /// Plain user text message, e.g. the initial task instructions.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying the tool result for an executed action: a
    /// fixed note plus the post-action screenshot, paired to the
    /// originating tool_use id.
    pub fn tool_result(tool_use_id: impl Into<String>, note: &str, image_base64: String) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: vec![
                    ToolResultBlock::Text {
                        text: note.to_string(),
                    },
                    ToolResultBlock::Image {
                        source: ImageSource::base64_png(image_base64),
                    },
                ],
            }]),
        }
    }
}
