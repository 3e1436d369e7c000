pub mod anthropic;
pub mod messages;

pub use anthropic::AnthropicPlanner;
pub use messages::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API key not found. Please set your Anthropic API key.")]
    MissingCredential,
}
