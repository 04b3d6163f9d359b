//! Model-family data processing: rendered parts to session inputs, and raw
//! decoded text back to an assistant message.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::error::ConversationError;
use super::io_types::{ContentPart, Message, ASSISTANT_ROLE};
use crate::engine::InputData;
use crate::tool_use::try_parse_tool_calls;

/// Per-model processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProcessorConfig {
    /// Text inserted ahead of every image blob.
    pub image_placeholder: String,
    /// Text inserted ahead of every audio blob.
    pub audio_placeholder: String,
    /// Opens a tool-call block in model output.
    pub tool_code_start: String,
    /// Closes a tool-call block.
    pub tool_code_end: String,
}

impl Default for DataProcessorConfig {
    fn default() -> Self {
        Self {
            image_placeholder: "<start_of_image>".to_string(),
            audio_placeholder: "<start_of_audio>".to_string(),
            tool_code_start: "```tool_code\n".to_string(),
            tool_code_end: "\n```".to_string(),
        }
    }
}

/// Per-call overrides supplied with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataProcessorArguments {
    /// Keep output as plain text even when tools are declared.
    pub disable_tool_calls: bool,
    /// Lower the output token limit for this call.
    pub max_output_tokens: Option<usize>,
}

pub trait ModelDataProcessor: Send + Sync {
    /// Encode rendered parts into session inputs, merging adjacent text.
    fn to_input_data(
        &self,
        parts: &[ContentPart],
        args: &DataProcessorArguments,
    ) -> Result<Vec<InputData>, ConversationError>;

    /// Build the assistant message for a completed decode.
    fn to_message(&self, output: &str, args: &DataProcessorArguments) -> Message;
}

/// Processor for models that take text with inline media placeholders.
#[derive(Debug, Clone)]
pub struct GenericDataProcessor {
    config: DataProcessorConfig,
    tools_declared: bool,
}

impl GenericDataProcessor {
    pub fn new(config: DataProcessorConfig, tools_declared: bool) -> Self {
        Self { config, tools_declared }
    }

    /// Split `output` around a tool-call block. Returns the text before the
    /// block and the block body.
    fn split_tool_block<'a>(&self, output: &'a str) -> Option<(&'a str, &'a str)> {
        let start = output.find(&self.config.tool_code_start)?;
        let body_start = start + self.config.tool_code_start.len();
        let rest = &output[body_start..];
        let body = match rest.find(&self.config.tool_code_end) {
            Some(end) => &rest[..end],
            None => rest,
        };
        Some((&output[..start], body))
    }
}

impl ModelDataProcessor for GenericDataProcessor {
    fn to_input_data(
        &self,
        parts: &[ContentPart],
        _args: &DataProcessorArguments,
    ) -> Result<Vec<InputData>, ConversationError> {
        let mut inputs = Vec::new();
        let mut pending = String::new();
        for part in parts {
            let (placeholder, media) = match part {
                ContentPart::Text { text } => {
                    pending.push_str(text);
                    continue;
                }
                ContentPart::Image { blob } => {
                    (&self.config.image_placeholder, InputData::Image(blob.clone()))
                }
                ContentPart::Audio { blob } => {
                    (&self.config.audio_placeholder, InputData::Audio(blob.clone()))
                }
            };
            if blob_is_empty(&media) {
                return Err(ConversationError::InvalidMessage(
                    "media part has an empty blob".into(),
                ));
            }
            pending.push_str(placeholder);
            inputs.push(InputData::Text(std::mem::take(&mut pending)));
            inputs.push(media);
        }
        if !pending.is_empty() {
            inputs.push(InputData::Text(pending));
        }
        Ok(inputs)
    }

    fn to_message(&self, output: &str, args: &DataProcessorArguments) -> Message {
        if !self.tools_declared || args.disable_tool_calls {
            return Message::assistant_text(output);
        }
        let Some((lead, body)) = self.split_tool_block(output) else {
            return Message::assistant_text(output);
        };
        let Some(calls) = try_parse_tool_calls(body) else {
            debug!("tool block did not parse cleanly, keeping plain text");
            return Message::assistant_text(output);
        };
        let content: Vec<Value> = if lead.trim().is_empty() {
            Vec::new()
        } else {
            vec![json!({ "type": "text", "text": lead.trim_end() })]
        };
        Message::Json(json!({
            "role": ASSISTANT_ROLE,
            "content": content,
            "tool_calls": calls.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
        }))
    }
}

fn blob_is_empty(input: &InputData) -> bool {
    matches!(input, InputData::Image(b) | InputData::Audio(b) if b.is_empty())
}
