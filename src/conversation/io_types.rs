//! Message data model and wire conversion.
//!
//! The wire shape is
//! `{"role": ..., "content": <string> | [{"type":"text","text":..} | {"type":"image","blob":..} | {"type":"audio","blob":..}]}`.
//! Content parts with any other shape are dropped on ingestion.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::ConversationError;

/// Role assumed for plain-text messages.
pub const USER_ROLE: &str = "user";
pub const ASSISTANT_ROLE: &str = "assistant";

/// A conversation message: either plain text or a structured JSON tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Json(Value),
}

impl Message {
    /// The completion marker delivered at the end of a successful async turn.
    pub fn empty() -> Self {
        Self::Json(Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Json(value) => value.is_null(),
        }
    }

    /// Structured assistant message carrying `text` as a single text part.
    pub fn assistant_text(text: &str) -> Self {
        Self::Json(json!({
            "role": ASSISTANT_ROLE,
            "content": [{ "type": "text", "text": text }],
        }))
    }

    /// Ingest a wire message (or an array of them), dropping unrecognized
    /// content parts.
    pub fn from_json(value: Value) -> Result<Self, ConversationError> {
        match value {
            Value::Array(items) => {
                let normalized = items
                    .into_iter()
                    .map(normalize_object)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Json(Value::Array(normalized)))
            }
            other => Ok(Self::Json(normalize_object(other)?)),
        }
    }

    /// Role of the message. Plain text is always a user message.
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Text(_) => Some(USER_ROLE),
            Self::Json(value) => value.get("role").and_then(Value::as_str),
        }
    }

    /// Concatenated text parts; media parts are skipped.
    pub fn text_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => match value.get("content") {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Array(parts)) => parts
                    .iter()
                    .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect(),
                _ => String::new(),
            },
        }
    }

    /// Split into the turns to submit, one per element for a message sequence.
    pub fn to_turns(&self) -> Result<Vec<Turn>, ConversationError> {
        match self {
            Self::Text(text) => Ok(vec![Turn {
                role: USER_ROLE.to_string(),
                parts: vec![ContentPart::Text { text: text.clone() }],
            }]),
            Self::Json(Value::Array(items)) => items.iter().map(Turn::from_value).collect(),
            Self::Json(value) => Ok(vec![Turn::from_value(value)?]),
        }
    }

    /// Split a message sequence into its elements; a single message yields itself.
    pub(crate) fn into_elements(self) -> Vec<Message> {
        match self {
            Self::Json(Value::Array(items)) => items.into_iter().map(Self::Json).collect(),
            other => vec![other],
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => json!({ "role": USER_ROLE, "content": text }),
            Message::Json(value) => value,
        }
    }
}

fn normalize_object(value: Value) -> Result<Value, ConversationError> {
    let Value::Object(mut object) = value else {
        return Err(ConversationError::InvalidMessage(
            "message must be a JSON object".into(),
        ));
    };
    match object.get("role") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ConversationError::InvalidMessage(
                "role must be a string".into(),
            ))
        }
        None => return Err(ConversationError::InvalidMessage("missing role".into())),
    }
    let content = match object.remove("content") {
        Some(Value::String(text)) => Value::String(text),
        Some(Value::Array(parts)) => Value::Array(
            parts
                .iter()
                .filter_map(ContentPart::from_value)
                .map(|part| part.to_value())
                .collect(),
        ),
        Some(_) | None => {
            return Err(ConversationError::InvalidMessage(
                "content must be a string or an array of parts".into(),
            ))
        }
    };
    object.insert("content".to_string(), content);
    Ok(Value::Object(object))
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image { blob: String },
    Audio { blob: String },
}

impl ContentPart {
    /// Recognized `type`/payload combinations only.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        match kind {
            "text" => Some(Self::Text { text: value.get("text")?.as_str()?.to_string() }),
            "image" => Some(Self::Image { blob: value.get("blob")?.as_str()?.to_string() }),
            "audio" => Some(Self::Audio { blob: value.get("blob")?.as_str()?.to_string() }),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Text { text } => json!({ "type": "text", "text": text }),
            Self::Image { blob } => json!({ "type": "image", "blob": blob }),
            Self::Audio { blob } => json!({ "type": "audio", "blob": blob }),
        }
    }
}

/// A single role-tagged turn ready for prompt rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: String,
    pub parts: Vec<ContentPart>,
}

impl Turn {
    fn from_value(value: &Value) -> Result<Self, ConversationError> {
        let role = value
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| ConversationError::InvalidMessage("missing role".into()))?;
        let parts = match value.get("content") {
            Some(Value::String(text)) => vec![ContentPart::Text { text: text.clone() }],
            Some(Value::Array(parts)) => parts.iter().filter_map(ContentPart::from_value).collect(),
            _ => {
                return Err(ConversationError::InvalidMessage(
                    "content must be a string or an array of parts".into(),
                ))
            }
        };
        Ok(Self { role: role.to_string(), parts })
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments.
    #[serde(default)]
    pub parameters: Value,
}

/// Static background for every turn of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preface {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub extra_context: Map<String, Value>,
}

impl Preface {
    pub fn is_empty(&self) -> bool {
        self.instructions.as_deref().map_or(true, str::is_empty)
            && self.tools.is_empty()
            && self.extra_context.is_empty()
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}
