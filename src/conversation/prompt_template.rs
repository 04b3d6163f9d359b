//! Prompt template: role markers wrapped around turn content.
//!
//! Rendering keeps media parts in place and only adds text around them; the
//! data processor decides how media is encoded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ConversationError;
use super::io_types::{ContentPart, Preface, Turn};

/// Text emitted before and after a turn of one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMarkers {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl RoleMarkers {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), suffix: suffix.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Emitted once, ahead of the preface.
    #[serde(default)]
    pub bos: String,
    pub system: RoleMarkers,
    pub user: RoleMarkers,
    /// Markers for assistant turns. The prefix doubles as the generation prompt.
    pub model: RoleMarkers,
    /// Introduces the declared tool list inside the preface.
    #[serde(default = "default_tool_preamble")]
    pub tool_preamble: String,
}

fn default_tool_preamble() -> String {
    "You have access to the following tools:\n".to_string()
}

impl PromptTemplate {
    /// Turn markers used by Gemma-family models.
    pub fn gemma() -> Self {
        let user = RoleMarkers::new("<start_of_turn>user\n", "<end_of_turn>\n");
        Self {
            bos: "<bos>".to_string(),
            system: user.clone(),
            user,
            model: RoleMarkers::new("<start_of_turn>model\n", "<end_of_turn>\n"),
            tool_preamble: default_tool_preamble(),
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConversationError> {
        toml::from_str(source)
            .map_err(|e| ConversationError::InvalidConfig(format!("prompt template: {e}")))
    }

    fn markers(&self, role: &str) -> &RoleMarkers {
        match role {
            "system" | "developer" => &self.system,
            "assistant" | "model" => &self.model,
            _ => &self.user,
        }
    }

    /// Text that asks the model to start its turn.
    pub fn generation_prompt(&self) -> &str {
        &self.model.prefix
    }

    /// Render the start of the context: `bos` followed by the preface as a
    /// system turn. `None` when there is nothing to emit.
    pub fn render_preface(&self, preface: &Preface) -> Result<Option<String>, ConversationError> {
        let mut rendered = self.bos.clone();
        if !preface.is_empty() {
            rendered.push_str(&self.system.prefix);
            if let Some(instructions) = preface.instructions.as_deref().filter(|s| !s.is_empty()) {
                rendered.push_str(instructions);
                rendered.push('\n');
            }
            if preface.has_tools() {
                rendered.push_str(&self.tool_preamble);
                for tool in &preface.tools {
                    let line = serde_json::to_string(tool)
                        .map_err(|e| ConversationError::InvalidConfig(e.to_string()))?;
                    rendered.push_str(&line);
                    rendered.push('\n');
                }
            }
            if !preface.extra_context.is_empty() {
                let context = serde_json::to_string(&Value::Object(preface.extra_context.clone()))
                    .map_err(|e| ConversationError::InvalidConfig(e.to_string()))?;
                rendered.push_str(&context);
                rendered.push('\n');
            }
            rendered.push_str(&self.system.suffix);
        }
        Ok((!rendered.is_empty()).then_some(rendered))
    }

    /// Wrap a turn's parts in its role markers, appending the generation
    /// prompt when the turn triggers decoding.
    pub fn render_turn(&self, turn: &Turn, add_generation_prompt: bool) -> Vec<ContentPart> {
        let markers = self.markers(&turn.role);
        let mut parts = Vec::with_capacity(turn.parts.len() + 2);
        parts.push(ContentPart::Text { text: markers.prefix.clone() });
        parts.extend(turn.parts.iter().cloned());
        let mut tail = markers.suffix.clone();
        if add_generation_prompt {
            tail.push_str(self.generation_prompt());
        }
        parts.push(ContentPart::Text { text: tail });
        parts
    }
}
