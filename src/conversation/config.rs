//! Immutable configuration bundle for a [`Conversation`](super::Conversation).

use std::collections::HashSet;

use super::data_processor::DataProcessorConfig;
use super::error::ConversationError;
use super::io_types::Preface;
use super::prompt_template::PromptTemplate;
use crate::engine::{Engine, SessionConfig};

/// Configuration assembled once and validated against an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    session_config: SessionConfig,
    preface: Preface,
    prompt_template: PromptTemplate,
    processor_config: DataProcessorConfig,
}

impl ConversationConfig {
    /// Build from the engine's default session config.
    ///
    /// The prompt template comes from `template_override` or, failing that,
    /// from the model metadata.
    pub fn create_default(
        engine: &dyn Engine,
        preface: Preface,
        template_override: Option<PromptTemplate>,
        processor_override: Option<DataProcessorConfig>,
    ) -> Result<Self, ConversationError> {
        Self::build(
            engine,
            engine.default_session_config(),
            preface,
            template_override,
            processor_override,
        )
    }

    /// Build from a caller-provided session config, checked against the
    /// engine's capabilities.
    pub fn from_session_config(
        engine: &dyn Engine,
        session_config: SessionConfig,
        preface: Preface,
        processor_override: Option<DataProcessorConfig>,
    ) -> Result<Self, ConversationError> {
        Self::build(engine, session_config, preface, None, processor_override)
    }

    fn build(
        engine: &dyn Engine,
        session_config: SessionConfig,
        preface: Preface,
        template_override: Option<PromptTemplate>,
        processor_override: Option<DataProcessorConfig>,
    ) -> Result<Self, ConversationError> {
        session_config
            .validate_for(engine.capabilities())
            .map_err(|e| ConversationError::InvalidConfig(e.to_string()))?;
        validate_tools(&preface)?;

        let prompt_template = template_override
            .or_else(|| engine.prompt_template())
            .ok_or_else(|| {
                ConversationError::InvalidConfig(
                    "no prompt template in model metadata and no override given".into(),
                )
            })?;

        Ok(Self {
            session_config,
            preface,
            prompt_template,
            processor_config: processor_override.unwrap_or_default(),
        })
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn preface(&self) -> &Preface {
        &self.preface
    }

    pub fn prompt_template(&self) -> &PromptTemplate {
        &self.prompt_template
    }

    pub fn processor_config(&self) -> &DataProcessorConfig {
        &self.processor_config
    }
}

fn validate_tools(preface: &Preface) -> Result<(), ConversationError> {
    let mut seen = HashSet::new();
    for tool in &preface.tools {
        if tool.name.trim().is_empty() {
            return Err(ConversationError::InvalidConfig("tool name is empty".into()));
        }
        if !seen.insert(tool.name.as_str()) {
            return Err(ConversationError::InvalidConfig(format!(
                "tool '{}' declared twice",
                tool.name
            )));
        }
    }
    Ok(())
}
