//! Contracts of the generation primitive.
//!
//! The engine (weights, backend, forward pass) lives outside this crate. A
//! conversation only needs to open a session, prefill turns into it, drive
//! its decode loop and read its benchmark counters.

pub mod benchmark;
pub mod config;
pub mod error;
pub mod output;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use benchmark::{BenchmarkInfo, TurnThroughput};
pub use config::SessionConfig;
pub use error::EngineError;
pub use output::{DecodeConfig, DecodeOutcome, FinishReason};

use crate::conversation::{
    DataProcessorConfig, GenericDataProcessor, ModelDataProcessor, PromptTemplate, Tool,
};

/// Input modality a model can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

/// What an engine can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCapabilities {
    pub modalities: Vec<Modality>,
    /// Maximum sequence length (prompt plus output) in tokens.
    pub max_num_tokens: usize,
}

impl EngineCapabilities {
    pub fn supports(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }
}

/// One processed input segment, ready for prefill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputData {
    Text(String),
    /// Opaque image blob reference.
    Image(String),
    /// Opaque audio blob reference.
    Audio(String),
}

impl InputData {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Image(_) => Modality::Image,
            Self::Audio(_) => Modality::Audio,
        }
    }
}

/// Decode-time restriction on permissible output.
pub trait Constraint: Send + Sync {
    /// Whether `output` already satisfies the constraint, so decoding may stop.
    fn is_complete(&self, output: &str) -> bool;
}

/// A loaded model able to open generation sessions.
pub trait Engine: Send + Sync {
    fn capabilities(&self) -> &EngineCapabilities;

    /// Session configuration used when the caller supplies none.
    fn default_session_config(&self) -> SessionConfig {
        SessionConfig::default()
    }

    /// Prompt template from the model metadata, if it ships one.
    fn prompt_template(&self) -> Option<PromptTemplate>;

    /// Open a fresh session with its own running context.
    fn create_session(&self, config: &SessionConfig) -> Result<Box<dyn Session>, EngineError>;

    /// Build a decode constraint for the declared tools. `None` means
    /// unconstrained decoding.
    fn create_constraint(
        &self,
        tools: &[Tool],
    ) -> Result<Option<Arc<dyn Constraint>>, EngineError> {
        let _ = tools;
        Ok(None)
    }

    /// Build the processor that turns rendered turns into session inputs and
    /// decoded text into messages. Model families with their own input
    /// encoding or output syntax override this.
    fn create_data_processor(
        &self,
        config: &DataProcessorConfig,
        tools_declared: bool,
    ) -> Result<Box<dyn ModelDataProcessor>, EngineError> {
        Ok(Box::new(GenericDataProcessor::new(config.clone(), tools_declared)))
    }
}

/// A single-context generation session.
///
/// Not safe for interleaved use: at most one prefill or decode may run at a
/// time, which the owner guarantees by taking `&mut self`.
pub trait Session: Send {
    /// Extend the context with `inputs` without producing output.
    fn run_prefill(&mut self, inputs: &[InputData]) -> Result<(), EngineError>;

    /// Decode until a stop condition, reporting each text delta to
    /// `on_text`. `is_cancelled` is polled once per token; when it returns
    /// true the loop stops with [`FinishReason::Cancelled`].
    fn run_decode(
        &mut self,
        config: &DecodeConfig,
        on_text: &mut dyn FnMut(&str),
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<DecodeOutcome, EngineError>;

    /// Aggregate and return the session's timing counters.
    fn benchmark_info(&mut self) -> Result<BenchmarkInfo, EngineError>;
}
