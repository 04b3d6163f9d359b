//! Scripted engine for conversation tests.
//!
//! The session decodes a fixed reply token by token: each step builds a
//! logits row peaked at the next reply token and runs it through a real
//! `TopPSampler`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use gg_converse::conversation::{
    ContentPart, ConversationError, DataProcessorArguments, DataProcessorConfig,
    GenericDataProcessor, Message, ModelDataProcessor, PromptTemplate, Tool,
};
use gg_converse::engine::{
    BenchmarkInfo, Constraint, DecodeConfig, DecodeOutcome, Engine, EngineCapabilities,
    EngineError, FinishReason, InputData, Modality, Session, SessionConfig, TurnThroughput,
};
use gg_converse::sampling::{Sampler, SamplingError, TopPSampler};
use gg_converse::tensor::{ElementType, HostTensor};

const PEAK_LOGIT: f32 = 100.0;
const EOS: &str = "<eos>";

/// What one decode call saw.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRecord {
    pub max_output_tokens: Option<usize>,
    pub constrained: bool,
}

/// Shared view into everything the sessions were asked to do.
#[derive(Debug, Default)]
pub struct Journal {
    pub prefills: Vec<Vec<InputData>>,
    pub decodes: Vec<DecodeRecord>,
}

#[derive(Clone)]
pub struct FakeEngine {
    pub caps: EngineCapabilities,
    pub template: Option<PromptTemplate>,
    pub reply: Vec<String>,
    pub token_delay: Duration,
    pub prefill_delay: Duration,
    pub fail_prefill: bool,
    pub fail_decode_after: Option<usize>,
    pub constrain_tools: bool,
    pub tagged_replies: bool,
    pub journal: Arc<Mutex<Journal>>,
}

impl FakeEngine {
    /// Engine that answers every turn with `reply`, one token per element.
    pub fn new(reply: &[&str]) -> Self {
        Self {
            caps: EngineCapabilities {
                modalities: vec![Modality::Text, Modality::Image],
                max_num_tokens: 4096,
            },
            template: Some(PromptTemplate::gemma()),
            reply: reply.iter().map(|t| t.to_string()).collect(),
            token_delay: Duration::ZERO,
            prefill_delay: Duration::ZERO,
            fail_prefill: false,
            fail_decode_after: None,
            constrain_tools: false,
            tagged_replies: false,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub fn with_prefill_delay(mut self, delay: Duration) -> Self {
        self.prefill_delay = delay;
        self
    }

    /// Use [`TaggingProcessor`] instead of the default processor.
    pub fn with_tagged_replies(mut self) -> Self {
        self.tagged_replies = true;
        self
    }

    pub fn failing_prefill(mut self) -> Self {
        self.fail_prefill = true;
        self
    }

    pub fn failing_decode_after(mut self, tokens: usize) -> Self {
        self.fail_decode_after = Some(tokens);
        self
    }

    pub fn constraining_tools(mut self) -> Self {
        self.constrain_tools = true;
        self
    }

    pub fn without_template(mut self) -> Self {
        self.template = None;
        self
    }
}

/// Marks every reply so tests can tell which processor built it.
pub struct TaggingProcessor {
    inner: GenericDataProcessor,
}

pub const REPLY_TAG: &str = "[fake-model] ";

impl ModelDataProcessor for TaggingProcessor {
    fn to_input_data(
        &self,
        parts: &[ContentPart],
        args: &DataProcessorArguments,
    ) -> Result<Vec<InputData>, ConversationError> {
        self.inner.to_input_data(parts, args)
    }

    fn to_message(&self, output: &str, _args: &DataProcessorArguments) -> Message {
        Message::assistant_text(&format!("{REPLY_TAG}{output}"))
    }
}

/// Complete once a tool block has been closed.
struct ToolBlockConstraint;

impl Constraint for ToolBlockConstraint {
    fn is_complete(&self, output: &str) -> bool {
        output.contains("```tool_code") && output.trim_end().ends_with(")]\n```")
    }
}

impl Engine for FakeEngine {
    fn capabilities(&self) -> &EngineCapabilities {
        &self.caps
    }

    fn prompt_template(&self) -> Option<PromptTemplate> {
        self.template.clone()
    }

    fn create_session(&self, config: &SessionConfig) -> Result<Box<dyn Session>, EngineError> {
        let sampler = config.sampler.build(1)?;
        let mut vocab = self.reply.clone();
        vocab.push(EOS.to_string());
        Ok(Box::new(FakeSession {
            sampler,
            vocab,
            default_max: config.max_output_tokens,
            token_delay: self.token_delay,
            prefill_delay: self.prefill_delay,
            fail_prefill: self.fail_prefill,
            fail_decode_after: self.fail_decode_after,
            journal: Arc::clone(&self.journal),
            prefill_turns: Vec::new(),
            decode_turns: Vec::new(),
        }))
    }

    fn create_constraint(
        &self,
        tools: &[Tool],
    ) -> Result<Option<Arc<dyn Constraint>>, EngineError> {
        if self.constrain_tools && !tools.is_empty() {
            Ok(Some(Arc::new(ToolBlockConstraint)))
        } else {
            Ok(None)
        }
    }

    fn create_data_processor(
        &self,
        config: &DataProcessorConfig,
        tools_declared: bool,
    ) -> Result<Box<dyn ModelDataProcessor>, EngineError> {
        let inner = GenericDataProcessor::new(config.clone(), tools_declared);
        if self.tagged_replies {
            Ok(Box::new(TaggingProcessor { inner }))
        } else {
            Ok(Box::new(inner))
        }
    }
}

pub struct FakeSession {
    sampler: TopPSampler,
    vocab: Vec<String>,
    default_max: usize,
    token_delay: Duration,
    prefill_delay: Duration,
    fail_prefill: bool,
    fail_decode_after: Option<usize>,
    journal: Arc<Mutex<Journal>>,
    prefill_turns: Vec<TurnThroughput>,
    decode_turns: Vec<TurnThroughput>,
}

impl FakeSession {
    fn next_token(&mut self, step: usize) -> Result<usize, EngineError> {
        let eos = self.vocab.len() - 1;
        let mut row = vec![0.0_f32; self.vocab.len()];
        row[step.min(eos)] = PEAK_LOGIT;
        let logits = HostTensor::from_f32(row, vec![1, self.vocab.len()])
            .map_err(SamplingError::from)?;
        let mut ids = HostTensor::zeros(ElementType::I32, vec![1]);
        self.sampler.sample_to_id_and_score_buffer(&logits, &mut ids, None)?;
        let id = ids.as_i32().and_then(|s| s.first().copied()).unwrap_or(eos as i32);
        Ok(id as usize)
    }

    fn finish(&mut self, tokens: usize, finish_reason: FinishReason) -> DecodeOutcome {
        self.decode_turns
            .push(TurnThroughput::new(tokens, Duration::from_millis(tokens as u64 * 10)));
        DecodeOutcome { tokens_generated: tokens, finish_reason }
    }
}

impl Session for FakeSession {
    fn run_prefill(&mut self, inputs: &[InputData]) -> Result<(), EngineError> {
        if self.fail_prefill {
            return Err(EngineError::ModelError("prefill rejected".into()));
        }
        if !self.prefill_delay.is_zero() {
            std::thread::sleep(self.prefill_delay);
        }
        let chars: usize = inputs
            .iter()
            .map(|input| match input {
                InputData::Text(text) => text.len(),
                InputData::Image(_) | InputData::Audio(_) => 256,
            })
            .sum();
        let tokens = chars.div_ceil(4).max(1);
        self.prefill_turns
            .push(TurnThroughput::new(tokens, Duration::from_millis(tokens as u64)));
        self.journal.lock().prefills.push(inputs.to_vec());
        Ok(())
    }

    fn run_decode(
        &mut self,
        config: &DecodeConfig,
        on_text: &mut dyn FnMut(&str),
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<DecodeOutcome, EngineError> {
        self.journal.lock().decodes.push(DecodeRecord {
            max_output_tokens: config.max_output_tokens,
            constrained: config.constraint.is_some(),
        });
        let max = config.max_output_tokens.unwrap_or(self.default_max);
        let eos = self.vocab.len() - 1;
        let mut output = String::new();
        let mut generated = 0;
        loop {
            if is_cancelled() {
                return Ok(self.finish(generated, FinishReason::Cancelled));
            }
            if generated >= max {
                return Ok(self.finish(generated, FinishReason::MaxTokens));
            }
            if let Some(limit) = self.fail_decode_after {
                if generated >= limit {
                    return Err(EngineError::ContextExceeded { max: limit, got: limit + 1 });
                }
            }
            let id = self.next_token(generated)?;
            if id == eos {
                return Ok(self.finish(generated, FinishReason::Stop));
            }
            let piece = self.vocab[id].clone();
            on_text(&piece);
            output.push_str(&piece);
            generated += 1;
            if let Some(constraint) = &config.constraint {
                if constraint.is_complete(&output) {
                    return Ok(self.finish(generated, FinishReason::ConstraintComplete));
                }
            }
            if !self.token_delay.is_zero() {
                std::thread::sleep(self.token_delay);
            }
        }
    }

    fn benchmark_info(&mut self) -> Result<BenchmarkInfo, EngineError> {
        Ok(BenchmarkInfo {
            time_to_first_token: self
                .decode_turns
                .first()
                .map(|_| Duration::from_millis(10)),
            prefill_turns: self.prefill_turns.clone(),
            decode_turns: self.decode_turns.clone(),
        })
    }
}
