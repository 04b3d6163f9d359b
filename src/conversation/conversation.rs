//! Stateful multi-turn orchestration over a single generation session.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use super::config::ConversationConfig;
use super::data_processor::{DataProcessorArguments, ModelDataProcessor};
use super::error::ConversationError;
use super::io_types::{ContentPart, Message};
use super::stream::MessageStream;
use crate::engine::{BenchmarkInfo, Constraint, DecodeConfig, Engine, InputData, Session};
use crate::telemetry::{self, SpanExt, TurnSpan};

/// Where the single in-flight generation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    /// Prefilling turn `turn` (1-based) of `of`.
    Prefilling { turn: usize, of: usize },
    Decoding,
}

struct SessionSlot {
    session: Box<dyn Session>,
    preface_prefilled: bool,
}

struct Inner {
    id: String,
    config: ConversationConfig,
    session: Mutex<SessionSlot>,
    processor: Box<dyn ModelDataProcessor>,
    constraint: Option<Arc<dyn Constraint>>,
    preface_inputs: Vec<InputData>,
    history: Mutex<Vec<Message>>,
    state: Mutex<ConversationState>,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Session inputs for one send, rendered on the calling thread.
struct PreparedTurns {
    /// One entry per turn; the last one triggers decoding.
    turns: Vec<Vec<InputData>>,
    /// History entries matching `turns`.
    messages: Vec<Message>,
    args: DataProcessorArguments,
}

/// Lives outside the session call so partial results survive a failure.
#[derive(Default)]
struct Progress {
    turns_prefilled: usize,
    tokens: usize,
    text: String,
}

/// Holds the conversation out of `Idle` for the duration of one generation.
struct TurnGuard {
    inner: Arc<Inner>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        // Token first, so a send admitted right after Idle keeps its own token.
        self.inner.cancel.lock().take();
        *self.inner.state.lock() = ConversationState::Idle;
    }
}

/// A multi-turn chat over one generation session.
///
/// At most one generation is in flight at a time; a send issued while
/// another is running fails with [`ConversationError::Busy`].
pub struct Conversation {
    inner: Arc<Inner>,
}

impl Conversation {
    /// Open a session on `engine` and build the decode constraint for the
    /// preface's tools.
    pub fn create(engine: &dyn Engine, config: ConversationConfig) -> Result<Self, ConversationError> {
        config
            .session_config()
            .validate_for(engine.capabilities())
            .map_err(|e| ConversationError::InvalidConfig(e.to_string()))?;

        let processor = engine
            .create_data_processor(config.processor_config(), config.preface().has_tools())?;
        let preface_inputs = match config.prompt_template().render_preface(config.preface())? {
            Some(text) => processor
                .to_input_data(&[ContentPart::Text { text }], &DataProcessorArguments::default())?,
            None => Vec::new(),
        };
        let constraint = if config.preface().has_tools() {
            engine.create_constraint(&config.preface().tools)?
        } else {
            None
        };
        let session = engine.create_session(config.session_config())?;

        let id = Uuid::new_v4().to_string();
        info!(
            conversation_id = %id,
            tools = config.preface().tools.len(),
            constrained = constraint.is_some(),
            "conversation created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                session: Mutex::new(SessionSlot {
                    session,
                    preface_prefilled: preface_inputs.is_empty(),
                }),
                processor,
                constraint,
                preface_inputs,
                history: Mutex::new(Vec::new()),
                state: Mutex::new(ConversationState::Idle),
                cancel: Mutex::new(None),
                config,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConversationState {
        *self.inner.state.lock()
    }

    /// Generate a reply, blocking until it is complete.
    ///
    /// On failure nothing is appended to history.
    pub fn send_message(
        &self,
        message: Message,
        args: Option<DataProcessorArguments>,
    ) -> Result<Message, ConversationError> {
        let prepared = self.prepare(message, args)?;
        let _guard = self.begin(prepared.turns.len())?;

        let span = TurnSpan::new(&self.inner.id, "sync");
        let _enter = span.enter();
        let started = Instant::now();
        let mut progress = Progress::default();

        let result = self
            .inner
            .generate(&prepared, &mut progress, &mut |_: &str| {}, &|| false);
        if let Ok(reply) = &result {
            let mut history = self.inner.history.lock();
            history.extend(prepared.messages);
            history.push(reply.clone());
        }
        self.inner.finish_turn(&span, &result, progress.tokens, started);
        result
    }

    /// Start generating on a background thread and return immediately.
    ///
    /// `callback` receives each text delta as an assistant chunk, then exactly
    /// one terminal call: `Ok(Message::empty())` on completion,
    /// `Err(ConversationError::Cancelled)` after [`cancel_process`](Self::cancel_process),
    /// or the failure. Calls are never concurrent. Input that fails to render
    /// is rejected here and the callback is never invoked.
    pub fn send_message_async<F>(
        &self,
        message: Message,
        callback: F,
        args: Option<DataProcessorArguments>,
    ) -> Result<(), ConversationError>
    where
        F: FnMut(Result<Message, ConversationError>) + Send + 'static,
    {
        let prepared = self.prepare(message, args)?;
        let guard = self.begin(prepared.turns.len())?;
        let token = CancellationToken::new();
        *self.inner.cancel.lock() = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        spawn_generation(move || inner.run_async(prepared, guard, token, callback))
    }

    /// [`send_message_async`](Self::send_message_async) delivered as a stream.
    pub fn send_message_stream(
        &self,
        message: Message,
        args: Option<DataProcessorArguments>,
    ) -> Result<MessageStream, ConversationError> {
        let (sender, stream) = MessageStream::channel();
        self.send_message_async(message, move |result| sender.send(result), args)?;
        Ok(stream)
    }

    /// Copy of the history.
    pub fn get_history(&self) -> Vec<Message> {
        self.inner.history.lock().clone()
    }

    /// Run `visitor` over the history with the lock held.
    ///
    /// The visitor must not call back into this conversation.
    pub fn access_history<R>(&self, visitor: impl FnOnce(&[Message]) -> R) -> R {
        let history = self.inner.history.lock();
        visitor(&history)
    }

    /// Pull timing counters from the session. Fails with `Busy` while a
    /// generation holds the session.
    pub fn get_benchmark_info(&self) -> Result<BenchmarkInfo, ConversationError> {
        let mut slot = self
            .inner
            .session
            .try_lock()
            .ok_or(ConversationError::Busy)?;
        Ok(slot.session.benchmark_info()?)
    }

    /// Ask the in-flight async generation to stop decoding. Prefilled turns
    /// stay in the model context. No-op when nothing is running, including
    /// after a generation has decided its outcome but before its terminal
    /// callback has fired.
    pub fn cancel_process(&self) {
        if let Some(token) = self.inner.cancel.lock().as_ref() {
            info!(conversation_id = %self.inner.id, "cancellation requested");
            token.cancel();
        }
    }

    fn prepare(
        &self,
        message: Message,
        args: Option<DataProcessorArguments>,
    ) -> Result<PreparedTurns, ConversationError> {
        let args = args.unwrap_or_default();
        if args.max_output_tokens == Some(0) {
            return Err(ConversationError::InvalidMessage(
                "max_output_tokens must be > 0".into(),
            ));
        }
        // Unrecognized parts are dropped here, before anything reaches history.
        let message = match message {
            Message::Json(value) => Message::from_json(value)?,
            text => text,
        };
        let turns = message.to_turns()?;
        if turns.is_empty() {
            return Err(ConversationError::InvalidMessage("message sequence is empty".into()));
        }

        let template = self.inner.config.prompt_template();
        let enabled = &self.inner.config.session_config().modalities;
        let last = turns.len() - 1;
        let mut inputs = Vec::with_capacity(turns.len());
        for (i, turn) in turns.iter().enumerate() {
            let parts = template.render_turn(turn, i == last);
            let data = self.inner.processor.to_input_data(&parts, &args)?;
            if let Some(input) = data.iter().find(|d| !enabled.contains(&d.modality())) {
                return Err(ConversationError::InvalidMessage(format!(
                    "{:?} input is not enabled for this conversation",
                    input.modality()
                )));
            }
            inputs.push(data);
        }

        Ok(PreparedTurns {
            turns: inputs,
            messages: message.into_elements(),
            args,
        })
    }

    fn begin(&self, of: usize) -> Result<TurnGuard, ConversationError> {
        let mut state = self.inner.state.lock();
        if *state != ConversationState::Idle {
            return Err(ConversationError::Busy);
        }
        *state = ConversationState::Prefilling { turn: 1, of };
        Ok(TurnGuard { inner: Arc::clone(&self.inner) })
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        self.cancel_process();
    }
}

impl Inner {
    fn set_state(&self, state: ConversationState) {
        *self.state.lock() = state;
    }

    fn generate(
        &self,
        prepared: &PreparedTurns,
        progress: &mut Progress,
        on_text: &mut dyn FnMut(&str),
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<Message, ConversationError> {
        let mut slot = self.session.lock();
        if !slot.preface_prefilled {
            slot.session.run_prefill(&self.preface_inputs)?;
            slot.preface_prefilled = true;
        }

        let of = prepared.turns.len();
        for (i, inputs) in prepared.turns.iter().enumerate() {
            self.set_state(ConversationState::Prefilling { turn: i + 1, of });
            debug!(conversation_id = %self.id, turn = i + 1, of, "prefill");
            slot.session.run_prefill(inputs)?;
            progress.turns_prefilled += 1;
        }
        telemetry::record_prefill_turns(of);

        self.set_state(ConversationState::Decoding);
        let session_limit = self.config.session_config().max_output_tokens;
        let decode_config = DecodeConfig {
            max_output_tokens: Some(
                prepared
                    .args
                    .max_output_tokens
                    .map_or(session_limit, |limit| limit.min(session_limit)),
            ),
            constraint: if prepared.args.disable_tool_calls {
                None
            } else {
                self.constraint.clone()
            },
        };
        let outcome = {
            let text = &mut progress.text;
            let mut sink = |delta: &str| {
                text.push_str(delta);
                on_text(delta);
            };
            slot.session.run_decode(&decode_config, &mut sink, is_cancelled)?
        };
        drop(slot);

        progress.tokens = outcome.tokens_generated;
        debug!(
            conversation_id = %self.id,
            tokens = outcome.tokens_generated,
            finish_reason = ?outcome.finish_reason,
            "decode finished"
        );
        if outcome.was_cancelled() {
            return Err(ConversationError::Cancelled);
        }
        if outcome.tokens_generated == 0 || progress.text.is_empty() {
            return Err(ConversationError::EmptyOutput);
        }
        Ok(self.processor.to_message(&progress.text, &prepared.args))
    }

    fn run_async<F>(
        &self,
        prepared: PreparedTurns,
        guard: TurnGuard,
        token: CancellationToken,
        mut callback: F,
    ) where
        F: FnMut(Result<Message, ConversationError>),
    {
        let span = TurnSpan::new(&self.id, "async");
        let _enter = span.enter();
        let started = Instant::now();
        let mut progress = Progress::default();

        let result = self.generate(
            &prepared,
            &mut progress,
            &mut |delta: &str| callback(Ok(Message::assistant_text(delta))),
            &|| token.is_cancelled(),
        );
        // Retiring the token under the slot lock orders this check against
        // `cancel_process`: a cancel either lands before it and wins, or finds
        // no generation to stop.
        let cancelled = {
            let mut slot = self.cancel.lock();
            slot.take();
            token.is_cancelled()
        };
        let result = match result {
            Ok(_) if cancelled => Err(ConversationError::Cancelled),
            other => other,
        };

        {
            let mut history = self.history.lock();
            match &result {
                Ok(reply) => {
                    history.extend(prepared.messages);
                    history.push(reply.clone());
                }
                Err(_) => {
                    // Consumed turns and streamed text stay.
                    history.extend(prepared.messages.into_iter().take(progress.turns_prefilled));
                    if !progress.text.is_empty() {
                        history.push(Message::assistant_text(&progress.text));
                    }
                }
            }
        }
        self.finish_turn(&span, &result, progress.tokens, started);

        drop(guard);
        callback(result.map(|_| Message::empty()));
    }

    fn finish_turn(
        &self,
        span: &Span,
        result: &Result<Message, ConversationError>,
        tokens: usize,
        started: Instant,
    ) {
        let latency_ms = started.elapsed().as_millis() as u64;
        span.record_result(result);
        span.record("tokens_generated", tokens);
        span.record("latency_ms", latency_ms);
        match result {
            Ok(_) => {
                telemetry::record_turn_completed(tokens, latency_ms);
                info!(conversation_id = %self.id, tokens, latency_ms, "turn completed");
            }
            Err(ConversationError::Cancelled) => {
                telemetry::record_turn_cancelled();
                info!(conversation_id = %self.id, tokens, "turn cancelled");
            }
            Err(e) => {
                telemetry::record_turn_failed(e.reason());
                warn!(conversation_id = %self.id, error = %e, "turn failed");
            }
        }
    }
}

fn spawn_generation<F>(job: F) -> Result<(), ConversationError>
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
            Ok(())
        }
        Err(_) => std::thread::Builder::new()
            .name("gg-converse-generation".to_string())
            .spawn(job)
            .map(|_| ())
            .map_err(|e| ConversationError::Spawn(e.to_string())),
    }
}
