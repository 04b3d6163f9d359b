//! GG-CONVERSE
//!
//! Control core of an on-device LLM runtime. Turns user messages into model
//! output one generation call at a time, on top of an external engine.
//!
//! # Components
//!
//! - **conversation**: thread-safe, cancellable multi-turn sessions with an
//!   append-only history
//! - **sampling**: top-k / top-p / temperature next-token selection with
//!   strict tensor-shape validation
//! - **tool_use**: non-throwing recognizer deciding whether output is a
//!   structured tool call
//! - **engine**: contracts the generation primitive must satisfy
//!
//! The engine itself (weights, forward pass, backend selection) and any
//! network surface live outside this crate.

pub mod config;
pub mod conversation;
pub mod engine;
pub mod sampling;
pub mod telemetry;
pub mod tensor;
pub mod tool_use;

pub use conversation::{
    Conversation, ConversationConfig, ConversationError, ConversationState, Message, Preface,
};
pub use engine::{Engine, EngineError, Session, SessionConfig};
pub use sampling::{Sampler, SamplerParams, SamplingError, TopPSampler};
