//! Multi-turn conversation on top of a single generation session.
//!
//! A [`Conversation`] renders each message through its [`PromptTemplate`],
//! encodes it with a [`ModelDataProcessor`], prefills it into the session and
//! drives the decode loop. History is append-only and guarded by one lock
//! that is never held across a generation.

#[allow(clippy::module_inception)]
mod conversation;
mod config;
mod data_processor;
mod error;
mod io_types;
mod prompt_template;
mod stream;

pub use config::ConversationConfig;
pub use conversation::{Conversation, ConversationState};
pub use data_processor::{
    DataProcessorArguments, DataProcessorConfig, GenericDataProcessor, ModelDataProcessor,
};
pub use error::ConversationError;
pub use io_types::{ContentPart, Message, Preface, Tool, Turn, ASSISTANT_ROLE, USER_ROLE};
pub use prompt_template::{PromptTemplate, RoleMarkers};
pub use stream::{MessageStream, StreamEvent};
