//! Channel-backed stream over the async callback contract.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::error::ConversationError;
use super::io_types::Message;

/// One event of an in-flight generation.
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk(Message),
    Done,
    Cancelled,
    Failed(ConversationError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }

    pub(crate) fn from_callback(result: Result<Message, ConversationError>) -> Self {
        match result {
            Ok(message) if message.is_empty() => Self::Done,
            Ok(message) => Self::Chunk(message),
            Err(ConversationError::Cancelled) => Self::Cancelled,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Stream of [`StreamEvent`]s ending with exactly one terminal event.
pub struct MessageStream {
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
}

impl MessageStream {
    pub(crate) fn channel() -> (MessageStreamSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (MessageStreamSender { sender }, Self { receiver })
    }

    /// Receive the next event, `None` after the terminal one.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Blocking receive for callers outside an async context.
    pub fn blocking_recv(&mut self) -> Option<StreamEvent> {
        self.receiver.blocking_recv()
    }

    /// Drain the stream and return the concatenated assistant text.
    pub async fn collect_text(mut self) -> Result<String, ConversationError> {
        let mut text = String::new();
        while let Some(event) = self.recv().await {
            match event {
                StreamEvent::Chunk(message) => text.push_str(&message.text_content()),
                StreamEvent::Done => return Ok(text),
                StreamEvent::Cancelled => return Err(ConversationError::Cancelled),
                StreamEvent::Failed(e) => return Err(e),
            }
        }
        Err(ConversationError::Spawn(
            "generation ended without a terminal event".into(),
        ))
    }
}

impl Stream for MessageStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Sender half, driven from the generation callback.
pub(crate) struct MessageStreamSender {
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl MessageStreamSender {
    /// Forward a callback result. A dropped receiver is ignored.
    pub(crate) fn send(&self, result: Result<Message, ConversationError>) {
        let _ = self.sender.send(StreamEvent::from_callback(result));
    }
}
