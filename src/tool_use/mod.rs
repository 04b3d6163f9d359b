//! Structured tool-call validation.
//!
//! Model output is only treated as a tool invocation when a recognizer
//! parses it without a single reported irregularity; anything else falls
//! back to plain text.

mod parser_common;
mod python_call;

pub use parser_common::{strip_quotes, DefaultErrorListener, ErrorListener};
pub use python_call::{parse_tool_calls, try_parse_tool_calls, ToolCall};
