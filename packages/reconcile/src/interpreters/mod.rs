//! Interpretation backends and call pacing.

pub mod completion;
pub mod rate_limited;

pub use completion::{parse_adjudication, parse_reply, reply_schema, CompletionInterpreter};
pub use rate_limited::CallPacer;
