//! Message protocol: typed, renderer-agnostic conversation turns.

mod conversation;
mod message;
mod payload;

pub use conversation::Conversation;
pub use message::{Message, Role};
pub use payload::{CompletionData, Payload, PromptKind, StoreSearchResult};
