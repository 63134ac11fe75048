pub mod chunk;
pub mod message;

pub use chunk::{Chunk, FinishReason, Usage, UsageTracker};
pub use message::{AssistantMessage, ContentPart};
