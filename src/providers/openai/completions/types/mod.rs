pub mod chat_completion_chunk;
pub mod chat_completion_object;
pub mod message;
pub mod shared;

pub use chat_completion_chunk::{ChatCompletionChunk, FunctionCallChunk, MessageChunk, ToolCallChunk};
pub use chat_completion_object::ChatCompletionObject;
pub use message::{CallType, FunctionCall, Message, ToolCall};
pub use shared::Usage;
