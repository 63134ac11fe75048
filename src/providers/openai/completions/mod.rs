//! OpenAI Chat Completions (`/v1/chat/completions`)

mod decode;
mod processor;
pub mod types;

pub use decode::decode_response;
pub use processor::OpenAIChunkProcessor;
