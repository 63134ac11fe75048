//! Google GenAI (`generateContent` / `streamGenerateContent`)

mod decode;
mod processor;
pub mod types;

pub use decode::decode_response;
pub use processor::GoogleChunkProcessor;
