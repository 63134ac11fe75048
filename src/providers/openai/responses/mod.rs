//! OpenAI Responses API (`/v1/responses`)

mod decode;
mod processor;
pub mod types;

pub use decode::decode_response;
pub use processor::ResponsesChunkProcessor;
