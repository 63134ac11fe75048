pub mod completions;
pub mod responses;

pub use completions::OpenAIChunkProcessor;
pub use responses::ResponsesChunkProcessor;
