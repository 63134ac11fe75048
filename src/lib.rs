pub mod cli;
pub mod core;
pub mod eventsource;
pub mod providers;

pub use crate::core::{
    accumulate, accumulate_stream, normalize, normalize_stream, Accumulated, Config,
    MessageAccumulator, Provider, StreamError,
};
pub use crate::providers::{
    AssistantMessage, Chunk, ChunkProcessor, ContentPart, Decoded, FinishReason,
    ProcessorOptions, ReasoningMode, Usage,
};
