//! Local generation with `mlx_lm`, streamed as a flat token sequence

mod decode;
mod parser;
mod processor;
pub mod types;

pub use decode::decode_response;
pub use parser::{Segment, TagParser};
pub use processor::MlxChunkProcessor;
