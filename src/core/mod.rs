pub mod accumulator;
mod config;
pub mod driver;
pub mod error;

pub use accumulator::{accumulate, accumulate_stream, Accumulated, MessageAccumulator};
pub use config::{Config, Provider, CONFIG_FILE, ENV_PREFIX};
pub use driver::{decode_event, decode_events, normalize, normalize_stream, NormalizedChunks};
pub use error::{Result, StreamError};
