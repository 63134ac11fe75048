pub mod message;
pub mod stream;

pub use message::{ContentBlock, MessageResponse, Usage};
pub use stream::{DeltaEvent, MessageDeltaEvent, StreamError, StreamEvent};
