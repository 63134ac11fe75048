use async_stream::try_stream;
use futures::{Stream, StreamExt};
use log::debug;
use std::pin::Pin;
use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use thiserror::Error;

use crate::core::StreamError;

const EVENT_DELIMITER: &str = "\n\n";
const FIELD_SEPARATOR: char = ':';

/// Possible errors that can occur while parsing SSE events
#[derive(Error, Debug)]
pub enum EventError {
    #[error("failed to parse retry value: {0}")]
    RetryParse(std::num::ParseIntError),
    #[error("invalid event format: event contains no data")]
    InvalidFormat,
}

impl From<std::num::ParseIntError> for EventError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::RetryParse(err)
    }
}

impl From<EventError> for StreamError {
    fn from(err: EventError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Represents a Server-Sent Event (SSE) with its associated fields.
///
/// Each event can contain:
/// - An optional ID
/// - An optional event type
/// - The event data (required)
/// - An optional retry timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Unique identifier for the event
    pub id: Option<String>,
    /// Type of the event (defaults to "message" when absent)
    pub event_type: Option<String>,
    /// The event payload
    pub data: String,
    /// Reconnection time in case of connection failure
    pub retry: Option<Duration>,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {{ id: {:?}, event_type: {:?}, data: {}, retry: {:?} }}",
            self.id, self.event_type, self.data, self.retry
        )
    }
}

impl Event {
    /// Creates a new empty Event.
    pub const fn new() -> Self {
        Self {
            id: None,
            event_type: None,
            data: String::new(),
            retry: None,
        }
    }

    /// Parses one SSE event block (the text between two blank lines).
    ///
    /// Comment lines and unknown fields are ignored. A block without any
    /// `data` line is [`EventError::InvalidFormat`].
    pub fn parse(input: &str) -> Result<Self, EventError> {
        let mut event = Self::new();
        let mut data_lines = Vec::new();

        for line in input.lines() {
            if line.is_empty() {
                continue;
            }

            if let Some((field, value)) = line.split_once(FIELD_SEPARATOR) {
                let value = value.strip_prefix(' ').unwrap_or(value);
                match field {
                    "id" => event.id = Some(value.to_string()),
                    "event" => event.event_type = Some(value.to_string()),
                    "data" => data_lines.push(value),
                    "retry" => {
                        let ms = value.parse::<u64>()?;
                        event.retry = Some(Duration::from_millis(ms));
                    }
                    _ => {} // Unknown fields and comment lines are ignored
                }
            }
        }

        if data_lines.is_empty() {
            return Err(EventError::InvalidFormat);
        }

        event.data = data_lines.join("\n");
        Ok(event)
    }
}

/// Incremental UTF-8 and line-ending normalization for SSE bytes
#[derive(Debug, Default)]
struct EventBuffer {
    bytes: Vec<u8>,
    text: String,
}

impl EventBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.bytes) {
                Ok(text) => {
                    self.text.push_str(text);
                    self.bytes.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(std::str::from_utf8(&self.bytes[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.bytes.drain(..valid + len);
                        }
                        // Truncated sequence, wait for the next chunk
                        None => {
                            self.bytes.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        self.normalize_line_endings();
    }

    fn normalize_line_endings(&mut self) {
        if !self.text.contains('\r') {
            return;
        }
        // A trailing CR may be the first half of a CRLF.
        let trailing_cr = self.text.ends_with('\r');
        if trailing_cr {
            self.text.pop();
        }
        self.text = self.text.replace("\r\n", "\n").replace('\r', "\n");
        if trailing_cr {
            self.text.push('\r');
        }
    }

    /// Removes the next complete event block
    fn next_block(&mut self) -> Option<String> {
        let end = self.text.find(EVENT_DELIMITER)?;
        let block = self.text[..end].to_string();
        self.text.drain(..end + EVENT_DELIMITER.len());
        Some(block)
    }

    /// Whatever is left once the input is exhausted
    fn remainder(&mut self) -> Option<String> {
        if !self.bytes.is_empty() {
            self.text.push(char::REPLACEMENT_CHARACTER);
            self.bytes.clear();
        }
        if self.text.ends_with('\r') {
            self.text.pop();
        }
        let rest = std::mem::take(&mut self.text);
        (!rest.trim().is_empty()).then_some(rest)
    }
}

/// Parses one block, skipping blocks that carry no data
fn parse_block(block: &str) -> Option<Result<Event, EventError>> {
    match Event::parse(block) {
        Ok(event) => Some(Ok(event)),
        Err(EventError::InvalidFormat) => {
            debug!("skipping SSE block without data: {block:?}");
            None
        }
        Err(err) => Some(Err(err)),
    }
}

/// Parses a complete SSE transcript, such as a captured response body
pub fn parse_transcript(input: &str) -> Result<Vec<Event>, EventError> {
    let mut buffer = EventBuffer::default();
    buffer.push(input.as_bytes());

    let mut events = Vec::new();
    while let Some(block) = buffer.next_block() {
        if let Some(event) = parse_block(&block) {
            events.push(event?);
        }
    }
    if let Some(rest) = buffer.remainder() {
        if let Some(event) = parse_block(&rest) {
            events.push(event?);
        }
    }
    Ok(events)
}

/// Extension trait for converting a byte stream into a Stream of SSE Events.
pub trait EventStreamExt {
    /// Converts the byte stream into a Stream of Events.
    ///
    /// # Returns
    ///
    /// Returns a pinned Stream that yields `Result<Event, StreamError>`
    fn events(self) -> Pin<Box<dyn Stream<Item = Result<Event, StreamError>> + Send>>;
}

impl<S, B, E> EventStreamExt for S
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    fn events(self) -> Pin<Box<dyn Stream<Item = Result<Event, StreamError>> + Send>> {
        let mut stream = self;
        Box::pin(try_stream! {
            let mut buffer = EventBuffer::default();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(Into::<StreamError>::into)?;
                buffer.push(chunk.as_ref());

                // Process complete events
                while let Some(block) = buffer.next_block() {
                    if let Some(event) = parse_block(&block) {
                        yield event?;
                    }
                }
            }

            // Process any remaining data in the buffer
            if let Some(rest) = buffer.remainder() {
                if let Some(event) = parse_block(&rest) {
                    yield event?;
                }
            }
        })
    }
}
