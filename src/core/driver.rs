use async_stream::try_stream;
use futures::{Stream, StreamExt};
use log::debug;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::iter::FusedIterator;

use super::error::StreamError;
use crate::eventsource::Event;
use crate::providers::{Chunk, ChunkProcessor};

/// Payload some providers send as the last SSE event
const DONE_SENTINEL: &str = "[DONE]";

/// Lazily normalizes a sequence of native events.
///
/// Events are pulled one at a time; `flush` runs once the events are
/// exhausted. The iterator is fused after the first error.
pub struct NormalizedChunks<P: ChunkProcessor, I> {
    processor: P,
    events: I,
    pending: VecDeque<Chunk>,
    done: bool,
}

impl<P, I> NormalizedChunks<P, I>
where
    P: ChunkProcessor,
    I: Iterator<Item = Result<P::Event, StreamError>>,
{
    pub fn new(processor: P, events: I) -> Self {
        Self {
            processor,
            events,
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn fail(&mut self, err: StreamError) -> Option<Result<Chunk, StreamError>> {
        debug!("[{}] normalization stopped: {err}", self.processor.provider());
        self.done = true;
        self.pending.clear();
        Some(Err(err))
    }
}

impl<P, I> Iterator for NormalizedChunks<P, I>
where
    P: ChunkProcessor,
    I: Iterator<Item = Result<P::Event, StreamError>>,
{
    type Item = Result<Chunk, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(Ok(chunk));
            }
            if self.done {
                return None;
            }
            match self.events.next() {
                Some(Ok(event)) => match self.processor.process(event) {
                    Ok(chunks) => self.pending.extend(chunks),
                    Err(err) => return self.fail(err),
                },
                Some(Err(err)) => return self.fail(err),
                None => {
                    self.done = true;
                    match self.processor.flush() {
                        Ok(chunks) => self.pending.extend(chunks),
                        Err(err) => return self.fail(err),
                    }
                }
            }
        }
    }
}

impl<P, I> FusedIterator for NormalizedChunks<P, I>
where
    P: ChunkProcessor,
    I: Iterator<Item = Result<P::Event, StreamError>>,
{
}

pub fn normalize<P, I>(processor: P, events: I) -> NormalizedChunks<P, I::IntoIter>
where
    P: ChunkProcessor,
    I: IntoIterator<Item = Result<P::Event, StreamError>>,
{
    NormalizedChunks::new(processor, events.into_iter())
}

/// Async counterpart of [`normalize`]
pub fn normalize_stream<P, S>(
    mut processor: P,
    mut events: S,
) -> impl Stream<Item = Result<Chunk, StreamError>>
where
    P: ChunkProcessor,
    S: Stream<Item = Result<P::Event, StreamError>> + Unpin,
{
    try_stream! {
        while let Some(event) = events.next().await {
            for chunk in processor.process(event?)? {
                yield chunk;
            }
        }
        for chunk in processor.flush()? {
            yield chunk;
        }
    }
}

/// Decodes the JSON payload of one SSE event.
///
/// Returns `None` for the `[DONE]` sentinel and empty payloads.
pub fn decode_event<E: DeserializeOwned>(event: &Event) -> Option<Result<E, StreamError>> {
    let data = event.data.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }
    Some(serde_json::from_str(data).map_err(|e| {
        StreamError::Parse(format!(
            "{e} in {} event: {data}",
            event.event_type.as_deref().unwrap_or("message")
        ))
    }))
}

pub fn decode_events<E, I>(events: I) -> impl Iterator<Item = Result<E, StreamError>>
where
    E: DeserializeOwned,
    I: IntoIterator<Item = Result<Event, StreamError>>,
{
    events.into_iter().filter_map(|event| match event {
        Ok(event) => decode_event(&event),
        Err(err) => Some(Err(err)),
    })
}
