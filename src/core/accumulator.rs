use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::error::StreamError;
use crate::providers::{AssistantMessage, Chunk, ContentPart, FinishReason, Usage};

/// Everything a chunk sequence adds up to
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Accumulated {
    pub message: AssistantMessage,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
    #[serde(skip)]
    pub raw_events: Vec<Value>,
}

impl Accumulated {
    /// A stream that never signalled completion counts as `Unknown`
    pub fn finish_reason_or_unknown(&self) -> FinishReason {
        self.finish_reason.unwrap_or(FinishReason::Unknown)
    }
}

#[derive(Debug)]
enum SimpleRun {
    Text(String),
    Reasoning(String),
}

#[derive(Debug)]
struct OpenToolCall {
    index: usize,
    id: String,
    name: String,
    args: String,
}

/// Builds the final message from a chunk sequence in a single pass.
///
/// Parts are appended in the order their End chunk arrives. Raw events and
/// usage are collected on the side and never touch the content.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    simple: Option<SimpleRun>,
    tools: Vec<OpenToolCall>,
    done: Accumulated,
}

fn malformed(message: impl Into<String>) -> StreamError {
    StreamError::Accumulate(message.into())
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Chunk) -> Result<(), StreamError> {
        if chunk.is_content() && self.done.finish_reason.is_some() {
            return Err(malformed("content chunk after the finish reason"));
        }

        match chunk {
            Chunk::RawEvent { event } => self.done.raw_events.push(event),
            Chunk::UsageDelta { usage } => self.done.usage.add(&usage),
            Chunk::RawMessage { message } => self.done.message.raw_message = Some(message),
            Chunk::FinishReason { reason } => {
                if self.done.finish_reason.is_some() {
                    return Err(malformed("second finish reason"));
                }
                self.done.finish_reason = Some(reason);
            }
            Chunk::TextStart => self.open_simple(SimpleRun::Text(String::new()))?,
            Chunk::ReasoningStart => self.open_simple(SimpleRun::Reasoning(String::new()))?,
            Chunk::TextDelta { delta } => match &mut self.simple {
                Some(SimpleRun::Text(text)) => text.push_str(&delta),
                _ => return Err(malformed("text delta outside a text run")),
            },
            Chunk::ReasoningDelta { delta } => match &mut self.simple {
                Some(SimpleRun::Reasoning(text)) => text.push_str(&delta),
                _ => return Err(malformed("reasoning delta outside a reasoning run")),
            },
            Chunk::TextEnd => match self.simple.take() {
                Some(SimpleRun::Text(text)) => self.done.message.content.push(ContentPart::Text { text }),
                other => {
                    self.simple = other;
                    return Err(malformed("text end without an open text run"));
                }
            },
            Chunk::ReasoningEnd => match self.simple.take() {
                Some(SimpleRun::Reasoning(text)) => {
                    self.done.message.content.push(ContentPart::Reasoning { text });
                }
                other => {
                    self.simple = other;
                    return Err(malformed("reasoning end without an open reasoning run"));
                }
            },
            Chunk::ToolCallStart { index, id, name } => {
                if self.tools.iter().any(|tool| tool.index == index) {
                    return Err(malformed(format!("tool call #{index} started twice")));
                }
                self.tools.push(OpenToolCall {
                    index,
                    id,
                    name,
                    args: String::new(),
                });
            }
            Chunk::ToolCallDelta { index, id, delta } => {
                let position = self.open_tool(index, &id)?;
                self.tools[position].args.push_str(&delta);
            }
            Chunk::ToolCallEnd { index, id } => {
                let position = self.open_tool(index, &id)?;
                let OpenToolCall { id, name, args, .. } = self.tools.remove(position);
                self.done
                    .message
                    .content
                    .push(ContentPart::ToolCall { id, name, args });
            }
        }
        Ok(())
    }

    /// Position of the open tool call at `index`, which must carry the same id
    fn open_tool(&self, index: usize, id: &str) -> Result<usize, StreamError> {
        let Some(position) = self.tools.iter().position(|tool| tool.index == index) else {
            return Err(malformed(format!("tool call #{index} ({id:?}) is not open")));
        };
        let opened = &self.tools[position].id;
        if opened != id {
            return Err(malformed(format!(
                "tool call #{index} opened as {opened:?} but continued as {id:?}"
            )));
        }
        Ok(position)
    }

    fn open_simple(&mut self, run: SimpleRun) -> Result<(), StreamError> {
        if self.simple.is_some() {
            return Err(malformed("text or reasoning run started while another is open"));
        }
        self.simple = Some(run);
        Ok(())
    }

    /// Fails if any channel was left open.
    pub fn finish(self) -> Result<Accumulated, StreamError> {
        if self.simple.is_some() || !self.tools.is_empty() {
            return Err(malformed("chunk sequence ended with an open channel"));
        }
        Ok(self.done)
    }
}

/// Consumes a chunk sequence eagerly, stopping at the first error
pub fn accumulate<I>(chunks: I) -> Result<Accumulated, StreamError>
where
    I: IntoIterator<Item = Result<Chunk, StreamError>>,
{
    let mut accumulator = MessageAccumulator::new();
    for chunk in chunks {
        accumulator.push(chunk?)?;
    }
    accumulator.finish()
}

pub async fn accumulate_stream<S>(mut chunks: S) -> Result<Accumulated, StreamError>
where
    S: Stream<Item = Result<Chunk, StreamError>> + Unpin,
{
    let mut accumulator = MessageAccumulator::new();
    while let Some(chunk) = chunks.next().await {
        accumulator.push(chunk?)?;
    }
    accumulator.finish()
}
