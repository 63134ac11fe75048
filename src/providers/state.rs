use std::fmt;

use log::debug;

use super::types::{Chunk, ContentPart, FinishReason, Usage};
use super::ReasoningMode;
use crate::core::{Provider, StreamError};

/// Key of one tool-call channel: a provider-assigned index or a stable id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolSlot {
    Index(u32),
    Id(String),
}

impl fmt::Display for ToolSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Id(id) => write!(f, "{id:?}"),
        }
    }
}

#[derive(Debug)]
struct OpenToolCall {
    slot: ToolSlot,
    index: usize,
    id: String,
    name: String,
    args: String,
}

#[derive(Debug)]
enum OpenChannel {
    Text(String),
    Reasoning(String),
    Tool(OpenToolCall),
}

/// Per-stream record of which channels are open.
///
/// Every content chunk a processor emits goes through this record, which
/// rejects transitions that break channel balance instead of guessing.
#[derive(Debug)]
pub struct ChannelState {
    provider: Provider,
    reasoning: ReasoningMode,
    /// Open channels in the order they were opened
    open: Vec<OpenChannel>,
    parts: Vec<ContentPart>,
    visible_tool_calls: usize,
    raw_message_sent: bool,
    finished: bool,
}

impl ChannelState {
    pub const fn new(provider: Provider, reasoning: ReasoningMode) -> Self {
        Self {
            provider,
            reasoning,
            open: Vec::new(),
            parts: Vec::new(),
            visible_tool_calls: 0,
            raw_message_sent: false,
            finished: false,
        }
    }

    fn violation(&self, message: impl Into<String>) -> StreamError {
        StreamError::violation(self.provider, message)
    }

    fn guard(&self) -> Result<(), StreamError> {
        if self.finished {
            return Err(self.violation("content after the finish reason"));
        }
        Ok(())
    }

    pub fn is_text_open(&self) -> bool {
        self.open.iter().any(|c| matches!(c, OpenChannel::Text(_)))
    }

    pub fn is_reasoning_open(&self) -> bool {
        self.open.iter().any(|c| matches!(c, OpenChannel::Reasoning(_)))
    }

    pub fn is_tool_open(&self, slot: &ToolSlot) -> bool {
        self.open
            .iter()
            .any(|c| matches!(c, OpenChannel::Tool(call) if &call.slot == slot))
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of tool calls reported to the caller as tool calls
    pub const fn visible_tool_calls(&self) -> usize {
        self.visible_tool_calls
    }

    /// Parts whose End has been emitted, in completion order
    pub fn finished_parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn start_text(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        self.guard()?;
        if self.is_text_open() {
            return Err(self.violation("text started while a text run is open"));
        }
        if self.is_reasoning_open() {
            self.end_reasoning(out)?;
        }
        out.push(Chunk::TextStart);
        self.open.push(OpenChannel::Text(String::new()));
        Ok(())
    }

    /// Starts a text run unless one is already open
    pub fn ensure_text(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.is_text_open() {
            return self.guard();
        }
        self.start_text(out)
    }

    pub fn text_delta(&mut self, out: &mut Vec<Chunk>, delta: &str) -> Result<(), StreamError> {
        self.guard()?;
        let Some(buffer) = self.open.iter_mut().find_map(|c| match c {
            OpenChannel::Text(buffer) => Some(buffer),
            _ => None,
        }) else {
            return Err(self.violation("text delta with no open text run"));
        };
        if delta.is_empty() {
            return Ok(());
        }
        buffer.push_str(delta);
        out.push(Chunk::text(delta));
        Ok(())
    }

    pub fn end_text(&mut self, out: &mut Vec<Chunk>) -> Result<ContentPart, StreamError> {
        self.guard()?;
        let Some(position) = self
            .open
            .iter()
            .position(|c| matches!(c, OpenChannel::Text(_)))
        else {
            return Err(self.violation("text end with no open text run"));
        };
        let channel = self.open.remove(position);
        Ok(self.close_channel(out, channel))
    }

    pub fn start_reasoning(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        self.guard()?;
        if self.is_reasoning_open() {
            return Err(self.violation("reasoning started while a reasoning run is open"));
        }
        if self.is_text_open() {
            self.end_text(out)?;
        }
        out.push(match self.reasoning {
            ReasoningMode::Separate => Chunk::ReasoningStart,
            ReasoningMode::AsText => Chunk::TextStart,
        });
        self.open.push(OpenChannel::Reasoning(String::new()));
        Ok(())
    }

    /// Starts a reasoning run unless one is already open
    pub fn ensure_reasoning(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.is_reasoning_open() {
            return self.guard();
        }
        self.start_reasoning(out)
    }

    pub fn reasoning_delta(
        &mut self,
        out: &mut Vec<Chunk>,
        delta: &str,
    ) -> Result<(), StreamError> {
        self.guard()?;
        let mode = self.reasoning;
        let Some(buffer) = self.open.iter_mut().find_map(|c| match c {
            OpenChannel::Reasoning(buffer) => Some(buffer),
            _ => None,
        }) else {
            return Err(self.violation("reasoning delta with no open reasoning run"));
        };
        if delta.is_empty() {
            return Ok(());
        }
        buffer.push_str(delta);
        out.push(match mode {
            ReasoningMode::Separate => Chunk::reasoning(delta),
            ReasoningMode::AsText => Chunk::text(delta),
        });
        Ok(())
    }

    pub fn end_reasoning(&mut self, out: &mut Vec<Chunk>) -> Result<ContentPart, StreamError> {
        self.guard()?;
        let Some(position) = self
            .open
            .iter()
            .position(|c| matches!(c, OpenChannel::Reasoning(_)))
        else {
            return Err(self.violation("reasoning end with no open reasoning run"));
        };
        let channel = self.open.remove(position);
        Ok(self.close_channel(out, channel))
    }

    /// Ends whichever of text or reasoning is open
    pub fn close_simple(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.is_text_open() {
            self.end_text(out)?;
        }
        if self.is_reasoning_open() {
            self.end_reasoning(out)?;
        }
        Ok(())
    }

    pub fn start_tool(
        &mut self,
        out: &mut Vec<Chunk>,
        slot: ToolSlot,
        id: &str,
        name: &str,
    ) -> Result<(), StreamError> {
        self.guard()?;
        if self.is_tool_open(&slot) {
            return Err(self.violation(format!("tool call {slot} started twice")));
        }
        if self.is_text_open() || self.is_reasoning_open() {
            debug!("[{}] closing simple channel before tool call {slot}", self.provider);
            self.close_simple(out)?;
        }
        let index = self.visible_tool_calls;
        out.push(Chunk::tool_call_start(index, id, name));
        self.open.push(OpenChannel::Tool(OpenToolCall {
            slot,
            index,
            id: id.to_string(),
            name: name.to_string(),
            args: String::new(),
        }));
        self.visible_tool_calls += 1;
        Ok(())
    }

    pub fn tool_delta(
        &mut self,
        out: &mut Vec<Chunk>,
        slot: &ToolSlot,
        delta: &str,
    ) -> Result<(), StreamError> {
        self.guard()?;
        let Some(call) = self.open.iter_mut().find_map(|c| match c {
            OpenChannel::Tool(call) if &call.slot == slot => Some(call),
            _ => None,
        }) else {
            return Err(self.violation(format!("tool call delta for unknown slot {slot}")));
        };
        if delta.is_empty() {
            return Ok(());
        }
        call.args.push_str(delta);
        out.push(Chunk::tool_call_delta(call.index, call.id.as_str(), delta));
        Ok(())
    }

    pub fn end_tool(
        &mut self,
        out: &mut Vec<Chunk>,
        slot: &ToolSlot,
    ) -> Result<ContentPart, StreamError> {
        self.guard()?;
        let Some(position) = self
            .open
            .iter()
            .position(|c| matches!(c, OpenChannel::Tool(call) if &call.slot == slot))
        else {
            return Err(self.violation(format!("tool call end for unknown slot {slot}")));
        };
        let channel = self.open.remove(position);
        Ok(self.close_channel(out, channel))
    }

    /// Ends every open channel in the order they were opened
    pub fn close_all(&mut self, out: &mut Vec<Chunk>) {
        for channel in std::mem::take(&mut self.open) {
            self.close_channel(out, channel);
        }
    }

    fn close_channel(&mut self, out: &mut Vec<Chunk>, channel: OpenChannel) -> ContentPart {
        let part = match channel {
            OpenChannel::Text(text) => {
                out.push(Chunk::TextEnd);
                ContentPart::Text { text }
            }
            OpenChannel::Reasoning(text) => match self.reasoning {
                ReasoningMode::Separate => {
                    out.push(Chunk::ReasoningEnd);
                    ContentPart::Reasoning { text }
                }
                ReasoningMode::AsText => {
                    out.push(Chunk::TextEnd);
                    ContentPart::Text { text }
                }
            },
            OpenChannel::Tool(call) => {
                out.push(Chunk::tool_call_end(call.index, call.id.as_str()));
                ContentPart::ToolCall {
                    id: call.id,
                    name: call.name,
                    args: call.args,
                }
            }
        };
        self.parts.push(part.clone());
        part
    }

    pub fn usage(&mut self, out: &mut Vec<Chunk>, usage: Usage) -> Result<(), StreamError> {
        if self.finished {
            return Err(self.violation("usage reported after the finish reason"));
        }
        out.push(Chunk::usage(usage));
        Ok(())
    }

    /// Emits the provider-native snapshot of the message, at most once
    pub fn raw_message(
        &mut self,
        out: &mut Vec<Chunk>,
        message: serde_json::Value,
    ) -> Result<(), StreamError> {
        self.guard()?;
        if self.raw_message_sent {
            return Err(self.violation("raw message emitted twice"));
        }
        self.raw_message_sent = true;
        out.push(Chunk::RawMessage { message });
        Ok(())
    }

    pub const fn raw_message_sent(&self) -> bool {
        self.raw_message_sent
    }

    /// Closes every open channel and emits the single finish reason
    pub fn finish(&mut self, out: &mut Vec<Chunk>, reason: FinishReason) -> Result<(), StreamError> {
        if self.finished {
            return Err(self.violation("second finish reason"));
        }
        self.close_all(out);
        out.push(Chunk::finish(reason));
        self.finished = true;
        Ok(())
    }
}
