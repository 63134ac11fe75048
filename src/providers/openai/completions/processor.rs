use log::{debug, warn};

use super::types::{ChatCompletionChunk, Message, MessageChunk, ToolCall, ToolCallChunk};
use crate::core::{Provider, StreamError};
use crate::providers::{
    raw_event, ChannelState, Chunk, ChunkProcessor, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ToolSlot, UsageTracker, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::OpenAI;

#[derive(Debug)]
struct ToolEntry {
    index: u32,
    id: String,
    name: String,
    arguments: String,
    /// Reported on the text channel instead of as a tool call
    format: bool,
}

/// Normalizes the Chat Completions chunk stream.
///
/// Tool calls are keyed by their numeric `index` and have no end signal of
/// their own, so they stay open until the choice's `finish_reason` arrives.
/// The finish reason itself is held back until [`ChunkProcessor::flush`]
/// because the usage chunk trails it.
///
/// Format-tool arguments join the open text run or start one. The streamed
/// grouping matches [`decode_response`](super::decode_response) as long as
/// each call's fragments arrive before the next call starts, which is how
/// parallel calls are streamed: format arguments before the first visible
/// call lead the message, those after it trail the visible calls.
#[derive(Debug)]
pub struct OpenAIChunkProcessor {
    options: ProcessorOptions,
    state: ChannelState,
    translator: FinishReasonTranslator,
    usage: UsageTracker,
    tools: Vec<ToolEntry>,
    content: String,
    reasoning: String,
    refusal: String,
    finish_signal: Option<String>,
    refusal_seen: bool,
    format_tool_used: bool,
}

impl Default for OpenAIChunkProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl OpenAIChunkProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            state: ChannelState::new(PROVIDER, options.reasoning),
            options,
            translator: FinishReasonTranslator::new(PROVIDER),
            usage: UsageTracker::new(),
            tools: Vec::new(),
            content: String::new(),
            reasoning: String::new(),
            refusal: String::new(),
            finish_signal: None,
            refusal_seen: false,
            format_tool_used: false,
        }
    }

    fn process_delta(&mut self, out: &mut Vec<Chunk>, delta: MessageChunk) -> Result<(), StreamError> {
        if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
            self.state.ensure_reasoning(out)?;
            self.state.reasoning_delta(out, &reasoning)?;
            self.reasoning.push_str(&reasoning);
        }
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            self.state.ensure_text(out)?;
            self.state.text_delta(out, &content)?;
            self.content.push_str(&content);
        }
        if let Some(refusal) = delta.refusal.filter(|r| !r.is_empty()) {
            self.refusal_seen = true;
            self.state.ensure_text(out)?;
            self.state.text_delta(out, &refusal)?;
            self.refusal.push_str(&refusal);
        }
        for fragment in delta.tool_calls.unwrap_or_default() {
            self.tool_fragment(out, fragment)?;
        }
        Ok(())
    }

    fn tool_fragment(&mut self, out: &mut Vec<Chunk>, fragment: ToolCallChunk) -> Result<(), StreamError> {
        let index = fragment.index;
        let position = match self.tools.iter().position(|tool| tool.index == index) {
            Some(position) => position,
            None => {
                self.start_tool(out, &fragment)?;
                self.tools.len() - 1
            }
        };

        let arguments = fragment.function.arguments;
        if arguments.is_empty() {
            return Ok(());
        }
        let tool = &mut self.tools[position];
        tool.arguments.push_str(&arguments);
        if tool.format {
            self.state.ensure_text(out)?;
            self.state.text_delta(out, &arguments)
        } else {
            self.state.tool_delta(out, &ToolSlot::Index(index), &arguments)
        }
    }

    fn start_tool(&mut self, out: &mut Vec<Chunk>, fragment: &ToolCallChunk) -> Result<(), StreamError> {
        let index = fragment.index;
        let Some(name) = fragment.function.name.clone().filter(|n| !n.is_empty()) else {
            return Err(StreamError::violation(
                PROVIDER,
                format!("first fragment of tool call {index} has no function name"),
            ));
        };
        let id = fragment.id.clone().unwrap_or_else(|| {
            warn!("[{PROVIDER}] tool call {index} has no id");
            UNKNOWN_TOOL_ID.to_string()
        });

        let format = self.options.is_format_tool(&name);
        if format {
            debug!("[{PROVIDER}] format tool call {index} reported as text");
            self.format_tool_used = true;
            self.state.ensure_text(out)?;
        } else {
            self.state
                .start_tool(out, ToolSlot::Index(index), &id, &name)?;
        }
        self.tools.push(ToolEntry {
            index,
            id,
            name,
            arguments: String::new(),
            format,
        });
        Ok(())
    }

    fn raw_message(&self) -> Result<serde_json::Value, StreamError> {
        let non_empty = |s: &String| (!s.is_empty()).then(|| s.clone());
        let tool_calls: Vec<ToolCall> = self
            .tools
            .iter()
            .map(|tool| ToolCall::function(&tool.id, &tool.name, &tool.arguments))
            .collect();
        let message = Message {
            content: non_empty(&self.content),
            reasoning_content: non_empty(&self.reasoning),
            refusal: non_empty(&self.refusal),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            ..Message::assistant()
        };
        Ok(serde_json::to_value(message)?)
    }
}

impl ChunkProcessor for OpenAIChunkProcessor {
    type Event = ChatCompletionChunk;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn process(&mut self, chunk: ChatCompletionChunk) -> Result<Vec<Chunk>, StreamError> {
        let mut out = vec![raw_event(&chunk)?];
        if chunk.choices.len() > 1 {
            return Err(StreamError::unsupported(PROVIDER, "multiple choices"));
        }

        if let Some(choice) = chunk.choices.into_iter().next() {
            let delta = choice.delta;
            let has_content = delta.content.as_deref().is_some_and(|c| !c.is_empty())
                || delta.reasoning_content.as_deref().is_some_and(|r| !r.is_empty())
                || delta.refusal.as_deref().is_some_and(|r| !r.is_empty())
                || delta.tool_calls.as_ref().is_some_and(|t| !t.is_empty());
            if has_content && self.finish_signal.is_some() {
                return Err(StreamError::violation(
                    PROVIDER,
                    "content after the finish_reason",
                ));
            }
            self.process_delta(&mut out, delta)?;

            if let Some(reason) = choice.finish_reason {
                debug!("[{PROVIDER}] finish_reason {reason:?}, closing open channels");
                self.state.close_all(&mut out);
                self.finish_signal = Some(reason);
            }
        }

        if let Some(usage) = &chunk.usage {
            if let Some(delta) = self.usage.observe(usage.into()) {
                self.state.usage(&mut out, delta)?;
            }
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        if self.state.is_finished() {
            return Ok(out);
        }
        self.state.close_all(&mut out);
        self.state.raw_message(&mut out, self.raw_message()?)?;

        match self.finish_signal.as_deref() {
            Some(reason) => {
                let reason = self.translator.resolve(
                    Some(reason),
                    FinishContext {
                        visible_tool_calls: self.state.visible_tool_calls(),
                        format_tool_used: self.format_tool_used,
                        refusal_seen: self.refusal_seen,
                    },
                );
                self.state.finish(&mut out, reason)?;
            }
            None => debug!("[{PROVIDER}] stream ended without a finish_reason"),
        }
        Ok(out)
    }
}
