use std::collections::BTreeMap;

use log::{debug, warn};
use serde_json::{json, Value};

use super::types::{ContentBlock, DeltaEvent, StreamEvent, Usage};
use crate::core::{Provider, StreamError};
use crate::providers::{
    raw_event, ChannelState, Chunk, ChunkProcessor, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ToolSlot, UsageTracker, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::Claude;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    RedactedThinking,
    ToolUse,
    /// A call to the format tool, reported as text
    FormatTool,
}

#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    id: String,
    name: String,
    signature: String,
    data: String,
}

impl OpenBlock {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            id: String::new(),
            name: String::new(),
            signature: String::new(),
            data: String::new(),
        }
    }
}

/// Normalizes the Anthropic Messages event stream.
///
/// Content blocks are keyed by their numeric `index`. Thinking blocks map to
/// the reasoning channel; their signatures and redacted thinking only reach
/// the raw message snapshot.
#[derive(Debug)]
pub struct ClaudeChunkProcessor {
    options: ProcessorOptions,
    state: ChannelState,
    translator: FinishReasonTranslator,
    usage: UsageTracker,
    blocks: BTreeMap<u32, OpenBlock>,
    raw_content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    format_tool_used: bool,
}

impl Default for ClaudeChunkProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl ClaudeChunkProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            state: ChannelState::new(PROVIDER, options.reasoning),
            options,
            translator: FinishReasonTranslator::new(PROVIDER),
            usage: UsageTracker::new(),
            blocks: BTreeMap::new(),
            raw_content: Vec::new(),
            stop_reason: None,
            format_tool_used: false,
        }
    }

    fn observe_usage(&mut self, out: &mut Vec<Chunk>, usage: &Usage) -> Result<(), StreamError> {
        if let Some(delta) = self.usage.observe(usage.into()) {
            self.state.usage(out, delta)?;
        }
        Ok(())
    }

    fn start_block(
        &mut self,
        out: &mut Vec<Chunk>,
        index: u32,
        block: ContentBlock,
    ) -> Result<(), StreamError> {
        if self.blocks.contains_key(&index) {
            return Err(StreamError::violation(
                PROVIDER,
                format!("content block {index} started twice"),
            ));
        }

        let open = match block {
            ContentBlock::Text { text } => {
                self.state.start_text(out)?;
                self.state.text_delta(out, &text)?;
                OpenBlock::new(BlockKind::Text)
            }
            ContentBlock::ToolUse { id, name, .. } if self.options.is_format_tool(&name) => {
                debug!("[{PROVIDER}] format tool call in block {index} reported as text");
                self.format_tool_used = true;
                self.state.start_text(out)?;
                OpenBlock {
                    id,
                    name,
                    ..OpenBlock::new(BlockKind::FormatTool)
                }
            }
            ContentBlock::ToolUse { id, name, .. } => {
                let id = if id.is_empty() {
                    warn!("[{PROVIDER}] tool_use block {index} has no id");
                    UNKNOWN_TOOL_ID.to_string()
                } else {
                    id
                };
                self.state
                    .start_tool(out, ToolSlot::Index(index), &id, &name)?;
                OpenBlock {
                    id,
                    name,
                    ..OpenBlock::new(BlockKind::ToolUse)
                }
            }
            ContentBlock::Thinking {
                thinking,
                signature,
            } => {
                self.state.start_reasoning(out)?;
                self.state.reasoning_delta(out, &thinking)?;
                OpenBlock {
                    signature,
                    ..OpenBlock::new(BlockKind::Thinking)
                }
            }
            ContentBlock::RedactedThinking { data } => OpenBlock {
                data,
                ..OpenBlock::new(BlockKind::RedactedThinking)
            },
            ContentBlock::Unsupported => {
                return Err(StreamError::unsupported(PROVIDER, "content block type"));
            }
        };
        self.blocks.insert(index, open);
        Ok(())
    }

    fn block_delta(
        &mut self,
        out: &mut Vec<Chunk>,
        index: u32,
        delta: DeltaEvent,
    ) -> Result<(), StreamError> {
        let Some(block) = self.blocks.get_mut(&index) else {
            return Err(StreamError::violation(
                PROVIDER,
                format!("delta for content block {index} that never started"),
            ));
        };

        match (block.kind, delta) {
            (_, DeltaEvent::Unsupported) => {
                Err(StreamError::unsupported(PROVIDER, "content block delta type"))
            }
            (BlockKind::Text, DeltaEvent::TextDelta { text }) => self.state.text_delta(out, &text),
            (BlockKind::FormatTool, DeltaEvent::InputJsonDelta { partial_json }) => {
                self.state.text_delta(out, &partial_json)
            }
            (BlockKind::ToolUse, DeltaEvent::InputJsonDelta { partial_json }) => {
                self.state
                    .tool_delta(out, &ToolSlot::Index(index), &partial_json)
            }
            (BlockKind::Thinking, DeltaEvent::ThinkingDelta { thinking }) => {
                self.state.reasoning_delta(out, &thinking)
            }
            (BlockKind::Thinking, DeltaEvent::SignatureDelta { signature }) => {
                block.signature.push_str(&signature);
                Ok(())
            }
            (kind, delta) => Err(StreamError::violation(
                PROVIDER,
                format!("{} for {kind:?} block {index}", delta.kind()),
            )),
        }
    }

    fn stop_block(&mut self, out: &mut Vec<Chunk>, index: u32) -> Result<(), StreamError> {
        let Some(block) = self.blocks.remove(&index) else {
            return Err(StreamError::violation(
                PROVIDER,
                format!("stop for content block {index} that never started"),
            ));
        };

        let raw = match block.kind {
            BlockKind::Text => ContentBlock::Text {
                text: self.state.end_text(out)?.into_content(),
            },
            BlockKind::FormatTool => ContentBlock::ToolUse {
                id: block.id,
                name: block.name,
                input: parse_input(&self.state.end_text(out)?.into_content()),
            },
            BlockKind::ToolUse => ContentBlock::ToolUse {
                id: block.id,
                name: block.name,
                input: parse_input(
                    &self
                        .state
                        .end_tool(out, &ToolSlot::Index(index))?
                        .into_content(),
                ),
            },
            BlockKind::Thinking => ContentBlock::Thinking {
                thinking: self.state.end_reasoning(out)?.into_content(),
                signature: block.signature,
            },
            BlockKind::RedactedThinking => ContentBlock::RedactedThinking { data: block.data },
        };
        self.raw_content.push(raw);
        Ok(())
    }

    /// Stops every block still open, lowest index first
    fn stop_open_blocks(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        let open: Vec<u32> = self.blocks.keys().copied().collect();
        if !open.is_empty() {
            warn!("[{PROVIDER}] closing content blocks {open:?} left open at end of message");
        }
        for index in open {
            self.stop_block(out, index)?;
        }
        Ok(())
    }

    fn raw_message(&self) -> Value {
        json!({
            "role": "assistant",
            "content": self.raw_content,
        })
    }

    fn complete(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        self.stop_open_blocks(out)?;
        self.state.raw_message(out, self.raw_message())?;
        let reason = self.translator.resolve(
            self.stop_reason.as_deref(),
            FinishContext {
                visible_tool_calls: self.state.visible_tool_calls(),
                format_tool_used: self.format_tool_used,
                refusal_seen: false,
            },
        );
        self.state.finish(out, reason)
    }
}

/// Tool input as JSON; empty input is an empty object and unparseable input
/// is kept verbatim as a string.
pub(crate) fn parse_input(args: &str) -> Value {
    if args.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(args).unwrap_or_else(|e| {
        warn!("[{PROVIDER}] tool input is not valid JSON: {e}");
        Value::String(args.to_string())
    })
}

impl ChunkProcessor for ClaudeChunkProcessor {
    type Event = StreamEvent;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn process(&mut self, event: StreamEvent) -> Result<Vec<Chunk>, StreamError> {
        let mut out = vec![raw_event(&event)?];
        match event {
            StreamEvent::MessageStart { message } => self.observe_usage(&mut out, &message.usage)?,
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.start_block(&mut out, index, content_block)?,
            StreamEvent::ContentBlockDelta { index, delta } => {
                self.block_delta(&mut out, index, delta)?;
            }
            StreamEvent::ContentBlockStop { index } => self.stop_block(&mut out, index)?,
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(stop_reason) = delta.stop_reason {
                    self.stop_reason = Some(stop_reason);
                }
                if let Some(usage) = usage {
                    self.observe_usage(&mut out, &usage)?;
                }
            }
            StreamEvent::MessageStop => self.complete(&mut out)?,
            StreamEvent::Ping => {}
            StreamEvent::Error { error } => {
                return Err(StreamError::upstream(
                    PROVIDER,
                    format!("{}: {}", error.error_type, error.message),
                ));
            }
            StreamEvent::Unsupported => {
                return Err(StreamError::unsupported(PROVIDER, "stream event type"));
            }
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        if self.state.is_finished() {
            return Ok(out);
        }
        debug!("[{PROVIDER}] stream ended without message_stop");
        self.stop_open_blocks(&mut out)?;
        if !self.state.raw_message_sent() {
            self.state.raw_message(&mut out, self.raw_message())?;
        }
        Ok(out)
    }
}
