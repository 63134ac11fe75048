pub mod claude;
pub mod finish_reason;
pub mod google;
pub mod mlx;
pub mod openai;
pub mod state;
pub mod types;

use crate::core::{Provider, StreamError};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use claude::ClaudeChunkProcessor;
pub use finish_reason::{FinishContext, FinishReasonTranslator};
pub use google::GoogleChunkProcessor;
pub use mlx::MlxChunkProcessor;
pub use openai::{OpenAIChunkProcessor, ResponsesChunkProcessor};
pub use state::{ChannelState, ToolSlot};
pub use types::{AssistantMessage, Chunk, ContentPart, FinishReason, Usage, UsageTracker};

/// Id reported for tool calls whose provider supplied none
pub const UNKNOWN_TOOL_ID: &str = "unknown_tool_id";
/// Default name of the internal tool used to coerce structured output
pub const DEFAULT_FORMAT_TOOL: &str = "__format_output__";

/// A per-stream state machine turning one provider's native events into chunks.
///
/// A processor is created for a single stream, fed every native event once
/// in arrival order, and never reused.
pub trait ChunkProcessor {
    /// The provider's native stream event
    type Event: Serialize + DeserializeOwned;

    fn provider(&self) -> Provider;

    /// Translates one native event. The first chunk is always the raw event.
    fn process(&mut self, event: Self::Event) -> Result<Vec<Chunk>, StreamError>;

    /// Drains the chunks that can only be produced once the native events are
    /// exhausted. Called at most once.
    fn flush(&mut self) -> Result<Vec<Chunk>, StreamError> {
        Ok(Vec::new())
    }
}

/// Result of decoding a complete (non-streamed) response
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub message: AssistantMessage,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
}

/// How reasoning content is reported to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ReasoningMode {
    /// Reasoning gets its own channel; inline think tags are promoted to it
    #[default]
    Separate,
    /// Reasoning is folded into the text channel; inline think tags stay text
    AsText,
}

/// Tags recognised in a flat token stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MlxTags {
    pub think_start: String,
    pub think_end: String,
    pub tool_call_start: String,
    pub tool_call_end: String,
}

impl Default for MlxTags {
    fn default() -> Self {
        Self {
            think_start: "<think>".to_string(),
            think_end: "</think>".to_string(),
            tool_call_start: "<tool_call>".to_string(),
            tool_call_end: "</tool_call>".to_string(),
        }
    }
}

/// Caller-controlled policy shared by every processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorOptions {
    pub reasoning: ReasoningMode,
    /// Tool calls with this name are reported as text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_tool: Option<String>,
    pub mlx: MlxTags,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            reasoning: ReasoningMode::Separate,
            format_tool: Some(DEFAULT_FORMAT_TOOL.to_string()),
            mlx: MlxTags::default(),
        }
    }
}

impl ProcessorOptions {
    pub fn with_reasoning(mut self, reasoning: ReasoningMode) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_format_tool(mut self, name: Option<String>) -> Self {
        self.format_tool = name;
        self
    }

    /// Whether a tool call with this name is the internal format tool
    pub fn is_format_tool(&self, name: &str) -> bool {
        self.format_tool.as_deref() == Some(name)
    }
}

/// Wraps a native event for the mandatory leading `RawEvent` chunk.
pub(crate) fn raw_event<E: Serialize>(event: &E) -> Result<Chunk, StreamError> {
    let value = serde_json::to_value(event)?;
    log::trace!("native event: {value}");
    Ok(Chunk::raw_event(value))
}
