use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents one normalized event of a streaming response.
///
/// Every provider's native stream is converted into this vocabulary, so
/// consumers never depend on a wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// The native event this batch of chunks was derived from
    RawEvent { event: Value },
    /// Start of a text run
    TextStart,
    /// A piece of text content
    TextDelta { delta: String },
    /// End of a text run
    TextEnd,
    /// Start of a tool call.
    ///
    /// `index` counts the stream's tool calls in opening order. It tells
    /// overlapping calls apart when their ids repeat, such as two calls
    /// reported without an id.
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    /// A fragment of a tool call's JSON arguments
    ToolCallDelta {
        index: usize,
        id: String,
        delta: String,
    },
    /// End of a tool call
    ToolCallEnd { index: usize, id: String },
    /// Start of a reasoning run
    ReasoningStart,
    /// A piece of reasoning content
    ReasoningDelta { delta: String },
    /// End of a reasoning run
    ReasoningEnd,
    /// Provider-native snapshot of the finished assistant message
    RawMessage { message: Value },
    /// Why the response ended
    FinishReason { reason: FinishReason },
    /// Token usage reported since the previous usage chunk
    UsageDelta { usage: Usage },
}

impl Chunk {
    pub const fn raw_event(event: Value) -> Self {
        Self::RawEvent { event }
    }

    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    pub fn reasoning(delta: impl Into<String>) -> Self {
        Self::ReasoningDelta {
            delta: delta.into(),
        }
    }

    pub fn tool_call_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ToolCallStart {
            index,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn tool_call_delta(index: usize, id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolCallDelta {
            index,
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn tool_call_end(index: usize, id: impl Into<String>) -> Self {
        Self::ToolCallEnd {
            index,
            id: id.into(),
        }
    }

    pub const fn finish(reason: FinishReason) -> Self {
        Self::FinishReason { reason }
    }

    pub const fn usage(usage: Usage) -> Self {
        Self::UsageDelta { usage }
    }

    /// Whether this chunk carries message content (any Start, Delta or End).
    pub const fn is_content(&self) -> bool {
        !matches!(
            self,
            Self::RawEvent { .. }
                | Self::RawMessage { .. }
                | Self::FinishReason { .. }
                | Self::UsageDelta { .. }
        )
    }

    pub const fn is_start(&self) -> bool {
        matches!(
            self,
            Self::TextStart | Self::ToolCallStart { .. } | Self::ReasoningStart
        )
    }

    pub const fn is_end(&self) -> bool {
        matches!(
            self,
            Self::TextEnd | Self::ToolCallEnd { .. } | Self::ReasoningEnd
        )
    }
}

/// Canonical classification of why a response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished its turn
    Stop,
    /// Generation hit the token limit
    MaxTokens,
    /// The model or a provider filter refused to answer
    Refusal,
    /// The model is waiting on tool results
    ToolUse,
    /// The provider reported a reason with no canonical counterpart
    Unknown,
}

impl FinishReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::MaxTokens => "max_tokens",
            Self::Refusal => "refusal",
            Self::ToolUse => "tool_use",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counts, additive across `UsageDelta` chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub reasoning_tokens: u64,
}

impl Usage {
    pub const fn is_empty(&self) -> bool {
        self.input_tokens == 0
            && self.output_tokens == 0
            && self.cache_read_tokens == 0
            && self.cache_write_tokens == 0
            && self.reasoning_tokens == 0
    }

    pub fn add(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
    }

    fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_sub(other.input_tokens),
            output_tokens: self.output_tokens.saturating_sub(other.output_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_sub(other.cache_read_tokens),
            cache_write_tokens: self
                .cache_write_tokens
                .saturating_sub(other.cache_write_tokens),
            reasoning_tokens: self.reasoning_tokens.saturating_sub(other.reasoning_tokens),
        }
    }

    fn max(&self, other: &Self) -> Self {
        Self {
            input_tokens: self.input_tokens.max(other.input_tokens),
            output_tokens: self.output_tokens.max(other.output_tokens),
            cache_read_tokens: self.cache_read_tokens.max(other.cache_read_tokens),
            cache_write_tokens: self.cache_write_tokens.max(other.cache_write_tokens),
            reasoning_tokens: self.reasoning_tokens.max(other.reasoning_tokens),
        }
    }
}

/// Turns the cumulative usage totals providers report into additive deltas.
#[derive(Debug, Default)]
pub struct UsageTracker {
    reported: Usage,
}

impl UsageTracker {
    pub const fn new() -> Self {
        Self {
            reported: Usage {
                input_tokens: 0,
                output_tokens: 0,
                cache_read_tokens: 0,
                cache_write_tokens: 0,
                reasoning_tokens: 0,
            },
        }
    }

    /// Records a new cumulative total and returns the growth since the last
    /// report, or `None` when nothing grew.
    ///
    /// Fields a provider leaves at zero in a later report keep their earlier
    /// value rather than counting as a decrease.
    pub fn observe(&mut self, totals: Usage) -> Option<Usage> {
        let merged = self.reported.max(&totals);
        let delta = merged.saturating_sub(&self.reported);
        self.reported = merged;
        (!delta.is_empty()).then_some(delta)
    }

    pub const fn totals(&self) -> Usage {
        self.reported
    }
}
