use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;

use super::types::FinishReason;
use crate::core::Provider;

type Table = HashMap<&'static str, FinishReason>;

static CLAUDE_FINISH_REASONS: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("end_turn", FinishReason::Stop),
        ("stop_sequence", FinishReason::Stop),
        ("max_tokens", FinishReason::MaxTokens),
        ("model_context_window_exceeded", FinishReason::MaxTokens),
        ("tool_use", FinishReason::ToolUse),
        ("refusal", FinishReason::Refusal),
    ])
});

static OPENAI_FINISH_REASONS: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("stop", FinishReason::Stop),
        ("length", FinishReason::MaxTokens),
        ("tool_calls", FinishReason::ToolUse),
        ("function_call", FinishReason::ToolUse),
        ("content_filter", FinishReason::Refusal),
    ])
});

static OPENAI_RESPONSES_FINISH_REASONS: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("completed", FinishReason::Stop),
        ("max_output_tokens", FinishReason::MaxTokens),
        ("content_filter", FinishReason::Refusal),
    ])
});

static GOOGLE_FINISH_REASONS: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("STOP", FinishReason::Stop),
        ("MAX_TOKENS", FinishReason::MaxTokens),
        ("SAFETY", FinishReason::Refusal),
        ("RECITATION", FinishReason::Refusal),
        ("BLOCKLIST", FinishReason::Refusal),
        ("PROHIBITED_CONTENT", FinishReason::Refusal),
        ("SPII", FinishReason::Refusal),
        ("IMAGE_SAFETY", FinishReason::Refusal),
    ])
});

static MLX_FINISH_REASONS: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("stop", FinishReason::Stop),
        ("length", FinishReason::MaxTokens),
    ])
});

/// What a processor observed during the stream that can override the
/// provider's raw stop signal
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinishContext {
    /// Tool calls reported to the caller as tool calls
    pub visible_tool_calls: usize,
    /// The internal format tool was called and reported as text
    pub format_tool_used: bool,
    /// The provider streamed refusal content
    pub refusal_seen: bool,
}

/// Maps one provider's native stop identifiers to [`FinishReason`]
#[derive(Debug, Clone, Copy)]
pub struct FinishReasonTranslator {
    provider: Provider,
    table: &'static Table,
}

impl FinishReasonTranslator {
    pub fn new(provider: Provider) -> Self {
        let table: &'static Table = match provider {
            Provider::Claude => &*CLAUDE_FINISH_REASONS,
            Provider::OpenAI => &*OPENAI_FINISH_REASONS,
            Provider::OpenAIResponses => &*OPENAI_RESPONSES_FINISH_REASONS,
            Provider::Google => &*GOOGLE_FINISH_REASONS,
            Provider::Mlx => &*MLX_FINISH_REASONS,
        };
        Self { provider, table }
    }

    /// Plain table lookup; values missing from the table become `Unknown`.
    pub fn translate(&self, raw: &str) -> FinishReason {
        self.table.get(raw).copied().unwrap_or_else(|| {
            debug!("[{}] unmapped finish reason {raw:?}", self.provider);
            FinishReason::Unknown
        })
    }

    /// Translates the raw signal (absent counts as `Unknown`) and applies the
    /// override rules.
    pub fn resolve(&self, raw: Option<&str>, context: FinishContext) -> FinishReason {
        let reason = raw.map_or(FinishReason::Unknown, |raw| self.translate(raw));
        self.apply_overrides(reason, context)
    }

    fn apply_overrides(&self, reason: FinishReason, context: FinishContext) -> FinishReason {
        match reason {
            FinishReason::Stop if context.refusal_seen => FinishReason::Refusal,
            FinishReason::ToolUse
                if context.format_tool_used && context.visible_tool_calls == 0 =>
            {
                FinishReason::Stop
            }
            FinishReason::Stop if context.visible_tool_calls > 0 && !self.reports_tool_use() => {
                FinishReason::ToolUse
            }
            other => other,
        }
    }

    /// Whether the provider has a native "tool use" stop value
    const fn reports_tool_use(&self) -> bool {
        matches!(self.provider, Provider::Claude | Provider::OpenAI)
    }
}
