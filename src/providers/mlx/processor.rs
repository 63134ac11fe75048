use log::{debug, warn};
use serde_json::Value;

use super::parser::{Segment, TagParser};
use super::types::{GenerationResponse, ToolCallBody};
use crate::core::{Provider, StreamError};
use crate::providers::{
    raw_event, ChannelState, Chunk, ChunkProcessor, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ReasoningMode, ToolSlot, UsageTracker, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::Mlx;

/// Tool-call bookkeeping shared by the processor and the decoder
#[derive(Debug, Default)]
pub(super) struct ToolCalls {
    next_slot: u32,
    pub format_tool_used: bool,
}

pub(super) fn tag_parser(options: &ProcessorOptions) -> TagParser {
    TagParser::new(
        options.mlx.clone(),
        options.reasoning == ReasoningMode::Separate,
    )
}

/// Routes one parsed segment through the channel state
pub(super) fn apply_segment(
    state: &mut ChannelState,
    out: &mut Vec<Chunk>,
    segment: Segment,
    options: &ProcessorOptions,
    tools: &mut ToolCalls,
) -> Result<(), StreamError> {
    match segment {
        Segment::Text(text) => {
            state.ensure_text(out)?;
            state.text_delta(out, &text)
        }
        Segment::Think(text) => {
            state.ensure_reasoning(out)?;
            state.reasoning_delta(out, &text)
        }
        Segment::ThinkEnd => {
            if state.is_reasoning_open() {
                state.end_reasoning(out)?;
            }
            Ok(())
        }
        Segment::ToolCall(body) => match serde_json::from_str::<ToolCallBody>(&body) {
            Ok(call) => {
                let args = match call.arguments {
                    Value::String(args) => args,
                    Value::Null => "{}".to_string(),
                    args => serde_json::to_string(&args)?,
                };
                if options.is_format_tool(&call.name) {
                    debug!("[{PROVIDER}] format tool call reported as text");
                    tools.format_tool_used = true;
                    state.ensure_text(out)?;
                    return state.text_delta(out, &args);
                }
                let slot = ToolSlot::Index(tools.next_slot);
                tools.next_slot += 1;
                state.start_tool(out, slot.clone(), UNKNOWN_TOOL_ID, &call.name)?;
                state.tool_delta(out, &slot, &args)?;
                state.end_tool(out, &slot).map(|_| ())
            }
            Err(e) => {
                warn!("[{PROVIDER}] tool call body is not valid JSON ({e}), reported as text");
                let literal = format!(
                    "{}{body}{}",
                    options.mlx.tool_call_start, options.mlx.tool_call_end
                );
                state.ensure_text(out)?;
                state.text_delta(out, &literal)
            }
        },
    }
}

/// Normalizes a local `mlx_lm` token stream.
///
/// The stream carries no channel structure of its own; an inline
/// [`TagParser`] recovers think spans and tool calls from the text.
#[derive(Debug)]
pub struct MlxChunkProcessor {
    options: ProcessorOptions,
    state: ChannelState,
    translator: FinishReasonTranslator,
    usage: UsageTracker,
    parser: TagParser,
    tools: ToolCalls,
    text: String,
    finish_signal: Option<String>,
}

impl Default for MlxChunkProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl MlxChunkProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            state: ChannelState::new(PROVIDER, options.reasoning),
            parser: tag_parser(&options),
            options,
            translator: FinishReasonTranslator::new(PROVIDER),
            usage: UsageTracker::new(),
            tools: ToolCalls::default(),
            text: String::new(),
            finish_signal: None,
        }
    }

    fn apply(&mut self, out: &mut Vec<Chunk>, segments: Vec<Segment>) -> Result<(), StreamError> {
        for segment in segments {
            apply_segment(&mut self.state, out, segment, &self.options, &mut self.tools)?;
        }
        Ok(())
    }
}

impl ChunkProcessor for MlxChunkProcessor {
    type Event = GenerationResponse;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn process(&mut self, response: GenerationResponse) -> Result<Vec<Chunk>, StreamError> {
        let mut out = vec![raw_event(&response)?];
        if !response.text.is_empty() {
            if self.finish_signal.is_some() {
                return Err(StreamError::violation(
                    PROVIDER,
                    "text generated after the finish_reason",
                ));
            }
            self.text.push_str(&response.text);
            let segments = self.parser.feed(&response.text);
            self.apply(&mut out, segments)?;
        }

        if let Some(delta) = self.usage.observe((&response).into()) {
            self.state.usage(&mut out, delta)?;
        }
        if let Some(reason) = response.finish_reason {
            debug!("[{PROVIDER}] finish_reason {reason:?}");
            self.finish_signal = Some(reason);
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        if self.state.is_finished() {
            return Ok(out);
        }
        let segments = self.parser.finish();
        self.apply(&mut out, segments)?;
        self.state.close_all(&mut out);
        self.state
            .raw_message(&mut out, Value::String(self.text.clone()))?;

        match self.finish_signal.as_deref() {
            Some(reason) => {
                let reason = self.translator.resolve(
                    Some(reason),
                    FinishContext {
                        visible_tool_calls: self.state.visible_tool_calls(),
                        format_tool_used: self.tools.format_tool_used,
                        refusal_seen: false,
                    },
                );
                self.state.finish(&mut out, reason)?;
            }
            None => warn!("[{PROVIDER}] generation ended without a finish_reason"),
        }
        Ok(out)
    }
}
