use log::{debug, warn};
use serde_json::json;

use super::types::{GenerateContentResponse, Part, PartKind};
use crate::core::{Provider, StreamError};
use crate::providers::{
    raw_event, ChannelState, Chunk, ChunkProcessor, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ToolSlot, UsageTracker, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::Google;

/// Normalizes `streamGenerateContent` responses.
///
/// Each chunk is a whole response carrying the next parts of the first
/// candidate. Function calls arrive complete, so their Start, Delta and End
/// are emitted together.
#[derive(Debug)]
pub struct GoogleChunkProcessor {
    options: ProcessorOptions,
    state: ChannelState,
    translator: FinishReasonTranslator,
    usage: UsageTracker,
    parts: Vec<Part>,
    next_call: u32,
    finish_signal: Option<String>,
    format_tool_used: bool,
}

impl Default for GoogleChunkProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl GoogleChunkProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            state: ChannelState::new(PROVIDER, options.reasoning),
            options,
            translator: FinishReasonTranslator::new(PROVIDER),
            usage: UsageTracker::new(),
            parts: Vec::new(),
            next_call: 0,
            finish_signal: None,
            format_tool_used: false,
        }
    }

    fn process_part(&mut self, out: &mut Vec<Chunk>, part: &Part) -> Result<(), StreamError> {
        match part.kind() {
            PartKind::Text(text) => {
                if !text.is_empty() {
                    self.state.ensure_text(out)?;
                    self.state.text_delta(out, text)?;
                }
            }
            PartKind::Thought(text) => {
                if !text.is_empty() {
                    self.state.ensure_reasoning(out)?;
                    self.state.reasoning_delta(out, text)?;
                }
            }
            PartKind::FunctionCall(call) => {
                let args = serde_json::to_string(&call.args)?;
                if self.options.is_format_tool(&call.name) {
                    debug!("[{PROVIDER}] format tool call reported as text");
                    self.format_tool_used = true;
                    self.state.ensure_text(out)?;
                    self.state.text_delta(out, &args)?;
                } else {
                    let id = call.id.as_deref().unwrap_or(UNKNOWN_TOOL_ID);
                    let slot = ToolSlot::Index(self.next_call);
                    self.next_call += 1;
                    self.state.start_tool(out, slot.clone(), id, &call.name)?;
                    self.state.tool_delta(out, &slot, &args)?;
                    self.state.end_tool(out, &slot)?;
                }
            }
            PartKind::Empty => {}
            PartKind::Unsupported(feature) => {
                return Err(StreamError::unsupported(PROVIDER, feature));
            }
        }
        Ok(())
    }
}

impl ChunkProcessor for GoogleChunkProcessor {
    type Event = GenerateContentResponse;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn process(&mut self, response: GenerateContentResponse) -> Result<Vec<Chunk>, StreamError> {
        let mut out = vec![raw_event(&response)?];
        if response.candidates.len() > 1 {
            return Err(StreamError::unsupported(PROVIDER, "multiple candidates"));
        }

        if let Some(candidate) = response.candidates.into_iter().next() {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            if !parts.is_empty() && self.finish_signal.is_some() {
                return Err(StreamError::violation(
                    PROVIDER,
                    "content after the finishReason",
                ));
            }
            for part in parts {
                self.process_part(&mut out, &part)?;
                self.parts.push(part);
            }
            if let Some(reason) = candidate.finish_reason {
                debug!("[{PROVIDER}] finishReason {reason:?}");
                self.finish_signal = Some(reason);
            }
        }

        if let Some(usage) = &response.usage_metadata {
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
        self.state.raw_message(
            &mut out,
            json!({"role": "model", "parts": self.parts}),
        )?;

        match self.finish_signal.as_deref() {
            Some(reason) => {
                let reason = self.translator.resolve(
                    Some(reason),
                    FinishContext {
                        visible_tool_calls: self.state.visible_tool_calls(),
                        format_tool_used: self.format_tool_used,
                        refusal_seen: false,
                    },
                );
                self.state.finish(&mut out, reason)?;
            }
            None => warn!("[{PROVIDER}] stream ended without a finishReason"),
        }
        Ok(out)
    }
}
