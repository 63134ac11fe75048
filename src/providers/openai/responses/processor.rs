use std::collections::HashMap;

use log::{debug, warn};

use super::types::{OutputItem, Response, ResponseEvent};
use crate::core::{Provider, StreamError};
use crate::providers::{
    raw_event, ChannelState, Chunk, ChunkProcessor, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ToolSlot, UsageTracker, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::OpenAIResponses;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Message,
    FunctionCall,
    FormatTool,
    Reasoning,
}

/// Normalizes the Responses API event stream.
///
/// Output items are keyed by their string item id; function call ids and
/// names arrive with `response.output_item.added`.
#[derive(Debug)]
pub struct ResponsesChunkProcessor {
    options: ProcessorOptions,
    state: ChannelState,
    translator: FinishReasonTranslator,
    usage: UsageTracker,
    items: HashMap<String, ItemKind>,
    output: Vec<OutputItem>,
    refusal_seen: bool,
    format_tool_used: bool,
}

impl Default for ResponsesChunkProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl ResponsesChunkProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            state: ChannelState::new(PROVIDER, options.reasoning),
            options,
            translator: FinishReasonTranslator::new(PROVIDER),
            usage: UsageTracker::new(),
            items: HashMap::new(),
            output: Vec::new(),
            refusal_seen: false,
            format_tool_used: false,
        }
    }

    fn item_kind(&self, item_id: &str, event: &str) -> Result<ItemKind, StreamError> {
        self.items.get(item_id).copied().ok_or_else(|| {
            StreamError::violation(
                PROVIDER,
                format!("{event} for output item {item_id:?} that was never added"),
            )
        })
    }

    fn expect_kind(
        &self,
        item_id: &str,
        event: &str,
        expected: &[ItemKind],
    ) -> Result<ItemKind, StreamError> {
        let kind = self.item_kind(item_id, event)?;
        if !expected.contains(&kind) {
            return Err(StreamError::violation(
                PROVIDER,
                format!("{event} for {kind:?} item {item_id:?}"),
            ));
        }
        Ok(kind)
    }

    fn item_added(&mut self, out: &mut Vec<Chunk>, item: OutputItem) -> Result<(), StreamError> {
        let (item_id, kind) = match item {
            OutputItem::Message { id, .. } => (id, ItemKind::Message),
            OutputItem::Reasoning { id, .. } => (id, ItemKind::Reasoning),
            OutputItem::FunctionCall {
                id, call_id, name, ..
            } => {
                let call_id = call_id.unwrap_or_else(|| {
                    warn!("[{PROVIDER}] function call {name:?} has no call_id");
                    UNKNOWN_TOOL_ID.to_string()
                });
                let item_id = id.unwrap_or_else(|| call_id.clone());
                if self.options.is_format_tool(&name) {
                    debug!("[{PROVIDER}] format tool item {item_id:?} reported as text");
                    self.format_tool_used = true;
                    self.state.ensure_text(out)?;
                    (item_id, ItemKind::FormatTool)
                } else {
                    self.state
                        .start_tool(out, ToolSlot::Id(item_id.clone()), &call_id, &name)?;
                    (item_id, ItemKind::FunctionCall)
                }
            }
            OutputItem::Unsupported => {
                return Err(StreamError::unsupported(PROVIDER, "output item type"));
            }
        };

        if self.items.insert(item_id.clone(), kind).is_some() {
            return Err(StreamError::violation(
                PROVIDER,
                format!("output item {item_id:?} added twice"),
            ));
        }
        Ok(())
    }

    fn item_done(&mut self, out: &mut Vec<Chunk>, item: OutputItem) -> Result<(), StreamError> {
        let item_id = match &item {
            OutputItem::Message { id, .. } | OutputItem::Reasoning { id, .. } => id.clone(),
            OutputItem::FunctionCall { id, call_id, .. } => id
                .clone()
                .or_else(|| call_id.clone())
                .unwrap_or_else(|| UNKNOWN_TOOL_ID.to_string()),
            OutputItem::Unsupported => {
                return Err(StreamError::unsupported(PROVIDER, "output item type"));
            }
        };
        let Some(kind) = self.items.remove(&item_id) else {
            return Err(StreamError::violation(
                PROVIDER,
                format!("output item {item_id:?} done but never added"),
            ));
        };

        match kind {
            ItemKind::Message | ItemKind::FormatTool => {
                if self.state.is_text_open() {
                    self.state.end_text(out)?;
                }
            }
            ItemKind::Reasoning => {
                if self.state.is_reasoning_open() {
                    self.state.end_reasoning(out)?;
                }
            }
            ItemKind::FunctionCall => {
                self.state.end_tool(out, &ToolSlot::Id(item_id))?;
            }
        }
        self.output.push(item);
        Ok(())
    }

    fn complete(
        &mut self,
        out: &mut Vec<Chunk>,
        response: Response,
        raw_reason: Option<&str>,
    ) -> Result<(), StreamError> {
        if let Some(usage) = &response.usage {
            if let Some(delta) = self.usage.observe(usage.into()) {
                self.state.usage(out, delta)?;
            }
        }
        if !self.items.is_empty() {
            warn!(
                "[{PROVIDER}] response finished with {} output items still open",
                self.items.len()
            );
        }
        self.state.close_all(out);

        let output = if response.output.is_empty() {
            std::mem::take(&mut self.output)
        } else {
            response.output
        };
        self.state.raw_message(out, serde_json::to_value(output)?)?;

        let reason = self.translator.resolve(
            raw_reason,
            FinishContext {
                visible_tool_calls: self.state.visible_tool_calls(),
                format_tool_used: self.format_tool_used,
                refusal_seen: self.refusal_seen,
            },
        );
        self.state.finish(out, reason)
    }
}

impl ChunkProcessor for ResponsesChunkProcessor {
    type Event = ResponseEvent;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn process(&mut self, event: ResponseEvent) -> Result<Vec<Chunk>, StreamError> {
        let mut out = vec![raw_event(&event)?];
        match event {
            ResponseEvent::Created { .. }
            | ResponseEvent::InProgress { .. }
            | ResponseEvent::ContentPartAdded { .. }
            | ResponseEvent::ContentPartDone { .. }
            | ResponseEvent::OutputTextDone { .. }
            | ResponseEvent::OutputTextAnnotationAdded { .. }
            | ResponseEvent::RefusalDone { .. }
            | ResponseEvent::FunctionCallArgumentsDone { .. }
            | ResponseEvent::ReasoningSummaryPartAdded { .. }
            | ResponseEvent::ReasoningSummaryPartDone { .. }
            | ResponseEvent::ReasoningSummaryTextDone { .. } => {}
            ResponseEvent::OutputItemAdded { item, .. } => self.item_added(&mut out, item)?,
            ResponseEvent::OutputItemDone { item, .. } => self.item_done(&mut out, item)?,
            ResponseEvent::OutputTextDelta { item_id, delta, .. } => {
                self.expect_kind(&item_id, "output_text.delta", &[ItemKind::Message])?;
                self.state.ensure_text(&mut out)?;
                self.state.text_delta(&mut out, &delta)?;
            }
            ResponseEvent::RefusalDelta { item_id, delta, .. } => {
                self.expect_kind(&item_id, "refusal.delta", &[ItemKind::Message])?;
                self.refusal_seen = true;
                self.state.ensure_text(&mut out)?;
                self.state.text_delta(&mut out, &delta)?;
            }
            ResponseEvent::FunctionCallArgumentsDelta { item_id, delta, .. } => {
                let kind = self.expect_kind(
                    &item_id,
                    "function_call_arguments.delta",
                    &[ItemKind::FunctionCall, ItemKind::FormatTool],
                )?;
                if kind == ItemKind::FormatTool {
                    self.state.ensure_text(&mut out)?;
                    self.state.text_delta(&mut out, &delta)?;
                } else {
                    self.state
                        .tool_delta(&mut out, &ToolSlot::Id(item_id), &delta)?;
                }
            }
            ResponseEvent::ReasoningSummaryTextDelta { item_id, delta, .. } => {
                self.expect_kind(
                    &item_id,
                    "reasoning_summary_text.delta",
                    &[ItemKind::Reasoning],
                )?;
                self.state.ensure_reasoning(&mut out)?;
                self.state.reasoning_delta(&mut out, &delta)?;
            }
            ResponseEvent::Completed { response } => {
                self.complete(&mut out, response, Some("completed"))?;
            }
            ResponseEvent::Incomplete { response } => {
                let reason = response
                    .incomplete_details
                    .as_ref()
                    .and_then(|details| details.reason.clone());
                self.complete(&mut out, response, reason.as_deref())?;
            }
            ResponseEvent::Failed { response } => {
                let message = response
                    .error
                    .map_or_else(|| "response failed".to_string(), |e| e.message);
                return Err(StreamError::upstream(PROVIDER, message));
            }
            ResponseEvent::Error { code, message } => {
                let message = match code {
                    Some(code) => format!("{code}: {message}"),
                    None => message,
                };
                return Err(StreamError::upstream(PROVIDER, message));
            }
            ResponseEvent::Unsupported => {
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
        debug!("[{PROVIDER}] stream ended without a terminal response event");
        self.state.close_all(&mut out);
        if !self.state.raw_message_sent() {
            let output = serde_json::to_value(&self.output)?;
            self.state.raw_message(&mut out, output)?;
        }
        Ok(out)
    }
}
