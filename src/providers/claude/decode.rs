use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{json, Value};
use std::io;

use super::types::{ContentBlock, MessageResponse};
use crate::core::{Provider, StreamError};
use crate::providers::{
    AssistantMessage, ContentPart, Decoded, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ReasoningMode, UNKNOWN_TOOL_ID,
};

/// Separators as Anthropic writes them in `input_json_delta` fragments
struct StreamedJsonFormatter;

impl Formatter for StreamedJsonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Renders tool input the way the streamed `partial_json` spells it: keys in
/// model order, `", "` and `": "` separators. An empty object streams no
/// fragments at all.
fn input_json(input: &Value) -> Result<String, StreamError> {
    if input.as_object().is_some_and(|object| object.is_empty()) {
        return Ok(String::new());
    }
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, StreamedJsonFormatter);
    input.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|e| StreamError::Parse(e.to_string()))
}

/// Decodes a complete (non-streamed) Messages API response into the same
/// parts the streaming path accumulates.
pub fn decode_response(
    response: &MessageResponse,
    options: &ProcessorOptions,
) -> Result<Decoded, StreamError> {
    let mut content = Vec::with_capacity(response.content.len());
    let mut context = FinishContext::default();

    for block in &response.content {
        match block {
            ContentBlock::Text { text } => content.push(ContentPart::text(text.as_str())),
            ContentBlock::ToolUse { name, input, .. } if options.is_format_tool(name) => {
                context.format_tool_used = true;
                content.push(ContentPart::text(input_json(input)?));
            }
            ContentBlock::ToolUse { id, name, input } => {
                let id = if id.is_empty() { UNKNOWN_TOOL_ID } else { id };
                context.visible_tool_calls += 1;
                content.push(ContentPart::tool_call(
                    id,
                    name.as_str(),
                    input_json(input)?,
                ));
            }
            ContentBlock::Thinking { thinking, .. } => content.push(match options.reasoning {
                ReasoningMode::Separate => ContentPart::reasoning(thinking.as_str()),
                ReasoningMode::AsText => ContentPart::text(thinking.as_str()),
            }),
            ContentBlock::RedactedThinking { .. } => {}
            ContentBlock::Unsupported => {
                return Err(StreamError::unsupported(Provider::Claude, "content block type"));
            }
        }
    }

    let translator = FinishReasonTranslator::new(Provider::Claude);
    let finish_reason = translator.resolve(response.stop_reason.as_deref(), context);

    Ok(Decoded {
        message: AssistantMessage {
            content,
            raw_message: Some(json!({
                "role": "assistant",
                "content": response.content,
            })),
        },
        finish_reason: Some(finish_reason),
        usage: (&response.usage).into(),
    })
}
